//! Application assembly.
//!
//! Wires the in-memory backends, services, and audit pipeline into a
//! ready [`AuthState`] and router. Optionally seeds demo accounts and
//! clients for development.

use std::sync::Arc;

use axum::Router;
use tokio::task::JoinHandle;

use signet_auth::AuthResult;
use signet_auth::audit::{AuditEmitter, AuditSink};
use signet_auth::http::AuthState;
use signet_auth::oauth::AuthorizeService;
use signet_auth::session::SessionBridge;
use signet_auth::storage::{AuthorizationCodeStorage, ClientStorage, TokenStorage, UserDirectory};
use signet_auth::token::{IdTokenSigner, SigningKeyPair, TokenService};
use signet_auth::types::{AdminPrincipal, Client, GrantType, UserPrincipal};
use signet_auth_memory::{
    MemoryAuditSink, MemoryAuthorizationCodeStorage, MemoryClientStorage, MemoryTokenStorage,
    MemoryUserDirectory, hash_client_secret,
};

use crate::config::AppConfig;

/// A fully wired application.
pub struct App {
    /// Routes with state attached.
    pub router: Router,

    /// Shared handler state, kept for direct access in tests and for the
    /// seeding helpers.
    pub state: AuthState,

    /// Code store handle for the cleanup sweeper.
    pub codes: Arc<dyn AuthorizationCodeStorage>,

    /// Token store handle for the cleanup sweeper.
    pub tokens: Arc<dyn TokenStorage>,

    /// The audit sink events end up in.
    pub audit_sink: Arc<MemoryAuditSink>,

    /// Drain task behind the audit emitter. Await after the server stops
    /// to flush queued events.
    pub audit_task: JoinHandle<()>,
}

/// Builds the application from configuration.
///
/// # Errors
///
/// Returns an error if key generation or demo seeding fails.
pub async fn build_app(config: &AppConfig) -> AuthResult<App> {
    let clients = Arc::new(MemoryClientStorage::new());
    let directory = Arc::new(MemoryUserDirectory::new());
    let codes: Arc<dyn AuthorizationCodeStorage> = Arc::new(MemoryAuthorizationCodeStorage::new());
    let tokens: Arc<dyn TokenStorage> = Arc::new(MemoryTokenStorage::new());

    if config.seed.demo {
        seed_demo_data(clients.as_ref(), &directory).await?;
    }

    let key = SigningKeyPair::generate()?;
    tracing::info!(kid = %key.kid, "Generated ID token signing key");
    let signer = Arc::new(IdTokenSigner::new(key, &config.auth.issuer));

    let clients: Arc<dyn ClientStorage> = clients;
    let directory: Arc<dyn UserDirectory> = directory;

    let authorize_service = Arc::new(AuthorizeService::new(
        Arc::clone(&clients),
        Arc::clone(&codes),
        &config.auth.authorization,
        &config.auth.storage,
    ));
    let token_service = Arc::new(TokenService::new(
        Arc::clone(&codes),
        Arc::clone(&tokens),
        Arc::clone(&signer),
        config.auth.tokens.clone(),
        &config.auth.storage,
    ));
    let session = Arc::new(SessionBridge::new(
        Arc::clone(&directory),
        config.auth.session.clone(),
        &config.auth.issuer,
        &config.auth.storage,
    ));

    let audit_sink = Arc::new(MemoryAuditSink::new());
    let (audit, audit_task) = AuditEmitter::spawn(
        Arc::clone(&audit_sink) as Arc<dyn AuditSink>,
        &config.auth.audit,
    );

    let policy = config.auth.policy.mode;
    if policy.is_permissive() {
        tracing::warn!(
            policy = %policy,
            "Access policy allows every authenticated principal to authorize clients"
        );
    }

    let state = AuthState {
        authorize_service,
        token_service,
        session,
        clients,
        directory,
        signer,
        policy,
        audit,
        issuer: config.auth.issuer.clone(),
        storage_timeout: config.auth.storage.operation_timeout,
    };

    let router = signet_auth::http::router(state.clone());

    Ok(App {
        router,
        state,
        codes,
        tokens,
        audit_sink,
        audit_task,
    })
}

/// Demo client id seeded for browser flows.
pub const DEMO_WEB_CLIENT_ID: &str = "demo-web";

/// Demo confidential client id.
pub const DEMO_BACKEND_CLIENT_ID: &str = "demo-backend";

/// Plaintext secret of the demo confidential client.
pub const DEMO_BACKEND_CLIENT_SECRET: &str = "demo-backend-secret";

/// Seeded admin account id.
pub const DEMO_ADMIN_ID: &str = "admin";

/// Seeded user account id.
pub const DEMO_USER_ID: &str = "demo-user";

/// Seeds a public client, a confidential client, and two accounts.
///
/// # Errors
///
/// Returns an error if a seeded client fails validation or hashing.
pub async fn seed_demo_data(
    clients: &dyn ClientStorage,
    directory: &MemoryUserDirectory,
) -> AuthResult<()> {
    clients
        .create(&Client {
            client_id: DEMO_WEB_CLIENT_ID.to_string(),
            client_secret: None,
            name: "Demo Web App".to_string(),
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            redirect_uris: vec!["http://localhost:3000/callback".to_string()],
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
            confidential: false,
            active: true,
            access_token_lifetime: None,
            refresh_token_lifetime: None,
            pkce_required: None,
        })
        .await?;

    let secret_hash = hash_client_secret(DEMO_BACKEND_CLIENT_SECRET)?;
    clients
        .create(&Client {
            client_id: DEMO_BACKEND_CLIENT_ID.to_string(),
            client_secret: Some(secret_hash),
            name: "Demo Backend".to_string(),
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            redirect_uris: vec!["http://localhost:4000/callback".to_string()],
            scopes: vec!["openid".to_string(), "profile".to_string()],
            confidential: true,
            active: true,
            access_token_lifetime: None,
            refresh_token_lifetime: None,
            pkce_required: Some(false),
        })
        .await?;

    directory.insert_admin(AdminPrincipal {
        id: DEMO_ADMIN_ID.to_string(),
        username: "admin".to_string(),
        name: "Demo Admin".to_string(),
        email: "admin@signet.local".to_string(),
        is_super_admin: true,
        permissions: vec!["*".to_string()],
    });
    directory.insert_user(UserPrincipal {
        id: DEMO_USER_ID.to_string(),
        username: "demo".to_string(),
        given_name: "Demo".to_string(),
        family_name: "User".to_string(),
        email: "demo@signet.local".to_string(),
        email_verified: true,
        permissions: vec!["oauth:authorize".to_string()],
    });

    tracing::info!(
        web_client = DEMO_WEB_CLIENT_ID,
        backend_client = DEMO_BACKEND_CLIENT_ID,
        "Seeded demo clients and accounts"
    );
    Ok(())
}

//! HTTP surface of the authorization server.
//!
//! Routes:
//!
//! - `GET /authorize` - authorization code issuance
//! - `POST /token` - code exchange and refresh
//! - `GET|POST /userinfo` - OIDC claims for a bearer token
//! - `POST /revoke` - RFC 7009 token revocation
//! - `GET|POST /logout` - session termination
//! - `GET /.well-known/openid-configuration` - discovery document
//! - `GET /.well-known/jwks.json` - token verification keys
//!
//! Handlers stay thin: they parse the wire format, call into the
//! services held by [`AuthState`], emit audit events, and map
//! [`AuthError`](crate::error::AuthError) into RFC 6749 error bodies.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};

use crate::audit::AuditEmitter;
use crate::oauth::AuthorizeService;
use crate::policy::AccessPolicy;
use crate::session::SessionBridge;
use crate::storage::{ClientStorage, UserDirectory};
use crate::token::{IdTokenSigner, TokenService};

pub mod authorize;
pub mod discovery;
pub mod jwks;
pub mod logout;
pub mod revoke;
pub mod token;
pub mod userinfo;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AuthState {
    /// Authorization code issuance.
    pub authorize_service: Arc<AuthorizeService>,

    /// Token exchange, refresh, validation, and revocation.
    pub token_service: Arc<TokenService>,

    /// Cookie-based browser session handling.
    pub session: Arc<SessionBridge>,

    /// Registered OAuth clients.
    pub clients: Arc<dyn ClientStorage>,

    /// Principal lookup for userinfo and session resolution.
    pub directory: Arc<dyn UserDirectory>,

    /// ID token signing keys, also serves the JWKS document.
    pub signer: Arc<IdTokenSigner>,

    /// Access policy applied at the authorization endpoint.
    pub policy: AccessPolicy,

    /// Fire-and-forget audit pipeline.
    pub audit: AuditEmitter,

    /// External base URL, used for discovery and login redirects.
    pub issuer: String,

    /// Deadline applied to direct storage calls made from handlers.
    pub storage_timeout: Duration,
}

/// Builds the router for all authorization server endpoints.
pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/authorize", get(authorize::authorize_handler))
        .route("/token", post(token::token_handler))
        .route(
            "/userinfo",
            get(userinfo::userinfo_handler).post(userinfo::userinfo_handler),
        )
        .route("/revoke", post(revoke::revoke_handler))
        .route(
            "/logout",
            get(logout::logout_handler).post(logout::logout_form_handler),
        )
        .route(
            "/.well-known/openid-configuration",
            get(discovery::discovery_handler),
        )
        .route("/.well-known/jwks.json", get(jwks::jwks_handler))
        .with_state(state)
}

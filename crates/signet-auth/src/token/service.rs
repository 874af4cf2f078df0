//! Token issuance, validation, and revocation.
//!
//! Handles the two token grants (`authorization_code`, `refresh_token`),
//! bearer token validation for `/userinfo`, and RFC 7009 revocation.
//! Clients are authenticated before any of these run; every method takes
//! the already-verified [`Client`].
//!
//! Access and refresh tokens are opaque 256-bit values. Only their SHA-256
//! digests are stored, so a leaked store does not leak usable tokens.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::{StorageConfig, TokenConfig};
use crate::error::AuthError;
use crate::oauth::pkce::{PkceChallenge, PkceVerifier};
use crate::oauth::token::{TokenRequest, TokenResponse};
use crate::storage::{AuthorizationCodeStorage, TokenStorage, with_timeout};
use crate::token::id_token::IdTokenSigner;
use crate::types::code::AuthorizationCodeRecord;
use crate::types::token::{AccessTokenRecord, RefreshTokenRecord, generate_token, hash_token};
use crate::types::{Client, GrantType, PrincipalKind};

/// Issues, validates, and revokes tokens.
pub struct TokenService {
    codes: Arc<dyn AuthorizationCodeStorage>,
    tokens: Arc<dyn TokenStorage>,
    signer: Arc<IdTokenSigner>,
    config: TokenConfig,
    storage_timeout: std::time::Duration,
}

impl TokenService {
    /// Creates a new token service.
    #[must_use]
    pub fn new(
        codes: Arc<dyn AuthorizationCodeStorage>,
        tokens: Arc<dyn TokenStorage>,
        signer: Arc<IdTokenSigner>,
        config: TokenConfig,
        storage: &StorageConfig,
    ) -> Self {
        Self {
            codes,
            tokens,
            signer,
            config,
            storage_timeout: storage.operation_timeout,
        }
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// The code is consumed atomically before any further checks, so a
    /// replayed code fails with `invalid_grant` no matter how the first
    /// exchange went.
    ///
    /// # Errors
    ///
    /// - `UnsupportedGrantType` when `grant_type` is not `authorization_code`
    /// - `InvalidRequest` for missing `code` or `redirect_uri`
    /// - `InvalidGrant` for unknown, consumed, or expired codes, client or
    ///   redirect URI mismatch, and missing PKCE verifier
    /// - `PkceVerificationFailed` (rendered as `invalid_grant`) when the
    ///   verifier does not match the stored challenge
    /// - `Storage` when the backing store fails or times out
    pub async fn exchange_code(
        &self,
        request: &TokenRequest,
        client: &Client,
    ) -> AuthResult<TokenResponse> {
        if request.grant_type != "authorization_code" {
            return Err(AuthError::unsupported_grant_type(&request.grant_type));
        }

        let code = request
            .code
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("Missing code parameter"))?;

        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("Missing redirect_uri parameter"))?;

        // Atomic single-use consume. Whatever fails below, the code is gone.
        let record = with_timeout(self.storage_timeout, self.codes.consume(code))
            .await?
            .ok_or_else(|| {
                AuthError::invalid_grant("Authorization code is invalid or has already been used")
            })?;

        if record.is_expired() {
            return Err(AuthError::invalid_grant("Authorization code has expired"));
        }

        if record.client_id != client.client_id {
            return Err(AuthError::invalid_grant(
                "Authorization code was issued to a different client",
            ));
        }

        if record.redirect_uri != redirect_uri {
            return Err(AuthError::invalid_grant(
                "redirect_uri does not match the authorization request",
            ));
        }

        self.verify_pkce(&record, request.code_verifier.as_deref())?;

        self.mint_tokens(
            client,
            &record.subject,
            record.subject_kind,
            &record.scope,
            record.nonce.clone(),
        )
        .await
    }

    /// Checks the stored challenge against the presented verifier.
    fn verify_pkce(
        &self,
        record: &AuthorizationCodeRecord,
        code_verifier: Option<&str>,
    ) -> AuthResult<()> {
        match (&record.code_challenge, &record.code_challenge_method) {
            (Some(challenge), Some(method)) => {
                let verifier = code_verifier.ok_or_else(|| {
                    AuthError::invalid_grant(
                        "code_verifier is required for this authorization code",
                    )
                })?;

                let challenge = PkceChallenge::new(challenge.clone())
                    .map_err(|_| AuthError::internal("Stored PKCE challenge is malformed"))?;
                let verifier = PkceVerifier::new(verifier.to_string())
                    .map_err(|e| AuthError::invalid_grant(format!("Invalid code_verifier: {e}")))?;

                challenge
                    .verify(&verifier, *method)
                    .map_err(|_| AuthError::PkceVerificationFailed)
            }
            _ => {
                // The code was issued without a challenge. A stray verifier
                // means the client is confused about which code this is.
                if code_verifier.is_some() {
                    return Err(AuthError::invalid_grant(
                        "code_verifier was not expected for this authorization code",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// Refresh tokens rotate on every use: the presented token is revoked
    /// and a replacement is issued carrying the original absolute expiry,
    /// so rotation never extends the grant's lifetime.
    ///
    /// # Errors
    ///
    /// - `UnsupportedGrantType` when `grant_type` is not `refresh_token`
    /// - `InvalidClient` when the client is not registered for the grant
    /// - `InvalidRequest` when `refresh_token` is missing
    /// - `InvalidGrant` for unknown, revoked, expired, or foreign tokens
    /// - `InvalidScope` when the requested scope exceeds the original grant
    /// - `Storage` when the backing store fails or times out
    pub async fn refresh(
        &self,
        request: &TokenRequest,
        client: &Client,
    ) -> AuthResult<TokenResponse> {
        if request.grant_type != "refresh_token" {
            return Err(AuthError::unsupported_grant_type(&request.grant_type));
        }

        if !client.is_grant_type_allowed(GrantType::RefreshToken) {
            return Err(AuthError::invalid_client(
                "Client is not registered for the refresh_token grant",
            ));
        }

        let refresh_token = request
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("Missing refresh_token parameter"))?;

        let token_hash = hash_token(refresh_token);
        let stored = with_timeout(self.storage_timeout, self.tokens.find_refresh_by_hash(&token_hash))
            .await?
            .ok_or_else(|| AuthError::invalid_grant("Refresh token is not recognized"))?;

        self.check_refresh_token(&stored, client)?;

        let scope = determine_refresh_scope(request.scope.as_deref(), &stored)?;

        let now = OffsetDateTime::now_utc();
        let access_lifetime = self.access_lifetime_secs(client);

        // Rotate: revoke the presented token, then insert the replacement.
        with_timeout(self.storage_timeout, self.tokens.revoke_refresh(&token_hash)).await?;

        let new_refresh_value = generate_token();
        let new_refresh = RefreshTokenRecord {
            id: Uuid::new_v4(),
            token_hash: hash_token(&new_refresh_value),
            client_id: client.client_id.clone(),
            subject: stored.subject.clone(),
            subject_kind: stored.subject_kind,
            scope: scope.clone(),
            issued_at: now,
            // The original expiry survives rotation
            expires_at: stored.expires_at,
            revoked_at: None,
        };
        with_timeout(self.storage_timeout, self.tokens.store_refresh(&new_refresh)).await?;

        let access_value = generate_token();
        let access = AccessTokenRecord {
            id: Uuid::new_v4(),
            token_hash: hash_token(&access_value),
            client_id: client.client_id.clone(),
            subject: stored.subject.clone(),
            subject_kind: stored.subject_kind,
            scope: scope.clone(),
            refresh_token_id: Some(new_refresh.id),
            issued_at: now,
            expires_at: now + time::Duration::seconds(access_lifetime),
            revoked_at: None,
        };
        with_timeout(self.storage_timeout, self.tokens.store_access(&access)).await?;

        // ID tokens are not reissued on refresh
        Ok(
            TokenResponse::new(access_value, access_lifetime.max(0) as u64, scope)
                .with_refresh_token(new_refresh_value),
        )
    }

    /// Validates a bearer access token and returns its record.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` for unknown tokens
    /// - `TokenRevoked` / `TokenExpired` for dead ones (revocation is
    ///   checked first, so a revoked token never reads as merely expired)
    /// - `Storage` when the backing store fails or times out
    pub async fn validate_access_token(&self, token: &str) -> AuthResult<AccessTokenRecord> {
        let token_hash = hash_token(token);
        let record = with_timeout(
            self.storage_timeout,
            self.tokens.find_access_by_hash(&token_hash),
        )
        .await?
        .ok_or_else(|| AuthError::invalid_token("Access token is not recognized"))?;

        if record.is_revoked() {
            return Err(AuthError::TokenRevoked);
        }
        if record.is_expired() {
            return Err(AuthError::TokenExpired);
        }

        Ok(record)
    }

    /// Revokes a token presented by its owner (RFC 7009).
    ///
    /// Returns whether a live token was actually revoked. Unknown tokens
    /// and repeat revocations return `Ok(false)`; the endpoint answers 200
    /// either way. Tokens belonging to a different client are left alone.
    /// Revoking a refresh token also revokes the access tokens minted with
    /// it.
    ///
    /// # Errors
    ///
    /// Returns `Storage` when the backing store fails or times out. The
    /// HTTP surface still answers 200 in that case.
    pub async fn revoke(
        &self,
        client: &Client,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> AuthResult<bool> {
        let token_hash = hash_token(token);

        // The hint only orders the search, it never limits it.
        if token_type_hint == Some("refresh_token") {
            if let Some(revoked) = self.try_revoke_refresh(client, &token_hash).await? {
                return Ok(revoked);
            }
            if let Some(revoked) = self.try_revoke_access(client, &token_hash).await? {
                return Ok(revoked);
            }
        } else {
            if let Some(revoked) = self.try_revoke_access(client, &token_hash).await? {
                return Ok(revoked);
            }
            if let Some(revoked) = self.try_revoke_refresh(client, &token_hash).await? {
                return Ok(revoked);
            }
        }

        Ok(false)
    }

    /// Revokes an access token by hash. `None` means no such token.
    async fn try_revoke_access(
        &self,
        client: &Client,
        token_hash: &str,
    ) -> AuthResult<Option<bool>> {
        let record = with_timeout(
            self.storage_timeout,
            self.tokens.find_access_by_hash(token_hash),
        )
        .await?;

        match record {
            Some(record) if record.client_id == client.client_id => {
                let revoked =
                    with_timeout(self.storage_timeout, self.tokens.revoke_access(token_hash))
                        .await?;
                Ok(Some(revoked))
            }
            Some(_) => Ok(Some(false)),
            None => Ok(None),
        }
    }

    /// Revokes a refresh token by hash, cascading to its access tokens.
    /// `None` means no such token.
    async fn try_revoke_refresh(
        &self,
        client: &Client,
        token_hash: &str,
    ) -> AuthResult<Option<bool>> {
        let record = with_timeout(
            self.storage_timeout,
            self.tokens.find_refresh_by_hash(token_hash),
        )
        .await?;

        match record {
            Some(record) if record.client_id == client.client_id => {
                let revoked =
                    with_timeout(self.storage_timeout, self.tokens.revoke_refresh(token_hash))
                        .await?;
                if revoked {
                    let cascaded = with_timeout(
                        self.storage_timeout,
                        self.tokens.revoke_access_by_refresh_id(record.id),
                    )
                    .await?;
                    tracing::debug!(
                        refresh_token_id = %record.id,
                        cascaded,
                        "Revoked refresh token and linked access tokens"
                    );
                }
                Ok(Some(revoked))
            }
            Some(_) => Ok(Some(false)),
            None => Ok(None),
        }
    }

    /// Mints the access/refresh/ID token set for a granted scope.
    async fn mint_tokens(
        &self,
        client: &Client,
        subject: &str,
        subject_kind: PrincipalKind,
        scope: &str,
        nonce: Option<String>,
    ) -> AuthResult<TokenResponse> {
        let now = OffsetDateTime::now_utc();
        let access_lifetime = self.access_lifetime_secs(client);
        let refresh_lifetime = client
            .refresh_token_lifetime
            .unwrap_or(self.config.refresh_token_ttl.as_secs() as i64);

        // Refresh token first so the access record can point at it
        let refresh = if client.is_grant_type_allowed(GrantType::RefreshToken) {
            let value = generate_token();
            let record = RefreshTokenRecord {
                id: Uuid::new_v4(),
                token_hash: hash_token(&value),
                client_id: client.client_id.clone(),
                subject: subject.to_string(),
                subject_kind,
                scope: scope.to_string(),
                issued_at: now,
                expires_at: now + time::Duration::seconds(refresh_lifetime),
                revoked_at: None,
            };
            with_timeout(self.storage_timeout, self.tokens.store_refresh(&record)).await?;
            Some((value, record.id))
        } else {
            None
        };

        let access_value = generate_token();
        let access = AccessTokenRecord {
            id: Uuid::new_v4(),
            token_hash: hash_token(&access_value),
            client_id: client.client_id.clone(),
            subject: subject.to_string(),
            subject_kind,
            scope: scope.to_string(),
            refresh_token_id: refresh.as_ref().map(|(_, id)| *id),
            issued_at: now,
            expires_at: now + time::Duration::seconds(access_lifetime),
            revoked_at: None,
        };
        with_timeout(self.storage_timeout, self.tokens.store_access(&access)).await?;

        let mut response = TokenResponse::new(
            access_value,
            access_lifetime.max(0) as u64,
            scope.to_string(),
        );

        if let Some((value, _)) = refresh {
            response = response.with_refresh_token(value);
        }

        if scope.split_whitespace().any(|s| s == "openid") {
            let id_token =
                self.signer
                    .issue(subject, &client.client_id, self.config.id_token_ttl, nonce)?;
            response = response.with_id_token(id_token);
        }

        Ok(response)
    }

    /// Rejects refresh tokens that cannot be used.
    fn check_refresh_token(&self, token: &RefreshTokenRecord, client: &Client) -> AuthResult<()> {
        if token.client_id != client.client_id {
            return Err(AuthError::invalid_grant(
                "Refresh token was issued to a different client",
            ));
        }
        if token.is_revoked() {
            return Err(AuthError::invalid_grant("Refresh token has been revoked"));
        }
        if token.is_expired() {
            return Err(AuthError::invalid_grant("Refresh token has expired"));
        }
        Ok(())
    }

    fn access_lifetime_secs(&self, client: &Client) -> i64 {
        client
            .access_token_lifetime
            .unwrap_or(self.config.access_token_ttl.as_secs() as i64)
    }
}

/// Determines the scope for a refreshed token.
///
/// The scope may be narrowed but never expanded (RFC 6749 section 6).
fn determine_refresh_scope(
    requested: Option<&str>,
    stored: &RefreshTokenRecord,
) -> AuthResult<String> {
    match requested {
        None => Ok(stored.scope.clone()),
        Some(requested) => {
            let original: std::collections::HashSet<&str> =
                stored.scope.split_whitespace().collect();
            let narrowed: std::collections::HashSet<&str> =
                requested.split_whitespace().collect();

            if !narrowed.is_subset(&original) {
                return Err(AuthError::invalid_scope(
                    "Requested scope exceeds the original grant",
                ));
            }

            Ok(requested.to_string())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthorizationConfig;
    use crate::oauth::pkce::PkceChallengeMethod;
    use crate::token::id_token::SigningKeyPair;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Default)]
    struct MockCodeStorage {
        codes: RwLock<HashMap<String, AuthorizationCodeRecord>>,
    }

    #[async_trait::async_trait]
    impl AuthorizationCodeStorage for MockCodeStorage {
        async fn store(&self, record: &AuthorizationCodeRecord) -> AuthResult<()> {
            self.codes
                .write()
                .unwrap()
                .insert(record.code.clone(), record.clone());
            Ok(())
        }

        async fn consume(&self, code: &str) -> AuthResult<Option<AuthorizationCodeRecord>> {
            Ok(self.codes.write().unwrap().remove(code))
        }

        async fn cleanup_expired(&self) -> AuthResult<u64> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct MockTokenStorage {
        access: RwLock<HashMap<String, AccessTokenRecord>>,
        refresh: RwLock<HashMap<String, RefreshTokenRecord>>,
    }

    #[async_trait::async_trait]
    impl TokenStorage for MockTokenStorage {
        async fn store_access(&self, record: &AccessTokenRecord) -> AuthResult<()> {
            self.access
                .write()
                .unwrap()
                .insert(record.token_hash.clone(), record.clone());
            Ok(())
        }

        async fn store_refresh(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
            self.refresh
                .write()
                .unwrap()
                .insert(record.token_hash.clone(), record.clone());
            Ok(())
        }

        async fn find_access_by_hash(&self, hash: &str) -> AuthResult<Option<AccessTokenRecord>> {
            Ok(self.access.read().unwrap().get(hash).cloned())
        }

        async fn find_refresh_by_hash(&self, hash: &str) -> AuthResult<Option<RefreshTokenRecord>> {
            Ok(self.refresh.read().unwrap().get(hash).cloned())
        }

        async fn revoke_access(&self, hash: &str) -> AuthResult<bool> {
            let mut access = self.access.write().unwrap();
            match access.get_mut(hash) {
                Some(record) if record.revoked_at.is_none() => {
                    record.revoked_at = Some(OffsetDateTime::now_utc());
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn revoke_refresh(&self, hash: &str) -> AuthResult<bool> {
            let mut refresh = self.refresh.write().unwrap();
            match refresh.get_mut(hash) {
                Some(record) if record.revoked_at.is_none() => {
                    record.revoked_at = Some(OffsetDateTime::now_utc());
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn revoke_access_by_refresh_id(&self, refresh_id: Uuid) -> AuthResult<u64> {
            let mut count = 0;
            let mut access = self.access.write().unwrap();
            for record in access.values_mut() {
                if record.refresh_token_id == Some(refresh_id) && record.revoked_at.is_none() {
                    record.revoked_at = Some(OffsetDateTime::now_utc());
                    count += 1;
                }
            }
            Ok(count)
        }

        async fn cleanup_expired(&self) -> AuthResult<u64> {
            Ok(0)
        }
    }

    struct TestHarness {
        service: TokenService,
        codes: Arc<MockCodeStorage>,
        tokens: Arc<MockTokenStorage>,
    }

    fn make_harness() -> TestHarness {
        let codes = Arc::new(MockCodeStorage::default());
        let tokens = Arc::new(MockTokenStorage::default());
        let signer = Arc::new(IdTokenSigner::new(
            SigningKeyPair::generate().unwrap(),
            "https://auth.example.com",
        ));
        let service = TokenService::new(
            codes.clone(),
            tokens.clone(),
            signer,
            TokenConfig::default(),
            &StorageConfig::default(),
        );
        TestHarness {
            service,
            codes,
            tokens,
        }
    }

    fn make_client() -> Client {
        Client {
            client_id: "web-app".to_string(),
            client_secret: None,
            name: "Web App".to_string(),
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            redirect_uris: vec!["https://app.example.com/callback".to_string()],
            scopes: vec![],
            confidential: false,
            active: true,
            access_token_lifetime: None,
            refresh_token_lifetime: None,
            pkce_required: None,
        }
    }

    // RFC 7636 appendix B pair
    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    async fn store_code(harness: &TestHarness, scope: &str) -> String {
        let now = OffsetDateTime::now_utc();
        let record = AuthorizationCodeRecord {
            code: crate::types::code::generate_code(),
            client_id: "web-app".to_string(),
            subject: "user-1".to_string(),
            subject_kind: PrincipalKind::User,
            redirect_uri: "https://app.example.com/callback".to_string(),
            scope: scope.to_string(),
            state: None,
            nonce: Some("n-0S6_WzA2Mj".to_string()),
            code_challenge: Some(CHALLENGE.to_string()),
            code_challenge_method: Some(PkceChallengeMethod::S256),
            created_at: now,
            expires_at: now + AuthorizationConfig::default().code_ttl,
        };
        harness.codes.store(&record).await.unwrap();
        record.code
    }

    fn exchange_request(code: &str) -> TokenRequest {
        TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: Some(code.to_string()),
            redirect_uri: Some("https://app.example.com/callback".to_string()),
            code_verifier: Some(VERIFIER.to_string()),
            client_id: Some("web-app".to_string()),
            client_secret: None,
            refresh_token: None,
            scope: None,
        }
    }

    fn refresh_request(refresh_token: &str) -> TokenRequest {
        TokenRequest {
            grant_type: "refresh_token".to_string(),
            code: None,
            redirect_uri: None,
            code_verifier: None,
            client_id: Some("web-app".to_string()),
            client_secret: None,
            refresh_token: Some(refresh_token.to_string()),
            scope: None,
        }
    }

    // -------------------------------------------------------------------------
    // Code Exchange
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_exchange_code_success() {
        let harness = make_harness();
        let client = make_client();
        let code = store_code(&harness, "openid profile").await;

        let response = harness
            .service
            .exchange_code(&exchange_request(&code), &client)
            .await
            .unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.scope, "openid profile");
        assert!(response.refresh_token.is_some());
        assert!(response.id_token.is_some());

        // Stored records are hashed and linked
        let access = harness
            .tokens
            .find_access_by_hash(&hash_token(&response.access_token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(access.subject, "user-1");
        assert!(access.refresh_token_id.is_some());
        assert_ne!(access.token_hash, response.access_token);
    }

    #[tokio::test]
    async fn test_exchange_code_replay_fails() {
        let harness = make_harness();
        let client = make_client();
        let code = store_code(&harness, "openid").await;

        harness
            .service
            .exchange_code(&exchange_request(&code), &client)
            .await
            .unwrap();

        let replay = harness
            .service
            .exchange_code(&exchange_request(&code), &client)
            .await;
        assert!(matches!(replay, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_exchange_expired_code() {
        let harness = make_harness();
        let client = make_client();
        let now = OffsetDateTime::now_utc();
        let record = AuthorizationCodeRecord {
            code: "expired-code".to_string(),
            client_id: "web-app".to_string(),
            subject: "user-1".to_string(),
            subject_kind: PrincipalKind::User,
            redirect_uri: "https://app.example.com/callback".to_string(),
            scope: "openid".to_string(),
            state: None,
            nonce: None,
            code_challenge: Some(CHALLENGE.to_string()),
            code_challenge_method: Some(PkceChallengeMethod::S256),
            created_at: now - time::Duration::seconds(700),
            expires_at: now - time::Duration::seconds(100),
        };
        harness.codes.store(&record).await.unwrap();

        let result = harness
            .service
            .exchange_code(&exchange_request("expired-code"), &client)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_exchange_wrong_client() {
        let harness = make_harness();
        let mut client = make_client();
        client.client_id = "other-app".to_string();
        let code = store_code(&harness, "openid").await;

        let result = harness
            .service
            .exchange_code(&exchange_request(&code), &client)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_exchange_wrong_redirect_uri() {
        let harness = make_harness();
        let client = make_client();
        let code = store_code(&harness, "openid").await;

        let mut request = exchange_request(&code);
        request.redirect_uri = Some("https://app.example.com/callback/".to_string());

        let result = harness.service.exchange_code(&request, &client).await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_exchange_wrong_verifier() {
        let harness = make_harness();
        let client = make_client();
        let code = store_code(&harness, "openid").await;

        let mut request = exchange_request(&code);
        request.code_verifier = Some("a".repeat(43));

        let result = harness.service.exchange_code(&request, &client).await;
        assert!(matches!(result, Err(AuthError::PkceVerificationFailed)));
        assert_eq!(result.unwrap_err().oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_exchange_missing_verifier() {
        let harness = make_harness();
        let client = make_client();
        let code = store_code(&harness, "openid").await;

        let mut request = exchange_request(&code);
        request.code_verifier = None;

        let result = harness.service.exchange_code(&request, &client).await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_exchange_without_openid_scope_has_no_id_token() {
        let harness = make_harness();
        let client = make_client();
        let code = store_code(&harness, "profile email").await;

        let response = harness
            .service
            .exchange_code(&exchange_request(&code), &client)
            .await
            .unwrap();
        assert!(response.id_token.is_none());
    }

    #[tokio::test]
    async fn test_exchange_id_token_carries_nonce() {
        let harness = make_harness();
        let client = make_client();
        let code = store_code(&harness, "openid").await;

        let response = harness
            .service
            .exchange_code(&exchange_request(&code), &client)
            .await
            .unwrap();

        let claims = harness
            .service
            .signer
            .verify(response.id_token.as_deref().unwrap())
            .unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.aud, "web-app");
        assert_eq!(claims.nonce, Some("n-0S6_WzA2Mj".to_string()));
    }

    #[tokio::test]
    async fn test_exchange_no_refresh_token_without_grant() {
        let harness = make_harness();
        let mut client = make_client();
        client.grant_types = vec![GrantType::AuthorizationCode];
        let code = store_code(&harness, "openid").await;

        let response = harness
            .service
            .exchange_code(&exchange_request(&code), &client)
            .await
            .unwrap();
        assert!(response.refresh_token.is_none());
    }

    // -------------------------------------------------------------------------
    // Refresh
    // -------------------------------------------------------------------------

    async fn issue_tokens(harness: &TestHarness, client: &Client) -> TokenResponse {
        let code = store_code(harness, "openid profile").await;
        harness
            .service
            .exchange_code(&exchange_request(&code), client)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let harness = make_harness();
        let client = make_client();
        let issued = issue_tokens(&harness, &client).await;
        let old_refresh = issued.refresh_token.unwrap();

        let response = harness
            .service
            .refresh(&refresh_request(&old_refresh), &client)
            .await
            .unwrap();

        let new_refresh = response.refresh_token.unwrap();
        assert_ne!(new_refresh, old_refresh);
        assert_ne!(response.access_token, issued.access_token);
        assert!(response.id_token.is_none());

        // The old token is dead
        let replay = harness
            .service
            .refresh(&refresh_request(&old_refresh), &client)
            .await;
        assert!(matches!(replay, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_refresh_preserves_original_expiry() {
        let harness = make_harness();
        let client = make_client();
        let issued = issue_tokens(&harness, &client).await;
        let old_refresh = issued.refresh_token.unwrap();

        let old_record = harness
            .tokens
            .find_refresh_by_hash(&hash_token(&old_refresh))
            .await
            .unwrap()
            .unwrap();

        let response = harness
            .service
            .refresh(&refresh_request(&old_refresh), &client)
            .await
            .unwrap();

        let new_record = harness
            .tokens
            .find_refresh_by_hash(&hash_token(response.refresh_token.as_deref().unwrap()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(new_record.expires_at, old_record.expires_at);
        assert!(new_record.issued_at > old_record.issued_at);
    }

    #[tokio::test]
    async fn test_refresh_expired_token() {
        let harness = make_harness();
        let client = make_client();
        let now = OffsetDateTime::now_utc();
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            token_hash: hash_token("stale-refresh"),
            client_id: "web-app".to_string(),
            subject: "user-1".to_string(),
            subject_kind: PrincipalKind::User,
            scope: "openid".to_string(),
            issued_at: now - time::Duration::days(40),
            expires_at: now - time::Duration::days(10),
            revoked_at: None,
        };
        harness.tokens.store_refresh(&record).await.unwrap();

        let result = harness
            .service
            .refresh(&refresh_request("stale-refresh"), &client)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_refresh_foreign_client() {
        let harness = make_harness();
        let client = make_client();
        let issued = issue_tokens(&harness, &client).await;

        let mut other = make_client();
        other.client_id = "other-app".to_string();

        let result = harness
            .service
            .refresh(&refresh_request(issued.refresh_token.as_deref().unwrap()), &other)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidGrant { .. })));
    }

    #[tokio::test]
    async fn test_refresh_scope_narrowing() {
        let harness = make_harness();
        let client = make_client();
        let issued = issue_tokens(&harness, &client).await;

        let mut request = refresh_request(issued.refresh_token.as_deref().unwrap());
        request.scope = Some("openid".to_string());

        let response = harness.service.refresh(&request, &client).await.unwrap();
        assert_eq!(response.scope, "openid");
    }

    #[tokio::test]
    async fn test_refresh_scope_expansion_rejected() {
        let harness = make_harness();
        let client = make_client();
        let issued = issue_tokens(&harness, &client).await;

        let mut request = refresh_request(issued.refresh_token.as_deref().unwrap());
        request.scope = Some("openid profile admin".to_string());

        let result = harness.service.refresh(&request, &client).await;
        assert!(matches!(result, Err(AuthError::InvalidScope { .. })));
    }

    #[tokio::test]
    async fn test_unsupported_grant_type() {
        let harness = make_harness();
        let client = make_client();

        let mut request = refresh_request("whatever");
        request.grant_type = "password".to_string();

        let result = harness.service.refresh(&request, &client).await;
        assert!(matches!(
            result,
            Err(AuthError::UnsupportedGrantType { .. })
        ));
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_validate_access_token() {
        let harness = make_harness();
        let client = make_client();
        let issued = issue_tokens(&harness, &client).await;

        let record = harness
            .service
            .validate_access_token(&issued.access_token)
            .await
            .unwrap();
        assert_eq!(record.subject, "user-1");
        assert_eq!(record.subject_kind, PrincipalKind::User);
        assert_eq!(record.client_id, "web-app");
    }

    #[tokio::test]
    async fn test_validate_unknown_token() {
        let harness = make_harness();

        let result = harness.service.validate_access_token("no-such-token").await;
        assert!(matches!(result, Err(AuthError::InvalidToken { .. })));
    }

    #[tokio::test]
    async fn test_validate_expired_token() {
        let harness = make_harness();
        let now = OffsetDateTime::now_utc();
        let record = AccessTokenRecord {
            id: Uuid::new_v4(),
            token_hash: hash_token("stale-access"),
            client_id: "web-app".to_string(),
            subject: "user-1".to_string(),
            subject_kind: PrincipalKind::User,
            scope: "openid".to_string(),
            refresh_token_id: None,
            issued_at: now - time::Duration::hours(2),
            expires_at: now - time::Duration::hours(1),
            revoked_at: None,
        };
        harness.tokens.store_access(&record).await.unwrap();

        let result = harness.service.validate_access_token("stale-access").await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_revoked_token_rejected_before_expiry() {
        let harness = make_harness();
        let client = make_client();
        let issued = issue_tokens(&harness, &client).await;

        let revoked = harness
            .service
            .revoke(&client, &issued.access_token, Some("access_token"))
            .await
            .unwrap();
        assert!(revoked);

        // Well within its lifetime, yet rejected as revoked
        let result = harness
            .service
            .validate_access_token(&issued.access_token)
            .await;
        assert!(matches!(result, Err(AuthError::TokenRevoked)));
    }

    // -------------------------------------------------------------------------
    // Revocation
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let harness = make_harness();
        let client = make_client();
        let issued = issue_tokens(&harness, &client).await;

        let first = harness
            .service
            .revoke(&client, &issued.access_token, None)
            .await
            .unwrap();
        let second = harness
            .service
            .revoke(&client, &issued.access_token, None)
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn test_revoke_unknown_token_is_ok() {
        let harness = make_harness();
        let client = make_client();

        let revoked = harness
            .service
            .revoke(&client, "never-issued", None)
            .await
            .unwrap();
        assert!(!revoked);
    }

    #[tokio::test]
    async fn test_revoke_refresh_cascades_to_access() {
        let harness = make_harness();
        let client = make_client();
        let issued = issue_tokens(&harness, &client).await;

        let revoked = harness
            .service
            .revoke(
                &client,
                issued.refresh_token.as_deref().unwrap(),
                Some("refresh_token"),
            )
            .await
            .unwrap();
        assert!(revoked);

        let result = harness
            .service
            .validate_access_token(&issued.access_token)
            .await;
        assert!(matches!(result, Err(AuthError::TokenRevoked)));
    }

    #[tokio::test]
    async fn test_revoke_foreign_token_is_a_no_op() {
        let harness = make_harness();
        let client = make_client();
        let issued = issue_tokens(&harness, &client).await;

        let mut other = make_client();
        other.client_id = "other-app".to_string();

        let revoked = harness
            .service
            .revoke(&other, &issued.access_token, None)
            .await
            .unwrap();
        assert!(!revoked);

        // Still valid for its owner
        assert!(
            harness
                .service
                .validate_access_token(&issued.access_token)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_revoke_with_bad_hint_still_finds_token() {
        let harness = make_harness();
        let client = make_client();
        let issued = issue_tokens(&harness, &client).await;

        // Access token presented with a refresh hint
        let revoked = harness
            .service
            .revoke(&client, &issued.access_token, Some("refresh_token"))
            .await
            .unwrap();
        assert!(revoked);
    }
}

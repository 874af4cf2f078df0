//! Browser session bridge.
//!
//! The authorization endpoint never collects credentials itself. It reads a
//! signed session cookie minted at login, resolves the principal the cookie
//! names through the [`UserDirectory`], and sends unauthenticated browsers
//! to the login page with the original URL attached so the flow can resume.
//!
//! A missing, malformed, or expired cookie is not an error. The browser is
//! simply not signed in and gets the login redirect.

use std::sync::Arc;

use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use crate::AuthResult;
use crate::config::{SessionConfig, StorageConfig};
use crate::error::AuthError;
use crate::storage::{UserDirectory, with_timeout};
use crate::types::{Principal, PrincipalKind};

/// Claims carried by the session cookie.
///
/// The cookie is an HS256 JWT signed with the configured session secret.
/// It holds only the principal's identity; everything else is looked up
/// fresh from the directory on each request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Principal ID.
    pub sub: String,

    /// Which directory the subject lives in.
    pub kind: PrincipalKind,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at (Unix timestamp).
    pub iat: i64,
}

/// Resolves browser sessions to principals.
pub struct SessionBridge {
    directory: Arc<dyn UserDirectory>,
    config: SessionConfig,
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    storage_timeout: std::time::Duration,
}

impl SessionBridge {
    /// Creates a new session bridge.
    ///
    /// The signing keys are derived from `config.secret`; the config is
    /// expected to have passed validation, which enforces a minimum secret
    /// length.
    #[must_use]
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        config: SessionConfig,
        issuer: impl Into<String>,
        storage: &StorageConfig,
    ) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            directory,
            config,
            issuer: issuer.into(),
            encoding_key,
            decoding_key,
            storage_timeout: storage.operation_timeout,
        }
    }

    /// Resolves the principal behind the session cookie, if any.
    ///
    /// Returns `Ok(None)` when the cookie is absent, unreadable, expired,
    /// or names a principal the directory no longer knows. Only directory
    /// failures surface as errors.
    ///
    /// # Errors
    ///
    /// Returns `Storage` when the directory lookup fails or times out.
    pub async fn resolve_principal(&self, jar: &CookieJar) -> AuthResult<Option<Principal>> {
        let Some(cookie) = jar.get(&self.config.cookie_name) else {
            return Ok(None);
        };

        let claims = match self.decode_claims(cookie.value()) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable session cookie");
                return Ok(None);
            }
        };

        let principal = with_timeout(
            self.storage_timeout,
            self.directory.find_principal(claims.kind, &claims.sub),
        )
        .await?;

        if principal.is_none() {
            tracing::warn!(
                subject = %claims.sub,
                kind = %claims.kind,
                "Session cookie names an unknown principal"
            );
        }

        Ok(principal)
    }

    /// Issues a session cookie for a freshly authenticated principal.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if signing fails.
    pub fn issue_session(&self, principal: &Principal) -> AuthResult<Cookie<'static>> {
        let now = OffsetDateTime::now_utc();
        let claims = SessionClaims {
            sub: principal.id().to_string(),
            kind: principal.kind(),
            exp: (now + self.config.ttl).unix_timestamp(),
            iat: now.unix_timestamp(),
        };
        let token = self.sign_claims(&claims)?;

        Ok(
            Cookie::build((self.config.cookie_name.clone(), token))
                .http_only(true)
                .secure(self.config.secure)
                .same_site(SameSite::Lax)
                .path("/")
                .max_age(time::Duration::seconds(self.config.ttl.as_secs() as i64))
                .build(),
        )
    }

    /// Builds the cookie that removes the session.
    #[must_use]
    pub fn clear_session(&self) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), String::new()))
            .http_only(true)
            .secure(self.config.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::ZERO)
            .build()
    }

    /// Builds the login page URL carrying the original request URL, so the
    /// browser can come back and finish the authorization after signing in.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the issuer URL cannot be parsed.
    pub fn login_redirect_url(&self, original_url: &str) -> AuthResult<Url> {
        let mut url = Url::parse(&self.issuer)
            .map_err(|_| AuthError::configuration("Issuer is not a valid URL"))?;
        url.set_path(&self.config.login_path);
        url.query_pairs_mut().append_pair("redirect", original_url);
        Ok(url)
    }

    /// Returns the configured cookie name.
    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    fn sign_claims(&self, claims: &SessionClaims) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::internal(format!("Failed to sign session cookie: {e}")))
    }

    fn decode_claims(&self, token: &str) -> AuthResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::invalid_token(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Authorization server configuration.
//!
//! Configuration is deserialized from TOML (or any serde source) with
//! sensible defaults for every field, then checked once with
//! [`AuthServerConfig::validate`] at startup. Durations accept humantime
//! strings ("10m", "30d").

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policy::AccessPolicy;

/// Maximum authorization code lifetime accepted by validation.
const MAX_CODE_TTL: Duration = Duration::from_secs(600);

/// Minimum length for the session signing secret, in bytes.
const MIN_SESSION_SECRET_LEN: usize = 32;

// =============================================================================
// Root Config
// =============================================================================

/// Top-level configuration for the authorization server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthServerConfig {
    /// Issuer URL advertised in the discovery document and stamped into
    /// ID tokens. No trailing slash.
    pub issuer: String,

    /// Authorization endpoint settings.
    pub authorization: AuthorizationConfig,

    /// Token issuance settings.
    pub tokens: TokenConfig,

    /// Browser session settings.
    pub session: SessionConfig,

    /// Storage backend settings.
    pub storage: StorageConfig,

    /// Audit pipeline settings.
    pub audit: AuditConfig,

    /// Access policy settings.
    pub policy: PolicyConfig,
}

impl Default for AuthServerConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8090".to_string(),
            authorization: AuthorizationConfig::default(),
            tokens: TokenConfig::default(),
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
            audit: AuditConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl AuthServerConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::MissingIssuer);
        }
        if url::Url::parse(&self.issuer).is_err() {
            return Err(ConfigError::InvalidIssuer(self.issuer.clone()));
        }
        if self.issuer.ends_with('/') {
            return Err(ConfigError::IssuerTrailingSlash(self.issuer.clone()));
        }

        self.authorization.validate()?;
        self.tokens.validate()?;
        self.session.validate()?;
        self.storage.validate()?;
        self.audit.validate()?;

        Ok(())
    }
}

// =============================================================================
// Authorization Config
// =============================================================================

/// Settings for the authorization endpoint and code issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Authorization code lifetime. RFC 6749 recommends at most 10
    /// minutes; validation enforces that ceiling.
    #[serde(with = "humantime_serde")]
    pub code_ttl: Duration,

    /// Scope granted when the client requests none.
    pub default_scope: String,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            code_ttl: Duration::from_secs(600),
            default_scope: "openid profile email".to_string(),
        }
    }
}

impl AuthorizationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.code_ttl.is_zero() {
            return Err(ConfigError::ZeroDuration("authorization.code_ttl"));
        }
        if self.code_ttl > MAX_CODE_TTL {
            return Err(ConfigError::CodeTtlTooLong(self.code_ttl));
        }
        if self.default_scope.trim().is_empty() {
            return Err(ConfigError::EmptyDefaultScope);
        }
        Ok(())
    }
}

// =============================================================================
// Token Config
// =============================================================================

/// Settings for token issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Access token lifetime. Clients may override per registration.
    #[serde(with = "humantime_serde")]
    pub access_token_ttl: Duration,

    /// Refresh token lifetime. The absolute expiry is fixed at first
    /// issuance and survives rotation.
    #[serde(with = "humantime_serde")]
    pub refresh_token_ttl: Duration,

    /// ID token lifetime.
    #[serde(with = "humantime_serde")]
    pub id_token_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(3600),
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600),
            id_token_ttl: Duration::from_secs(3600),
        }
    }
}

impl TokenConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_ttl.is_zero() {
            return Err(ConfigError::ZeroDuration("tokens.access_token_ttl"));
        }
        if self.refresh_token_ttl.is_zero() {
            return Err(ConfigError::ZeroDuration("tokens.refresh_token_ttl"));
        }
        if self.id_token_ttl.is_zero() {
            return Err(ConfigError::ZeroDuration("tokens.id_token_ttl"));
        }
        if self.refresh_token_ttl < self.access_token_ttl {
            return Err(ConfigError::RefreshShorterThanAccess);
        }
        Ok(())
    }
}

// =============================================================================
// Session Config
// =============================================================================

/// Settings for the browser session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the session cookie.
    pub cookie_name: String,

    /// HMAC secret for session token signatures. Must be at least 32
    /// bytes. The default is empty and fails validation, forcing
    /// deployments to set one.
    pub secret: String,

    /// Session lifetime.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Path of the interactive login page, relative to the issuer.
    pub login_path: String,

    /// Whether the cookie is marked `Secure`. Disable only for local
    /// development over plain HTTP.
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "signet_session".to_string(),
            secret: String::new(),
            ttl: Duration::from_secs(24 * 3600),
            login_path: "/login".to_string(),
            secure: true,
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie_name.is_empty() {
            return Err(ConfigError::EmptyCookieName);
        }
        if self.secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::SessionSecretTooShort {
                min: MIN_SESSION_SECRET_LEN,
                actual: self.secret.len(),
            });
        }
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroDuration("session.ttl"));
        }
        if !self.login_path.starts_with('/') {
            return Err(ConfigError::InvalidLoginPath(self.login_path.clone()));
        }
        Ok(())
    }
}

// =============================================================================
// Storage Config
// =============================================================================

/// Settings for storage backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Deadline for a single storage operation. Operations exceeding it
    /// fail fast as `ServiceUnavailable` instead of hanging the request.
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Interval between background sweeps of expired codes and tokens.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(5),
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.operation_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("storage.operation_timeout"));
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("storage.cleanup_interval"));
        }
        Ok(())
    }
}

// =============================================================================
// Audit Config
// =============================================================================

/// Settings for the audit pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Capacity of the in-flight audit event queue. When full, new
    /// events are dropped rather than blocking the request path.
    pub queue_capacity: usize,

    /// Deadline for writing one event to the sink.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl AuditConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroAuditQueue);
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("audit.write_timeout"));
        }
        Ok(())
    }
}

// =============================================================================
// Policy Config
// =============================================================================

/// Settings for the access policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Policy mode applied to the authorization endpoint. The permissive
    /// default is announced with a startup warning.
    pub mode: AccessPolicy,
}

// =============================================================================
// Config Error
// =============================================================================

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Issuer must be set.
    #[error("issuer must be set")]
    MissingIssuer,

    /// Issuer must be a valid URL.
    #[error("issuer is not a valid URL: {0}")]
    InvalidIssuer(String),

    /// Issuer must not end with a slash.
    #[error("issuer must not end with a trailing slash: {0}")]
    IssuerTrailingSlash(String),

    /// Duration fields must be positive.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// Authorization codes are capped at 10 minutes.
    #[error("authorization.code_ttl must not exceed 600s, got {0:?}")]
    CodeTtlTooLong(Duration),

    /// A default scope is required.
    #[error("authorization.default_scope must not be empty")]
    EmptyDefaultScope,

    /// Refresh tokens must outlive access tokens.
    #[error("tokens.refresh_token_ttl must not be shorter than tokens.access_token_ttl")]
    RefreshShorterThanAccess,

    /// The session cookie needs a name.
    #[error("session.cookie_name must not be empty")]
    EmptyCookieName,

    /// The session secret must carry enough entropy.
    #[error("session.secret must be at least {min} bytes, got {actual}")]
    SessionSecretTooShort {
        /// Required minimum length.
        min: usize,
        /// Provided length.
        actual: usize,
    },

    /// Login path must be absolute.
    #[error("session.login_path must start with '/': {0}")]
    InvalidLoginPath(String),

    /// The audit queue needs room for at least one event.
    #[error("audit.queue_capacity must be greater than zero")]
    ZeroAuditQueue,
}

// =============================================================================
// Tests
// =============================================================================

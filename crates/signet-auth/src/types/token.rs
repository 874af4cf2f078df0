//! Token domain types.
//!
//! Access and refresh tokens are opaque random values. The plaintext is
//! returned to the client once and never stored; only a SHA-256 hash is
//! persisted, and lookups hash the presented token first.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::principal::PrincipalKind;

/// Hashes a token value with SHA-256 for storage and lookup.
#[must_use]
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates a cryptographically secure random token value.
///
/// Returns a 256-bit random value encoded as base64url (43 characters).
#[must_use]
pub fn generate_token() -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

// =============================================================================
// Access Token Record
// =============================================================================

/// A stored access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    /// Unique identifier for this record.
    pub id: Uuid,

    /// SHA-256 hash of the token value.
    pub token_hash: String,

    /// Client this token was issued to.
    pub client_id: String,

    /// Subject that authorized this token.
    pub subject: String,

    /// Which principal population the subject belongs to.
    pub subject_kind: PrincipalKind,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// Refresh token record this access token was issued alongside, if any.
    /// Revoking that refresh token also revokes this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_id: Option<Uuid>,

    /// When this token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When this token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When this token was revoked (None = not revoked).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revoked_at: Option<OffsetDateTime>,
}

impl AccessTokenRecord {
    /// Returns `true` if this token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if this token has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Returns `true` if this token is valid (not expired and not revoked).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.is_revoked()
    }

    /// Returns the remaining lifetime in whole seconds, zero if expired.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        let remaining = (self.expires_at - OffsetDateTime::now_utc()).whole_seconds();
        remaining.max(0)
    }
}

// =============================================================================
// Refresh Token Record
// =============================================================================

/// A stored refresh token.
///
/// Refresh tokens rotate on use: presenting one revokes it and issues a
/// replacement that keeps the original absolute expiry, so a grant never
/// outlives the lifetime it was first given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Unique identifier for this record.
    pub id: Uuid,

    /// SHA-256 hash of the token value.
    pub token_hash: String,

    /// Client this token was issued to.
    pub client_id: String,

    /// Subject that authorized this token.
    pub subject: String,

    /// Which principal population the subject belongs to.
    pub subject_kind: PrincipalKind,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// When this token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When this token expires. Carried over unchanged when the token is
    /// rotated.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When this token was revoked (None = not revoked).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revoked_at: Option<OffsetDateTime>,
}

impl RefreshTokenRecord {
    /// Returns `true` if this token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if this token has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Returns `true` if this token is valid (not expired and not revoked).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.is_revoked()
    }
}

// =============================================================================
// Tests
// =============================================================================

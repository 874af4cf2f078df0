//! Token storage trait.
//!
//! Access and refresh tokens share one store because revocation crosses
//! the boundary between them: revoking a refresh token also revokes the
//! access tokens issued alongside it.
//!
//! # Security Considerations
//!
//! - Tokens are stored as SHA-256 hashes only
//! - Revocation must be atomic and immediate
//! - Expired tokens should be cleaned up periodically

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::{AccessTokenRecord, RefreshTokenRecord};

/// Storage trait for opaque access and refresh tokens.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Stores a new access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be stored.
    async fn store_access(&self, record: &AccessTokenRecord) -> AuthResult<()>;

    /// Stores a new refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be stored.
    async fn store_refresh(&self, record: &RefreshTokenRecord) -> AuthResult<()>;

    /// Finds an access token by its hash.
    ///
    /// Returns tokens regardless of expiration and revocation status;
    /// callers check `is_valid()` before trusting one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_access_by_hash(&self, token_hash: &str)
    -> AuthResult<Option<AccessTokenRecord>>;

    /// Finds a refresh token by its hash.
    ///
    /// Returns tokens regardless of expiration and revocation status;
    /// callers check `is_valid()` before trusting one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_refresh_by_hash(
        &self,
        token_hash: &str,
    ) -> AuthResult<Option<RefreshTokenRecord>>;

    /// Revokes an access token by hash.
    ///
    /// Sets `revoked_at` to the current time. Revoking an unknown or
    /// already-revoked token is not an error.
    ///
    /// # Returns
    ///
    /// Returns `true` if a live token was revoked, `false` if nothing
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_access(&self, token_hash: &str) -> AuthResult<bool>;

    /// Revokes a refresh token by hash.
    ///
    /// Sets `revoked_at` to the current time. Revoking an unknown or
    /// already-revoked token is not an error.
    ///
    /// # Returns
    ///
    /// Returns `true` if a live token was revoked, `false` if nothing
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_refresh(&self, token_hash: &str) -> AuthResult<bool>;

    /// Revokes every access token issued alongside the given refresh token.
    ///
    /// # Returns
    ///
    /// Returns the number of access tokens revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_access_by_refresh_id(&self, refresh_token_id: Uuid) -> AuthResult<u64>;

    /// Deletes expired tokens of both kinds.
    ///
    /// Called periodically by the cleanup task to bound storage growth.
    ///
    /// # Returns
    ///
    /// Returns the number of tokens deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}

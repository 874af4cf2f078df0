//! Authorization code storage trait.
//!
//! The single contract that matters here is atomic consumption: a stored
//! code must be redeemable at most once, no matter how many token requests
//! race on it.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::AuthorizationCodeRecord;

/// Storage trait for authorization codes.
///
/// # Concurrency
///
/// `consume` removes the code and returns its record in one atomic step.
/// When N requests present the same code concurrently, exactly one
/// receives `Some(record)`; the rest receive `None`. Implementations must
/// not split the lookup and the removal.
#[async_trait]
pub trait AuthorizationCodeStorage: Send + Sync {
    /// Stores a newly issued authorization code.
    ///
    /// # Errors
    ///
    /// Returns an error if a record with the same code already exists or
    /// the storage operation fails.
    async fn store(&self, record: &AuthorizationCodeRecord) -> AuthResult<()>;

    /// Atomically consumes an authorization code.
    ///
    /// Removes the code and returns its record in the same step. Returns
    /// `None` if the code does not exist or was already consumed.
    ///
    /// Expiry is not checked here: the record is returned even when
    /// expired, and callers reject it after inspecting `expires_at`.
    /// Removing expired codes on consumption keeps replay handling in one
    /// place.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn consume(&self, code: &str) -> AuthResult<Option<AuthorizationCodeRecord>>;

    /// Deletes expired codes that were never consumed.
    ///
    /// Called periodically by the cleanup task to bound storage growth.
    ///
    /// # Returns
    ///
    /// Returns the number of codes deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}

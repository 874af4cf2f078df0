//! Storage traits for the authorization server.
//!
//! These traits define the persistence interface consumed by the OAuth and
//! token services. Implementations live in backend crates; the in-memory
//! backend is `signet-auth-memory`.

use std::future::Future;
use std::time::Duration;

use crate::AuthResult;
use crate::error::AuthError;

pub mod client;
pub mod code;
pub mod directory;
pub mod token;

pub use client::ClientStorage;
pub use code::AuthorizationCodeStorage;
pub use directory::UserDirectory;
pub use token::TokenStorage;

/// Runs a storage operation under a deadline.
///
/// Every call into a backend goes through here so a hung store surfaces
/// as a fast `Storage` failure instead of stalling the request.
pub async fn with_timeout<T>(
    limit: Duration,
    operation: impl Future<Output = AuthResult<T>>,
) -> AuthResult<T> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::storage("Storage operation timed out")),
    }
}

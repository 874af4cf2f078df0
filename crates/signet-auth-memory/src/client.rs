//! In-memory client registry.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use signet_auth::AuthResult;
use signet_auth::error::AuthError;
use signet_auth::storage::ClientStorage;
use signet_auth::types::Client;

/// Hashes a client secret for storage using Argon2id.
///
/// Produces a PHC-formatted string with a fresh random salt, suitable
/// for [`Client::client_secret`].
///
/// # Errors
///
/// Returns `Internal` if hashing fails.
pub fn hash_client_secret(secret: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AuthError::internal(format!("Client secret hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Client registry backed by a `DashMap`, keyed by `client_id`.
#[derive(Debug, Default)]
pub struct MemoryClientStorage {
    clients: DashMap<String, Client>,
}

impl MemoryClientStorage {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if no clients are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ClientStorage for MemoryClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.clients.get(client_id).map(|entry| entry.clone()))
    }

    async fn create(&self, client: &Client) -> AuthResult<Client> {
        client
            .validate()
            .map_err(|e| AuthError::invalid_request(e.to_string()))?;

        match self.clients.entry(client.client_id.clone()) {
            Entry::Occupied(_) => Err(AuthError::invalid_request(format!(
                "Client '{}' is already registered",
                client.client_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(client.clone());
                Ok(client.clone())
            }
        }
    }

    async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool> {
        let client = self
            .clients
            .get(client_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| AuthError::invalid_client("Unknown client"))?;

        let Some(stored) = client.client_secret.as_deref() else {
            return Ok(false);
        };

        let parsed = PasswordHash::new(stored)
            .map_err(|e| AuthError::internal(format!("Stored client secret is unreadable: {e}")))?;
        Ok(Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok())
    }
}

//! In-memory authorization code store.
//!
//! Single-use consumption rides on `DashMap::remove`: the lookup and the
//! removal are one operation, so racing token requests can never redeem
//! the same code twice.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use signet_auth::AuthResult;
use signet_auth::error::AuthError;
use signet_auth::storage::AuthorizationCodeStorage;
use signet_auth::types::AuthorizationCodeRecord;

/// Authorization code store backed by a `DashMap`, keyed by code value.
#[derive(Debug, Default)]
pub struct MemoryAuthorizationCodeStorage {
    codes: DashMap<String, AuthorizationCodeRecord>,
}

impl MemoryAuthorizationCodeStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            codes: DashMap::new(),
        }
    }

    /// Number of codes currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns `true` if no codes are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[async_trait]
impl AuthorizationCodeStorage for MemoryAuthorizationCodeStorage {
    async fn store(&self, record: &AuthorizationCodeRecord) -> AuthResult<()> {
        match self.codes.entry(record.code.clone()) {
            Entry::Occupied(_) => Err(AuthError::internal("Authorization code collision")),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn consume(&self, code: &str) -> AuthResult<Option<AuthorizationCodeRecord>> {
        Ok(self.codes.remove(code).map(|(_, record)| record))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let expired: Vec<String> = self
            .codes
            .iter()
            .filter(|entry| entry.is_expired())
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for code in expired {
            if self.codes.remove(&code).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

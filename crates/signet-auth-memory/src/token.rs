//! In-memory token store.
//!
//! Access and refresh tokens live in separate maps, both keyed by token
//! hash. Revocation marks records in place; revoked records stay until
//! they expire so later lookups can still answer "revoked" rather than
//! "unknown".

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use signet_auth::AuthResult;
use signet_auth::storage::TokenStorage;
use signet_auth::types::{AccessTokenRecord, RefreshTokenRecord};

/// Token store backed by two `DashMap`s, keyed by SHA-256 token hash.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    access: DashMap<String, AccessTokenRecord>,
    refresh: DashMap<String, RefreshTokenRecord>,
}

impl MemoryTokenStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            access: DashMap::new(),
            refresh: DashMap::new(),
        }
    }

    /// Total number of stored tokens, both kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.access.len() + self.refresh.len()
    }

    /// Returns `true` if no tokens are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access.is_empty() && self.refresh.is_empty()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn store_access(&self, record: &AccessTokenRecord) -> AuthResult<()> {
        self.access.insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn store_refresh(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
        self.refresh.insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn find_access_by_hash(
        &self,
        token_hash: &str,
    ) -> AuthResult<Option<AccessTokenRecord>> {
        Ok(self.access.get(token_hash).map(|entry| entry.clone()))
    }

    async fn find_refresh_by_hash(
        &self,
        token_hash: &str,
    ) -> AuthResult<Option<RefreshTokenRecord>> {
        Ok(self.refresh.get(token_hash).map(|entry| entry.clone()))
    }

    async fn revoke_access(&self, token_hash: &str) -> AuthResult<bool> {
        match self.access.get_mut(token_hash) {
            Some(mut record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(OffsetDateTime::now_utc());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_refresh(&self, token_hash: &str) -> AuthResult<bool> {
        match self.refresh.get_mut(token_hash) {
            Some(mut record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(OffsetDateTime::now_utc());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_access_by_refresh_id(&self, refresh_token_id: Uuid) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut revoked = 0;

        for mut entry in self.access.iter_mut() {
            if entry.refresh_token_id == Some(refresh_token_id) && entry.revoked_at.is_none() {
                entry.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let expired_access: Vec<String> = self
            .access
            .iter()
            .filter(|entry| entry.is_expired())
            .map(|entry| entry.key().clone())
            .collect();
        let expired_refresh: Vec<String> = self
            .refresh
            .iter()
            .filter(|entry| entry.is_expired())
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for hash in expired_access {
            if self.access.remove(&hash).is_some() {
                removed += 1;
            }
        }
        for hash in expired_refresh {
            if self.refresh.remove(&hash).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

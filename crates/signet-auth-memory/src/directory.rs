//! In-memory principal directory.
//!
//! Admins and users live in separate maps so an identifier from one
//! population can never resolve in the other.

use async_trait::async_trait;
use dashmap::DashMap;

use signet_auth::AuthResult;
use signet_auth::storage::UserDirectory;
use signet_auth::types::{AdminPrincipal, UserPrincipal};

/// Principal directory backed by two `DashMap`s, keyed by principal id.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    admins: DashMap<String, AdminPrincipal>,
    users: DashMap<String, UserPrincipal>,
}

impl MemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            admins: DashMap::new(),
            users: DashMap::new(),
        }
    }

    /// Adds or replaces an admin account.
    pub fn insert_admin(&self, admin: AdminPrincipal) {
        self.admins.insert(admin.id.clone(), admin);
    }

    /// Adds or replaces a user account.
    pub fn insert_user(&self, user: UserPrincipal) {
        self.users.insert(user.id.clone(), user);
    }

    /// Removes an admin account. Returns `true` if one existed.
    pub fn remove_admin(&self, id: &str) -> bool {
        self.admins.remove(id).is_some()
    }

    /// Removes a user account. Returns `true` if one existed.
    pub fn remove_user(&self, id: &str) -> bool {
        self.users.remove(id).is_some()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_admin(&self, id: &str) -> AuthResult<Option<AdminPrincipal>> {
        Ok(self.admins.get(id).map(|entry| entry.clone()))
    }

    async fn find_user(&self, id: &str) -> AuthResult<Option<UserPrincipal>> {
        Ok(self.users.get(id).map(|entry| entry.clone()))
    }
}

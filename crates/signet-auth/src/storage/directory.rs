//! Principal directory trait.
//!
//! The directory is where the server looks up account profiles for the
//! two principal populations. It is read-only from the authorization
//! server's point of view; account management happens elsewhere.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{AdminPrincipal, Principal, PrincipalKind, UserPrincipal};

/// Read access to admin and user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds an admin account by its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_admin(&self, id: &str) -> AuthResult<Option<AdminPrincipal>>;

    /// Finds a user account by its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_user(&self, id: &str) -> AuthResult<Option<UserPrincipal>>;

    /// Resolves a principal given its population and identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_principal(
        &self,
        kind: PrincipalKind,
        id: &str,
    ) -> AuthResult<Option<Principal>> {
        match kind {
            PrincipalKind::Admin => Ok(self.find_admin(id).await?.map(Principal::Admin)),
            PrincipalKind::User => Ok(self.find_user(id).await?.map(Principal::User)),
        }
    }
}

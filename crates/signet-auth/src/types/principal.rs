//! Authenticated principal types.
//!
//! Two kinds of principal can authenticate against the server: staff
//! administrators and end users. They carry different profile claims, so
//! they are modeled as distinct structs behind the [`Principal`] enum
//! rather than a single struct with a pile of optional fields.

use serde::{Deserialize, Serialize};

// =============================================================================
// Principal Kind
// =============================================================================

/// Discriminates the two principal populations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// Staff administrator.
    Admin,
    /// End user.
    User,
}

impl PrincipalKind {
    /// Returns the kind as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Admin Principal
// =============================================================================

/// A staff administrator account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminPrincipal {
    /// Stable account identifier, used as the token subject.
    pub id: String,

    /// Login name.
    pub username: String,

    /// Display name.
    pub name: String,

    /// Contact email.
    pub email: String,

    /// Whether this admin holds the super-admin role.
    pub is_super_admin: bool,

    /// Granted permission strings. `"*"` grants everything.
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl AdminPrincipal {
    /// Checks whether this admin holds the given permission.
    ///
    /// Super admins and the `"*"` wildcard pass any check. Holding the
    /// admin role by itself grants nothing.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_super_admin
            || self.permissions.iter().any(|p| p == "*")
            || self.permissions.iter().any(|p| p == permission)
    }
}

// =============================================================================
// User Principal
// =============================================================================

/// An end-user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPrincipal {
    /// Stable account identifier, used as the token subject.
    pub id: String,

    /// Login name.
    pub username: String,

    /// Given name.
    pub given_name: String,

    /// Family name.
    pub family_name: String,

    /// Contact email.
    pub email: String,

    /// Whether the email address has been verified.
    pub email_verified: bool,

    /// Granted permission strings. `"*"` grants everything.
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl UserPrincipal {
    /// Returns the full display name.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }

    /// Checks whether this user holds the given permission.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == "*")
            || self.permissions.iter().any(|p| p == permission)
    }
}

// =============================================================================
// Principal
// =============================================================================

/// An authenticated principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    /// A staff administrator.
    Admin(AdminPrincipal),
    /// An end user.
    User(UserPrincipal),
}

impl Principal {
    /// Returns the stable account identifier (the token subject).
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Admin(a) => &a.id,
            Self::User(u) => &u.id,
        }
    }

    /// Returns which population this principal belongs to.
    #[must_use]
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Self::Admin(_) => PrincipalKind::Admin,
            Self::User(_) => PrincipalKind::User,
        }
    }

    /// Returns the login name.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Admin(a) => &a.username,
            Self::User(u) => &u.username,
        }
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Admin(a) => a.name.clone(),
            Self::User(u) => u.display_name(),
        }
    }

    /// Returns the contact email.
    #[must_use]
    pub fn email(&self) -> &str {
        match self {
            Self::Admin(a) => &a.email,
            Self::User(u) => &u.email,
        }
    }

    /// Returns `true` for admin principals.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin(_))
    }

    /// Checks whether this principal holds the given permission.
    ///
    /// Permission grants are explicit: admins are not implicitly granted
    /// every permission, only super admins and `"*"` holders are.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        match self {
            Self::Admin(a) => a.has_permission(permission),
            Self::User(u) => u.has_permission(permission),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Access policy for the authorization endpoint.
//!
//! Deciding that a browser session is valid is not the same as deciding
//! the principal may mint tokens. The policy makes that second step
//! explicit and configurable instead of implied: deployments either keep
//! the permissive mode (any signed-in principal may authorize, logged
//! loudly at startup) or require a real permission grant.

use serde::{Deserialize, Serialize};

use crate::types::Principal;

/// Permission consulted by the authorization endpoint.
pub const PERMISSION_AUTHORIZE: &str = "oauth:authorize";

// =============================================================================
// Access Policy
// =============================================================================

/// How authenticated principals are authorized for protected operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// Every authenticated principal passes every check.
    ///
    /// This is the permissive default. Deployments that grant
    /// per-principal permissions should switch to `RequirePermissions`.
    AllowAllAuthenticated,

    /// Principals must hold the permission named by the operation.
    RequirePermissions,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::AllowAllAuthenticated
    }
}

impl AccessPolicy {
    /// Evaluates whether `principal` may perform the operation guarded by
    /// `required`.
    #[must_use]
    pub fn evaluate(&self, principal: &Principal, required: &str) -> AccessDecision {
        match self {
            Self::AllowAllAuthenticated => AccessDecision::Allow,
            Self::RequirePermissions => {
                if principal.has_permission(required) {
                    AccessDecision::Allow
                } else {
                    AccessDecision::Deny(DenyReason::missing_permission(required))
                }
            }
        }
    }

    /// Returns `true` for the mode that skips permission checks.
    #[must_use]
    pub fn is_permissive(&self) -> bool {
        matches!(self, Self::AllowAllAuthenticated)
    }

    /// Returns the policy mode as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllowAllAuthenticated => "allow_all_authenticated",
            Self::RequirePermissions => "require_permissions",
        }
    }
}

impl std::fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Access Decision
// =============================================================================

/// Result of a policy evaluation.
#[derive(Debug, Clone)]
pub enum AccessDecision {
    /// Access is granted.
    Allow,
    /// Access is denied with a reason.
    Deny(DenyReason),
}

impl AccessDecision {
    /// Returns `true` if access was granted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Get the deny reason if access was denied.
    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Allow => None,
            Self::Deny(reason) => Some(reason),
        }
    }
}

/// Reason for access denial.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyReason {
    /// Error code for programmatic handling.
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

impl DenyReason {
    /// Denial for a principal lacking the required permission.
    #[must_use]
    pub fn missing_permission(required: &str) -> Self {
        Self {
            code: "insufficient-permissions".to_string(),
            message: format!("Principal does not hold the required permission: {required}"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AdminPrincipal, UserPrincipal};

    fn make_user(permissions: Vec<String>) -> Principal {
        Principal::User(UserPrincipal {
            id: "user-1".to_string(),
            username: "alice".to_string(),
            given_name: "Alice".to_string(),
            family_name: "Smith".to_string(),
            email: "alice@example.com".to_string(),
            email_verified: true,
            permissions,
        })
    }

    fn make_super_admin() -> Principal {
        Principal::Admin(AdminPrincipal {
            id: "admin-1".to_string(),
            username: "root".to_string(),
            name: "Root".to_string(),
            email: "root@example.com".to_string(),
            is_super_admin: true,
            permissions: vec![],
        })
    }

    #[test]
    fn test_permissive_mode_allows_everyone() {
        let policy = AccessPolicy::AllowAllAuthenticated;
        let principal = make_user(vec![]);

        assert!(policy.evaluate(&principal, PERMISSION_AUTHORIZE).is_allowed());
        assert!(policy.is_permissive());
    }

    #[test]
    fn test_require_permissions_denies_without_grant() {
        let policy = AccessPolicy::RequirePermissions;
        let principal = make_user(vec![]);

        let decision = policy.evaluate(&principal, PERMISSION_AUTHORIZE);
        let reason = decision.deny_reason().unwrap();
        assert_eq!(reason.code, "insufficient-permissions");
        assert!(reason.message.contains("oauth:authorize"));
    }

    #[test]
    fn test_require_permissions_allows_exact_grant() {
        let policy = AccessPolicy::RequirePermissions;
        let principal = make_user(vec![PERMISSION_AUTHORIZE.to_string()]);

        assert!(policy.evaluate(&principal, PERMISSION_AUTHORIZE).is_allowed());
        assert!(!policy.is_permissive());
    }

    #[test]
    fn test_require_permissions_allows_wildcard() {
        let policy = AccessPolicy::RequirePermissions;
        let principal = make_user(vec!["*".to_string()]);

        assert!(policy.evaluate(&principal, PERMISSION_AUTHORIZE).is_allowed());
    }

    #[test]
    fn test_super_admin_passes_permission_checks() {
        let policy = AccessPolicy::RequirePermissions;

        assert!(
            policy
                .evaluate(&make_super_admin(), PERMISSION_AUTHORIZE)
                .is_allowed()
        );
    }

    #[test]
    fn test_policy_mode_serde() {
        let policy: AccessPolicy = serde_json::from_str("\"require_permissions\"").unwrap();
        assert_eq!(policy, AccessPolicy::RequirePermissions);

        let json = serde_json::to_string(&AccessPolicy::AllowAllAuthenticated).unwrap();
        assert_eq!(json, "\"allow_all_authenticated\"");
        assert_eq!(AccessPolicy::default(), AccessPolicy::AllowAllAuthenticated);
    }
}

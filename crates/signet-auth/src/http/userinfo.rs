//! UserInfo endpoint.
//!
//! `GET|POST /userinfo` resolves a bearer access token to its
//! principal and answers with OIDC claims. Admins and users produce
//! different claim sets; both carry an `is_admin` marker. Token
//! problems answer `401` with a `WWW-Authenticate` challenge.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::audit::{ACTOR_ANONYMOUS, AuditAction, AuditEvent, RequestContext, target};
use crate::error::AuthError;
use crate::storage::with_timeout;
use crate::types::Principal;

use super::AuthState;

pub async fn userinfo_handler(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    let context = RequestContext::from_headers(&headers);

    let token = match bearer_token(&headers) {
        Some(token) => token,
        None => {
            let e = AuthError::invalid_token("Missing access token");
            audit_failure(&state, ACTOR_ANONYMOUS, &e, &context);
            return e.into_response();
        }
    };

    let record = match state.token_service.validate_access_token(token).await {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected userinfo bearer token");
            audit_failure(&state, ACTOR_ANONYMOUS, &e, &context);
            return e.into_response();
        }
    };

    let principal = match with_timeout(
        state.storage_timeout,
        state
            .directory
            .find_principal(record.subject_kind, &record.subject),
    )
    .await
    {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            // The token outlived its subject. Treat it like any other
            // dead token rather than leaking the distinction.
            let e = AuthError::invalid_token("Token subject no longer exists");
            audit_failure(&state, &record.subject, &e, &context);
            return e.into_response();
        }
        Err(e) => {
            audit_failure(&state, &record.subject, &e, &context);
            return e.into_response();
        }
    };

    state.audit.emit(
        AuditEvent::new(principal.id(), AuditAction::Access, target::USERINFO)
            .with_metadata(json!({
                "clientId": record.client_id,
                "action": "userinfo_access_success",
            }))
            .with_context(&context),
    );

    Json(claims_for(&principal)).into_response()
}

/// Pulls the bearer token out of the `Authorization` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Builds the claim set for a principal.
fn claims_for(principal: &Principal) -> serde_json::Value {
    match principal {
        Principal::Admin(admin) => json!({
            "sub": admin.id,
            "name": admin.name,
            "email": admin.email,
            "email_verified": true,
            "preferred_username": admin.username,
            "is_admin": true,
            "is_super_admin": admin.is_super_admin,
        }),
        Principal::User(user) => json!({
            "sub": user.id,
            "name": user.display_name(),
            "given_name": user.given_name,
            "family_name": user.family_name,
            "email": user.email,
            "email_verified": user.email_verified,
            "preferred_username": user.username,
            "is_admin": false,
        }),
    }
}

fn audit_failure(state: &AuthState, actor: &str, error: &AuthError, context: &RequestContext) {
    state.audit.emit(
        AuditEvent::new(actor, AuditAction::Failed, target::USERINFO)
            .with_metadata(json!({
                "error": error.to_string(),
                "action": "userinfo_access_failed",
            }))
            .with_context(context),
    );
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use crate::types::{AdminPrincipal, UserPrincipal};

    use super::*;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        let headers = headers_with_auth("Bearer abc123");
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_missing_header() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_bearer_token_wrong_scheme() {
        let headers = headers_with_auth("Basic dXNlcjpwYXNz");
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_bearer_token_empty_value() {
        let headers = headers_with_auth("Bearer ");
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_admin_claims() {
        let principal = Principal::Admin(AdminPrincipal {
            id: "admin-1".to_string(),
            username: "root".to_string(),
            name: "Site Admin".to_string(),
            email: "admin@example.com".to_string(),
            is_super_admin: true,
            permissions: vec!["*".to_string()],
        });

        let claims = claims_for(&principal);
        assert_eq!(claims["sub"], "admin-1");
        assert_eq!(claims["preferred_username"], "root");
        assert_eq!(claims["email_verified"], true);
        assert_eq!(claims["is_admin"], true);
        assert_eq!(claims["is_super_admin"], true);
        assert!(claims.get("given_name").is_none());
    }

    #[test]
    fn test_user_claims() {
        let principal = Principal::User(UserPrincipal {
            id: "user-1".to_string(),
            username: "ada".to_string(),
            given_name: "Ada".to_string(),
            family_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            email_verified: false,
            permissions: Vec::new(),
        });

        let claims = claims_for(&principal);
        assert_eq!(claims["sub"], "user-1");
        assert_eq!(claims["name"], "Ada Lovelace");
        assert_eq!(claims["given_name"], "Ada");
        assert_eq!(claims["family_name"], "Lovelace");
        assert_eq!(claims["email_verified"], false);
        assert_eq!(claims["is_admin"], false);
        assert!(claims.get("is_super_admin").is_none());
    }
}

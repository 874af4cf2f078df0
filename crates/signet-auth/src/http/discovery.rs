//! OpenID Connect discovery endpoint.
//!
//! `GET /.well-known/openid-configuration` serves the provider
//! metadata document. The document is static per deployment, so it is
//! served with a one hour public cache lifetime.

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use serde_json::json;

use super::AuthState;

pub async fn discovery_handler(State(state): State<AuthState>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Json(discovery_document(&state.issuer)),
    )
}

/// Builds the provider metadata document for an issuer base URL.
///
/// The response-type and grant-type menus advertise the classic full
/// set for compatibility with off-the-shelf OIDC clients, even though
/// `/authorize` itself only accepts `response_type=code`.
fn discovery_document(issuer: &str) -> serde_json::Value {
    let issuer = issuer.trim_end_matches('/');

    json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}/authorize"),
        "token_endpoint": format!("{issuer}/token"),
        "userinfo_endpoint": format!("{issuer}/userinfo"),
        "jwks_uri": format!("{issuer}/.well-known/jwks.json"),
        "revocation_endpoint": format!("{issuer}/revoke"),
        "end_session_endpoint": format!("{issuer}/logout"),
        "response_types_supported": [
            "code",
            "token",
            "id_token",
            "code token",
            "code id_token",
            "token id_token",
            "code token id_token",
        ],
        "grant_types_supported": ["authorization_code", "implicit", "refresh_token"],
        "subject_types_supported": ["public"],
        "id_token_signing_alg_values_supported": ["RS256"],
        "scopes_supported": ["openid", "profile", "email"],
        "token_endpoint_auth_methods_supported": [
            "client_secret_basic",
            "client_secret_post",
            "none",
        ],
        "code_challenge_methods_supported": ["plain", "S256"],
        "claims_supported": [
            "sub",
            "name",
            "given_name",
            "family_name",
            "email",
            "email_verified",
            "preferred_username",
        ],
    })
}

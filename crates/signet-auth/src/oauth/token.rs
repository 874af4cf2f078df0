//! Token endpoint wire types.
//!
//! Request parsing for the OAuth 2.0 token endpoint. Different fields are
//! required depending on `grant_type`:
//!
//! - `authorization_code`: code, redirect_uri, client_id, code_verifier
//! - `refresh_token`: refresh_token, (optional) scope
//!
//! Client credentials may also arrive in the body (`client_secret_post`);
//! the HTTP Basic header variant never touches this struct.

use serde::{Deserialize, Serialize};

/// Token request parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type, `authorization_code` or `refresh_token`.
    ///
    /// Defaults to empty when absent so the endpoint can answer with a
    /// proper `invalid_request` body instead of a form rejection.
    #[serde(default)]
    pub grant_type: String,

    /// Authorization code (authorization_code grant).
    #[serde(default)]
    pub code: Option<String>,

    /// Redirect URI, must byte-match the authorization request.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// PKCE code verifier (authorization_code grant).
    #[serde(default)]
    pub code_verifier: Option<String>,

    /// Client ID (public clients or client_secret_post).
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret (client_secret_post authentication).
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Refresh token (refresh_token grant).
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Requested scope (refresh_token grant; subset of the original).
    #[serde(default)]
    pub scope: Option<String>,
}

/// Successful token response.
///
/// # Example Response
///
/// ```json
/// {
///   "access_token": "2YotnFZFEjr1zCsicMWpAA",
///   "token_type": "Bearer",
///   "expires_in": 3600,
///   "scope": "openid profile",
///   "refresh_token": "tGzv3JOkF0XG5Qx2TlKWIA",
///   "id_token": "eyJhbG..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    /// The opaque access token.
    pub access_token: String,

    /// Token type, always "Bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// Refresh token (when the client is registered for the grant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// ID token (when `openid` scope was granted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// Creates a new token response with required fields.
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scope: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            refresh_token: None,
            id_token: None,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }

    /// Sets the ID token.
    #[must_use]
    pub fn with_id_token(mut self, token: String) -> Self {
        self.id_token = Some(token);
        self
    }
}

/// Revocation request parameters (RFC 7009).
#[derive(Debug, Clone, Deserialize)]
pub struct RevocationRequest {
    /// The token to revoke (access or refresh).
    ///
    /// Defaults to empty when absent; the endpoint turns that into an
    /// `invalid_request` answer rather than a form rejection.
    #[serde(default)]
    pub token: String,

    /// Optional hint, `access_token` or `refresh_token`. Unknown values
    /// are ignored and the search extends to both kinds.
    #[serde(default)]
    pub token_type_hint: Option<String>,

    /// Client ID (public clients or client_secret_post).
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret (client_secret_post authentication).
    #[serde(default)]
    pub client_secret: Option<String>,
}

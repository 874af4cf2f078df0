//! Error types for the authorization server.
//!
//! All client-facing failures map onto the OAuth 2.0 error vocabulary
//! (RFC 6749 section 5.2) via [`AuthError::oauth_error_code`] and an HTTP
//! status via [`AuthError::http_status`]. Internal failures never leak
//! stack traces; they surface as `server_error`.

use axum::Json;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors that can occur during authentication and authorization.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request is missing a required parameter or is otherwise malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of what was malformed.
        message: String,
    },

    /// Unknown client, inactive client, or failed client authentication.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of the failure.
        message: String,
    },

    /// The redirect URI is not registered for the client.
    #[error("Invalid redirect URI: {message}")]
    InvalidRedirectUri {
        /// Description of the mismatch.
        message: String,
    },

    /// The response type is not supported (only `code` is).
    #[error("Unsupported response type: {response_type}")]
    UnsupportedResponseType {
        /// The response type that was requested.
        response_type: String,
    },

    /// The grant type is not supported.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The grant type that was requested.
        grant_type: String,
    },

    /// Expired, consumed, or mismatched authorization code; or an invalid
    /// refresh token.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of the failure.
        message: String,
    },

    /// The requested scope is invalid or exceeds what was granted.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of the failure.
        message: String,
    },

    /// Malformed or unknown access token.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of the failure.
        message: String,
    },

    /// The token has expired.
    #[error("Token has expired")]
    TokenExpired,

    /// The token has been revoked.
    #[error("Token has been revoked")]
    TokenRevoked,

    /// PKCE code verifier did not match the stored challenge.
    #[error("PKCE verification failed")]
    PkceVerificationFailed,

    /// The principal is authenticated but not permitted to perform the
    /// operation.
    #[error("Access denied: {message}")]
    AccessDenied {
        /// Description of the denial.
        message: String,
    },

    /// A downstream store failed or timed out.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },

    /// The server is misconfigured.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// Unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl AuthError {
    /// Creates an `InvalidRequest` error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates an `InvalidClient` error.
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates an `InvalidRedirectUri` error.
    pub fn invalid_redirect_uri(message: impl Into<String>) -> Self {
        Self::InvalidRedirectUri {
            message: message.into(),
        }
    }

    /// Creates an `UnsupportedResponseType` error.
    pub fn unsupported_response_type(response_type: impl Into<String>) -> Self {
        Self::UnsupportedResponseType {
            response_type: response_type.into(),
        }
    }

    /// Creates an `UnsupportedGrantType` error.
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates an `InvalidGrant` error.
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates an `InvalidScope` error.
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates an `InvalidToken` error.
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates an `AccessDenied` error.
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Creates a `Storage` error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is caused by the client request.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this error is a server-side failure.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if this error relates to token validity.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken { .. } | Self::TokenExpired | Self::TokenRevoked
        )
    }

    /// Returns the error category for logging and metrics.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest { .. }
            | Self::UnsupportedResponseType { .. }
            | Self::UnsupportedGrantType { .. } => ErrorCategory::Request,
            Self::InvalidClient { .. } | Self::InvalidRedirectUri { .. } => ErrorCategory::Client,
            Self::InvalidGrant { .. } | Self::PkceVerificationFailed | Self::InvalidScope { .. } => {
                ErrorCategory::Grant
            }
            Self::InvalidToken { .. } | Self::TokenExpired | Self::TokenRevoked => {
                ErrorCategory::Token
            }
            Self::AccessDenied { .. } => ErrorCategory::Authorization,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                ErrorCategory::Server
            }
        }
    }

    /// Returns the OAuth 2.0 error code for this error (RFC 6749 section 5.2).
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidRedirectUri { .. } => "invalid_redirect_uri",
            Self::UnsupportedResponseType { .. } => "unsupported_response_type",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::InvalidGrant { .. } | Self::PkceVerificationFailed => "invalid_grant",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::InvalidToken { .. } | Self::TokenExpired | Self::TokenRevoked => "invalid_token",
            Self::AccessDenied { .. } => "access_denied",
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "server_error"
            }
        }
    }

    /// Returns the HTTP status code for this error.
    ///
    /// `invalid_client` is 401 per RFC 6749 section 5.2; storage failures
    /// are 503 so callers can distinguish "try again" from "broken".
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. }
            | Self::InvalidRedirectUri { .. }
            | Self::UnsupportedResponseType { .. }
            | Self::UnsupportedGrantType { .. }
            | Self::InvalidGrant { .. }
            | Self::PkceVerificationFailed
            | Self::InvalidScope { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidClient { .. }
            | Self::InvalidToken { .. }
            | Self::TokenExpired
            | Self::TokenRevoked => StatusCode::UNAUTHORIZED,
            Self::AccessDenied { .. } => StatusCode::FORBIDDEN,
            Self::Storage { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the description exposed to clients.
    ///
    /// Server-side failures are reported with a generic description so
    /// internal details never reach the wire.
    #[must_use]
    pub fn public_description(&self) -> String {
        if self.is_server_error() {
            "The authorization server encountered an internal error".to_string()
        } else {
            self.to_string()
        }
    }
}

/// High-level error categories for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or unsupported request.
    Request,
    /// Client identification or redirect URI failure.
    Client,
    /// Authorization code or refresh grant failure.
    Grant,
    /// Access token validity failure.
    Token,
    /// Authenticated but not permitted.
    Authorization,
    /// Server-side failure.
    Server,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Request => "request",
            Self::Client => "client",
            Self::Grant => "grant",
            Self::Token => "token",
            Self::Authorization => "authorization",
            Self::Server => "server",
        };
        write!(f, "{s}")
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let error_code = self.oauth_error_code();
        let description = self.public_description();

        if self.is_server_error() {
            tracing::error!(error = %self, category = %self.category(), "Request failed");
        }

        let body = json!({
            "error": error_code,
            "error_description": description,
        });

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(error_code, &description);
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(body)).into_response()
    }
}

/// Builds the `WWW-Authenticate` header value for 401 responses (RFC 6750).
fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped = description.replace('"', "\\\"");
    format!("Bearer realm=\"signet\", error=\"{error}\", error_description=\"{escaped}\"")
}

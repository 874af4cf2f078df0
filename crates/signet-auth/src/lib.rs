//! # signet-auth
//!
//! OAuth 2.0 / OpenID Connect authorization server core.
//!
//! This crate provides:
//! - Authorization code flow with PKCE (`plain` and `S256`)
//! - Opaque access and refresh tokens with rotation on refresh
//! - RS256-signed OIDC ID tokens and the matching JWKS document
//! - Signed-cookie browser sessions bridging login to authorization
//! - Access policy evaluation at the authorization endpoint
//! - A non-blocking audit event pipeline
//!
//! ## Modules
//!
//! - [`config`] - Server configuration with validation
//! - [`oauth`] - Protocol logic: authorization requests, PKCE, client auth
//! - [`token`] - Token issuance, validation, revocation, ID token signing
//! - [`session`] - Session cookies and the login redirect
//! - [`policy`] - Access policy applied before code issuance
//! - [`audit`] - Audit events and the fire-and-forget emitter
//! - [`storage`] - Persistence traits implemented by backend crates
//! - [`http`] - Axum handlers for the OAuth/OIDC endpoints
//!
//! Storage is pluggable: the handlers and services only see the traits
//! in [`storage`]. The in-memory backend lives in `signet-auth-memory`.

pub mod audit;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod policy;
pub mod session;
pub mod storage;
pub mod token;
pub mod types;

pub use audit::{AuditAction, AuditEmitter, AuditEvent, AuditSink, RequestContext};
pub use config::{AuthServerConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use http::{AuthState, router};
pub use oauth::{
    AuthorizationRequest, AuthorizeService, PkceChallenge, PkceChallengeMethod, RevocationRequest,
    TokenRequest, TokenResponse, authenticate_client,
};
pub use policy::{AccessDecision, AccessPolicy, DenyReason, PERMISSION_AUTHORIZE};
pub use session::{SessionBridge, SessionClaims};
pub use storage::{
    AuthorizationCodeStorage, ClientStorage, TokenStorage, UserDirectory, with_timeout,
};
pub use token::{IdTokenSigner, Jwk, Jwks, SigningKeyPair, TokenService};
pub use types::{
    AccessTokenRecord, AdminPrincipal, AuthorizationCodeRecord, Client, GrantType, Principal,
    PrincipalKind, RefreshTokenRecord, UserPrincipal,
};

/// Type alias for authorization server results.
pub type AuthResult<T> = Result<T, AuthError>;

//! OAuth 2.0 protocol logic: authorization requests, PKCE, client
//! authentication, and token endpoint wire types.

pub mod authorize;
pub mod client_auth;
pub mod pkce;
pub mod token;

pub use authorize::{
    AuthorizationRequest, AuthorizeService, IssuedAuthorization, ValidatedAuthorization,
};
pub use client_auth::{
    AuthenticatedClient, TokenEndpointAuthMethod, authenticate_client, parse_basic_auth,
};
pub use pkce::{PkceChallenge, PkceChallengeMethod, PkceError, PkceVerifier};
pub use token::{RevocationRequest, TokenRequest, TokenResponse};

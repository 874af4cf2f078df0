//! Token issuance, validation, and revocation.

pub mod id_token;
pub mod service;

pub use id_token::{IdTokenClaims, IdTokenSigner, Jwk, Jwks, SigningKeyPair};
pub use service::TokenService;

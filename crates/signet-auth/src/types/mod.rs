//! Domain types shared across the authorization server.

pub mod client;
pub mod code;
pub mod principal;
pub mod token;

pub use client::{Client, ClientValidationError, GrantType};
pub use code::AuthorizationCodeRecord;
pub use principal::{AdminPrincipal, Principal, PrincipalKind, UserPrincipal};
pub use token::{AccessTokenRecord, RefreshTokenRecord};

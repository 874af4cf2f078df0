//! ID token signing and JWKS publication.
//!
//! Access and refresh tokens are opaque handles validated against the token
//! store; only OpenID Connect ID tokens are signed JWTs. Tokens are signed
//! with RS256 and the public key is published at `/.well-known/jwks.json`.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;

/// ID token claims (OpenID Connect Core section 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer URL.
    pub iss: String,

    /// Subject (principal ID).
    pub sub: String,

    /// Audience (the client ID the token was issued to).
    pub aud: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Nonce echoed from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

// =============================================================================
// JWKS Types
// =============================================================================

/// JSON Web Key Set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

/// JSON Web Key (RSA public key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always "RSA".
    pub kty: String,

    /// Key ID.
    pub kid: String,

    /// Key use, always "sig".
    #[serde(rename = "use")]
    pub use_: String,

    /// Algorithm, always "RS256".
    pub alg: String,

    /// RSA modulus (base64url encoded).
    pub n: String,

    /// RSA exponent (base64url encoded).
    pub e: String,
}

// =============================================================================
// Signing Key Pair
// =============================================================================

/// An RSA key pair for ID token signing.
pub struct SigningKeyPair {
    /// Key ID, carried in the JWT header and the JWKS entry.
    pub kid: String,

    /// Private key for signing.
    encoding_key: EncodingKey,

    /// Public key for verification.
    decoding_key: DecodingKey,

    /// RSA modulus bytes for JWKS export.
    n: Vec<u8>,

    /// RSA exponent bytes for JWKS export.
    e: Vec<u8>,

    /// When the key was created.
    pub created_at: OffsetDateTime,
}

impl SigningKeyPair {
    /// Generates a new 2048-bit RSA key pair with a random key ID.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if key generation or PEM encoding fails.
    pub fn generate() -> AuthResult<Self> {
        let bits = 2048;
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| AuthError::internal(format!("RSA key generation failed: {e}")))?;

        let public_key = private_key.to_public_key();
        let n = public_key.n().to_bytes_be();
        let e = public_key.e().to_bytes_be();

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AuthError::internal(format!("Private key encoding failed: {e}")))?;

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| AuthError::internal(format!("Signing key rejected: {e}")))?;

        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuthError::internal(format!("Public key encoding failed: {e}")))?;

        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| AuthError::internal(format!("Verification key rejected: {e}")))?;

        Ok(Self {
            kid: uuid::Uuid::new_v4().to_string(),
            encoding_key,
            decoding_key,
            n,
            e,
            created_at: OffsetDateTime::now_utc(),
        })
    }

    /// Exports the public key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: self.kid.clone(),
            use_: "sig".to_string(),
            alg: "RS256".to_string(),
            n: URL_SAFE_NO_PAD.encode(&self.n),
            e: URL_SAFE_NO_PAD.encode(&self.e),
        }
    }
}

// =============================================================================
// ID Token Signer
// =============================================================================

/// Signs and verifies ID tokens with a single active key.
///
/// Thread-safe (`Send + Sync`), shared across handlers behind an `Arc`.
pub struct IdTokenSigner {
    key: SigningKeyPair,
    issuer: String,
}

impl IdTokenSigner {
    /// Creates a new signer.
    #[must_use]
    pub fn new(key: SigningKeyPair, issuer: impl Into<String>) -> Self {
        Self {
            key,
            issuer: issuer.into(),
        }
    }

    /// Issues an ID token for a subject and audience.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if encoding fails.
    pub fn issue(
        &self,
        subject: &str,
        client_id: &str,
        lifetime: Duration,
        nonce: Option<String>,
    ) -> AuthResult<String> {
        let now = OffsetDateTime::now_utc();
        let claims = IdTokenClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            aud: client_id.to_string(),
            exp: (now + lifetime).unix_timestamp(),
            iat: now.unix_timestamp(),
            nonce,
        };
        self.sign(&claims)
    }

    /// Signs prebuilt claims.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if encoding fails.
    pub fn sign(&self, claims: &IdTokenClaims) -> AuthResult<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key.kid.clone());

        encode(&header, claims, &self.key.encoding_key)
            .map_err(|e| AuthError::internal(format!("Failed to encode ID token: {e}")))
    }

    /// Verifies a token signature, issuer, and expiry.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired` for expired tokens and `InvalidToken` for any
    /// other verification failure.
    pub fn verify(&self, token: &str) -> AuthResult<IdTokenClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = true;
        // Audience is the client_id, checked by the caller when needed.
        validation.validate_aud = false;

        match decode::<IdTokenClaims>(token, &self.key.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature) => {
                Err(AuthError::TokenExpired)
            }
            Err(e) => Err(AuthError::invalid_token(e.to_string())),
        }
    }

    /// Returns the active key ID.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.key.kid
    }

    /// Returns the issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the JWKS containing the active public key.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: vec![self.key.to_jwk()],
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Authorization code domain type.
//!
//! Authorization codes are short-lived, single-use credentials binding an
//! authenticated principal to a client, a redirect URI, a scope, and the
//! PKCE challenge presented at the authorization endpoint. Consumption is
//! atomic; a code can be redeemed at most once.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::oauth::pkce::PkceChallengeMethod;
use crate::types::principal::PrincipalKind;

/// Maximum authorization code lifetime in seconds (RFC 6749 recommends
/// at most 10 minutes).
pub const MAX_CODE_TTL_SECS: u64 = 600;

/// Generates a cryptographically secure random authorization code.
///
/// Returns a 256-bit random value encoded as base64url (43 characters).
#[must_use]
pub fn generate_code() -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A stored authorization code grant.
///
/// `code_challenge` and `code_challenge_method` are always present or
/// absent together; the authorization endpoint rejects requests that send
/// one without the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCodeRecord {
    /// The code value handed to the client in the redirect.
    pub code: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// Subject that approved the authorization.
    pub subject: String,

    /// Which principal population the subject belongs to.
    pub subject_kind: PrincipalKind,

    /// Redirect URI the code was issued against. The token endpoint
    /// requires a byte-exact match on redemption.
    pub redirect_uri: String,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// Opaque client state echoed back in the redirect, if the client
    /// sent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// OIDC nonce to echo into the ID token, if the client sent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// PKCE challenge presented at the authorization endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<PkceChallengeMethod>,

    /// When this code was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When this code expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthorizationCodeRecord {
    /// Returns `true` if this code has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if the code was issued with a PKCE challenge.
    #[must_use]
    pub fn has_pkce(&self) -> bool {
        self.code_challenge.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn make_record(expires_at: OffsetDateTime) -> AuthorizationCodeRecord {
        AuthorizationCodeRecord {
            code: generate_code(),
            client_id: "web-app".to_string(),
            subject: "user-1".to_string(),
            subject_kind: PrincipalKind::User,
            redirect_uri: "https://app.example.com/callback".to_string(),
            scope: "openid profile".to_string(),
            state: None,
            nonce: None,
            code_challenge: Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string()),
            code_challenge_method: Some(PkceChallengeMethod::S256),
            created_at: OffsetDateTime::now_utc(),
            expires_at,
        }
    }

    #[test]
    fn test_generate_code() {
        let code = generate_code();
        assert_eq!(code.len(), 43);
        assert!(
            code.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(code, generate_code());
    }

    #[test]
    fn test_expiry() {
        let now = OffsetDateTime::now_utc();

        let record = make_record(now + Duration::minutes(10));
        assert!(!record.is_expired());

        let record = make_record(now - Duration::seconds(1));
        assert!(record.is_expired());
    }

    #[test]
    fn test_has_pkce() {
        let mut record = make_record(OffsetDateTime::now_utc() + Duration::minutes(10));
        assert!(record.has_pkce());

        record.code_challenge = None;
        record.code_challenge_method = None;
        assert!(!record.has_pkce());
    }

    #[test]
    fn test_serde_roundtrip() {
        let record = make_record(OffsetDateTime::now_utc() + Duration::minutes(10));
        let json = serde_json::to_string(&record).unwrap();
        let parsed: AuthorizationCodeRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.code, record.code);
        assert_eq!(parsed.code_challenge, record.code_challenge);
        assert_eq!(parsed.code_challenge_method, record.code_challenge_method);
        assert_eq!(parsed.scope, record.scope);
    }
}

//! Authorization endpoint logic.
//!
//! Request parsing and parameter validation live in
//! [`AuthorizationRequest::validate`]; client checks and code issuance in
//! [`AuthorizeService::authorize`]. The HTTP handler resolves the browser
//! session first, so by the time `authorize` runs the principal is known.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use time::OffsetDateTime;
use url::Url;

use crate::AuthResult;
use crate::config::{AuthorizationConfig, StorageConfig};
use crate::error::AuthError;
use crate::oauth::pkce::{PkceChallenge, PkceChallengeMethod};
use crate::storage::{AuthorizationCodeStorage, ClientStorage, with_timeout};
use crate::types::code::{AuthorizationCodeRecord, generate_code};
use crate::types::{GrantType, Principal};

// =============================================================================
// Authorization Request
// =============================================================================

/// Raw query parameters of an authorization request.
///
/// Everything is optional at this stage so that missing parameters produce
/// precise `invalid_request` descriptions instead of a generic rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationRequest {
    /// Must be `code`.
    pub response_type: Option<String>,
    /// Public client identifier.
    pub client_id: Option<String>,
    /// Redirect URI, matched byte-exact against the registration.
    pub redirect_uri: Option<String>,
    /// Requested scopes (space-separated).
    pub scope: Option<String>,
    /// Opaque client state, echoed back in the redirect.
    pub state: Option<String>,
    /// OIDC nonce, echoed into the ID token.
    pub nonce: Option<String>,
    /// PKCE code challenge.
    pub code_challenge: Option<String>,
    /// PKCE challenge method, `plain` or `S256`. Defaults to `plain`
    /// when a challenge is present without a method (RFC 7636 section 4.3).
    pub code_challenge_method: Option<String>,
}

impl AuthorizationRequest {
    /// Validates parameter presence and shape.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for missing or malformed parameters and
    /// `UnsupportedResponseType` for any response type other than `code`.
    pub fn validate(&self) -> AuthResult<ValidatedAuthorization> {
        let client_id = self
            .client_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::invalid_request("Missing client_id"))?;

        let redirect_uri = self
            .redirect_uri
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::invalid_request("Missing redirect_uri"))?;

        // Rejecting unparsable URIs here keeps the redirect construction
        // after code issuance infallible.
        if Url::parse(redirect_uri).is_err() {
            return Err(AuthError::invalid_request(
                "redirect_uri must be an absolute URL",
            ));
        }

        match self.response_type.as_deref() {
            Some("code") => {}
            Some(other) => return Err(AuthError::unsupported_response_type(other)),
            None => return Err(AuthError::invalid_request("Missing response_type")),
        }

        let pkce = match (&self.code_challenge, &self.code_challenge_method) {
            (Some(challenge), method) => {
                let challenge = PkceChallenge::new(challenge.clone())
                    .map_err(|e| AuthError::invalid_request(e.to_string()))?;
                let method = match method.as_deref() {
                    Some(m) => PkceChallengeMethod::parse(m)
                        .map_err(|e| AuthError::invalid_request(e.to_string()))?,
                    None => PkceChallengeMethod::Plain,
                };
                Some((challenge, method))
            }
            (None, Some(_)) => {
                return Err(AuthError::invalid_request(
                    "code_challenge_method without code_challenge",
                ));
            }
            (None, None) => None,
        };

        Ok(ValidatedAuthorization {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scope: self.scope.clone().filter(|s| !s.trim().is_empty()),
            state: self.state.clone(),
            nonce: self.nonce.clone(),
            pkce,
        })
    }
}

/// An authorization request that passed parameter validation.
#[derive(Debug, Clone)]
pub struct ValidatedAuthorization {
    /// Public client identifier.
    pub client_id: String,
    /// Raw redirect URI as sent by the client.
    pub redirect_uri: String,
    /// Requested scopes, `None` when the client asked for none.
    pub scope: Option<String>,
    /// Opaque client state.
    pub state: Option<String>,
    /// OIDC nonce.
    pub nonce: Option<String>,
    /// PKCE challenge and method.
    pub pkce: Option<(PkceChallenge, PkceChallengeMethod)>,
}

// =============================================================================
// Authorize Service
// =============================================================================

/// The result of a successful authorization: a stored code and the
/// redirect that delivers it.
#[derive(Debug, Clone)]
pub struct IssuedAuthorization {
    /// The persisted code record.
    pub record: AuthorizationCodeRecord,
    /// Where to send the browser.
    pub redirect_url: Url,
}

/// Validates clients and issues authorization codes.
pub struct AuthorizeService {
    clients: Arc<dyn ClientStorage>,
    codes: Arc<dyn AuthorizationCodeStorage>,
    code_ttl: Duration,
    default_scope: String,
    storage_timeout: Duration,
}

impl AuthorizeService {
    /// Creates a new authorize service.
    pub fn new(
        clients: Arc<dyn ClientStorage>,
        codes: Arc<dyn AuthorizationCodeStorage>,
        authorization: &AuthorizationConfig,
        storage: &StorageConfig,
    ) -> Self {
        Self {
            clients,
            codes,
            code_ttl: authorization.code_ttl,
            default_scope: authorization.default_scope.clone(),
            storage_timeout: storage.operation_timeout,
        }
    }

    /// Validates the client and issues an authorization code for the
    /// given principal.
    ///
    /// # Errors
    ///
    /// - `InvalidClient` for unknown or inactive clients, or clients not
    ///   registered for the authorization code grant
    /// - `InvalidRedirectUri` when the redirect URI is not registered
    /// - `InvalidScope` when a requested scope exceeds the registration
    /// - `InvalidRequest` when the client requires PKCE and none was sent
    /// - `Storage` when the backing store fails or times out
    pub async fn authorize(
        &self,
        request: &ValidatedAuthorization,
        principal: &Principal,
    ) -> AuthResult<IssuedAuthorization> {
        let client = with_timeout(
            self.storage_timeout,
            self.clients.find_by_client_id(&request.client_id),
        )
        .await?
        .ok_or_else(|| AuthError::invalid_client("Unknown client"))?;

        if !client.active {
            return Err(AuthError::invalid_client("Client is inactive"));
        }

        if !client.is_grant_type_allowed(GrantType::AuthorizationCode) {
            return Err(AuthError::invalid_client(
                "Client is not registered for the authorization code grant",
            ));
        }

        if !client.is_redirect_uri_allowed(&request.redirect_uri) {
            return Err(AuthError::invalid_redirect_uri(
                "redirect_uri is not registered for this client",
            ));
        }

        let scope = request
            .scope
            .clone()
            .unwrap_or_else(|| self.default_scope.clone());
        if !client.are_scopes_allowed(&scope) {
            return Err(AuthError::invalid_scope(
                "Requested scope exceeds the client registration",
            ));
        }

        if client.requires_pkce() && request.pkce.is_none() {
            return Err(AuthError::invalid_request(
                "This client requires PKCE (code_challenge)",
            ));
        }

        let now = OffsetDateTime::now_utc();
        let record = AuthorizationCodeRecord {
            code: generate_code(),
            client_id: client.client_id.clone(),
            subject: principal.id().to_string(),
            subject_kind: principal.kind(),
            redirect_uri: request.redirect_uri.clone(),
            scope,
            state: request.state.clone(),
            nonce: request.nonce.clone(),
            code_challenge: request
                .pkce
                .as_ref()
                .map(|(challenge, _)| challenge.as_str().to_string()),
            code_challenge_method: request.pkce.as_ref().map(|&(_, method)| method),
            created_at: now,
            expires_at: now + self.code_ttl,
        };

        with_timeout(self.storage_timeout, self.codes.store(&record)).await?;

        let redirect_url = build_code_redirect(&record)?;

        Ok(IssuedAuthorization {
            record,
            redirect_url,
        })
    }
}

/// Builds the success redirect carrying `code` and the echoed `state`.
fn build_code_redirect(record: &AuthorizationCodeRecord) -> AuthResult<Url> {
    let mut url = Url::parse(&record.redirect_uri)
        .map_err(|_| AuthError::internal("Stored redirect URI is not a valid URL"))?;

    url.query_pairs_mut().append_pair("code", &record.code);
    if let Some(state) = &record.state {
        url.query_pairs_mut().append_pair("state", state);
    }

    Ok(url)
}

// =============================================================================
// Tests
// =============================================================================

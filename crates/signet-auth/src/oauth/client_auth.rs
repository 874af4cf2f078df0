//! Client authentication for the token and revocation endpoints.
//!
//! # Authentication Methods
//!
//! - `client_secret_basic` - HTTP Basic Auth with client_id:client_secret
//! - `client_secret_post` - client_id and client_secret in the request body
//! - `none` - Public clients (client_id only)
//!
//! # Authentication Priority
//!
//! When multiple methods are present, they are tried in order:
//! 1. HTTP Basic Auth header
//! 2. client_secret_post (body parameters)
//! 3. Public client (client_id only)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::ClientStorage;
use crate::types::Client;

/// Result of successful client authentication.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    /// The authenticated client.
    pub client: Client,

    /// The authentication method used.
    pub auth_method: TokenEndpointAuthMethod,
}

/// Token endpoint authentication methods (OpenID Connect Core section 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// No client authentication (public clients).
    None,

    /// Client secret via HTTP Basic Auth.
    ClientSecretBasic,

    /// Client secret in request body.
    ClientSecretPost,
}

impl TokenEndpointAuthMethod {
    /// Returns the string representation of the auth method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
        }
    }
}

impl fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Authenticates a client from token-endpoint credentials.
///
/// `body_client_id` and `body_client_secret` are the form parameters;
/// `basic_auth` is the parsed Authorization header. Methods are tried in
/// priority order.
///
/// # Errors
///
/// Returns an error if:
/// - No client credentials are provided
/// - The client is not found or inactive
/// - The client secret is invalid
/// - A confidential client attempts public authentication
/// - A public client provides a secret
pub async fn authenticate_client(
    body_client_id: Option<&str>,
    body_client_secret: Option<&str>,
    basic_auth: Option<(&str, &str)>,
    client_storage: &dyn ClientStorage,
) -> AuthResult<AuthenticatedClient> {
    // 1. HTTP Basic Auth has the highest priority
    if let Some((client_id, client_secret)) = basic_auth {
        return authenticate_with_secret(
            client_id,
            client_secret,
            TokenEndpointAuthMethod::ClientSecretBasic,
            client_storage,
        )
        .await;
    }

    // 2. client_secret_post
    if let (Some(client_id), Some(client_secret)) = (body_client_id, body_client_secret) {
        return authenticate_with_secret(
            client_id,
            client_secret,
            TokenEndpointAuthMethod::ClientSecretPost,
            client_storage,
        )
        .await;
    }

    // 3. Public client (client_id only)
    if let Some(client_id) = body_client_id {
        return authenticate_public(client_id, client_storage).await;
    }

    Err(AuthError::invalid_client("No client credentials provided"))
}

async fn authenticate_with_secret(
    client_id: &str,
    client_secret: &str,
    auth_method: TokenEndpointAuthMethod,
    client_storage: &dyn ClientStorage,
) -> AuthResult<AuthenticatedClient> {
    let client = client_storage
        .find_by_client_id(client_id)
        .await?
        .ok_or_else(|| AuthError::invalid_client("Unknown client"))?;

    if !client.active {
        return Err(AuthError::invalid_client("Client is inactive"));
    }

    // Public clients have no secret to compare against
    if !client.confidential {
        return Err(AuthError::invalid_client(format!(
            "Public clients cannot use {auth_method} authentication"
        )));
    }

    if !client_storage
        .verify_secret(client_id, client_secret)
        .await?
    {
        return Err(AuthError::invalid_client("Invalid client secret"));
    }

    Ok(AuthenticatedClient {
        client,
        auth_method,
    })
}

async fn authenticate_public(
    client_id: &str,
    client_storage: &dyn ClientStorage,
) -> AuthResult<AuthenticatedClient> {
    let client = client_storage
        .find_by_client_id(client_id)
        .await?
        .ok_or_else(|| AuthError::invalid_client("Unknown client"))?;

    if !client.active {
        return Err(AuthError::invalid_client("Client is inactive"));
    }

    // Confidential clients must prove possession of their secret
    if client.confidential {
        return Err(AuthError::invalid_client(
            "Confidential clients must provide client credentials",
        ));
    }

    Ok(AuthenticatedClient {
        client,
        auth_method: TokenEndpointAuthMethod::None,
    })
}

/// Parses an HTTP Basic Auth header value into `(client_id, client_secret)`.
///
/// Returns `None` if the header is not a well-formed Basic credential.
///
/// # Example
///
/// ```ignore
/// let auth_header = "Basic Y2xpZW50X2lkOmNsaWVudF9zZWNyZXQ=";
/// if let Some((id, secret)) = parse_basic_auth(auth_header) {
///     println!("client_id: {id}");
/// }
/// ```
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let header_value = header_value.trim();

    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    // Split on first colon (secret may contain colons)
    let (client_id, client_secret) = credentials.split_once(':')?;

    Some((client_id.to_string(), client_secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GrantType;
    use std::collections::HashMap;
    use std::sync::RwLock;

    /// Mock client storage for testing.
    struct MockClientStorage {
        clients: RwLock<HashMap<String, (Client, String)>>, // client_id -> (client, secret)
    }

    impl MockClientStorage {
        fn new() -> Self {
            Self {
                clients: RwLock::new(HashMap::new()),
            }
        }

        fn add_client(&self, client: Client, secret: Option<&str>) {
            self.clients.write().unwrap().insert(
                client.client_id.clone(),
                (client, secret.unwrap_or("").to_string()),
            );
        }
    }

    #[async_trait::async_trait]
    impl ClientStorage for MockClientStorage {
        async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
            Ok(self
                .clients
                .read()
                .unwrap()
                .get(client_id)
                .map(|(c, _)| c.clone()))
        }

        async fn create(&self, client: &Client) -> AuthResult<Client> {
            self.add_client(client.clone(), None);
            Ok(client.clone())
        }

        async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool> {
            Ok(self
                .clients
                .read()
                .unwrap()
                .get(client_id)
                .map(|(_, s)| s == secret)
                .unwrap_or(false))
        }
    }

    fn create_public_client() -> Client {
        Client {
            client_id: "public-client".to_string(),
            client_secret: None,
            name: "Public Client".to_string(),
            grant_types: vec![GrantType::AuthorizationCode],
            redirect_uris: vec!["https://app.example.com/callback".to_string()],
            scopes: vec![],
            confidential: false,
            active: true,
            access_token_lifetime: None,
            refresh_token_lifetime: None,
            pkce_required: None,
        }
    }

    fn create_confidential_client() -> Client {
        Client {
            client_id: "confidential-client".to_string(),
            client_secret: Some("hashed-secret".to_string()),
            name: "Confidential Client".to_string(),
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            redirect_uris: vec!["https://app.example.com/callback".to_string()],
            scopes: vec![],
            confidential: true,
            active: true,
            access_token_lifetime: None,
            refresh_token_lifetime: None,
            pkce_required: None,
        }
    }

    #[tokio::test]
    async fn test_authenticate_public_client() {
        let storage = MockClientStorage::new();
        storage.add_client(create_public_client(), None);

        let result = authenticate_client(Some("public-client"), None, None, &storage).await;

        let auth = result.unwrap();
        assert_eq!(auth.client.client_id, "public-client");
        assert_eq!(auth.auth_method, TokenEndpointAuthMethod::None);
    }

    #[tokio::test]
    async fn test_authenticate_basic_auth() {
        let storage = MockClientStorage::new();
        storage.add_client(create_confidential_client(), Some("secret123"));

        let result = authenticate_client(
            None,
            None,
            Some(("confidential-client", "secret123")),
            &storage,
        )
        .await;

        let auth = result.unwrap();
        assert_eq!(auth.client.client_id, "confidential-client");
        assert_eq!(auth.auth_method, TokenEndpointAuthMethod::ClientSecretBasic);
    }

    #[tokio::test]
    async fn test_authenticate_secret_post() {
        let storage = MockClientStorage::new();
        storage.add_client(create_confidential_client(), Some("secret123"));

        let result = authenticate_client(
            Some("confidential-client"),
            Some("secret123"),
            None,
            &storage,
        )
        .await;

        let auth = result.unwrap();
        assert_eq!(auth.auth_method, TokenEndpointAuthMethod::ClientSecretPost);
    }

    #[tokio::test]
    async fn test_basic_auth_takes_priority_over_body() {
        let storage = MockClientStorage::new();
        storage.add_client(create_confidential_client(), Some("secret123"));

        // Body carries the wrong secret; Basic Auth carries the right one.
        // Basic wins, so authentication succeeds.
        let result = authenticate_client(
            Some("confidential-client"),
            Some("wrong"),
            Some(("confidential-client", "secret123")),
            &storage,
        )
        .await;

        assert_eq!(
            result.unwrap().auth_method,
            TokenEndpointAuthMethod::ClientSecretBasic
        );
    }

    #[tokio::test]
    async fn test_authenticate_unknown_client() {
        let storage = MockClientStorage::new();

        let result = authenticate_client(Some("unknown-client"), None, None, &storage).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[tokio::test]
    async fn test_authenticate_inactive_client() {
        let storage = MockClientStorage::new();
        let mut client = create_public_client();
        client.active = false;
        storage.add_client(client, None);

        let result = authenticate_client(Some("public-client"), None, None, &storage).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[tokio::test]
    async fn test_authenticate_wrong_secret() {
        let storage = MockClientStorage::new();
        storage.add_client(create_confidential_client(), Some("correct-secret"));

        let result = authenticate_client(
            Some("confidential-client"),
            Some("wrong-secret"),
            None,
            &storage,
        )
        .await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[tokio::test]
    async fn test_confidential_client_requires_credentials() {
        let storage = MockClientStorage::new();
        storage.add_client(create_confidential_client(), Some("secret"));

        let result = authenticate_client(Some("confidential-client"), None, None, &storage).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[tokio::test]
    async fn test_public_client_cannot_use_basic_auth() {
        let storage = MockClientStorage::new();
        storage.add_client(create_public_client(), None);

        let result =
            authenticate_client(None, None, Some(("public-client", "any-secret")), &storage).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[tokio::test]
    async fn test_no_credentials_provided() {
        let storage = MockClientStorage::new();

        let result = authenticate_client(None, None, None, &storage).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[test]
    fn test_parse_basic_auth_valid() {
        // "client_id:client_secret" base64 encoded
        let header = "Basic Y2xpZW50X2lkOmNsaWVudF9zZWNyZXQ=";
        let (id, secret) = parse_basic_auth(header).unwrap();
        assert_eq!(id, "client_id");
        assert_eq!(secret, "client_secret");
    }

    #[test]
    fn test_parse_basic_auth_with_colon_in_password() {
        // "client:pass:word" base64 encoded
        let header = "Basic Y2xpZW50OnBhc3M6d29yZA==";
        let (id, secret) = parse_basic_auth(header).unwrap();
        assert_eq!(id, "client");
        assert_eq!(secret, "pass:word");
    }

    #[test]
    fn test_parse_basic_auth_invalid() {
        assert!(parse_basic_auth("Bearer some-token").is_none());
        assert!(parse_basic_auth("Basic not-valid-base64!!!").is_none());
        // "clientonly" base64 encoded (no colon separator)
        assert!(parse_basic_auth("Basic Y2xpZW50b25seQ==").is_none());
    }

    #[test]
    fn test_auth_method_as_str() {
        assert_eq!(TokenEndpointAuthMethod::None.as_str(), "none");
        assert_eq!(
            TokenEndpointAuthMethod::ClientSecretBasic.as_str(),
            "client_secret_basic"
        );
        assert_eq!(
            TokenEndpointAuthMethod::ClientSecretPost.as_str(),
            "client_secret_post"
        );
    }
}

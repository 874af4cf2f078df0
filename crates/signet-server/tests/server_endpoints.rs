//! Discovery, JWKS, logout, and error surface checks.

use reqwest::StatusCode;
use reqwest::redirect::Policy;
use serde_json::Value;
use tokio::task::JoinHandle;
use url::Url;

use signet_auth::types::PrincipalKind;
use signet_server::bootstrap::{DEMO_USER_ID, DEMO_WEB_CLIENT_ID};
use signet_server::{App, AppConfig, build_app};

const WEB_REDIRECT_URI: &str = "http://localhost:3000/callback";

// RFC 7636 appendix B challenge
const PKCE_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

struct TestServer {
    base: String,
    app: App,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

async fn start_server() -> TestServer {
    let mut config = AppConfig::default();
    config.auth.session.secret = "integration-test-secret-0123456789abcdef".to_string();
    config.auth.session.secure = false;
    config.seed.demo = true;

    let app = build_app(&config).await.expect("build app");
    let router = app.router.clone();

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    TestServer {
        base: format!("http://{addr}"),
        app,
        shutdown: tx,
        handle,
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap()
}

async fn session_cookie(server: &TestServer) -> String {
    let principal = server
        .app
        .state
        .directory
        .find_principal(PrincipalKind::User, DEMO_USER_ID)
        .await
        .unwrap()
        .expect("seeded demo user");
    let cookie = server.app.state.session.issue_session(&principal).unwrap();
    format!("{}={}", cookie.name(), cookie.value())
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[tokio::test]
async fn discovery_document_lists_the_endpoints() {
    let server = start_server().await;
    let client = http_client();

    let resp = client
        .get(format!("{}/.well-known/openid-configuration", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["cache-control"], "public, max-age=3600");

    let doc: Value = resp.json().await.unwrap();
    assert_eq!(doc["issuer"], "http://localhost:8090");
    assert_eq!(
        doc["authorization_endpoint"],
        "http://localhost:8090/authorize"
    );
    assert_eq!(doc["token_endpoint"], "http://localhost:8090/token");
    assert_eq!(doc["userinfo_endpoint"], "http://localhost:8090/userinfo");
    assert_eq!(
        doc["jwks_uri"],
        "http://localhost:8090/.well-known/jwks.json"
    );
    assert_eq!(doc["revocation_endpoint"], "http://localhost:8090/revoke");
    assert_eq!(doc["end_session_endpoint"], "http://localhost:8090/logout");

    let methods: Vec<&str> = doc["code_challenge_methods_supported"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(methods, vec!["plain", "S256"]);
    assert_eq!(doc["subject_types_supported"][0], "public");
    assert_eq!(doc["id_token_signing_alg_values_supported"][0], "RS256");

    server.stop().await;
}

#[tokio::test]
async fn jwks_publishes_the_signing_key() {
    let server = start_server().await;
    let client = http_client();

    let resp = client
        .get(format!("{}/.well-known/jwks.json", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["cache-control"], "public, max-age=3600");

    let jwks: Value = resp.json().await.unwrap();
    let key = &jwks["keys"][0];
    assert_eq!(key["kty"], "RSA");
    assert_eq!(key["alg"], "RS256");
    assert_eq!(key["use"], "sig");
    assert_eq!(key["e"], "AQAB");
    assert!(key["kid"].is_string());
    assert!(key["n"].is_string());

    server.stop().await;
}

#[tokio::test]
async fn logout_redirects_to_a_registered_uri() {
    let server = start_server().await;
    let client = http_client();
    let cookie = session_cookie(&server).await;

    let mut url = Url::parse(&format!("{}/logout", server.base)).unwrap();
    url.query_pairs_mut()
        .append_pair("post_logout_redirect_uri", WEB_REDIRECT_URI)
        .append_pair("client_id", DEMO_WEB_CLIENT_ID)
        .append_pair("state", "after-logout");

    let resp = client
        .get(url)
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()["cache-control"], "no-store");

    let location = Url::parse(resp.headers()["location"].to_str().unwrap()).unwrap();
    assert!(location.as_str().starts_with(WEB_REDIRECT_URI));
    assert_eq!(
        query_param(&location, "state").as_deref(),
        Some("after-logout")
    );

    // The session cookie is cleared on the way out
    let set_cookie = resp.headers()["set-cookie"].to_str().unwrap();
    assert!(set_cookie.starts_with("signet_session="));
    assert!(set_cookie.contains("Max-Age=0"));

    server.stop().await;
}

#[tokio::test]
async fn logout_ignores_an_unregistered_redirect() {
    let server = start_server().await;
    let client = http_client();
    let cookie = session_cookie(&server).await;

    let mut url = Url::parse(&format!("{}/logout", server.base)).unwrap();
    url.query_pairs_mut()
        .append_pair("post_logout_redirect_uri", "http://evil.example/phish")
        .append_pair("client_id", DEMO_WEB_CLIENT_ID);

    let resp = client
        .get(url)
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();

    // No redirect to the unregistered target, just the confirmation page
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!resp.headers().contains_key("location"));
    let set_cookie = resp.headers()["set-cookie"].to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=0"));
    let body = resp.text().await.unwrap();
    assert!(body.contains("Signed out"));

    server.stop().await;
}

#[tokio::test]
async fn logout_without_a_session_still_succeeds() {
    let server = start_server().await;
    let client = http_client();

    let resp = client
        .get(format!("{}/logout", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers()["set-cookie"].to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=0"));

    server.stop().await;
}

#[tokio::test]
async fn unknown_client_is_rejected_without_a_redirect() {
    let server = start_server().await;
    let client = http_client();
    let cookie = session_cookie(&server).await;

    let mut url = Url::parse(&format!("{}/authorize", server.base)).unwrap();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", "ghost")
        .append_pair("redirect_uri", WEB_REDIRECT_URI)
        .append_pair("code_challenge", PKCE_CHALLENGE)
        .append_pair("code_challenge_method", "S256");

    let resp = client
        .get(url)
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(!resp.headers().contains_key("location"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_client");

    server.stop().await;
}

#[tokio::test]
async fn unregistered_redirect_uri_is_rejected() {
    let server = start_server().await;
    let client = http_client();
    let cookie = session_cookie(&server).await;

    let mut url = Url::parse(&format!("{}/authorize", server.base)).unwrap();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", DEMO_WEB_CLIENT_ID)
        .append_pair("redirect_uri", "http://localhost:9999/elsewhere")
        .append_pair("code_challenge", PKCE_CHALLENGE)
        .append_pair("code_challenge_method", "S256");

    let resp = client
        .get(url)
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(!resp.headers().contains_key("location"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_redirect_uri");

    server.stop().await;
}

#[tokio::test]
async fn token_endpoint_rejects_missing_grant_type() {
    let server = start_server().await;
    let client = http_client();

    let resp = client
        .post(format!("{}/token", server.base))
        .form(&[("client_id", DEMO_WEB_CLIENT_ID)])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");
    assert!(
        body["error_description"]
            .as_str()
            .unwrap()
            .contains("grant_type")
    );

    server.stop().await;
}

#[tokio::test]
async fn token_endpoint_rejects_unknown_grant_type() {
    let server = start_server().await;
    let client = http_client();

    let resp = client
        .post(format!("{}/token", server.base))
        .form(&[
            ("grant_type", "password"),
            ("client_id", DEMO_WEB_CLIENT_ID),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "unsupported_grant_type");

    server.stop().await;
}

#[tokio::test]
async fn userinfo_without_a_token_is_unauthorized() {
    let server = start_server().await;
    let client = http_client();

    let resp = client
        .get(format!("{}/userinfo", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let www = resp.headers()["www-authenticate"].to_str().unwrap();
    assert!(www.starts_with("Bearer realm=\"signet\""));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_token");

    server.stop().await;
}

#[tokio::test]
async fn revoke_requires_client_authentication() {
    let server = start_server().await;
    let client = http_client();

    // No client identification at all
    let resp = client
        .post(format!("{}/revoke", server.base))
        .form(&[("token", "whatever")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_client");

    // Missing token parameter fails before client authentication
    let resp = client
        .post(format!("{}/revoke", server.base))
        .form(&[("client_id", DEMO_WEB_CLIENT_ID)])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");

    server.stop().await;
}

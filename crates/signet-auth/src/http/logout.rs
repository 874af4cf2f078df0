//! Logout endpoint.
//!
//! `GET|POST /logout` clears the browser session cookie. When the
//! request names a client and a `post_logout_redirect_uri` that is
//! registered for that client, the browser is sent there (with any
//! `state` echoed back); otherwise a plain confirmation page is shown.
//! The redirect URI check uses the same registered allow-list as
//! `/authorize`. A bad redirect never fails the logout.

use axum::extract::{Form, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::audit::{ACTOR_ANONYMOUS, AuditAction, AuditEvent, RequestContext, target};
use crate::storage::with_timeout;

use super::AuthState;

const LOGGED_OUT_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>Signed out</title></head>\n<body>\n<h1>Signed out</h1>\n<p>Your session has ended. You can close this window.</p>\n</body>\n</html>\n";

/// Logout request parameters (RP-initiated logout).
#[derive(Debug, Clone, Deserialize)]
pub struct LogoutRequest {
    /// Where to send the browser afterwards. Honored only when
    /// registered for `client_id`.
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,

    /// Client asking for the logout.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Opaque value echoed back on the redirect.
    #[serde(default)]
    pub state: Option<String>,
}

pub async fn logout_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(request): Query<LogoutRequest>,
) -> Response {
    handle_logout(state, headers, jar, request).await
}

pub async fn logout_form_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(request): Form<LogoutRequest>,
) -> Response {
    handle_logout(state, headers, jar, request).await
}

async fn handle_logout(
    state: AuthState,
    headers: HeaderMap,
    jar: CookieJar,
    request: LogoutRequest,
) -> Response {
    let context = RequestContext::from_headers(&headers);

    // A broken session store must not keep anyone logged in; the
    // cookie gets cleared no matter what.
    let principal = match state.session.resolve_principal(&jar).await {
        Ok(principal) => principal,
        Err(e) => {
            tracing::warn!(error = %e, "Session lookup failed during logout, clearing cookie anyway");
            None
        }
    };

    let redirect = resolve_post_logout_redirect(&state, &request).await;

    let actor = principal
        .as_ref()
        .map_or(ACTOR_ANONYMOUS, |principal| principal.id());
    state.audit.emit(
        AuditEvent::new(actor, AuditAction::Logout, target::LOGOUT)
            .with_metadata(json!({
                "clientId": request.client_id,
                "redirected": redirect.is_some(),
                "action": "logout",
            }))
            .with_context(&context),
    );
    tracing::info!(actor = %actor, "Session terminated");

    let clear_cookie = state.session.clear_session().to_string();

    match redirect {
        Some(location) => (
            StatusCode::FOUND,
            [
                (header::SET_COOKIE, clear_cookie),
                (header::LOCATION, location),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
        )
            .into_response(),
        None => (
            StatusCode::OK,
            [
                (header::SET_COOKIE, clear_cookie),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
            Html(LOGGED_OUT_PAGE),
        )
            .into_response(),
    }
}

/// Validates the requested post-logout redirect against the client's
/// registered redirect URIs. Anything that cannot be validated is
/// dropped rather than rejected: the logout proceeds and the browser
/// simply stays on the confirmation page.
async fn resolve_post_logout_redirect(state: &AuthState, request: &LogoutRequest) -> Option<String> {
    let redirect_uri = request.post_logout_redirect_uri.as_deref()?;
    let client_id = request.client_id.as_deref()?;

    let client = match with_timeout(
        state.storage_timeout,
        state.clients.find_by_client_id(client_id),
    )
    .await
    {
        Ok(Some(client)) => client,
        Ok(None) => {
            tracing::warn!(client_id = %client_id, "Logout redirect for unknown client, ignoring");
            return None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Client lookup failed during logout, ignoring redirect");
            return None;
        }
    };

    if !client.active || !client.is_redirect_uri_allowed(redirect_uri) {
        tracing::warn!(
            client_id = %client_id,
            redirect_uri = %redirect_uri,
            "Logout redirect is not registered, ignoring"
        );
        return None;
    }

    match request.state.as_deref() {
        Some(state_value) => {
            let mut url = Url::parse(redirect_uri).ok()?;
            url.query_pairs_mut().append_pair("state", state_value);
            Some(url.into())
        }
        None => Some(redirect_uri.to_string()),
    }
}

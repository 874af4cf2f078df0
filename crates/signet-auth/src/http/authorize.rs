//! Authorization endpoint.
//!
//! `GET /authorize` drives the authorization code flow: validate the
//! request, resolve the browser session, check policy, then issue a
//! code and send the browser back to the client's redirect URI.
//!
//! Redirects use `302 Found` throughout. Requests without a usable
//! session are bounced to the login page with the original URL carried
//! in a `redirect` query parameter so the flow can resume after login.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use serde_json::json;

use crate::audit::{ACTOR_ANONYMOUS, AuditAction, AuditEvent, RequestContext, target};
use crate::error::AuthError;
use crate::oauth::AuthorizationRequest;
use crate::policy::PERMISSION_AUTHORIZE;

use super::AuthState;

pub async fn authorize_handler(
    State(state): State<AuthState>,
    uri: Uri,
    headers: HeaderMap,
    jar: CookieJar,
    Query(request): Query<AuthorizationRequest>,
) -> Response {
    let context = RequestContext::from_headers(&headers);

    // Parameter problems answer as JSON, never as a redirect: until the
    // client and redirect URI check out, no callback can be trusted
    // with an error.
    let validated = match request.validate() {
        Ok(validated) => validated,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected malformed authorization request");
            return e.into_response();
        }
    };

    let principal = match state.session.resolve_principal(&jar).await {
        Ok(Some(principal)) => principal,
        Ok(None) => return login_redirect(&state, &uri),
        Err(e) => {
            audit_failure(
                &state,
                ACTOR_ANONYMOUS,
                &validated.client_id,
                &e.to_string(),
                &context,
            );
            return e.into_response();
        }
    };

    let decision = state.policy.evaluate(&principal, PERMISSION_AUTHORIZE);
    if let Some(reason) = decision.deny_reason() {
        audit_failure(
            &state,
            principal.id(),
            &validated.client_id,
            &reason.message,
            &context,
        );
        return AuthError::access_denied(reason.message.clone()).into_response();
    }

    match state.authorize_service.authorize(&validated, &principal).await {
        Ok(issued) => {
            state.audit.emit(
                AuditEvent::new(principal.id(), AuditAction::Access, target::AUTHORIZE)
                    .with_metadata(json!({
                        "clientId": issued.record.client_id,
                        "redirectUri": issued.record.redirect_uri,
                        "scope": issued.record.scope,
                        "action": "issue_code",
                    }))
                    .with_context(&context),
            );
            tracing::info!(
                client_id = %issued.record.client_id,
                subject = %issued.record.subject,
                "Issued authorization code"
            );
            found_redirect(issued.redirect_url.as_str())
        }
        Err(e) => {
            audit_failure(
                &state,
                principal.id(),
                &validated.client_id,
                &e.to_string(),
                &context,
            );
            e.into_response()
        }
    }
}

/// Sends an unauthenticated browser to the login page, preserving the
/// full original URL so login can resume the flow.
fn login_redirect(state: &AuthState, uri: &Uri) -> Response {
    let original = format!("{}{}", state.issuer.trim_end_matches('/'), uri);
    match state.session.login_redirect_url(&original) {
        Ok(url) => found_redirect(url.as_str()),
        Err(e) => e.into_response(),
    }
}

fn found_redirect(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

fn audit_failure(
    state: &AuthState,
    actor: &str,
    client_id: &str,
    error: &str,
    context: &RequestContext,
) {
    state.audit.emit(
        AuditEvent::new(actor, AuditAction::Failed, target::AUTHORIZE)
            .with_metadata(json!({
                "clientId": client_id,
                "error": error,
                "action": "authorize_failed",
            }))
            .with_context(context),
    );
}

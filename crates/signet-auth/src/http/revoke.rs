//! Token revocation endpoint (RFC 7009).
//!
//! `POST /revoke` authenticates the client, then always answers
//! `200 OK` regardless of whether the token existed, was already
//! revoked, or belonged to someone else. Only a missing `token`
//! parameter (`400`) or failed client authentication (`401`) produce
//! errors; anything after that stays invisible to the caller.

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::audit::{ACTOR_ANONYMOUS, AuditAction, AuditEvent, RequestContext, target};
use crate::error::AuthError;
use crate::oauth::{RevocationRequest, authenticate_client, parse_basic_auth};
use crate::storage::with_timeout;

use super::AuthState;

pub async fn revoke_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Form(request): Form<RevocationRequest>,
) -> Response {
    let context = RequestContext::from_headers(&headers);

    if request.token.is_empty() {
        return AuthError::invalid_request("Missing required parameter: token").into_response();
    }

    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_basic_auth);
    let basic_ref = basic
        .as_ref()
        .map(|(id, secret)| (id.as_str(), secret.as_str()));

    let authenticated = match with_timeout(
        state.storage_timeout,
        authenticate_client(
            request.client_id.as_deref(),
            request.client_secret.as_deref(),
            basic_ref,
            state.clients.as_ref(),
        ),
    )
    .await
    {
        Ok(authenticated) => authenticated,
        Err(e) => {
            tracing::debug!(error = %e, "Revocation client authentication failed");
            let claimed = basic_ref
                .map(|(id, _)| id)
                .or(request.client_id.as_deref())
                .unwrap_or(ACTOR_ANONYMOUS);
            state.audit.emit(
                AuditEvent::new(claimed, AuditAction::Failed, target::REVOKE)
                    .with_metadata(json!({
                        "clientId": claimed,
                        "error": e.to_string(),
                        "action": "revoke_failed",
                    }))
                    .with_context(&context),
            );
            return e.into_response();
        }
    };
    let client = &authenticated.client;

    match state
        .token_service
        .revoke(client, &request.token, request.token_type_hint.as_deref())
        .await
    {
        Ok(revoked) => {
            state.audit.emit(
                AuditEvent::new(client.client_id.as_str(), AuditAction::Revoke, target::REVOKE)
                    .with_metadata(json!({
                        "clientId": client.client_id,
                        "revoked": revoked,
                        "action": "revoke_token",
                    }))
                    .with_context(&context),
            );
            tracing::info!(client_id = %client.client_id, revoked, "Processed revocation request");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            // The caller still sees success; the token's fate stays
            // unobservable per RFC 7009.
            tracing::warn!(client_id = %client.client_id, error = %e, "Revocation failed");
            state.audit.emit(
                AuditEvent::new(client.client_id.as_str(), AuditAction::Failed, target::REVOKE)
                    .with_metadata(json!({
                        "clientId": client.client_id,
                        "error": e.to_string(),
                        "action": "revoke_failed",
                    }))
                    .with_context(&context),
            );
            StatusCode::OK.into_response()
        }
    }
}

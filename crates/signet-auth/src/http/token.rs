//! Token endpoint.
//!
//! `POST /token` authenticates the client (HTTP Basic, body
//! credentials, or public), dispatches on `grant_type`, and answers
//! with either a token response or an RFC 6749 error body. Successful
//! responses carry `Cache-Control: no-store` and `Pragma: no-cache`.

use axum::Json;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::audit::{ACTOR_ANONYMOUS, AuditAction, AuditEvent, RequestContext, target};
use crate::error::AuthError;
use crate::oauth::{TokenRequest, authenticate_client, parse_basic_auth};
use crate::storage::with_timeout;

use super::AuthState;

pub async fn token_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    let context = RequestContext::from_headers(&headers);

    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_basic_auth);
    let basic_ref = basic
        .as_ref()
        .map(|(id, secret)| (id.as_str(), secret.as_str()));

    // The audit actor before authentication is the claimed client id.
    let claimed = basic_ref
        .map(|(id, _)| id)
        .or(request.client_id.as_deref())
        .unwrap_or(ACTOR_ANONYMOUS);

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
            tracing::debug!(error = %e, "Token endpoint client authentication failed");
            audit_failure(&state, claimed, &request.grant_type, &e, &context);
            return e.into_response();
        }
    };
    let client = &authenticated.client;

    let result = match request.grant_type.as_str() {
        "" => Err(AuthError::invalid_request("Missing grant_type parameter")),
        "authorization_code" => state.token_service.exchange_code(&request, client).await,
        "refresh_token" => state.token_service.refresh(&request, client).await,
        other => Err(AuthError::unsupported_grant_type(other)),
    };

    match result {
        Ok(response) => {
            state.audit.emit(
                AuditEvent::new(client.client_id.as_str(), AuditAction::Access, target::TOKEN)
                    .with_metadata(json!({
                        "clientId": client.client_id,
                        "grantType": request.grant_type,
                        "scope": response.scope,
                        "action": "issue_token",
                    }))
                    .with_context(&context),
            );
            tracing::info!(
                client_id = %client.client_id,
                grant_type = %request.grant_type,
                "Issued tokens"
            );
            (
                StatusCode::OK,
                [
                    (header::CACHE_CONTROL, "no-store"),
                    (header::PRAGMA, "no-cache"),
                ],
                Json(response),
            )
                .into_response()
        }
        Err(e) => {
            tracing::debug!(
                client_id = %client.client_id,
                grant_type = %request.grant_type,
                error = %e,
                "Token request failed"
            );
            audit_failure(&state, &client.client_id, &request.grant_type, &e, &context);
            e.into_response()
        }
    }
}

fn audit_failure(
    state: &AuthState,
    actor: &str,
    grant_type: &str,
    error: &AuthError,
    context: &RequestContext,
) {
    state.audit.emit(
        AuditEvent::new(actor, AuditAction::Failed, target::TOKEN)
            .with_metadata(json!({
                "clientId": actor,
                "grantType": grant_type,
                "error": error.to_string(),
                "action": "token_failed",
            }))
            .with_context(context),
    );
}

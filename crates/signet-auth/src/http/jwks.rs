//! JWKS endpoint.
//!
//! `GET /.well-known/jwks.json` publishes the RSA public key used to
//! sign ID tokens so relying parties can verify signatures offline.
//! Keys rotate rarely, so the same one hour cache lifetime as the
//! discovery document applies.

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use super::AuthState;

pub async fn jwks_handler(State(state): State<AuthState>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Json(state.signer.jwks()),
    )
}

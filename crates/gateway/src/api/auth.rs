//! Bearer-token authentication for the platform-neutral inbound route.
//!
//! The token is read once at startup from the env var named by
//! `config.server.api_token_env` (default `BB_API_TOKEN`) and only its
//! SHA-256 digest is kept in `AppState`.
//! - Token set: every request must carry `Authorization: Bearer <token>`.
//! - No token but Slack signing on: the route is closed. A deployment that
//!   authenticates Slack must not leave a second, unauthenticated door.
//! - Neither set: local development, requests pass.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::api_error;
use crate::state::AppState;

/// SHA-256 digest of a bearer token, as cached in `AppState`.
pub fn token_digest(token: &str) -> Vec<u8> {
    Sha256::digest(token.trim().as_bytes()).to_vec()
}

/// Axum middleware enforcing the bearer token. Attach via
/// `axum::middleware::from_fn_with_state`.
pub async fn require_api_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = &state.api_token_hash else {
        if state.slack_signing_secret.is_some() {
            tracing::warn!("rejecting inbound request: no API token configured");
            return api_error(StatusCode::UNAUTHORIZED, "invalid or missing API token");
        }
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    // Fixed-length digests so the comparison does not leak the token length.
    let provided = Sha256::digest(provided.as_bytes());
    if !bool::from(provided.ct_eq(expected.as_slice())) {
        return api_error(StatusCode::UNAUTHORIZED, "invalid or missing API token");
    }

    next.run(req).await
}

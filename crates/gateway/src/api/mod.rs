pub mod auth;
pub mod health;
pub mod inbound;
pub mod slack;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the API router.
///
/// The Slack route sits behind request-signature verification and the
/// inbound route behind bearer-token auth; `state` is needed to wire both
/// middlewares at build time. `/health` is open.
pub fn router(state: AppState) -> Router<AppState> {
    let slack = Router::new()
        .route("/slack/events", post(slack::slash_command))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            slack::verify_signature,
        ));

    let inbound = Router::new()
        .route("/v1/inbound", post(inbound::inbound))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(inbound)
        .merge(slack)
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

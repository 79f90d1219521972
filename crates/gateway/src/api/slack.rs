//! Slack slash-command front door.
//!
//! `POST /slack/events` receives the form-encoded slash-command payload,
//! queues the text for the thread and answers within Slack's three-second
//! window with the configured acknowledgement. The real answer is posted
//! later to the command's `response_url`.
//!
//! When a signing secret is configured, [`verify_signature`] checks
//! `X-Slack-Signature: v0=<hex>` (HMAC-SHA256 over
//! `v0:{timestamp}:{raw body}`) and the request age before the handler runs.

use axum::body::Body;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::api::api_error;
use crate::runtime::InboundMessage;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Slash-command payloads are small; anything larger is not from Slack.
const MAX_BODY_BYTES: usize = 64 * 1024;

pub const USAGE_HINT: &str =
    "Tell me what to change on the board, e.g. \"create a card titled Fix login in To Do\".";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Payload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SlashCommand {
    #[serde(default)]
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub response_url: Option<String>,
    /// Unique per invocation; Slack reuses it when it retries a delivery.
    #[serde(default)]
    pub trigger_id: Option<String>,
}

impl SlashCommand {
    /// `slack:{team}:{channel}:{user}`, or `slack:{channel}:{user}` when
    /// the payload has no team.
    pub fn thread_id(&self) -> String {
        match self.team_id.as_deref().filter(|t| !t.is_empty()) {
            Some(team) => format!("slack:{team}:{}:{}", self.channel_id, self.user_id),
            None => format!("slack:{}:{}", self.channel_id, self.user_id),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /slack/events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn slash_command(State(state): State<AppState>, Form(cmd): Form<SlashCommand>) -> Response {
    let text = cmd.text.trim();
    if text.is_empty() {
        return Json(serde_json::json!({
            "response_type": "ephemeral",
            "text": USAGE_HINT,
        }))
        .into_response();
    }

    let thread_id = cmd.thread_id();
    let ack = &state.config.slack.ack_text;

    if let Some(trigger_id) = cmd.trigger_id.as_deref().filter(|t| !t.is_empty()) {
        if !state.dedupe.check_and_insert(trigger_id) {
            tracing::info!(thread_id = %thread_id, trigger_id, "duplicate slash command ignored");
            return Json(serde_json::json!({
                "response_type": "in_channel",
                "text": ack,
                "duplicate": true,
            }))
            .into_response();
        }
    }

    tracing::info!(thread_id = %thread_id, user_id = %cmd.user_id, "slash command accepted");
    state.dispatcher.dispatch(InboundMessage {
        thread_id,
        user_id: cmd.user_id.clone(),
        text: text.to_owned(),
        response_url: cmd.response_url.clone().filter(|u| !u.is_empty()),
    });

    Json(serde_json::json!({
        "response_type": "in_channel",
        "text": ack,
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Signature verification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature headers")]
    Missing,
    #[error("malformed request timestamp")]
    BadTimestamp,
    #[error("request timestamp outside the allowed window")]
    Expired,
    #[error("signature mismatch")]
    Mismatch,
}

/// Axum middleware enforcing Slack request signing. Attach via
/// `axum::middleware::from_fn_with_state`. A no-op when no secret is
/// configured.
pub async fn verify_signature(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(secret) = state.slack_signing_secret.clone() else {
        return next.run(req).await;
    };

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return api_error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"),
    };

    let checked = verify(
        secret.as_bytes(),
        &parts.headers,
        &bytes,
        chrono::Utc::now().timestamp(),
        state.config.slack.max_request_age_secs,
    );
    if let Err(e) = checked {
        tracing::warn!(error = %e, uri = %parts.uri, "rejected slack request");
        return api_error(StatusCode::UNAUTHORIZED, "invalid request signature");
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Check the `v0` signature headers against `body` as of `now` (unix secs).
pub fn verify(
    secret: &[u8],
    headers: &HeaderMap,
    body: &[u8],
    now: i64,
    max_age_secs: u64,
) -> Result<(), SignatureError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let (Some(timestamp), Some(signature)) = (
        header("x-slack-request-timestamp"),
        header("x-slack-signature"),
    ) else {
        return Err(SignatureError::Missing);
    };

    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::BadTimestamp)?;
    if now.abs_diff(ts) > max_age_secs {
        return Err(SignatureError::Expired);
    }

    let expected = sign(secret, timestamp.trim(), body)?;
    if bool::from(expected.as_bytes().ct_eq(signature.trim().as_bytes())) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// `v0=` + hex HMAC-SHA256 of `v0:{timestamp}:{body}`.
pub fn sign(secret: &[u8], timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Mismatch)?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}

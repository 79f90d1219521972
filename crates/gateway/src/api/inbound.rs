//! Normalized inbound contract.
//!
//! `POST /v1/inbound` accepts an already-authenticated message from any
//! connector, queues it on the dispatcher and answers `202` right away.
//! The reply travels back through the reply sink, not this response.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::api::api_error;
use crate::runtime::InboundMessage;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct InboundEnvelope {
    /// Opaque conversation key; one session per value.
    pub thread_id: String,
    pub user_id: String,
    pub text: String,
    /// Where to post the reply. Falls back to the configured webhook.
    #[serde(default)]
    pub response_url: Option<String>,
    /// Connector-assigned id used to drop redeliveries.
    #[serde(default)]
    pub event_id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/inbound
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn inbound(
    State(state): State<AppState>,
    Json(body): Json<InboundEnvelope>,
) -> Response {
    if body.thread_id.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "thread_id must not be empty");
    }
    let text = body.text.trim();
    if text.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "text must not be empty");
    }

    if let Some(event_id) = body.event_id.as_deref().filter(|id| !id.is_empty()) {
        if !state.dedupe.check_and_insert(event_id) {
            tracing::info!(thread_id = %body.thread_id, event_id, "duplicate inbound event ignored");
            return (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({
                    "thread_id": body.thread_id,
                    "queued": false,
                    "duplicate": true,
                })),
            )
                .into_response();
        }
    }

    state.dispatcher.dispatch(InboundMessage {
        thread_id: body.thread_id.clone(),
        user_id: body.user_id,
        text: text.to_owned(),
        response_url: body.response_url.filter(|u| !u.is_empty()),
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "thread_id": body.thread_id,
            "queued": true,
        })),
    )
        .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Idempotency
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Remembers delivery ids for `ttl` so platform retries are acknowledged
/// without being processed twice.
pub struct DedupeStore {
    ttl: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl DedupeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// `true` the first time `key` is seen within the TTL, `false` for a
    /// repeat.
    pub fn check_and_insert(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock();
        match seen.get(key) {
            Some(at) if now.duration_since(*at) < self.ttl => false,
            _ => {
                seen.insert(key.to_owned(), now);
                true
            }
        }
    }

    /// Forget keys older than the TTL. Called by the background sweeper.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut seen = self.seen.lock();
        let before = seen.len();
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);
        before - seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::{FakeLlm, Harness};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn post(state: &AppState, body: Value) -> (StatusCode, Value) {
        let app = crate::api::router(state.clone()).with_state(state.clone());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/inbound")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn wait_for(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn queues_message_and_replies_in_background() {
        let h = Harness::new(FakeLlm::scripted(&[r#"{"response": "Which list?"}"#]));
        let state = AppState::for_tests(&h, None);

        let (status, body) = post(
            &state,
            json!({ "thread_id": "cli:1", "user_id": "U1", "text": "Create a card" }),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["queued"], true);

        wait_for(|| h.sink.sent().len() == 1).await;
        assert_eq!(h.sink.texts(), vec!["Which list?"]);
        assert_eq!(h.sessions.transcript("cli:1").len(), 2);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let h = Harness::new(FakeLlm::scripted(&[]));
        let state = AppState::for_tests(&h, None);

        let (status, body) = post(
            &state,
            json!({ "thread_id": "cli:1", "user_id": "U1", "text": "   " }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("text"));
        assert_eq!(state.dispatcher.worker_count(), 0);
    }

    #[tokio::test]
    async fn redelivered_event_is_acknowledged_once() {
        let h = Harness::new(FakeLlm::scripted(&[r#"{"response": "Title?"}"#]));
        let state = AppState::for_tests(&h, None);
        let envelope = json!({
            "thread_id": "cli:1", "user_id": "U1", "text": "Create a card", "event_id": "ev-1"
        });

        let (_, first) = post(&state, envelope.clone()).await;
        let (status, second) = post(&state, envelope).await;
        assert_eq!(first["queued"], true);
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(second["duplicate"], true);

        wait_for(|| h.sink.sent().len() == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.llm.requests().len(), 1);
    }

    #[test]
    fn dedupe_expires_after_ttl() {
        let store = DedupeStore::new(Duration::from_millis(0));
        assert!(store.check_and_insert("a"));
        assert!(store.check_and_insert("a"));
        assert_eq!(store.prune(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn dedupe_rejects_repeats_within_ttl() {
        let store = DedupeStore::new(Duration::from_secs(600));
        assert!(store.check_and_insert("a"));
        assert!(!store.check_and_insert("a"));
        assert!(store.check_and_insert("b"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.prune(), 0);
    }
}

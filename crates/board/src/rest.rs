//! REST implementation of the board traits against the Trello API.
//!
//! `TrelloClient` wraps a `reqwest::Client`. Snapshot reads retry with
//! exponential back-off on transient (5xx / timeout / connect) failures;
//! actions are sent exactly once.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bb_domain::action::{ActionDescriptor, ActionMethod};
use bb_domain::board::{BoardList, BoardSnapshot, Card};
use bb_domain::config::BoardConfig;
use bb_domain::error::{Error, Result};
use bb_domain::trace::TraceEvent;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::provider::{ActionExecutor, ActionOutcome, BoardSnapshotProvider};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credentials
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trello API key + token, sent as `key` / `token` parameters.
#[derive(Clone, Default)]
pub struct BoardCredentials {
    pub key: String,
    pub token: String,
}

impl BoardCredentials {
    /// Read both values from the env vars named in the config. Missing
    /// values are left empty (the board will answer 401).
    pub fn from_env(cfg: &BoardConfig) -> Self {
        let read = |name: &str| std::env::var(name).unwrap_or_default();
        let creds = Self {
            key: read(&cfg.api_key_env),
            token: read(&cfg.api_token_env),
        };
        if creds.key.is_empty() || creds.token.is_empty() {
            tracing::warn!(
                key_env = %cfg.api_key_env,
                token_env = %cfg.api_token_env,
                "board credentials not set; board calls will be rejected"
            );
        }
        creds
    }

    fn pairs(&self) -> [(&str, &str); 2] {
        [("key", self.key.as_str()), ("token", self.token.as_str())]
    }
}

impl std::fmt::Debug for BoardCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardCredentials")
            .field("key", &"<redacted>")
            .field("token", &"<redacted>")
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Created once at startup and shared; the inner `reqwest::Client` keeps a
/// connection pool.
#[derive(Debug, Clone)]
pub struct TrelloClient {
    http: Client,
    base_url: String,
    board_id: String,
    credentials: BoardCredentials,
    max_read_retries: u32,
}

impl TrelloClient {
    pub fn new(cfg: &BoardConfig, credentials: BoardCredentials) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            board_id: cfg.board_id.clone(),
            credentials,
            max_read_retries: cfg.max_read_retries,
        })
    }

    /// [`TrelloClient::new`] with credentials read from the environment.
    pub fn from_config(cfg: &BoardConfig) -> Result<Self> {
        Self::new(cfg, BoardCredentials::from_env(cfg))
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    // ── request helpers ──────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::Board(format!("invalid board URL for '{path}': {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let mut url = self.url(path)?;
        url.query_pairs_mut().extend_pairs(self.credentials.pairs());
        let endpoint = format!("GET {path}");

        let resp = self
            .execute_with_retry(&endpoint, || self.http.get(url.clone()))
            .await?;
        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Board(format!("failed to parse {endpoint} response: {e}")))
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a read with retry + exponential back-off on transient errors.
    ///
    /// * Retries on 5xx status codes, timeouts and connection errors.
    /// * Does **not** retry on 4xx (client errors are permanent).
    /// * Emits a `TraceEvent::BoardCall` after every attempt.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_read_retries {
            if attempt > 0 {
                tokio::time::sleep(retry_backoff(attempt)).await;
            }

            let start = Instant::now();
            let result = build_request().send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    TraceEvent::BoardCall {
                        endpoint: endpoint.to_owned(),
                        status,
                        duration_ms,
                    }
                    .emit();

                    if resp.status().is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::BoardStatus { status, body });
                        continue;
                    }
                    if !resp.status().is_success() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::BoardStatus { status, body });
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    TraceEvent::BoardCall {
                        endpoint: endpoint.to_owned(),
                        status: 0,
                        duration_ms,
                    }
                    .emit();
                    last_err = Some(from_reqwest(e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Board(format!("{endpoint}: all retries exhausted"))))
    }

    /// Build the single request for an action: auth merged into a copy of
    /// the parameters, body for create/update, query for read/delete.
    fn build_action_request(&self, action: &ActionDescriptor) -> Result<RequestBuilder> {
        let mut url = self.url(action.endpoint())?;
        if let Some(raw) = action.url_params() {
            url.set_query(Some(raw));
        }

        let params = action.parameters_with(&self.credentials.pairs());
        let method = match action.method() {
            ActionMethod::Create => Method::POST,
            ActionMethod::Read => Method::GET,
            ActionMethod::Update => Method::PUT,
            ActionMethod::Delete => Method::DELETE,
        };

        if action.method().sends_body() {
            Ok(self.http.request(method, url).json(&params))
        } else {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), query_value(v))));
            Ok(self.http.request(method, url))
        }
    }
}

/// Render a parameter value for a query string. Strings go in unquoted;
/// everything else as its JSON text.
fn query_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Delay before retry `attempt` (1-based): 100 ms doubling, capped at 5 s.
fn retry_backoff(attempt: u32) -> Duration {
    let ms = 100u64.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    Duration::from_millis(ms.min(MAX_BACKOFF_MS))
}

const MAX_BACKOFF_MS: u64 = 5_000;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl BoardSnapshotProvider for TrelloClient {
    async fn snapshot(&self) -> Result<BoardSnapshot> {
        if self.board_id.is_empty() {
            return Err(Error::Config("board.board_id is not set".into()));
        }
        let start = Instant::now();
        let cards_path = format!("/boards/{}/cards", self.board_id);
        let lists_path = format!("/boards/{}/lists", self.board_id);

        let (cards, lists): (Vec<Card>, Vec<BoardList>) = tokio::try_join!(
            self.get_json(&cards_path),
            self.get_json(&lists_path)
        )?;

        TraceEvent::SnapshotFetched {
            board_id: self.board_id.clone(),
            cards: cards.len(),
            lists: lists.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();

        Ok(BoardSnapshot { cards, lists })
    }
}

#[async_trait]
impl ActionExecutor for TrelloClient {
    async fn execute(&self, action: &ActionDescriptor) -> Result<ActionOutcome> {
        let endpoint = format!("{} {}", action.method(), action.endpoint());
        let request = self.build_action_request(action)?;

        let start = Instant::now();
        let result = request.send().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                TraceEvent::BoardCall {
                    endpoint,
                    status: 0,
                    duration_ms,
                }
                .emit();
                return Err(from_reqwest(e));
            }
        };

        let status = resp.status();
        TraceEvent::BoardCall {
            endpoint: endpoint.clone(),
            status: status.as_u16(),
            duration_ms,
        }
        .emit();

        let body = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            tracing::warn!(%endpoint, status = status.as_u16(), %body, "board rejected action");
            return Err(Error::BoardStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(ActionOutcome {
            status_code: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(retry_backoff(1), Duration::from_millis(100));
        assert_eq!(retry_backoff(3), Duration::from_millis(400));
        assert_eq!(retry_backoff(40), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(retry_backoff(u32::MAX), Duration::from_millis(MAX_BACKOFF_MS));
    }

    fn client(base_url: &str, retries: u32) -> TrelloClient {
        let cfg = BoardConfig {
            base_url: base_url.into(),
            board_id: "B1".into(),
            max_read_retries: retries,
            timeout_ms: 2_000,
            ..BoardConfig::default()
        };
        let creds = BoardCredentials {
            key: "k".into(),
            token: "t".into(),
        };
        TrelloClient::new(&cfg, creds).unwrap()
    }

    async fn mount_lists(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/boards/B1/lists"))
            .and(query_param("key", "k"))
            .and(query_param("token", "t"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "L1", "name": "To Do", "closed": false, "pos": 1 }
            ])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn snapshot_fetches_cards_and_lists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boards/B1/cards"))
            .and(query_param("key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "c1", "name": "Fix login", "idList": "L1", "desc": "", "closed": false, "badges": {} }
            ])))
            .expect(1)
            .mount(&server)
            .await;
        mount_lists(&server).await;

        let snap = client(&server.uri(), 0).snapshot().await.unwrap();
        assert_eq!(snap.cards.len(), 1);
        assert_eq!(snap.cards[0].id_list, "L1");
        assert_eq!(snap.lists[0].name, "To Do");
    }

    #[tokio::test]
    async fn snapshot_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boards/B1/cards"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/boards/B1/cards"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        mount_lists(&server).await;

        let snap = client(&server.uri(), 2).snapshot().await.unwrap();
        assert!(snap.cards.is_empty());
        assert_eq!(snap.lists.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boards/B1/cards"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .expect(1)
            .mount(&server)
            .await;
        mount_lists(&server).await;

        let err = client(&server.uri(), 3).snapshot().await.unwrap_err();
        assert!(matches!(err, Error::BoardStatus { status: 401, .. }));
    }

    #[tokio::test]
    async fn snapshot_without_board_id_fails_fast() {
        let cfg = BoardConfig::default();
        let client = TrelloClient::new(&cfg, BoardCredentials::default()).unwrap();
        assert!(matches!(client.snapshot().await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn create_sends_json_body_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cards"))
            .and(query_param("idList", "L1"))
            .and(body_json(json!({ "name": "X", "key": "k", "token": "t" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "c9" })))
            .expect(1)
            .mount(&server)
            .await;

        let mut params = Map::new();
        params.insert("name".into(), json!("X"));
        let action = ActionDescriptor::new("/cards", ActionMethod::Create)
            .unwrap()
            .with_parameters(params)
            .with_url_params("?idList=L1");

        let outcome = client(&server.uri(), 0).execute(&action).await.unwrap();
        assert_eq!(outcome.status_code, 200);
        assert!(outcome.body.contains("c9"));
        // Auth was merged into a copy only.
        assert!(action.parameters().get("key").is_none());
    }

    #[tokio::test]
    async fn delete_sends_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/cards/c1"))
            .and(query_param("key", "k"))
            .and(query_param("token", "t"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let action = ActionDescriptor::new("/cards/c1", ActionMethod::Delete).unwrap();
        client(&server.uri(), 0).execute(&action).await.unwrap();
    }

    #[tokio::test]
    async fn read_action_uses_get() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cards/c1"))
            .and(query_param("fields", "name"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"name":"X"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut params = Map::new();
        params.insert("fields".into(), json!("name"));
        let action = ActionDescriptor::new("/cards/c1", ActionMethod::Read)
            .unwrap()
            .with_parameters(params);
        let outcome = client(&server.uri(), 0).execute(&action).await.unwrap();
        assert!(outcome.body.contains("\"X\""));
    }

    #[tokio::test]
    async fn rejected_action_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/cards/c1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let action = ActionDescriptor::new("/cards/c1", ActionMethod::Update).unwrap();
        let err = client(&server.uri(), 5).execute(&action).await.unwrap_err();
        match err {
            Error::BoardStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn query_values_render_without_json_quotes() {
        assert_eq!(query_value(&json!("L1")), "L1");
        assert_eq!(query_value(&json!(true)), "true");
        assert_eq!(query_value(&json!(3)), "3");
    }

    #[test]
    fn credentials_are_redacted_in_debug() {
        let creds = BoardCredentials {
            key: "secret-key".into(),
            token: "secret-token".into(),
        };
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("secret"));
    }
}

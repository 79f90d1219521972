use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use bb_domain::config::Config;
use bb_providers::ProviderRegistry;
use bb_sessions::SessionStore;

use crate::api::inbound::DedupeStore;
use crate::runtime::{Dispatcher, Orchestrator};

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services** - config, LLM providers
/// - **Conversation** - sessions, orchestrator, dispatcher
/// - **Inbound** - idempotency store, request signing, API token
/// - **Lifecycle** - shutdown token for background tasks
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub llm: Arc<ProviderRegistry>,

    // ── Conversation ──────────────────────────────────────────────────
    pub sessions: Arc<SessionStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub dispatcher: Arc<Dispatcher>,

    // ── Inbound ───────────────────────────────────────────────────────
    /// Idempotency store for platform retries.
    pub dedupe: Arc<DedupeStore>,
    /// Slack signing secret (read once at startup).
    /// `None` = signature verification disabled.
    pub slack_signing_secret: Option<Arc<str>>,
    /// SHA-256 digest of the API bearer token (read once at startup).
    /// `None` = no token configured; see [`crate::api::auth`].
    pub api_token_hash: Option<Vec<u8>>,

    // ── Lifecycle ─────────────────────────────────────────────────────
    /// Cancelled on shutdown; background loops watch it.
    pub shutdown: CancellationToken,
}

#[cfg(test)]
impl AppState {
    /// State wired to the in-crate fakes of a test harness.
    pub(crate) fn for_tests(
        harness: &crate::runtime::testing::Harness,
        signing_secret: Option<&str>,
    ) -> Self {
        let config = Arc::new(crate::runtime::testing::test_config());
        let dispatcher = Arc::new(Dispatcher::new(
            harness.orchestrator.clone(),
            std::time::Duration::from_secs(5),
        ));
        Self {
            config,
            llm: Arc::new(ProviderRegistry::default()),
            sessions: harness.sessions.clone(),
            orchestrator: harness.orchestrator.clone(),
            dispatcher,
            dedupe: Arc::new(DedupeStore::new(std::time::Duration::from_secs(600))),
            slack_signing_secret: signing_secret.map(Arc::from),
            api_token_hash: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Require `token` as the API bearer token.
    pub(crate) fn with_api_token(mut self, token: &str) -> Self {
        self.api_token_hash = Some(crate::api::auth::token_digest(token));
        self
    }
}

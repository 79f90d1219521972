//! AppState construction and background-task spawning.
//!
//! `serve` and `chat` share this boot path; they differ only in where
//! replies go (Slack webhook vs. the terminal).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use bb_board::TrelloClient;
use bb_domain::config::{Config, ConfigSeverity};
use bb_providers::ProviderRegistry;
use bb_sessions::SessionStore;

use crate::api::auth::token_digest;
use crate::api::inbound::DedupeStore;
use crate::runtime::{DialogueGateway, Dispatcher, Orchestrator, ReplySink};
use crate::state::AppState;

/// How long a platform delivery id is remembered for retry suppression.
const DEDUPE_TTL: Duration = Duration::from_secs(600);

/// Log every config issue and fail if any of them is an error.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`]. `replies` decides where turn results are delivered.
pub fn build_app_state(
    config: Arc<Config>,
    replies: Arc<dyn ReplySink>,
) -> anyhow::Result<AppState> {
    validate_config(&config)?;

    // ── LLM providers ────────────────────────────────────────────────
    let llm = Arc::new(ProviderRegistry::from_config(&config.llm));
    if llm.is_empty() {
        tracing::warn!("no LLM providers initialized; every turn will fail until one is configured");
    } else {
        tracing::info!(providers = llm.len(), model = %config.llm.model, "LLM provider registry ready");
    }

    // ── Board client ─────────────────────────────────────────────────
    let board = Arc::new(
        TrelloClient::from_config(&config.board).context("initializing board client")?,
    );
    tracing::info!(board_id = %config.board.board_id, "board client ready");

    // ── Conversation core ────────────────────────────────────────────
    let sessions = Arc::new(SessionStore::new(&config.sessions));
    let gateway = Arc::new(DialogueGateway::new(&config, llm.clone(), board.clone()));
    let orchestrator = Arc::new(Orchestrator::new(
        &config.orchestrator,
        sessions.clone(),
        gateway,
        board,
        replies,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        orchestrator.clone(),
        Duration::from_secs(config.orchestrator.worker_idle_secs),
    ));
    tracing::info!(
        idle_minutes = config.sessions.idle_minutes,
        on_action_failure = ?config.orchestrator.on_action_failure,
        "conversation runtime ready"
    );

    // ── Inbound ──────────────────────────────────────────────────────
    let dedupe = Arc::new(DedupeStore::new(DEDUPE_TTL));
    let slack_signing_secret = config.slack.signing_secret().map(Arc::<str>::from);
    if slack_signing_secret.is_none() {
        tracing::warn!(
            env = %config.slack.signing_secret_env,
            "no Slack signing secret set; /slack/events accepts unsigned requests"
        );
    }

    // ── API token (read once, hash for constant-time comparison) ────
    let api_token_hash = match config.server.api_token() {
        Some(token) => {
            tracing::info!(env = %config.server.api_token_env, "API bearer-token auth enabled");
            Some(token_digest(&token))
        }
        None if slack_signing_secret.is_some() => {
            tracing::warn!(
                env = %config.server.api_token_env,
                "no API token set; /v1/inbound rejects every request"
            );
            None
        }
        None => {
            tracing::warn!(
                env = %config.server.api_token_env,
                "no API token set; /v1/inbound accepts unauthenticated requests"
            );
            None
        }
    };

    Ok(AppState {
        config,
        llm,
        sessions,
        orchestrator,
        dispatcher,
        dedupe,
        slack_signing_secret,
        api_token_hash,
        shutdown: tokio_util::sync::CancellationToken::new(),
    })
}

/// Spawn the long-running background tasks (idle-session sweep, dedupe
/// pruning). They stop when `state.shutdown` is cancelled.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Idle session sweep ───────────────────────────────────────────
    {
        let sessions = state.sessions.clone();
        let dedupe = state.dedupe.clone();
        let shutdown = state.shutdown.clone();
        let every = Duration::from_secs(state.config.sessions.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let expired = sessions.expire_idle(chrono::Utc::now());
                if !expired.is_empty() {
                    tracing::info!(count = expired.len(), "expired idle sessions");
                }
                let pruned = dedupe.prune();
                if pruned > 0 {
                    tracing::debug!(pruned, "pruned dedupe entries");
                }
            }
            tracing::debug!("session sweeper stopped");
        });
    }
    tracing::info!("background tasks spawned");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::{test_config, RecordingSink};

    #[tokio::test]
    async fn builds_state_from_valid_config() {
        let state = build_app_state(Arc::new(test_config()), RecordingSink::new()).unwrap();
        assert!(state.sessions.is_empty());
        assert_eq!(state.dispatcher.worker_count(), 0);
        assert!(state.dedupe.is_empty());
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        let mut config = test_config();
        config.server.port = 0;
        let Err(err) = build_app_state(Arc::new(config), RecordingSink::new()) else {
            panic!("expected a config error");
        };
        assert!(err.to_string().contains("1 error"));
    }

    #[tokio::test]
    async fn sweeper_stops_on_shutdown() {
        let mut config = test_config();
        config.sessions.sweep_interval_secs = 1;
        let state = build_app_state(Arc::new(config), RecordingSink::new()).unwrap();
        spawn_background_tasks(&state);
        state.shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(state.shutdown.is_cancelled());
    }

    #[test]
    fn malformed_model_spec_is_an_error() {
        let mut config = test_config();
        config.llm.model = "no-slash".into();
        assert!(validate_config(&config).is_err());
        assert!(validate_config(&test_config()).is_ok());
    }
}

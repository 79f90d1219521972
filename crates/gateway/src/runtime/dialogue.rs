//! Dialogue model gateway.
//!
//! Builds the system context from a board snapshot fetched for every turn
//! and sends it together with the session transcript to the configured
//! model. When the board read fails the last good snapshot is reused and
//! marked stale; with no earlier snapshot the model sees an empty board
//! marked unavailable.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use bb_board::BoardSnapshotProvider;
use bb_domain::board::BoardSnapshot;
use bb_domain::config::Config;
use bb_domain::error::{Error, Result};
use bb_domain::message::Message;
use bb_domain::trace::TraceEvent;
use bb_providers::{ChatRequest, ProviderRegistry};
use bb_sessions::Turn;

use super::prompt::{render_system_context, Grounding, DEFAULT_SYSTEM_PROMPT};

/// The system context for one turn.
#[derive(Debug)]
pub struct SystemContext {
    pub text: String,
    pub grounding: Grounding,
    /// Why the live snapshot could not be used, if it could not.
    pub degraded: Option<Error>,
}

pub struct DialogueGateway {
    llm: Arc<ProviderRegistry>,
    board: Arc<dyn BoardSnapshotProvider>,
    model_spec: String,
    temperature: f32,
    max_tokens: Option<u32>,
    json_mode: bool,
    board_id: String,
    template: String,
    snapshot_timeout: Duration,
    last_snapshot: RwLock<Option<BoardSnapshot>>,
}

impl DialogueGateway {
    pub fn new(
        config: &Config,
        llm: Arc<ProviderRegistry>,
        board: Arc<dyn BoardSnapshotProvider>,
    ) -> Self {
        Self {
            llm,
            board,
            model_spec: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            json_mode: config.llm.json_mode,
            board_id: config.board.board_id.clone(),
            template: config
                .orchestrator
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_owned()),
            snapshot_timeout: Duration::from_millis(config.orchestrator.snapshot_timeout_ms),
            last_snapshot: RwLock::new(None),
        }
    }

    /// Fetch the board and render the system context. Never fails; a read
    /// that errors or outlasts the snapshot budget degrades the grounding.
    pub async fn build_system_context(&self) -> SystemContext {
        let fetched = match tokio::time::timeout(self.snapshot_timeout, self.board.snapshot()).await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "board snapshot took longer than {}ms",
                self.snapshot_timeout.as_millis()
            ))),
        };
        let (snapshot, grounding, degraded) = match fetched {
            Ok(snapshot) => {
                *self.last_snapshot.write() = Some(snapshot.clone());
                (snapshot, Grounding::Fresh, None)
            }
            Err(e) => {
                let cached = self.last_snapshot.read().clone();
                TraceEvent::SnapshotDegraded {
                    board_id: self.board_id.clone(),
                    stale: cached.is_some(),
                    error: e.to_string(),
                }
                .emit();
                match cached {
                    Some(snapshot) => (snapshot, Grounding::Stale, Some(e)),
                    None => (BoardSnapshot::default(), Grounding::Unavailable, Some(e)),
                }
            }
        };

        SystemContext {
            text: render_system_context(&self.template, &self.board_id, &snapshot, grounding),
            grounding,
            degraded,
        }
    }

    /// Send the system context and the transcript, in order, to the model
    /// and return its raw reply text.
    pub async fn converse(&self, system_context: &str, transcript: &[Turn]) -> Result<String> {
        let (provider, model) = self.llm.resolve(&self.model_spec)?;

        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(Message::system(system_context));
        messages.extend(transcript.iter().map(Turn::to_message));

        let req = ChatRequest {
            messages,
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
            json_mode: self.json_mode,
            model: Some(model.clone()),
        };

        let started = Instant::now();
        let resp = provider.chat(&req).await?;

        TraceEvent::LlmRequest {
            provider: provider.provider_id().to_owned(),
            model: resp.model.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            prompt_tokens: resp.usage.map(|u| u.prompt_tokens),
            completion_tokens: resp.usage.map(|u| u.completion_tokens),
        }
        .emit();

        if resp.content.trim().is_empty() {
            tracing::debug!(model = %model, finish_reason = ?resp.finish_reason, "model returned empty content");
        }
        Ok(resp.content)
    }
}

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Bounds the model call only; the board snapshot has its own budget.
    #[serde(default = "d_60000")]
    pub gateway_timeout_ms: u64,
    /// Budget for the per-turn board read, retries included. On expiry the
    /// turn continues on stale or empty grounding.
    #[serde(default = "d_10000")]
    pub snapshot_timeout_ms: u64,
    #[serde(default = "d_20000")]
    pub executor_timeout_ms: u64,
    #[serde(default)]
    pub on_action_failure: ActionFailurePolicy,
    /// Per-thread workers exit after this long without messages.
    #[serde(default = "d_300")]
    pub worker_idle_secs: u64,
    /// Replaces the built-in instruction template. Supports the
    /// `{board_id}` and `{board_data}` placeholders.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            gateway_timeout_ms: d_60000(),
            snapshot_timeout_ms: d_10000(),
            executor_timeout_ms: d_20000(),
            on_action_failure: ActionFailurePolicy::default(),
            worker_idle_secs: d_300(),
            system_prompt: None,
        }
    }
}

/// What the user hears when the board rejects a completed action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionFailurePolicy {
    /// Send an explicit failure notice and keep the session open.
    #[default]
    ReportFailure,
    /// Send the model's reply anyway and retire the session.
    SendModelReply,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_60000() -> u64 {
    60_000
}
fn d_10000() -> u64 {
    10_000
}
fn d_20000() -> u64 {
    20_000
}
fn d_300() -> u64 {
    300
}

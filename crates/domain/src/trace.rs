use serde::Serialize;

/// Structured trace events emitted across all boardbridge crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        thread_id: String,
        session_id: String,
    },
    SessionRetired {
        thread_id: String,
        session_id: String,
        turns: usize,
    },
    SessionExpired {
        thread_id: String,
        session_id: String,
        reason: String,
    },
    TurnAppended {
        thread_id: String,
        speaker: String,
        turns: usize,
    },
    LlmRequest {
        provider: String,
        model: String,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    SnapshotFetched {
        board_id: String,
        cards: usize,
        lists: usize,
        duration_ms: u64,
    },
    SnapshotDegraded {
        board_id: String,
        stale: bool,
        error: String,
    },
    BoardCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
    ActionExecuted {
        thread_id: String,
        method: String,
        endpoint: String,
        status: u16,
    },
    ActionFailed {
        thread_id: String,
        method: String,
        endpoint: String,
        error: String,
    },
    ModelOutputRejected {
        thread_id: String,
        raw_chars: usize,
        reason: String,
    },
    ReplySent {
        thread_id: String,
        chars: usize,
    },
    ReplyFailed {
        thread_id: String,
        error: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "bb_event");
    }
}

use async_trait::async_trait;
use bb_domain::action::ActionDescriptor;
use bb_domain::board::BoardSnapshot;
use bb_domain::error::Result;

/// Reads the current board state. Implementations must not cache; every
/// call reflects the board as it is now.
#[async_trait]
pub trait BoardSnapshotProvider: Send + Sync {
    async fn snapshot(&self) -> Result<BoardSnapshot>;
}

/// Performs one action against the board. Never retried: a create that
/// timed out may still have happened.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Non-2xx responses are returned as `Error::BoardStatus`.
    async fn execute(&self, action: &ActionDescriptor) -> Result<ActionOutcome>;
}

/// Successful board response.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub status_code: u16,
    pub body: String,
}

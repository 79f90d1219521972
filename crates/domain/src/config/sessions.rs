use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// A session untouched for this many minutes is expired by the sweeper.
    /// `0` disables idle expiry.
    #[serde(default = "d_60")]
    pub idle_minutes: u32,
    /// Upper bound on live sessions; the least recently updated one is
    /// evicted to make room.
    #[serde(default = "d_10000")]
    pub max_sessions: usize,
    #[serde(default = "d_60u")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_minutes: d_60(),
            max_sessions: d_10000(),
            sweep_interval_secs: d_60u(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_60() -> u32 {
    60
}
fn d_60u() -> u64 {
    60
}
fn d_10000() -> usize {
    10_000
}

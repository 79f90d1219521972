use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Board service (Trello REST)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub board_id: String,
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_api_token_env")]
    pub api_token_env: String,
    #[serde(default = "d_15000")]
    pub timeout_ms: u64,
    /// Retries for snapshot reads only. Actions are never retried.
    #[serde(default = "d_2")]
    pub max_read_retries: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            board_id: String::new(),
            api_key_env: d_api_key_env(),
            api_token_env: d_api_token_env(),
            timeout_ms: d_15000(),
            max_read_retries: d_2(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://api.trello.com/1".into()
}
fn d_api_key_env() -> String {
    "TRELLO_API_KEY".into()
}
fn d_api_token_env() -> String {
    "TRELLO_API_TOKEN".into()
}
fn d_15000() -> u64 {
    15_000
}
fn d_2() -> u32 {
    2
}

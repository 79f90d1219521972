use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slack front door + replies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Env var holding the signing secret. When the variable is unset or
    /// empty, request signatures are not verified.
    #[serde(default = "d_signing_secret_env")]
    pub signing_secret_env: String,
    /// Env var holding the incoming-webhook URL used when an inbound
    /// message carries no `response_url`.
    #[serde(default = "d_webhook_url_env")]
    pub webhook_url_env: String,
    /// Text returned immediately to the slash command.
    #[serde(default = "d_ack_text")]
    pub ack_text: String,
    #[serde(default = "d_10000")]
    pub timeout_ms: u64,
    /// Signed requests older than this are rejected (replay window).
    #[serde(default = "d_300")]
    pub max_request_age_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            signing_secret_env: d_signing_secret_env(),
            webhook_url_env: d_webhook_url_env(),
            ack_text: d_ack_text(),
            timeout_ms: d_10000(),
            max_request_age_secs: d_300(),
        }
    }
}

impl SlackConfig {
    /// Resolve the signing secret from the environment. Empty counts as unset.
    pub fn signing_secret(&self) -> Option<String> {
        read_env(&self.signing_secret_env)
    }

    pub fn webhook_url(&self) -> Option<String> {
        read_env(&self.webhook_url_env)
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// ── serde default helpers ───────────────────────────────────────────

fn d_signing_secret_env() -> String {
    "SLACK_SIGNING_SECRET".into()
}
fn d_webhook_url_env() -> String {
    "SLACK_WEBHOOK_URL".into()
}
fn d_ack_text() -> String {
    "thinking...".into()
}
fn d_10000() -> u64 {
    10_000
}
fn d_300() -> u64 {
    300
}

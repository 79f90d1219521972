//! Outbound replies.
//!
//! The orchestrator sends exactly one reply per inbound message through a
//! [`ReplySink`]. Delivery is fire-and-forget: failures are reported to the
//! caller for logging and never retried.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use bb_domain::config::SlackConfig;
use bb_domain::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub thread_id: String,
    pub text: String,
    /// Per-message reply URL handed out by the platform, if any.
    pub response_url: Option<String>,
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_reply(&self, reply: &OutboundReply) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slack
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Serialize)]
struct SlackMessage<'a> {
    response_type: &'static str,
    text: &'a str,
}

/// Posts replies to the message's `response_url`, falling back to the
/// configured incoming webhook.
pub struct SlackReplySink {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackReplySink {
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            webhook_url,
        })
    }

    pub fn from_config(cfg: &SlackConfig) -> Result<Self> {
        let webhook_url = cfg.webhook_url();
        if webhook_url.is_none() {
            tracing::info!(
                env = %cfg.webhook_url_env,
                "no incoming webhook configured; replies need a response_url"
            );
        }
        Self::new(webhook_url, Duration::from_millis(cfg.timeout_ms))
    }
}

#[async_trait]
impl ReplySink for SlackReplySink {
    async fn send_reply(&self, reply: &OutboundReply) -> Result<()> {
        let url = reply
            .response_url
            .as_deref()
            .or(self.webhook_url.as_deref())
            .ok_or_else(|| {
                Error::Reply(format!(
                    "no response_url or webhook for thread {}",
                    reply.thread_id
                ))
            })?;

        let body = SlackMessage {
            response_type: "in_channel",
            text: &reply.text,
        };
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Reply(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Reply(format!("slack returned {status}: {text}")));
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Console
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Prints replies to stdout. Used by `boardbridge chat`.
#[derive(Debug, Default)]
pub struct ConsoleReplySink;

#[async_trait]
impl ReplySink for ConsoleReplySink {
    async fn send_reply(&self, reply: &OutboundReply) -> Result<()> {
        println!("bot> {}\n", reply.text);
        Ok(())
    }
}

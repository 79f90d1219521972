//! Conversation orchestrator: the per-thread state machine.
//!
//! ```text
//! NoSession --message--> Active --follow-up--> Active
//!                          |  \--gateway/parse error--> Active
//!                          \--action done--> NoSession (retired)
//! ```
//!
//! Every call to [`Orchestrator::handle_message`] ends with exactly one
//! reply. Sessions are retired only after a completed action (or after a
//! failed one when the policy says to send the model's reply anyway).
//! Messages for one thread must be fed in arrival order; the dispatcher
//! guarantees that.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use bb_board::ActionExecutor;
use bb_domain::action::ActionDescriptor;
use bb_domain::config::{ActionFailurePolicy, OrchestratorConfig};
use bb_domain::error::Error;
use bb_domain::trace::TraceEvent;
use bb_sessions::{SessionOrigin, SessionStore, Speaker};

use super::dialogue::DialogueGateway;
use super::interpret::{interpret, ModelResult};
use super::reply::{OutboundReply, ReplySink};

pub const GATEWAY_APOLOGY: &str =
    "Sorry, I couldn't reach the assistant just now. Please try again in a moment.";
pub const REPHRASE_REQUEST: &str =
    "Sorry, I didn't understand that. Could you rephrase your request?";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One inbound chat message, already validated by the front door.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub thread_id: String,
    pub user_id: String,
    pub text: String,
    pub response_url: Option<String>,
}

/// What went wrong during one message's processing. None of these escape
/// [`Orchestrator::handle_message`]; each is turned into a reply.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("dialogue model failed: {0}")]
    Gateway(Error),
    #[error("model output rejected: {reason}")]
    Parse { raw_text: String, reason: String },
    #[error("board action failed: {0}")]
    ActionExecution(Error),
    /// Logged only; the turn continues on stale or empty grounding.
    #[error("board snapshot unavailable: {0}")]
    Snapshot(Error),
}

/// How a message's processing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A follow-up question was asked; the session stays open.
    FollowUp,
    /// The action succeeded and the session was retired.
    Completed,
    /// The board rejected the action; a failure notice was sent and the
    /// session stays open.
    ActionFailed,
    /// The board rejected the action but the model's reply was sent and the
    /// session retired.
    CompletedDespiteFailure,
    /// The model could not be reached in time.
    GatewayFailed,
    /// The model's output could not be interpreted.
    Rejected,
}

impl TurnOutcome {
    pub fn retired(self) -> bool {
        matches!(self, Self::Completed | Self::CompletedDespiteFailure)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Orchestrator {
    sessions: Arc<SessionStore>,
    gateway: Arc<DialogueGateway>,
    executor: Arc<dyn ActionExecutor>,
    replies: Arc<dyn ReplySink>,
    gateway_timeout: Duration,
    executor_timeout: Duration,
    on_action_failure: ActionFailurePolicy,
}

impl Orchestrator {
    pub fn new(
        cfg: &OrchestratorConfig,
        sessions: Arc<SessionStore>,
        gateway: Arc<DialogueGateway>,
        executor: Arc<dyn ActionExecutor>,
        replies: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            sessions,
            gateway,
            executor,
            replies,
            gateway_timeout: Duration::from_millis(cfg.gateway_timeout_ms),
            executor_timeout: Duration::from_millis(cfg.executor_timeout_ms),
            on_action_failure: cfg.on_action_failure,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Run one message through the state machine.
    pub async fn handle_message(&self, msg: InboundMessage) -> TurnOutcome {
        let span = tracing::info_span!("turn", thread_id = %msg.thread_id);
        async {
            let outcome = self.process(&msg).await;
            tracing::debug!(?outcome, "turn finished");
            outcome
        }
        .instrument(span)
        .await
    }

    async fn process(&self, msg: &InboundMessage) -> TurnOutcome {
        let origin = SessionOrigin {
            user_id: Some(msg.user_id.clone()),
        };
        let (session, is_new) = self.sessions.begin_turn(&msg.thread_id, origin, &msg.text);
        tracing::debug!(
            session_id = %session.session_id,
            is_new,
            turns = session.transcript.len(),
            "user turn appended"
        );

        // ── Dialogue ──────────────────────────────────────────────────
        let ctx = self.gateway.build_system_context().await;
        if let Some(e) = ctx.degraded {
            let err = TurnError::Snapshot(e);
            tracing::warn!(grounding = ?ctx.grounding, error = %err, "continuing without live board data");
        }
        let consult = self.gateway.converse(&ctx.text, &session.transcript);
        let raw = match tokio::time::timeout(self.gateway_timeout, consult).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return self.gateway_failed(msg, TurnError::Gateway(e)).await,
            Err(_) => {
                let e = Error::Timeout(format!(
                    "no model reply within {}ms",
                    self.gateway_timeout.as_millis()
                ));
                return self.gateway_failed(msg, TurnError::Gateway(e)).await;
            }
        };

        // ── Interpretation ────────────────────────────────────────────
        match interpret(&raw) {
            ModelResult::ParseError { raw_text, reason } => {
                TraceEvent::ModelOutputRejected {
                    thread_id: msg.thread_id.clone(),
                    raw_chars: raw_text.chars().count(),
                    reason: reason.clone(),
                }
                .emit();
                let err = TurnError::Parse { raw_text, reason };
                tracing::warn!(error = %err, "asking user to rephrase");
                self.reply(msg, REPHRASE_REQUEST).await;
                TurnOutcome::Rejected
            }
            ModelResult::FollowUp { question } => {
                self.sessions
                    .append_turn(&msg.thread_id, Speaker::Assistant, &question);
                self.reply(msg, &question).await;
                TurnOutcome::FollowUp
            }
            ModelResult::Completed { action, reply_text } => {
                self.complete(msg, action, reply_text).await
            }
        }
    }

    async fn complete(
        &self,
        msg: &InboundMessage,
        action: ActionDescriptor,
        reply_text: String,
    ) -> TurnOutcome {
        let method = action.method().to_string();
        let endpoint = action.endpoint().to_owned();

        let result = match tokio::time::timeout(self.executor_timeout, self.executor.execute(&action)).await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "board did not answer within {}ms",
                self.executor_timeout.as_millis()
            ))),
        };

        match result {
            Ok(outcome) => {
                TraceEvent::ActionExecuted {
                    thread_id: msg.thread_id.clone(),
                    method,
                    endpoint,
                    status: outcome.status_code,
                }
                .emit();
                self.reply(msg, &reply_text).await;
                self.sessions.retire(&msg.thread_id);
                TurnOutcome::Completed
            }
            Err(e) => {
                TraceEvent::ActionFailed {
                    thread_id: msg.thread_id.clone(),
                    method,
                    endpoint,
                    error: e.to_string(),
                }
                .emit();
                let notice = failure_notice(&e);
                let err = TurnError::ActionExecution(e);
                tracing::warn!(error = %err, policy = ?self.on_action_failure, "action not completed");

                match self.on_action_failure {
                    ActionFailurePolicy::ReportFailure => {
                        self.sessions
                            .append_turn(&msg.thread_id, Speaker::Assistant, &notice);
                        self.reply(msg, &notice).await;
                        TurnOutcome::ActionFailed
                    }
                    ActionFailurePolicy::SendModelReply => {
                        self.reply(msg, &reply_text).await;
                        self.sessions.retire(&msg.thread_id);
                        TurnOutcome::CompletedDespiteFailure
                    }
                }
            }
        }
    }

    async fn gateway_failed(&self, msg: &InboundMessage, err: TurnError) -> TurnOutcome {
        tracing::warn!(error = %err, "dialogue failed, sending apology");
        self.reply(msg, GATEWAY_APOLOGY).await;
        TurnOutcome::GatewayFailed
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) {
        let reply = OutboundReply {
            thread_id: msg.thread_id.clone(),
            text: text.to_owned(),
            response_url: msg.response_url.clone(),
        };
        match self.replies.send_reply(&reply).await {
            Ok(()) => TraceEvent::ReplySent {
                thread_id: msg.thread_id.clone(),
                chars: text.chars().count(),
            }
            .emit(),
            Err(e) => {
                tracing::warn!(error = %e, "reply delivery failed");
                TraceEvent::ReplyFailed {
                    thread_id: msg.thread_id.clone(),
                    error: e.to_string(),
                }
                .emit();
            }
        }
    }
}

/// User-facing text for a failed action. Response bodies stay in the logs.
fn failure_notice(err: &Error) -> String {
    let cause = match err {
        Error::BoardStatus { status, .. } => format!("the board service answered HTTP {status}"),
        Error::Timeout(_) => "the board service did not answer in time".to_owned(),
        _ => "the board service could not be reached".to_owned(),
    };
    format!("Sorry, I couldn't complete that on the board: {cause}. Nothing was confirmed, so you can try again.")
}

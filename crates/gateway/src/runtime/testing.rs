//! In-crate fakes for the model, the board and the reply channel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use bb_board::{ActionExecutor, ActionOutcome, BoardSnapshotProvider};
use bb_domain::action::ActionDescriptor;
use bb_domain::board::{BoardList, BoardSnapshot, Card};
use bb_domain::config::Config;
use bb_domain::error::{Error, Result};
use bb_providers::{ChatRequest, ChatResponse, LlmProvider, ProviderRegistry};
use bb_sessions::SessionStore;

use super::dialogue::DialogueGateway;
use super::orchestrator::Orchestrator;
use super::reply::{OutboundReply, ReplySink};

pub const TEST_MODEL: &str = "fake/test-model";

// ── model ────────────────────────────────────────────────────────────

/// Replays scripted replies in order and records every request.
#[derive(Default)]
pub struct FakeLlm {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ChatRequest>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl FakeLlm {
    pub fn scripted(replies: &[&str]) -> Arc<Self> {
        let llm = Self::default();
        llm.replies
            .lock()
            .extend(replies.iter().map(|r| (*r).to_owned()));
        Arc::new(llm)
    }

    pub fn failing() -> Arc<Self> {
        let llm = Self::default();
        llm.fail.store(true, Ordering::SeqCst);
        Arc::new(llm)
    }

    pub fn push_reply(&self, reply: &str) {
        self.replies.lock().push_back(reply.to_owned());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().push(req.clone());
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Provider {
                provider: "fake".into(),
                message: "service unavailable".into(),
            });
        }
        let content = self
            .replies
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Other("no scripted reply left".into()))?;
        Ok(ChatResponse {
            content,
            usage: None,
            model: req.model.clone().unwrap_or_default(),
            finish_reason: Some("stop".into()),
        })
    }

    fn provider_id(&self) -> &str {
        "fake"
    }
}

// ── board ────────────────────────────────────────────────────────────

/// A one-list board that records executed actions.
#[derive(Default)]
pub struct FakeBoard {
    snapshot_calls: AtomicUsize,
    fail_snapshots: AtomicBool,
    snapshot_delay: Mutex<Option<Duration>>,
    reject_status: Mutex<Option<u16>>,
    executed: Mutex<Vec<ActionDescriptor>>,
}

impl FakeBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_snapshots(&self, fail: bool) {
        self.fail_snapshots.store(fail, Ordering::SeqCst);
    }

    /// Make every snapshot read sleep this long first.
    pub fn delay_snapshots(&self, delay: Duration) {
        *self.snapshot_delay.lock() = Some(delay);
    }

    /// Make every action fail with this HTTP status.
    pub fn reject_actions(&self, status: u16) {
        *self.reject_status.lock() = Some(status);
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<ActionDescriptor> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl BoardSnapshotProvider for FakeBoard {
    async fn snapshot(&self) -> Result<BoardSnapshot> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.snapshot_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_snapshots.load(Ordering::SeqCst) {
            return Err(Error::Http("connection refused".into()));
        }
        Ok(BoardSnapshot {
            cards: vec![Card {
                id: "c1".into(),
                name: "Existing".into(),
                id_list: "L1".into(),
                desc: String::new(),
                closed: false,
            }],
            lists: vec![BoardList {
                id: "L1".into(),
                name: "To Do".into(),
                closed: false,
                pos: Some(1.0),
            }],
        })
    }
}

#[async_trait]
impl ActionExecutor for FakeBoard {
    async fn execute(&self, action: &ActionDescriptor) -> Result<ActionOutcome> {
        self.executed.lock().push(action.clone());
        let reject = *self.reject_status.lock();
        match reject {
            Some(status) => Err(Error::BoardStatus {
                status,
                body: "invalid id".into(),
            }),
            None => Ok(ActionOutcome {
                status_code: 200,
                body: "{}".into(),
            }),
        }
    }
}

// ── replies ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<OutboundReply>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        Arc::new(sink)
    }

    pub fn sent(&self) -> Vec<OutboundReply> {
        self.sent.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|r| r.text.clone()).collect()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send_reply(&self, reply: &OutboundReply) -> Result<()> {
        self.sent.lock().push(reply.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Reply("webhook returned 500".into()));
        }
        Ok(())
    }
}

// ── wiring ───────────────────────────────────────────────────────────

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.llm.model = TEST_MODEL.into();
    config.board.board_id = "B1".into();
    config
}

/// Everything an orchestrator test needs to poke at.
pub struct Harness {
    pub llm: Arc<FakeLlm>,
    pub board: Arc<FakeBoard>,
    pub sink: Arc<RecordingSink>,
    pub sessions: Arc<SessionStore>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new(llm: Arc<FakeLlm>) -> Self {
        Self::with_config(llm, test_config())
    }

    pub fn with_config(llm: Arc<FakeLlm>, config: Config) -> Self {
        let board = FakeBoard::new();
        let sink = RecordingSink::new();
        Self::assemble(llm, board, sink, config)
    }

    pub fn assemble(
        llm: Arc<FakeLlm>,
        board: Arc<FakeBoard>,
        sink: Arc<RecordingSink>,
        config: Config,
    ) -> Self {
        let mut registry = ProviderRegistry::default();
        registry.insert(llm.clone());
        let sessions = Arc::new(SessionStore::new(&config.sessions));
        let gateway = Arc::new(DialogueGateway::new(
            &config,
            Arc::new(registry),
            board.clone(),
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            &config.orchestrator,
            sessions.clone(),
            gateway,
            board.clone(),
            sink.clone(),
        ));
        Self {
            llm,
            board,
            sink,
            sessions,
            orchestrator,
        }
    }
}

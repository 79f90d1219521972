//! Per-thread message dispatcher.
//!
//! Each thread identifier gets its own FIFO and a worker task that drains it
//! one message at a time, so a thread's messages are handled in arrival
//! order while different threads run concurrently. A worker exits after
//! sitting idle; it removes itself from the map under the same lock that
//! [`Dispatcher::dispatch`] enqueues under, so no message can land in a
//! queue nobody is reading.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::orchestrator::{InboundMessage, Orchestrator};

/// Whatever processes a thread's messages, one at a time.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, msg: InboundMessage);
}

#[async_trait]
impl MessageHandler for Orchestrator {
    async fn handle(&self, msg: InboundMessage) {
        self.handle_message(msg).await;
    }
}

type WorkerMap = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<InboundMessage>>>>;

pub struct Dispatcher {
    handler: Arc<dyn MessageHandler>,
    workers: WorkerMap,
    idle: Duration,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn MessageHandler>, idle: Duration) -> Self {
        Self {
            handler,
            workers: Arc::new(Mutex::new(HashMap::new())),
            idle,
        }
    }

    /// Queue `msg` behind any earlier messages of the same thread and
    /// return immediately.
    pub fn dispatch(&self, msg: InboundMessage) {
        let mut workers = self.workers.lock();

        let msg = match workers.get(&msg.thread_id) {
            Some(tx) => match tx.send(msg) {
                Ok(()) => return,
                // The worker died without deregistering; start a new one.
                Err(mpsc::error::SendError(msg)) => msg,
            },
            None => msg,
        };

        let thread_id = msg.thread_id.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        // Cannot fail: `rx` is alive until the worker below drops it.
        let _ = tx.send(msg);
        workers.insert(thread_id.clone(), tx);
        drop(workers);

        tracing::debug!(thread_id = %thread_id, "starting dispatch worker");
        let handle = tokio::spawn(run_worker(
            thread_id.clone(),
            rx,
            self.handler.clone(),
            self.workers.clone(),
            self.idle,
        ));
        tokio::spawn(supervise(thread_id, handle, self.workers.clone()));
    }

    /// Number of live per-thread workers.
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }
}

async fn run_worker(
    thread_id: String,
    mut rx: mpsc::UnboundedReceiver<InboundMessage>,
    handler: Arc<dyn MessageHandler>,
    workers: WorkerMap,
    idle: Duration,
) {
    loop {
        let next = match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(msg)) => Some(msg),
            Ok(None) => None,
            Err(_) => {
                let mut workers = workers.lock();
                match rx.try_recv() {
                    Ok(msg) => Some(msg),
                    Err(_) => {
                        workers.remove(&thread_id);
                        None
                    }
                }
            }
        };

        let Some(msg) = next else {
            break;
        };
        // Isolated so a panicking message cannot take the queue with it.
        let handler = handler.clone();
        if let Err(e) = tokio::spawn(async move { handler.handle(msg).await }).await {
            if e.is_panic() {
                tracing::error!(thread_id = %thread_id, error = %e, "message handler panicked");
            } else {
                tracing::warn!(thread_id = %thread_id, error = %e, "message handler cancelled");
            }
        }
    }
    tracing::debug!(thread_id = %thread_id, "dispatch worker idle, exiting");
}

/// Observe a worker until it ends and log anything abnormal.
async fn supervise(thread_id: String, handle: tokio::task::JoinHandle<()>, workers: WorkerMap) {
    let Err(e) = handle.await else {
        return;
    };
    if e.is_panic() {
        tracing::error!(thread_id = %thread_id, error = %e, "dispatch worker panicked");
    } else {
        tracing::warn!(thread_id = %thread_id, error = %e, "dispatch worker cancelled");
    }
    // Drop the dead worker's entry unless a replacement already took over.
    let mut workers = workers.lock();
    if workers.get(&thread_id).is_some_and(|tx| tx.is_closed()) {
        workers.remove(&thread_id);
    }
}

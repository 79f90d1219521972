//! Process-wide session store.
//!
//! Maps a thread identifier to its [`Session`]. Constructed once at startup
//! and shared by handle. All critical sections are short map operations;
//! model and board I/O never happens under the lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use bb_domain::config::SessionsConfig;
use bb_domain::trace::TraceEvent;

use crate::lifecycle::{ExpiryReason, LifecycleManager};
use crate::transcript::{Speaker, Turn};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Awaiting resolution.
    Active,
    /// Terminal; only ever observed on the value returned by `retire`.
    Completed,
}

/// One multi-turn conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub thread_id: String,
    pub state: SessionState,
    /// Replayed to the model in this order on every turn.
    pub transcript: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub origin: SessionOrigin,
}

/// Who started the session.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionOrigin {
    pub user_id: Option<String>,
}

impl Session {
    fn new(thread_id: &str, origin: SessionOrigin) -> Self {
        let now = Utc::now();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.to_owned(),
            state: SessionState::Active,
            transcript: Vec::new(),
            created_at: now,
            updated_at: now,
            origin,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    lifecycle: LifecycleManager,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(cfg: &SessionsConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            lifecycle: LifecycleManager::new(cfg.idle_minutes),
            max_sessions: cfg.max_sessions.max(1),
        }
    }

    /// Look up a session by thread identifier.
    pub fn get(&self, thread_id: &str) -> Option<Session> {
        self.sessions.read().get(thread_id).cloned()
    }

    /// Return the session for `thread_id`, creating an empty `Active` one if
    /// absent. Returns `(session, is_new)`.
    pub fn get_or_create(&self, thread_id: &str, origin: SessionOrigin) -> (Session, bool) {
        // Fast path: session already exists.
        {
            let sessions = self.sessions.read();
            if let Some(session) = sessions.get(thread_id) {
                return (session.clone(), false);
            }
        }

        // Slow path: re-check under the write lock, then create.
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get(thread_id) {
            return (session.clone(), false);
        }
        self.evict_for_capacity(&mut sessions);
        let session = created(thread_id, origin);
        sessions.insert(thread_id.to_owned(), session.clone());
        (session, true)
    }

    /// [`get_or_create`](Self::get_or_create) followed by appending a user
    /// turn, under a single write lock. Returns the session as of after the
    /// append and whether it was created.
    pub fn begin_turn(
        &self,
        thread_id: &str,
        origin: SessionOrigin,
        text: &str,
    ) -> (Session, bool) {
        let mut sessions = self.sessions.write();
        let is_new = !sessions.contains_key(thread_id);
        if is_new {
            self.evict_for_capacity(&mut sessions);
        }
        let session = sessions
            .entry(thread_id.to_owned())
            .or_insert_with(|| created(thread_id, origin));
        push_turn(session, Speaker::User, text);
        (session.clone(), is_new)
    }

    /// Append a turn. Returns the new transcript length, or `None` when no
    /// session exists for `thread_id`.
    pub fn append_turn(&self, thread_id: &str, speaker: Speaker, text: &str) -> Option<usize> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(thread_id)?;
        Some(push_turn(session, speaker, text))
    }

    /// Snapshot of the transcript (empty when no session exists).
    pub fn transcript(&self, thread_id: &str) -> Vec<Turn> {
        self.sessions
            .read()
            .get(thread_id)
            .map(|s| s.transcript.clone())
            .unwrap_or_default()
    }

    /// Remove the session, returning it marked `Completed`. No-op (returns
    /// `None`) when absent.
    pub fn retire(&self, thread_id: &str) -> Option<Session> {
        let mut session = self.sessions.write().remove(thread_id)?;
        session.state = SessionState::Completed;

        TraceEvent::SessionRetired {
            thread_id: thread_id.to_owned(),
            session_id: session.session_id.clone(),
            turns: session.transcript.len(),
        }
        .emit();

        Some(session)
    }

    /// Remove every session the lifecycle rules consider idle as of `now`.
    /// Returns the expired thread identifiers.
    pub fn expire_idle(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut sessions = self.sessions.write();
        let expired: Vec<(String, ExpiryReason)> = sessions
            .values()
            .filter_map(|s| {
                self.lifecycle
                    .should_expire(s, now)
                    .map(|reason| (s.thread_id.clone(), reason))
            })
            .collect();

        for (thread_id, reason) in &expired {
            if let Some(session) = sessions.remove(thread_id) {
                TraceEvent::SessionExpired {
                    thread_id: thread_id.clone(),
                    session_id: session.session_id,
                    reason: reason.to_string(),
                }
                .emit();
            }
        }

        expired.into_iter().map(|(thread_id, _)| thread_id).collect()
    }

    /// List all sessions.
    pub fn list(&self) -> Vec<Session> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    // ── internals ────────────────────────────────────────────────────

    /// Make room for one more session by evicting the least recently
    /// updated one when the store is full. Caller holds the write lock.
    fn evict_for_capacity(&self, sessions: &mut HashMap<String, Session>) {
        if sessions.len() < self.max_sessions {
            return;
        }
        let oldest = sessions
            .values()
            .min_by_key(|s| s.updated_at)
            .map(|s| s.thread_id.clone());
        if let Some(victim) = oldest.and_then(|id| sessions.remove(&id)) {
            TraceEvent::SessionExpired {
                thread_id: victim.thread_id,
                session_id: victim.session_id,
                reason: ExpiryReason::Capacity {
                    max_sessions: self.max_sessions,
                }
                .to_string(),
            }
            .emit();
        }
    }
}

fn created(thread_id: &str, origin: SessionOrigin) -> Session {
    let session = Session::new(thread_id, origin);
    TraceEvent::SessionCreated {
        thread_id: thread_id.to_owned(),
        session_id: session.session_id.clone(),
    }
    .emit();
    session
}

fn push_turn(session: &mut Session, speaker: Speaker, text: &str) -> usize {
    session.transcript.push(Turn::new(speaker, text));
    session.updated_at = Utc::now();
    let turns = session.transcript.len();

    TraceEvent::TurnAppended {
        thread_id: session.thread_id.clone(),
        speaker: speaker.as_str().to_owned(),
        turns,
    }
    .emit();

    turns
}

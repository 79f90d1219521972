//! Session expiry rules.
//!
//! Evaluated by the background sweeper through [`SessionStore::expire_idle`]
//! and on capacity pressure when a new session is created.
//!
//! [`SessionStore::expire_idle`]: crate::store::SessionStore::expire_idle

use chrono::{DateTime, Utc};

use crate::store::Session;

/// Why a session was removed without completing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryReason {
    IdleTimeout { idle_minutes: u32 },
    Capacity { max_sessions: usize },
}

impl std::fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdleTimeout { idle_minutes } => write!(f, "idle timeout ({idle_minutes}m)"),
            Self::Capacity { max_sessions } => write!(f, "capacity ({max_sessions} sessions)"),
        }
    }
}

pub struct LifecycleManager {
    /// `0` disables idle expiry.
    idle_minutes: u32,
}

impl LifecycleManager {
    pub fn new(idle_minutes: u32) -> Self {
        Self { idle_minutes }
    }

    /// `Some(reason)` when the session has been idle for at least
    /// `idle_minutes` as of `now`.
    pub fn should_expire(&self, session: &Session, now: DateTime<Utc>) -> Option<ExpiryReason> {
        if self.idle_minutes == 0 {
            return None;
        }
        let elapsed = now.signed_duration_since(session.updated_at).num_minutes();
        if elapsed >= i64::from(self.idle_minutes) {
            return Some(ExpiryReason::IdleTimeout {
                idle_minutes: self.idle_minutes,
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SessionOrigin, SessionState};

    fn session_updated(minutes_ago: i64) -> Session {
        let now = Utc::now();
        Session {
            session_id: "s1".into(),
            thread_id: "t1".into(),
            state: SessionState::Active,
            transcript: Vec::new(),
            created_at: now - chrono::Duration::hours(2),
            updated_at: now - chrono::Duration::minutes(minutes_ago),
            origin: SessionOrigin::default(),
        }
    }

    #[test]
    fn idle_session_expires() {
        let mgr = LifecycleManager::new(30);
        let reason = mgr.should_expire(&session_updated(45), Utc::now());
        assert_eq!(reason, Some(ExpiryReason::IdleTimeout { idle_minutes: 30 }));
    }

    #[test]
    fn recent_session_is_kept() {
        let mgr = LifecycleManager::new(30);
        assert!(mgr.should_expire(&session_updated(5), Utc::now()).is_none());
    }

    #[test]
    fn zero_disables_expiry() {
        let mgr = LifecycleManager::new(0);
        assert!(mgr.should_expire(&session_updated(10_000), Utc::now()).is_none());
    }
}

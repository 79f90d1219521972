//! Conversation sessions for boardbridge.
//!
//! One session per thread identifier, holding the ordered transcript that is
//! replayed to the model on every turn. Sessions live in memory only; they
//! are retired when a conversation completes and expired when left idle.

pub mod lifecycle;
pub mod store;
pub mod transcript;

pub use lifecycle::{ExpiryReason, LifecycleManager};
pub use store::{Session, SessionOrigin, SessionState, SessionStore};
pub use transcript::{Speaker, Turn};

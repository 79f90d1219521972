//! `bb-board` - board service client for boardbridge.
//!
//! Two traits split the board surface the way the conversation uses it:
//! [`BoardSnapshotProvider`] reads cards and lists to ground the model, and
//! [`ActionExecutor`] performs the single state-changing call a completed
//! conversation asks for. [`TrelloClient`] implements both against the
//! Trello REST API.

pub mod provider;
pub mod rest;

pub use provider::{ActionExecutor, ActionOutcome, BoardSnapshotProvider};
pub use rest::{BoardCredentials, TrelloClient};

//! BoardBridge gateway: Slack and HTTP ingress, the per-thread conversation
//! runtime and the `boardbridge` CLI.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;

//! Shared types for boardbridge: the error type, trace events, configuration,
//! conversation messages, board records and the action descriptor the model
//! asks us to run against the board.

pub mod action;
pub mod board;
pub mod config;
pub mod error;
pub mod message;
pub mod trace;

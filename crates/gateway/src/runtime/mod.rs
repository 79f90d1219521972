//! Core runtime: the conversation state machine and its collaborators.
//!
//! An inbound message flows through [`Dispatcher`] (per-thread ordering),
//! [`Orchestrator`] (session state machine), [`DialogueGateway`] (grounded
//! model call), [`interpret`] (strict parsing of the model's reply), the
//! board's action executor, and finally a [`ReplySink`].

pub mod dialogue;
pub mod dispatch;
pub mod interpret;
pub mod orchestrator;
pub mod prompt;
pub mod reply;

#[cfg(test)]
pub(crate) mod testing;

pub use dialogue::DialogueGateway;
pub use dispatch::{Dispatcher, MessageHandler};
pub use interpret::{interpret, ModelResult};
pub use orchestrator::{InboundMessage, Orchestrator, TurnError, TurnOutcome};
pub use reply::{ConsoleReplySink, OutboundReply, ReplySink, SlackReplySink};

//! `boardbridge chat`: interactive REPL against the board assistant.
//!
//! Each line is handed straight to the orchestrator and processed before
//! the next prompt appears, so one terminal is one ordered thread. Replies
//! are printed by [`ConsoleReplySink`].

use std::sync::Arc;

use bb_domain::config::Config;

use crate::bootstrap;
use crate::runtime::{ConsoleReplySink, InboundMessage, TurnOutcome};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(config: Arc<Config>, thread_id: String) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config, Arc::new(ConsoleReplySink))?;
    bootstrap::spawn_background_tasks(&state);

    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".boardbridge")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("BoardBridge interactive chat");
    eprintln!("Thread: {thread_id}  |  Type /help for commands, Ctrl+D to exit");
    eprintln!();

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if handle_slash_command(&state, &thread_id, trimmed) {
                        break;
                    }
                    continue;
                }

                let outcome = state
                    .orchestrator
                    .handle_message(InboundMessage {
                        thread_id: thread_id.clone(),
                        user_id: "cli".into(),
                        text: trimmed.to_owned(),
                        response_url: None,
                    })
                    .await;
                report_outcome(outcome);
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    state.shutdown.cancel();
    eprintln!("Goodbye!");
    Ok(())
}

fn report_outcome(outcome: TurnOutcome) {
    match outcome {
        TurnOutcome::Completed | TurnOutcome::CompletedDespiteFailure => {
            eprintln!("\x1B[2m(conversation complete; next message starts fresh)\x1B[0m");
        }
        TurnOutcome::GatewayFailed => {
            eprintln!("\x1B[2m(model unavailable; check the logs)\x1B[0m");
        }
        TurnOutcome::FollowUp | TurnOutcome::ActionFailed | TurnOutcome::Rejected => {}
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash command handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process a slash command. Returns `true` if the REPL should exit.
fn handle_slash_command(state: &AppState, thread_id: &str, input: &str) -> bool {
    let cmd = input.split_whitespace().next().unwrap_or(input);

    match cmd {
        "/exit" | "/quit" => return true,

        "/reset" => match state.sessions.retire(thread_id) {
            Some(session) => eprintln!(
                "Discarded session {} ({} turns).",
                session.session_id,
                session.transcript.len()
            ),
            None => eprintln!("No open session."),
        },

        "/history" => {
            let turns = state.sessions.transcript(thread_id);
            if turns.is_empty() {
                eprintln!("(empty)");
            }
            for turn in turns {
                eprintln!("{:>9}: {}", turn.speaker.as_str(), turn.text);
            }
        }

        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /history      Show the open conversation");
            eprintln!("  /reset        Discard the open conversation");
            eprintln!("  /exit, /quit  Exit the chat");
            eprintln!("  /help         Show this help");
        }

        other => {
            eprintln!("Unknown command: {other}  (type /help for a list)");
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::{FakeLlm, Harness};

    #[tokio::test]
    async fn reset_discards_open_session() {
        let h = Harness::new(FakeLlm::scripted(&[r#"{"response": "Which list?"}"#]));
        let state = AppState::for_tests(&h, None);
        h.orchestrator
            .handle_message(InboundMessage {
                thread_id: "cli:local".into(),
                user_id: "cli".into(),
                text: "Create a card".into(),
                response_url: None,
            })
            .await;
        assert_eq!(h.sessions.transcript("cli:local").len(), 2);

        assert!(!handle_slash_command(&state, "cli:local", "/reset"));
        assert!(h.sessions.get("cli:local").is_none());
    }

    #[tokio::test]
    async fn exit_commands_end_the_loop() {
        let h = Harness::new(FakeLlm::scripted(&[]));
        let state = AppState::for_tests(&h, None);
        assert!(handle_slash_command(&state, "cli:local", "/quit"));
        assert!(handle_slash_command(&state, "cli:local", "/exit"));
        assert!(!handle_slash_command(&state, "cli:local", "/bogus"));
    }
}

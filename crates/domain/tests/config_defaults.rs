use bb_domain::config::{ActionFailurePolicy, Config, ConfigSeverity};

#[test]
fn empty_file_parses_to_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.server.bind_addr(), "127.0.0.1:3000");
    assert_eq!(config.board.base_url, "https://api.trello.com/1");
    assert_eq!(config.llm.model, "openai/gpt-4o");
    assert_eq!(config.slack.ack_text, "thinking...");
    assert_eq!(config.sessions.idle_minutes, 60);
    assert_eq!(
        config.orchestrator.on_action_failure,
        ActionFailurePolicy::ReportFailure
    );
}

#[test]
fn full_file_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8080

[slack]
ack_text = "on it"

[llm]
model = "local/llama3"
temperature = 0.0
max_tokens = 800

[[llm.providers]]
id = "local"
kind = "openai_compat"
base_url = "http://localhost:11434/v1"

[board]
board_id = "5f1a"
max_read_retries = 0

[sessions]
idle_minutes = 15
max_sessions = 50

[orchestrator]
gateway_timeout_ms = 30000
on_action_failure = "send_model_reply"
system_prompt = "Board {board_id}: {board_data}"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.slack.ack_text, "on it");
    assert_eq!(config.llm.max_tokens, Some(800));
    assert_eq!(config.board.max_read_retries, 0);
    assert_eq!(config.sessions.max_sessions, 50);
    assert_eq!(config.orchestrator.gateway_timeout_ms, 30_000);
    assert!(config.validate().is_empty(), "{:?}", config.validate());
}

#[test]
fn default_config_has_no_blocking_errors() {
    let issues = Config::default().validate();
    assert!(issues.iter().all(|e| e.severity == ConfigSeverity::Warning));
}

#[test]
fn show_output_reparses() {
    let config = Config::default();
    let rendered = toml::to_string_pretty(&config).unwrap();
    let back: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(back.server.port, config.server.port);
    assert_eq!(back.board.api_token_env, config.board.api_token_env);
}

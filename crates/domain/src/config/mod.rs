mod board;
mod llm;
mod observability;
mod orchestrator;
mod server;
mod sessions;
mod slack;

pub use board::*;
pub use llm::*;
pub use observability::*;
pub use orchestrator::*;
pub use server::*;
pub use sessions::*;
pub use slack::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

/// Upper bound for `board.max_read_retries`.
pub const MAX_READ_RETRIES: u32 = 8;

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }

        if self.board.base_url.is_empty() {
            errors.push(ConfigError::error("board.base_url", "base_url must not be empty"));
        }
        if self.board.board_id.is_empty() {
            errors.push(ConfigError::warning(
                "board.board_id",
                "no board_id set; snapshots will fail and the model runs ungrounded",
            ));
        }

        match self.llm.model_spec() {
            None => errors.push(ConfigError::error(
                "llm.model",
                format!("'{}' is not of the form provider/model", self.llm.model),
            )),
            Some((provider, _)) => {
                if !self.llm.providers.is_empty()
                    && !self.llm.providers.iter().any(|p| p.id == provider)
                {
                    errors.push(ConfigError::error(
                        "llm.model",
                        format!("provider '{provider}' is not configured"),
                    ));
                }
            }
        }

        if self.llm.providers.is_empty() {
            errors.push(ConfigError::warning("llm.providers", "no LLM providers configured"));
        }
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].id"),
                    "provider id must not be empty",
                ));
            }
            if provider.base_url.is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].base_url"),
                    "provider base_url must not be empty",
                ));
            }
        }

        for (field, value) in [
            ("slack.timeout_ms", self.slack.timeout_ms),
            ("llm.default_timeout_ms", self.llm.default_timeout_ms),
            ("board.timeout_ms", self.board.timeout_ms),
            ("orchestrator.gateway_timeout_ms", self.orchestrator.gateway_timeout_ms),
            ("orchestrator.executor_timeout_ms", self.orchestrator.executor_timeout_ms),
            ("orchestrator.snapshot_timeout_ms", self.orchestrator.snapshot_timeout_ms),
        ] {
            if value == 0 {
                errors.push(ConfigError::error(field, "timeout must be greater than 0"));
            }
        }

        if self.board.max_read_retries > MAX_READ_RETRIES {
            errors.push(ConfigError::error(
                "board.max_read_retries",
                format!("at most {MAX_READ_RETRIES} retries are allowed"),
            ));
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::warning(
                "observability.sample_rate",
                "sample_rate should be between 0.0 and 1.0",
            ));
        }

        errors
    }

    /// True when any issue has `Error` severity.
    pub fn has_errors(issues: &[ConfigError]) -> bool {
        issues.iter().any(|e| e.severity == ConfigSeverity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str) -> ProviderConfig {
        ProviderConfig {
            id: id.into(),
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://api.openai.com/v1".into(),
            auth: AuthConfig::default(),
            default_model: None,
        }
    }

    fn valid() -> Config {
        let mut cfg = Config::default();
        cfg.board.board_id = "B1".into();
        cfg.llm.providers.push(provider("openai"));
        cfg
    }

    #[test]
    fn valid_config_has_no_issues() {
        assert!(valid().validate().is_empty());
    }

    #[test]
    fn default_config_only_warns() {
        let issues = Config::default().validate();
        assert!(!Config::has_errors(&issues));
        assert!(issues.iter().any(|e| e.field == "board.board_id"));
        assert!(issues.iter().any(|e| e.field == "llm.providers"));
    }

    #[test]
    fn zero_port_is_an_error() {
        let mut cfg = valid();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(Config::has_errors(&issues));
        assert_eq!(issues[0].field, "server.port");
    }

    #[test]
    fn unknown_model_provider_is_an_error() {
        let mut cfg = valid();
        cfg.llm.model = "anthropic/claude".into();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "llm.model" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn malformed_model_is_an_error() {
        let mut cfg = valid();
        cfg.llm.model = "gpt-4o".into();
        assert!(Config::has_errors(&cfg.validate()));
    }

    #[test]
    fn zero_timeout_is_an_error() {
        let mut cfg = valid();
        cfg.orchestrator.executor_timeout_ms = 0;
        let issues = cfg.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "orchestrator.executor_timeout_ms");
    }

    #[test]
    fn excessive_read_retries_are_an_error() {
        let mut cfg = valid();
        cfg.board.max_read_retries = MAX_READ_RETRIES;
        assert!(cfg.validate().is_empty());
        cfg.board.max_read_retries = 64;
        let issues = cfg.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "board.max_read_retries");
    }

    #[test]
    fn out_of_range_sample_rate_warns() {
        let mut cfg = valid();
        cfg.observability.sample_rate = 1.5;
        let issues = cfg.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, ConfigSeverity::Warning);
    }

    #[test]
    fn display_tags_severity() {
        let e = ConfigError::error("server.port", "bad");
        assert_eq!(e.to_string(), "[ERROR] server.port: bad");
    }
}

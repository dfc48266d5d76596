// Logger configuration
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Pass every formatted log line through the PII redactor
    pub redaction_enabled: bool,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    pub json_output: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            redaction_enabled: true,
            log_level: "info".to_string(),
            json_output: false,
        }
    }
}

impl LoggerConfig {
    /// Load configuration from `LOG_LEVEL`, `LOG_FORMAT` and `LOG_REDACTION`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let log_level = std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level);

        let json_output = std::env::var("LOG_FORMAT")
            .map(|s| s.eq_ignore_ascii_case("json"))
            .unwrap_or(defaults.json_output);

        let redaction_enabled = std::env::var("LOG_REDACTION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.redaction_enabled);

        Self {
            redaction_enabled,
            log_level,
            json_output,
        }
    }
}

//! HIPAA-oriented logging with automatic PII redaction
//!
//! Installs a `tracing` subscriber whose output passes through a
//! [`PiiRedactor`] before it reaches stderr, and exposes the redactor itself
//! so error text can be scrubbed before it is broadcast or stored.
//!
//! # Detected Data Types
//!
//! - **Email Addresses**: user@example.com → u***@e***
//! - **Phone Numbers**: (555) 123-4567 → (***) ***-****
//! - **SSN**: 123-45-6789 → ***-**-****
//! - **Medical Record Numbers**: MRN 123456 → MRN[REDACTED]
//! - **Dates of Birth**: DOB: 04/12/1961 → DOB: **/**/****
//! - **Custom Patterns**: organization-specific regexes
//!
//! With `hash_for_correlation` set (the default) values are replaced by a
//! short SHA-256 digest instead, e.g. `EMAIL[q2XbV3k1o0Y=]`.
//!
//! # Example
//!
//! ```rust,no_run
//! use logger_redacted::{init_logging, LoggerConfig};
//!
//! init_logging(&LoggerConfig::default()).expect("valid log filter");
//! tracing::info!("Failed to reach patient at (555) 123-4567");
//! // stderr: "... Failed to reach patient at PHONE[...]"
//! ```

pub mod config;
pub mod redactor;
pub mod writer;

pub use config::*;
pub use redactor::*;
pub use writer::*;

use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Invalid log filter '{directive}': {message}")]
    InvalidFilter { directive: String, message: String },
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over [`LoggerConfig::log_level`] when set. Returns
/// `Ok(false)` if a global subscriber was already installed.
pub fn init_logging(config: &LoggerConfig) -> Result<bool, LoggerError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| LoggerError::InvalidFilter {
            directive: config.log_level.clone(),
            message: e.to_string(),
        })?,
    };

    let redactor = config
        .redaction_enabled
        .then(|| Arc::new(PiiRedactor::default()));
    let writer = RedactingMakeWriter::new(std::io::stderr, redactor);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(writer);

    let installed = if config.json_output {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_reported() {
        let config = LoggerConfig {
            log_level: "warn".to_string(),
            ..Default::default()
        };
        let first = init_logging(&config).unwrap();
        assert!(first);
        assert!(!init_logging(&config).unwrap());
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggerConfig {
            log_level: "scribe=notalevel".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(LoggerError::InvalidFilter { .. })
        ));
    }
}

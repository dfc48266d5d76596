//! Engine configuration, loaded from `SCRIBE_*` environment variables

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::refresh::RefreshThrottlerConfig;

/// Format selected by default when it is among the successful results
pub const DEFAULT_FORMAT_ID: &str = "history";

/// Structuring backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StructuringBackend {
    /// In-process header extraction against the template
    Local,
    /// Hosted structuring service
    Http {
        api_url: String,
        api_key: Option<String>,
        #[serde(with = "duration_millis")]
        timeout: Duration,
    },
}

/// Document store selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    Sqlite {
        db_path: String,
        max_connections: u32,
        enable_wal: bool,
        /// Overwrite freed pages; required for PHI at rest
        enable_secure_delete: bool,
    },
}

/// Engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    pub default_format_id: String,
    pub refresh: RefreshThrottlerConfig,
    /// Buffer size of the persistence notification channel
    pub notification_capacity: usize,
    pub structuring: StructuringBackend,
    pub store: StoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_format_id: DEFAULT_FORMAT_ID.to_string(),
            refresh: RefreshThrottlerConfig::default(),
            notification_capacity: 64,
            structuring: StructuringBackend::Local,
            store: StoreConfig::Memory,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables (and `.env`, if present)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is set to a value that cannot be
    /// parsed, or names an unknown backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let default_format_id = lookup("SCRIBE_DEFAULT_FORMAT")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.default_format_id);

        let min_refresh_interval = parse_or(
            &lookup,
            "SCRIBE_MIN_REFRESH_INTERVAL_MS",
            millis(defaults.refresh.min_refresh_interval),
        )?;
        let quiet_period = parse_or(
            &lookup,
            "SCRIBE_QUIET_PERIOD_MS",
            millis(defaults.refresh.quiet_period),
        )?;
        let notification_capacity = parse_or(
            &lookup,
            "SCRIBE_NOTIFICATION_CAPACITY",
            defaults.notification_capacity,
        )?;
        if notification_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SCRIBE_NOTIFICATION_CAPACITY".to_string(),
                value: "0".to_string(),
            });
        }

        let structuring = match lookup("SCRIBE_STRUCTURING_PROVIDER") {
            None => StructuringBackend::Local,
            Some(provider) => match provider.to_lowercase().as_str() {
                "local" => StructuringBackend::Local,
                "http" => StructuringBackend::Http {
                    api_url: lookup("SCRIBE_STRUCTURING_URL")
                        .ok_or_else(|| ConfigError::Missing("SCRIBE_STRUCTURING_URL".to_string()))?,
                    api_key: lookup("SCRIBE_STRUCTURING_API_KEY"),
                    timeout: Duration::from_millis(parse_or(
                        &lookup,
                        "SCRIBE_STRUCTURING_TIMEOUT_MS",
                        30_000,
                    )?),
                },
                _ => {
                    return Err(ConfigError::Unknown {
                        kind: "structuring provider".to_string(),
                        name: provider,
                    })
                }
            },
        };

        let store = match lookup("SCRIBE_STORE") {
            None => StoreConfig::Memory,
            Some(store) => match store.to_lowercase().as_str() {
                "memory" => StoreConfig::Memory,
                "sqlite" => StoreConfig::Sqlite {
                    db_path: lookup("SCRIBE_SQLITE_PATH")
                        .unwrap_or_else(|| "scribe_notes.db".to_string()),
                    max_connections: parse_or(&lookup, "SCRIBE_SQLITE_MAX_CONNECTIONS", 5)?,
                    enable_wal: true,
                    enable_secure_delete: true,
                },
                _ => {
                    return Err(ConfigError::Unknown {
                        kind: "store".to_string(),
                        name: store,
                    })
                }
            },
        };

        Ok(Self {
            default_format_id,
            refresh: RefreshThrottlerConfig {
                min_refresh_interval: Duration::from_millis(min_refresh_interval),
                quiet_period: Duration::from_millis(quiet_period),
            },
            notification_capacity,
            structuring,
            store,
        })
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

// Serialize Duration as milliseconds
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

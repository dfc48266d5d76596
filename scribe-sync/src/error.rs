//! Error types for the scribe engine

use thiserror::Error;

/// Failure structuring a transcript against a single template.
///
/// Always local to one format: the generator logs it and moves on.
#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Upstream structuring failure: {0}")]
    Upstream(String),

    #[error("Malformed structuring response: {0}")]
    Malformed(String),

    #[error("Transcript could not be structured into format '{0}'")]
    Unstructured(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Failure of a whole generation call.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Structuring failed for all {attempted} format(s)")]
    StructuringFailed {
        attempted: usize,
        failures: Vec<(String, StructuringError)>,
    },

    #[error("No templates were requested")]
    NoTemplates,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Invalid identifier input: {0}")]
    InvalidInput(String),

    /// Hashing produced a non-canonical value; recovered internally
    #[error("Identifier derivation produced non-canonical value: {0}")]
    Derivation(String),
}

/// Backing store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Invalid document id: {0}")]
    InvalidDocumentId(#[from] IdentifierError),

    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Unknown {kind}: {name}")]
    Unknown { kind: String, name: String },

    #[error("Missing required setting: {0}")]
    Missing(String),
}

/// Umbrella error for callers of the engine facade.
#[derive(Error, Debug)]
pub enum ScribeError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Structuring(#[from] StructuringError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type StructuringResult<T> = Result<T, StructuringError>;
pub type GenerationResult<T> = Result<T, GenerationError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type ScribeResult<T> = Result<T, ScribeError>;

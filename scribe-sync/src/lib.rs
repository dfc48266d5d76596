//! Clinical note synchronization and multi-format generation for RustCare
//!
//! Provides:
//! - Header-based section extraction against note templates
//! - Multi-format generation from one transcript, with partial-failure semantics
//! - Deterministic stable identifiers for free-form note keys
//! - Single-flight, fire-and-forget persistence with completion notifications
//! - Refresh throttling and an edit-mode gate protecting in-flight edits
//!
//! # Example
//!
//! ```rust,no_run
//! use scribe_sync::{templates, EngineConfig, ScribeEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ScribeEngine::from_config(EngineConfig::from_env()?).await?;
//! let formats = engine
//!     .generate("Chief Complaint: cough\nPlan: fluids", &templates::builtin())
//!     .await?;
//!
//! let chosen = formats.iter().find(|f| f.is_default_selected()).ok_or("no default")?;
//! let mut session = engine.open_session("encounter-42", chosen.structured_document().clone())?;
//! session.begin_editing();
//! session.commit_direct_edit("plan", "fluids, rest", std::time::Instant::now());
//! session.save()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod edit_mode;
pub mod engine;
pub mod error;
pub mod generator;
pub mod identifier;
pub mod persistence;
pub mod refresh;
pub mod sections;
pub mod session;
pub mod store;
pub mod structuring;
pub mod templates;

pub use config::{EngineConfig, StoreConfig, StructuringBackend};
pub use document::{Document, Template};
pub use edit_mode::{EditMode, EditModeController};
pub use engine::ScribeEngine;
pub use error::{
    ConfigError, GenerationError, IdentifierError, PersistenceError, ScribeError, ScribeResult,
    StoreError, StructuringError,
};
pub use generator::{render, FormatResult, MultiFormatGenerator};
pub use identifier::{ensure_stable, is_stable, IdentifierReconciler, StableIdentifier};
pub use persistence::{PersistenceCoordinator, PersistenceEvent, SaveDispatch};
pub use refresh::{RefreshDecision, RefreshState, RefreshThrottler, RefreshThrottlerConfig};
pub use sections::{extract, title_case, SectionExtractor};
pub use session::EditingSession;
pub use store::{DocumentRecord, DocumentStore, MemoryDocumentStore, SqliteDocumentStore};
pub use structuring::{HttpStructurer, StructuringProvider, TemplateStructurer};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_engine_from_default_config() {
        let engine = ScribeEngine::from_config(EngineConfig::default()).await.unwrap();
        assert_eq!(engine.config().default_format_id, "history");
        assert!(engine.load("encounter-1").await.unwrap().is_none());
    }
}

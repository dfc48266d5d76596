//! Document stores keyed by [`StableIdentifier`]

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::document::Document;
use crate::error::StoreResult;
use crate::identifier::StableIdentifier;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// A stored document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub key: StableIdentifier,
    pub document: Document,
    /// Starts at 1, incremented by every write to the same key
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// Backing store interface. Not transactional across keys.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace the document under `key`
    async fn put(&self, key: &StableIdentifier, document: &Document) -> StoreResult<DocumentRecord>;

    async fn get(&self, key: &StableIdentifier) -> StoreResult<Option<DocumentRecord>>;

    /// Returns whether a document was removed
    async fn delete(&self, key: &StableIdentifier) -> StoreResult<bool>;
}

/// Open the store selected by configuration
///
/// # Errors
///
/// Fails if the SQLite database cannot be opened or migrated.
pub async fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn DocumentStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryDocumentStore::new())),
        StoreConfig::Sqlite { .. } => Ok(Arc::new(SqliteDocumentStore::open(config).await?)),
    }
}

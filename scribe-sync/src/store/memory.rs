//! In-memory document store

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::document::Document;
use crate::error::StoreResult;
use crate::identifier::StableIdentifier;
use crate::store::{DocumentRecord, DocumentStore};

/// In-memory document store for testing and development
pub struct MemoryDocumentStore {
    records: Arc<DashMap<StableIdentifier, DocumentRecord>>,
    writes: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of `put` calls served so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(&self, key: &StableIdentifier, document: &Document) -> StoreResult<DocumentRecord> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let entry = self
            .records
            .entry(key.clone())
            .and_modify(|record| {
                record.document = document.snapshot();
                record.version += 1;
                record.updated_at = Utc::now();
            })
            .or_insert_with(|| DocumentRecord {
                key: key.clone(),
                document: document.snapshot(),
                version: 1,
                updated_at: Utc::now(),
            });

        Ok(entry.value().clone())
    }

    async fn get(&self, key: &StableIdentifier) -> StoreResult<Option<DocumentRecord>> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, key: &StableIdentifier) -> StoreResult<bool> {
        Ok(self.records.remove(key).is_some())
    }
}

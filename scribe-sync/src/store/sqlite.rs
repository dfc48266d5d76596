//! SQLite-backed document store
//!
//! One row per note, keyed by stable identifier, document stored as JSON.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::identifier::StableIdentifier;
use crate::store::{DocumentRecord, DocumentStore};

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Open (creating if needed) the database described by `config`
    ///
    /// # Errors
    ///
    /// Fails if `config` is not a SQLite configuration, or the database
    /// cannot be opened or initialized.
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        let StoreConfig::Sqlite {
            db_path,
            max_connections,
            enable_wal,
            enable_secure_delete,
        } = config
        else {
            return Err(StoreError::Unavailable(
                "SQLite store requires a sqlite configuration".to_string(),
            ));
        };

        let mut options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        // Enable WAL mode for better concurrency
        if *enable_wal {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Overwrite freed pages so deleted notes do not linger on disk
        if *enable_secure_delete {
            options = options.pragma("secure_delete", "ON");
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(*max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;

        info!(db_path = %db_path, "Opened SQLite note store");
        Ok(store)
    }

    async fn initialize_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_notes_updated ON notes(updated_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn version_from(raw: i64) -> StoreResult<u64> {
    u64::try_from(raw).map_err(|_| StoreError::Corrupt(format!("negative version {raw}")))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn put(&self, key: &StableIdentifier, document: &Document) -> StoreResult<DocumentRecord> {
        let payload = serde_json::to_string(document)?;
        let now = Utc::now();

        // Drain the statement so the write commits before the connection
        // returns to the pool
        let rows = sqlx::query(
            r#"
            INSERT INTO notes (id, document, version, updated_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(id) DO UPDATE SET
                document = excluded.document,
                version = notes.version + 1,
                updated_at = excluded.updated_at
            RETURNING version
            "#,
        )
        .bind(key.as_str())
        .bind(&payload)
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let row = rows
            .first()
            .ok_or_else(|| StoreError::Corrupt("upsert returned no version".to_string()))?;
        let version = version_from(row.try_get("version")?)?;
        debug!(document_id = %key, version, "Stored note");

        Ok(DocumentRecord {
            key: key.clone(),
            document: document.snapshot(),
            version,
            updated_at: now,
        })
    }

    async fn get(&self, key: &StableIdentifier) -> StoreResult<Option<DocumentRecord>> {
        let row = sqlx::query("SELECT document, version, updated_at FROM notes WHERE id = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row.try_get("document")?;
        let updated_at: String = row.try_get("updated_at")?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| StoreError::Corrupt(format!("updated_at: {e}")))?
            .with_timezone(&Utc);

        Ok(Some(DocumentRecord {
            key: key.clone(),
            document: serde_json::from_str(&payload)?,
            version: version_from(row.try_get("version")?)?,
            updated_at,
        }))
    }

    async fn delete(&self, key: &StableIdentifier) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::ensure_stable;
    use tempfile::NamedTempFile;

    fn sqlite_config(path: &str) -> StoreConfig {
        StoreConfig::Sqlite {
            db_path: path.to_string(),
            max_connections: 2,
            enable_wal: true,
            enable_secure_delete: true,
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = sqlite_config(temp_file.path().to_str().unwrap());
        let store = SqliteDocumentStore::open(&config).await.unwrap();
        let key = ensure_stable("encounter-9").unwrap();

        let first = store
            .put(&key, &Document::from_iter([("plan", "rest")]))
            .await
            .unwrap();
        assert_eq!(first.version, 1);

        let second = store
            .put(&key, &Document::from_iter([("plan", "admit"), ("assessment", "pneumonia")]))
            .await
            .unwrap();
        assert_eq!(second.version, 2);

        let loaded = store.get(&key).await.unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.document, second.document);

        assert!(store.delete(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(!store.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_after_write_across_pool() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = StoreConfig::Sqlite {
            db_path: temp_file.path().to_str().unwrap().to_string(),
            max_connections: 5,
            enable_wal: true,
            enable_secure_delete: true,
        };
        let store = SqliteDocumentStore::open(&config).await.unwrap();
        let key = ensure_stable("encounter-11").unwrap();

        for round in 1..=100u64 {
            let text = format!("revision {round}");
            let written = store
                .put(&key, &Document::from_iter([("plan", text.as_str())]))
                .await
                .unwrap();
            assert_eq!(written.version, round);

            let loaded = store.get(&key).await.unwrap().unwrap();
            assert_eq!(loaded.version, round);
            assert_eq!(loaded.document.section("plan"), Some(text.as_str()));
        }
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = sqlite_config(temp_file.path().to_str().unwrap());
        let key = ensure_stable("encounter-10").unwrap();

        let store = SqliteDocumentStore::open(&config).await.unwrap();
        store
            .put(&key, &Document::from_iter([("subjective", "dizzy")]))
            .await
            .unwrap();
        store.close().await;

        let reopened = SqliteDocumentStore::open(&config).await.unwrap();
        let loaded = reopened.get(&key).await.unwrap().unwrap();
        assert_eq!(loaded.document.section("subjective"), Some("dizzy"));
    }

    #[tokio::test]
    async fn test_rejects_memory_configuration() {
        assert!(matches!(
            SqliteDocumentStore::open(&StoreConfig::Memory).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}

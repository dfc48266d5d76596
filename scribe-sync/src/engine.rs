//! Engine facade wiring generation, editing sessions and storage together

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::EngineConfig;
use crate::document::{Document, Template};
use crate::error::{GenerationResult, ScribeResult};
use crate::generator::{FormatResult, MultiFormatGenerator};
use crate::persistence::{PersistenceCoordinator, PersistenceEvent};
use crate::refresh::RefreshThrottler;
use crate::session::EditingSession;
use crate::store::{open_store, DocumentRecord, DocumentStore};
use crate::structuring::{create_provider, StructuringProvider};

/// Entry point for the presentation layer: generation, sessions and storage
pub struct ScribeEngine {
    config: EngineConfig,
    generator: MultiFormatGenerator,
    persistence: Arc<PersistenceCoordinator>,
}

impl ScribeEngine {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn StructuringProvider>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let generator = MultiFormatGenerator::new(provider, config.default_format_id.clone());
        let persistence = Arc::new(PersistenceCoordinator::new(store, config.notification_capacity));

        Self {
            config,
            generator,
            persistence,
        }
    }

    /// Build provider and store from configuration
    ///
    /// # Errors
    ///
    /// Fails if the structuring client or the store cannot be created.
    pub async fn from_config(config: EngineConfig) -> ScribeResult<Self> {
        let provider = create_provider(&config.structuring)?;
        let store = open_store(&config.store).await?;
        info!(
            provider = provider.name(),
            default_format = %config.default_format_id,
            "Scribe engine ready"
        );
        Ok(Self::new(config, provider, store))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn persistence(&self) -> &Arc<PersistenceCoordinator> {
        &self.persistence
    }

    /// Generate every requested format from `transcript`
    ///
    /// # Errors
    ///
    /// See [`MultiFormatGenerator::generate`].
    pub async fn generate(&self, transcript: &str, templates: &[Template]) -> GenerationResult<Vec<FormatResult>> {
        self.generator.generate(transcript, templates).await
    }

    /// Open an editing session on `document`
    ///
    /// # Errors
    ///
    /// Fails for an empty `raw_id`.
    pub fn open_session(&self, raw_id: &str, document: Document) -> ScribeResult<EditingSession> {
        let throttler = RefreshThrottler::new(self.config.refresh.clone());
        Ok(EditingSession::open(
            raw_id,
            document,
            Arc::clone(&self.persistence),
            throttler,
        )?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PersistenceEvent> {
        self.persistence.subscribe()
    }

    /// Fetch the stored note for `raw_id`
    ///
    /// # Errors
    ///
    /// Fails for an empty `raw_id` or a store error.
    pub async fn load(&self, raw_id: &str) -> ScribeResult<Option<DocumentRecord>> {
        let key = self.persistence.reconciler().ensure_stable(raw_id)?;
        Ok(self.persistence.store().get(&key).await?)
    }

    /// Delete the stored note for `raw_id`; returns whether one existed
    ///
    /// # Errors
    ///
    /// Fails for an empty `raw_id` or a store error.
    pub async fn remove(&self, raw_id: &str) -> ScribeResult<bool> {
        let key = self.persistence.reconciler().ensure_stable(raw_id)?;
        Ok(self.persistence.store().delete(&key).await?)
    }
}

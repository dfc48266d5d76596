//! Structuring backends: turn a transcript into a [`Document`] for one format

pub mod http;
pub mod local;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StructuringBackend;
use crate::document::{Document, Template};
use crate::error::StructuringResult;

pub use http::HttpStructurer;
pub use local::TemplateStructurer;

/// Trait for structuring backends
///
/// Calls are independent: each may take its own time and fail on its own.
#[async_trait]
pub trait StructuringProvider: Send + Sync {
    /// Structure `text` into the sections of `format_id`
    async fn structure(
        &self,
        text: &str,
        format_id: &str,
        template: Option<&Template>,
    ) -> StructuringResult<Document>;

    /// Short provider name for logs
    fn name(&self) -> &'static str;
}

/// Create a provider instance based on configuration
///
/// # Errors
///
/// Fails if the HTTP client cannot be built.
pub fn create_provider(config: &StructuringBackend) -> StructuringResult<Arc<dyn StructuringProvider>> {
    match config {
        StructuringBackend::Local => Ok(Arc::new(TemplateStructurer::default())),
        StructuringBackend::Http { .. } => Ok(Arc::new(HttpStructurer::new(config)?)),
    }
}

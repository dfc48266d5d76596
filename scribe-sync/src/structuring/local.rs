//! In-process structuring by header extraction

use async_trait::async_trait;
use tracing::debug;

use crate::document::{Document, Template};
use crate::error::{StructuringError, StructuringResult};
use crate::sections;
use crate::structuring::StructuringProvider;
use crate::templates;

pub struct TemplateStructurer {
    catalog: Vec<Template>,
}

impl Default for TemplateStructurer {
    fn default() -> Self {
        Self::new(templates::builtin())
    }
}

impl TemplateStructurer {
    /// Structurer resolving format ids against `catalog` when no template is
    /// passed with the call
    pub fn new(catalog: Vec<Template>) -> Self {
        Self { catalog }
    }

    fn resolve<'a>(&'a self, format_id: &str, template: Option<&'a Template>) -> StructuringResult<&'a Template> {
        template
            .or_else(|| self.catalog.iter().find(|t| t.id == format_id))
            .ok_or_else(|| StructuringError::UnknownFormat(format_id.to_string()))
    }
}

#[async_trait]
impl StructuringProvider for TemplateStructurer {
    async fn structure(
        &self,
        text: &str,
        format_id: &str,
        template: Option<&Template>,
    ) -> StructuringResult<Document> {
        let template = self.resolve(format_id, template)?;
        let document = sections::extract(text, template);

        if document.is_blank() {
            return Err(StructuringError::Unstructured(format_id.to_string()));
        }

        debug!(format_id = %format_id, sections = document.len(), "Structured transcript locally");
        Ok(document)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

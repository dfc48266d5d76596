//! Multi-format generation: one transcript, several structured notes
//!
//! Every requested template is structured independently. A template that
//! fails is logged and left out; the call only fails when nothing succeeded.

use futures::future::join_all;
use logger_redacted::PiiRedactor;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::document::{Document, Template};
use crate::error::{GenerationError, GenerationResult, StructuringError};
use crate::sections::title_case;
use crate::structuring::StructuringProvider;

/// One generated format. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatResult {
    format_id: String,
    rendered_text: String,
    structured_document: Document,
    is_default_selected: bool,
}

impl FormatResult {
    pub fn format_id(&self) -> &str {
        &self.format_id
    }

    pub fn rendered_text(&self) -> &str {
        &self.rendered_text
    }

    pub fn structured_document(&self) -> &Document {
        &self.structured_document
    }

    pub fn is_default_selected(&self) -> bool {
        self.is_default_selected
    }
}

/// Render `document` as `"{Title}\n{text}"` blocks separated by a blank line,
/// in template order. Sections without text are left out.
pub fn render(document: &Document, template: &Template) -> String {
    template
        .sections
        .iter()
        .filter_map(|name| {
            let text = document.section(name)?.trim();
            (!text.is_empty()).then(|| format!("{}\n{}", title_case(name), text))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct MultiFormatGenerator {
    provider: Arc<dyn StructuringProvider>,
    default_format_id: String,
    redactor: PiiRedactor,
}

impl MultiFormatGenerator {
    pub fn new(provider: Arc<dyn StructuringProvider>, default_format_id: impl Into<String>) -> Self {
        Self {
            provider,
            default_format_id: default_format_id.into(),
            redactor: PiiRedactor::default(),
        }
    }

    pub fn default_format_id(&self) -> &str {
        &self.default_format_id
    }

    /// Structure `transcript` into every template.
    ///
    /// Results come back in input order. Exactly one is marked as the default
    /// selection: the configured default format if it succeeded, otherwise
    /// the first success.
    ///
    /// # Errors
    ///
    /// [`GenerationError::StructuringFailed`] when no template succeeded,
    /// [`GenerationError::NoTemplates`] when `templates` is empty.
    pub async fn generate(
        &self,
        transcript: &str,
        templates: &[Template],
    ) -> GenerationResult<Vec<FormatResult>> {
        if templates.is_empty() {
            return Err(GenerationError::NoTemplates);
        }

        let attempts = templates.iter().map(|template| async move {
            let outcome = self.structure_one(transcript, template).await;
            (template, outcome)
        });

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for (template, outcome) in join_all(attempts).await {
            match outcome {
                Ok(document) => successes.push((template, document)),
                Err(e) => {
                    warn!(
                        format_id = %template.id,
                        provider = self.provider.name(),
                        error = %self.redactor.redact(&e.to_string()),
                        "Structuring failed, excluding format"
                    );
                    failures.push((template.id.clone(), e));
                }
            }
        }

        if successes.is_empty() {
            return Err(GenerationError::StructuringFailed {
                attempted: templates.len(),
                failures,
            });
        }

        let default_index = successes
            .iter()
            .position(|(template, _)| template.id == self.default_format_id)
            .unwrap_or(0);

        let results: Vec<FormatResult> = successes
            .into_iter()
            .enumerate()
            .map(|(index, (template, document))| FormatResult {
                format_id: template.id.clone(),
                rendered_text: render(&document, template),
                structured_document: document,
                is_default_selected: index == default_index,
            })
            .collect();

        info!(
            requested = templates.len(),
            generated = results.len(),
            failed = failures.len(),
            "Generated note formats"
        );

        Ok(results)
    }

    async fn structure_one(
        &self,
        transcript: &str,
        template: &Template,
    ) -> Result<Document, StructuringError> {
        let mut document = self
            .provider
            .structure(transcript, &template.id, Some(template))
            .await?;

        document.conform_to(template);
        if document.is_blank() {
            return Err(StructuringError::Unstructured(template.id.clone()));
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructuringResult;
    use crate::structuring::TemplateStructurer;
    use crate::templates;
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Fills the first template section for every format not in `failing`
    struct ScriptedProvider {
        failing: HashSet<String>,
    }

    impl ScriptedProvider {
        fn failing(ids: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                failing: ids.iter().map(|s| s.to_string()).collect(),
            })
        }
    }

    #[async_trait]
    impl StructuringProvider for ScriptedProvider {
        async fn structure(
            &self,
            _text: &str,
            format_id: &str,
            template: Option<&Template>,
        ) -> StructuringResult<Document> {
            if self.failing.contains(format_id) {
                return Err(StructuringError::Upstream(format!("{format_id} unavailable")));
            }
            let first = template
                .and_then(|t| t.sections.first().cloned())
                .unwrap_or_else(|| "body".to_string());
            Ok(Document::from_iter([(first, format!("{format_id} text"))]))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn catalog() -> Vec<Template> {
        vec![templates::consultation(), templates::history(), templates::soap()]
    }

    fn default_ids(results: &[FormatResult]) -> Vec<&str> {
        results
            .iter()
            .filter(|r| r.is_default_selected())
            .map(FormatResult::format_id)
            .collect()
    }

    #[tokio::test]
    async fn test_configured_default_is_selected() {
        let generator = MultiFormatGenerator::new(ScriptedProvider::failing(&[]), "history");
        let results = generator.generate("transcript", &catalog()).await.unwrap();

        let ids: Vec<&str> = results.iter().map(FormatResult::format_id).collect();
        assert_eq!(ids, vec!["consultation", "history", "soap"]);
        assert_eq!(default_ids(&results), vec!["history"]);
    }

    #[tokio::test]
    async fn test_first_success_is_default_when_configured_default_missing() {
        let generator = MultiFormatGenerator::new(ScriptedProvider::failing(&["history"]), "history");
        let results = generator.generate("transcript", &catalog()).await.unwrap();

        let ids: Vec<&str> = results.iter().map(FormatResult::format_id).collect();
        assert_eq!(ids, vec!["consultation", "soap"]);
        assert_eq!(default_ids(&results), vec!["consultation"]);
    }

    #[tokio::test]
    async fn test_partial_failure_is_success() {
        let generator =
            MultiFormatGenerator::new(ScriptedProvider::failing(&["consultation", "history"]), "history");
        let results = generator.generate("transcript", &catalog()).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].format_id(), "soap");
        assert!(results[0].is_default_selected());
    }

    #[tokio::test]
    async fn test_all_failures_is_structuring_failed() {
        let generator = MultiFormatGenerator::new(
            ScriptedProvider::failing(&["consultation", "history", "soap"]),
            "history",
        );
        let err = generator.generate("transcript", &catalog()).await.unwrap_err();

        match err {
            GenerationError::StructuringFailed { attempted, failures } => {
                assert_eq!(attempted, 3);
                assert_eq!(failures.len(), 3);
            }
            GenerationError::NoTemplates => panic!("expected StructuringFailed"),
        }
    }

    #[tokio::test]
    async fn test_no_templates() {
        let generator = MultiFormatGenerator::new(ScriptedProvider::failing(&[]), "history");
        assert!(matches!(
            generator.generate("transcript", &[]).await,
            Err(GenerationError::NoTemplates)
        ));
    }

    #[tokio::test]
    async fn test_documents_conform_to_template() {
        let generator = MultiFormatGenerator::new(ScriptedProvider::failing(&[]), "soap");
        let results = generator.generate("transcript", &[templates::soap()]).await.unwrap();

        let doc = results[0].structured_document();
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.section("subjective"), Some("soap text"));
        assert_eq!(doc.section("plan"), Some(""));
    }

    #[tokio::test]
    async fn test_local_structuring_end_to_end() {
        let generator = MultiFormatGenerator::new(Arc::new(TemplateStructurer::default()), "soap");
        let transcript = "Chief Complaint: knee pain\nPlan: ibuprofen 400 mg\nSubjective: knee pain after fall";
        let results = generator
            .generate(transcript, &[templates::history(), templates::soap(), templates::progress()])
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(FormatResult::format_id).collect();
        assert_eq!(ids, vec!["history", "soap", "progress"]);
        assert_eq!(default_ids(&results), vec!["soap"]);
        assert_eq!(
            results[1].rendered_text(),
            "Subjective\nknee pain after fall\n\nPlan\nibuprofen 400 mg"
        );
    }

    #[test]
    fn test_render_uses_template_order_and_titles() {
        let template = Template::new("cc", "CC", ["chief_complaint", "review_of_systems", "plan"]);
        let doc = Document::from_iter([
            ("plan", "rest"),
            ("chief_complaint", "fever"),
            ("review_of_systems", ""),
        ]);

        assert_eq!(render(&doc, &template), "Chief Complaint\nfever\n\nPlan\nrest");
    }
}

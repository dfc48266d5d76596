//! Hosted structuring backend
//!
//! `POST {api_url}/structure` with `{text, format_id, sections}`; the service
//! answers `{"sections": {name: text}}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::StructuringBackend;
use crate::document::{Document, Template};
use crate::error::{StructuringError, StructuringResult};
use crate::structuring::StructuringProvider;

#[derive(Serialize, Debug)]
struct StructureRequest<'a> {
    text: &'a str,
    format_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sections: Option<&'a [String]>,
}

#[derive(Deserialize, Debug)]
struct StructureResponse {
    sections: BTreeMap<String, String>,
}

pub struct HttpStructurer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpStructurer {
    /// # Errors
    ///
    /// Fails if the configuration is not an HTTP backend or the client cannot
    /// be built.
    pub fn new(config: &StructuringBackend) -> StructuringResult<Self> {
        let StructuringBackend::Http {
            api_url,
            api_key,
            timeout,
        } = config
        else {
            return Err(StructuringError::Upstream(
                "HTTP structurer requires an http backend configuration".to_string(),
            ));
        };

        let client = reqwest::Client::builder().timeout(*timeout).build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/structure", api_url.trim_end_matches('/')),
            api_key: api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl StructuringProvider for HttpStructurer {
    async fn structure(
        &self,
        text: &str,
        format_id: &str,
        template: Option<&Template>,
    ) -> StructuringResult<Document> {
        let body = StructureRequest {
            text,
            format_id,
            sections: template.map(|t| t.sections.as_slice()),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(format_id = %format_id, endpoint = %self.endpoint, "Requesting structuring");
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(StructuringError::Upstream(format!("{status}: {detail}")));
        }

        let parsed: StructureResponse = response
            .json()
            .await
            .map_err(|e| StructuringError::Malformed(e.to_string()))?;

        Ok(parsed.sections.into_iter().collect())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

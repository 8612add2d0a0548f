//! DBpedia Spotlight Client
//!
//! REST client for the Spotlight `annotate` endpoint. Only the fields the
//! graph needs are decoded from the response.

use super::{Annotation, AnnotationError, AnnotationService, TypeFilter};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Public Spotlight endpoint for English text.
pub const DEFAULT_ENDPOINT: &str = "https://api.dbpedia-spotlight.org/en/annotate";

// =============================================================================
// REST API Response Types
// =============================================================================

/// Body of an `annotate` response.
#[derive(Debug, Deserialize)]
pub struct AnnotateResponse {
    #[serde(rename = "Resources", default)]
    pub resources: Option<Vec<ResourceDto>>,
}

/// One candidate resource. Spotlight encodes numbers as strings.
#[derive(Debug, Deserialize)]
pub struct ResourceDto {
    #[serde(rename = "@URI")]
    pub uri: String,
    #[serde(rename = "@types", default)]
    pub types: String,
    #[serde(rename = "@surfaceForm", default)]
    pub surface_form: Option<String>,
    #[serde(rename = "@similarityScore", default)]
    pub similarity_score: Option<String>,
}

impl From<ResourceDto> for Annotation {
    fn from(dto: ResourceDto) -> Self {
        Self {
            uri: dto.uri,
            types: dto.types,
            surface_form: dto.surface_form,
            similarity_score: dto.similarity_score.and_then(|s| s.trim().parse().ok()),
        }
    }
}

// =============================================================================
// Spotlight Client
// =============================================================================

/// Client for a DBpedia Spotlight deployment.
#[derive(Debug, Clone)]
pub struct SpotlightClient {
    client: Client,
    endpoint: Url,
}

impl SpotlightClient {
    /// Create a client for `endpoint` with the given request timeout.
    pub fn new(endpoint: impl AsRef<str>, timeout: Duration) -> Result<Self, AnnotationError> {
        let endpoint = Url::parse(endpoint.as_ref())
            .map_err(|e| AnnotationError::Http(format!("invalid endpoint: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnnotationError::Http(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Form parameters for one request.
    fn params(text: &str, confidence: f32, filter: &TypeFilter) -> Vec<(&'static str, String)> {
        vec![
            ("text", text.to_string()),
            ("confidence", confidence.to_string()),
            ("support", "0".to_string()),
            ("spotter", "Default".to_string()),
            ("disambiguator", "Default".to_string()),
            ("policy", "whitelist".to_string()),
            ("types", filter.to_param()),
        ]
    }
}

#[async_trait]
impl AnnotationService for SpotlightClient {
    async fn annotate(
        &self,
        text: &str,
        confidence: f32,
        filter: &TypeFilter,
    ) -> Result<Vec<Annotation>, AnnotationError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&Self::params(text, confidence, filter))
            .send()
            .await
            .map_err(|e| AnnotationError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(AnnotationError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| AnnotationError::Decode(e.to_string()))?;

        let resources = body.resources.unwrap_or_default();
        if resources.is_empty() {
            return Err(AnnotationError::NoResources);
        }
        Ok(resources.into_iter().map(Annotation::from).collect())
    }

    fn name(&self) -> &'static str {
        "dbpedia_spotlight"
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Entity Annotation
//!
//! Resolves free-text names to linked-data entities through an external
//! annotation service, recovering locally with a synthesized `ex:` entity
//! whenever the service cannot answer.

pub mod spotlight;

use crate::graph::vocab::EX;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

/// Marker the source dataset uses for missing cells.
pub const MISSING_MARKER: &str = "nan";

/// Confidence threshold sent to the annotation service unless configured otherwise.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Returns true when a cell is empty or carries the missing-value marker.
pub fn is_missing(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text.eq_ignore_ascii_case(MISSING_MARKER)
}

// =============================================================================
// Annotation Types
// =============================================================================

/// A resolved entity: its IRI and the raw type list reported for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Entity IRI
    pub uri: String,
    /// Comma-separated, mixed-vocabulary type list (kept verbatim)
    pub types: String,
    /// Matched surface form, when the service reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_form: Option<String>,
    /// Disambiguation score, when the service reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

impl Annotation {
    /// Synthesize a local entity for `text` under the `ex:` namespace.
    pub fn fallback(text: &str, filter: &TypeFilter) -> Self {
        Self {
            uri: EX.mint_iri(text),
            types: filter.default_type().to_string(),
            surface_form: None,
            similarity_score: None,
        }
    }
}

/// Constraint on the candidate categories the service may return.
///
/// Built fresh where it is needed; never shared mutably.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeFilter {
    types: Vec<String>,
}

impl TypeFilter {
    pub const PERSON: &'static str = "DBpedia:Person";

    /// Filter restricting candidates to people.
    pub fn person() -> Self {
        Self::new([Self::PERSON])
    }

    /// Build a filter from one or more category names.
    ///
    /// An empty list falls back to the person category.
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let types: Vec<String> = types
            .into_iter()
            .map(Into::into)
            .filter(|t| !t.trim().is_empty())
            .collect();
        if types.is_empty() {
            return Self {
                types: vec![Self::PERSON.to_string()],
            };
        }
        Self { types }
    }

    /// Category assigned to fallback annotations.
    pub fn default_type(&self) -> &str {
        &self.types[0]
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// The `types` request parameter.
    pub fn to_param(&self) -> String {
        self.types.join(",")
    }
}

impl Default for TypeFilter {
    fn default() -> Self {
        Self::person()
    }
}

/// Why an annotation was synthesized locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// Input was empty or the missing-value marker.
    EmptyInput,
    /// The annotator runs without a service.
    Disabled,
    /// The service call failed; carries the error message.
    Service(String),
}

/// Result of annotating one name.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationOutcome {
    /// First candidate returned by the service, unmodified.
    Resolved(Annotation),
    /// Locally synthesized entity.
    Fallback {
        annotation: Annotation,
        reason: FallbackReason,
    },
}

impl AnnotationOutcome {
    pub fn annotation(&self) -> &Annotation {
        match self {
            Self::Resolved(annotation) | Self::Fallback { annotation, .. } => annotation,
        }
    }

    pub fn into_annotation(self) -> Annotation {
        match self {
            Self::Resolved(annotation) | Self::Fallback { annotation, .. } => annotation,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

// =============================================================================
// Service Trait
// =============================================================================

/// Errors raised by an annotation service. They never leave [`EntityAnnotator`].
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    /// The request could not be sent or the connection failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service answered with a non-success status.
    #[error("Service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// The service found no matching resource.
    #[error("No resources found in response")]
    NoResources,

    /// A candidate carried an IRI that cannot be used in the graph.
    #[error("Invalid entity IRI: {0}")]
    InvalidUri(String),
}

/// An external entity-annotation backend.
#[async_trait]
pub trait AnnotationService: Send + Sync + std::fmt::Debug {
    /// Return ranked candidates for `text`, best first.
    async fn annotate(
        &self,
        text: &str,
        confidence: f32,
        filter: &TypeFilter,
    ) -> Result<Vec<Annotation>, AnnotationError>;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

// =============================================================================
// Entity Annotator
// =============================================================================

type CacheKey = (String, TypeFilter);

/// One slot per (text, filter); concurrent lookups of the same name share
/// a single service call.
type OutcomeCache = Mutex<HashMap<CacheKey, Arc<OnceCell<AnnotationOutcome>>>>;

/// Annotates names with a local-recovery policy: callers always get an
/// [`AnnotationOutcome`], never a transport error.
#[derive(Debug, Clone)]
pub struct EntityAnnotator {
    service: Option<Arc<dyn AnnotationService>>,
    confidence: f32,
    cache: Option<Arc<OutcomeCache>>,
}

impl EntityAnnotator {
    /// Create an annotator backed by `service`.
    pub fn new(service: Arc<dyn AnnotationService>) -> Self {
        Self {
            service: Some(service),
            confidence: DEFAULT_CONFIDENCE,
            cache: None,
        }
    }

    /// Create an annotator that never calls out and always falls back.
    pub fn offline() -> Self {
        Self {
            service: None,
            confidence: DEFAULT_CONFIDENCE,
            cache: None,
        }
    }

    /// Override the confidence threshold.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Remember outcomes for the lifetime of this annotator.
    #[must_use]
    pub fn with_cache(mut self) -> Self {
        self.cache = Some(Arc::new(Mutex::new(HashMap::new())));
        self
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Annotate `text`, restricted to the categories in `filter`.
    pub async fn annotate(&self, text: &str, filter: &TypeFilter) -> AnnotationOutcome {
        if is_missing(text) {
            return AnnotationOutcome::Fallback {
                annotation: Annotation::fallback(text, filter),
                reason: FallbackReason::EmptyInput,
            };
        }

        let Some(service) = &self.service else {
            return AnnotationOutcome::Fallback {
                annotation: Annotation::fallback(text, filter),
                reason: FallbackReason::Disabled,
            };
        };

        let Some(cache) = &self.cache else {
            return self.call_service(service.as_ref(), text, filter).await;
        };

        let slot = {
            let mut slots = cache.lock().await;
            Arc::clone(
                slots
                    .entry((text.to_string(), filter.clone()))
                    .or_default(),
            )
        };
        if let Some(outcome) = slot.get() {
            debug!(name: "annotation.cache_hit", text = %text, "Annotation served from cache");
            return outcome.clone();
        }
        slot.get_or_init(|| self.call_service(service.as_ref(), text, filter))
            .await
            .clone()
    }

    async fn call_service(
        &self,
        service: &dyn AnnotationService,
        text: &str,
        filter: &TypeFilter,
    ) -> AnnotationOutcome {
        match Self::first_candidate(service, text, self.confidence, filter).await {
            Ok(annotation) => {
                debug!(
                    name: "annotation.resolved",
                    text = %text,
                    uri = %annotation.uri,
                    "Entity resolved"
                );
                AnnotationOutcome::Resolved(annotation)
            }
            Err(e) => {
                warn!(
                    name: "annotation.fallback",
                    service = service.name(),
                    text = %text,
                    error = %e,
                    "Annotation failed, using local entity"
                );
                AnnotationOutcome::Fallback {
                    annotation: Annotation::fallback(text, filter),
                    reason: FallbackReason::Service(e.to_string()),
                }
            }
        }
    }

    async fn first_candidate(
        service: &dyn AnnotationService,
        text: &str,
        confidence: f32,
        filter: &TypeFilter,
    ) -> Result<Annotation, AnnotationError> {
        let annotation = service
            .annotate(text, confidence, filter)
            .await?
            .into_iter()
            .next()
            .ok_or(AnnotationError::NoResources)?;
        if oxrdf::NamedNode::new(annotation.uri.as_str()).is_err() {
            return Err(AnnotationError::InvalidUri(annotation.uri));
        }
        Ok(annotation)
    }
}

// =============================================================================
// Tests
// =============================================================================

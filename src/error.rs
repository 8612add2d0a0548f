//! Error types for a graph-building run.

use crate::annotation::AnnotationError;
use crate::dataset::DatasetError;
use crate::graph::GraphError;
use thiserror::Error;

/// Fatal errors of a run. Annotation failures are recovered inside the
/// annotator and only show up here when the service cannot be constructed.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The dataset could not be read, or a row was rejected under the `fail` policy.
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// The graph could not be built or written.
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// The annotation service client could not be created.
    #[error("Annotation service error: {0}")]
    Annotation(#[from] AnnotationError),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

//! Investigation Knowledge Graph
//!
//! Converts tabular records of criminal investigations into an RDF graph,
//! linking every person name to a DBpedia entity where the annotation
//! service can resolve it, and writes the result as Turtle.
//!
//! # Architecture
//!
//! - **Dataset**: CSV reader producing validated investigation rows
//! - **Annotation**: entity resolution with a local fallback policy
//! - **Graph**: append-only triple store, row template, type projection
//! - **Pipeline**: config-driven run from dataset to Turtle file
//!
//! # Modules
//!
//! - [`annotation`]: `EntityAnnotator`, `AnnotationService`, Spotlight client
//! - [`config`]: layered configuration (defaults, file, env, CLI)
//! - [`dataset`]: investigation rows and the delimited-file reader
//! - [`graph`]: `InvestigationGraph`, `GraphBuilder`, `TypeProjector`
//! - [`pipeline`]: end-to-end run

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod annotation;
pub mod config;
pub mod dataset;
pub mod error;
pub mod graph;
pub mod pipeline;

pub use annotation::{Annotation, AnnotationOutcome, EntityAnnotator, TypeFilter};
pub use error::{PipelineError, Result};
pub use graph::InvestigationGraph;
pub use graph::builder::{BuildSummary, GraphBuilder, InvalidRowPolicy};
pub use graph::types::TypeProjector;

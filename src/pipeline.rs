//! Run glue: dataset in, Turtle file out.

use crate::annotation::EntityAnnotator;
use crate::annotation::spotlight::SpotlightClient;
use crate::config::{AnnotationConfig, AppConfig};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::graph::builder::{BuildSummary, GraphBuilder};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Build the annotator described by `config`.
pub fn annotator_from_config(config: &AnnotationConfig) -> Result<EntityAnnotator> {
    let annotator = if config.enabled {
        let client = SpotlightClient::new(&config.endpoint, config.timeout())?;
        info!(
            name: "annotation.config.loaded",
            endpoint = %client.endpoint(),
            confidence = config.confidence,
            "Annotation service configured"
        );
        EntityAnnotator::new(Arc::new(client))
    } else {
        info!(name: "annotation.disabled", "Annotation service disabled, using local entities");
        EntityAnnotator::offline()
    };
    let annotator = annotator.with_confidence(config.confidence);
    Ok(if config.cache {
        annotator.with_cache()
    } else {
        annotator
    })
}

/// Read the dataset, build the graph, and write it out.
///
/// Nothing is written unless the whole graph was built.
pub async fn run(config: &AppConfig) -> Result<BuildSummary> {
    let started = Instant::now();
    let annotator = annotator_from_config(&config.annotation)?;
    let builder = GraphBuilder::new(annotator)
        .with_concurrency(config.pipeline.concurrency)
        .with_policy(config.pipeline.on_invalid_row);

    let mut dataset = Dataset::open(&config.input.path, &config.input.delimiter)?;
    let (graph, summary) = builder.build(dataset.rows()).await?;
    graph.save(&config.output.path)?;

    info!(
        name: "run.completed",
        input = %config.input.path,
        output = %config.output.path,
        rows = summary.rows_read,
        skipped = summary.rows_skipped,
        triples = summary.triples,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Run completed"
    );
    Ok(summary)
}

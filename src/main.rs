//! Investigation Knowledge Graph
//!
//! Entry point: load configuration, build the graph, write Turtle.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use anyhow::Context;
use dotenvy::dotenv;
use investigation_graph::config::AppConfig;
use investigation_graph::pipeline;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

#[tokio::main]
async fn main() {
    // Load .env (if present)
    let _ = dotenv();

    let config = match AppConfig::load().context("Configuration error") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(2);
        }
    };

    // Initialize tracing (M-LOG-STRUCTURED)
    init_tracing(config.logging.json);

    info!(
        name: "config.loaded",
        input = %config.input.path,
        output = %config.output.path,
        annotation = config.annotation.enabled,
        concurrency = config.pipeline.concurrency,
        "Configuration loaded"
    );

    let result = pipeline::run(&config)
        .await
        .with_context(|| format!("Failed to build graph from {}", config.input.path));
    match result {
        Ok(summary) => {
            info!(
                name: "summary",
                rows = summary.rows_read,
                mapped = summary.rows_mapped,
                skipped = summary.rows_skipped,
                convictions = summary.convictions,
                fallbacks = summary.fallbacks,
                triples = summary.triples,
                "Done"
            );
        }
        Err(e) => {
            error!(name: "run.failed", error = %format!("{e:#}"), "Run failed");
            std::process::exit(1);
        }
    }
}

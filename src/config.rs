use crate::annotation::spotlight::DEFAULT_ENDPOINT;
use crate::graph::builder::InvalidRowPolicy;
use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Input dataset (delimited file with a header row)
    #[arg(short, long)]
    pub input: Option<String>,

    /// Output Turtle file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Annotation service endpoint
    #[arg(long, env = "ANNOTATION_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Skip the annotation service and use local entities only
    #[arg(long)]
    pub offline: bool,

    /// Rows whose annotations may be in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// What to do with malformed rows: skip or fail
    #[arg(long)]
    pub on_invalid_row: Option<InvalidRowPolicy>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub annotation: AnnotationConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub path: String,
    pub delimiter: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnnotationConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub confidence: f32,
    pub timeout_secs: u64,
    pub cache: bool,
}

impl AnnotationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    pub concurrency: usize,
    pub on_invalid_row: InvalidRowPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("input.path", "data/investigations.csv")?
            .set_default("input.delimiter", ",")?
            .set_default("output.path", "output.ttl")?
            .set_default("annotation.enabled", true)?
            .set_default("annotation.endpoint", DEFAULT_ENDPOINT)?
            .set_default("annotation.confidence", 0.5)?
            .set_default("annotation.timeout_secs", 30)?
            .set_default("annotation.cache", true)?
            .set_default("pipeline.concurrency", 4)?
            .set_default("pipeline.on_invalid_row", "skip")?
            .set_default("logging.json", false)?;

        // 2. Config file: explicit path, else ./config.yaml when present
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path).required(true));
        } else if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::new("config.yaml", FileFormat::Yaml));
        }

        // 3. Environment variables (prefixed with INVGRAPH_), e.g. INVGRAPH_PIPELINE__CONCURRENCY=8
        builder = builder.add_source(
            Environment::with_prefix("INVGRAPH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI overrides (clap also maps the `env = ...` variables here)
        if let Some(input) = cli.input {
            builder = builder.set_override("input.path", input)?;
        }
        if let Some(output) = cli.output {
            builder = builder.set_override("output.path", output)?;
        }
        if let Some(endpoint) = cli.endpoint {
            builder = builder.set_override("annotation.endpoint", endpoint)?;
        }
        if cli.offline {
            builder = builder.set_override("annotation.enabled", false)?;
        }
        if let Some(concurrency) = cli.concurrency {
            builder = builder.set_override("pipeline.concurrency", concurrency as u64)?;
        }
        if let Some(policy) = cli.on_invalid_row {
            let policy = match policy {
                InvalidRowPolicy::Skip => "skip",
                InvalidRowPolicy::Fail => "fail",
            };
            builder = builder.set_override("pipeline.on_invalid_row", policy)?;
        }
        if cli.log_json {
            builder = builder.set_override("logging.json", true)?;
        }

        let cfg = builder.build()?;
        let app: Self = cfg.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if !(0.0..=1.0).contains(&self.annotation.confidence) {
            return Err(config::ConfigError::Message(format!(
                "annotation.confidence must be within 0..=1, got {}",
                self.annotation.confidence
            )));
        }
        if self.pipeline.concurrency == 0 {
            return Err(config::ConfigError::Message(
                "pipeline.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

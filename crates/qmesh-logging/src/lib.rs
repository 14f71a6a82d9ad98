//! Structured JSONL logging for qmesh
//!
//! This crate provides the logging setup shared by the router daemon, the
//! simulation and tests. Output is JSON lines by default so logs from many
//! nodes can be merged and filtered by node.
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines format for log aggregation (default)
//! - **Node Context**: Every node task runs inside a span carrying its name and address
//! - **File Rotation**: Daily/hourly log rotation via tracing-appender
//!
//! # Quick Start
//!
//! ```ignore
//! use qmesh_logging::{QMeshSubscriberBuilder, LogConfig};
//!
//! // Simple setup with defaults (JSONL to console)
//! let _guard = QMeshSubscriberBuilder::new().init()?;
//!
//! // Development mode with pretty human-readable output
//! let _guard = QMeshSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```
//!
//! # Node Context
//!
//! ```ignore
//! use qmesh_logging::NodeContext;
//! use tracing::Instrument;
//!
//! let ctx = NodeContext::new("h11", address);
//! tokio::spawn(run_receiver().instrument(ctx.span()));
//! ```

pub mod config;
pub mod context;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use context::NodeContext;
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};
use std::str::FromStr;

use thiserror::Error;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the global subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber is already installed
    #[error("A global subscriber is already set: {0}")]
    AlreadyInitialized(String),

    /// Level or filter directive could not be parsed
    #[error("Invalid filter {directive:?}: {detail}")]
    InvalidFilter { directive: String, detail: String },

    /// Log file or directory could not be created
    #[error("Log file setup failed: {0}")]
    File(String),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Builder for configuring and initializing the qmesh logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
pub struct QMeshSubscriberBuilder {
    config: LogConfig,
}

impl QMeshSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    ///
    /// Default: JSONL output to console
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Switch console output between pretty and JSONL
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self.config.console.ansi = pretty;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// Returns a guard that must be kept alive for the duration of the
    /// program when file output is enabled.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber has already been set, a level does not
    /// parse, or the log file cannot be created.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = self.env_filter()?;
        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            let console_layer = if self.config.console.pretty {
                tracing_subscriber::fmt::layer()
                    .with_ansi(self.config.console.ansi)
                    .with_target(true)
                    .boxed()
            } else {
                json_layer(&self.config.jsonl, std::io::stdout)
            };
            let console_layer = match &self.config.console.level {
                Some(level) => console_layer.with_filter(parse_level(level)?).boxed(),
                None => console_layer,
            };
            layers.push(console_layer);
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            layers.push(json_layer(&self.config.jsonl, writer));
            guard = Some(file_guard);
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let directives = self.config.filter_directives();
        EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
            directive: directives,
            detail: e.to_string(),
        })
    }
}

impl Default for QMeshSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn json_layer<W>(jsonl: &JsonlConfig, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(jsonl.include_current_span)
        .with_span_list(jsonl.include_spans)
        .flatten_event(jsonl.flatten_events)
        .with_file(jsonl.include_location)
        .with_line_number(jsonl.include_location)
        .with_thread_ids(jsonl.include_thread_info)
        .with_thread_names(jsonl.include_thread_info)
        .with_writer(writer)
        .boxed()
}

fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    LevelFilter::from_str(level).map_err(|e| LoggingError::InvalidFilter {
        directive: level.to_string(),
        detail: e.to_string(),
    })
}

/// Non-blocking writer for the configured log file
///
/// `Never` truncates a single `<prefix>.jsonl`; the rotating strategies
/// append to dated files.
fn file_writer(
    config: &FileConfig,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory).map_err(|e| LoggingError::File(e.to_string()))?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.jsonl", config.prefix));
            let file = File::create(&path).map_err(|e| LoggingError::File(e.to_string()))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.clone())
        .filename_suffix("jsonl");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder
        .build(&config.directory)
        .map_err(|e| LoggingError::File(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Result<Option<WorkerGuard>, LoggingError> {
    QMeshSubscriberBuilder::new().init()
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Result<Option<WorkerGuard>, LoggingError> {
    QMeshSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for testing (minimal output)
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = QMeshSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = QMeshSubscriberBuilder::new();
        assert_eq!(builder.config().default_level, "info");
        assert!(!builder.config().console.pretty);
    }

    #[test]
    fn test_builder_with_config() {
        let builder = QMeshSubscriberBuilder::new().with_config(LogConfig::development());
        assert_eq!(builder.config().default_level, "debug");
        assert!(builder.config().console.pretty);
    }

    #[test]
    fn test_builder_setters() {
        let builder = QMeshSubscriberBuilder::new()
            .with_level("trace")
            .with_console(false)
            .with_pretty(true);
        assert_eq!(builder.config().default_level, "trace");
        assert!(!builder.config().console.enabled);
        assert!(builder.config().console.ansi);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::DEBUG);
        assert!(matches!(
            parse_level("loud"),
            Err(LoggingError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_single_file_writer() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = FileConfig {
            directory: temp.path().join("logs"),
            prefix: "h11".into(),
            rotation: RotationStrategy::Never,
            max_files: None,
        };
        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(temp.path().join("logs").join("h11.jsonl").exists());
    }

    #[test]
    fn test_second_init_is_rejected() {
        init_testing();
        let second = QMeshSubscriberBuilder::new()
            .with_config(LogConfig::testing())
            .init();
        assert!(matches!(second, Err(LoggingError::AlreadyInitialized(_))));
    }
}

//! Telemetry and tracing utilities
//!
//! The library only emits `tracing` events; applications decide where they go. This module
//! offers a ready-made subscriber for binaries and tests that do not bring their own.
//!
//! ## Example
//!
//! ```rust,ignore
//! use siumai_openai_stream::telemetry::{init_subscriber, OutputFormat, SubscriberConfig};
//!
//! let config = SubscriberConfig::builder()
//!     .log_level(tracing::Level::DEBUG)
//!     .output_format(OutputFormat::Json)
//!     .build();
//! let _guard = init_subscriber(config)?;
//! ```

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::LlmError;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// One JSON object per event
    Json,
    /// JSON with event fields flattened into the top-level object
    JsonCompact,
}

/// Configuration for tracing subscriber
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Log level for this crate
    pub log_level: tracing::Level,
    /// Output format
    pub output_format: OutputFormat,
    /// Enable console (stderr) output
    pub enable_console: bool,
    /// Log file path (optional)
    pub log_file: Option<PathBuf>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
            enable_console: true,
            log_file: None,
        }
    }
}

impl SubscriberConfig {
    pub fn builder() -> SubscriberConfigBuilder {
        SubscriberConfigBuilder::default()
    }

    /// Debug-level text logs on the console.
    pub fn debug() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
            ..Self::default()
        }
    }

    /// Warn-level JSON logs written to `log_file` only.
    pub fn production(log_file: PathBuf) -> Self {
        Self {
            log_level: tracing::Level::WARN,
            output_format: OutputFormat::Json,
            enable_console: false,
            log_file: Some(log_file),
        }
    }

    fn filter_directive(&self) -> String {
        let level = self.log_level.as_str().to_lowercase();
        format!("siumai_openai_stream={level}")
    }
}

/// Builder for SubscriberConfig
#[derive(Debug, Default)]
pub struct SubscriberConfigBuilder {
    log_level: Option<tracing::Level>,
    output_format: Option<OutputFormat>,
    enable_console: Option<bool>,
    log_file: Option<PathBuf>,
}

impl SubscriberConfigBuilder {
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the log level from a string
    pub fn log_level_str(mut self, level: &str) -> Result<Self, LlmError> {
        let level = match level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                return Err(LlmError::ConfigurationError(format!(
                    "Invalid log level: {level}. Valid options: trace, debug, info, warn, error"
                )));
            }
        };
        self.log_level = Some(level);
        Ok(self)
    }

    /// Set the output format from a string
    pub fn output_format_str(self, format: &str) -> Result<Self, LlmError> {
        let output_format = match format.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "json-compact" => OutputFormat::JsonCompact,
            "text" => OutputFormat::Text,
            _ => {
                return Err(LlmError::ConfigurationError(format!(
                    "Invalid log format: {format}. Valid options: text, json, json-compact"
                )));
            }
        };
        Ok(self.output_format(output_format))
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn enable_console(mut self, enable: bool) -> Self {
        self.enable_console = Some(enable);
        self
    }

    pub fn log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    pub fn build(self) -> SubscriberConfig {
        SubscriberConfig {
            log_level: self.log_level.unwrap_or(tracing::Level::INFO),
            output_format: self.output_format.unwrap_or_default(),
            enable_console: self.enable_console.unwrap_or(true),
            log_file: self.log_file,
        }
    }
}

fn fmt_layer<W>(format: OutputFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true);
    match format {
        OutputFormat::Text => layer.with_ansi(ansi).boxed(),
        OutputFormat::Json => layer.json().with_thread_ids(true).boxed(),
        OutputFormat::JsonCompact => layer
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .boxed(),
    }
}

/// Non-blocking writer appending to `path`.
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), LlmError> {
    let file_name = path.file_name().ok_or_else(|| {
        LlmError::ConfigurationError(format!("log file path has no file name: {}", path.display()))
    })?;
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let appender = tracing_appender::rolling::never(directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG`, when set, overrides the configured level. Returns the file writer's guard when
/// file logging is enabled; keep it alive for the lifetime of the program. Initializing
/// twice is not an error.
pub fn init_subscriber(config: SubscriberConfig) -> Result<Option<WorkerGuard>, LlmError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.enable_console {
        layers.push(fmt_layer(config.output_format, std::io::stderr, true));
    }
    let mut guard = None;
    if let Some(path) = &config.log_file {
        let (writer, file_guard) = file_writer(path)?;
        layers.push(fmt_layer(config.output_format, writer, false));
        guard = Some(file_guard);
    }

    match tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
    {
        Ok(()) => Ok(guard),
        Err(e) => {
            let error_msg = e.to_string();
            if error_msg.contains("global default trace dispatcher has already been set") {
                Ok(guard)
            } else {
                Err(LlmError::ConfigurationError(format!(
                    "Failed to initialize tracing: {e}"
                )))
            }
        }
    }
}

/// Initialize tracing subscriber from environment variables
///
/// - `SIUMAI_LOG_LEVEL`: trace, debug, info, warn, error
/// - `SIUMAI_LOG_FORMAT`: text, json, json-compact
/// - `SIUMAI_LOG_FILE`: log file path
pub fn init_from_env() -> Result<Option<WorkerGuard>, LlmError> {
    let mut builder = SubscriberConfig::builder();
    if let Ok(level) = std::env::var("SIUMAI_LOG_LEVEL") {
        builder = builder.log_level_str(&level)?;
    }
    if let Ok(format) = std::env::var("SIUMAI_LOG_FORMAT") {
        builder = builder.output_format_str(&format)?;
    }
    if let Ok(file_path) = std::env::var("SIUMAI_LOG_FILE") {
        builder = builder.log_file(PathBuf::from(file_path));
    }
    init_subscriber(builder.build())
}

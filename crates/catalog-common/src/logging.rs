//! Logging configuration and initialization
//!
//! Every catalog process logs through `tracing`. This module turns a
//! [`LogConfig`] (usually read from `LOG_*` environment variables) into a
//! global subscriber with:
//!
//! - console output, daily-rotated file output, or both
//! - text or JSON formatting
//! - a base level plus extra filter directives (e.g. `sqlx=warn`)
//!
//! Use the structured macros with fields rather than formatted strings:
//!
//! ```rust
//! use tracing::warn;
//!
//! let product_id = "p-17";
//! warn!(row = 4, product_id, stage = "durable", "Product was not persisted");
//! ```
//!
//! # Example
//!
//! ```no_run
//! use catalog_common::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env().unwrap_or_default();
//! let _guard = init_logging(&config).unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::error::{CatalogError, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = CatalogError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(CatalogError::invalid_env("LOG_LEVEL", s, "trace|debug|info|warn|error")),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    fn console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl std::str::FromStr for LogOutput {
    type Err = CatalogError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(CatalogError::invalid_env("LOG_OUTPUT", s, "console|file|both")),
        }
    }
}

/// Line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = CatalogError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(CatalogError::invalid_env("LOG_FORMAT", s, "text|json")),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub output: LogOutput,
    pub format: LogFormat,
    /// Directory for rotated log files (used when output includes file)
    pub log_dir: PathBuf,
    /// File name prefix, e.g. "catalog-sync" -> "catalog-sync.2026-10-14"
    pub log_file_prefix: String,
    /// Extra comma-separated directives, e.g. "sqlx=warn,aws_config=warn"
    pub filter_directives: Option<String>,
    pub include_location: bool,
    pub include_thread_ids: bool,
    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            output: LogOutput::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "catalog".to_string(),
            filter_directives: None,
            include_location: false,
            include_thread_ids: false,
            include_targets: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// - `LOG_LEVEL`: trace, debug, info, warn, error
    /// - `LOG_OUTPUT`: console, file, both
    /// - `LOG_FORMAT`: text, json
    /// - `LOG_DIR`, `LOG_FILE_PREFIX`, `LOG_FILTER`
    /// - `LOG_INCLUDE_LOCATION`, `LOG_INCLUDE_THREAD_IDS`, `LOG_INCLUDE_TARGETS` (true/false)
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    /// Override the fields of `self` that are set in the environment
    pub fn merge_env(mut self) -> Result<Self> {
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.level = level.parse()?;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.output = output.parse()?;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.format = format.parse()?;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("LOG_FILE_PREFIX") {
            self.log_file_prefix = prefix;
        }
        if let Ok(filter) = std::env::var("LOG_FILTER") {
            self.filter_directives = Some(filter);
        }
        if let Ok(val) = std::env::var("LOG_INCLUDE_LOCATION") {
            self.include_location = val.parse().unwrap_or(false);
        }
        if let Ok(val) = std::env::var("LOG_INCLUDE_THREAD_IDS") {
            self.include_thread_ids = val.parse().unwrap_or(false);
        }
        if let Ok(val) = std::env::var("LOG_INCLUDE_TARGETS") {
            self.include_targets = val.parse().unwrap_or(true);
        }
        Ok(self)
    }

    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter =
            EnvFilter::from_default_env().add_directive(self.level.to_tracing_level().into());

        if let Some(ref directives) = self.filter_directives {
            for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                let parsed = directive.parse().map_err(|e| {
                    CatalogError::config(format!("invalid log filter directive {directive:?}: {e}"))
                })?;
                filter = filter.add_directive(parsed);
            }
        }

        Ok(filter)
    }

    fn fmt_layer<W>(&self, writer: W, ansi: bool) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(self.include_targets)
            .with_thread_ids(self.include_thread_ids)
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_span_events(FmtSpan::CLOSE);

        match self.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        }
    }
}

/// Builder for LogConfig
#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_file_prefix = prefix.into();
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn include_location(mut self, include: bool) -> Self {
        self.config.include_location = include;
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Keeps the file writer flushing; drop it only at process exit
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`
///
/// Call once at startup and hold the returned guard for the lifetime of the
/// process.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard> {
    let filter = config.env_filter()?;
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    let mut file_guard = None;

    if config.output.console() {
        layers.push(config.fmt_layer(std::io::stdout, true));
    }

    if config.output.file() {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(config.fmt_layer(writer, false));
        file_guard = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers.with_filter(filter))
        .try_init()
        .map_err(|e| CatalogError::Logging(e.to_string()))?;

    Ok(LoggingGuard { _file: file_guard })
}

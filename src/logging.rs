//! Structured logging for vitalrs
//!
//! Console events go to stderr, so scores piped from stdout stay clean. A JSON
//! log file can be added, either rolled daily or appended to in place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{
    fmt::{format::FmtSpan, layer, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

const DEFAULT_LOG_FILE: &str = "vitalrs.log";

/// `[logging]` section of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,

    /// JSON log file written next to the console output
    pub file_path: Option<PathBuf>,

    /// Roll the log file over daily instead of appending to one file
    pub rotation: bool,

    /// Report span enter/close events
    pub include_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Pretty,
            file_path: None,
            rotation: true,
            include_spans: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// `base` raised by one step per `-v` flag, saturating at trace
    pub fn from_verbosity(base: LogLevel, verbose: u8) -> Self {
        let start = base as usize;
        Self::ALL[(start + verbose as usize).min(Self::ALL.len() - 1)]
    }

    /// Directive enabling this level for the crate's own events
    pub fn directive(self) -> String {
        format!("vitalrs={}", self)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = match s.to_lowercase().as_str() {
            "warning" => "warn".to_string(),
            other => other.to_string(),
        };
        Self::ALL
            .into_iter()
            .find(|level| level.to_string() == wanted)
            .ok_or_else(|| format!("Invalid log level: {}", s))
    }
}

/// Console event layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line with source locations
    Pretty,
    /// One JSON object per event
    Json,
    /// One line per event
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Writer for the JSON log file, creating its directory first
fn log_file_writer(path: &Path, rotation: bool) -> anyhow::Result<BoxMakeWriter> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    if rotation {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_LOG_FILE);
        Ok(BoxMakeWriter::new(tracing_appender::rolling::daily(dir, name)))
    } else {
        let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BoxMakeWriter::new(Mutex::new(file)))
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.directive()));

    let spans = config.include_spans;
    let console = match config.format {
        LogFormat::Pretty => layer()
            .with_writer(std::io::stderr)
            .with_line_number(true)
            .with_span_events(if spans {
                FmtSpan::ENTER | FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            })
            .boxed(),
        LogFormat::Json => layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(spans)
            .with_span_list(spans)
            .boxed(),
        LogFormat::Compact => layer().compact().with_writer(std::io::stderr).boxed(),
    };

    let file = match &config.file_path {
        Some(path) => Some(
            layer()
                .json()
                .with_writer(log_file_writer(path, config.rotation)?)
                .with_current_span(spans)
                .with_span_list(spans),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    tracing::debug!(
        level = %config.level,
        format = ?config.format,
        file = ?config.file_path,
        "Logging initialized"
    );
    Ok(())
}

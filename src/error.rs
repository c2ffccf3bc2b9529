//! Unified error hierarchy for vitalrs
//!
//! Missing physiological data is never an error in this crate: scorers drop the
//! affected component and rebalance. The types here cover malformed calls,
//! insufficient history for longitudinal analytics, bad configuration, and the
//! file boundary.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all vitalrs operations
#[derive(Debug, Error)]
pub enum VitalsError {
    /// Data validation errors at the ingestion boundary
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Import/export errors
    #[error("Import/Export error: {0}")]
    ImportExport(#[from] ImportExportError),

    /// Calculation errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Configuration errors (e.g. zone thresholds not strictly increasing)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Import and export errors
#[derive(Debug, Error)]
pub enum ImportExportError {
    /// Unsupported format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Format-specific parsing error
    #[error("Parse error in {format}: {reason}")]
    ParseError { format: String, reason: String },

    /// Missing required data
    #[error("Missing required data: {field}")]
    MissingData { field: String },

    /// Export failed
    #[error("Export failed to {path}: {reason}")]
    ExportFailed { path: PathBuf, reason: String },
}

/// Calculation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculationError {
    /// Not enough history for a well-formed result ("assessment unavailable")
    #[error("Insufficient data for {calculation}: need {required}, have {available}")]
    InsufficientData {
        calculation: String,
        required: usize,
        available: usize,
    },

    /// Paired series of different lengths
    #[error("Length mismatch in {calculation}: {left} vs {right}")]
    LengthMismatch {
        calculation: String,
        left: usize,
        right: usize,
    },

    /// Invalid parameter
    #[error("Invalid parameter for {calculation}: {parameter}={value}")]
    InvalidParameter {
        calculation: String,
        parameter: String,
        value: String,
    },

    /// A day folded into the load chain at or before the last one
    #[error("Out of order load update: {date} is not after {last}")]
    OutOfOrder { date: NaiveDate, last: NaiveDate },
}

impl CalculationError {
    /// Shorthand for the insufficient-history case
    pub fn insufficient(calculation: &str, required: usize, available: usize) -> Self {
        CalculationError::InsufficientData {
            calculation: calculation.to_string(),
            required,
            available,
        }
    }

    /// True when the error only signals that a result is not yet available
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CalculationError::InsufficientData { .. })
    }
}

/// Result type alias for vitalrs operations
pub type Result<T> = std::result::Result<T, VitalsError>;

impl VitalsError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            VitalsError::Validation(_) => ErrorSeverity::Warning,
            VitalsError::Calculation(CalculationError::InsufficientData { .. }) => {
                ErrorSeverity::Info
            }
            VitalsError::Configuration(_) => ErrorSeverity::Critical,
            VitalsError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            VitalsError::Calculation(CalculationError::InsufficientData {
                calculation,
                required,
                available,
            }) => {
                format!(
                    "Not enough history to compute {} yet ({} of {} days).",
                    calculation, available, required
                )
            }
            VitalsError::Configuration(reason) => {
                format!("Configuration is invalid: {}. Please fix your config file.", reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}

//! Error types for the cancellations service.
//!
//! - [`SourceError`] - Reading workbooks and CSV sheet directories
//! - [`ConfigError`] - Invalid environment or CLI configuration
//! - [`ServerError`] - HTTP layer failures
//!
//! Ingestion passes never return these to callers: a failing source is
//! recorded on the published snapshot instead (see
//! [`crate::transform::pipeline::PassOutcome`]).

use thiserror::Error;

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while loading a tabular source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Path does not exist.
    #[error("Source not found: {0}")]
    NotFound(String),

    /// Failed to read file or directory.
    #[error("Failed to read source: {0}")]
    Io(#[from] std::io::Error),

    /// Workbook could not be opened or a sheet could not be read.
    #[error("Invalid workbook: {0}")]
    Workbook(#[from] calamine::Error),

    /// CSV sheet could not be parsed.
    #[error("Invalid CSV sheet: {0}")]
    Csv(#[from] csv::Error),

    /// CSV bytes could not be decoded.
    #[error("Failed to decode sheet: {0}")]
    Encoding(String),

    /// Source contained no sheets at all.
    #[error("Source has no sheets")]
    NoSheets,
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while building [`crate::config::Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting was present but could not be parsed.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Uploaded workbook could not be read.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Failed to bind or write files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

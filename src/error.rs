//! Error types for confscan
//!
//! This module defines custom error types using `thiserror`. Each stage of a scan
//! has its own error enum; [`ScanError`] carries them to the caller without adding
//! another layer of message, so the original cause is what gets displayed.

use thiserror::Error;

/// Main error type for the confscan application
#[derive(Error, Debug)]
pub enum ConfscanError {
    /// Scan-related errors
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors writing rendered output
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

/// Errors returned by the scan entry points.
///
/// Every variant is transparent: the message and `source()` are those of the
/// stage that failed.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Document parsing failed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Policy rules could not be loaded while building the evaluation engine
    #[error(transparent)]
    PolicyLoad(#[from] PolicyLoadError),

    /// Reading an input stream or staging it in memory failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The evaluation engine failed mid-run
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Reasons a [`crate::context::ScanContext`] stops a scan
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("scan cancelled")]
    Cancelled,

    #[error("scan deadline exceeded")]
    DeadlineExceeded,
}

/// Errors that occur while parsing configuration documents
#[derive(Error, Debug)]
pub enum ParseError {
    /// The directory to scan could not be walked
    #[error("Failed to walk '{dir}': {source}")]
    Walk {
        /// Directory that was being walked
        dir: String,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// A candidate file could not be read
    #[error("Failed to read file '{path}': {source}")]
    Read {
        /// Path to the file that failed to read
        path: String,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// A recognized document is not valid YAML or JSON
    #[error("Malformed document in '{path}': {message}")]
    Malformed {
        /// Path to the offending file
        path: String,
        /// Parser message
        message: String,
    },

    /// The scan context was cancelled or expired
    #[error(transparent)]
    Cancelled(#[from] ContextError),
}

/// Errors that occur while loading policy rules
#[derive(Error, Debug)]
pub enum PolicyLoadError {
    /// A configured policy directory could not be listed
    #[error("Failed to read policy directory '{path}': {source}")]
    Directory {
        /// Directory path as configured
        path: String,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// A policy file or stream could not be read
    #[error("Failed to read policy source '{origin}': {source}")]
    Read {
        /// File path or stream name
        origin: String,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// A policy source is not valid rule YAML/JSON
    #[error("Malformed policy source '{origin}': {message}")]
    Malformed {
        /// File path or stream name
        origin: String,
        /// Parser message
        message: String,
    },

    /// A rule parsed but cannot be compiled
    #[error("Invalid rule '{rule_id}' in '{origin}': {reason}")]
    InvalidRule {
        /// Rule identifier (may be empty when the id itself is missing)
        rule_id: String,
        /// File path or stream name
        origin: String,
        /// What is wrong with the rule
        reason: String,
    },

    /// The requested scan profile does not exist
    #[error("Unknown compliance spec '{0}'")]
    UnknownSpec(String),
}

/// Errors raised by an evaluation engine
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// The scan context was cancelled or expired
    #[error(transparent)]
    Cancelled(#[from] ContextError),

    /// Engine-specific failure, such as evaluating before any policies
    /// were loaded. Other `PolicyEngine` implementations report their own
    /// failures here.
    #[error("Evaluation failed: {0}")]
    Engine(String),
}

/// Errors that occur while loading the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        /// Path to the config file
        path: String,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// Failed to parse the configuration file
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value in the configuration is not acceptable
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Offending key
        field: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Errors that occur while writing reports
#[derive(Error, Debug)]
pub enum OutputError {
    /// Failed to serialize results
    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Failed to write the rendered report
    #[error("Failed to write '{path}': {source}")]
    FileWrite {
        /// Destination path
        path: String,
        /// The underlying I/O error
        source: std::io::Error,
    },
}

impl From<toml::de::Error> for ConfscanError {
    fn from(err: toml::de::Error) -> Self {
        ConfscanError::Config(ConfigError::Parse(err))
    }
}

impl From<serde_json::Error> for ConfscanError {
    fn from(err: serde_json::Error) -> Self {
        ConfscanError::Output(OutputError::Serialize(err))
    }
}

//! Error type shared by configuration, formatting and the logger facade.
//!
//! Startup errors (config, level, patterns, double init) are returned to the
//! caller. Per-record errors ([`LogError::Serialization`]) are recovered by the
//! [`Logger`](crate::Logger) itself so one bad field never blocks the stream.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by the logging facade.
#[derive(Debug, Error)]
pub enum LogError {
    /// The configuration file could not be read.
    #[error("Failed to read logging config from {}", path.display())]
    ConfigLoad {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration document is malformed or incomplete.
    #[error("Failed to parse logging config from {origin}")]
    ConfigParse {
        origin: String,
        #[source]
        source: quick_xml::de::DeError,
    },

    /// The configured level is not one of TRACE, DEBUG, INFO, WARN, ERROR or OFF.
    #[error("Unknown log level '{0}'")]
    InvalidLevel(String),

    /// The configured timestamp format is not a valid strftime string.
    #[error("Invalid timestamp format '{0}'")]
    InvalidTimestampFormat(String),

    /// The configured line pattern cannot be compiled.
    #[error("Invalid log pattern '{layout}': {reason}")]
    InvalidLayout { layout: String, reason: String },

    /// A sensitive pattern failed to compile at registration.
    #[error("Invalid sensitive pattern '{name}'")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("Logger is already initialized")]
    AlreadyInitialized,

    #[error("Sensitive patterns are already registered")]
    AlreadyRegistered,

    /// Sensitive patterns are registered but the installed logger would not
    /// apply them.
    #[error("Sensitive patterns are registered but the logger does not mask messages")]
    PatternsNotApplied,

    #[error("Logger is not initialized. Call veil::init first")]
    NotInitialized,

    /// A field value could not be rendered by the active formatter.
    #[error("Field '{field}' cannot be serialized: {reason}")]
    Serialization { field: String, reason: String },

    #[error("Failed to encode log record")]
    Encoding(#[from] serde_json::Error),

    #[error("Failed to write log record")]
    Write(#[from] io::Error),

    #[error("Failed to install tracing subscriber")]
    SubscriberInstall(#[from] tracing_subscriber::util::TryInitError),
}

/// Result alias used throughout the crate.
pub type LogResult<T> = Result<T, LogError>;

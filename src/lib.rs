//! Structured logging with contextual fields, pluggable record formats and
//! masking of sensitive data.
//!
//! # Overview
//!
//! - [`Logger`] formats [`LogRecord`](record::LogRecord)s and writes them to a
//!   sink. It is built from a [`LogConfig`] (usually loaded from XML).
//! - [`ContextLogger`] is an immutable handle carrying fields. Deriving a
//!   child never affects the parent, so handles can be shared across threads.
//! - [`PatternRegistry`] rewrites messages before they are written, replacing
//!   credentials, emails, phone numbers or any custom pattern.
//! - The [`facade`] module holds an optional process-wide logger and
//!   [`logging::setup_tracing`] routes `tracing` events through it.
//!
//! ```rust,ignore
//! veil::register_sensitive_message_formatter()?;
//! let logger = veil::init(&LogConfig::load("log.xml")?)?;
//!
//! let ctx = LogContext::background().with_timeout(Duration::from_secs(5));
//! logger.with_context(&ctx).info("+84225898023"); // +84*********23
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod facade;
pub mod format;
pub mod logger;
pub mod logging;
mod macros;
pub mod masking;
pub mod record;
pub mod sink;
pub mod tools;

pub use config::LogConfig;
pub use context::LogContext;
pub use error::{LogError, LogResult};
pub use facade::{
    init, init_with, is_initialized, logger, register_sensitive_message_formatter,
    register_sensitive_patterns, registered_patterns, with_context, with_field,
};
pub use logger::{ContextLogger, Logger, LoggerBuilder};
pub use masking::{MaskFailurePolicy, PatternRegistry, Replacement, SensitivePattern};
pub use sink::BufferSink;
pub use tracing::Level;
pub use tracing::level_filters::LevelFilter;

//! The process-wide logger.
//!
//! Startup order: optionally register sensitive patterns, then [`init`] once.
//! After that [`logger`], [`with_context`] and [`with_field`] hand out
//! handles from any thread.
//!
//! ```rust,ignore
//! veil::register_sensitive_message_formatter()?;
//! veil::init(&LogConfig::load("log.xml")?)?;
//!
//! veil::with_field("logger", "main")?.info("Application started");
//! ```

use std::sync::{Mutex, OnceLock, PoisonError};

use serde::Serialize;

use crate::config::LogConfig;
use crate::context::LogContext;
use crate::error::{LogError, LogResult};
use crate::logger::{ContextLogger, Logger};
use crate::masking::PatternRegistry;
use crate::masking::rules::default_registry;

static LOGGER: OnceLock<Logger> = OnceLock::new();
static SENSITIVE: OnceLock<PatternRegistry> = OnceLock::new();

/// Serializes registration and initialization against each other.
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Masks messages of the process-wide logger with the built-in rules
/// (credentials, emails, phone numbers and card numbers).
///
/// Must be called before [`init`]. Without it, messages are written as is.
pub fn register_sensitive_message_formatter() -> LogResult<()> {
    register_sensitive_patterns(default_registry()?)
}

/// Masks messages of the process-wide logger with `registry`.
///
/// Fails with [`LogError::AlreadyInitialized`] after [`init`] and with
/// [`LogError::AlreadyRegistered`] on a second call.
pub fn register_sensitive_patterns(registry: PatternRegistry) -> LogResult<()> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

    if LOGGER.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }

    SENSITIVE
        .set(registry)
        .map_err(|_| LogError::AlreadyRegistered)
}

/// Builds the process-wide logger from `config`.
///
/// Can succeed only once; later calls fail with
/// [`LogError::AlreadyInitialized`] and leave the first logger in place.
pub fn init(config: &LogConfig) -> LogResult<&'static Logger> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

    if LOGGER.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }

    let mut builder = Logger::builder().config(config)?;
    if let Some(patterns) = SENSITIVE.get() {
        builder = builder.sensitive_patterns(patterns.clone());
    }

    install(builder.build()?)
}

/// Installs an already built logger as the process-wide logger.
///
/// If sensitive patterns are registered, `logger` must mask messages (see
/// [`Logger::masks_messages`]), otherwise this fails with
/// [`LogError::PatternsNotApplied`] and nothing is installed.
pub fn init_with(logger: Logger) -> LogResult<&'static Logger> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

    if LOGGER.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }

    if let Some(patterns) = SENSITIVE.get()
        && !patterns.is_empty()
        && !logger.masks_messages()
    {
        return Err(LogError::PatternsNotApplied);
    }

    install(logger)
}

/// The patterns passed to [`register_sensitive_patterns`], if any.
pub fn registered_patterns() -> Option<&'static PatternRegistry> {
    SENSITIVE.get()
}

fn install(logger: Logger) -> LogResult<&'static Logger> {
    LOGGER
        .set(logger)
        .map_err(|_| LogError::AlreadyInitialized)?;

    tracing::debug!("Process-wide logger initialized");

    LOGGER.get().ok_or(LogError::NotInitialized)
}

/// Returns the process-wide logger.
pub fn logger() -> LogResult<&'static Logger> {
    LOGGER.get().ok_or(LogError::NotInitialized)
}

pub fn is_initialized() -> bool {
    LOGGER.get().is_some()
}

/// A handle carrying the request id and deadline of `ctx`.
pub fn with_context(ctx: &LogContext) -> LogResult<ContextLogger> {
    Ok(logger()?.with_context(ctx))
}

/// A handle carrying one field.
pub fn with_field<T: Serialize + ?Sized>(
    key: impl Into<String>,
    value: &T,
) -> LogResult<ContextLogger> {
    Ok(logger()?.with_field(key, value))
}

//! The logger instance and its contextual handles.
//!
//! A [`Logger`] owns the active [`RecordFormatter`], the sink and the level.
//! It is constructed explicitly (see [`LoggerBuilder`]) and can be passed
//! around or installed once as the process-wide logger via
//! [`init`](crate::init).
//!
//! A [`ContextLogger`] is an immutable handle carrying fields. Every
//! `with_*` call returns a new handle, so handles can be shared across threads
//! and children derived concurrently without locks.

use std::borrow::Cow;
use std::fmt::{Debug, Formatter};
use std::io::Write;
use std::panic::Location;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;

use crate::config::{LogConfig, Output};
use crate::context::LogContext;
use crate::error::{LogError, LogResult};
use crate::format::{FormatterConfig, Layout, RecordFormatter, ShortFunctionName, TimestampFormat};
use crate::masking::{MaskFailurePolicy, PatternRegistry};
use crate::record::{FieldValue, Fields, LogRecord};
use crate::sink::SharedWriter;

/// Field set from [`LogContext::request_id`].
pub const REQUEST_ID_FIELD: &str = "request_id";
/// Field set from [`LogContext::deadline`].
pub const DEADLINE_FIELD: &str = "deadline";
/// Field set by [`ContextLogger::named`].
pub const LOGGER_FIELD: &str = "logger";

struct LoggerInner {
    formatter: Arc<dyn RecordFormatter>,
    writer: SharedWriter,
    max_level: LevelFilter,
    masks_messages: bool,
}

/// A configured logger. Cloning is cheap and shares the same formatter and sink.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// Builds a logger from `config` writing to the configured output, without
    /// sensitive patterns.
    pub fn from_config(config: &LogConfig) -> LogResult<Self> {
        Self::builder().config(config)?.build()
    }

    /// A handle without fields.
    pub fn root(&self) -> ContextLogger {
        ContextLogger {
            logger: self.clone(),
            fields: Fields::default(),
            deadline: None,
            caller: None,
        }
    }

    pub fn with_context(&self, ctx: &LogContext) -> ContextLogger {
        self.root().with_context(ctx)
    }

    pub fn with_field<T: Serialize + ?Sized>(&self, key: impl Into<String>, value: &T) -> ContextLogger {
        self.root().with_field(key, value)
    }

    pub fn max_level(&self) -> LevelFilter {
        self.inner.max_level
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.inner.max_level
    }

    /// Returns `true` if messages pass through a non-empty
    /// [`PatternRegistry`]. Loggers built with an explicit formatter report
    /// `false`.
    pub fn masks_messages(&self) -> bool {
        self.inner.masks_messages
    }

    pub fn formatter(&self) -> Arc<dyn RecordFormatter> {
        Arc::clone(&self.inner.formatter)
    }

    pub fn writer(&self) -> SharedWriter {
        self.inner.writer.clone()
    }

    /// Formats and writes one record.
    ///
    /// Records above the max level are skipped. If a field cannot be
    /// serialized, the record is written again with a placeholder for that
    /// field and a diagnostic is emitted.
    pub fn emit(&self, record: &LogRecord) -> LogResult<()> {
        if !self.enabled(record.level()) {
            return Ok(());
        }

        let bytes = match self.inner.formatter.format(record) {
            Ok(bytes) => bytes,
            Err(LogError::Serialization { field, reason }) => {
                tracing::warn!(%field, %reason, "Log field cannot be serialized, using a placeholder");
                self.inner.formatter.format(&record.with_placeholders())?
            }
            Err(err) => return Err(err),
        };

        let mut writer = self.inner.writer.make_writer();
        writer.write_all(&bytes)?;
        writer.flush()?;

        Ok(())
    }
}

impl Debug for Logger {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("max_level", &self.inner.max_level)
            .field("writer", &self.inner.writer)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Logger`].
///
/// ```rust,ignore
/// let logger = Logger::builder()
///     .config(&config)?
///     .sensitive_patterns(rules::default_registry()?)
///     .writer(BufferSink::new())
///     .build()?;
/// ```
pub struct LoggerBuilder {
    layout: Layout,
    timestamp_format: TimestampFormat,
    max_level: LevelFilter,
    patterns: Option<PatternRegistry>,
    mask_failure: Option<MaskFailurePolicy>,
    writer: Option<SharedWriter>,
    formatter: Option<Arc<dyn RecordFormatter>>,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self {
            layout: Layout::Json,
            timestamp_format: TimestampFormat::default(),
            max_level: LevelFilter::INFO,
            patterns: None,
            mask_failure: None,
            writer: None,
            formatter: None,
        }
    }
}

impl LoggerBuilder {
    /// Applies level, timestamp format, layout, failure policy and output
    /// from `config`, validating each.
    pub fn config(mut self, config: &LogConfig) -> LogResult<Self> {
        self.max_level = config.level_filter()?;
        self.timestamp_format = TimestampFormat::parse(&config.timestamp_format)?;
        self.layout = Layout::parse(&config.pattern);
        self.mask_failure = Some(config.mask_failure);
        self.writer = Some(match config.output {
            Output::Stdout => SharedWriter::stdout(),
            Output::Stderr => SharedWriter::stderr(),
        });

        Ok(self)
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    pub fn max_level(mut self, level: LevelFilter) -> Self {
        self.max_level = level;
        self
    }

    /// Masks every message with `registry`.
    pub fn sensitive_patterns(mut self, registry: PatternRegistry) -> Self {
        self.patterns = Some(registry);
        self
    }

    pub fn writer<M>(mut self, make_writer: M) -> Self
    where
        M: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.writer = Some(SharedWriter::new(make_writer));
        self
    }

    /// Uses `formatter` as is, ignoring layout, timestamp format and patterns.
    pub fn formatter(mut self, formatter: Arc<dyn RecordFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// The formatter settings this builder would use.
    pub fn formatter_config(&self) -> FormatterConfig {
        let config = FormatterConfig::default()
            .with_timestamp_format(self.timestamp_format.clone())
            .with_function_name_formatter(ShortFunctionName);

        match (&self.patterns, self.mask_failure) {
            (Some(patterns), Some(policy)) => {
                config.with_message_formatter(patterns.clone().with_failure_policy(policy))
            }
            (Some(patterns), None) => config.with_message_formatter(patterns.clone()),
            (None, _) => config,
        }
    }

    pub fn build(self) -> LogResult<Logger> {
        let formatter = match &self.formatter {
            Some(formatter) => Arc::clone(formatter),
            None => self.layout.formatter(self.formatter_config())?,
        };
        let masks_messages = self.formatter.is_none()
            && self
                .patterns
                .as_ref()
                .is_some_and(|patterns| !patterns.is_empty());

        Ok(Logger {
            inner: Arc::new(LoggerInner {
                formatter,
                writer: self.writer.unwrap_or_else(SharedWriter::stdout),
                max_level: self.max_level,
                masks_messages,
            }),
        })
    }
}

/// An immutable logging handle with contextual fields.
#[derive(Clone)]
pub struct ContextLogger {
    logger: Logger,
    fields: Fields,
    deadline: Option<DateTime<Utc>>,
    caller: Option<&'static str>,
}

impl ContextLogger {
    /// Returns a handle with `key` set to `value`.
    pub fn with_field<T: Serialize + ?Sized>(&self, key: impl Into<String>, value: &T) -> Self {
        Self {
            fields: self.fields.with(key, FieldValue::from_serialize(value)),
            ..self.clone()
        }
    }

    /// Returns a handle with all `fields` added in order.
    pub fn with_fields<K, V, I>(&self, fields: I) -> Self
    where
        K: Into<String>,
        V: Serialize,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields = fields.into_iter().fold(self.fields.clone(), |acc, (key, value)| {
            acc.with(key, FieldValue::from_serialize(&value))
        });

        Self {
            fields,
            ..self.clone()
        }
    }

    /// Returns a handle carrying the context's request id and deadline.
    pub fn with_context(&self, ctx: &LogContext) -> Self {
        let mut child = self.clone();

        if let Some(request_id) = ctx.request_id() {
            child = child.with_field(REQUEST_ID_FIELD, request_id);
        }

        if let Some(deadline) = ctx.deadline() {
            child = child.with_field(
                DEADLINE_FIELD,
                &deadline.to_rfc3339_opts(SecondsFormat::Millis, true),
            );
            child.deadline = Some(deadline);
        }

        child
    }

    /// Returns a handle tagged with a logger name.
    pub fn named(&self, name: &str) -> Self {
        self.with_field(LOGGER_FIELD, name)
    }

    /// Returns a handle whose records report `function` as their caller.
    pub fn at(&self, function: &'static str) -> Self {
        Self {
            caller: Some(function),
            ..self.clone()
        }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Builds a record for `message` and writes it.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>) -> LogResult<()> {
        self.emit(level, message.into(), Location::caller())
    }

    #[track_caller]
    pub fn trace(&self, message: impl Into<String>) {
        self.report(Level::TRACE, message.into(), Location::caller());
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.report(Level::DEBUG, message.into(), Location::caller());
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.report(Level::INFO, message.into(), Location::caller());
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<String>) {
        self.report(Level::WARN, message.into(), Location::caller());
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.report(Level::ERROR, message.into(), Location::caller());
    }

    fn report(&self, level: Level, message: String, location: &Location<'_>) {
        if let Err(err) = self.emit(level, message, location) {
            tracing::warn!(error = %err, "Failed to write log record");
        }
    }

    fn emit(&self, level: Level, message: String, location: &Location<'_>) -> LogResult<()> {
        if !self.logger.enabled(level) {
            return Ok(());
        }

        let caller = match self.caller {
            Some(function) => Cow::Borrowed(function),
            None => Cow::Owned(format!("{}:{}", location.file(), location.line())),
        };

        let record = LogRecord::new(level, message)
            .with_fields(self.fields.clone())
            .with_caller(caller);

        self.logger.emit(&record)
    }
}

impl Debug for ContextLogger {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextLogger")
            .field("fields", &self.fields)
            .field("deadline", &self.deadline)
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}

//! Record formatting.
//!
//! A [`RecordFormatter`] turns a [`LogRecord`] into the bytes written to the
//! sink. Formatters share a [`FormatterConfig`] with two string strategies:
//!
//! - the message strategy, usually a [`PatternRegistry`](crate::PatternRegistry)
//!   masking sensitive data,
//! - the function name strategy, usually [`ShortFunctionName`].
//!
//! Both default to [`Identity`].

use std::borrow::Cow;
use std::fmt::{Debug, Formatter, Write as _};
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};

use crate::error::{LogError, LogResult};
use crate::record::LogRecord;

mod json;
#[cfg(feature = "pretty_logs")]
mod pretty;
mod text;

pub use json::JsonFormatter;
#[cfg(feature = "pretty_logs")]
pub use pretty::PrettyFormatter;
pub use text::TextFormatter;

/// A pure `&str -> str` rewrite used for messages and function names.
///
/// Implementations must be total: unknown input is returned unchanged.
pub trait StringFormat: Send + Sync {
    fn format<'a>(&self, raw: &'a str) -> Cow<'a, str>;
}

impl<F> StringFormat for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn format<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        Cow::Owned(self(raw))
    }
}

/// Returns its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl StringFormat for Identity {
    fn format<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(raw)
    }
}

/// Shortens call-site identifiers for display.
///
/// ```text
/// veil::handlers::create_user          -> create_user
/// veil::worker::run::{{closure}}       -> run
/// src/bin/demo.rs:21                   -> demo.rs:21
/// main.someFunc                        -> someFunc
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortFunctionName;

impl StringFormat for ShortFunctionName {
    fn format<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        let short = if raw.contains("::") {
            raw.rsplit("::")
                .find(|segment| !segment.is_empty() && *segment != "{{closure}}")
        } else if raw.contains(':') {
            raw.rsplit(['/', '\\']).next()
        } else if raw.contains('.') {
            raw.rsplit('.').next().filter(|segment| !segment.is_empty())
        } else {
            None
        };

        Cow::Borrowed(short.unwrap_or(raw))
    }
}

/// A validated chrono strftime string.
#[derive(Clone, PartialEq, Eq)]
pub struct TimestampFormat(Option<String>);

impl TimestampFormat {
    /// RFC 3339 with milliseconds, used when no format is configured.
    pub const DEFAULT: &'static str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

    /// Validates `format`. An empty string selects [`Self::DEFAULT`].
    pub fn parse(format: &str) -> LogResult<Self> {
        if format.is_empty() {
            return Ok(Self(None));
        }

        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(LogError::InvalidTimestampFormat(format.to_owned()));
        }

        Ok(Self(Some(format.to_owned())))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or(Self::DEFAULT)
    }

    pub fn render(&self, timestamp: &DateTime<Local>) -> String {
        let mut rendered = String::with_capacity(32);
        // Formats are validated on construction
        if write!(rendered, "{}", timestamp.format(self.as_str())).is_err() {
            rendered.clear();
            rendered.push_str(&timestamp.to_rfc3339());
        }
        rendered
    }
}

impl Default for TimestampFormat {
    fn default() -> Self {
        Self(None)
    }
}

impl Debug for TimestampFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TimestampFormat({:?})", self.as_str())
    }
}

/// Settings shared by all record formatters.
#[derive(Clone)]
pub struct FormatterConfig {
    pub timestamp_format: TimestampFormat,
    pub message: Arc<dyn StringFormat>,
    pub function_name: Arc<dyn StringFormat>,
}

impl FormatterConfig {
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    pub fn with_message_formatter(mut self, formatter: impl StringFormat + 'static) -> Self {
        self.message = Arc::new(formatter);
        self
    }

    pub fn with_function_name_formatter(
        mut self,
        formatter: impl StringFormat + 'static,
    ) -> Self {
        self.function_name = Arc::new(formatter);
        self
    }

    pub(crate) fn timestamp(&self, record: &LogRecord) -> String {
        self.timestamp_format.render(record.timestamp())
    }

    pub(crate) fn message<'a>(&self, record: &'a LogRecord) -> Cow<'a, str> {
        self.message.format(record.message())
    }

    pub(crate) fn function<'a>(&self, record: &'a LogRecord) -> Option<Cow<'a, str>> {
        record.caller().map(|caller| self.function_name.format(caller))
    }
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            timestamp_format: TimestampFormat::default(),
            message: Arc::new(Identity),
            function_name: Arc::new(Identity),
        }
    }
}

impl Debug for FormatterConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatterConfig")
            .field("timestamp_format", &self.timestamp_format)
            .finish_non_exhaustive()
    }
}

/// Serializes a record into its final wire form.
///
/// Implementations hold only read-only configuration and may be called from
/// many threads at once. Every call returns a fresh buffer ending in a newline.
pub trait RecordFormatter: Send + Sync {
    /// Renders `record`. Returns [`LogError::Serialization`] if a field value
    /// cannot be rendered.
    fn format(&self, record: &LogRecord) -> LogResult<Vec<u8>>;
}

/// The record layout selected by `LogConfig.pattern`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    Json,
    Pretty,
    Text(String),
}

impl Layout {
    pub fn parse(pattern: &str) -> Self {
        match pattern.trim() {
            "" | "json" => Layout::Json,
            "pretty" => Layout::Pretty,
            _ => Layout::Text(pattern.to_owned()),
        }
    }

    /// Builds the formatter for this layout.
    pub fn formatter(&self, config: FormatterConfig) -> LogResult<Arc<dyn RecordFormatter>> {
        match self {
            Layout::Json => Ok(Arc::new(JsonFormatter::new(config))),
            Layout::Text(template) => Ok(Arc::new(TextFormatter::new(template, config)?)),
            #[cfg(feature = "pretty_logs")]
            Layout::Pretty => Ok(Arc::new(PrettyFormatter::new(config))),
            #[cfg(not(feature = "pretty_logs"))]
            Layout::Pretty => {
                tracing::info!("Pretty logs are not enabled, using the text layout");
                Ok(Arc::new(TextFormatter::new(
                    TextFormatter::DEFAULT_TEMPLATE,
                    config,
                )?))
            }
        }
    }
}

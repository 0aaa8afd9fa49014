//! Plain text lines rendered from a template.
//!
//! Placeholders: `{timestamp}`, `{level}`, `{function}`, `{message}` and
//! `{fields}`. Everything else is copied verbatim.
//!
//! ```text
//! {timestamp} {level} {function}: {message} {fields}
//! 2024-01-15T12:30:45.123+07:00 INFO  some_func: +84*********23 logger=main
//! ```

use std::fmt::Write as _;

use serde_json::Value;

use super::{FormatterConfig, RecordFormatter};
use crate::error::{LogError, LogResult};
use crate::record::{FieldValue, LogRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Timestamp,
    Level,
    Function,
    Message,
    Fields,
}

#[derive(Debug, Clone)]
pub struct TextFormatter {
    segments: Vec<Segment>,
    config: FormatterConfig,
}

impl TextFormatter {
    pub const DEFAULT_TEMPLATE: &'static str = "{timestamp} {level} {function}: {message} {fields}";

    /// Compiles `template`. Unknown placeholders and unclosed braces are rejected.
    pub fn new(template: &str, config: FormatterConfig) -> LogResult<Self> {
        Ok(Self {
            segments: parse_template(template)?,
            config,
        })
    }
}

fn parse_template(template: &str) -> LogResult<Vec<Segment>> {
    let invalid = |reason: String| LogError::InvalidLayout {
        layout: template.to_owned(),
        reason,
    };

    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        if open > 0 {
            segments.push(Segment::Literal(rest[..open].to_owned()));
        }

        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| invalid(format!("unclosed '{{' at offset {}", template.len() - rest.len() + open)))?;

        segments.push(match &after[..close] {
            "timestamp" => Segment::Timestamp,
            "level" => Segment::Level,
            "function" => Segment::Function,
            "message" => Segment::Message,
            "fields" => Segment::Fields,
            other => return Err(invalid(format!("unknown placeholder '{{{other}}}'"))),
        });

        rest = &after[close + 1..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_owned()));
    }

    Ok(segments)
}

fn write_fields(out: &mut String, record: &LogRecord) -> LogResult<()> {
    for (index, (key, value)) in record.fields().iter().enumerate() {
        let value = match value {
            FieldValue::Json(value) => value,
            FieldValue::Unserializable(reason) => {
                return Err(LogError::Serialization {
                    field: key.to_owned(),
                    reason: reason.clone(),
                });
            }
        };

        if index > 0 {
            out.push(' ');
        }
        out.push_str(key);
        out.push('=');

        match value {
            Value::String(text) if !text.is_empty() && !text.contains(char::is_whitespace) => {
                out.push_str(text)
            }
            value => out.push_str(&serde_json::to_string(value)?),
        }
    }

    Ok(())
}

impl RecordFormatter for TextFormatter {
    fn format(&self, record: &LogRecord) -> LogResult<Vec<u8>> {
        let mut out = String::with_capacity(128);

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Timestamp => out.push_str(&self.config.timestamp(record)),
                Segment::Level => {
                    let _ = write!(out, "{:<5}", record.level().as_str());
                }
                Segment::Function => {
                    if let Some(function) = self.config.function(record) {
                        out.push_str(&function);
                    }
                }
                Segment::Message => out.push_str(&self.config.message(record)),
                Segment::Fields => write_fields(&mut out, record)?,
            }
        }

        let mut line = out.trim_end().to_owned().into_bytes();
        line.push(b'\n');

        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ShortFunctionName, TimestampFormat};
    use crate::masking::rules::default_registry;
    use crate::record::Fields;
    use chrono::{Local, NaiveDate, TimeZone};
    use serde_json::json;
    use tracing::Level;

    fn config() -> FormatterConfig {
        FormatterConfig::default()
            .with_timestamp_format(TimestampFormat::parse("%H:%M:%S").unwrap())
            .with_message_formatter(default_registry().unwrap())
            .with_function_name_formatter(ShortFunctionName)
    }

    fn record() -> LogRecord {
        let naive = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(8, 5, 9)
            .unwrap();
        let fields = Fields::new()
            .with("logger", json!("main").into())
            .with("note", json!("two words").into())
            .with("count", json!(3).into());

        LogRecord::new(Level::WARN, "call +84225898023")
            .at(Local.from_local_datetime(&naive).single().unwrap())
            .with_caller("veil::demo::some_func")
            .with_fields(fields)
    }

    #[test]
    fn renders_the_default_template() {
        let formatter = TextFormatter::new(TextFormatter::DEFAULT_TEMPLATE, config()).unwrap();
        let line = String::from_utf8(formatter.format(&record()).unwrap()).unwrap();

        assert_eq!(
            line,
            "08:05:09 WARN  some_func: call +84*********23 logger=main note=\"two words\" count=3\n"
        );
    }

    #[test]
    fn renders_custom_templates() {
        let formatter = TextFormatter::new("[{level}] {message}", config()).unwrap();
        let line = String::from_utf8(formatter.format(&record()).unwrap()).unwrap();

        assert_eq!(line, "[WARN ] call +84*********23\n");
    }

    #[test]
    fn rejects_unknown_placeholders() {
        let err = TextFormatter::new("{level} {thread}", config()).unwrap_err();
        assert!(matches!(err, LogError::InvalidLayout { reason, .. } if reason.contains("thread")));
    }

    #[test]
    fn rejects_unclosed_braces() {
        let err = TextFormatter::new("{level} {message", config()).unwrap_err();
        assert!(matches!(err, LogError::InvalidLayout { .. }));
    }

    #[test]
    fn reports_unserializable_fields() {
        let formatter = TextFormatter::new("{fields}", config()).unwrap();
        let record = record().with_fields(
            Fields::new().with("bad", FieldValue::Unserializable("nope".to_owned())),
        );

        assert!(matches!(
            formatter.format(&record),
            Err(LogError::Serialization { field, .. }) if field == "bad"
        ));
    }
}

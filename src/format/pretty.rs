use std::fmt::Write as _;

use nu_ansi_term::{Color, Style};
use tracing::Level;

use super::{FormatterConfig, RecordFormatter};
use crate::error::{LogError, LogResult};
use crate::record::{FieldValue, LogRecord};

/// Colourful, human-friendly console lines for development.
///
/// ```text
/// 14:32:01.234 INFO  some_func: Application started logger=main
/// ```
#[derive(Debug, Clone, Default)]
pub struct PrettyFormatter {
    config: FormatterConfig,
}

macro_rules! styled {
    ($out:expr, $style:expr, $block:block) => {
        let style = $style;
        let _ = write!($out, "{}", style.prefix());
        $block;
        let _ = write!($out, "{}", style.suffix());
    };
}

impl PrettyFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    fn level_style(level: Level) -> Style {
        match level {
            Level::TRACE => Style::new().fg(Color::Purple),
            Level::DEBUG => Style::new().fg(Color::Blue),
            Level::INFO => Style::new().fg(Color::Green),
            Level::WARN => Style::new().fg(Color::Yellow),
            Level::ERROR => Style::new().fg(Color::Red),
        }
    }
}

impl RecordFormatter for PrettyFormatter {
    fn format(&self, record: &LogRecord) -> LogResult<Vec<u8>> {
        let mut out = String::with_capacity(128);

        styled!(out, Style::new().dimmed(), {
            let _ = write!(out, "{} ", self.config.timestamp(record));
        });

        styled!(out, Self::level_style(record.level()), {
            let _ = write!(out, "{:<5}", record.level().as_str());
        });

        out.push(' ');

        if let Some(function) = self.config.function(record) {
            styled!(out, Style::new().dimmed(), {
                let _ = write!(out, "{function}: ");
            });
        }

        out.push_str(&self.config.message(record));

        for (key, value) in record.fields().iter() {
            let value = match value {
                FieldValue::Json(value) => value,
                FieldValue::Unserializable(reason) => {
                    return Err(LogError::Serialization {
                        field: key.to_owned(),
                        reason: reason.clone(),
                    });
                }
            };

            styled!(out, Style::new().fg(Color::Magenta), {
                let _ = write!(out, " {key}");
            });
            let _ = write!(out, "={value}");
        }

        out.push('\n');

        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Fields;
    use serde_json::json;

    #[test]
    fn colours_the_level_and_keeps_fields() {
        let record = LogRecord::new(Level::ERROR, "boom")
            .with_fields(Fields::new().with("logger", json!("main").into()));
        let line = String::from_utf8(PrettyFormatter::default().format(&record).unwrap()).unwrap();

        assert!(line.contains(&Style::new().fg(Color::Red).prefix().to_string()));
        assert!(line.contains("boom"));
        assert!(line.contains("=\"main\""));
        assert!(line.ends_with('\n'));
    }
}

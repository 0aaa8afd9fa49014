//! Formats `tracing` events through the logger's [`RecordFormatter`].
//!
//! Output: the same line the logger itself would write, with the event's
//! fields appended after the message and the span path in `span`:
//! ```text
//! {"timestamp":"...","level":"INFO","function":"server","message":"Listening","port":8080,"span":"startup"}
//! ```

use std::fmt::{Debug, Write as _};
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::error::LogError;
use crate::format::RecordFormatter;
use crate::record::{Fields, LogRecord};

/// Field holding the names of the enclosing spans, outermost first.
pub const SPAN_FIELD: &str = "span";

/// Renders events as [`LogRecord`]s.
pub struct RecordEventFormat {
    formatter: Arc<dyn RecordFormatter>,
}

impl RecordEventFormat {
    pub fn new(formatter: Arc<dyn RecordFormatter>) -> Self {
        Self { formatter }
    }
}

/// Collects the `message` and every other event field.
#[derive(Default)]
struct EventFields {
    message: String,
    fields: Fields,
}

impl EventFields {
    fn record(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
        } else {
            self.fields = self.fields.with(field.name(), value.into());
        }
    }
}

impl Visit for EventFields {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record(field, json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record(field, json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field, json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record(field, json!(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, Value::String(value.to_owned()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        self.record(field, Value::String(format!("{value:?}")));
    }
}

impl<S, N> FormatEvent<S, N> for RecordEventFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();

        let mut visitor = EventFields::default();
        event.record(&mut visitor);

        let mut fields = visitor.fields;
        if let Some(scope) = ctx.event_scope() {
            let spans: Vec<_> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                fields = fields.with(SPAN_FIELD, json!(spans.join(":")).into());
            }
        }

        let record = LogRecord::new(*metadata.level(), visitor.message)
            .with_fields(fields)
            .with_caller(metadata.target());

        let bytes = match self.formatter.format(&record) {
            Ok(bytes) => bytes,
            Err(LogError::Serialization { field, reason }) => {
                tracing::warn!(%field, %reason, "Event field cannot be serialized, using a placeholder");
                self.formatter
                    .format(&record.with_placeholders())
                    .map_err(|_| std::fmt::Error)?
            }
            Err(_) => return Err(std::fmt::Error),
        };

        writer.write_str(&String::from_utf8_lossy(&bytes))
    }
}

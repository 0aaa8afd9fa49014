//! One JSON object per line.
//!
//! ```text
//! {"timestamp":"2024-01-15 12:30:45.123","level":"INFO","function":"some_func","message":"+84*********23","logger":"main"}
//! ```
//!
//! Declared keys come first in a fixed order, followed by the record's fields
//! in insertion order. A field named like a declared key is written as
//! `fields.<key>`, with further `fields.` prefixes until the key is unused.

use serde::Serializer;
use serde::ser::SerializeMap;

use super::{FormatterConfig, RecordFormatter};
use crate::error::{LogError, LogResult};
use crate::record::{FieldValue, LogRecord};

const DECLARED_KEYS: [&str; 4] = ["timestamp", "level", "function", "message"];

#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    config: FormatterConfig,
}

impl JsonFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }
}

impl RecordFormatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> LogResult<Vec<u8>> {
        let mut buffer = Vec::with_capacity(256);
        let mut serializer = serde_json::Serializer::new(&mut buffer);
        let mut map = (&mut serializer).serialize_map(None)?;

        map.serialize_entry("timestamp", &self.config.timestamp(record))?;
        map.serialize_entry("level", record.level().as_str())?;
        if let Some(function) = self.config.function(record) {
            map.serialize_entry("function", &*function)?;
        }
        map.serialize_entry("message", &*self.config.message(record))?;

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

            if DECLARED_KEYS.contains(&key) {
                map.serialize_entry(&renamed_key(record, key), value)?;
            } else {
                map.serialize_entry(key, value)?;
            }
        }

        map.end()?;
        buffer.push(b'\n');

        Ok(buffer)
    }
}

fn renamed_key(record: &LogRecord, key: &str) -> String {
    let mut renamed = format!("fields.{key}");
    while record.fields().get(&renamed).is_some() {
        renamed.insert_str(0, "fields.");
    }
    renamed
}

//! Log records and contextual fields.

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use tracing::Level;

/// Placeholder written in place of a field that could not be serialized.
pub const UNSERIALIZABLE: &str = "[unserializable]";

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Json(Value),
    /// The value was rejected by `serde_json`. Carries the reason.
    Unserializable(String),
}

impl FieldValue {
    /// Converts any serializable value. Never fails; rejected values are kept
    /// as [`FieldValue::Unserializable`] and reported by the formatter.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => FieldValue::Json(value),
            Err(err) => FieldValue::Unserializable(err.to_string()),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Json(value)
    }
}

/// An ordered, immutable set of fields. Cloning shares the underlying list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Arc<Vec<(String, FieldValue)>>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with `key` set to `value`. An existing key keeps its
    /// position; new keys are appended.
    pub fn with(&self, key: impl Into<String>, value: FieldValue) -> Self {
        let key = key.into();
        let mut entries = Vec::clone(&self.entries);

        match entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => entries.push((key, value)),
        }

        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a copy where every unserializable value is replaced by
    /// [`UNSERIALIZABLE`].
    pub fn with_placeholders(&self) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(key, value)| match value {
                FieldValue::Unserializable(_) => (
                    key.clone(),
                    FieldValue::Json(Value::String(UNSERIALIZABLE.to_owned())),
                ),
                value => (key.clone(), value.clone()),
            })
            .collect();

        Self {
            entries: Arc::new(entries),
        }
    }
}

/// One log event. Built per call and never modified afterwards.
#[derive(Debug, Clone)]
pub struct LogRecord {
    timestamp: DateTime<Local>,
    level: Level,
    message: String,
    fields: Fields,
    caller: Option<String>,
}

impl LogRecord {
    /// Creates a record stamped with the current local time.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
            fields: Fields::default(),
            caller: None,
        }
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn timestamp(&self) -> &DateTime<Local> {
        &self.timestamp
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }

    /// Returns a copy whose unserializable fields are replaced by a placeholder.
    pub fn with_placeholders(&self) -> Self {
        Self {
            fields: self.fields.with_placeholders(),
            ..self.clone()
        }
    }
}

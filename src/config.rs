//! Logging configuration loaded from an XML document.
//!
//! ```xml
//! <logConfig>
//!     <timestampFormat>%Y-%m-%d %H:%M:%S%.3f</timestampFormat>
//!     <pattern>json</pattern>
//!     <level>INFO</level>
//!     <maskFailure>closed</maskFailure>
//!     <output>stdout</output>
//! </logConfig>
//! ```
//!
//! `timestampFormat`, `pattern` and `level` are required. `maskFailure` and
//! `output` are optional and default to `closed` and `stdout`.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::level_filters::LevelFilter;

use crate::error::{LogError, LogResult};
use crate::masking::MaskFailurePolicy;

/// Where the logger writes its records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    #[default]
    Stdout,
    Stderr,
}

/// Parsed logging configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// chrono strftime string, empty for RFC 3339 with milliseconds.
    pub timestamp_format: String,
    /// `json` (or empty), `pretty`, or a line template such as
    /// `{timestamp} {level} {function}: {message} {fields}`.
    pub pattern: String,
    /// One of TRACE, DEBUG, INFO, WARN, ERROR or OFF (case-insensitive).
    pub level: String,
    #[serde(default)]
    pub mask_failure: MaskFailurePolicy,
    #[serde(default)]
    pub output: Output,
}

impl LogConfig {
    /// Reads and parses the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> LogResult<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| LogError::ConfigLoad {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&data, &path.display().to_string())
    }

    /// Parses an in-memory XML document.
    pub fn from_xml(xml: &str) -> LogResult<Self> {
        Self::parse(xml, "<inline>")
    }

    fn parse(xml: &str, origin: &str) -> LogResult<Self> {
        quick_xml::de::from_str(xml).map_err(|source| LogError::ConfigParse {
            origin: origin.to_owned(),
            source,
        })
    }

    /// Returns the configured level as a filter.
    pub fn level_filter(&self) -> LogResult<LevelFilter> {
        parse_level(&self.level)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            timestamp_format: String::new(),
            pattern: "json".to_owned(),
            level: "INFO".to_owned(),
            mask_failure: MaskFailurePolicy::default(),
            output: Output::default(),
        }
    }
}

/// Parses a severity name into a [`LevelFilter`].
pub fn parse_level(level: &str) -> LogResult<LevelFilter> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Ok(LevelFilter::TRACE),
        "DEBUG" => Ok(LevelFilter::DEBUG),
        "INFO" => Ok(LevelFilter::INFO),
        "WARN" | "WARNING" => Ok(LevelFilter::WARN),
        "ERROR" => Ok(LevelFilter::ERROR),
        "OFF" => Ok(LevelFilter::OFF),
        _ => Err(LogError::InvalidLevel(level.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
        <logConfig>
            <timestampFormat>%Y-%m-%d %H:%M:%S</timestampFormat>
            <pattern>json</pattern>
            <level>debug</level>
            <maskFailure>open</maskFailure>
            <output>stderr</output>
        </logConfig>
    "#;

    #[test]
    fn parses_all_elements() {
        let config = LogConfig::from_xml(FULL).unwrap();

        assert_eq!(config.timestamp_format, "%Y-%m-%d %H:%M:%S");
        assert_eq!(config.pattern, "json");
        assert_eq!(config.level_filter().unwrap(), LevelFilter::DEBUG);
        assert_eq!(config.mask_failure, MaskFailurePolicy::Open);
        assert_eq!(config.output, Output::Stderr);
    }

    #[test]
    fn optional_elements_default() {
        let config = LogConfig::from_xml(
            "<logConfig><timestampFormat/><pattern>json</pattern><level>INFO</level></logConfig>",
        )
        .unwrap();

        assert_eq!(config.timestamp_format, "");
        assert_eq!(config.mask_failure, MaskFailurePolicy::Closed);
        assert_eq!(config.output, Output::Stdout);
    }

    #[test]
    fn missing_required_element_is_a_parse_error() {
        let err = LogConfig::from_xml("<logConfig><pattern>json</pattern></logConfig>")
            .unwrap_err();
        assert!(matches!(err, LogError::ConfigParse { .. }));
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = LogConfig::from_xml("<logConfig><level>INFO</logConfig>").unwrap_err();
        assert!(matches!(err, LogError::ConfigParse { .. }));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = LogConfig::load(file.path()).unwrap();
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LogConfig::load(dir.path().join("absent.xml")).unwrap_err();
        assert!(matches!(err, LogError::ConfigLoad { .. }));
    }

    #[test]
    fn parses_levels() {
        assert_eq!(parse_level(" warn ").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_level("WARNING").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_level("Error").unwrap(), LevelFilter::ERROR);
        assert_eq!(parse_level("off").unwrap(), LevelFilter::OFF);
        assert!(matches!(
            parse_level("verbose"),
            Err(LogError::InvalidLevel(level)) if level == "verbose"
        ));
    }
}

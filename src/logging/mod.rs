//! Bridges `tracing` into the logger.
//!
//! Events emitted with the `tracing` macros (by this crate or any library)
//! are rendered by the logger's formatter and written to its sink, so masking
//! and layout apply to them as well.
//!
//! ```rust,ignore
//! let logger = veil::init(&config)?;
//! veil::logging::setup_tracing(logger)?;
//! tracing::info!(port = 8080, "Listening");
//! ```
//!
//! `RUST_LOG` overrides the configured level when set.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::LogResult;
use crate::logger::Logger;

mod events;

pub use events::{RecordEventFormat, SPAN_FIELD};

/// Installs the global `tracing` subscriber writing through `logger`.
///
/// Fails with [`SubscriberInstall`](crate::LogError::SubscriberInstall) if a
/// global subscriber is already set.
pub fn setup_tracing(logger: &Logger) -> LogResult<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(logger.max_level().into())
        .from_env_lossy();

    Registry::default()
        .with(record_layer(logger, filter))
        .try_init()?;

    tracing::debug!("Tracing initialized successfully [reporting through the logger]");

    Ok(())
}

/// A layer formatting events with `logger`'s formatter and writing to its sink.
pub fn record_layer(
    logger: &Logger,
    filter: EnvFilter,
) -> Box<dyn Layer<Registry> + Send + Sync + 'static> {
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(logger.writer())
        .event_format(RecordEventFormat::new(logger.formatter()))
        .with_filter(filter)
        .boxed()
}

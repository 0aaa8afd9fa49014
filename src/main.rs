use std::env;
use std::time::Duration;

use anyhow::Context;
use veil::{ContextLogger, LogConfig, LogContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = env::args().nth(1).unwrap_or_else(|| "log.xml".to_owned());
    let config = LogConfig::load(&path).with_context(|| format!("Cannot load log config '{path}'"))?;

    veil::register_sensitive_message_formatter()?;
    let logger = veil::init(&config).context("Cannot initialize the logger")?;
    veil::logging::setup_tracing(logger)?;

    let ctx = LogContext::background()
        .with_timeout(Duration::from_secs(5))
        .with_generated_request_id();

    veil::with_context(&ctx)?.info("Handling request");

    let log = veil::with_field("logger", "main")?;
    log.info("Application started");
    log.info("+84225898023");
    log.debug("user=alice@example.com password=hunter2");

    let request_log = log.with_context(&ctx);
    match tokio::time::timeout(Duration::from_secs(1), some_func(&request_log)).await {
        Ok(()) => tracing::info!(remaining = ?ctx.remaining(), "Request finished"),
        Err(_) => tracing::warn!("Request timed out"),
    }

    Ok(())
}

async fn some_func(log: &ContextLogger) {
    tokio::time::sleep(Duration::from_millis(10)).await;
    veil::warn!(log, "card 4111 1111 1111 1111 was declined");
}

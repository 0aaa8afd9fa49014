//! Request-scoped context: correlation id, deadline and cancellation.
//!
//! A [`LogContext`] is what a caller hands to
//! [`ContextLogger::with_context`](crate::ContextLogger::with_context). The
//! logger copies the request id and deadline into fields; it never waits on
//! the context. Code running under the context can branch on
//! [`LogContext::is_done`] or await [`LogContext::done`].
//!
//! ```rust,ignore
//! let ctx = LogContext::background()
//!     .with_timeout(Duration::from_secs(5))
//!     .with_generated_request_id();
//!
//! let log = veil::with_context(&ctx)?;
//! log.info("Application started");
//! ```

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;

use crate::tools::id_generator::generate_request_id;

#[derive(Debug, Clone, Default)]
pub struct LogContext {
    request_id: Option<String>,
    deadline: Option<DateTime<Utc>>,
    cancellation: Option<CancellationToken>,
}

impl LogContext {
    /// An empty context without deadline, id or cancellation.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_generated_request_id(self) -> Self {
        self.with_request_id(generate_request_id())
    }

    /// Sets the deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Sets the deadline to now plus `timeout`.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let timeout = TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX);
        let deadline = Utc::now()
            .checked_add_signed(timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.with_deadline(deadline)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Returns `true` once the deadline has passed or the context was cancelled.
    pub fn is_done(&self) -> bool {
        let cancelled = self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled);
        let expired = self.deadline.is_some_and(|deadline| deadline <= Utc::now());

        cancelled || expired
    }

    /// Resolves when the deadline passes or the context is cancelled. Never
    /// resolves for a background context.
    pub async fn done(&self) {
        let token = self.cancellation.clone().unwrap_or_default();

        match self.remaining() {
            Some(remaining) => {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(remaining) => {}
                }
            }
            None => token.cancelled().await,
        }
    }
}

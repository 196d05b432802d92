//! Clock and log-forwarding contracts
//!
//! Injectable time source for creation stamps and a sink that forwards
//! structured log entries to the host.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Where repositories read "now" from.
///
/// `CreatedAt` is stamped from this clock, which lets tests pin the value
/// instead of racing the wall clock.
///
/// ```ignore
/// use bridge_traits::time::Clock;
///
/// fn stamp(clock: &dyn Clock) -> String {
///     clock.now_stamp().to_rfc3339()
/// }
/// ```
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// [`now`](Clock::now) as a `+00:00` offset timestamp, the form
    /// `CreatedAt` is stored in on every host.
    fn now_stamp(&self) -> DateTime<FixedOffset> {
        self.now().fixed_offset()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Severity, ordered from `Trace` (lowest) to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// One event as handed to a [`LoggerSink`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Emitting target, e.g. `reasons::command`
    pub target: String,
    pub message: String,
    /// Event fields rendered as text
    pub fields: HashMap<String, String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        LogEntry {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::default(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Host-side receiver for structured log events.
///
/// Entries can carry connection strings. Callers redact credentials before the
/// entry reaches the sink; sinks must not log raw statement parameters.
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Events below this level never reach [`log`](LoggerSink::log).
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

//! # Logging & Tracing Infrastructure
//!
//! Structured logging with the `tracing` crate:
//! - JSON, pretty and compact output formats
//! - Module-level filtering with a default that names the reason crates and
//!   the per-backend `reasons::*` targets
//! - Credential redaction for connection strings
//! - Optional mirroring of events into a host [`LoggerSink`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::LogLevel;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug);
//!
//!     init_logging(config).expect("Failed to initialize logging");
//!
//!     tracing::info!(target: "reasons::command", "Repository ready");
//! }
//! ```
//!
//! ## Targets
//!
//! Each backend logs under its own target so one can be turned up without the
//! others: `reasons::command`, `reasons::mapped`, `reasons::tracked`, plus
//! `reasons::context` for the unit of work.
//!
//! ```ignore
//! let config = LoggingConfig::default().with_directives("reasons::tracked=trace,sqlx=warn");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;
use url::Url;

use crate::error::{Error, Result};

/// Crates and targets the default filter enables at the configured level.
const WORKSPACE_TARGETS: &[&str] = &[
    "reason_workspace",
    "core_runtime",
    "core_reasons",
    "core_service",
    "reasons",
];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored; for local development
    Pretty,
    /// One JSON object per event
    Json,
    /// Single-line text
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

/// Logging configuration
#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for the workspace crates under the default filter
    pub level: LogLevel,
    /// `EnvFilter` directives replacing the default filter
    pub directives: Option<String>,
    /// Host sink that receives a copy of every enabled event
    pub sink: Option<Arc<dyn LoggerSink>>,
    pub spans: bool,
    pub show_target: bool,
    pub show_threads: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            directives: None,
            sink: None,
            spans: true,
            show_target: true,
            show_threads: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("directives", &self.directives)
            .field("sink", &self.sink.is_some())
            .field("spans", &self.spans)
            .finish_non_exhaustive()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Replace the default filter entirely.
    pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
        self.directives = Some(directives.into());
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, spans: bool) -> Self {
        self.spans = spans;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn show_threads(mut self, show: bool) -> Self {
        self.show_threads = show;
        self
    }

    /// The filter this configuration installs.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let directives = match &self.directives {
            Some(custom) => custom.clone(),
            None => default_directives(self.level),
        };

        EnvFilter::try_new(&directives)
            .map_err(|e| Error::Config(format!("Invalid log filter '{directives}': {e}")))
    }
}

/// Install the global subscriber.
///
/// Call once during startup. A second call returns [`Error::Config`] because
/// the global subscriber is already set.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(SinkForwarder::new(config.sink.clone()))
        .with(output_layer(&config))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {e}")))
}

fn default_directives(level: LogLevel) -> String {
    let level = match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    };

    let mut directives: Vec<String> = WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect();
    directives.push("sqlx=warn".to_string());
    directives.join(",")
}

fn output_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let span_events = if config.spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let base = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(config.show_target)
        .with_thread_ids(config.show_threads)
        .with_thread_names(config.show_threads);

    match config.format {
        LogFormat::Pretty => base.pretty().with_span_events(span_events).boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.spans)
            .with_span_list(config.spans)
            .boxed(),
        LogFormat::Compact => base.compact().boxed(),
    }
}

/// Copies enabled events into a host [`LoggerSink`].
struct SinkForwarder {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl SinkForwarder {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for SinkForwarder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };

        let metadata = event.metadata();
        let level = log_level(metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        entry.fields.extend(fields.values);
        if let Some(span) = ctx.lookup_current() {
            entry = entry.with_field("span", span.name());
        }

        deliver(Arc::clone(sink), entry);
    }
}

/// Run the sink on the current runtime if there is one, inline otherwise.
fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("LoggerSink error: {err}");
                }
            });
        }
        Err(_) => {
            if let Err(err) = futures::executor::block_on(sink.log(entry)) {
                eprintln!("LoggerSink error: {err}");
            }
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: HashMap<String, String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.values.insert(name.to_owned(), value);
            }
        }
    }
}

fn log_level(level: &Level) -> LogLevel {
    match *level {
        Level::TRACE => LogLevel::Trace,
        Level::DEBUG => LogLevel::Debug,
        Level::INFO => LogLevel::Info,
        Level::WARN => LogLevel::Warn,
        Level::ERROR => LogLevel::Error,
    }
}

const SECRET_KEYS: &[&str] = &["password", "pwd", "secret", "token", "api_key", "apikey"];

/// Replacement for a masked secret. Contains nothing URL user-info encodes.
const MASK: &str = "***";

/// Mask credentials in a connection string before it is logged.
///
/// Handles both URL user-info and `key=value;` lists:
///
/// ```
/// use core_runtime::logging::redact_connection_string;
///
/// assert_eq!(
///     redact_connection_string("Data Source=app.db;Password=hunter2"),
///     "Data Source=app.db;Password=***"
/// );
/// assert_eq!(
///     redact_connection_string("postgres://app:hunter2@db/reasons"),
///     "postgres://app:***@db/reasons"
/// );
/// ```
pub fn redact_connection_string(connection_string: &str) -> String {
    if let Ok(mut url) = Url::parse(connection_string) {
        if url.password().is_some() && url.set_password(Some(MASK)).is_ok() {
            return url.into();
        }
    }

    connection_string
        .split(';')
        .map(|segment| match segment.split_once('=') {
            Some((key, _)) if is_secret_key(key) => format!("{key}={MASK}"),
            _ => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn is_secret_key(key: &str) -> bool {
    let key = key.trim().to_ascii_lowercase();
    SECRET_KEYS.iter().any(|secret| key.ends_with(secret))
}

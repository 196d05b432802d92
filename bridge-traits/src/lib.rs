//! # Host Bridge Traits
//!
//! Capability contracts the reason repositories consume but do not implement
//! themselves.
//!
//! ## Traits
//!
//! ### Storage
//! - [`DatabaseConnector`](database::DatabaseConnector) - Opens one connection per call from a connection string
//! - [`DatabaseAdapter`](database::DatabaseAdapter) - Executes parameterized queries and commands on that connection
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source used to stamp creation timestamps
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! keep the engine's own error as the source so callers can inspect it
//! unchanged.
//!
//! ## Thread Safety
//!
//! Connectors, clocks and sinks are shared across tasks and must be
//! `Send + Sync`. A [`DatabaseAdapter`](database::DatabaseAdapter) is owned by
//! a single call and only needs to be `Send`.

pub mod database;
pub mod error;
pub mod time;

pub use error::BridgeError;

pub use database::{DatabaseAdapter, DatabaseConnector, QueryRow, QueryValue};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};

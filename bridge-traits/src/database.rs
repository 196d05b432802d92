//! Storage contracts for the direct-command backend
//!
//! The direct-command repository talks to storage only through the two traits
//! in this module:
//!
//! - [`DatabaseConnector`] opens a connection from a connection string. The
//!   repository opens one per operation and relies on the engine's own pooling.
//! - [`DatabaseAdapter`] runs positional-parameter statements on that
//!   connection and returns rows, scalars or affected-row counts.
//!
//! The connection is released when the adapter is dropped, so every exit path
//! of a caller (success, early return, `?`) gives it back.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::database::{DatabaseConnector, QueryValue};
//!
//! let mut conn = connector.open("sqlite:reasons.db").await?;
//! let rows = conn
//!     .query("SELECT Id, Name FROM Reasons WHERE Id = ?", &[QueryValue::Integer(7)])
//!     .await?;
//! let name = rows[0].get(1).and_then(QueryValue::as_str);
//! ```

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::Result;

// --- Query Values ---

/// A database value that can be bound as a parameter or read from a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Bound with the engine's native timestamp encoding. Never produced when
    /// reading; timestamp columns come back as [`QueryValue::Text`].
    Timestamp(DateTime<FixedOffset>),
}

impl QueryValue {
    /// Integer payload, if any
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            QueryValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Interpret an integer column as a boolean (`0` is false).
    pub fn as_bool(&self) -> Option<bool> {
        self.as_i64().map(|i| i != 0)
    }

    /// Borrow as `&str` if this is text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Owned copy of the text, if any
    pub fn as_string(&self) -> Option<String> {
        self.as_str().map(str::to_owned)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }

    /// Text parameter, or `Null` when absent.
    pub fn optional_text(value: Option<&str>) -> Self {
        value
            .map(|v| QueryValue::Text(v.to_owned()))
            .unwrap_or(QueryValue::Null)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Integer(i64::from(value))
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Integer(value)
    }
}

impl From<DateTime<FixedOffset>> for QueryValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        QueryValue::Timestamp(value)
    }
}

// --- Rows ---

/// A single result row. Values keep the column order of the statement, so
/// callers can read them positionally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRow {
    columns: Vec<String>,
    values: Vec<QueryValue>,
}

impl QueryRow {
    /// Build a row from parallel column-name and value lists.
    pub fn new(columns: Vec<String>, values: Vec<QueryValue>) -> Self {
        Self { columns, values }
    }

    /// Value at the given zero-based column position.
    pub fn get(&self, index: usize) -> Option<&QueryValue> {
        self.values.get(index)
    }

    /// Value of the named column. Lookups are case-insensitive like SQLite
    /// identifiers.
    pub fn get_by_name(&self, column: &str) -> Option<&QueryValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|index| self.values.get(index))
    }

    /// Whether the column at `index` is missing or `NULL`.
    pub fn is_null(&self, index: usize) -> bool {
        self.get(index).map_or(true, QueryValue::is_null)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// --- Connector / Adapter ---

/// Opens storage connections.
///
/// ## Thread Safety
///
/// Connectors are shared by every call of a repository and must be
/// `Send + Sync`.
#[async_trait::async_trait]
pub trait DatabaseConnector: Send + Sync {
    /// Open a new connection for the given connection string.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConnectionFailed`](crate::BridgeError::ConnectionFailed)
    /// when the string is malformed or the engine refuses the connection.
    async fn open(&self, connection_string: &str) -> Result<Box<dyn DatabaseAdapter>>;
}

/// One open connection.
///
/// All statements use positional `?` parameters. Never concatenate user input
/// into the statement text.
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send {
    /// Execute a query and return all rows in engine order.
    async fn query(&mut self, query: &str, params: &[QueryValue]) -> Result<Vec<QueryRow>>;

    /// Execute a query that returns zero or one row.
    async fn query_one_optional(
        &mut self,
        query: &str,
        params: &[QueryValue],
    ) -> Result<Option<QueryRow>>;

    /// Execute a statement and return the first column of its first row,
    /// e.g. the key produced by `INSERT ... RETURNING Id`.
    ///
    /// Returns [`BridgeError::UnexpectedResult`](crate::BridgeError::UnexpectedResult)
    /// when the statement produced no row.
    async fn query_scalar(&mut self, query: &str, params: &[QueryValue]) -> Result<QueryValue>;

    /// Execute a statement that doesn't return rows and report the number of
    /// rows affected.
    async fn execute(&mut self, statement: &str, params: &[QueryValue]) -> Result<u64>;
}

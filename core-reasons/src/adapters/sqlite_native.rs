//! Native SQLite Storage Adapter
//!
//! Implements the storage capability on `sqlx` with the native SQLite driver.
//! [`SqliteConnector`] opens one dedicated connection per call and hands it
//! out as a [`SqliteAdapter`]; dropping the adapter closes the connection.

use async_trait::async_trait;
use bridge_traits::database::{DatabaseAdapter, DatabaseConnector, QueryRow, QueryValue};
use bridge_traits::error::{BridgeError, Result};
use core_runtime::logging::redact_connection_string;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Row, Sqlite};
use tracing::{debug, warn};

use crate::db;

const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 32;

/// Opens [`SqliteAdapter`]s from `sqlx` SQLite connection strings.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    statement_cache_capacity: usize,
}

impl SqliteConnector {
    pub fn new() -> Self {
        Self {
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
        }
    }

    pub fn with_statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }
}

impl Default for SqliteConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseConnector for SqliteConnector {
    async fn open(&self, connection_string: &str) -> Result<Box<dyn DatabaseAdapter>> {
        let options = db::connect_options(connection_string, self.statement_cache_capacity)
            .map_err(BridgeError::connection)?;

        let connection = options.connect().await.map_err(|e| {
            warn!(
                connection = %redact_connection_string(connection_string),
                error = %e,
                "Failed to open connection"
            );
            BridgeError::connection(e)
        })?;

        Ok(Box::new(SqliteAdapter::new(connection)))
    }
}

/// One open SQLite connection behind the [`DatabaseAdapter`] contract.
pub struct SqliteAdapter {
    connection: SqliteConnection,
}

impl SqliteAdapter {
    pub fn new(connection: SqliteConnection) -> Self {
        Self { connection }
    }

    /// Convert a sqlx row to a positional [`QueryRow`]
    fn row_to_query_row(row: &SqliteRow) -> QueryRow {
        let mut columns = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());

        for column in row.columns() {
            let index = column.ordinal();

            // Storage classes are dynamic; probe in order of likelihood
            let value = if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
                v.map(QueryValue::Integer).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
                v.map(QueryValue::Real).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<String>, _>(index) {
                v.map(QueryValue::Text).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
                v.map(QueryValue::Blob).unwrap_or(QueryValue::Null)
            } else {
                QueryValue::Null
            };

            columns.push(column.name().to_string());
            values.push(value);
        }

        QueryRow::new(columns, values)
    }

    fn bind_params<'q>(
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
        params: &'q [QueryValue],
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        let mut query = query;
        for param in params {
            query = match param {
                QueryValue::Null => query.bind(None::<i64>),
                QueryValue::Integer(i) => query.bind(*i),
                QueryValue::Real(r) => query.bind(*r),
                QueryValue::Text(s) => query.bind(s.as_str()),
                QueryValue::Blob(b) => query.bind(b.as_slice()),
                QueryValue::Timestamp(t) => query.bind(*t),
            };
        }
        query
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    async fn query(&mut self, query: &str, params: &[QueryValue]) -> Result<Vec<QueryRow>> {
        debug!(query = %query, param_count = params.len(), "Executing query");

        let rows = Self::bind_params(sqlx::query(query), params)
            .fetch_all(&mut self.connection)
            .await
            .map_err(BridgeError::database)?;

        let result: Vec<QueryRow> = rows.iter().map(Self::row_to_query_row).collect();

        debug!(row_count = result.len(), "Query executed successfully");
        Ok(result)
    }

    async fn query_one_optional(
        &mut self,
        query: &str,
        params: &[QueryValue],
    ) -> Result<Option<QueryRow>> {
        debug!(query = %query, param_count = params.len(), "Executing query_one_optional");

        let row = Self::bind_params(sqlx::query(query), params)
            .fetch_optional(&mut self.connection)
            .await
            .map_err(BridgeError::database)?;

        Ok(row.as_ref().map(Self::row_to_query_row))
    }

    async fn query_scalar(&mut self, query: &str, params: &[QueryValue]) -> Result<QueryValue> {
        debug!(query = %query, param_count = params.len(), "Executing query_scalar");

        let row = self
            .query_one_optional(query, params)
            .await?
            .ok_or_else(|| BridgeError::UnexpectedResult("statement returned no row".into()))?;

        row.get(0)
            .cloned()
            .ok_or_else(|| BridgeError::UnexpectedResult("statement returned no column".into()))
    }

    async fn execute(&mut self, statement: &str, params: &[QueryValue]) -> Result<u64> {
        debug!(statement = %statement, param_count = params.len(), "Executing statement");

        let result = Self::bind_params(sqlx::query(statement), params)
            .execute(&mut self.connection)
            .await
            .map_err(BridgeError::database)?;

        let rows_affected = result.rows_affected();
        debug!(rows_affected, "Statement executed successfully");

        Ok(rows_affected)
    }
}

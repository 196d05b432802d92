//! Direct-command backend
//!
//! Hand-written positional statements executed through the storage
//! capability. Every call opens its own connection and drops it before
//! returning. Entities are built by column position.
//!
//! Paging reads the full ordered table and windows it in memory, which keeps
//! the statements trivial at the cost of scanning every row per page.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::database::{DatabaseAdapter, DatabaseConnector, QueryRow, QueryValue};
use bridge_traits::time::{Clock, SystemClock};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use core_runtime::config::RepositoryMode;
use tracing::{debug, info};

use super::{page_in_memory, resolve_connection, ArticleSet, FilterOptions, PageRequest};
use super::{ReasonRepository, SELECT_REASONS};
use crate::adapters::SqliteConnector;
use crate::error::{ReasonError, Result};
use crate::models::Reason;

const LOG_TARGET: &str = "reasons::command";

const INSERT_REASON: &str =
    "INSERT INTO Reasons (Active, CreatedAt, CreatedBy, Name) VALUES (?, ?, ?, ?) RETURNING Id";
const UPDATE_REASON: &str = "UPDATE Reasons SET Active = ?, Name = ? WHERE Id = ?";
const DELETE_REASON: &str = "DELETE FROM Reasons WHERE Id = ?";

/// Direct-command implementation of [`ReasonRepository`].
pub struct CommandReasonRepository {
    connector: Arc<dyn DatabaseConnector>,
    connection_string: String,
    clock: Arc<dyn Clock>,
}

impl CommandReasonRepository {
    /// Repository over SQLite using the system clock.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self::with_connector(Arc::new(SqliteConnector::new()), connection_string)
    }

    pub fn with_connector(
        connector: Arc<dyn DatabaseConnector>,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            connection_string: connection_string.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn open(&self, connection: Option<&str>) -> Result<Box<dyn DatabaseAdapter>> {
        let connection_string = resolve_connection(&self.connection_string, connection);
        Ok(self.connector.open(connection_string).await?)
    }

    async fn load_all(&self, connection: Option<&str>) -> Result<Vec<Reason>> {
        let mut conn = self.open(connection).await?;
        let rows = conn
            .query(&format!("{SELECT_REASONS} ORDER BY Id DESC"), &[])
            .await?;

        rows.iter().map(row_to_reason).collect()
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> ReasonRepository<P> for CommandReasonRepository {
    async fn add(&self, reason: Reason, connection: Option<&str>) -> Result<Reason> {
        let mut reason = reason.stamped(self.clock.now_stamp());
        let mut conn = self.open(connection).await?;

        let id = conn
            .query_scalar(INSERT_REASON, &insert_params(&reason))
            .await?
            .as_i64()
            .ok_or_else(|| ReasonError::Mapping("generated Id is not an integer".to_string()))?;
        reason.id = id;

        info!(target: LOG_TARGET, id, "Inserted reason");
        Ok(reason)
    }

    async fn get_all(&self, connection: Option<&str>) -> Result<Vec<Reason>> {
        let reasons = self.load_all(connection).await?;
        debug!(target: LOG_TARGET, count = reasons.len(), "Loaded all reasons");
        Ok(reasons)
    }

    async fn find_by_id(&self, id: i64, connection: Option<&str>) -> Result<Option<Reason>> {
        let mut conn = self.open(connection).await?;
        let row = conn
            .query_one_optional(
                &format!("{SELECT_REASONS} WHERE Id = ?"),
                &[QueryValue::Integer(id)],
            )
            .await?;

        row.as_ref().map(row_to_reason).transpose()
    }

    async fn update(&self, reason: &Reason, connection: Option<&str>) -> Result<bool> {
        let mut conn = self.open(connection).await?;
        let params = [
            QueryValue::from(reason.is_active()),
            QueryValue::optional_text(reason.name.as_deref()),
            QueryValue::Integer(reason.id),
        ];

        let affected = conn.execute(UPDATE_REASON, &params).await?;

        debug!(target: LOG_TARGET, id = reason.id, affected, "Updated reason");
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64, connection: Option<&str>) -> Result<bool> {
        let mut conn = self.open(connection).await?;
        let affected = conn
            .execute(DELETE_REASON, &[QueryValue::Integer(id)])
            .await?;

        if affected > 0 {
            info!(target: LOG_TARGET, id, "Deleted reason");
        }
        Ok(affected > 0)
    }

    async fn get_articles(
        &self,
        request: &PageRequest<P>,
        connection: Option<&str>,
    ) -> Result<ArticleSet<Reason, u32>> {
        let all = self.load_all(connection).await?;
        page_in_memory(all, request.search(), request.skip(), request.take())
    }

    async fn get_by(
        &self,
        options: &FilterOptions<P>,
        connection: Option<&str>,
    ) -> Result<ArticleSet<Reason, u64>> {
        let all = self.load_all(connection).await?;
        page_in_memory(all, options.search(), options.skip(), options.take())
    }

    fn backend(&self) -> RepositoryMode {
        RepositoryMode::DirectCommand
    }
}

fn insert_params(reason: &Reason) -> [QueryValue; 4] {
    [
        QueryValue::from(reason.is_active()),
        QueryValue::Timestamp(reason.created_at),
        QueryValue::optional_text(reason.created_by.as_deref()),
        QueryValue::optional_text(reason.name.as_deref()),
    ]
}

/// Build a reason from `Id, Active, CreatedAt, CreatedBy, Name` by position.
fn row_to_reason(row: &QueryRow) -> Result<Reason> {
    let id = row
        .get(0)
        .and_then(QueryValue::as_i64)
        .ok_or_else(|| ReasonError::Mapping("Id is missing or not an integer".to_string()))?;

    let created_at = row
        .get(2)
        .and_then(QueryValue::as_str)
        .ok_or_else(|| ReasonError::Mapping(format!("CreatedAt is missing for reason {id}")))
        .and_then(parse_timestamp)?;

    Ok(Reason {
        id,
        active: row.get(1).and_then(QueryValue::as_bool),
        created_at,
        created_by: row.get(3).and_then(QueryValue::as_string),
        name: row.get(4).and_then(QueryValue::as_string),
    })
}

/// Text layouts SQLite rows are commonly written in, tried after RFC 3339.
/// Values without an offset are read as UTC.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%F %T%.f",
    "%F %R",
    "%F %RZ",
    "%F %R%:z",
    "%F %T%.fZ",
    "%F %T%.f%:z",
    "%FT%R",
    "%FT%RZ",
    "%FT%R%:z",
    "%FT%T%.f",
    "%FT%T%.fZ",
    "%FT%T%.f%:z",
];

/// Decode `CreatedAt` text the same way the sqlx-backed executors do, so a
/// row written by hand reads identically through every backend.
fn parse_timestamp(text: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed);
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| {
            DateTime::parse_from_str(text, format).ok().or_else(|| {
                NaiveDateTime::parse_from_str(text, format)
                    .ok()
                    .map(|naive| naive.and_utc().fixed_offset())
            })
        })
        .ok_or_else(|| ReasonError::Mapping(format!("CreatedAt '{text}' is not a timestamp")))
}

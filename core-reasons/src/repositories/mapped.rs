//! Mapped-query backend
//!
//! Statements name their parameters (`@Name`) and bind them straight from the
//! entity through [`mapper`](super::mapper); rows map back to [`Reason`] by
//! column name. Each call uses its own connection.
//!
//! Paging is done in memory over the ordered table, same as the
//! direct-command backend.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::config::RepositoryMode;
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::mapper;
use super::{page_in_memory, resolve_connection, ArticleSet, FilterOptions, PageRequest};
use super::{ReasonRepository, SELECT_REASONS};
use crate::db;
use crate::error::Result;
use crate::models::Reason;

const LOG_TARGET: &str = "reasons::mapped";

const INSERT_REASON: &str = "INSERT INTO Reasons (Active, CreatedAt, CreatedBy, Name) \
     VALUES (@Active, @CreatedAt, @CreatedBy, @Name) RETURNING Id";
const UPDATE_REASON: &str = "UPDATE Reasons SET Active = @Active, Name = @Name WHERE Id = @Id";
const DELETE_REASON: &str = "DELETE FROM Reasons WHERE Id = @Id";

/// Mapped-query implementation of [`ReasonRepository`].
pub struct MappedReasonRepository {
    connection_string: String,
    clock: Arc<dyn Clock>,
}

impl MappedReasonRepository {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn connect(&self, connection: Option<&str>) -> Result<SqliteConnection> {
        db::connect(resolve_connection(&self.connection_string, connection)).await
    }

    async fn load_all(&self, connection: Option<&str>) -> Result<Vec<Reason>> {
        let mut conn = self.connect(connection).await?;
        mapper::query(&mut conn, &format!("{SELECT_REASONS} ORDER BY Id DESC"), &()).await
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> ReasonRepository<P> for MappedReasonRepository {
    async fn add(&self, reason: Reason, connection: Option<&str>) -> Result<Reason> {
        let mut reason = reason.stamped(self.clock.now_stamp());
        let mut conn = self.connect(connection).await?;

        reason.id = mapper::execute_scalar(&mut conn, INSERT_REASON, &reason).await?;

        info!(target: LOG_TARGET, id = reason.id, "Inserted reason");
        Ok(reason)
    }

    async fn get_all(&self, connection: Option<&str>) -> Result<Vec<Reason>> {
        let reasons = self.load_all(connection).await?;
        debug!(target: LOG_TARGET, count = reasons.len(), "Loaded all reasons");
        Ok(reasons)
    }

    async fn find_by_id(&self, id: i64, connection: Option<&str>) -> Result<Option<Reason>> {
        let mut conn = self.connect(connection).await?;
        mapper::query_optional(
            &mut conn,
            &format!("{SELECT_REASONS} WHERE Id = @Id"),
            &json!({ "Id": id }),
        )
        .await
    }

    async fn update(&self, reason: &Reason, connection: Option<&str>) -> Result<bool> {
        let mut conn = self.connect(connection).await?;
        let params = Reason {
            active: Some(reason.is_active()),
            ..reason.clone()
        };

        let affected = mapper::execute(&mut conn, UPDATE_REASON, &params).await?;

        debug!(target: LOG_TARGET, id = reason.id, affected, "Updated reason");
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64, connection: Option<&str>) -> Result<bool> {
        let mut conn = self.connect(connection).await?;
        let affected = mapper::execute(&mut conn, DELETE_REASON, &json!({ "Id": id })).await?;

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
        RepositoryMode::MappedQuery
    }
}

//! Tracked-context backend
//!
//! Every call creates a [`ReasonAppContext`], does its work through the
//! context's change tracking and drops it. Filtering, counting and the page
//! window are translated to SQL, so only the requested page is read.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::config::RepositoryMode;
use tracing::{debug, info};

use super::{ArticleSet, FilterOptions, PageRequest, ReasonRepository};
use crate::context::{ReasonAppContext, ReasonAppContextFactory, ReasonQuery};
use crate::error::Result;
use crate::models::Reason;

const LOG_TARGET: &str = "reasons::tracked";

/// Tracked-context implementation of [`ReasonRepository`].
pub struct TrackedReasonRepository {
    factory: ReasonAppContextFactory,
    clock: Arc<dyn Clock>,
}

impl TrackedReasonRepository {
    /// Transient contexts on `connection_string`.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self::from_factory(ReasonAppContextFactory::new().with_connection_string(connection_string))
    }

    pub fn from_factory(factory: ReasonAppContextFactory) -> Self {
        Self {
            factory,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn factory(&self) -> &ReasonAppContextFactory {
        &self.factory
    }

    async fn context(&self, connection: Option<&str>) -> Result<ReasonAppContext> {
        match connection.filter(|value| !value.trim().is_empty()) {
            Some(connection_string) => self.factory.create_context_for(connection_string).await,
            None => self.factory.create_context().await,
        }
    }

    async fn page<K: TryFrom<u64>>(
        &self,
        search: Option<&str>,
        skip: u64,
        take: u64,
        connection: Option<&str>,
    ) -> Result<ArticleSet<Reason, K>> {
        let mut ctx = self.context(connection).await?;
        let filter = ReasonQuery::new().name_contains(search);

        let total = ctx.count(&filter).await?;
        let items = ctx
            .load(&filter.newest_first().skip(skip).take(take))
            .await?;

        debug!(target: LOG_TARGET, total, returned = items.len(), "Loaded page");
        ArticleSet::with_total(items, total)
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> ReasonRepository<P> for TrackedReasonRepository {
    async fn add(&self, reason: Reason, connection: Option<&str>) -> Result<Reason> {
        let mut ctx = self.context(connection).await?;
        let reason = Reason {
            id: 0,
            ..reason.stamped(self.clock.now_stamp())
        };

        let key = ctx.add(reason);
        ctx.save_changes().await?;

        let saved = ctx.entity(key).cloned().unwrap_or_default();
        info!(target: LOG_TARGET, id = saved.id, "Inserted reason");
        Ok(saved)
    }

    async fn get_all(&self, connection: Option<&str>) -> Result<Vec<Reason>> {
        let mut ctx = self.context(connection).await?;
        let reasons = ctx.load(&ReasonQuery::new().newest_first()).await?;

        debug!(target: LOG_TARGET, count = reasons.len(), "Loaded all reasons");
        Ok(reasons)
    }

    async fn find_by_id(&self, id: i64, connection: Option<&str>) -> Result<Option<Reason>> {
        let mut ctx = self.context(connection).await?;
        let mut rows = ctx.load(&ReasonQuery::new().by_id(id)).await?;
        Ok(rows.pop())
    }

    async fn update(&self, reason: &Reason, connection: Option<&str>) -> Result<bool> {
        let mut ctx = self.context(connection).await?;
        ctx.update(reason.clone())?;

        let affected = ctx.save_changes().await?;

        debug!(target: LOG_TARGET, id = reason.id, affected, "Updated reason");
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64, connection: Option<&str>) -> Result<bool> {
        let mut ctx = self.context(connection).await?;
        let Some(key) = ctx.find(id).await? else {
            return Ok(false);
        };

        ctx.remove(key);
        let affected = ctx.save_changes().await?;

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
        self.page(request.search(), request.skip(), request.take(), connection)
            .await
    }

    async fn get_by(
        &self,
        options: &FilterOptions<P>,
        connection: Option<&str>,
    ) -> Result<ArticleSet<Reason, u64>> {
        self.page(options.search(), options.skip(), options.take(), connection)
            .await
    }

    fn backend(&self) -> RepositoryMode {
        RepositoryMode::TrackedContext
    }

    fn pages_in_storage(&self) -> bool {
        true
    }
}

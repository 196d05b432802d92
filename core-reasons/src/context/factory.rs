//! Context creation
//!
//! [`ReasonAppContextFactory`] decides which database a context connects to
//! and how its connection is obtained:
//!
//! | Lifetime    | Connection                                             |
//! |-------------|--------------------------------------------------------|
//! | `Transient` | dedicated, opened per context                          |
//! | `Scoped`    | from a pool owned by the factory scope                 |
//! | `Singleton` | from a pool shared by every scope of the root factory  |
//!
//! The connection string comes from, in order: one registered with
//! [`with_connection_string`](ReasonAppContextFactory::with_connection_string),
//! then `DefaultConnection` from the configuration source.

use std::collections::HashMap;
use std::sync::Arc;

use core_runtime::config::{ConnectionStringSource, ContextLifetime, DEFAULT_CONNECTION_NAME};
use core_runtime::logging::redact_connection_string;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::debug;

use super::{ContextConnection, QueryTrackingBehavior, ReasonAppContext};
use crate::db::{self, DatabaseConfig};
use crate::error::{ReasonError, Result};

const CONFIGURATION_MISSING: &str = "Configuration is not provided.";
const CONNECTION_STRING_EMPTY: &str = "Connection string must not be null or empty.";

type PoolMap = Arc<Mutex<HashMap<String, SqlitePool>>>;

/// Creates [`ReasonAppContext`] instances.
#[derive(Clone, Default)]
pub struct ReasonAppContextFactory {
    connection_string: Option<String>,
    configuration: Option<Arc<dyn ConnectionStringSource>>,
    lifetime: ContextLifetime,
    tracking: QueryTrackingBehavior,
    pools: PoolMap,
}

impl ReasonAppContextFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    pub fn with_configuration(mut self, configuration: Arc<dyn ConnectionStringSource>) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn with_lifetime(mut self, lifetime: ContextLifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Tracking behaviour given to every new context.
    pub fn with_tracking(mut self, tracking: QueryTrackingBehavior) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn lifetime(&self) -> ContextLifetime {
        self.lifetime
    }

    /// The connection string contexts use when no override is given.
    pub fn resolve_connection_string(&self) -> Result<String> {
        if let Some(registered) = non_blank(self.connection_string.as_deref()) {
            return Ok(registered.to_owned());
        }

        let configuration = self
            .configuration
            .as_ref()
            .ok_or_else(|| ReasonError::Configuration(CONFIGURATION_MISSING.to_string()))?;

        configuration
            .connection_string(DEFAULT_CONNECTION_NAME)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ReasonError::Configuration(CONNECTION_STRING_EMPTY.to_string()))
    }

    /// A context on the resolved connection string.
    pub async fn create_context(&self) -> Result<ReasonAppContext> {
        let connection_string = self.resolve_connection_string()?;
        self.create_context_for(&connection_string).await
    }

    /// A context on an explicit connection string.
    pub async fn create_context_for(&self, connection_string: &str) -> Result<ReasonAppContext> {
        if connection_string.trim().is_empty() {
            return Err(ReasonError::Configuration(CONNECTION_STRING_EMPTY.to_string()));
        }

        let connection = match self.lifetime {
            ContextLifetime::Transient => {
                ContextConnection::Dedicated(db::connect(connection_string).await?)
            }
            ContextLifetime::Scoped | ContextLifetime::Singleton => {
                let pool = self.pool(connection_string).await?;
                ContextConnection::Pooled(pool.acquire().await?)
            }
        };

        debug!(
            lifetime = %self.lifetime,
            connection = %redact_connection_string(connection_string),
            "Created reason context"
        );

        Ok(ReasonAppContext::new(connection).with_tracking(self.tracking))
    }

    /// A factory for a new scope. Scoped factories get their own pools;
    /// singleton factories keep sharing the root's.
    pub fn create_scope(&self) -> Self {
        let mut scope = self.clone();
        if self.lifetime == ContextLifetime::Scoped {
            scope.pools = PoolMap::default();
        }
        scope
    }

    /// Close every pool this factory holds.
    pub async fn close(&self) {
        let pools: Vec<SqlitePool> = self.pools.lock().await.drain().map(|(_, p)| p).collect();
        for pool in pools {
            pool.close().await;
        }
    }

    async fn pool(&self, connection_string: &str) -> Result<SqlitePool> {
        let mut pools = self.pools.lock().await;

        if let Some(pool) = pools.get(connection_string) {
            return Ok(pool.clone());
        }

        let pool = db::create_pool(DatabaseConfig::new(connection_string).without_migrations()).await?;
        pools.insert(connection_string.to_owned(), pool.clone());
        Ok(pool)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

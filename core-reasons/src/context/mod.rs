//! # Tracked Context
//!
//! [`ReasonAppContext`] is a unit of work over one connection. Entities are
//! registered with a state ([`EntityState`]), edited in place, and written
//! back together by [`save_changes`](ReasonAppContext::save_changes) inside a
//! single transaction.
//!
//! ```rust,ignore
//! let mut ctx = factory.create_context().await?;
//!
//! let key = ctx.add(Reason::new("Lost Card"));
//! ctx.save_changes().await?;
//! let id = ctx.entity(key).map(|r| r.id);
//!
//! if let Some(key) = ctx.find(7).await? {
//!     ctx.remove(key);
//! }
//! ctx.save_changes().await?;
//! ```
//!
//! Contexts are not shared: each holds `&mut` access to its connection and is
//! meant to live for one operation.

use std::ops::{Deref, DerefMut};

use sqlx::pool::PoolConnection;
use sqlx::{Connection, Sqlite, SqliteConnection};
use tracing::{debug, info};

use crate::error::{ReasonError, Result};
use crate::models::Reason;

pub mod factory;
pub mod query;

pub use factory::ReasonAppContextFactory;
pub use query::ReasonQuery;

const LOG_TARGET: &str = "reasons::context";

const INSERT_REASON: &str =
    "INSERT INTO Reasons (Active, CreatedAt, CreatedBy, Name) VALUES (?, ?, ?, ?) RETURNING Id";
const UPDATE_REASON: &str = "UPDATE Reasons SET Active = ?, Name = ? WHERE Id = ?";
const DELETE_REASON: &str = "DELETE FROM Reasons WHERE Id = ?";

/// Lifecycle of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// No longer tracked.
    Detached,
    /// Matches the database as last read or written.
    Unchanged,
    /// Inserted on the next save.
    Added,
    /// Updated on the next save.
    Modified,
    /// Deleted on the next save.
    Deleted,
}

impl EntityState {
    fn is_pending(self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Deleted
        )
    }
}

/// Whether [`ReasonAppContext::load`] registers the rows it returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryTrackingBehavior {
    /// Rows become `Unchanged` entries; rows already tracked resolve to the
    /// tracked instance.
    TrackAll,
    /// Rows are returned detached.
    #[default]
    NoTracking,
}

/// Handle to a tracked entry. Stays valid for the life of the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey(usize);

/// The connection a context runs on.
pub enum ContextConnection {
    /// Opened for this context and closed with it.
    Dedicated(SqliteConnection),
    /// Borrowed from a shared pool and returned on drop.
    Pooled(PoolConnection<Sqlite>),
}

impl Deref for ContextConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        match self {
            ContextConnection::Dedicated(conn) => conn,
            ContextConnection::Pooled(conn) => conn,
        }
    }
}

impl DerefMut for ContextConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            ContextConnection::Dedicated(conn) => conn,
            ContextConnection::Pooled(conn) => conn,
        }
    }
}

struct TrackedEntry {
    entity: Reason,
    state: EntityState,
    /// Values as last read or written; `None` for added entities.
    original: Option<Reason>,
}

enum Outcome {
    Inserted { index: usize, id: i64 },
    Written(usize),
    Removed(usize),
}

/// Unit of work over the `Reasons` table.
pub struct ReasonAppContext {
    connection: ContextConnection,
    entries: Vec<TrackedEntry>,
    tracking: QueryTrackingBehavior,
}

impl ReasonAppContext {
    pub fn new(connection: ContextConnection) -> Self {
        Self {
            connection,
            entries: Vec::new(),
            tracking: QueryTrackingBehavior::default(),
        }
    }

    pub fn with_tracking(mut self, tracking: QueryTrackingBehavior) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn tracking(&self) -> QueryTrackingBehavior {
        self.tracking
    }

    pub fn set_tracking(&mut self, tracking: QueryTrackingBehavior) {
        self.tracking = tracking;
    }

    /// Register a new entity for insert. Its `Id` is assigned on save.
    pub fn add(&mut self, reason: Reason) -> EntryKey {
        self.track(reason, EntityState::Added)
    }

    /// Start tracking an existing row as `Unchanged`.
    ///
    /// Fails with [`ReasonError::AlreadyTracked`] if another live entry has
    /// the same `Id`.
    pub fn attach(&mut self, reason: Reason) -> Result<EntryKey> {
        if self.live_entry(reason.id).is_some() {
            return Err(ReasonError::AlreadyTracked { id: reason.id });
        }
        Ok(self.track(reason, EntityState::Unchanged))
    }

    /// Track an existing row and mark it for update.
    pub fn update(&mut self, reason: Reason) -> Result<EntryKey> {
        let key = self.attach(reason)?;
        self.entries[key.0].state = EntityState::Modified;
        Ok(key)
    }

    /// Mark an entry for delete. An entry that was never saved is simply
    /// dropped from tracking.
    pub fn remove(&mut self, key: EntryKey) {
        if let Some(entry) = self.entries.get_mut(key.0) {
            entry.state = match entry.state {
                EntityState::Added | EntityState::Detached => EntityState::Detached,
                _ => EntityState::Deleted,
            };
        }
    }

    /// Stop tracking every entity.
    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            entry.state = EntityState::Detached;
        }
    }

    pub fn entity(&self, key: EntryKey) -> Option<&Reason> {
        self.entries.get(key.0).map(|entry| &entry.entity)
    }

    /// Mutable access; changes are picked up on the next save.
    pub fn entity_mut(&mut self, key: EntryKey) -> Option<&mut Reason> {
        self.entries.get_mut(key.0).map(|entry| &mut entry.entity)
    }

    pub fn state(&mut self, key: EntryKey) -> Option<EntityState> {
        self.detect_changes();
        self.entries.get(key.0).map(|entry| entry.state)
    }

    /// Whether a save would write anything.
    pub fn has_changes(&mut self) -> bool {
        self.detect_changes();
        self.entries.iter().any(|entry| entry.state.is_pending())
    }

    /// Locate the entity with `id`, tracked or stored.
    ///
    /// A tracked entry wins over the database; one marked `Deleted` counts as
    /// gone. A row read from the database is tracked as `Unchanged`
    /// regardless of the query tracking behaviour.
    pub async fn find(&mut self, id: i64) -> Result<Option<EntryKey>> {
        if let Some(index) = self.live_entry(id) {
            return Ok(match self.entries[index].state {
                EntityState::Deleted => None,
                _ => Some(EntryKey(index)),
            });
        }

        let mut rows = self.fetch(&ReasonQuery::new().by_id(id)).await?;
        Ok(rows
            .pop()
            .map(|row| self.track(row, EntityState::Unchanged)))
    }

    /// Run `query` and return the matching rows.
    pub async fn load(&mut self, query: &ReasonQuery) -> Result<Vec<Reason>> {
        let rows = self.fetch(query).await?;

        if self.tracking == QueryTrackingBehavior::NoTracking {
            return Ok(rows);
        }

        let resolved = rows
            .into_iter()
            .map(|row| match self.live_entry(row.id) {
                Some(index) => self.entries[index].entity.clone(),
                None => {
                    self.track(row.clone(), EntityState::Unchanged);
                    row
                }
            })
            .collect();

        Ok(resolved)
    }

    /// Count the rows `query` filters to. Order and window are ignored.
    pub async fn count(&mut self, query: &ReasonQuery) -> Result<u64> {
        let mut builder = query.unpaged().count();
        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&mut *self.connection)
            .await?;

        row_count(count)
    }

    /// Write every pending change in one transaction.
    ///
    /// Returns the number of rows affected. On failure the transaction is
    /// rolled back and entry states are left as they were.
    pub async fn save_changes(&mut self) -> Result<u64> {
        self.detect_changes();

        let pending: Vec<(usize, EntityState, Reason)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.state.is_pending())
            .map(|(index, entry)| (index, entry.state, entry.entity.clone()))
            .collect();

        if pending.is_empty() {
            return Ok(0);
        }

        let mut tx = self.connection.begin().await?;
        let mut outcomes = Vec::with_capacity(pending.len());
        let mut affected = 0;

        for (index, state, entity) in pending {
            match state {
                EntityState::Added => {
                    let id: i64 = sqlx::query_scalar(INSERT_REASON)
                        .bind(entity.is_active())
                        .bind(entity.created_at)
                        .bind(entity.created_by.as_deref())
                        .bind(entity.name.as_deref())
                        .fetch_one(&mut *tx)
                        .await?;
                    affected += 1;
                    outcomes.push(Outcome::Inserted { index, id });
                }
                EntityState::Modified => {
                    let result = sqlx::query(UPDATE_REASON)
                        .bind(entity.is_active())
                        .bind(entity.name.as_deref())
                        .bind(entity.id)
                        .execute(&mut *tx)
                        .await?;
                    affected += result.rows_affected();
                    outcomes.push(Outcome::Written(index));
                }
                EntityState::Deleted => {
                    let result = sqlx::query(DELETE_REASON)
                        .bind(entity.id)
                        .execute(&mut *tx)
                        .await?;
                    affected += result.rows_affected();
                    outcomes.push(Outcome::Removed(index));
                }
                EntityState::Unchanged | EntityState::Detached => {}
            }
        }

        tx.commit().await?;

        for outcome in outcomes {
            match outcome {
                Outcome::Inserted { index, id } => {
                    let entry = &mut self.entries[index];
                    entry.entity.id = id;
                    entry.entity.active = Some(entry.entity.is_active());
                    entry.accept();
                }
                Outcome::Written(index) => {
                    let entry = &mut self.entries[index];
                    entry.entity.active = Some(entry.entity.is_active());
                    entry.accept();
                }
                Outcome::Removed(index) => {
                    self.entries[index].state = EntityState::Detached;
                }
            }
        }

        info!(target: LOG_TARGET, affected, "Saved changes");
        Ok(affected)
    }

    async fn fetch(&mut self, query: &ReasonQuery) -> Result<Vec<Reason>> {
        let mut builder = query.select();
        let rows = builder
            .build_query_as::<Reason>()
            .fetch_all(&mut *self.connection)
            .await
            .map_err(ReasonError::from_row_error)?;

        debug!(target: LOG_TARGET, count = rows.len(), "Loaded reasons");
        Ok(rows)
    }

    fn track(&mut self, reason: Reason, state: EntityState) -> EntryKey {
        let original = (state != EntityState::Added).then(|| reason.clone());
        self.entries.push(TrackedEntry {
            entity: reason,
            state,
            original,
        });
        EntryKey(self.entries.len() - 1)
    }

    /// Index of the tracked, stored entity with `id`, if any.
    fn live_entry(&self, id: i64) -> Option<usize> {
        self.entries.iter().position(|entry| {
            entry.entity.id == id
                && !matches!(entry.state, EntityState::Detached | EntityState::Added)
        })
    }

    fn detect_changes(&mut self) {
        for entry in &mut self.entries {
            if entry.state == EntityState::Unchanged
                && entry.original.as_ref() != Some(&entry.entity)
            {
                entry.state = EntityState::Modified;
            }
        }
    }
}

impl TrackedEntry {
    fn accept(&mut self) {
        self.state = EntityState::Unchanged;
        self.original = Some(self.entity.clone());
    }
}

fn row_count(count: i64) -> Result<u64> {
    u64::try_from(count)
        .map_err(|_| ReasonError::Mapping(format!("COUNT(*) returned {count}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn test_context() -> (tempfile::TempDir, ReasonAppContext) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("context.db").display());
        crate::db::migrate(&url).await.unwrap();
        let conn = crate::db::connect(&url).await.unwrap();
        (dir, ReasonAppContext::new(ContextConnection::Dedicated(conn)))
    }

    fn stamped(name: &str) -> Reason {
        Reason::new(name).stamped(Utc::now().fixed_offset())
    }

    #[test]
    fn test_negative_count_is_a_mapping_error() {
        assert_eq!(row_count(25).unwrap(), 25);
        assert!(matches!(row_count(-1), Err(ReasonError::Mapping(_))));
    }

    #[tokio::test]
    async fn test_add_then_save_assigns_id() {
        let (_dir, mut ctx) = test_context().await;

        let key = ctx.add(stamped("Lost Card"));
        assert_eq!(ctx.state(key), Some(EntityState::Added));

        assert_eq!(ctx.save_changes().await.unwrap(), 1);

        assert_eq!(ctx.state(key), Some(EntityState::Unchanged));
        assert!(ctx.entity(key).unwrap().id > 0);
        assert!(!ctx.has_changes());
    }

    #[tokio::test]
    async fn test_edit_in_place_is_detected() {
        let (_dir, mut ctx) = test_context().await;
        ctx.add(stamped("Lost Card"));
        ctx.save_changes().await.unwrap();
        let id = ctx.load(&ReasonQuery::new()).await.unwrap()[0].id;

        let key = ctx.find(id).await.unwrap().unwrap();
        ctx.entity_mut(key).unwrap().name = Some("Lost Debit Card".into());

        assert_eq!(ctx.state(key), Some(EntityState::Modified));
        assert_eq!(ctx.save_changes().await.unwrap(), 1);

        let rows = ctx.load(&ReasonQuery::new().by_id(id)).await.unwrap();
        assert_eq!(rows[0].name.as_deref(), Some("Lost Debit Card"));
    }

    #[tokio::test]
    async fn test_attach_twice_is_rejected() {
        let (_dir, mut ctx) = test_context().await;
        let reason = Reason {
            id: 5,
            ..stamped("Stolen Card")
        };

        ctx.attach(reason.clone()).unwrap();
        let err = ctx.attach(reason).unwrap_err();

        assert!(matches!(err, ReasonError::AlreadyTracked { id: 5 }));
    }

    #[tokio::test]
    async fn test_remove_added_entry_detaches_without_writing() {
        let (_dir, mut ctx) = test_context().await;

        let key = ctx.add(stamped("Forgotten PIN"));
        ctx.remove(key);

        assert_eq!(ctx.state(key), Some(EntityState::Detached));
        assert_eq!(ctx.save_changes().await.unwrap(), 0);
        assert_eq!(ctx.count(&ReasonQuery::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_skips_entries_marked_deleted() {
        let (_dir, mut ctx) = test_context().await;
        ctx.add(stamped("Lost Card"));
        ctx.save_changes().await.unwrap();
        let id = ctx.load(&ReasonQuery::new()).await.unwrap()[0].id;

        let key = ctx.find(id).await.unwrap().unwrap();
        ctx.remove(key);

        assert!(ctx.find(id).await.unwrap().is_none());
        assert_eq!(ctx.save_changes().await.unwrap(), 1);
        assert_eq!(ctx.state(key), Some(EntityState::Detached));
        assert!(ctx.find(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_tracking_is_default() {
        let (_dir, mut ctx) = test_context().await;
        ctx.add(stamped("Lost Card"));
        ctx.save_changes().await.unwrap();
        ctx.clear();

        let rows = ctx.load(&ReasonQuery::new()).await.unwrap();

        assert_eq!(ctx.tracking(), QueryTrackingBehavior::NoTracking);
        assert_eq!(rows.len(), 1);
        ctx.attach(rows[0].clone()).unwrap();
    }

    #[tokio::test]
    async fn test_track_all_resolves_identity() {
        let (_dir, ctx) = test_context().await;
        let mut ctx = ctx.with_tracking(QueryTrackingBehavior::TrackAll);
        let key = ctx.add(stamped("Lost Card"));
        ctx.save_changes().await.unwrap();

        ctx.entity_mut(key).unwrap().name = Some("edited, unsaved".into());
        let rows = ctx.load(&ReasonQuery::new()).await.unwrap();

        assert_eq!(rows[0].name.as_deref(), Some("edited, unsaved"));
        assert!(matches!(
            ctx.attach(rows[0].clone()),
            Err(ReasonError::AlreadyTracked { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back_and_keeps_states() {
        let (_dir, mut ctx) = test_context().await;
        let first = ctx.add(stamped("Lost Card"));

        sqlx::query("DROP TABLE Reasons")
            .execute(&mut *ctx.connection)
            .await
            .unwrap();

        assert!(ctx.save_changes().await.unwrap_err().is_storage_unavailable());
        assert_eq!(ctx.state(first), Some(EntityState::Added));
        assert_eq!(ctx.entity(first).unwrap().id, 0);
    }

    #[tokio::test]
    async fn test_save_is_atomic() {
        let (_dir, mut ctx) = test_context().await;
        ctx.add(stamped("survivor"));
        ctx.save_changes().await.unwrap();

        sqlx::query(
            "CREATE TRIGGER reject_insert BEFORE INSERT ON Reasons \
             WHEN NEW.Name = 'rejected' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&mut *ctx.connection)
        .await
        .unwrap();

        // the delete runs first, then the insert aborts
        let key = ctx.find(1).await.unwrap().unwrap();
        ctx.remove(key);
        ctx.add(stamped("rejected"));

        assert!(ctx.save_changes().await.is_err());
        ctx.clear();
        assert_eq!(ctx.count(&ReasonQuery::new()).await.unwrap(), 1);
    }
}

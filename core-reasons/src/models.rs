//! Domain model for reasons

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A named, soft-enable label.
///
/// Field names serialize and map to the `Reasons` columns in PascalCase
/// (`Id`, `Active`, `CreatedAt`, `CreatedBy`, `Name`), which is what the
/// mapped-query backend binds `@Name` parameters from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "PascalCase")]
#[sqlx(rename_all = "PascalCase")]
pub struct Reason {
    /// Assigned by storage on insert; `0` until then.
    pub id: i64,
    /// `None` is stored as `true`.
    pub active: Option<bool>,
    /// Stamped once on insert and never updated.
    pub created_at: DateTime<FixedOffset>,
    pub created_by: Option<String>,
    /// The only searchable field.
    pub name: Option<String>,
}

impl Reason {
    /// An unsaved reason with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// The value `get_by_id` returns when no record matches.
    pub fn is_sentinel(&self) -> bool {
        self.id == 0
    }

    /// Active flag with the storage default applied.
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(true)
    }

    /// Whether `search` selects this record: blank selects everything,
    /// otherwise `name` must contain it (case-sensitive).
    pub fn matches(&self, search: Option<&str>) -> bool {
        match search.filter(|query| !query.trim().is_empty()) {
            None => true,
            Some(query) => self
                .name
                .as_deref()
                .is_some_and(|name| name.contains(query)),
        }
    }

    /// Prepare for insert: the creation stamp is always `now` and a missing
    /// active flag becomes `true`.
    pub(crate) fn stamped(mut self, now: DateTime<FixedOffset>) -> Self {
        self.created_at = now;
        self.active = Some(self.is_active());
        self
    }
}

impl Default for Reason {
    fn default() -> Self {
        Self {
            id: 0,
            active: None,
            created_at: DateTime::<Utc>::default().fixed_offset(),
            created_by: None,
            name: None,
        }
    }
}

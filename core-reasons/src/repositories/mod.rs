//! # Repository Pattern Implementation
//!
//! One contract, [`ReasonRepository`], and three backends that satisfy it:
//!
//! - [`CommandReasonRepository`] - positional statements over the
//!   `bridge-traits` storage capability, one connection per call
//! - [`MappedReasonRepository`] - `@Name` statements bound from the entity,
//!   rows mapped back by column name, one connection per call
//! - [`TrackedReasonRepository`] - a [`ReasonAppContext`](crate::context::ReasonAppContext)
//!   unit of work per call, with filtering and paging pushed down to SQLite
//!
//! ## Shared semantics
//!
//! - `connection` overrides the default connection string for one call;
//!   `None` or `""` keeps the default.
//! - A record matches a search when the search is blank or `Name` contains it
//!   (case-sensitive). A `NULL` name never matches a non-blank search.
//! - Lists and pages are ordered by `Id` descending.
//! - Not-found is soft: `find_by_id` gives `None`, `update`/`delete` give
//!   `false`.

use async_trait::async_trait;
use core_runtime::config::RepositoryMode;

use crate::error::Result;
use crate::models::Reason;

pub mod command;
pub mod mapped;
pub mod mapper;
pub mod pagination;
pub mod tracked;

pub use command::CommandReasonRepository;
pub use mapped::MappedReasonRepository;
pub use pagination::{ArticleSet, FilterOptions, PageRequest, SortOrder};
pub use tracked::TrackedReasonRepository;

/// Column list shared by every hand-written select.
pub(crate) const SELECT_REASONS: &str =
    "SELECT Id, Active, CreatedAt, CreatedBy, Name FROM Reasons";

/// Persistence contract for [`Reason`] records.
///
/// Object safe: wire it as `Arc<dyn ReasonRepository>`. `P` is the parent
/// scope type carried by page requests; it defaults to `()`.
#[async_trait]
pub trait ReasonRepository<P = ()>: Send + Sync
where
    P: Send + Sync + 'static,
{
    /// Insert a new reason. `CreatedAt` is stamped with the current time, a
    /// missing `Active` becomes `true`, and the caller's `Id` is ignored.
    ///
    /// Returns the stored entity with its generated `Id`.
    async fn add(&self, reason: Reason, connection: Option<&str>) -> Result<Reason>;

    /// Every reason, newest first.
    async fn get_all(&self, connection: Option<&str>) -> Result<Vec<Reason>>;

    /// The reason with `id`, if any.
    async fn find_by_id(&self, id: i64, connection: Option<&str>) -> Result<Option<Reason>>;

    /// The reason with `id`, or a default value with `Id == 0` when absent.
    async fn get_by_id(&self, id: i64, connection: Option<&str>) -> Result<Reason> {
        Ok(self.find_by_id(id, connection).await?.unwrap_or_default())
    }

    /// Write `Active` and `Name` for the row with `reason.id`. `CreatedAt` and
    /// `CreatedBy` are never changed.
    ///
    /// Returns `true` if a row was updated.
    async fn update(&self, reason: &Reason, connection: Option<&str>) -> Result<bool>;

    /// Hard-delete the row with `id`. Returns `true` if a row was removed.
    async fn delete(&self, id: i64, connection: Option<&str>) -> Result<bool>;

    /// One page of matching reasons and the matching total.
    async fn get_articles(
        &self,
        request: &PageRequest<P>,
        connection: Option<&str>,
    ) -> Result<ArticleSet<Reason, u32>>;

    /// Same window as [`get_articles`](Self::get_articles), with a 64-bit
    /// total.
    async fn get_by(
        &self,
        options: &FilterOptions<P>,
        connection: Option<&str>,
    ) -> Result<ArticleSet<Reason, u64>>;

    /// Which backend this is.
    fn backend(&self) -> RepositoryMode;

    /// Whether filtering, counting and windowing run inside the storage engine
    /// rather than over the full table in memory.
    fn pages_in_storage(&self) -> bool {
        false
    }
}

/// The override when it is non-empty, otherwise the default.
pub(crate) fn resolve_connection<'a>(default: &'a str, connection: Option<&'a str>) -> &'a str {
    connection
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(default)
}

/// Filter, then window, an id-descending list in memory.
pub(crate) fn page_in_memory<K: TryFrom<u64>>(
    all: Vec<Reason>,
    search: Option<&str>,
    skip: u64,
    take: u64,
) -> Result<ArticleSet<Reason, K>> {
    let matching: Vec<Reason> = all
        .into_iter()
        .filter(|reason| reason.matches(search))
        .collect();
    let total = matching.len() as u64;

    let items = matching
        .into_iter()
        .skip(usize::try_from(skip).unwrap_or(usize::MAX))
        .take(usize::try_from(take).unwrap_or(usize::MAX))
        .collect();

    ArticleSet::with_total(items, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasons(names: &[&str]) -> Vec<Reason> {
        names
            .iter()
            .enumerate()
            .rev()
            .map(|(i, name)| Reason {
                id: i as i64 + 1,
                ..Reason::new(*name)
            })
            .collect()
    }

    #[test]
    fn test_resolve_connection() {
        assert_eq!(resolve_connection("sqlite:a.db", None), "sqlite:a.db");
        assert_eq!(resolve_connection("sqlite:a.db", Some("")), "sqlite:a.db");
        assert_eq!(resolve_connection("sqlite:a.db", Some("  ")), "sqlite:a.db");
        assert_eq!(
            resolve_connection("sqlite:a.db", Some("sqlite:b.db")),
            "sqlite:b.db"
        );
    }

    #[test]
    fn test_page_in_memory_filters_before_windowing() {
        let all = reasons(&["Lost Card", "Stolen Card", "Forgotten PIN"]);

        let page: ArticleSet<Reason, u32> = page_in_memory(all, Some("Card"), 0, 10).unwrap();

        assert_eq!(page.total_count, 2);
        let names: Vec<_> = page.items.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, vec!["Stolen Card", "Lost Card"]);
    }

    #[test]
    fn test_page_in_memory_past_end() {
        let all = reasons(&["a", "b", "c"]);

        let page: ArticleSet<Reason, u64> = page_in_memory(all, None, 30, 10).unwrap();

        assert!(page.is_empty());
        assert_eq!(page.total_count, 3);
    }

    #[test]
    fn test_page_in_memory_zero_size() {
        let all = reasons(&["a", "b"]);

        let page: ArticleSet<Reason, u64> = page_in_memory(all, None, 0, 0).unwrap();

        assert!(page.is_empty());
        assert_eq!(page.total_count, 2);
    }
}

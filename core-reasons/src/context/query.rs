//! Query descriptions for the tracked context
//!
//! A [`ReasonQuery`] is a plain value describing filter, order and window.
//! The context turns it into SQL, so filtering, counting and paging all run
//! inside SQLite.

use sqlx::{QueryBuilder, Sqlite};

use crate::repositories::SELECT_REASONS;

/// What to load from `Reasons`.
///
/// ```
/// use core_reasons::context::ReasonQuery;
///
/// let page = ReasonQuery::new()
///     .name_contains(Some("Card"))
///     .newest_first()
///     .skip(10)
///     .take(10);
/// assert_eq!(page.window(), (Some(10), Some(10)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasonQuery {
    id: Option<i64>,
    name_contains: Option<String>,
    newest_first: bool,
    skip: Option<u64>,
    take: Option<u64>,
}

impl ReasonQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Keep rows whose `Name` contains `query` (case-sensitive). A blank
    /// query keeps everything.
    pub fn name_contains(mut self, query: Option<&str>) -> Self {
        self.name_contains = query
            .filter(|q| !q.trim().is_empty())
            .map(str::to_owned);
        self
    }

    /// Order by `Id` descending.
    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    pub fn skip(mut self, count: u64) -> Self {
        self.skip = Some(count);
        self
    }

    pub fn take(mut self, count: u64) -> Self {
        self.take = Some(count);
        self
    }

    /// `(skip, take)` as set.
    pub fn window(&self) -> (Option<u64>, Option<u64>) {
        (self.skip, self.take)
    }

    /// Same filter without order or window, for counting.
    pub fn unpaged(&self) -> Self {
        Self {
            id: self.id,
            name_contains: self.name_contains.clone(),
            ..Self::default()
        }
    }

    pub(crate) fn select(&self) -> QueryBuilder<'static, Sqlite> {
        let mut builder = QueryBuilder::new(SELECT_REASONS);
        self.push_filter(&mut builder);

        if self.newest_first {
            builder.push(" ORDER BY Id DESC");
        }

        match (self.take, self.skip) {
            (Some(take), skip) => {
                builder.push(" LIMIT ").push_bind(to_sql_int(take));
                builder.push(" OFFSET ").push_bind(to_sql_int(skip.unwrap_or(0)));
            }
            // SQLite needs a LIMIT before OFFSET; -1 means unbounded
            (None, Some(skip)) => {
                builder.push(" LIMIT -1 OFFSET ").push_bind(to_sql_int(skip));
            }
            (None, None) => {}
        }

        builder
    }

    pub(crate) fn count(&self) -> QueryBuilder<'static, Sqlite> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM Reasons");
        self.push_filter(&mut builder);
        builder
    }

    fn push_filter(&self, builder: &mut QueryBuilder<'static, Sqlite>) {
        let mut joiner = " WHERE ";

        if let Some(id) = self.id {
            builder.push(joiner).push("Id = ").push_bind(id);
            joiner = " AND ";
        }

        if let Some(name) = &self.name_contains {
            builder
                .push(joiner)
                .push("instr(Name, ")
                .push_bind(name.clone())
                .push(") > 0");
        }
    }
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

//! Pagination and filtering value objects for reason queries
//!
//! All three backends apply the same window: filter on `Name`, sort by `Id`
//! descending, skip `page_index * page_size`, take `page_size`.

use serde::{Deserialize, Serialize};

use crate::error::{ReasonError, Result};

/// Sort direction hint. Accepted for API compatibility; results are always
/// newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Page request for [`get_articles`](super::ReasonRepository::get_articles).
///
/// `P` is a caller-defined parent scope. It travels with the request but no
/// backend filters on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest<P = ()> {
    /// Zero-based page number
    pub page_index: u32,
    pub page_size: u32,
    /// Accepted but unused; `Name` is the only searchable field.
    pub search_field: Option<String>,
    pub search_query: Option<String>,
    /// Accepted but unused.
    pub sort_order: Option<SortOrder>,
    pub parent: P,
}

impl<P: Default> PageRequest<P> {
    /// # Examples
    ///
    /// ```
    /// use core_reasons::repositories::PageRequest;
    ///
    /// let request: PageRequest = PageRequest::new(2, 10).with_search("Card");
    /// assert_eq!(request.skip(), 20);
    /// assert_eq!(request.search(), Some("Card"));
    /// ```
    pub fn new(page_index: u32, page_size: u32) -> Self {
        Self {
            page_index,
            page_size,
            search_field: None,
            search_query: None,
            sort_order: None,
            parent: P::default(),
        }
    }
}

impl<P> PageRequest<P> {
    pub fn with_search(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    pub fn with_search_field(mut self, field: impl Into<String>) -> Self {
        self.search_field = Some(field.into());
        self
    }

    pub fn with_sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = Some(order);
        self
    }

    pub fn with_parent<Q>(self, parent: Q) -> PageRequest<Q> {
        PageRequest {
            page_index: self.page_index,
            page_size: self.page_size,
            search_field: self.search_field,
            search_query: self.search_query,
            sort_order: self.sort_order,
            parent,
        }
    }

    /// Non-blank search text, if any.
    pub fn search(&self) -> Option<&str> {
        non_blank(self.search_query.as_deref())
    }

    /// Rows to skip before the page starts
    pub fn skip(&self) -> u64 {
        u64::from(self.page_index) * u64::from(self.page_size)
    }

    pub fn take(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl<P: Default> Default for PageRequest<P> {
    fn default() -> Self {
        Self::new(0, 20)
    }
}

/// Filter for [`get_by`](super::ReasonRepository::get_by).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions<P = ()> {
    pub search_query: Option<String>,
    pub page_index: u32,
    pub page_size: u32,
    pub parent: P,
}

impl<P: Default> FilterOptions<P> {
    pub fn new(page_index: u32, page_size: u32) -> Self {
        Self {
            search_query: None,
            page_index,
            page_size,
            parent: P::default(),
        }
    }
}

impl<P> FilterOptions<P> {
    pub fn with_search(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    pub fn search(&self) -> Option<&str> {
        non_blank(self.search_query.as_deref())
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page_index) * u64::from(self.page_size)
    }

    pub fn take(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl<P: Default> Default for FilterOptions<P> {
    fn default() -> Self {
        Self::new(0, 20)
    }
}

/// One page of results plus the number of records matching the filter.
///
/// `total_count` counts the whole filtered set, not the page and not the
/// table. `K` is the count type: `u32` for page-index keyed results, `u64`
/// for id keyed ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSet<T, K> {
    pub items: Vec<T>,
    pub total_count: K,
}

impl<T, K> ArticleSet<T, K> {
    pub fn new(items: Vec<T>, total_count: K) -> Self {
        Self { items, total_count }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Map the items to a different type
    pub fn map<U, F>(self, f: F) -> ArticleSet<U, K>
    where
        F: FnMut(T) -> U,
    {
        ArticleSet {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
        }
    }
}

impl<T, K: Copy + Into<u64>> ArticleSet<T, K> {
    /// Number of pages of `page_size` needed for the filtered set.
    ///
    /// ```
    /// use core_reasons::repositories::ArticleSet;
    ///
    /// let set: ArticleSet<(), u32> = ArticleSet::new(vec![], 25);
    /// assert_eq!(set.page_count(10), 3);
    /// assert_eq!(set.page_count(0), 0);
    /// ```
    pub fn page_count(&self, page_size: u32) -> u64 {
        if page_size == 0 {
            return 0;
        }
        let total: u64 = self.total_count.into();
        total.div_ceil(u64::from(page_size))
    }
}

impl<T, K: TryFrom<u64>> ArticleSet<T, K> {
    /// Build a set from a `u64` total, failing when it does not fit `K`.
    pub fn with_total(items: Vec<T>, total: u64) -> Result<Self> {
        let total_count = K::try_from(total).map_err(|_| ReasonError::CountOverflow(total))?;
        Ok(Self::new(items, total_count))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

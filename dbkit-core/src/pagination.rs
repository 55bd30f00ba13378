//! Pagination query modifier

use serde::{Deserialize, Serialize};
use sqlx::{Database, QueryBuilder};

/// Items per page when the caller passes a non-positive limit
pub const DEFAULT_PER_PAGE: i64 = 10;

/// Offset/limit pair derived from a page number and page size.
///
/// Deserialized values go through [`Paginate::new`], so request parameters
/// are clamped the same way as values built in code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPaginate")]
pub struct Paginate {
    /// Page number (1-indexed)
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

impl Paginate {
    /// Create pagination with validation.
    ///
    /// - Page is clamped to a minimum of 1
    /// - A per page value below 1 becomes [`DEFAULT_PER_PAGE`]
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: if per_page < 1 { DEFAULT_PER_PAGE } else { per_page },
        }
    }

    /// Calculate SQL OFFSET value.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit())
    }

    /// Get LIMIT value. Never below 1, even for a struct built by hand.
    pub fn limit(&self) -> i64 {
        if self.per_page < 1 {
            DEFAULT_PER_PAGE
        } else {
            self.per_page
        }
    }

    /// Append `LIMIT .. OFFSET ..` to a query under construction.
    ///
    /// Both values are integers computed here, so they are written inline
    /// rather than bound; placeholder syntax differs between drivers.
    pub fn apply<'q, 'args, DB: Database>(
        &self,
        query: &'q mut QueryBuilder<'args, DB>,
    ) -> &'q mut QueryBuilder<'args, DB> {
        query.push(format!(" LIMIT {} OFFSET {}", self.limit(), self.offset()))
    }

    /// Return `sql` with `LIMIT .. OFFSET ..` appended.
    pub fn apply_sql(&self, sql: &str) -> String {
        format!("{} LIMIT {} OFFSET {}", sql.trim_end(), self.limit(), self.offset())
    }
}

#[derive(Deserialize)]
struct RawPaginate {
    #[serde(default)]
    page: i64,
    #[serde(default)]
    per_page: i64,
}

impl From<RawPaginate> for Paginate {
    fn from(raw: RawPaginate) -> Self {
        Self::new(raw.page, raw.per_page)
    }
}

impl Default for Paginate {
    fn default() -> Self {
        Self::new(1, DEFAULT_PER_PAGE)
    }
}

/// Build a reusable pagination modifier.
pub fn paginate(page: i64, per_page: i64) -> Paginate {
    Paginate::new(page, per_page)
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Items for current page
    pub items: Vec<T>,
    /// Total count across all pages
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: Paginate) -> Self {
        Self {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
        }
    }

    /// Calculate total number of pages.
    ///
    /// A non-positive `per_page` counts as [`DEFAULT_PER_PAGE`].
    pub fn total_pages(&self) -> i64 {
        let per_page = if self.per_page < 1 {
            DEFAULT_PER_PAGE
        } else {
            self.per_page
        };
        if self.total <= 0 {
            1
        } else {
            (self.total / per_page + i64::from(self.total % per_page != 0)).max(1)
        }
    }

    /// Check if there's a next page.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Check if there's a previous page.
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_calculation() {
        assert_eq!(Paginate::new(1, 10).offset(), 0);
        assert_eq!(Paginate::new(2, 10).offset(), 10);
        assert_eq!(Paginate::new(3, 25).offset(), 50);
    }

    #[test]
    fn clamps_page() {
        assert_eq!(Paginate::new(0, 10).page, 1);
        assert_eq!(Paginate::new(-4, 10).page, 1);
    }

    #[test]
    fn non_positive_per_page_uses_default() {
        assert_eq!(Paginate::new(1, 0).per_page, 10);
        assert_eq!(Paginate::new(1, -3).per_page, 10);
        assert_eq!(Paginate::new(1, 3).per_page, 3);
    }

    #[test]
    fn apply_sql_appends_limit_offset() {
        let sql = paginate(2, 10).apply_sql("SELECT id FROM users ORDER BY id ");
        assert_eq!(sql, "SELECT id FROM users ORDER BY id LIMIT 10 OFFSET 10");
    }

    #[test]
    fn apply_to_query_builder() {
        let mut qb: QueryBuilder<'_, sqlx::Any> = QueryBuilder::new("SELECT id FROM users");
        paginate(3, 5).apply(&mut qb);
        assert_eq!(qb.sql(), "SELECT id FROM users LIMIT 5 OFFSET 10");
    }

    #[test]
    fn total_pages() {
        let paginated: Paginated<()> = Paginated::new(vec![], 0, Paginate::new(1, 10));
        assert_eq!(paginated.total_pages(), 1);

        let paginated: Paginated<()> = Paginated::new(vec![], 25, Paginate::new(1, 10));
        assert_eq!(paginated.total_pages(), 3);

        let paginated: Paginated<()> = Paginated::new(vec![], 100, Paginate::new(1, 10));
        assert_eq!(paginated.total_pages(), 10);
    }

    #[test]
    fn total_pages_with_zero_per_page() {
        let paginated: Paginated<()> = Paginated {
            items: vec![],
            total: 5,
            page: 1,
            per_page: 0,
        };
        assert_eq!(paginated.total_pages(), 1);

        let paginated: Paginated<()> = Paginated {
            items: vec![],
            total: 25,
            page: 1,
            per_page: -1,
        };
        assert_eq!(paginated.total_pages(), 3);
    }

    #[test]
    fn hand_built_values_are_clamped() {
        let page = Paginate { page: 0, per_page: 0 };
        assert_eq!(page.limit(), 10);
        assert_eq!(page.offset(), 0);
        assert_eq!(page.apply_sql("SELECT 1"), "SELECT 1 LIMIT 10 OFFSET 0");
    }

    #[test]
    fn deserialize_clamps() {
        let page: Paginate = serde_json::from_str(r#"{"page":0,"per_page":0}"#).unwrap();
        assert_eq!(page, Paginate::new(1, 10));
        assert_eq!(page.limit(), 10);
        assert_eq!(page.offset(), 0);

        let page: Paginate = serde_json::from_str(r#"{"page":3,"per_page":-5}"#).unwrap();
        assert_eq!((page.page, page.per_page, page.offset()), (3, 10, 20));

        let page: Paginate = serde_json::from_str("{}").unwrap();
        assert_eq!(page, Paginate::default());
    }

    #[test]
    fn has_next_prev() {
        let paginated: Paginated<()> = Paginated::new(vec![], 30, Paginate::new(1, 10));
        assert!(paginated.has_next());
        assert!(!paginated.has_prev());

        let paginated: Paginated<()> = Paginated::new(vec![], 30, Paginate::new(3, 10));
        assert!(!paginated.has_next());
        assert!(paginated.has_prev());
    }
}

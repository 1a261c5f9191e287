//! Pagination and the pagination-safety rewrite.
//!
//! `OFFSET`/`LIMIT` applied to a query that joins a multiplying relation
//! limits joined rows, not root entities. When a paginated query
//! references a multiplying relation, the engine rewrites it into a
//! two-phase plan: a probe query selects distinct root primary keys with
//! multiplying joins suppressed and pagination applied, then a second
//! query re-fetches full rows restricted to those keys with all joins
//! and selects restored and no pagination. Pagination count and order
//! are therefore always determined by root-entity identity, never by
//! joined-row count.

use crate::select::{QueryParts, SqlQuery};
use relquery_core::{Error, InputErrorKind, Result, Value};
use serde::{Deserialize, Serialize};

/// A pagination window, in either `skip`/`take` or `page`/`limit` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pagination {
    /// Skip `skip` root entities, return at most `take`.
    SkipTake { skip: u64, take: u64 },
    /// 1-based page of `limit` root entities.
    PageLimit { page: u64, limit: u64 },
}

impl Pagination {
    /// Number of root entities skipped (`(page - 1) * limit` for the
    /// page form).
    pub fn skip(&self) -> u64 {
        match self {
            Pagination::SkipTake { skip, .. } => *skip,
            Pagination::PageLimit { page, limit } => page.saturating_sub(1) * limit,
        }
    }

    /// Maximum number of root entities returned.
    pub fn take(&self) -> u64 {
        match self {
            Pagination::SkipTake { take, .. } => *take,
            Pagination::PageLimit { limit, .. } => *limit,
        }
    }

    /// Parse a pagination object from JSON.
    #[allow(clippy::result_large_err)]
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| {
            Error::input(
                InputErrorKind::InvalidPagination,
                format!("invalid pagination: {e}"),
            )
        })
    }
}

/// Window metadata for one page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Total matching root entities.
    pub total: u64,
    /// Entities skipped.
    pub skip: u64,
    /// Window size requested.
    pub take: u64,
    /// Entities in this page: `min(take, total - skip)`, clamped at
    /// zero when `skip` exceeds `total`.
    pub count: u64,
}

impl PageInfo {
    /// Compute the window metadata for a result set.
    pub fn new(total: u64, pagination: Option<&Pagination>) -> Self {
        match pagination {
            Some(p) => {
                let skip = p.skip();
                let take = p.take();
                Self {
                    total,
                    skip,
                    take,
                    count: total.saturating_sub(skip).min(take),
                }
            }
            None => Self {
                total,
                skip: 0,
                take: total,
                count: total,
            },
        }
    }
}

/// One page of hydrated entities plus its window metadata.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    /// The entities in this page.
    pub items: Vec<T>,
    /// Window metadata.
    pub page: PageInfo,
}

/// The plan produced for one find specification.
#[derive(Debug, Clone)]
pub enum QueryPlan {
    /// A single query, safe to execute as-is.
    Direct(SqlQuery),
    /// The two-phase pagination-safe plan.
    TwoPhase(TwoPhasePlan),
}

impl QueryPlan {
    /// Check whether this is the two-phase form.
    pub fn is_two_phase(&self) -> bool {
        matches!(self, QueryPlan::TwoPhase(_))
    }
}

/// The two-phase plan: a probe for root keys, then a keyed re-fetch.
#[derive(Debug, Clone)]
pub struct TwoPhasePlan {
    /// Phase one: distinct root primary keys, multiplying joins
    /// suppressed, pagination applied.
    pub probe: SqlQuery,
    full: QueryParts,
}

impl TwoPhasePlan {
    pub(crate) fn new(probe: SqlQuery, full: QueryParts) -> Self {
        Self { probe, full }
    }

    /// Phase two: the original full query (all joins and selects, no
    /// pagination) restricted to the probed root keys.
    pub fn phase_two(&self, ids: &[Value]) -> SqlQuery {
        self.full.assemble_with_keys(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_skip_take() {
        let p = Pagination::SkipTake { skip: 20, take: 10 };
        assert_eq!(p.skip(), 20);
        assert_eq!(p.take(), 10);
    }

    #[test]
    fn test_page_limit_converts_to_offset() {
        let p = Pagination::PageLimit { page: 3, limit: 25 };
        assert_eq!(p.skip(), 50);
        assert_eq!(p.take(), 25);
    }

    #[test]
    fn test_page_zero_clamps_to_first_page() {
        let p = Pagination::PageLimit { page: 0, limit: 10 };
        assert_eq!(p.skip(), 0);
    }

    #[test]
    fn test_from_json_both_forms() {
        assert_eq!(
            Pagination::from_json(&json!({ "skip": 5, "take": 10 })).unwrap(),
            Pagination::SkipTake { skip: 5, take: 10 }
        );
        assert_eq!(
            Pagination::from_json(&json!({ "page": 2, "limit": 10 })).unwrap(),
            Pagination::PageLimit { page: 2, limit: 10 }
        );
        let err = Pagination::from_json(&json!({ "offset": 5 })).unwrap_err();
        assert_eq!(err.input_kind(), Some(InputErrorKind::InvalidPagination));
    }

    #[test]
    fn test_page_info_counts() {
        let p = Pagination::SkipTake { skip: 0, take: 10 };
        assert_eq!(PageInfo::new(25, Some(&p)).count, 10);

        let p = Pagination::SkipTake { skip: 20, take: 10 };
        assert_eq!(PageInfo::new(25, Some(&p)).count, 5);
    }

    #[test]
    fn test_page_info_count_clamps_at_zero() {
        // skip beyond total must yield 0, not wrap.
        let p = Pagination::SkipTake { skip: 40, take: 10 };
        let info = PageInfo::new(25, Some(&p));
        assert_eq!(info.count, 0);
    }

    #[test]
    fn test_page_info_without_pagination() {
        let info = PageInfo::new(7, None);
        assert_eq!(info.count, 7);
        assert_eq!(info.take, 7);
        assert_eq!(info.skip, 0);
    }
}

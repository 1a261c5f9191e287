//! Relation-aware query construction for relquery.
//!
//! `relquery-engine` is the **query construction layer**. It turns a
//! declarative find specification (filter tree, ordering, pagination,
//! eager-load list) plus the static entity metadata from
//! `relquery-core` into SQL plus parameters, with joins planned so that
//! result sets are never corrupted by row multiplication:
//!
//! - **Relation graph analysis**: multi-hop relation paths with
//!   aggregated cardinality, cached per entity.
//! - **Filter compilation**: nested `_and`/`_or` trees lowered to
//!   predicates; multiplying relations are reached through correlated
//!   EXISTS subqueries, never joins.
//! - **Query assembly**: alias registry, idempotent join registration,
//!   ordering, pagination.
//! - **Pagination safety**: paginated queries that reference a
//!   multiplying relation are rewritten into a two-phase plan (probe
//!   for distinct root keys, then a keyed re-fetch), so `LIMIT`/`OFFSET`
//!   always count root entities.
//!
//! Produced queries execute through the `Connection` trait from
//! `relquery-core`; most users access the engine via the `relquery`
//! facade crate.

pub mod clause;
pub mod engine;
pub mod expr;
pub mod filter;
pub mod graph;
pub mod join;
pub mod order;
pub mod paginate;
pub mod select;

pub use clause::{OrderClause, SortDirection};
pub use engine::QueryEngine;
pub use expr::{BinaryOp, Dialect, ExistsSelect, Expr};
pub use filter::{Condition, FieldOp, MAX_RECURSIVE_DEPTH, Where};
pub use graph::{
    DEFAULT_MAX_DEPTH, PathSegment, RelationInfo, RelationInfoCache, relations_info,
};
pub use join::Join;
pub use order::{OrderBy, OrderEntry};
pub use paginate::{Paged, PageInfo, Pagination, QueryPlan, TwoPhasePlan};
pub use select::{FindOptions, SqlQuery};

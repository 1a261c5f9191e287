//! relquery - relation-aware SQL query construction for Rust.
//!
//! relquery turns a declarative find specification (filter tree,
//! ordering, pagination, eager-load list) into SQL that is safe against
//! join-induced row multiplication:
//!
//! - Entities declare static relation metadata; a [`Schema`] registers
//!   them explicitly at startup.
//! - The engine analyzes multi-hop relation paths and their aggregated
//!   cardinality, and caches the analysis per entity.
//! - Filters on to-many relations compile to correlated `EXISTS`
//!   subqueries; ordering through them is rejected.
//! - Paginated queries that reference a to-many relation become a
//!   two-phase plan: probe distinct root keys first, then re-fetch full
//!   rows by key - so `LIMIT`/`OFFSET` always count root entities.
//!
//! # Quick Start
//!
//! ```ignore
//! use relquery::prelude::*;
//!
//! let schema = Schema::builder()
//!     .entity::<Invoice>()
//!     .entity::<InvoiceDetail>()
//!     .build()?;
//! let engine = QueryEngine::new(schema);
//!
//! let opts = FindOptions::new()
//!     .filter(Where::new().relation(
//!         "details",
//!         Where::new().value("product_id", 123_i64),
//!     ))
//!     .paginate(Pagination::SkipTake { skip: 0, take: 10 });
//!
//! // Plan only (execute yourself)...
//! let plan = engine.plan::<Invoice>(&opts)?;
//!
//! // ...or let the engine drive a Connection.
//! let invoices: Vec<Invoice> = engine.fetch(&cx, &conn, &opts).await?;
//! ```

pub use relquery_core::{
    ColumnInfo, ConfigError, Connection, Cx, Entity, EntityMeta, Error, ExecutionError, FieldInfo,
    InputError, InputErrorKind, InternalError, InternalErrorKind, LinkTableInfo, Outcome,
    RelationDef, RelationKind, Result, Row, Schema, SchemaBuilder, Value,
};

pub use relquery_engine::{
    BinaryOp, Condition, DEFAULT_MAX_DEPTH, Dialect, ExistsSelect, Expr, FieldOp, FindOptions,
    Join, MAX_RECURSIVE_DEPTH, OrderBy, OrderClause, OrderEntry, Paged, PageInfo, Pagination,
    PathSegment, QueryEngine, QueryPlan, RelationInfo, RelationInfoCache, SortDirection, SqlQuery,
    TwoPhasePlan, Where, relations_info,
};

/// Commonly used items.
pub mod prelude {
    pub use relquery_core::{
        Connection, Cx, Entity, Error, FieldInfo, LinkTableInfo, Outcome, RelationDef,
        RelationKind, Result, Row, Schema, Value,
    };
    pub use relquery_engine::{
        Dialect, FieldOp, FindOptions, OrderBy, Paged, Pagination, QueryEngine, QueryPlan,
        SortDirection, Where,
    };
}

//! Query assembly.
//!
//! The assembler owns alias allocation and join registration for one
//! query build: the registry maps dotted relation paths to aliases so a
//! path referenced twice (filter, order, eager include) resolves to the
//! same alias and emits exactly one join chain. It consumes the filter
//! compiler's predicate tree and the relation graph analyzer's metadata
//! and produces SQL plus bound parameters.

use crate::clause::OrderClause;
use crate::expr::{Dialect, Expr};
use crate::filter::{Where, compile_where};
use crate::graph::{RelationInfoCache, RelationInfo};
use crate::join::{Join, relation_joins};
use crate::order::{OrderBy, compile_order};
use crate::paginate::Pagination;
use relquery_core::{
    EntityMeta, Error, InputErrorKind, InternalErrorKind, RelationKind, Result, Schema, Value,
};
use std::sync::Arc;

/// A find specification: filter, ordering, pagination, and relations to
/// eager-load.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Filter tree.
    pub filter: Option<Where>,
    /// Order trees, applied in sequence.
    pub order: Vec<OrderBy>,
    /// Pagination window.
    pub pagination: Option<Pagination>,
    /// Dotted relation paths to eager-load.
    pub include: Vec<String>,
}

impl FindOptions {
    /// Create an empty specification.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter tree.
    #[must_use]
    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Append an order tree.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    /// Set the pagination window.
    #[must_use]
    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Eager-load a relation (dotted path for multi-hop).
    #[must_use]
    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.include.push(path.into());
        self
    }
}

/// A produced query: SQL text plus bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    /// The SQL text.
    pub sql: String,
    /// Bound parameters, in placeholder order.
    pub params: Vec<Value>,
}

/// What the select list projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectMode {
    /// Root columns plus eager-loaded relation columns, aliased.
    Projection,
    /// Distinct root primary keys (plus order columns).
    Keys,
    /// `COUNT(*)`.
    Count,
}

/// How a registered relation reaches the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinStrategy {
    /// LEFT JOIN emitted.
    Joined,
    /// Referenced through a correlated EXISTS subquery; no join.
    Subquery,
    /// Join suppressed (`ignore_multiplying_joins` probe pass).
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinPurpose {
    Filter,
    Order,
    Eager,
}

/// One relation registered during a query build.
#[derive(Debug, Clone)]
pub(crate) struct RegisteredRelation {
    /// Dotted root-relative property path.
    pub path: String,
    /// Alias assigned to the relation.
    pub alias: String,
    /// Target entity name.
    pub entity: &'static str,
    /// Aggregated cardinality of the path.
    pub aggregated: RelationKind,
    /// Join strategy chosen at registration.
    pub strategy: JoinStrategy,
    /// Whether the relation's columns are projected.
    pub select: bool,
    /// Emitted joins (empty for Subquery/Suppressed strategies).
    pub joins: Vec<Join>,
}

/// Mutable per-build state: alias registry, join list, and the flags the
/// pagination-safety rewriter uses for its probe pass. Owned exclusively
/// by one build invocation.
pub(crate) struct QueryContext<'a> {
    schema: &'a Schema,
    cache: &'a RelationInfoCache,
    dialect: Dialect,
    root: &'a EntityMeta,
    root_alias: String,
    root_infos: Arc<[RelationInfo]>,
    pub(crate) relations: Vec<RegisteredRelation>,
    pub(crate) ignore_multiplying_joins: bool,
    pub(crate) ignore_selects: bool,
}

impl<'a> QueryContext<'a> {
    pub(crate) fn new(
        schema: &'a Schema,
        cache: &'a RelationInfoCache,
        dialect: Dialect,
        root: &'a EntityMeta,
        ignore_multiplying_joins: bool,
        ignore_selects: bool,
    ) -> Self {
        let root_infos = cache.get(schema, root);
        Self {
            schema,
            cache,
            dialect,
            root,
            root_alias: root.name.to_lowercase(),
            root_infos,
            relations: Vec::new(),
            ignore_multiplying_joins,
            ignore_selects,
        }
    }

    pub(crate) fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub(crate) fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub(crate) fn root_alias(&self) -> &str {
        &self.root_alias
    }

    /// A fresh context rooted at `entity`, for compiling a correlated
    /// subquery. Shares the schema/cache but has its own registry.
    pub(crate) fn subcontext(&self, entity: &str, alias: &str) -> Result<QueryContext<'a>> {
        let schema = self.schema;
        let root = schema.expect_entity(entity)?;
        let root_infos = self.cache.get(schema, root);
        Ok(QueryContext {
            schema,
            cache: self.cache,
            dialect: self.dialect,
            root,
            root_alias: alias.to_string(),
            root_infos,
            relations: Vec::new(),
            ignore_multiplying_joins: false,
            ignore_selects: true,
        })
    }

    /// The entity behind an alias.
    pub(crate) fn entity_of_alias(&self, alias: &str) -> Result<&'a EntityMeta> {
        if alias == self.root_alias {
            return Ok(self.root);
        }
        let schema = self.schema;
        match self.relations.iter().find(|r| r.alias == alias) {
            Some(rel) => schema.expect_entity(rel.entity),
            None => Err(Error::internal(
                InternalErrorKind::RelationNotFound,
                format!("no relation registered for alias '{alias}'"),
            )),
        }
    }

    /// Reconstruct the root-relative dotted path implied by referencing
    /// `field` under `alias`.
    fn dotted_path(&self, alias: &str, field: &str) -> Result<String> {
        if field.contains('.') {
            return Err(Error::input(
                InputErrorKind::MalformedPath,
                format!("relation reference '{field}' must address a single property"),
            ));
        }
        if alias == self.root_alias {
            return Ok(field.to_string());
        }
        match self.relations.iter().find(|r| r.alias == alias) {
            Some(rel) => Ok(format!("{}.{field}", rel.path)),
            None => Err(Error::internal(
                InternalErrorKind::RelationNotFound,
                format!("no relation registered for alias '{alias}'"),
            )),
        }
    }

    fn info_for_path(&self, path: &str) -> Result<&RelationInfo> {
        self.root_infos
            .iter()
            .find(|i| i.property == path)
            .ok_or_else(|| {
                Error::input(
                    InputErrorKind::InvalidRelationPath,
                    format!("invalid relation to property: {path}"),
                )
            })
    }

    /// Resolve a relation reference without registering it: the dotted
    /// path and its aggregated cardinality.
    pub(crate) fn relation_lookup(
        &self,
        alias: &str,
        field: &str,
    ) -> Result<(String, RelationKind)> {
        let path = self.dotted_path(alias, field)?;
        let info = self.info_for_path(&path)?;
        Ok((path, info.aggregated))
    }

    /// Register a relation referenced by a filter (non-multiplying only).
    pub(crate) fn ensure_filter_relation(
        &mut self,
        alias: &str,
        field: &str,
    ) -> Result<(String, &'static str)> {
        self.ensure_relation(alias, field, JoinPurpose::Filter)
    }

    /// Register a relation referenced by an order entry.
    pub(crate) fn ensure_order_relation(
        &mut self,
        alias: &str,
        field: &str,
    ) -> Result<(String, &'static str)> {
        self.ensure_relation(alias, field, JoinPurpose::Order)
    }

    /// Register every hop of a dotted eager-load path.
    pub(crate) fn register_includes(&mut self, includes: &[String]) -> Result<()> {
        for path in includes {
            let mut parent = self.root_alias.clone();
            for segment in path.split('.') {
                if segment.is_empty() {
                    return Err(Error::input(
                        InputErrorKind::MalformedPath,
                        format!("invalid relation path '{path}'"),
                    ));
                }
                let (alias, _) = self.ensure_relation(&parent, segment, JoinPurpose::Eager)?;
                parent = alias;
            }
        }
        Ok(())
    }

    fn ensure_relation(
        &mut self,
        parent_alias: &str,
        field: &str,
        purpose: JoinPurpose,
    ) -> Result<(String, &'static str)> {
        let path = self.dotted_path(parent_alias, field)?;

        if let Some(existing) = self.relations.iter_mut().find(|r| r.path == path) {
            if purpose == JoinPurpose::Eager && existing.strategy == JoinStrategy::Joined {
                existing.select = existing.select || !self.ignore_selects;
            }
            return Ok((existing.alias.clone(), existing.entity));
        }

        let info = self.info_for_path(&path)?;
        let aggregated = info.aggregated;
        let target = info.target;

        // A filter or order entry that needs a join through a multiplying
        // path would corrupt root-row counts; the filter compiler is
        // expected to have taken the subquery strategy before ever asking
        // for one, so this trips only on ORDER BY or on a logic bug.
        if aggregated.is_multiplying() && purpose != JoinPurpose::Eager {
            return Err(multiplying_join_error(&path, aggregated));
        }

        let parent_meta = self.entity_of_alias(parent_alias)?;
        let Some(def) = parent_meta.relation(field) else {
            return Err(Error::internal(
                InternalErrorKind::RelationNotFound,
                format!("relation metadata not found for '{path}'"),
            ));
        };
        let target_meta = self.schema.expect_entity(def.target)?;

        let alias = format!("{parent_alias}_{field}");
        let (strategy, joins) = if self.ignore_multiplying_joins && aggregated.is_multiplying() {
            (JoinStrategy::Suppressed, Vec::new())
        } else {
            (
                JoinStrategy::Joined,
                relation_joins(
                    parent_alias,
                    parent_meta.primary_key,
                    def,
                    target_meta.primary_key,
                    &alias,
                )?,
            )
        };
        let select =
            purpose == JoinPurpose::Eager && !self.ignore_selects && strategy == JoinStrategy::Joined;

        self.relations.push(RegisteredRelation {
            path,
            alias: alias.clone(),
            entity: target,
            aggregated,
            strategy,
            select,
            joins,
        });
        Ok((alias, target))
    }

    /// Record that a multiplying relation is referenced through an EXISTS
    /// subquery, so the pagination-safety rewriter sees the reference.
    pub(crate) fn note_subquery_relation(
        &mut self,
        path: String,
        alias: String,
        aggregated: RelationKind,
        entity: &'static str,
    ) {
        if self.relations.iter().any(|r| r.path == path) {
            return;
        }
        self.relations.push(RegisteredRelation {
            path,
            alias,
            entity,
            aggregated,
            strategy: JoinStrategy::Subquery,
            select: false,
            joins: Vec::new(),
        });
    }

    /// Render this context's joins as param-free SQL fragments (used for
    /// joins inside EXISTS subqueries, whose ON conditions only compare
    /// columns).
    pub(crate) fn rendered_joins(&self) -> Vec<String> {
        let mut out = Vec::new();
        for rel in &self.relations {
            for join in &rel.joins {
                let mut params = Vec::new();
                out.push(join.build(self.dialect, &mut params, 0));
                debug_assert!(params.is_empty(), "relation joins must not bind parameters");
            }
        }
        out
    }

    /// Dotted paths of multiplying relations referenced in this build.
    pub(crate) fn multiplying_paths(&self) -> Vec<String> {
        self.relations
            .iter()
            .filter(|r| r.aggregated.is_multiplying())
            .map(|r| r.path.clone())
            .collect()
    }
}

pub(crate) fn multiplying_join_error(path: &str, kind: RelationKind) -> Error {
    Error::internal(
        InternalErrorKind::MultiplyingJoin,
        format!(
            "invalid aggregated cardinality '{}' for relation '{path}': it will cause a multiplying join",
            kind.as_str()
        ),
    )
}

/// The structured pieces of an assembled query.
///
/// Kept apart (instead of one SQL string) so the two-phase plan can
/// re-assemble the full query with a primary-key restriction and without
/// pagination.
#[derive(Debug, Clone)]
pub(crate) struct QueryParts {
    pub head: String,
    pub where_sql: Option<String>,
    pub params: Vec<Value>,
    pub order_sql: Option<String>,
    pub limit_sql: Option<String>,
    pub pk_ref: String,
    pub dialect: Dialect,
}

impl QueryParts {
    /// Assemble the query as built.
    pub fn assemble(&self) -> SqlQuery {
        let mut sql = self.head.clone();
        if let Some(where_sql) = &self.where_sql {
            sql.push_str(" WHERE ");
            sql.push_str(where_sql);
        }
        if let Some(order_sql) = &self.order_sql {
            sql.push_str(order_sql);
        }
        if let Some(limit_sql) = &self.limit_sql {
            sql.push_str(limit_sql);
        }
        SqlQuery {
            sql,
            params: self.params.clone(),
        }
    }

    /// Assemble the query restricted to the given root primary keys,
    /// dropping pagination.
    pub fn assemble_with_keys(&self, ids: &[Value]) -> SqlQuery {
        let mut params = self.params.clone();
        let key_sql = if ids.is_empty() {
            "1 = 0".to_string()
        } else {
            let placeholders: Vec<String> = ids
                .iter()
                .enumerate()
                .map(|(i, _)| self.dialect.placeholder(params.len() + i + 1))
                .collect();
            format!("{} IN ({})", self.pk_ref, placeholders.join(", "))
        };
        params.extend(ids.iter().cloned());

        let mut sql = self.head.clone();
        sql.push_str(" WHERE ");
        match &self.where_sql {
            Some(where_sql) => {
                sql.push_str(&format!("({where_sql}) AND {key_sql}"));
            }
            None => sql.push_str(&key_sql),
        }
        if let Some(order_sql) = &self.order_sql {
            sql.push_str(order_sql);
        }
        SqlQuery { sql, params }
    }
}

/// Build the structured query parts for one find specification.
#[tracing::instrument(level = "trace", skip_all, fields(entity = ctx.root.name))]
pub(crate) fn build_parts(
    ctx: &mut QueryContext<'_>,
    opts: &FindOptions,
    includes: &[String],
    mode: SelectMode,
    apply_pagination: bool,
) -> Result<QueryParts> {
    let dialect = ctx.dialect();
    let root_alias = ctx.root_alias().to_string();

    ctx.register_includes(includes)?;

    let where_expr = match &opts.filter {
        Some(filter) => Some(compile_where(ctx, &root_alias, filter, 0)?),
        None => None,
    };

    let order_clauses: Vec<OrderClause> = if mode == SelectMode::Count {
        Vec::new()
    } else {
        compile_order(ctx, &root_alias, &opts.order)?
    };

    let pk_ref = format!(
        "{}.{}",
        dialect.quote_identifier(&root_alias),
        dialect.quote_identifier(ctx.root.primary_key)
    );

    let select_list = match mode {
        SelectMode::Projection => {
            let mut cols = projected_columns(dialect, &root_alias, ctx.root);
            for rel in &ctx.relations {
                if rel.select {
                    let meta = ctx.schema().expect_entity(rel.entity)?;
                    cols.extend(projected_columns(dialect, &rel.alias, meta));
                }
            }
            cols.join(", ")
        }
        SelectMode::Keys => {
            // DISTINCT requires the ORDER BY columns in the select list.
            let pk_col = format!(
                "{pk_ref} AS {root_alias}__{}",
                ctx.root.primary_key
            );
            let mut cols = vec![pk_col];
            for clause in &order_clauses {
                let aliased = format!(
                    "{}.{} AS {}__{}",
                    dialect.quote_identifier(&clause.table),
                    dialect.quote_identifier(&clause.column),
                    clause.table,
                    clause.column
                );
                let is_pk = clause.table == root_alias && clause.column == ctx.root.primary_key;
                if !is_pk && !cols.contains(&aliased) {
                    cols.push(aliased);
                }
            }
            format!("DISTINCT {}", cols.join(", "))
        }
        SelectMode::Count => "COUNT(*) AS count".to_string(),
    };

    let mut params = Vec::new();
    let mut joins_sql = String::new();
    for rel in &ctx.relations {
        for join in &rel.joins {
            joins_sql.push_str(&join.build(dialect, &mut params, 0));
        }
    }

    let head = format!(
        "SELECT {select_list} FROM {} AS {root_alias}{joins_sql}",
        dialect.quote_identifier(ctx.root.table)
    );

    let where_sql = where_expr.map(|expr| expr.build_with_dialect(dialect, &mut params, 0));

    let order_sql = if order_clauses.is_empty() {
        None
    } else {
        let rendered: Vec<String> = order_clauses.iter().map(|c| c.to_sql(dialect)).collect();
        Some(format!(" ORDER BY {}", rendered.join(", ")))
    };

    let limit_sql = match (&opts.pagination, apply_pagination) {
        (Some(p), true) => Some(format!(" LIMIT {} OFFSET {}", p.take(), p.skip())),
        _ => None,
    };

    Ok(QueryParts {
        head,
        where_sql,
        params,
        order_sql,
        limit_sql,
        pk_ref,
        dialect,
    })
}

fn projected_columns(dialect: Dialect, alias: &str, meta: &EntityMeta) -> Vec<String> {
    meta.fields
        .iter()
        .map(|f| {
            format!(
                "{}.{} AS {alias}__{}",
                dialect.quote_identifier(alias),
                dialect.quote_identifier(f.column_name),
                f.column_name
            )
        })
        .collect()
}

//! The query engine front object.
//!
//! [`QueryEngine`] owns the schema, the dialect, and the lazy per-entity
//! relation-graph cache, and exposes plan construction plus the optional
//! `Connection`-driven fetch executors. Each plan/fetch call builds its
//! own query context; nothing but the write-once relation cache is
//! shared across calls.

use crate::expr::Dialect;
use crate::graph::{RelationInfo, RelationInfoCache};
use crate::paginate::{PageInfo, Paged, QueryPlan, TwoPhasePlan};
use crate::select::{FindOptions, QueryContext, SelectMode, SqlQuery, build_parts};
use asupersync::{Cx, Outcome};
use relquery_core::{Connection, Entity, EntityMeta, Error, Result, Row, Schema, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Unwrap an `Outcome`, propagating non-success variants.
macro_rules! try_outcome {
    ($expr:expr) => {
        match $expr {
            Outcome::Ok(v) => v,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    };
}

/// Builds pagination-safe queries from find specifications.
#[derive(Debug)]
pub struct QueryEngine {
    schema: Arc<Schema>,
    dialect: Dialect,
    cache: RelationInfoCache,
}

impl QueryEngine {
    /// Create an engine over a schema, with the default dialect and
    /// relation analysis depth.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
            dialect: Dialect::default(),
            cache: RelationInfoCache::default(),
        }
    }

    /// Set the SQL dialect.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the relation analysis depth (resets the relation cache).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.cache = RelationInfoCache::new(max_depth);
        self
    }

    /// The registered schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The analyzed relation graph for an entity (computed on first use,
    /// cached afterwards).
    #[allow(clippy::result_large_err)]
    pub fn relations_info<E: Entity>(&self) -> Result<Arc<[RelationInfo]>> {
        let meta = self.meta::<E>()?;
        Ok(self.cache.get(&self.schema, meta))
    }

    fn meta<E: Entity>(&self) -> Result<&EntityMeta> {
        self.schema.expect_entity(E::ENTITY_NAME)
    }

    fn context<'s>(
        &'s self,
        meta: &'s EntityMeta,
        ignore_multiplying_joins: bool,
        ignore_selects: bool,
    ) -> QueryContext<'s> {
        QueryContext::new(
            &self.schema,
            &self.cache,
            self.dialect,
            meta,
            ignore_multiplying_joins,
            ignore_selects,
        )
    }

    /// Build the query plan for a find specification.
    ///
    /// The plan stays direct unless pagination is combined with an
    /// actual reference to a multiplying relation, in which case the
    /// two-phase rewrite applies.
    #[allow(clippy::result_large_err)]
    #[tracing::instrument(level = "trace", skip(self, opts), fields(entity = E::ENTITY_NAME))]
    pub fn plan<E: Entity>(&self, opts: &FindOptions) -> Result<QueryPlan> {
        let meta = self.meta::<E>()?;

        let infos = self.cache.get(&self.schema, meta);
        let graph_multiplying = infos.iter().any(|i| i.aggregated.is_multiplying());
        if opts.pagination.is_none() || !graph_multiplying {
            let mut ctx = self.context(meta, false, false);
            let parts = build_parts(&mut ctx, opts, &opts.include, SelectMode::Projection, true)?;
            return Ok(QueryPlan::Direct(parts.assemble()));
        }

        // Probe pass: suppress multiplying joins and selects, keep
        // pagination, and see which relations the query actually touches.
        let mut probe_ctx = self.context(meta, true, true);
        let probe_parts = build_parts(&mut probe_ctx, opts, &opts.include, SelectMode::Keys, true)?;
        let multiplying_paths = probe_ctx.multiplying_paths();
        if multiplying_paths.is_empty() {
            tracing::trace!("no multiplying relation referenced; staying direct");
            let mut ctx = self.context(meta, false, false);
            let parts = build_parts(&mut ctx, opts, &opts.include, SelectMode::Projection, true)?;
            return Ok(QueryPlan::Direct(parts.assemble()));
        }

        // Phase two re-fetches full rows by key, with every referenced
        // multiplying relation joined and selected.
        let mut full_includes = opts.include.clone();
        for path in multiplying_paths {
            if !full_includes.contains(&path) {
                full_includes.push(path);
            }
        }
        let mut full_ctx = self.context(meta, false, false);
        let full_parts = build_parts(
            &mut full_ctx,
            opts,
            &full_includes,
            SelectMode::Projection,
            false,
        )?;

        Ok(QueryPlan::TwoPhase(TwoPhasePlan::new(
            probe_parts.assemble(),
            full_parts,
        )))
    }

    /// Build the `COUNT(*)` query matching a find specification's filter.
    ///
    /// Multiplying joins are suppressed (filters reach multiplying
    /// relations through EXISTS only), so the count is a root-entity
    /// count.
    #[allow(clippy::result_large_err)]
    pub fn count_query<E: Entity>(&self, opts: &FindOptions) -> Result<SqlQuery> {
        let meta = self.meta::<E>()?;
        let mut ctx = self.context(meta, true, true);
        let parts = build_parts(&mut ctx, opts, &[], SelectMode::Count, false)?;
        Ok(parts.assemble())
    }

    /// Plan and execute a find specification, hydrating entities.
    ///
    /// Root rows are deduplicated by primary key, so eager-loaded to-many
    /// joins never duplicate results. For a two-phase plan, an empty
    /// probe short-circuits without issuing the second query.
    pub async fn fetch<E: Entity, C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        opts: &FindOptions,
    ) -> Outcome<Vec<E>, Error> {
        let meta = match self.meta::<E>() {
            Ok(meta) => meta,
            Err(e) => return Outcome::Err(e),
        };
        let root_alias = meta.name.to_lowercase();
        let key_column = format!("{root_alias}__{}", meta.primary_key);

        let plan = match self.plan::<E>(opts) {
            Ok(plan) => plan,
            Err(e) => return Outcome::Err(e),
        };

        match plan {
            QueryPlan::Direct(query) => {
                tracing::debug!(entity = meta.name, "executing direct query");
                tracing::trace!(sql = %query.sql, "direct SQL");
                let rows = try_outcome!(conn.query(cx, &query.sql, &query.params).await);
                match hydrate::<E>(&root_alias, &rows) {
                    Ok(models) => Outcome::Ok(models),
                    Err(e) => Outcome::Err(e),
                }
            }
            QueryPlan::TwoPhase(plan) => {
                tracing::debug!(entity = meta.name, "executing two-phase query");
                tracing::trace!(sql = %plan.probe.sql, "probe SQL");
                let probe_rows =
                    try_outcome!(conn.query(cx, &plan.probe.sql, &plan.probe.params).await);
                if probe_rows.is_empty() {
                    tracing::debug!(entity = meta.name, "probe matched nothing");
                    return Outcome::Ok(Vec::new());
                }
                let keys = match probe_keys(&probe_rows, &key_column) {
                    Ok(keys) => keys,
                    Err(e) => return Outcome::Err(e),
                };
                let full = plan.phase_two(&keys);
                tracing::trace!(sql = %full.sql, keys = keys.len(), "phase-two SQL");
                let rows = try_outcome!(conn.query(cx, &full.sql, &full.params).await);
                match hydrate::<E>(&root_alias, &rows) {
                    Ok(models) => Outcome::Ok(models),
                    Err(e) => Outcome::Err(e),
                }
            }
        }
    }

    /// Like [`fetch`](Self::fetch), but also issues a count query and
    /// returns the page envelope.
    pub async fn fetch_paged<E: Entity, C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        opts: &FindOptions,
    ) -> Outcome<Paged<E>, Error> {
        let count_query = match self.count_query::<E>(opts) {
            Ok(query) => query,
            Err(e) => return Outcome::Err(e),
        };
        let row = try_outcome!(conn.query_one(cx, &count_query.sql, &count_query.params).await);
        let total = row
            .as_ref()
            .and_then(|r| r.value_named("count"))
            .and_then(Value::as_i64);
        let Some(total) = total.and_then(|n| u64::try_from(n).ok()) else {
            return Outcome::Err(Error::execution("count query returned no usable row"));
        };

        let items = try_outcome!(self.fetch::<E, C>(cx, conn, opts).await);
        Outcome::Ok(Paged {
            items,
            page: PageInfo::new(total, opts.pagination.as_ref()),
        })
    }
}

fn probe_keys(rows: &[Row], key_column: &str) -> Result<Vec<Value>> {
    rows.iter()
        .map(|row| {
            row.value_named(key_column).cloned().ok_or_else(|| {
                Error::execution(format!("probe row is missing key column '{key_column}'"))
            })
        })
        .collect()
}

fn hydrate<E: Entity>(root_alias: &str, rows: &[Row]) -> Result<Vec<E>> {
    use std::hash::{Hash, Hasher};

    let mut seen = HashSet::new();
    let mut models = Vec::with_capacity(rows.len());
    for row in rows {
        let root_row = row.subset_by_prefix(root_alias);
        let model = if root_row.is_empty() {
            // Unaliased projection (raw or hand-written query).
            E::from_row(row)?
        } else {
            E::from_row(&root_row)?
        };

        let pk_hash = {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            format!("{:?}", model.primary_key_value()).hash(&mut hasher);
            hasher.finish()
        };
        if seen.insert(pk_hash) {
            models.push(model);
        }
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FieldOp, Where};
    use crate::order::OrderBy;
    use crate::clause::SortDirection;
    use crate::paginate::Pagination;
    use asupersync::runtime::RuntimeBuilder;
    use relquery_core::{
        FieldInfo, InputErrorKind, InternalErrorKind, LinkTableInfo, RelationDef, RelationKind,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // ==================== Fixtures ====================

    #[derive(Debug, Clone, PartialEq)]
    struct Invoice {
        id: i64,
        number: String,
    }

    impl Entity for Invoice {
        const ENTITY_NAME: &'static str = "invoice";
        const TABLE_NAME: &'static str = "invoices";
        const PRIMARY_KEY: &'static str = "id";
        const RELATIONS: &'static [RelationDef] = &[
            RelationDef::new(
                "details",
                "invoice_detail",
                "invoice_details",
                RelationKind::OneToMany,
            )
            .remote_key("invoice_id")
            .cascade(true),
            RelationDef::new("client", "client", "clients", RelationKind::ManyToOne)
                .local_key("client_id"),
            RelationDef::new("tags", "tag", "tags", RelationKind::ManyToMany)
                .link_table(LinkTableInfo::new("invoice_tags", "invoice_id", "tag_id")),
        ];

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("id", "id").primary_key(true),
                FieldInfo::new("number", "number"),
            ];
            FIELDS
        }

        fn from_row(row: &Row) -> Result<Self> {
            let id = row
                .value_named("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| Error::execution("missing column 'id'"))?;
            let number = row
                .value_named("number")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(Self { id, number })
        }

        fn primary_key_value(&self) -> Value {
            Value::BigInt(self.id)
        }
    }

    macro_rules! leaf_entity {
        ($ty:ident, $name:literal, $table:literal) => {
            leaf_entity!($ty, $name, $table, &[]);
        };
        ($ty:ident, $name:literal, $table:literal, $relations:expr) => {
            #[derive(Debug)]
            struct $ty;

            impl Entity for $ty {
                const ENTITY_NAME: &'static str = $name;
                const TABLE_NAME: &'static str = $table;
                const PRIMARY_KEY: &'static str = "id";
                const RELATIONS: &'static [RelationDef] = $relations;

                fn fields() -> &'static [FieldInfo] {
                    static FIELDS: &[FieldInfo] = &[FieldInfo::new("id", "id").primary_key(true)];
                    FIELDS
                }

                fn from_row(_row: &Row) -> Result<Self> {
                    Ok(Self)
                }

                fn primary_key_value(&self) -> Value {
                    Value::Null
                }
            }
        };
    }

    leaf_entity!(
        InvoiceDetail,
        "invoice_detail",
        "invoice_details",
        &[RelationDef::new("product", "product", "products", RelationKind::ManyToOne)
            .local_key("product_id")]
    );
    leaf_entity!(Product, "product", "products");
    leaf_entity!(Client, "client", "clients");
    leaf_entity!(Tag, "tag", "tags");

    fn engine() -> QueryEngine {
        let schema = Schema::builder()
            .entity::<Invoice>()
            .entity::<InvoiceDetail>()
            .entity::<Product>()
            .entity::<Client>()
            .entity::<Tag>()
            .build()
            .unwrap();
        QueryEngine::new(schema)
    }

    // ==================== Mock Connection ====================

    #[derive(Default)]
    struct MockConnection {
        responses: Mutex<VecDeque<Vec<Row>>>,
        executed: Mutex<Vec<(String, Vec<Value>)>>,
    }

    impl MockConnection {
        fn with_responses(responses: Vec<Vec<Row>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                executed: Mutex::new(Vec::new()),
            }
        }

        fn executed(&self) -> Vec<(String, Vec<Value>)> {
            self.executed.lock().unwrap().clone()
        }

        fn next_response(&self, sql: &str, params: &[Value]) -> Vec<Row> {
            self.executed
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            self.responses.lock().unwrap().pop_front().unwrap_or_default()
        }
    }

    impl Connection for MockConnection {
        fn query(
            &self,
            _cx: &Cx,
            sql: &str,
            params: &[Value],
        ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
            let rows = self.next_response(sql, params);
            async move { Outcome::Ok(rows) }
        }

        fn query_one(
            &self,
            _cx: &Cx,
            sql: &str,
            params: &[Value],
        ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
            let row = self.next_response(sql, params).into_iter().next();
            async move { Outcome::Ok(row) }
        }

        fn execute(
            &self,
            _cx: &Cx,
            sql: &str,
            params: &[Value],
        ) -> impl Future<Output = Outcome<u64, Error>> + Send {
            self.next_response(sql, params);
            async move { Outcome::Ok(0) }
        }
    }

    fn invoice_row(id: i64, number: &str) -> Row {
        Row::new(
            vec!["invoice__id".to_string(), "invoice__number".to_string()],
            vec![Value::BigInt(id), Value::Text(number.to_string())],
        )
    }

    fn probe_row(id: i64) -> Row {
        Row::new(vec!["invoice__id".to_string()], vec![Value::BigInt(id)])
    }

    // ==================== Plan Construction ====================

    #[test]
    fn test_unpaginated_stays_direct_with_multiplying_join() {
        let engine = engine();
        let opts = FindOptions::new().include("details");
        let plan = engine.plan::<Invoice>(&opts).unwrap();

        let QueryPlan::Direct(query) = plan else {
            panic!("expected direct plan");
        };
        assert!(query.sql.contains("LEFT JOIN \"invoice_details\" AS invoice_details"));
        assert!(query.sql.contains("AS invoice_details__id"));
    }

    #[test]
    fn test_paginated_without_multiplying_reference_stays_direct() {
        let engine = engine();
        let opts = FindOptions::new()
            .include("client")
            .paginate(Pagination::SkipTake { skip: 0, take: 5 });
        let plan = engine.plan::<Invoice>(&opts).unwrap();

        let QueryPlan::Direct(query) = plan else {
            panic!("expected direct plan");
        };
        assert!(query.sql.contains("LEFT JOIN \"clients\""));
        assert!(query.sql.ends_with(" LIMIT 5 OFFSET 0"));
    }

    #[test]
    fn test_paginated_multiplying_filter_builds_two_phase() {
        // E2E scenario A.
        let engine = engine();
        let opts = FindOptions::new()
            .filter(Where::new().relation(
                "details",
                Where::new().ops("product_id", [FieldOp::Eq(Value::BigInt(123))]),
            ))
            .paginate(Pagination::SkipTake { skip: 0, take: 10 });
        let plan = engine.plan::<Invoice>(&opts).unwrap();

        let QueryPlan::TwoPhase(plan) = plan else {
            panic!("expected two-phase plan");
        };

        // Probe: distinct root keys, no join on details, pagination on.
        assert!(plan.probe.sql.starts_with(
            "SELECT DISTINCT \"invoice\".\"id\" AS invoice__id FROM \"invoices\" AS invoice"
        ));
        assert!(!plan.probe.sql.contains("LEFT JOIN"));
        assert!(plan.probe.sql.contains("EXISTS (SELECT 1 FROM \"invoice_details\""));
        assert!(plan.probe.sql.ends_with(" LIMIT 10 OFFSET 0"));

        // Phase two: full fetch joining details, keyed, unpaginated.
        let full = plan.phase_two(&[Value::BigInt(1), Value::BigInt(7)]);
        assert!(full.sql.contains("LEFT JOIN \"invoice_details\" AS invoice_details"));
        assert!(full.sql.contains("AS invoice_details__id"));
        assert!(full.sql.contains("\"invoice\".\"id\" IN ($2, $3)"));
        assert!(!full.sql.contains("LIMIT"));
        assert_eq!(
            full.params,
            vec![Value::BigInt(123), Value::BigInt(1), Value::BigInt(7)]
        );
    }

    #[test]
    fn test_paginated_multiplying_include_builds_two_phase() {
        let engine = engine();
        let opts = FindOptions::new()
            .include("tags")
            .order_by(OrderBy::new().field("number", SortDirection::Asc))
            .paginate(Pagination::PageLimit { page: 2, limit: 10 });
        let plan = engine.plan::<Invoice>(&opts).unwrap();

        let QueryPlan::TwoPhase(plan) = plan else {
            panic!("expected two-phase plan");
        };
        // Probe keeps pagination (page form converted) and suppresses the
        // link-table join chain.
        assert!(!plan.probe.sql.contains("LEFT JOIN"));
        assert!(plan.probe.sql.ends_with(" LIMIT 10 OFFSET 10"));
        assert!(plan.probe.sql.contains("ORDER BY \"invoice\".\"number\" ASC"));

        let full = plan.phase_two(&[Value::BigInt(11)]);
        assert!(full.sql.contains("LEFT JOIN \"invoice_tags\" AS invoice_tags_link"));
        assert!(full.sql.contains("LEFT JOIN \"tags\" AS invoice_tags"));
        assert!(full.sql.contains("ORDER BY \"invoice\".\"number\" ASC"));
    }

    #[test]
    fn test_count_query_is_root_count() {
        let engine = engine();
        let opts = FindOptions::new()
            .filter(Where::new().relation(
                "details",
                Where::new().value("product_id", 123_i64),
            ))
            .include("details")
            .paginate(Pagination::SkipTake { skip: 0, take: 10 });
        let query = engine.count_query::<Invoice>(&opts).unwrap();

        assert!(query.sql.starts_with("SELECT COUNT(*) AS count FROM \"invoices\""));
        assert!(!query.sql.contains("LEFT JOIN"));
        assert!(query.sql.contains("EXISTS"));
        assert!(!query.sql.contains("LIMIT"));
    }

    #[test]
    fn test_deep_relation_reference_is_invalid_path() {
        // E2E scenario E: beyond the analysis depth, the path does not
        // resolve.
        let engine = engine();
        let opts = FindOptions::new().filter(Where::new().relation(
            "details",
            Where::new().relation(
                "product",
                Where::new().relation("vendor", Where::new().value("id", 1_i64)),
            ),
        ));
        let err = engine.plan::<Invoice>(&opts).unwrap_err();
        assert_eq!(err.input_kind(), Some(InputErrorKind::InvalidRelationPath));
    }

    #[test]
    fn test_filter_depth_bound_is_enforced() {
        let engine = engine();
        let mut filter = Where::new().value("number", "INV-1");
        for _ in 0..25 {
            filter = Where::new().and_where(filter);
        }
        let err = engine
            .plan::<Invoice>(&FindOptions::new().filter(filter))
            .unwrap_err();
        assert_eq!(err.internal_kind(), Some(InternalErrorKind::DepthExceeded));
    }

    #[test]
    fn test_relations_info_is_cached() {
        let engine = engine();
        let a = engine.relations_info::<Invoice>().unwrap();
        let b = engine.relations_info::<Invoice>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        // details, details.product, client, tags
        assert_eq!(a.len(), 4);
    }

    // ==================== Fetch Execution ====================

    #[test]
    fn test_fetch_direct_dedups_joined_rows() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        let engine = engine();
        // One invoice duplicated by a to-many join.
        let conn = MockConnection::with_responses(vec![vec![
            invoice_row(1, "INV-1"),
            invoice_row(1, "INV-1"),
            invoice_row(2, "INV-2"),
        ]]);

        rt.block_on(async {
            let opts = FindOptions::new().include("details");
            let invoices = match engine.fetch::<Invoice, _>(&cx, &conn, &opts).await {
                Outcome::Ok(models) => models,
                other => panic!("fetch failed: {other:?}"),
            };
            assert_eq!(
                invoices,
                vec![
                    Invoice { id: 1, number: "INV-1".to_string() },
                    Invoice { id: 2, number: "INV-2".to_string() },
                ]
            );
        });
        assert_eq!(conn.executed().len(), 1);
    }

    #[test]
    fn test_fetch_two_phase_issues_probe_then_keyed_fetch() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        let engine = engine();
        let conn = MockConnection::with_responses(vec![
            vec![probe_row(1), probe_row(7)],
            vec![
                invoice_row(1, "INV-1"),
                invoice_row(1, "INV-1"),
                invoice_row(7, "INV-7"),
            ],
        ]);

        rt.block_on(async {
            let opts = FindOptions::new()
                .include("details")
                .paginate(Pagination::SkipTake { skip: 0, take: 10 });
            let invoices = match engine.fetch::<Invoice, _>(&cx, &conn, &opts).await {
                Outcome::Ok(models) => models,
                other => panic!("fetch failed: {other:?}"),
            };
            assert_eq!(invoices.len(), 2);
        });

        let executed = conn.executed();
        assert_eq!(executed.len(), 2);
        assert!(executed[0].0.starts_with("SELECT DISTINCT"));
        assert!(executed[1].0.contains("\"invoice\".\"id\" IN ($1, $2)"));
        assert_eq!(
            executed[1].1,
            vec![Value::BigInt(1), Value::BigInt(7)]
        );
    }

    #[test]
    fn test_fetch_two_phase_empty_probe_short_circuits() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        let engine = engine();
        let conn = MockConnection::with_responses(vec![Vec::new()]);

        rt.block_on(async {
            let opts = FindOptions::new()
                .include("details")
                .paginate(Pagination::SkipTake { skip: 0, take: 10 });
            let invoices = match engine.fetch::<Invoice, _>(&cx, &conn, &opts).await {
                Outcome::Ok(models) => models,
                other => panic!("fetch failed: {other:?}"),
            };
            assert!(invoices.is_empty());
        });
        // Phase two is skipped entirely.
        assert_eq!(conn.executed().len(), 1);
    }

    #[test]
    fn test_fetch_paged_returns_clamped_window() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        let engine = engine();
        let count_row = Row::new(vec!["count".to_string()], vec![Value::BigInt(12)]);
        let conn = MockConnection::with_responses(vec![
            vec![count_row],
            vec![probe_row(11), probe_row(12)],
            vec![invoice_row(11, "INV-11"), invoice_row(12, "INV-12")],
        ]);

        rt.block_on(async {
            let opts = FindOptions::new()
                .include("details")
                .paginate(Pagination::SkipTake { skip: 10, take: 10 });
            let paged = match engine.fetch_paged::<Invoice, _>(&cx, &conn, &opts).await {
                Outcome::Ok(paged) => paged,
                other => panic!("fetch_paged failed: {other:?}"),
            };
            assert_eq!(paged.items.len(), 2);
            assert_eq!(paged.page.total, 12);
            assert_eq!(paged.page.count, 2);
            assert_eq!(paged.page.skip, 10);
        });
        assert_eq!(conn.executed().len(), 3);
    }
}

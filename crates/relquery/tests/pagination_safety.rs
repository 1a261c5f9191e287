use asupersync::runtime::RuntimeBuilder;
use asupersync::{Cx, Outcome};

use relquery::prelude::*;
use relquery::{QueryPlan, SqlQuery};
use std::collections::VecDeque;
use std::sync::Mutex;

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Invoice {
    id: i64,
    number: String,
}

impl Entity for Invoice {
    const ENTITY_NAME: &'static str = "invoice";
    const TABLE_NAME: &'static str = "invoices";
    const PRIMARY_KEY: &'static str = "id";
    const RELATIONS: &'static [RelationDef] = &[RelationDef::new(
        "details",
        "invoice_detail",
        "invoice_details",
        RelationKind::OneToMany,
    )
    .remote_key("invoice_id")
    .cascade(true)];

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

#[derive(Debug)]
struct InvoiceDetail;

impl Entity for InvoiceDetail {
    const ENTITY_NAME: &'static str = "invoice_detail";
    const TABLE_NAME: &'static str = "invoice_details";
    const PRIMARY_KEY: &'static str = "id";

    fn fields() -> &'static [FieldInfo] {
        static FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", "id").primary_key(true),
            FieldInfo::new("product_id", "product_id"),
        ];
        FIELDS
    }

    fn from_row(_row: &Row) -> Result<Self> {
        Ok(Self)
    }

    fn primary_key_value(&self) -> Value {
        Value::Null
    }
}

/// A scripted connection: hands out canned row sets in order and records
/// every statement it receives.
#[derive(Default)]
struct ScriptedConnection {
    responses: Mutex<VecDeque<Vec<Row>>>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedConnection {
    fn new(responses: Vec<Vec<Row>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            executed: Mutex::new(Vec::new()),
        }
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn next(&self, sql: &str) -> Vec<Row> {
        self.executed.lock().unwrap().push(sql.to_string());
        self.responses.lock().unwrap().pop_front().unwrap_or_default()
    }
}

impl Connection for ScriptedConnection {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        _params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let rows = self.next(sql);
        async move { Outcome::Ok(rows) }
    }

    fn query_one(
        &self,
        _cx: &Cx,
        sql: &str,
        _params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let row = self.next(sql).into_iter().next();
        async move { Outcome::Ok(row) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        _params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        self.next(sql);
        async move { Outcome::Ok(0) }
    }
}

fn engine() -> QueryEngine {
    let schema = Schema::builder()
        .entity::<Invoice>()
        .entity::<InvoiceDetail>()
        .build()
        .expect("build schema");
    QueryEngine::new(schema)
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

#[test]
fn filtering_on_a_to_many_relation_paginates_by_root_identity() {
    // Three invoices match; each has many detail rows. Page size two
    // must yield exactly two distinct invoices, fully hydrated.
    let engine = engine();

    let plan = engine
        .plan::<Invoice>(
            &FindOptions::new()
                .filter(Where::new().relation(
                    "details",
                    Where::new().value("product_id", 123_i64),
                ))
                .paginate(Pagination::SkipTake { skip: 0, take: 2 }),
        )
        .expect("plan");
    let QueryPlan::TwoPhase(two_phase) = plan else {
        panic!("expected a two-phase plan for paginated to-many filtering");
    };

    // The probe limits root keys, not joined rows.
    assert!(two_phase.probe.sql.starts_with("SELECT DISTINCT"));
    assert!(!two_phase.probe.sql.contains("LEFT JOIN"));
    assert!(two_phase.probe.sql.ends_with("LIMIT 2 OFFSET 0"));

    let SqlQuery { sql, params } = two_phase.phase_two(&[Value::BigInt(1), Value::BigInt(2)]);
    assert!(sql.contains("LEFT JOIN \"invoice_details\""));
    assert!(sql.contains("\"invoice\".\"id\" IN"));
    assert!(!sql.contains("LIMIT"));
    assert_eq!(params.len(), 3);

    // Execute the plan against a scripted store where invoice 1 has two
    // detail rows and invoice 2 has three.
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let conn = ScriptedConnection::new(vec![
        vec![probe_row(1), probe_row(2)],
        vec![
            invoice_row(1, "INV-1"),
            invoice_row(1, "INV-1"),
            invoice_row(2, "INV-2"),
            invoice_row(2, "INV-2"),
            invoice_row(2, "INV-2"),
        ],
    ]);

    let opts = FindOptions::new()
        .filter(Where::new().relation(
            "details",
            Where::new().value("product_id", 123_i64),
        ))
        .paginate(Pagination::SkipTake { skip: 0, take: 2 });

    rt.block_on(async {
        let invoices = unwrap_outcome(engine.fetch::<Invoice, _>(&cx, &conn, &opts).await);
        assert_eq!(
            invoices,
            vec![
                Invoice {
                    id: 1,
                    number: "INV-1".to_string()
                },
                Invoice {
                    id: 2,
                    number: "INV-2".to_string()
                },
            ]
        );
    });

    let executed = conn.executed();
    assert_eq!(executed.len(), 2);
    assert!(executed[0].contains("EXISTS"));
}

#[test]
fn fetch_paged_reports_root_counts() {
    let engine = engine();
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    let count_row = Row::new(vec!["count".to_string()], vec![Value::BigInt(3)]);
    let conn = ScriptedConnection::new(vec![
        vec![count_row],
        vec![probe_row(3)],
        vec![invoice_row(3, "INV-3"), invoice_row(3, "INV-3")],
    ]);

    let opts = FindOptions::new()
        .include("details")
        .paginate(Pagination::PageLimit { page: 2, limit: 2 });

    rt.block_on(async {
        let paged = unwrap_outcome(engine.fetch_paged::<Invoice, _>(&cx, &conn, &opts).await);
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.page.total, 3);
        assert_eq!(paged.page.skip, 2);
        // One root entity remains on the second page.
        assert_eq!(paged.page.count, 1);
    });
}

#[test]
fn empty_probe_skips_the_second_query() {
    let engine = engine();
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let conn = ScriptedConnection::new(vec![Vec::new()]);

    let opts = FindOptions::new()
        .include("details")
        .paginate(Pagination::SkipTake { skip: 100, take: 10 });

    rt.block_on(async {
        let invoices = unwrap_outcome(engine.fetch::<Invoice, _>(&cx, &conn, &opts).await);
        assert!(invoices.is_empty());
    });
    assert_eq!(conn.executed().len(), 1);
}

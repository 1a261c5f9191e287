//! Declarative filter trees and their compilation to predicates.
//!
//! A [`Where`] is a recursive structure: field conditions (literal
//! equality, IN lists, operator objects, or nested relation filters)
//! plus `_and`/`_or` logical composition. The compiler lowers a tree to
//! an [`Expr`] bound to concrete table aliases, resolving relation
//! references through the assembler's registry.
//!
//! Relations whose aggregated cardinality is multiplying never become
//! joins here: their sub-filters compile into correlated `EXISTS`
//! subqueries, so a filter can never multiply root rows.

use crate::expr::{Expr, ExistsSelect};
use crate::select::QueryContext;
use relquery_core::{
    Error, InputErrorKind, InternalErrorKind, RelationDef, RelationKind, Result, Value,
};

/// Safety bound on filter/order tree recursion.
///
/// Exceeding it is a fatal internal error, not a user error.
pub const MAX_RECURSIVE_DEPTH: usize = 20;

#[allow(clippy::result_large_err)]
pub(crate) fn depth_guard(context: &'static str, depth: usize) -> Result<()> {
    if depth > MAX_RECURSIVE_DEPTH {
        return Err(Error::internal(
            InternalErrorKind::DepthExceeded,
            format!("maximum recursive depth of {MAX_RECURSIVE_DEPTH} exceeded in {context}"),
        ));
    }
    Ok(())
}

/// A single field operator, translated exhaustively to its predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Eq(Value),
    Neq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Between(Value, Value),
    NotBetween(Value, Value),
    StartsWith(String),
    NotStartsWith(String),
    EndsWith(String),
    NotEndsWith(String),
    Contains(String),
    NotContains(String),
    Like(String),
    NotLike(String),
}

impl FieldOp {
    /// The wire token for this operator.
    pub const fn token(&self) -> &'static str {
        match self {
            FieldOp::Eq(_) => "_eq",
            FieldOp::Neq(_) => "_neq",
            FieldOp::Gt(_) => "_gt",
            FieldOp::Gte(_) => "_gte",
            FieldOp::Lt(_) => "_lt",
            FieldOp::Lte(_) => "_lte",
            FieldOp::In(_) => "_in",
            FieldOp::Between(..) => "_between",
            FieldOp::NotBetween(..) => "_notbetween",
            FieldOp::StartsWith(_) => "_startswith",
            FieldOp::NotStartsWith(_) => "_notstartswith",
            FieldOp::EndsWith(_) => "_endswith",
            FieldOp::NotEndsWith(_) => "_notendswith",
            FieldOp::Contains(_) => "_contains",
            FieldOp::NotContains(_) => "_notcontains",
            FieldOp::Like(_) => "_like",
            FieldOp::NotLike(_) => "_notlike",
        }
    }

    /// Translate this operator into a predicate on `column`.
    pub(crate) fn to_expr(&self, column: Expr) -> Expr {
        match self {
            FieldOp::Eq(v) => column.eq(Expr::lit(v.clone())),
            FieldOp::Neq(v) => column.ne(Expr::lit(v.clone())),
            FieldOp::Gt(v) => column.gt(Expr::lit(v.clone())),
            FieldOp::Gte(v) => column.ge(Expr::lit(v.clone())),
            FieldOp::Lt(v) => column.lt(Expr::lit(v.clone())),
            FieldOp::Lte(v) => column.le(Expr::lit(v.clone())),
            FieldOp::In(vs) => column.in_list(vs.iter().cloned().map(Expr::lit).collect()),
            FieldOp::Between(low, high) => {
                column.between(Expr::lit(low.clone()), Expr::lit(high.clone()))
            }
            FieldOp::NotBetween(low, high) => {
                column.not_between(Expr::lit(low.clone()), Expr::lit(high.clone()))
            }
            FieldOp::StartsWith(s) => column.starts_with(s),
            FieldOp::NotStartsWith(s) => column.not_starts_with(s),
            FieldOp::EndsWith(s) => column.ends_with(s),
            FieldOp::NotEndsWith(s) => column.not_ends_with(s),
            FieldOp::Contains(s) => column.contains(s),
            FieldOp::NotContains(s) => column.not_contains(s),
            FieldOp::Like(s) => column.like(s),
            FieldOp::NotLike(s) => column.not_like(s),
        }
    }
}

/// One field condition inside a [`Where`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Literal value: direct equality.
    Value(Value),
    /// Array of values: IN.
    In(Vec<Value>),
    /// Operator object: conjunction of operators on one field.
    Ops(Vec<FieldOp>),
    /// Nested filter on a related entity.
    Nested(Where),
}

/// A declarative filter tree.
///
/// Field conditions keep insertion order so generated SQL is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    fields: Vec<(String, Condition)>,
    and: Vec<Where>,
    or: Vec<Where>,
}

impl Where {
    /// Create an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a literal equality condition.
    #[must_use]
    pub fn value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .push((field.into(), Condition::Value(value.into())));
        self
    }

    /// Add an IN condition.
    #[must_use]
    pub fn any_of(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        self.fields.push((
            field.into(),
            Condition::In(values.into_iter().map(Into::into).collect()),
        ));
        self
    }

    /// Add an operator condition.
    #[must_use]
    pub fn ops(
        mut self,
        field: impl Into<String>,
        ops: impl IntoIterator<Item = FieldOp>,
    ) -> Self {
        self.fields
            .push((field.into(), Condition::Ops(ops.into_iter().collect())));
        self
    }

    /// Add a nested relation condition.
    #[must_use]
    pub fn relation(mut self, field: impl Into<String>, nested: Where) -> Self {
        self.fields
            .push((field.into(), Condition::Nested(nested)));
        self
    }

    /// Add an `_and` branch.
    #[must_use]
    pub fn and_where(mut self, nested: Where) -> Self {
        self.and.push(nested);
        self
    }

    /// Add an `_or` branch.
    #[must_use]
    pub fn or_where(mut self, nested: Where) -> Self {
        self.or.push(nested);
        self
    }

    /// Check if the filter carries no conditions at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.and.is_empty() && self.or.is_empty()
    }

    /// Parse a filter tree from JSON, as handed over by an API layer.
    ///
    /// Validation performed here: explicit `null` conditions, empty
    /// object conditions, and unrecognized `_`-prefixed operators are
    /// input errors; nesting deeper than [`MAX_RECURSIVE_DEPTH`] is an
    /// internal error.
    #[allow(clippy::result_large_err)]
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        Self::from_json_at(value, 0)
    }

    fn from_json_at(value: &serde_json::Value, depth: usize) -> Result<Self> {
        depth_guard("filter parsing", depth)?;
        let serde_json::Value::Object(map) = value else {
            return Err(Error::input(
                InputErrorKind::MalformedFilter,
                "filter must be a JSON object",
            ));
        };

        let mut out = Where::new();
        for (key, val) in map {
            match key.as_str() {
                "_and" => {
                    for branch in one_or_many(val, "_and")? {
                        out.and.push(Self::from_json_at(branch, depth + 1)?);
                    }
                }
                "_or" => {
                    for branch in one_or_many(val, "_or")? {
                        out.or.push(Self::from_json_at(branch, depth + 1)?);
                    }
                }
                field => {
                    out.fields
                        .push((field.to_string(), parse_condition(field, val, depth)?));
                }
            }
        }
        Ok(out)
    }
}

fn one_or_many<'v>(
    value: &'v serde_json::Value,
    key: &str,
) -> Result<Vec<&'v serde_json::Value>> {
    match value {
        serde_json::Value::Array(items) => Ok(items.iter().collect()),
        serde_json::Value::Object(_) => Ok(vec![value]),
        _ => Err(Error::input(
            InputErrorKind::MalformedFilter,
            format!("'{key}' must be an object or an array of objects"),
        )),
    }
}

fn parse_condition(field: &str, value: &serde_json::Value, depth: usize) -> Result<Condition> {
    match value {
        serde_json::Value::Null => Err(Error::input(
            InputErrorKind::NullCondition,
            format!("field {field} cannot be null or undefined"),
        )),
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) | serde_json::Value::String(_) => {
            Ok(Condition::Value(scalar_value(field, value)?))
        }
        serde_json::Value::Array(items) => {
            let values = items
                .iter()
                .map(|v| scalar_value(field, v))
                .collect::<Result<Vec<_>>>()?;
            Ok(Condition::In(values))
        }
        serde_json::Value::Object(map) => {
            if map.is_empty() {
                return Err(Error::input(
                    InputErrorKind::EmptyCondition,
                    format!("field {field} cannot be empty"),
                ));
            }
            if map.keys().any(|k| k.starts_with('_')) {
                let mut ops = Vec::with_capacity(map.len());
                for (op, payload) in map {
                    ops.push(parse_op(field, op, payload)?);
                }
                Ok(Condition::Ops(ops))
            } else {
                Ok(Condition::Nested(Where::from_json_at(value, depth + 1)?))
            }
        }
    }
}

fn scalar_value(field: &str, value: &serde_json::Value) -> Result<Value> {
    match value {
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::BigInt(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Double(f))
            } else {
                Err(Error::input(
                    InputErrorKind::MalformedFilter,
                    format!("field {field} has an unrepresentable number"),
                ))
            }
        }
        serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
        _ => Err(Error::input(
            InputErrorKind::MalformedFilter,
            format!("field {field} expects a scalar value"),
        )),
    }
}

fn parse_op(field: &str, op: &str, payload: &serde_json::Value) -> Result<FieldOp> {
    let scalar = |payload: &serde_json::Value| scalar_value(field, payload);
    let text = |payload: &serde_json::Value| -> Result<String> {
        payload.as_str().map(str::to_string).ok_or_else(|| {
            Error::input(
                InputErrorKind::MalformedFilter,
                format!("operator {op} on field {field} expects a string"),
            )
        })
    };
    let pair = |payload: &serde_json::Value| -> Result<(Value, Value)> {
        let serde_json::Value::Array(items) = payload else {
            return Err(Error::input(
                InputErrorKind::MalformedFilter,
                format!("operator {op} on field {field} expects a two-element array"),
            ));
        };
        if items.len() != 2 {
            return Err(Error::input(
                InputErrorKind::MalformedFilter,
                format!("operator {op} on field {field} expects a two-element array"),
            ));
        }
        Ok((scalar_value(field, &items[0])?, scalar_value(field, &items[1])?))
    };

    match op {
        "_eq" => Ok(FieldOp::Eq(scalar(payload)?)),
        "_neq" => Ok(FieldOp::Neq(scalar(payload)?)),
        "_gt" => Ok(FieldOp::Gt(scalar(payload)?)),
        "_gte" => Ok(FieldOp::Gte(scalar(payload)?)),
        "_lt" => Ok(FieldOp::Lt(scalar(payload)?)),
        "_lte" => Ok(FieldOp::Lte(scalar(payload)?)),
        "_in" => {
            let serde_json::Value::Array(items) = payload else {
                return Err(Error::input(
                    InputErrorKind::MalformedFilter,
                    format!("operator _in on field {field} expects an array"),
                ));
            };
            let values = items
                .iter()
                .map(|v| scalar_value(field, v))
                .collect::<Result<Vec<_>>>()?;
            Ok(FieldOp::In(values))
        }
        "_between" => {
            let (low, high) = pair(payload)?;
            Ok(FieldOp::Between(low, high))
        }
        "_notbetween" => {
            let (low, high) = pair(payload)?;
            Ok(FieldOp::NotBetween(low, high))
        }
        "_startswith" => Ok(FieldOp::StartsWith(text(payload)?)),
        "_notstartswith" => Ok(FieldOp::NotStartsWith(text(payload)?)),
        "_endswith" => Ok(FieldOp::EndsWith(text(payload)?)),
        "_notendswith" => Ok(FieldOp::NotEndsWith(text(payload)?)),
        "_contains" => Ok(FieldOp::Contains(text(payload)?)),
        "_notcontains" => Ok(FieldOp::NotContains(text(payload)?)),
        "_like" => Ok(FieldOp::Like(text(payload)?)),
        "_notlike" => Ok(FieldOp::NotLike(text(payload)?)),
        other => Err(Error::input(
            InputErrorKind::UnknownOperator,
            format!("unrecognized operator {other} on field {field}"),
        )),
    }
}

/// Compile a filter tree against the entity behind `alias`.
///
/// Data-key predicates and `_and` branches form one bracketed AND group;
/// `_or` branches are appended with OR.
pub(crate) fn compile_where(
    ctx: &mut QueryContext<'_>,
    alias: &str,
    filter: &Where,
    depth: usize,
) -> Result<Expr> {
    depth_guard("filter compilation", depth)?;

    let mut and_exprs: Vec<Expr> = Vec::new();
    for (field, condition) in &filter.fields {
        let column = Expr::qualified(alias, field.clone());
        match condition {
            Condition::Value(v) => and_exprs.push(column.eq(Expr::lit(v.clone()))),
            Condition::In(vs) => {
                and_exprs.push(column.in_list(vs.iter().cloned().map(Expr::lit).collect()));
            }
            Condition::Ops(ops) => {
                if ops.is_empty() {
                    return Err(Error::input(
                        InputErrorKind::NoOperator,
                        format!("field {field} has no recognized operator"),
                    ));
                }
                let folded = ops
                    .iter()
                    .map(|op| op.to_expr(Expr::qualified(alias, field.clone())))
                    .reduce(Expr::and)
                    .unwrap_or(Expr::Raw("1 = 1".to_string()));
                and_exprs.push(folded);
            }
            Condition::Nested(nested) => {
                if nested.is_empty() {
                    return Err(Error::input(
                        InputErrorKind::EmptyCondition,
                        format!("field {field} cannot be empty"),
                    ));
                }
                and_exprs.push(compile_relation(ctx, alias, field, nested, depth)?);
            }
        }
    }

    for branch in &filter.and {
        and_exprs.push(compile_where(ctx, alias, branch, depth + 1)?);
    }

    let and_group = and_exprs.into_iter().reduce(Expr::and).map(Expr::paren);

    let mut result = and_group;
    for branch in &filter.or {
        let compiled = compile_where(ctx, alias, branch, depth + 1)?.paren();
        result = Some(match result {
            Some(acc) => acc.or(compiled),
            None => compiled,
        });
    }

    result.ok_or_else(|| {
        Error::input(InputErrorKind::EmptyCondition, "filter cannot be empty")
    })
}

/// Compile a nested relation condition.
///
/// Non-multiplying paths resolve an alias through the join registry and
/// recurse; multiplying paths compile to a correlated EXISTS subquery so
/// no multiplying join is ever emitted for a filter.
fn compile_relation(
    ctx: &mut QueryContext<'_>,
    alias: &str,
    field: &str,
    nested: &Where,
    depth: usize,
) -> Result<Expr> {
    let (path, aggregated) = ctx.relation_lookup(alias, field)?;

    if !aggregated.is_multiplying() {
        let (joined_alias, _target) = ctx.ensure_filter_relation(alias, field)?;
        return compile_where(ctx, &joined_alias, nested, depth + 1);
    }

    let parent_meta = ctx.entity_of_alias(alias)?;
    let Some(def) = parent_meta.relation(field) else {
        return Err(Error::internal(
            InternalErrorKind::RelationNotFound,
            format!("relation metadata not found for '{path}'"),
        ));
    };
    let parent_pk = parent_meta.primary_key;
    let child_alias = format!("{alias}_{field}");

    let mut sub = ctx.subcontext(def.target, &child_alias)?;
    let nested_expr = compile_where(&mut sub, &child_alias, nested, depth + 1)?;
    let sub_joins = sub.rendered_joins();

    let exists = exists_select(
        ctx,
        alias,
        parent_pk,
        def,
        &child_alias,
        sub_joins,
        nested_expr,
    )?;
    ctx.note_subquery_relation(path, child_alias, aggregated, def.target);
    Ok(Expr::exists(exists))
}

#[allow(clippy::result_large_err)]
fn exists_select(
    ctx: &QueryContext<'_>,
    parent_alias: &str,
    parent_pk: &str,
    def: &'static RelationDef,
    child_alias: &str,
    mut sub_joins: Vec<String>,
    nested_expr: Expr,
) -> Result<ExistsSelect> {
    let dialect = ctx.dialect();
    let child_meta = ctx.schema().expect_entity(def.target)?;
    let child_table = dialect.quote_identifier(child_meta.table);

    let (from, correlation) = match def.kind {
        RelationKind::OneToMany => {
            let fk = def.remote_key.unwrap_or("id");
            (
                format!("{child_table} AS {child_alias}"),
                Expr::qualified(child_alias, fk)
                    .eq(Expr::qualified(parent_alias, parent_pk)),
            )
        }
        RelationKind::ManyToMany => {
            let Some(link) = def.link_table else {
                return Err(Error::internal(
                    InternalErrorKind::RelationNotFound,
                    format!(
                        "relation '{}' is many-to-many but carries no link table",
                        def.name
                    ),
                ));
            };
            let link_alias = format!("{child_alias}_link");
            let link_table = dialect.quote_identifier(link.table_name);
            sub_joins.insert(
                0,
                format!(
                    " LEFT JOIN {child_table} AS {child_alias} ON {}.{} = {}.{}",
                    dialect.quote_identifier(&link_alias),
                    dialect.quote_identifier(link.remote_column),
                    dialect.quote_identifier(child_alias),
                    dialect.quote_identifier(child_meta.primary_key),
                ),
            );
            (
                format!("{link_table} AS {link_alias}"),
                Expr::qualified(link_alias, link.local_column)
                    .eq(Expr::qualified(parent_alias, parent_pk)),
            )
        }
        RelationKind::ManyToOne | RelationKind::OneToOne => {
            // Reachable only when an earlier hop made the aggregate
            // multiplying; correlate on the owning key.
            let fk = def.local_key.unwrap_or("id");
            (
                format!("{child_table} AS {child_alias}"),
                Expr::qualified(child_alias, child_meta.primary_key)
                    .eq(Expr::qualified(parent_alias, fk)),
            )
        }
    };

    Ok(ExistsSelect {
        from,
        joins: sub_joins,
        condition: correlation.and(nested_expr),
    })
}

//! Declarative ordering trees and their compilation.
//!
//! An [`OrderBy`] maps fields to a direction or to a nested ordering on
//! a related entity. Ordering requires a single deterministic value per
//! root row, so ordering through a multiplying relation is always
//! rejected; there is no subquery rewrite for ORDER BY.

use crate::clause::{OrderClause, SortDirection};
use crate::filter::depth_guard;
use crate::select::QueryContext;
use relquery_core::{Error, InputErrorKind, Result};

/// One entry in an ordering tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEntry {
    /// Order by a direct field.
    Dir(SortDirection),
    /// Order by fields of a related entity.
    Nested(OrderBy),
}

/// A declarative ordering tree.
///
/// Entries keep insertion order; an array of trees applies multiple
/// independent order clauses in sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    entries: Vec<(String, OrderEntry)>,
}

impl OrderBy {
    /// Create an empty ordering.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Order by a direct field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, direction: SortDirection) -> Self {
        self.entries
            .push((name.into(), OrderEntry::Dir(direction)));
        self
    }

    /// Order by fields of a related entity.
    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, nested: OrderBy) -> Self {
        self.entries
            .push((name.into(), OrderEntry::Nested(nested)));
        self
    }

    /// Check if the ordering carries no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse order trees from JSON: a single object or an array of
    /// objects (array = independent clauses applied in sequence).
    #[allow(clippy::result_large_err)]
    pub fn from_json(value: &serde_json::Value) -> Result<Vec<Self>> {
        match value {
            serde_json::Value::Array(items) => {
                items.iter().map(|v| Self::parse_one(v, 0)).collect()
            }
            serde_json::Value::Object(_) => Ok(vec![Self::parse_one(value, 0)?]),
            _ => Err(Error::input(
                InputErrorKind::MalformedFilter,
                "order must be an object or an array of objects",
            )),
        }
    }

    fn parse_one(value: &serde_json::Value, depth: usize) -> Result<Self> {
        depth_guard("order parsing", depth)?;
        let serde_json::Value::Object(map) = value else {
            return Err(Error::input(
                InputErrorKind::MalformedFilter,
                "order entry must be an object",
            ));
        };
        let mut out = OrderBy::new();
        for (field, val) in map {
            match val {
                serde_json::Value::String(token) => {
                    out.entries.push((
                        field.clone(),
                        OrderEntry::Dir(SortDirection::parse(token)?),
                    ));
                }
                serde_json::Value::Object(_) => {
                    out.entries.push((
                        field.clone(),
                        OrderEntry::Nested(Self::parse_one(val, depth + 1)?),
                    ));
                }
                _ => {
                    return Err(Error::input(
                        InputErrorKind::MalformedFilter,
                        format!("order entry for field {field} must be a direction or an object"),
                    ));
                }
            }
        }
        Ok(out)
    }
}

/// Compile ordering trees into resolved clauses, registering relation
/// joins along the way.
pub(crate) fn compile_order(
    ctx: &mut QueryContext<'_>,
    alias: &str,
    orders: &[OrderBy],
) -> Result<Vec<OrderClause>> {
    let mut out = Vec::new();
    for order in orders {
        compile_one(ctx, alias, order, 0, &mut out)?;
    }
    Ok(out)
}

fn compile_one(
    ctx: &mut QueryContext<'_>,
    alias: &str,
    order: &OrderBy,
    depth: usize,
    out: &mut Vec<OrderClause>,
) -> Result<()> {
    depth_guard("order compilation", depth)?;
    for (field, entry) in &order.entries {
        match entry {
            OrderEntry::Dir(direction) => {
                out.push(OrderClause::new(alias, field.clone(), *direction));
            }
            OrderEntry::Nested(nested) => {
                let (joined_alias, _target) = ctx.ensure_order_relation(alias, field)?;
                compile_one(ctx, &joined_alias, nested, depth + 1, out)?;
            }
        }
    }
    Ok(())
}

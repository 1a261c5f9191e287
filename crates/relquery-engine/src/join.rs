//! JOIN clause construction.
//!
//! The engine only ever emits LEFT joins: metadata/filter joins and
//! eager-load joins alike must not drop root rows.

use crate::expr::{Dialect, Expr};
use relquery_core::{Error, InternalErrorKind, RelationDef, RelationKind, Result, Value};

/// A LEFT JOIN clause bound to an alias.
#[derive(Debug, Clone)]
pub struct Join {
    /// Table to join.
    pub table: String,
    /// Alias assigned to the joined table.
    pub alias: String,
    /// ON condition.
    pub on: Expr,
}

impl Join {
    /// Create a LEFT JOIN.
    pub fn left(table: impl Into<String>, alias: impl Into<String>, on: Expr) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            on,
        }
    }

    /// Generate SQL for this JOIN clause and collect parameters.
    pub fn build(&self, dialect: Dialect, params: &mut Vec<Value>, offset: usize) -> String {
        let on_sql = self.on.build_with_dialect(dialect, params, offset);
        format!(
            " LEFT JOIN {} AS {} ON {}",
            dialect.quote_identifier(&self.table),
            self.alias,
            on_sql
        )
    }
}

/// Build the join chain for one relation hop.
///
/// `parent_alias`/`parent_pk` identify the already-joined (or root) side;
/// `alias` is the alias assigned to the target table. Many-to-many
/// relations produce two joins through the link table, aliased
/// `{alias}_link`.
#[allow(clippy::result_large_err)]
pub fn relation_joins(
    parent_alias: &str,
    parent_pk: &str,
    def: &RelationDef,
    target_pk: &str,
    alias: &str,
) -> Result<Vec<Join>> {
    let owning = |local_key: &str| {
        vec![Join::left(
            def.target_table,
            alias,
            Expr::qualified(parent_alias, local_key).eq(Expr::qualified(alias, target_pk)),
        )]
    };
    let inverse = |remote_key: &str| {
        vec![Join::left(
            def.target_table,
            alias,
            Expr::qualified(alias, remote_key).eq(Expr::qualified(parent_alias, parent_pk)),
        )]
    };

    match def.kind {
        RelationKind::ManyToOne => Ok(owning(def.local_key.unwrap_or("id"))),
        RelationKind::OneToOne => {
            if let Some(local) = def.local_key {
                Ok(owning(local))
            } else if let Some(remote) = def.remote_key {
                Ok(inverse(remote))
            } else {
                Ok(owning("id"))
            }
        }
        RelationKind::OneToMany => Ok(inverse(def.remote_key.unwrap_or("id"))),
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
            let link_alias = format!("{alias}_link");
            Ok(vec![
                Join::left(
                    link.table_name,
                    link_alias.clone(),
                    Expr::qualified(parent_alias, parent_pk)
                        .eq(Expr::qualified(link_alias.clone(), link.local_column)),
                ),
                Join::left(
                    def.target_table,
                    alias,
                    Expr::qualified(link_alias, link.remote_column)
                        .eq(Expr::qualified(alias, target_pk)),
                ),
            ])
        }
    }
}

//! SQL clause types (ORDER BY, LIMIT, OFFSET).

use crate::expr::Dialect;
use relquery_core::{Error, InputErrorKind, Result};

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Get the SQL keyword for this direction.
    pub const fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Parse a direction token (case-insensitive `ASC`/`DESC`).
    #[allow(clippy::result_large_err)]
    pub fn parse(token: &str) -> Result<Self> {
        match token.to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            _ => Err(Error::input(
                InputErrorKind::MalformedFilter,
                format!("invalid sort direction '{token}'"),
            )),
        }
    }
}

/// One resolved ORDER BY clause bound to a table alias.
#[derive(Debug, Clone)]
pub struct OrderClause {
    /// Table alias the column lives on.
    pub table: String,
    /// Column name.
    pub column: String,
    /// Sort direction.
    pub direction: SortDirection,
}

impl OrderClause {
    /// Create a new order clause.
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        direction: SortDirection,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            direction,
        }
    }

    /// Generate SQL for this clause.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        format!(
            "{}.{} {}",
            dialect.quote_identifier(&self.table),
            dialect.quote_identifier(&self.column),
            self.direction.as_str()
        )
    }
}

//! Entity trait and field metadata.
//!
//! The `Entity` trait is the contract between an external ORM/mapping
//! layer and the query engine: it exposes the static metadata (table,
//! primary key, columns, relations) the engine needs to analyze relation
//! graphs and assemble SQL, plus row hydration.

use crate::Result;
use crate::relation::RelationDef;
use crate::row::Row;
use crate::value::Value;

/// Metadata about an entity field/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Database column name (may differ from field name)
    pub column_name: &'static str,
    /// Whether this field is nullable
    pub nullable: bool,
    /// Whether this is the primary key
    pub primary_key: bool,
}

impl FieldInfo {
    /// Create a new field definition.
    #[must_use]
    pub const fn new(name: &'static str, column_name: &'static str) -> Self {
        Self {
            name,
            column_name,
            nullable: false,
            primary_key: false,
        }
    }

    /// Mark the field nullable.
    #[must_use]
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Mark the field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }
}

/// Trait for types that can be queried through the engine.
///
/// Typically implemented by an external mapping layer or a derive macro;
/// the engine only ever reads the static metadata and calls `from_row`.
///
/// # Example
///
/// ```ignore
/// struct Invoice {
///     id: i64,
///     number: String,
/// }
///
/// impl Entity for Invoice {
///     const ENTITY_NAME: &'static str = "invoice";
///     const TABLE_NAME: &'static str = "invoices";
///     const PRIMARY_KEY: &'static str = "id";
///     const RELATIONS: &'static [RelationDef] = &[RelationDef::new(
///         "details",
///         "invoice_detail",
///         "invoice_details",
///         RelationKind::OneToMany,
///     )
///     .remote_key("invoice_id")];
///     // ...
/// }
/// ```
pub trait Entity: Sized + Send + Sync {
    /// The entity name used in relation metadata and as the root alias.
    const ENTITY_NAME: &'static str;

    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The primary key column name.
    const PRIMARY_KEY: &'static str;

    /// Relation metadata for this entity.
    ///
    /// Entities with no relations can rely on the default empty slice.
    const RELATIONS: &'static [RelationDef] = &[];

    /// Get field metadata for all columns.
    fn fields() -> &'static [FieldInfo];

    /// Construct an entity instance from a database row.
    #[allow(clippy::result_large_err)]
    fn from_row(row: &Row) -> Result<Self>;

    /// Get the value of the primary key field.
    fn primary_key_value(&self) -> Value;
}

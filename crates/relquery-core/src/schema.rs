//! Explicit entity registry.
//!
//! The engine never reaches into ambient/global metadata: every entity
//! that can appear in a query (as root or as a relation target) is
//! registered into a [`Schema`] at startup, and the schema is passed to
//! the engine by value. After `build()` the schema is immutable and safe
//! to share across threads.

use crate::entity::{Entity, FieldInfo};
use crate::error::{Error, InternalErrorKind, Result};
use crate::relation::RelationDef;
use std::collections::HashMap;

/// Registered metadata for one entity.
#[derive(Debug, Clone, Copy)]
pub struct EntityMeta {
    /// Entity name (relation targets refer to this).
    pub name: &'static str,
    /// Database table name.
    pub table: &'static str,
    /// Primary key column.
    pub primary_key: &'static str,
    /// Relation descriptors.
    pub relations: &'static [RelationDef],
    /// Column descriptors.
    pub fields: &'static [FieldInfo],
}

impl EntityMeta {
    /// Look up a relation by property name.
    pub fn relation(&self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// An immutable registry of entity metadata, keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: HashMap<&'static str, EntityMeta>,
}

impl Schema {
    /// Start building a schema.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Look up an entity by name.
    pub fn entity(&self, name: &str) -> Option<&EntityMeta> {
        self.entities.get(name)
    }

    /// Look up an entity by name, erroring if absent.
    #[allow(clippy::result_large_err)]
    pub fn expect_entity(&self, name: &str) -> Result<&EntityMeta> {
        self.entity(name).ok_or_else(|| {
            Error::internal(
                InternalErrorKind::UnknownEntity,
                format!("entity '{name}' is not registered in the schema"),
            )
        })
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if no entities are registered.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Check whether an entity is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }
}

/// Builder for [`Schema`].
///
/// Relations pointing at entities that are never registered are tolerated
/// here; they surface as path-resolution errors at query time instead.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: HashMap<&'static str, EntityMeta>,
    duplicate: Option<&'static str>,
}

impl SchemaBuilder {
    /// Register an entity type.
    #[must_use]
    pub fn entity<E: Entity>(mut self) -> Self {
        let meta = EntityMeta {
            name: E::ENTITY_NAME,
            table: E::TABLE_NAME,
            primary_key: E::PRIMARY_KEY,
            relations: E::RELATIONS,
            fields: E::fields(),
        };
        if self.entities.insert(E::ENTITY_NAME, meta).is_some() {
            self.duplicate = Some(E::ENTITY_NAME);
        }
        self
    }

    /// Finalize the schema.
    #[allow(clippy::result_large_err)]
    pub fn build(self) -> Result<Schema> {
        if let Some(name) = self.duplicate {
            return Err(Error::config(format!(
                "entity '{name}' registered more than once"
            )));
        }
        Ok(Schema {
            entities: self.entities,
        })
    }
}

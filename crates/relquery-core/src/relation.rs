//! Relation metadata.
//!
//! Relations are defined at compile time as static metadata on each
//! [`Entity`](crate::Entity). Higher layers (the relation graph analyzer,
//! filter compiler, and query assembler) consume these descriptors to
//! generate correct SQL without runtime reflection.

/// The cardinality of a relation between two entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// One-to-one: `Invoice` has one `Summary`.
    OneToOne,
    /// Many-to-one: many `Invoice`s belong to one `Client`.
    #[default]
    ManyToOne,
    /// One-to-many: one `Invoice` has many `InvoiceDetail`s.
    OneToMany,
    /// Many-to-many: `Invoice`s have many `Tag`s via a link table.
    ManyToMany,
}

impl RelationKind {
    /// Get a human-readable label for this cardinality.
    pub const fn as_str(self) -> &'static str {
        match self {
            RelationKind::OneToOne => "one-to-one",
            RelationKind::ManyToOne => "many-to-one",
            RelationKind::OneToMany => "one-to-many",
            RelationKind::ManyToMany => "many-to-many",
        }
    }

    /// Can traversing a relation of this cardinality multiply the root
    /// entity's row count when joined?
    pub const fn is_multiplying(self) -> bool {
        matches!(self, RelationKind::OneToMany | RelationKind::ManyToMany)
    }

    /// Compose this cardinality with the next hop's cardinality.
    ///
    /// The result is the aggregated one/many-ness of the full path and
    /// decides whether traversing it can duplicate root rows. One-to-one
    /// is cardinality-neutral; many-to-many absorbs; a one-to-many
    /// followed by a many-to-one is the classic bridge-table pattern and
    /// composes to many-to-many.
    ///
    /// The match is exhaustive over all sixteen pairs, so there is no
    /// fallback branch for malformed input.
    pub const fn combine(self, next: RelationKind) -> RelationKind {
        use RelationKind::{ManyToMany, ManyToOne, OneToMany, OneToOne};
        match (self, next) {
            (OneToOne, other) | (other, OneToOne) => other,
            (ManyToMany, _) | (_, ManyToMany) => ManyToMany,
            (OneToMany, ManyToOne) | (ManyToOne, OneToMany) => ManyToMany,
            (OneToMany, OneToMany) => OneToMany,
            (ManyToOne, ManyToOne) => ManyToOne,
        }
    }
}

/// Information about a link/join table for many-to-many relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTableInfo {
    /// The link table name (e.g., `"invoice_tags"`).
    pub table_name: &'static str,

    /// Column in the link table pointing to the local entity
    /// (e.g., `"invoice_id"`).
    pub local_column: &'static str,

    /// Column in the link table pointing to the remote entity
    /// (e.g., `"tag_id"`).
    pub remote_column: &'static str,
}

impl LinkTableInfo {
    /// Create a new link-table definition.
    #[must_use]
    pub const fn new(
        table_name: &'static str,
        local_column: &'static str,
        remote_column: &'static str,
    ) -> Self {
        Self {
            table_name,
            local_column,
            remote_column,
        }
    }
}

/// Metadata about a relation between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDef {
    /// Name of the relation property.
    pub name: &'static str,

    /// The related entity's name.
    pub target: &'static str,

    /// The related entity's table name.
    pub target_table: &'static str,

    /// Cardinality of this relation.
    pub kind: RelationKind,

    /// Local foreign key column (for ManyToOne / owning OneToOne).
    /// e.g., `"client_id"` on `Invoice`.
    pub local_key: Option<&'static str>,

    /// Remote foreign key column (for OneToMany / inverse OneToOne).
    /// e.g., `"invoice_id"` on `InvoiceDetail` when accessed from `Invoice`.
    pub remote_key: Option<&'static str>,

    /// Link table for ManyToMany relations.
    pub link_table: Option<LinkTableInfo>,

    /// Whether the relation column is nullable.
    pub nullable: bool,

    /// Whether deletes cascade along this relation.
    pub cascade: bool,

    /// Whether the relation is loaded eagerly by default.
    pub eager: bool,

    /// Whether the relation is loaded lazily.
    pub lazy: bool,
}

impl RelationDef {
    /// Create a new relation with required fields.
    #[must_use]
    pub const fn new(
        name: &'static str,
        target: &'static str,
        target_table: &'static str,
        kind: RelationKind,
    ) -> Self {
        Self {
            name,
            target,
            target_table,
            kind,
            local_key: None,
            remote_key: None,
            link_table: None,
            nullable: false,
            cascade: false,
            eager: false,
            lazy: false,
        }
    }

    /// Set the local foreign key column (ManyToOne / owning OneToOne).
    #[must_use]
    pub const fn local_key(mut self, key: &'static str) -> Self {
        self.local_key = Some(key);
        self
    }

    /// Set the remote foreign key column (OneToMany / inverse OneToOne).
    #[must_use]
    pub const fn remote_key(mut self, key: &'static str) -> Self {
        self.remote_key = Some(key);
        self
    }

    /// Set the link table metadata (ManyToMany).
    #[must_use]
    pub const fn link_table(mut self, info: LinkTableInfo) -> Self {
        self.link_table = Some(info);
        self
    }

    /// Mark the relation column nullable.
    #[must_use]
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Enable/disable cascade delete behavior.
    #[must_use]
    pub const fn cascade(mut self, value: bool) -> Self {
        self.cascade = value;
        self
    }

    /// Mark the relation eagerly loaded by default.
    #[must_use]
    pub const fn eager(mut self, value: bool) -> Self {
        self.eager = value;
        self
    }

    /// Mark the relation lazily loaded.
    #[must_use]
    pub const fn lazy(mut self, value: bool) -> Self {
        self.lazy = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RelationKind::{ManyToMany, ManyToOne, OneToMany, OneToOne};

    #[test]
    fn test_is_multiplying() {
        assert!(!OneToOne.is_multiplying());
        assert!(!ManyToOne.is_multiplying());
        assert!(OneToMany.is_multiplying());
        assert!(ManyToMany.is_multiplying());
    }

    #[test]
    fn test_combine_one_to_one_is_neutral() {
        for kind in [OneToOne, ManyToOne, OneToMany, ManyToMany] {
            assert_eq!(OneToOne.combine(kind), kind);
            assert_eq!(kind.combine(OneToOne), kind);
        }
    }

    #[test]
    fn test_combine_many_to_many_absorbs() {
        for kind in [OneToOne, ManyToOne, OneToMany, ManyToMany] {
            if kind == OneToOne {
                continue;
            }
            assert_eq!(ManyToMany.combine(kind), ManyToMany);
            assert_eq!(kind.combine(ManyToMany), ManyToMany);
        }
    }

    #[test]
    fn test_combine_full_table() {
        // The complete sixteen-pair table.
        let table = [
            (OneToOne, OneToOne, OneToOne),
            (OneToOne, ManyToOne, ManyToOne),
            (OneToOne, OneToMany, OneToMany),
            (OneToOne, ManyToMany, ManyToMany),
            (ManyToOne, OneToOne, ManyToOne),
            (ManyToOne, ManyToOne, ManyToOne),
            (ManyToOne, OneToMany, ManyToMany),
            (ManyToOne, ManyToMany, ManyToMany),
            (OneToMany, OneToOne, OneToMany),
            (OneToMany, ManyToOne, ManyToMany),
            (OneToMany, OneToMany, OneToMany),
            (OneToMany, ManyToMany, ManyToMany),
            (ManyToMany, OneToOne, ManyToMany),
            (ManyToMany, ManyToOne, ManyToMany),
            (ManyToMany, OneToMany, ManyToMany),
            (ManyToMany, ManyToMany, ManyToMany),
        ];
        for (from, to, expected) in table {
            assert_eq!(
                from.combine(to),
                expected,
                "combine({}, {})",
                from.as_str(),
                to.as_str()
            );
        }
    }

    #[test]
    fn test_relation_def_builder() {
        const REL: RelationDef = RelationDef::new(
            "details",
            "invoice_detail",
            "invoice_details",
            RelationKind::OneToMany,
        )
        .remote_key("invoice_id")
        .cascade(true);

        assert_eq!(REL.name, "details");
        assert_eq!(REL.remote_key, Some("invoice_id"));
        assert!(REL.cascade);
        assert!(!REL.nullable);
        assert_eq!(REL.link_table, None);
    }

    #[test]
    fn test_link_table_builder() {
        const REL: RelationDef =
            RelationDef::new("tags", "tag", "tags", RelationKind::ManyToMany)
                .link_table(LinkTableInfo::new("invoice_tags", "invoice_id", "tag_id"));
        let link = REL.link_table.unwrap();
        assert_eq!(link.table_name, "invoice_tags");
        assert_eq!(link.local_column, "invoice_id");
        assert_eq!(link.remote_column, "tag_id");
    }
}

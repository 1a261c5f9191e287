//! Relation graph analysis.
//!
//! Given an entity's relational metadata, computes direct and "extended"
//! (multi-hop) relation paths up to a bounded depth, tracking the
//! aggregated cardinality along each path. The output is what the filter
//! compiler and query assembler validate relation references against.

use relquery_core::{EntityMeta, RelationDef, RelationKind, Schema};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Default bound on relation path length.
///
/// Depth is a safety bound, not a correctness requirement: relations
/// beyond it are simply invisible to filtering and ordering.
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// One entity/property step along a relation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSegment {
    /// Entity the property lives on.
    pub entity: &'static str,
    /// Relation property name.
    pub property: &'static str,
}

/// One analyzed relation path from a root entity.
#[derive(Debug, Clone)]
pub struct RelationInfo {
    /// Dotted property path from the root (e.g. `"client.posts"`).
    pub property: String,
    /// Cardinality of the final hop.
    pub kind: RelationKind,
    /// Composed cardinality along the full path from the root.
    pub aggregated: RelationKind,
    /// Target entity name.
    pub target: &'static str,
    /// Target entity table.
    pub target_table: &'static str,
    /// Entity/property steps from root to target.
    pub path: Vec<PathSegment>,
    /// The relation descriptors traversed, in order.
    pub hops: Vec<&'static RelationDef>,
    /// Nullability of the final hop.
    pub nullable: bool,
    /// Cascade flag of the final hop.
    pub cascade: bool,
    /// Eager flag of the final hop.
    pub eager: bool,
    /// Lazy flag of the final hop.
    pub lazy: bool,
    /// True if this path required traversing more than one hop.
    pub extended: bool,
}

impl RelationInfo {
    /// The descriptor of the final hop.
    pub fn last_hop(&self) -> Option<&'static RelationDef> {
        self.hops.last().copied()
    }
}

/// Analyze an entity's relation graph up to `max_depth` hops.
#[tracing::instrument(level = "trace", skip(schema, root), fields(entity = root.name))]
pub fn relations_info(schema: &Schema, root: &EntityMeta, max_depth: usize) -> Vec<RelationInfo> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut visited = vec![root.name];
    let mut path = Vec::new();
    let mut hops = Vec::new();
    walk(
        schema, root, "", &mut visited, None, &mut path, &mut hops, 0, max_depth, &mut seen,
        &mut out,
    );
    tracing::trace!(relations = out.len(), "relation graph analyzed");
    out
}

#[allow(clippy::too_many_arguments)]
fn walk(
    schema: &Schema,
    meta: &EntityMeta,
    prefix: &str,
    visited: &mut Vec<&'static str>,
    running: Option<RelationKind>,
    path: &mut Vec<PathSegment>,
    hops: &mut Vec<&'static RelationDef>,
    depth: usize,
    max_depth: usize,
    seen: &mut HashSet<String>,
    out: &mut Vec<RelationInfo>,
) {
    if depth >= max_depth {
        return;
    }
    for rel in meta.relations {
        // Direct relations are always enumerated; extended hops skip any
        // target already on this branch (cycle cut is per-branch, so the
        // same entity can still appear on unrelated branches).
        let extended = depth > 0;
        if extended && visited.iter().any(|&e| e == rel.target) {
            continue;
        }

        let aggregated = match running {
            Some(r) => r.combine(rel.kind),
            None => rel.kind,
        };
        let property = if prefix.is_empty() {
            rel.name.to_string()
        } else {
            format!("{prefix}.{}", rel.name)
        };

        // Metadata can expose the same relation twice; dedupe on the
        // path-string key.
        let key = format!("{property}->{}", rel.target);
        if !seen.insert(key) {
            continue;
        }

        path.push(PathSegment {
            entity: meta.name,
            property: rel.name,
        });
        hops.push(rel);

        out.push(RelationInfo {
            property: property.clone(),
            kind: rel.kind,
            aggregated,
            target: rel.target,
            target_table: rel.target_table,
            path: path.clone(),
            hops: hops.clone(),
            nullable: rel.nullable,
            cascade: rel.cascade,
            eager: rel.eager,
            lazy: rel.lazy,
            extended,
        });

        let cycles = visited.iter().any(|&e| e == rel.target);
        if !cycles {
            if let Some(target_meta) = schema.entity(rel.target) {
                visited.push(rel.target);
                walk(
                    schema,
                    target_meta,
                    &property,
                    visited,
                    Some(aggregated),
                    path,
                    hops,
                    depth + 1,
                    max_depth,
                    seen,
                    out,
                );
                visited.pop();
            }
        }

        hops.pop();
        path.pop();
    }
}

/// Lazy per-entity cache of analyzed relation graphs.
///
/// Computed on first access and treated as immutable afterwards; the
/// analysis is idempotent, so racing writers at worst recompute the same
/// value.
#[derive(Debug)]
pub struct RelationInfoCache {
    max_depth: usize,
    map: RwLock<HashMap<&'static str, Arc<[RelationInfo]>>>,
}

impl RelationInfoCache {
    /// Create a cache analyzing up to `max_depth` hops.
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            map: RwLock::new(HashMap::new()),
        }
    }

    /// The configured analysis depth.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Get (computing if needed) the relation infos for an entity.
    pub fn get(&self, schema: &Schema, meta: &EntityMeta) -> Arc<[RelationInfo]> {
        if let Ok(map) = self.map.read() {
            if let Some(infos) = map.get(meta.name) {
                return Arc::clone(infos);
            }
        }
        let computed: Arc<[RelationInfo]> = relations_info(schema, meta, self.max_depth).into();
        if let Ok(mut map) = self.map.write() {
            return Arc::clone(map.entry(meta.name).or_insert(computed));
        }
        computed
    }
}

impl Default for RelationInfoCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

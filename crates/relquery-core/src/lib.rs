//! Core types and traits for relquery.
//!
//! This crate provides the foundational abstractions for relation-aware
//! query construction:
//!
//! - `Entity` trait and static relation metadata
//! - `Schema` registry built explicitly at startup
//! - `Value`/`Row` for parameter binding and result fetching
//! - `Connection` trait for executing produced queries
//! - the error taxonomy separating caller input errors from invariant
//!   violations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod entity;
pub mod error;
pub mod relation;
pub mod row;
pub mod schema;
pub mod value;

pub use connection::Connection;
pub use entity::{Entity, FieldInfo};
pub use error::{
    ConfigError, Error, ExecutionError, InputError, InputErrorKind, InternalError,
    InternalErrorKind, Result,
};
pub use relation::{LinkTableInfo, RelationDef, RelationKind};
pub use row::{ColumnInfo, Row};
pub use schema::{EntityMeta, Schema, SchemaBuilder};
pub use value::Value;

//! Foreign-key dependency resolution for relational schemas.
//!
//! - [`schema`]: FK model, dependency graph, topological order and cycle detection
//! - [`truncate`]: dependents-first truncation with per-table failure collection
//! - [`integrity`]: orphaned-row audit over FK edges
//! - [`resolver`]: the validated, snapshot-per-call entry points
//! - [`connection`]: capability traits drivers implement; [`duckdb`] is one such driver

pub mod config;
pub mod connection;
pub mod duckdb;
pub mod error;
pub mod integrity;
pub mod resolver;
pub mod schema;
pub mod truncate;

pub use error::{Error, OperationError, ValidationError};
pub use resolver::{
    audit_referential_integrity, get_foreign_key_dependencies, safe_truncate_tables,
    verify_referential_integrity, ForeignKeyDependencies,
};

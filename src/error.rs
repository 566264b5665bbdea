//! Error kinds for the exposed operations.
//!
//! Two failure modes are kept apart:
//! - [`ValidationError`]: bad arguments, raised before any database access
//!   and always propagated to the caller.
//! - [`OperationError`]: one table or FK edge failed; recorded in the result
//!   structure while processing continues with the next item.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Argument validation failure. Never retried, never swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("schema name must not be empty")]
    EmptySchema,

    #[error("schema name '{0}' is malformed (expected [A-Za-z_][A-Za-z0-9_$]*, max 63 chars)")]
    MalformedSchema(String),

    #[error("table name at position {0} must not be empty")]
    EmptyTableName(usize),

    #[error("table name '{0}' is malformed")]
    MalformedTableName(String),
}

/// The error type returned by the exposed operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Listing tables or foreign keys failed; nothing can be ordered without it.
    #[error("schema introspection failed: {0:#}")]
    Introspection(#[source] anyhow::Error),
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A per-item failure collected into a result structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationError {
    pub table: String,
    pub error: String,
}

impl OperationError {
    pub fn new(table: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            error: error.into(),
        }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.table, self.error)
    }
}

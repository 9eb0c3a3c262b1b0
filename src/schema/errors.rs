//! Schema lookup and catalog errors

use std::io;

use thiserror::Error;

/// A table or relation path that does not exist.
///
/// Kept apart from compile errors so callers can map it to a distinct
/// response (404 rather than 400).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    /// Unknown table name
    #[error("Table not found: {0}")]
    Table(String),

    /// Unknown relation in a deep-load path
    #[error("Relation path not found: {0}")]
    RelationPath(String),
}

impl NotFoundError {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            NotFoundError::Table(_) => "NOT_FOUND_TABLE",
            NotFoundError::RelationPath(_) => "NOT_FOUND_RELATION_PATH",
        }
    }
}

/// Errors raised while loading or validating a catalog or dataset
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate table: {0}")]
    DuplicateTable(String),

    #[error("Table '{table}': duplicate column '{column}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Table '{table}': primary key '{column}' is not a column")]
    MissingPrimaryKey { table: String, column: String },

    #[error("Table '{table}': relation '{relation}' targets unknown table '{target}'")]
    UnknownTarget {
        table: String,
        relation: String,
        target: String,
    },

    #[error("Table '{table}': relation '{relation}' references unknown column '{column}'")]
    UnknownJoinColumn {
        table: String,
        relation: String,
        column: String,
    },

    #[error("Table '{table}': relation '{relation}' has the same name as a column")]
    NameCollision { table: String, relation: String },

    #[error("Rows given for unknown table '{0}'")]
    UnknownDatasetTable(String),

    #[error("Table '{table}': invalid row: {reason}")]
    InvalidRow { table: String, reason: String },
}

/// Result type for catalog operations
pub type SchemaResult<T> = Result<T, SchemaError>;

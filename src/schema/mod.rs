//! Table metadata and the schema provider seam
//!
//! The compiler never hard-codes tables. Everything it knows about a table
//! comes from a `SchemaProvider`.

mod catalog;
mod errors;
mod types;

use std::sync::Arc;

pub use catalog::Catalog;
pub use errors::{NotFoundError, SchemaError, SchemaResult};
pub use types::{Cardinality, ColumnDef, ColumnType, RelationDef, TableSchema};

/// Source of table metadata
pub trait SchemaProvider: Send + Sync {
    /// Resolves a table by name
    fn resolve_table(&self, name: &str) -> Result<Arc<TableSchema>, NotFoundError>;
}

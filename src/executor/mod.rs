//! Query execution seam
//!
//! `find` never talks to a database directly. It hands executable queries
//! and count specs to a `QueryExecutor`, which returns rows as JSON objects.
//!
//! `MemoryEngine` is the bundled executor. It evaluates plans over rows
//! held in memory with the same semantics as the rendered SQL.

mod errors;
mod filters;
mod memory;
mod sorter;
mod value;

use std::future::Future;
use std::pin::Pin;

pub use errors::{ExecutionError, ExecutionErrorCode, ExecutionResult};
pub use memory::MemoryEngine;
pub use value::{canonical_key, compare_values};

use crate::count::CountSpec;
use crate::planner::ExecutableQuery;

/// A result row: column name to value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Boxed future returned by executor methods
pub type ExecutionFuture<'a, T> = Pin<Box<dyn Future<Output = ExecutionResult<T>> + Send + 'a>>;

/// Runs planned queries against a data source
pub trait QueryExecutor: Send + Sync {
    /// Returns the root-table rows selected by `query`, in query order
    fn execute_query<'a>(&'a self, query: &'a ExecutableQuery) -> ExecutionFuture<'a, Vec<Row>>;

    /// Returns the number of distinct root rows matching `spec`
    fn execute_count<'a>(&'a self, spec: &'a CountSpec) -> ExecutionFuture<'a, u64>;
}

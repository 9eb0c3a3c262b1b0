//! aeroquery - declarative find requests over relational tables
//!
//! A `QueryRequest` (filter tree, sort, pagination, meta counts and deep
//! relation loading) is compiled against a `SchemaProvider` into executable
//! queries, which a `QueryExecutor` runs. `render_query` turns the same
//! queries into parameterised SQL.

pub mod cli;
pub mod config;
pub mod count;
pub mod deep;
pub mod executor;
pub mod filter;
pub mod find;
pub mod observability;
pub mod planner;
pub mod request;
pub mod result;
pub mod schema;
pub mod sort;

#[cfg(test)]
mod test_fixtures;

pub use config::FindConfig;
pub use executor::{MemoryEngine, QueryExecutor};
pub use find::{FindError, FindResult, FindService};
pub use request::QueryRequest;
pub use result::QueryResult;
pub use schema::{Catalog, SchemaProvider};

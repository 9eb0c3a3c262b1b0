//! # Find
//!
//! `find(QueryRequest) -> QueryResult`
//!
//! 1. Compile: resolve the table, compile deep paths, filter, sort and
//!    pagination. Any error here rejects the request with zero queries.
//! 2. Run the root query.
//! 3. Run the requested counts and the deep loads concurrently.
//! 4. Assemble the result.
//!
//! Every failure fails the whole call; there is no partial result.

mod errors;
mod service;

pub use errors::{FindError, FindResult};
pub use service::{CompiledFind, FindService};

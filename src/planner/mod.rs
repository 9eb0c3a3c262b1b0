//! Query planning for find requests
//!
//! The planner turns compiled filter and order plans into executable
//! queries, and renders those queries as SQL for explain output.
//!
//! # Design Principles
//!
//! - Deterministic: same request and schema produce the same plan
//! - Bounded: every root query carries a validated limit
//! - Explicit: unknown names and shapes are rejected before execution

mod errors;
mod explain;
mod planner;
mod query;
mod sql;

pub use errors::{CompileError, CompileErrorCode, CompileResult, Severity};
pub use explain::{ExplainCount, ExplainDeep, ExplainPlan};
pub use planner::{check_limit, Page, QueryPlanner};
pub use query::{ExecutableQuery, RankPartition};
pub use sql::{render_count, render_query, Dialect, SqlStatement};

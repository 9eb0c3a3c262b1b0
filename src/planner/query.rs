//! Executable query shape
//!
//! One `ExecutableQuery` describes a single relational statement:
//!
//! ```text
//! SELECT t0.* FROM <table> t0 <joins>
//! WHERE <filter> [GROUP BY t0.<pk>] HAVING <having>
//! ORDER BY <order> [OFFSET <offset>] [LIMIT <limit>]
//! ```
//!
//! Deep loads use the same shape with a `RankPartition`, which keeps at most
//! `limit` rows per distinct value of `column` under `order`.

use serde::Serialize;

use crate::filter::{HavingPredicate, JoinPlan, Predicate, ROOT_ALIAS};
use crate::sort::OrderTerm;

/// Per-group row bound applied before the final ordering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankPartition {
    /// Root column rows are grouped by
    pub column: String,
    /// Rows kept per group
    pub limit: u64,
    /// Columns projected from the ranked rows, leaving out the rank itself
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutableQuery {
    pub table: String,
    pub alias: String,
    pub primary_key: String,
    pub joins: JoinPlan,
    /// Conjunction; empty matches every row
    pub filter: Vec<Predicate>,
    pub group_by_primary_key: bool,
    pub having: Vec<HavingPredicate>,
    pub order: Vec<OrderTerm>,
    pub partition: Option<RankPartition>,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl ExecutableQuery {
    /// Unfiltered, unordered scan of a table
    pub fn scan(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: ROOT_ALIAS.to_string(),
            primary_key: primary_key.into(),
            joins: JoinPlan::new(),
            filter: Vec::new(),
            group_by_primary_key: false,
            having: Vec::new(),
            order: Vec::new(),
            partition: None,
            offset: 0,
            limit: None,
        }
    }
}

//! Compiled predicate expressions
//!
//! Column references are bound to table aliases. Correlated subqueries
//! (`Exists`, `AggregateCompare`) carry the join link back to the alias
//! they are evaluated against.

use serde::Serialize;

use super::joins::{AggregateFn, JoinLink};
use crate::request::FieldOp;

/// A column qualified by a table alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }
}

/// Related rows reachable from an outer alias, optionally filtered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subquery {
    pub link: JoinLink,
    pub predicate: Option<Predicate>,
}

/// A boolean expression over bound rows.
///
/// Evaluation is two-valued: a comparison against NULL is false.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Compare {
        column: ColumnRef,
        op: FieldOp,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// At least one related row satisfies the subquery predicate
    Exists(Box<Subquery>),
    /// An aggregate over the related rows satisfies `op`
    AggregateCompare {
        subquery: Box<Subquery>,
        func: AggregateFn,
        column: Option<String>,
        op: FieldOp,
    },
}

/// A HAVING condition on a pre-aggregated join value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HavingPredicate {
    /// Alias of the aggregate join
    pub alias: String,
    pub func: AggregateFn,
    pub op: FieldOp,
}

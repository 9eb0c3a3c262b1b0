//! Join planning
//!
//! Alias scheme:
//! - `t0` root table
//! - `j_<path>` inner (filter) or left (lookup) joins, one per relation path
//! - `a<n>` aggregate joins backing HAVING predicates
//! - `o<n>` aggregate joins backing ORDER BY terms
//! - `s<n>` correlated subqueries

use serde::Serialize;

use super::predicate::Predicate;
use crate::request::{AggregateKind, RelationPath, SortDirection, PATH_SEPARATOR};
use crate::schema::{Cardinality, RelationDef, TableSchema};

/// Alias of the root table in every executable query
pub const ROOT_ALIAS: &str = "t0";

/// Alias of the path join for a relation path
pub fn join_alias(path: &RelationPath) -> String {
    format!("j_{}", path.segments().join(PATH_SEPARATOR))
}

/// How a related table is attached to its parent alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinLink {
    /// Alias of the related table
    pub alias: String,
    /// Alias the relation starts from
    pub parent_alias: String,
    pub relation: String,
    /// Related table name
    pub table: String,
    /// Related table primary key
    pub primary_key: String,
    /// Join column on the parent side
    pub parent_column: String,
    /// Join column on the related side
    pub column: String,
    pub cardinality: Cardinality,
}

impl JoinLink {
    pub fn new(
        alias: impl Into<String>,
        parent_alias: impl Into<String>,
        relation: &RelationDef,
        target: &TableSchema,
    ) -> Self {
        Self {
            alias: alias.into(),
            parent_alias: parent_alias.into(),
            relation: relation.name.clone(),
            table: target.name.clone(),
            primary_key: target.primary_key.clone(),
            parent_column: relation.source_column.clone(),
            column: relation.target_column.clone(),
            cardinality: relation.cardinality,
        }
    }
}

/// Aggregate functions computed over related rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    /// Column of the first related row under the join's ordering
    First,
}

impl AggregateFn {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFn::Count => "count",
            AggregateFn::Sum => "sum",
            AggregateFn::Avg => "avg",
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
            AggregateFn::First => "first",
        }
    }
}

impl From<AggregateKind> for AggregateFn {
    fn from(kind: AggregateKind) -> Self {
        match kind {
            AggregateKind::Count => AggregateFn::Count,
            AggregateKind::Sum => AggregateFn::Sum,
            AggregateKind::Avg => AggregateFn::Avg,
            AggregateKind::Min => AggregateFn::Min,
            AggregateKind::Max => AggregateFn::Max,
        }
    }
}

/// A join that yields one aggregated value per parent row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateJoin {
    pub func: AggregateFn,
    /// Aggregated column; `None` only for row counts
    pub column: Option<String>,
    /// Restricts which related rows are aggregated
    pub scope: Option<Predicate>,
    /// Ordering used by `First`
    pub order: Vec<(String, SortDirection)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// Inner join; related rows must exist and fan out
    Filter,
    /// Left join through to-one relations, used for ordering
    Lookup,
    /// Left join on a pre-aggregated derived table
    Aggregate(AggregateJoin),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedJoin {
    pub link: JoinLink,
    pub kind: JoinKind,
}

/// Ordered, alias-deduplicated joins.
///
/// Parents are always added before their children, so iteration order is
/// a valid join order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JoinPlan {
    joins: Vec<PlannedJoin>,
}

impl JoinPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a join, or merges it with an existing join of the same alias.
    ///
    /// A lookup join on a path that is also filtered becomes a filter join.
    pub fn add(&mut self, join: PlannedJoin) {
        match self.joins.iter_mut().find(|j| j.link.alias == join.link.alias) {
            Some(existing) => {
                if existing.kind == JoinKind::Lookup && join.kind == JoinKind::Filter {
                    existing.kind = JoinKind::Filter;
                }
            }
            None => self.joins.push(join),
        }
    }

    /// Appends all joins of `other`
    pub fn merge(&mut self, other: JoinPlan) {
        for join in other.joins {
            self.add(join);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedJoin> {
        self.joins.iter()
    }

    pub fn get(&self, alias: &str) -> Option<&PlannedJoin> {
        self.joins.iter().find(|j| j.link.alias == alias)
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// True when an inner join can produce several tuples per root row
    pub fn fans_out(&self) -> bool {
        self.joins
            .iter()
            .any(|j| j.kind == JoinKind::Filter && j.link.cardinality == Cardinality::ToMany)
    }

    pub fn has_aggregates(&self) -> bool {
        self.joins
            .iter()
            .any(|j| matches!(j.kind, JoinKind::Aggregate(_)))
    }

    /// Keeps only the joins matching `keep`
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&PlannedJoin) -> bool,
    {
        self.joins.retain(keep);
    }
}

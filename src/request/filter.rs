//! # Filter Tree
//!
//! The recursive filter structure of a request. Parsing is purely
//! syntactic; names are checked against the schema by the filter compiler.

use serde::Serialize;
use serde_json::Value;

/// Field comparison operators with their operands
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOp {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    /// Inclusive on both bounds
    Between(Value, Value),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    IsNull(bool),
}

impl FieldOp {
    /// Operator names as they appear on the wire
    pub const NAMES: [&'static str; 13] = [
        "_eq",
        "_ne",
        "_gt",
        "_gte",
        "_lt",
        "_lte",
        "_in",
        "_nin",
        "_between",
        "_contains",
        "_starts_with",
        "_ends_with",
        "_is_null",
    ];

    /// Returns true if `name` is a field operator
    pub fn is_operator(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }

    /// Returns the wire name of this operator
    pub fn name(&self) -> &'static str {
        match self {
            FieldOp::Eq(_) => "_eq",
            FieldOp::Ne(_) => "_ne",
            FieldOp::Gt(_) => "_gt",
            FieldOp::Gte(_) => "_gte",
            FieldOp::Lt(_) => "_lt",
            FieldOp::Lte(_) => "_lte",
            FieldOp::In(_) => "_in",
            FieldOp::Nin(_) => "_nin",
            FieldOp::Between(_, _) => "_between",
            FieldOp::Contains(_) => "_contains",
            FieldOp::StartsWith(_) => "_starts_with",
            FieldOp::EndsWith(_) => "_ends_with",
            FieldOp::IsNull(_) => "_is_null",
        }
    }
}

/// Aggregates usable in relation-aggregate filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateKind {
    /// Parses a wire key such as `_count`
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "_count" => Some(AggregateKind::Count),
            "_sum" => Some(AggregateKind::Sum),
            "_avg" => Some(AggregateKind::Avg),
            "_min" => Some(AggregateKind::Min),
            "_max" => Some(AggregateKind::Max),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            AggregateKind::Count => "_count",
            AggregateKind::Sum => "_sum",
            AggregateKind::Avg => "_avg",
            AggregateKind::Min => "_min",
            AggregateKind::Max => "_max",
        }
    }
}

/// A single column comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldPredicate {
    pub field: String,
    pub op: FieldOp,
}

/// Rows qualify when at least one related row matches `child`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationFilter {
    pub relation: String,
    pub child: Box<FilterNode>,
}

/// Rows qualify when an aggregate over related rows satisfies `op`.
///
/// `scope`, when present, restricts which related rows are aggregated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateFilter {
    pub relation: String,
    pub kind: AggregateKind,
    pub field: Option<String>,
    pub op: FieldOp,
    pub scope: Option<Box<FilterNode>>,
}

/// A node of the filter tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterNode {
    /// All children hold. Empty matches everything.
    And(Vec<FilterNode>),
    /// Any child holds. Empty matches nothing.
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
    Field(FieldPredicate),
    Relation(RelationFilter),
    Aggregate(AggregateFilter),
}

impl FilterNode {
    /// Field comparison shorthand
    pub fn field(field: impl Into<String>, op: FieldOp) -> Self {
        FilterNode::Field(FieldPredicate {
            field: field.into(),
            op,
        })
    }

    /// Relation filter shorthand
    pub fn relation(relation: impl Into<String>, child: FilterNode) -> Self {
        FilterNode::Relation(RelationFilter {
            relation: relation.into(),
            child: Box::new(child),
        })
    }

    /// Negation shorthand
    pub fn not(child: FilterNode) -> Self {
        FilterNode::Not(Box::new(child))
    }

    /// Count of related rows, compared with `op`
    pub fn count(relation: impl Into<String>, op: FieldOp) -> Self {
        FilterNode::Aggregate(AggregateFilter {
            relation: relation.into(),
            kind: AggregateKind::Count,
            field: None,
            op,
            scope: None,
        })
    }

    /// Returns true for an empty conjunction
    pub fn is_match_all(&self) -> bool {
        matches!(self, FilterNode::And(children) if children.is_empty())
    }
}

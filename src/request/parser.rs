//! # Filter Parser
//!
//! Decodes the JSON filter object into a `FilterNode` tree.
//!
//! Shape rules:
//! - Sibling keys of one object are a conjunction
//! - `_and` / `_or` take arrays, `_not` takes an object
//! - `field: {_op: value, ...}` is a field predicate
//! - `relation: {...}` is a relation filter
//! - `_count` / `_sum` / `_avg` / `_min` / `_max` inside a relation object
//!   are aggregate filters; the other keys of that object become their scope
//! - `a__b: {...}` is shorthand for `a: {b: {...}}`

use serde_json::{Map, Value};

use super::filter::{AggregateFilter, AggregateKind, FieldOp, FilterNode};
use super::path::PATH_SEPARATOR;
use crate::planner::{CompileError, CompileResult};

const COMBINATORS: [&str; 3] = ["_and", "_or", "_not"];

fn is_reserved(key: &str) -> bool {
    FieldOp::is_operator(key) || COMBINATORS.contains(&key) || AggregateKind::from_key(key).is_some()
}

/// Parses a filter object
pub fn parse_filter(value: &Value) -> CompileResult<FilterNode> {
    match value {
        Value::Object(map) => parse_object(map),
        _ => Err(CompileError::query_invalid("Filter must be an object")),
    }
}

/// Parses an object whose entries are implicitly conjoined
fn parse_object(map: &Map<String, Value>) -> CompileResult<FilterNode> {
    let mut conjuncts = Vec::with_capacity(map.len());
    for (key, value) in map {
        conjuncts.push(parse_entry(key, value)?);
    }
    Ok(conjunction(conjuncts))
}

fn conjunction(mut nodes: Vec<FilterNode>) -> FilterNode {
    if nodes.len() == 1 {
        nodes.remove(0)
    } else {
        FilterNode::And(nodes)
    }
}

fn parse_entry(key: &str, value: &Value) -> CompileResult<FilterNode> {
    match key {
        "_and" | "_or" => {
            let items = value.as_array().ok_or_else(|| {
                CompileError::query_invalid(format!("'{}' expects an array", key))
            })?;
            let children = items.iter().map(parse_filter).collect::<CompileResult<Vec<_>>>()?;
            return Ok(if key == "_and" {
                FilterNode::And(children)
            } else {
                FilterNode::Or(children)
            });
        }
        "_not" => {
            if !value.is_object() {
                return Err(CompileError::query_invalid("'_not' expects an object"));
            }
            return Ok(FilterNode::not(parse_filter(value)?));
        }
        _ => {}
    }

    if key.starts_with('_') {
        if FieldOp::is_operator(key) {
            return Err(CompileError::query_invalid(format!(
                "Operator '{}' must be applied to a field",
                key
            )));
        }
        if AggregateKind::from_key(key).is_some() {
            return Err(CompileError::query_invalid(format!(
                "Aggregate '{}' must be nested under a relation",
                key
            )));
        }
        return Err(CompileError::unknown_operator(key));
    }

    if let Some((head, rest)) = key.split_once(PATH_SEPARATOR) {
        if head.is_empty() || rest.is_empty() {
            return Err(CompileError::query_invalid(format!("Invalid field path '{}'", key)));
        }
        return Ok(FilterNode::relation(head, parse_entry(rest, value)?));
    }

    let map = value.as_object().ok_or_else(|| {
        CompileError::query_invalid(format!("Condition for '{}' must be an object", key))
    })?;

    if let Some(unknown) = map.keys().find(|k| k.starts_with('_') && !is_reserved(k)) {
        return Err(CompileError::unknown_operator(unknown.as_str()));
    }

    let operator_count = map.keys().filter(|k| FieldOp::is_operator(k)).count();
    if operator_count > 0 && operator_count == map.len() {
        let ops = parse_ops(map)?;
        return Ok(conjunction(
            ops.into_iter().map(|op| FilterNode::field(key, op)).collect(),
        ));
    }
    if operator_count > 0 {
        return Err(CompileError::query_invalid(format!(
            "Condition for '{}' mixes operators with nested filters",
            key
        )));
    }

    parse_relation_body(key, map)
}

/// Parses the object under a relation key, splitting out aggregates
fn parse_relation_body(relation: &str, map: &Map<String, Value>) -> CompileResult<FilterNode> {
    let mut scope_entries = Map::new();
    let mut aggregates = Vec::new();
    for (key, value) in map {
        match AggregateKind::from_key(key) {
            Some(kind) => aggregates.push((kind, value)),
            None => {
                scope_entries.insert(key.clone(), value.clone());
            }
        }
    }

    let scope = parse_object(&scope_entries)?;
    if aggregates.is_empty() {
        return Ok(FilterNode::relation(relation, scope));
    }

    let scope = if scope.is_match_all() {
        None
    } else {
        Some(Box::new(scope))
    };

    let mut nodes = Vec::new();
    for (kind, value) in aggregates {
        for (field, op) in parse_aggregate(kind, value)? {
            nodes.push(FilterNode::Aggregate(AggregateFilter {
                relation: relation.to_string(),
                kind,
                field,
                op,
                scope: scope.clone(),
            }));
        }
    }
    Ok(conjunction(nodes))
}

/// Parses `{_op: v}` (aggregate over rows) or `{column: {_op: v}}`
fn parse_aggregate(kind: AggregateKind, value: &Value) -> CompileResult<Vec<(Option<String>, FieldOp)>> {
    let map = value.as_object().ok_or_else(|| {
        CompileError::query_invalid(format!("'{}' expects an object", kind.key()))
    })?;
    if map.is_empty() {
        return Err(CompileError::query_invalid(format!(
            "'{}' requires a comparison",
            kind.key()
        )));
    }

    let operator_count = map.keys().filter(|k| FieldOp::is_operator(k)).count();
    if operator_count == map.len() {
        return Ok(parse_ops(map)?.into_iter().map(|op| (None, op)).collect());
    }
    if operator_count > 0 {
        return Err(CompileError::query_invalid(format!(
            "'{}' mixes operators with columns",
            kind.key()
        )));
    }

    let mut result = Vec::new();
    for (column, ops) in map {
        if column.starts_with('_') {
            return Err(CompileError::unknown_operator(column.as_str()));
        }
        let ops = ops.as_object().ok_or_else(|| {
            CompileError::query_invalid(format!("Condition for '{}' must be an object", column))
        })?;
        if ops.is_empty() || !ops.keys().all(|k| FieldOp::is_operator(k)) {
            if let Some(unknown) = ops
                .keys()
                .find(|k| k.starts_with('_') && !FieldOp::is_operator(k))
            {
                return Err(CompileError::unknown_operator(unknown.as_str()));
            }
            return Err(CompileError::query_invalid(format!(
                "Condition for '{}' requires an operator",
                column
            )));
        }
        for op in parse_ops(ops)? {
            result.push((Some(column.clone()), op));
        }
    }
    Ok(result)
}

fn parse_ops(map: &Map<String, Value>) -> CompileResult<Vec<FieldOp>> {
    map.iter().map(|(name, value)| parse_op(name, value)).collect()
}

/// Parses one operator and validates its operand shape
pub fn parse_op(name: &str, value: &Value) -> CompileResult<FieldOp> {
    let invalid = |expected: &str| {
        CompileError::query_invalid(format!("Operator '{}' expects {}", name, expected))
    };

    let op = match name {
        "_eq" => FieldOp::Eq(scalar_or_null(value).ok_or_else(|| invalid("a scalar"))?),
        "_ne" => FieldOp::Ne(scalar_or_null(value).ok_or_else(|| invalid("a scalar"))?),
        "_gt" => FieldOp::Gt(scalar(value).ok_or_else(|| invalid("a non-null scalar"))?),
        "_gte" => FieldOp::Gte(scalar(value).ok_or_else(|| invalid("a non-null scalar"))?),
        "_lt" => FieldOp::Lt(scalar(value).ok_or_else(|| invalid("a non-null scalar"))?),
        "_lte" => FieldOp::Lte(scalar(value).ok_or_else(|| invalid("a non-null scalar"))?),
        "_in" | "_nin" => {
            let items = value
                .as_array()
                .filter(|items| items.iter().all(|v| scalar_or_null(v).is_some()))
                .ok_or_else(|| invalid("an array of scalars"))?
                .clone();
            if name == "_in" {
                FieldOp::In(items)
            } else {
                FieldOp::Nin(items)
            }
        }
        "_between" => match value.as_array().map(Vec::as_slice) {
            Some([low, high]) => FieldOp::Between(
                scalar(low).ok_or_else(|| invalid("two non-null scalars"))?,
                scalar(high).ok_or_else(|| invalid("two non-null scalars"))?,
            ),
            _ => return Err(invalid("a two-element array")),
        },
        "_contains" | "_starts_with" | "_ends_with" => {
            let s = value.as_str().ok_or_else(|| invalid("a string"))?.to_string();
            match name {
                "_contains" => FieldOp::Contains(s),
                "_starts_with" => FieldOp::StartsWith(s),
                _ => FieldOp::EndsWith(s),
            }
        }
        "_is_null" => FieldOp::IsNull(value.as_bool().ok_or_else(|| invalid("a boolean"))?),
        other => return Err(CompileError::unknown_operator(other)),
    };
    Ok(op)
}

fn scalar(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) | Value::Number(_) | Value::String(_) => Some(value.clone()),
        _ => None,
    }
}

fn scalar_or_null(value: &Value) -> Option<Value> {
    if value.is_null() {
        Some(Value::Null)
    } else {
        scalar(value)
    }
}

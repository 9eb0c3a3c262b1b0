//! Predicate evaluation for in-memory execution
//!
//! Predicates are evaluated against a `Tuple`: one row per bound alias plus
//! the values of pre-aggregated joins. Evaluation is two-valued. Any
//! comparison with null is false except the explicit null tests.

use std::collections::BTreeMap;

use serde_json::Value;

use super::errors::ExecutionResult;
use super::value::{canonical_key, compare_operand, compare_values, float_value, value_kind};
use super::{ExecutionError, Row};
use crate::filter::{AggregateFn, ColumnRef, JoinLink, Predicate};
use crate::request::FieldOp;

/// Rows bound to aliases during evaluation
#[derive(Debug, Clone, Default)]
pub(super) struct Tuple<'a> {
    rows: BTreeMap<String, Option<&'a Row>>,
    aggregates: BTreeMap<String, Value>,
}

impl<'a> Tuple<'a> {
    pub fn root(alias: &str, row: &'a Row) -> Self {
        let mut tuple = Self::default();
        tuple.rows.insert(alias.to_string(), Some(row));
        tuple
    }

    pub fn bind(&self, alias: &str, row: Option<&'a Row>) -> Self {
        let mut tuple = self.clone();
        tuple.rows.insert(alias.to_string(), row);
        tuple
    }

    pub fn set_aggregate(&mut self, alias: &str, value: Value) {
        self.aggregates.insert(alias.to_string(), value);
    }

    pub fn row(&self, alias: &str) -> Option<&'a Row> {
        self.rows.get(alias).copied().flatten()
    }

    /// Column value; null when the alias is unbound or the column absent
    pub fn value(&self, column: &ColumnRef) -> Value {
        self.row(&column.alias)
            .and_then(|row| row.get(&column.column))
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn aggregate(&self, alias: &str) -> Value {
        self.aggregates.get(alias).cloned().unwrap_or(Value::Null)
    }
}

/// Evaluates compiled predicates over tuples
pub(super) struct PredicateFilter<'a> {
    tables: &'a BTreeMap<String, Vec<Row>>,
}

impl<'a> PredicateFilter<'a> {
    pub fn new(tables: &'a BTreeMap<String, Vec<Row>>) -> Self {
        Self { tables }
    }

    /// Checks that a tuple matches every predicate (AND semantics)
    pub fn matches(&self, tuple: &Tuple<'a>, predicates: &[Predicate]) -> ExecutionResult<bool> {
        for predicate in predicates {
            if !self.eval(tuple, predicate)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn eval(&self, tuple: &Tuple<'a>, predicate: &Predicate) -> ExecutionResult<bool> {
        match predicate {
            Predicate::Compare { column, op } => {
                matches_op(&column.column, &tuple.value(column), op)
            }
            Predicate::And(children) => self.matches(tuple, children),
            Predicate::Or(children) => {
                for child in children {
                    if self.eval(tuple, child)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not(child) => Ok(!self.eval(tuple, child)?),
            Predicate::Exists(subquery) => {
                for row in self.related(tuple, &subquery.link)? {
                    let inner = tuple.bind(&subquery.link.alias, Some(row));
                    let matched = match &subquery.predicate {
                        Some(p) => self.eval(&inner, p)?,
                        None => true,
                    };
                    if matched {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::AggregateCompare {
                subquery,
                func,
                column,
                op,
            } => {
                let mut rows = Vec::new();
                for row in self.related(tuple, &subquery.link)? {
                    let inner = tuple.bind(&subquery.link.alias, Some(row));
                    let keep = match &subquery.predicate {
                        Some(p) => self.eval(&inner, p)?,
                        None => true,
                    };
                    if keep {
                        rows.push(row);
                    }
                }
                let value = aggregate(*func, column.as_deref(), &rows)?;
                matches_op(func.as_str(), &value, op)
            }
        }
    }

    /// Rows of the linked table joined to the tuple's parent row
    pub fn related(&self, tuple: &Tuple<'a>, link: &JoinLink) -> ExecutionResult<Vec<&'a Row>> {
        let parent = tuple.value(&ColumnRef::new(&link.parent_alias, &link.parent_column));
        let Some(key) = canonical_key(&parent) else {
            return Ok(Vec::new());
        };
        let rows = self
            .tables
            .get(&link.table)
            .ok_or_else(|| ExecutionError::unknown_table(&link.table))?;
        Ok(rows
            .iter()
            .filter(|row| {
                row.get(&link.column)
                    .and_then(canonical_key)
                    .is_some_and(|k| k == key)
            })
            .collect())
    }
}

/// Applies a field operator to a column value
pub(super) fn matches_op(column: &str, actual: &Value, op: &FieldOp) -> ExecutionResult<bool> {
    use std::cmp::Ordering::*;

    let ordered = |operand: &Value| compare_operand(column, actual, operand);

    Ok(match op {
        FieldOp::Eq(Value::Null) | FieldOp::IsNull(true) => actual.is_null(),
        FieldOp::Ne(Value::Null) | FieldOp::IsNull(false) => !actual.is_null(),
        FieldOp::Eq(v) => ordered(v)? == Some(Equal),
        FieldOp::Ne(v) => matches!(ordered(v)?, Some(Less | Greater)),
        FieldOp::Gt(v) => ordered(v)? == Some(Greater),
        FieldOp::Gte(v) => matches!(ordered(v)?, Some(Greater | Equal)),
        FieldOp::Lt(v) => ordered(v)? == Some(Less),
        FieldOp::Lte(v) => matches!(ordered(v)?, Some(Less | Equal)),
        FieldOp::In(values) => {
            let mut found = false;
            for v in values {
                if ordered(v)? == Some(Equal) {
                    found = true;
                    break;
                }
            }
            found
        }
        FieldOp::Nin(values) => {
            if actual.is_null() || values.iter().any(Value::is_null) {
                false
            } else {
                let mut found = false;
                for v in values {
                    if ordered(v)? == Some(Equal) {
                        found = true;
                        break;
                    }
                }
                !found
            }
        }
        FieldOp::Between(low, high) => {
            matches!(ordered(low)?, Some(Greater | Equal)) && matches!(ordered(high)?, Some(Less | Equal))
        }
        FieldOp::Contains(s) => text(column, actual)?.is_some_and(|t| t.contains(s.as_str())),
        FieldOp::StartsWith(s) => text(column, actual)?.is_some_and(|t| t.starts_with(s.as_str())),
        FieldOp::EndsWith(s) => text(column, actual)?.is_some_and(|t| t.ends_with(s.as_str())),
    })
}

fn text<'v>(column: &str, actual: &'v Value) -> ExecutionResult<Option<&'v str>> {
    match actual {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(ExecutionError::type_mismatch(column, "string", value_kind(other))),
    }
}

/// Computes an aggregate over related rows.
///
/// `count` of no rows is 0; every other aggregate of no values is null.
/// `First` takes the first row, so callers order `rows` beforehand.
pub(super) fn aggregate(func: AggregateFn, column: Option<&str>, rows: &[&Row]) -> ExecutionResult<Value> {
    let values = || {
        rows.iter()
            .filter_map(move |row| column.and_then(|c| row.get(c)))
            .filter(|v| !v.is_null())
    };

    Ok(match func {
        AggregateFn::Count => match column {
            None => Value::from(rows.len() as u64),
            Some(_) => Value::from(values().count() as u64),
        },
        AggregateFn::Sum | AggregateFn::Avg => {
            let mut total = 0.0;
            let mut integral = true;
            let mut n = 0u64;
            for v in values() {
                let Value::Number(num) = v else {
                    return Err(ExecutionError::type_mismatch(
                        column.unwrap_or(func.as_str()),
                        "number",
                        value_kind(v),
                    ));
                };
                integral &= num.is_i64() || num.is_u64();
                total += num.as_f64().unwrap_or(0.0);
                n += 1;
            }
            match (func, n) {
                (_, 0) => Value::Null,
                (AggregateFn::Avg, _) => float_value(total / n as f64),
                _ if integral && total.abs() < i64::MAX as f64 => Value::from(total as i64),
                _ => float_value(total),
            }
        }
        AggregateFn::Min => values().min_by(|a, b| compare_values(a, b)).cloned().unwrap_or(Value::Null),
        AggregateFn::Max => values().max_by(|a, b| compare_values(a, b)).cloned().unwrap_or(Value::Null),
        AggregateFn::First => rows
            .first()
            .and_then(|row| column.and_then(|c| row.get(c)))
            .cloned()
            .unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("row must be an object"),
        }
    }

    #[test]
    fn test_null_comparisons_are_false() {
        for op in [
            FieldOp::Eq(json!(1)),
            FieldOp::Ne(json!(1)),
            FieldOp::Gt(json!(1)),
            FieldOp::In(vec![json!(1)]),
            FieldOp::Nin(vec![json!(1)]),
            FieldOp::Contains("a".into()),
        ] {
            assert!(!matches_op("c", &Value::Null, &op).unwrap(), "{:?}", op);
        }
        assert!(matches_op("c", &Value::Null, &FieldOp::Eq(Value::Null)).unwrap());
        assert!(matches_op("c", &Value::Null, &FieldOp::IsNull(true)).unwrap());
        assert!(matches_op("c", &json!(1), &FieldOp::Ne(Value::Null)).unwrap());
    }

    #[test]
    fn test_set_and_range_operators() {
        assert!(matches_op("c", &json!(3), &FieldOp::In(vec![json!(1), json!(3)])).unwrap());
        assert!(!matches_op("c", &json!(3), &FieldOp::In(vec![])).unwrap());
        assert!(matches_op("c", &json!(3), &FieldOp::Nin(vec![])).unwrap());
        assert!(!matches_op("c", &json!(3), &FieldOp::Nin(vec![json!(null)])).unwrap());
        assert!(matches_op("c", &json!(3), &FieldOp::Between(json!(3), json!(5))).unwrap());
        assert!(!matches_op("c", &json!(6), &FieldOp::Between(json!(3), json!(5))).unwrap());
    }

    #[test]
    fn test_string_operators_are_case_sensitive() {
        let v = json!("Hello World");
        assert!(matches_op("c", &v, &FieldOp::Contains("lo W".into())).unwrap());
        assert!(!matches_op("c", &v, &FieldOp::Contains("hello".into())).unwrap());
        assert!(matches_op("c", &v, &FieldOp::StartsWith("Hell".into())).unwrap());
        assert!(matches_op("c", &v, &FieldOp::EndsWith("rld".into())).unwrap());
        assert!(matches_op("c", &json!(5), &FieldOp::Contains("5".into())).is_err());
    }

    #[test]
    fn test_kind_mismatch_is_an_error() {
        let err = matches_op("age", &json!(30), &FieldOp::Gt(json!("20"))).unwrap_err();
        assert_eq!(err.code().code(), "EXECUTION_TYPE_MISMATCH");
    }

    #[test]
    fn test_aggregates() {
        let rows = [
            row(json!({"v": 4})),
            row(json!({"v": null})),
            row(json!({"v": 10})),
        ];
        let refs: Vec<&Row> = rows.iter().collect();

        assert_eq!(aggregate(AggregateFn::Count, None, &refs).unwrap(), json!(3));
        assert_eq!(aggregate(AggregateFn::Count, Some("v"), &refs).unwrap(), json!(2));
        assert_eq!(aggregate(AggregateFn::Sum, Some("v"), &refs).unwrap(), json!(14));
        assert_eq!(aggregate(AggregateFn::Avg, Some("v"), &refs).unwrap(), json!(7.0));
        assert_eq!(aggregate(AggregateFn::Min, Some("v"), &refs).unwrap(), json!(4));
        assert_eq!(aggregate(AggregateFn::Max, Some("v"), &refs).unwrap(), json!(10));
        assert_eq!(aggregate(AggregateFn::First, Some("v"), &refs).unwrap(), json!(4));

        assert_eq!(aggregate(AggregateFn::Count, None, &[]).unwrap(), json!(0));
        assert_eq!(aggregate(AggregateFn::Sum, Some("v"), &[]).unwrap(), Value::Null);
    }
}

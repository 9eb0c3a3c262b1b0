//! JSON value comparison for in-memory execution
//!
//! Ordering rules:
//! - null < bool < number < string < array < object
//! - Numbers compare as f64
//! - Arrays and objects compare by their serialized text

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::errors::{ExecutionError, ExecutionResult};

fn type_order(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Name of a value's kind for error messages
pub fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Total order over JSON values, used for sorting
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let by_type = type_order(a).cmp(&type_order(b));
    if by_type != Ordering::Equal {
        return by_type;
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let xf = x.as_f64().unwrap_or(0.0);
            let yf = y.as_f64().unwrap_or(0.0);
            xf.partial_cmp(&yf).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => Ordering::Equal,
    }
}

/// Compares a column value with an operand of a comparison.
///
/// Returns `None` when either side is null. Non-null values of different
/// kinds are a type mismatch.
pub fn compare_operand(column: &str, actual: &Value, operand: &Value) -> ExecutionResult<Option<Ordering>> {
    if actual.is_null() || operand.is_null() {
        return Ok(None);
    }
    if type_order(actual) != type_order(operand) {
        return Err(ExecutionError::type_mismatch(
            column,
            value_kind(operand),
            value_kind(actual),
        ));
    }
    Ok(Some(compare_values(actual, operand)))
}

/// Grouping key for join and partition columns; `None` for null
pub fn canonical_key(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::Bool(b) => Some(format!("b:{}", b)),
        Value::Number(n) => Some(format!("n:{}", canonical_number(n))),
        Value::String(s) => Some(format!("s:{}", s)),
        other => Some(format!("j:{}", other)),
    }
}

fn canonical_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    let f = n.as_f64().unwrap_or(0.0);
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

/// Converts an f64 into a JSON number, or null when not finite
pub fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

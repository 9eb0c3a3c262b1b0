//! Sort tokens (`"-age"`, `"author__name"`)

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::path::PATH_SEPARATOR;
use crate::planner::{CompileError, CompileResult};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One sort key: a column path and a direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortToken {
    pub path: Vec<String>,
    pub direction: SortDirection,
}

impl SortToken {
    /// Parses `[-]segment(__segment)*`
    pub fn parse(token: &str) -> CompileResult<Self> {
        let token = token.trim();
        let (direction, body) = match token.strip_prefix('-') {
            Some(rest) => (SortDirection::Desc, rest),
            None => (SortDirection::Asc, token),
        };
        let path: Vec<String> = body.split(PATH_SEPARATOR).map(str::to_string).collect();
        if path.iter().any(|seg| seg.is_empty() || seg.starts_with('-')) {
            return Err(CompileError::query_invalid(format!(
                "Invalid sort token '{}'",
                token
            )));
        }
        Ok(Self { path, direction })
    }

    /// Ascending sort on a root column
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            path: vec![column.into()],
            direction: SortDirection::Asc,
        }
    }

    /// Descending sort on a root column
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            path: vec![column.into()],
            direction: SortDirection::Desc,
        }
    }

    /// Returns the column when the token has no relation hops
    pub fn as_column(&self) -> Option<&str> {
        match self.path.as_slice() {
            [column] => Some(column.as_str()),
            _ => None,
        }
    }

    pub fn path_string(&self) -> String {
        self.path.join(PATH_SEPARATOR)
    }
}

impl fmt::Display for SortToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.direction == SortDirection::Desc {
            write!(f, "-")?;
        }
        write!(f, "{}", self.path_string())
    }
}

/// Parses a sort list given as an array of tokens or a comma-separated string
pub fn parse_sort_list(value: &Value) -> CompileResult<Vec<SortToken>> {
    match value {
        Value::String(s) => s
            .split(',')
            .filter(|t| !t.trim().is_empty())
            .map(SortToken::parse)
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| CompileError::query_invalid("Sort tokens must be strings"))
                    .and_then(SortToken::parse)
            })
            .collect(),
        _ => Err(CompileError::query_invalid(
            "Sort must be an array or a comma-separated string",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::CompileErrorCode;
    use serde_json::json;

    #[test]
    fn test_parse_direction() {
        assert_eq!(SortToken::parse("age").unwrap(), SortToken::asc("age"));
        assert_eq!(SortToken::parse("-age").unwrap(), SortToken::desc("age"));
    }

    #[test]
    fn test_parse_relation_path() {
        let token = SortToken::parse("-author__name").unwrap();
        assert_eq!(token.path, vec!["author", "name"]);
        assert_eq!(token.direction, SortDirection::Desc);
        assert_eq!(token.as_column(), None);
        assert_eq!(token.to_string(), "-author__name");
    }

    #[test]
    fn test_parse_list_forms() {
        let from_array = parse_sort_list(&json!(["-age", "id"])).unwrap();
        let from_string = parse_sort_list(&json!("-age, id")).unwrap();
        assert_eq!(from_array, from_string);
        assert_eq!(from_array, vec![SortToken::desc("age"), SortToken::asc("id")]);
    }

    #[test]
    fn test_invalid_tokens() {
        for bad in [json!(["-"]), json!(["--age"]), json!(["a____b"]), json!([1]), json!(3)] {
            let err = parse_sort_list(&bad).unwrap_err();
            assert_eq!(err.code(), CompileErrorCode::QueryInvalid, "input {}", bad);
        }
    }
}

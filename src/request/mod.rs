//! # Query Requests
//!
//! The declarative request accepted by `find`:
//!
//! ```json
//! {"tableName": "user",
//!  "filter": {"age": {"_gt": 30}},
//!  "sort": ["-age", "id"],
//!  "page": 2, "limit": 10,
//!  "meta": "totalCount,filterCount",
//!  "deep": {"posts": {"limit": 2, "sort": ["-views"]}}}
//! ```

mod filter;
mod parser;
mod path;
mod sort;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use filter::{AggregateFilter, AggregateKind, FieldOp, FieldPredicate, FilterNode, RelationFilter};
pub use parser::{parse_filter, parse_op};
pub use path::{RelationOptions, RelationPath, PATH_SEPARATOR};
pub use sort::{parse_sort_list, SortDirection, SortToken};

use crate::planner::{CompileError, CompileResult};

/// Aggregate counts a request may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MetaKey {
    #[serde(rename = "totalCount")]
    TotalCount,
    #[serde(rename = "filterCount")]
    FilterCount,
}

impl MetaKey {
    pub const ALL: [MetaKey; 2] = [MetaKey::TotalCount, MetaKey::FilterCount];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetaKey::TotalCount => "totalCount",
            MetaKey::FilterCount => "filterCount",
        }
    }

    pub fn parse(s: &str) -> CompileResult<Self> {
        match s.trim() {
            "totalCount" => Ok(MetaKey::TotalCount),
            "filterCount" => Ok(MetaKey::FilterCount),
            other => Err(CompileError::query_invalid(format!(
                "Unknown meta key '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses `"totalCount,filterCount"`, `"*"` or `["totalCount"]`
pub fn parse_meta(value: &Value) -> CompileResult<BTreeSet<MetaKey>> {
    let names: Vec<&str> = match value {
        Value::String(s) if s.trim() == "*" => return Ok(MetaKey::ALL.into_iter().collect()),
        Value::String(s) => s.split(',').filter(|k| !k.trim().is_empty()).collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| CompileError::query_invalid("Meta keys must be strings"))
            })
            .collect::<CompileResult<_>>()?,
        _ => {
            return Err(CompileError::query_invalid(
                "Meta must be a string or an array of strings",
            ))
        }
    };
    names.into_iter().map(MetaKey::parse).collect()
}

/// A parsed, immutable find request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub table_name: String,
    pub filter: Option<FilterNode>,
    pub sort: Vec<SortToken>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub meta: BTreeSet<MetaKey>,
    pub deep: BTreeMap<RelationPath, RelationOptions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WireRequest {
    table_name: String,
    #[serde(default)]
    filter: Option<Value>,
    #[serde(default)]
    sort: Option<Value>,
    #[serde(default)]
    page: Option<u64>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    meta: Option<Value>,
    #[serde(default)]
    deep: Option<BTreeMap<String, WireRelationOptions>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireRelationOptions {
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    sort: Option<Value>,
}

impl QueryRequest {
    /// Request for every row of a table with default pagination
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            filter: None,
            sort: Vec::new(),
            page: None,
            limit: None,
            meta: BTreeSet::new(),
            deep: BTreeMap::new(),
        }
    }

    /// Decodes the JSON wire shape
    pub fn from_json(value: &Value) -> CompileResult<Self> {
        let wire = WireRequest::deserialize(value)
            .map_err(|e| CompileError::query_invalid(format!("Malformed request: {}", e)))?;

        if wire.table_name.trim().is_empty() {
            return Err(CompileError::query_invalid("tableName must not be empty"));
        }

        let filter = match wire.filter {
            Some(Value::Null) | None => None,
            Some(ref f) => Some(parse_filter(f)?),
        };
        let sort = match wire.sort {
            Some(ref s) => parse_sort_list(s)?,
            None => Vec::new(),
        };
        let meta = match wire.meta {
            Some(ref m) => parse_meta(m)?,
            None => BTreeSet::new(),
        };

        let mut deep = BTreeMap::new();
        for (path, options) in wire.deep.unwrap_or_default() {
            let sort = match options.sort {
                Some(ref s) => parse_sort_list(s)?,
                None => Vec::new(),
            };
            deep.insert(
                RelationPath::parse(&path)?,
                RelationOptions {
                    limit: options.limit,
                    sort,
                },
            );
        }

        Ok(Self {
            table_name: wire.table_name,
            filter,
            sort,
            page: wire.page,
            limit: wire.limit,
            meta,
            deep,
        })
    }

    /// Decodes a JSON string
    pub fn from_json_str(s: &str) -> CompileResult<Self> {
        let value: Value = serde_json::from_str(s)
            .map_err(|e| CompileError::query_invalid(format!("Invalid JSON: {}", e)))?;
        Self::from_json(&value)
    }

    pub fn with_filter(mut self, filter: FilterNode) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortToken>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_meta(mut self, key: MetaKey) -> Self {
        self.meta.insert(key);
        self
    }

    pub fn with_deep(mut self, path: RelationPath, options: RelationOptions) -> Self {
        self.deep.insert(path, options);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::CompileErrorCode;
    use serde_json::json;

    #[test]
    fn test_full_request() {
        let request = QueryRequest::from_json(&json!({
            "tableName": "user",
            "filter": {"age": {"_gt": 30}},
            "sort": ["-age", "-id"],
            "page": 2,
            "limit": 10,
            "meta": "totalCount,filterCount",
            "deep": {
                "posts": {"limit": 2, "sort": "-views"},
                "posts__comments": {"limit": 3}
            }
        }))
        .unwrap();

        assert_eq!(request.table_name, "user");
        assert_eq!(
            request.filter,
            Some(FilterNode::field("age", FieldOp::Gt(json!(30))))
        );
        assert_eq!(request.sort, vec![SortToken::desc("age"), SortToken::desc("id")]);
        assert_eq!(request.page, Some(2));
        assert_eq!(request.limit, Some(10));
        assert_eq!(request.meta.len(), 2);

        let posts = &request.deep[&RelationPath::parse("posts").unwrap()];
        assert_eq!(posts.limit, Some(2));
        assert_eq!(posts.sort, vec![SortToken::desc("views")]);
        let comments = &request.deep[&RelationPath::parse("posts__comments").unwrap()];
        assert_eq!(comments.limit, Some(3));
        assert!(comments.sort.is_empty());
    }

    #[test]
    fn test_minimal_request() {
        let request = QueryRequest::from_json(&json!({"tableName": "user"})).unwrap();
        assert_eq!(request, QueryRequest::new("user"));
    }

    #[test]
    fn test_meta_forms() {
        let all = parse_meta(&json!("*")).unwrap();
        assert_eq!(all.len(), 2);
        let one = parse_meta(&json!(["filterCount"])).unwrap();
        assert!(one.contains(&MetaKey::FilterCount));
        assert!(!one.contains(&MetaKey::TotalCount));
        assert!(parse_meta(&json!("")).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_requests() {
        let cases = vec![
            json!({}),
            json!({"tableName": ""}),
            json!({"tableName": "user", "page": -1}),
            json!({"tableName": "user", "limit": "10"}),
            json!({"tableName": "user", "meta": "rowCount"}),
            json!({"tableName": "user", "unknown": true}),
            json!({"tableName": "user", "deep": {"posts": {"offset": 1}}}),
            json!({"tableName": "user", "deep": {"posts__": {}}}),
        ];
        for case in cases {
            let err = QueryRequest::from_json(&case).unwrap_err();
            assert_eq!(err.code(), CompileErrorCode::QueryInvalid, "case {}", case);
        }
    }

    #[test]
    fn test_from_json_str() {
        let request = QueryRequest::from_json_str(r#"{"tableName":"post","limit":5}"#).unwrap();
        assert_eq!(request.limit, Some(5));
        assert!(QueryRequest::from_json_str("not json").is_err());
    }
}

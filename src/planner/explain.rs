//! Explain plan output
//!
//! Produces deterministic, human-readable output of every statement a find
//! request would issue, without issuing any.

use std::fmt;

use serde::Serialize;

use super::query::ExecutableQuery;
use super::sql::{render_count, render_query, Dialect, SqlStatement};
use crate::config::DeepRanking;
use crate::count::CountSpec;
use crate::find::FindError;
use crate::request::{MetaKey, RelationPath};

/// A count statement keyed by its meta key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainCount {
    pub key: &'static str,
    pub statement: SqlStatement,
}

/// A deep-load statement for one relation path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainDeep {
    pub path: String,
    pub depth: usize,
    pub ranking: DeepRanking,
    /// Rendered against a single placeholder parent key
    pub statement: SqlStatement,
}

/// Explain plan output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainPlan {
    /// Whether compilation succeeded
    pub accepted: bool,
    pub dialect: Dialect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<SqlStatement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub counts: Vec<ExplainCount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deep: Vec<ExplainDeep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl ExplainPlan {
    /// Starts an accepted plan from the root query
    pub fn from_query(root: &ExecutableQuery, dialect: Dialect) -> Self {
        Self {
            accepted: true,
            dialect,
            root: Some(render_query(root, dialect)),
            counts: Vec::new(),
            deep: Vec::new(),
            rejection_code: None,
            rejection_reason: None,
        }
    }

    /// Creates a rejected plan from a compile failure
    pub fn from_error(err: &FindError, dialect: Dialect) -> Self {
        Self {
            accepted: false,
            dialect,
            root: None,
            counts: Vec::new(),
            deep: Vec::new(),
            rejection_code: Some(err.code().to_string()),
            rejection_reason: Some(err.to_string()),
        }
    }

    pub fn with_count(mut self, key: MetaKey, spec: &CountSpec) -> Self {
        self.counts.push(ExplainCount {
            key: key.as_str(),
            statement: render_count(spec, self.dialect),
        });
        self
    }

    pub fn with_deep(mut self, path: &RelationPath, ranking: DeepRanking, query: &ExecutableQuery) -> Self {
        self.deep.push(ExplainDeep {
            path: path.to_string(),
            depth: path.depth(),
            ranking,
            statement: render_query(query, self.dialect),
        });
        self
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;
        writeln!(f, "Dialect: {}", self.dialect)?;

        if !self.accepted {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
            return Ok(());
        }

        writeln!(f, "Status: ACCEPTED")?;
        if let Some(root) = &self.root {
            writeln!(f, "Root:")?;
            write_statement(f, root)?;
        }
        for count in &self.counts {
            writeln!(f, "Count {}:", count.key)?;
            write_statement(f, &count.statement)?;
        }
        for deep in &self.deep {
            writeln!(f, "Deep {} (depth {}, {:?}):", deep.path, deep.depth, deep.ranking)?;
            write_statement(f, &deep.statement)?;
        }
        Ok(())
    }
}

fn write_statement(f: &mut fmt::Formatter<'_>, statement: &SqlStatement) -> fmt::Result {
    writeln!(f, "  {}", statement.sql)?;
    if !statement.params.is_empty() {
        let params: Vec<String> = statement.params.iter().map(|p| p.to_string()).collect();
        writeln!(f, "  params: [{}]", params.join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ColumnRef, Predicate};
    use crate::planner::CompileError;
    use crate::request::FieldOp;
    use serde_json::json;

    fn root() -> ExecutableQuery {
        let mut query = ExecutableQuery::scan("user", "id");
        query.filter.push(Predicate::Compare {
            column: ColumnRef::new("t0", "name"),
            op: FieldOp::Eq(json!("alice")),
        });
        query.limit = Some(10);
        query
    }

    #[test]
    fn test_explain_accepted_plan() {
        let explain = ExplainPlan::from_query(&root(), Dialect::Postgres);
        assert!(explain.accepted);

        let output = format!("{}", explain);
        assert!(output.contains("ACCEPTED"));
        assert!(output.contains(r#"WHERE "t0"."name" = $1"#));
        assert!(output.contains(r#"params: ["alice"]"#));
    }

    #[test]
    fn test_explain_rejected_plan() {
        let err = FindError::from(CompileError::unknown_operator("_regex"));
        let explain = ExplainPlan::from_error(&err, Dialect::Sqlite);

        assert!(!explain.accepted);
        assert_eq!(explain.rejection_code, Some("QUERY_UNKNOWN_OPERATOR".into()));

        let output = format!("{}", explain);
        assert!(output.contains("REJECTED"));
        assert!(output.contains("QUERY_UNKNOWN_OPERATOR"));
    }

    #[test]
    fn test_explain_deterministic() {
        let first = format!("{}", ExplainPlan::from_query(&root(), Dialect::Sqlite));
        let second = format!("{}", ExplainPlan::from_query(&root(), Dialect::Sqlite));
        assert_eq!(first, second);
    }

    #[test]
    fn test_explain_serializes_without_empty_sections() {
        let explain = ExplainPlan::from_query(&root(), Dialect::Postgres);
        let value = serde_json::to_value(&explain).unwrap();
        assert_eq!(value["accepted"], json!(true));
        assert_eq!(value["dialect"], json!("postgres"));
        assert!(value.get("counts").is_none());
        assert!(value.get("rejection_code").is_none());
    }
}

//! Relation paths and per-path load options

use std::fmt;

use serde::Serialize;

use super::sort::SortToken;
use crate::planner::{CompileError, CompileResult};

/// Separator between relation names in paths (`posts__comments`)
pub const PATH_SEPARATOR: &str = "__";

/// A chain of relation names starting at the root table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationPath(Vec<String>);

impl RelationPath {
    /// Parses `a__b__c`
    pub fn parse(s: &str) -> CompileResult<Self> {
        let segments: Vec<String> = s.split(PATH_SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(|seg| seg.is_empty()) {
            return Err(CompileError::query_invalid(format!(
                "Invalid relation path '{}'",
                s
            )));
        }
        Ok(Self(segments))
    }

    /// Builds a path from segments. Empty segments are not checked.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of relations in the path
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The path without its last relation, or `None` at depth 1
    pub fn parent(&self) -> Option<RelationPath> {
        if self.0.len() <= 1 {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Last relation name
    pub fn last(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    /// Extends the path by one relation
    pub fn child(&self, relation: &str) -> RelationPath {
        let mut segments = self.0.clone();
        segments.push(relation.to_string());
        Self(segments)
    }
}

impl fmt::Display for RelationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(PATH_SEPARATOR))
    }
}

impl Serialize for RelationPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Options for one deep-loaded relation path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelationOptions {
    /// Maximum related rows per parent
    pub limit: Option<u64>,
    /// Ordering local to the related table
    pub sort: Vec<SortToken>,
}

impl RelationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sort(mut self, sort: Vec<SortToken>) -> Self {
        self.sort = sort;
        self
    }
}

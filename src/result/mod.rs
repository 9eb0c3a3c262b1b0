//! # Result Assembler
//!
//! Builds the response of a find call from the loaded rows and the counts
//! that were run. Pure: the same inputs always give the same result.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::executor::Row;
use crate::request::MetaKey;

/// Response of a find call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Vec<Value>,
    /// Requested counts by meta key; omitted when none was requested
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, u64>,
}

impl QueryResult {
    /// Combines rows and counts, keeping only requested meta keys
    pub fn assemble(rows: Vec<Row>, counts: &BTreeMap<MetaKey, u64>, requested: &BTreeSet<MetaKey>) -> Self {
        let meta = counts
            .iter()
            .filter(|(key, _)| requested.contains(key))
            .map(|(key, count)| (key.as_str().to_string(), *count))
            .collect();

        Self {
            data: rows.into_iter().map(Value::Object).collect(),
            meta,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn meta(&self, key: MetaKey) -> Option<u64> {
        self.meta.get(key.as_str()).copied()
    }
}

//! # Deep Loader
//!
//! Loads declared relation paths level by level:
//!
//! 1. Collect distinct non-null join keys from the parent rows
//! 2. Skip the path when there are none; its children are skipped too
//! 3. Issue one batched `IN` query per path; paths of one level run
//!    concurrently
//! 4. Keep at most `limit` rows per parent key
//!
//! Once every level is fetched, rows are attached bottom-up as arrays,
//! empty when nothing matched. To-one relations attach at most one row.

use std::collections::{BTreeMap, HashMap, HashSet};

use futures_util::future::try_join_all;
use serde_json::Value;

use super::plan::{DeepPlan, DeepStep};
use crate::executor::{canonical_key, QueryExecutor, Row};
use crate::find::{FindError, FindResult};
use crate::observability::{log_event, Event, QueryMetrics};
use crate::request::RelationPath;
use crate::schema::Cardinality;

pub struct DeepLoader<'a> {
    executor: &'a dyn QueryExecutor,
    metrics: &'a QueryMetrics,
    request_id: &'a str,
}

impl<'a> DeepLoader<'a> {
    pub fn new(executor: &'a dyn QueryExecutor, metrics: &'a QueryMetrics, request_id: &'a str) -> Self {
        Self {
            executor,
            metrics,
            request_id,
        }
    }

    /// Loads every step of `plan` and attaches the results to `roots`
    pub async fn load(&self, plan: &DeepPlan, mut roots: Vec<Row>) -> FindResult<Vec<Row>> {
        let mut fetched: BTreeMap<RelationPath, Vec<Row>> = BTreeMap::new();

        for level in plan.levels() {
            let loads = level.iter().map(|step| {
                let parents: &[Row] = match step.parent() {
                    Some(parent) => fetched.get(&parent).map(Vec::as_slice).unwrap_or_default(),
                    None => &roots,
                };
                self.fetch(step, parents)
            });
            let results = try_join_all(loads).await?;
            for (step, rows) in level.iter().zip(results) {
                fetched.insert(step.path.clone(), rows);
            }
        }

        for level in plan.levels().iter().rev() {
            for step in level {
                let children = fetched.remove(&step.path).unwrap_or_default();
                let parents = match step.parent() {
                    Some(parent) => match fetched.get_mut(&parent) {
                        Some(rows) => rows,
                        None => continue,
                    },
                    None => &mut roots,
                };
                attach(step, parents, children);
            }
        }

        Ok(roots)
    }

    async fn fetch(&self, step: &DeepStep, parents: &[Row]) -> FindResult<Vec<Row>> {
        let path = step.path.to_string();
        let keys = distinct_keys(parents, &step.parent_column);
        if keys.is_empty() {
            self.metrics.increment_deep_paths_skipped();
            log_event(
                Event::DeepSkipped,
                &[("request_id", self.request_id), ("path", path.as_str())],
            );
            return Ok(Vec::new());
        }

        let key_count = keys.len().to_string();
        self.metrics.increment_deep_queries();
        log_event(
            Event::DeepQuery,
            &[
                ("request_id", self.request_id),
                ("path", path.as_str()),
                ("keys", key_count.as_str()),
            ],
        );

        let query = step.query_for(keys);
        let rows = self.executor.execute_query(&query).await.map_err(FindError::from)?;
        Ok(match step.limit {
            Some(limit) => truncate_per_key(rows, &step.target_column, limit),
            None => rows,
        })
    }
}

/// Distinct non-null values of `column`, in first-seen order
fn distinct_keys(rows: &[Row], column: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(column))
        .filter(|value| canonical_key(value).is_some_and(|key| seen.insert(key)))
        .cloned()
        .collect()
}

fn truncate_per_key(rows: Vec<Row>, column: &str, limit: u64) -> Vec<Row> {
    let mut taken: HashMap<Option<String>, u64> = HashMap::new();
    rows.into_iter()
        .filter(|row| {
            let key = row.get(column).and_then(canonical_key);
            let n = taken.entry(key).or_insert(0);
            *n += 1;
            *n <= limit
        })
        .collect()
}

fn attach(step: &DeepStep, parents: &mut [Row], children: Vec<Row>) {
    let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
    for child in children {
        if let Some(key) = child.get(&step.target_column).and_then(canonical_key) {
            groups.entry(key).or_default().push(Value::Object(child));
        }
    }

    for parent in parents {
        let group = parent
            .get(&step.parent_column)
            .and_then(canonical_key)
            .and_then(|key| groups.get(&key));
        let related: Vec<Value> = match step.cardinality {
            Cardinality::ToMany => group.cloned().unwrap_or_default(),
            Cardinality::ToOne => group.and_then(|g| g.first()).cloned().into_iter().collect(),
        };
        parent.insert(step.relation.clone(), Value::Array(related));
    }
}

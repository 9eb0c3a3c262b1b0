//! # Count Engine
//!
//! Derives the auxiliary count queries behind `meta`:
//!
//! - `totalCount`: distinct primary keys of the whole table
//! - `filterCount`: distinct primary keys matching the root query's joins,
//!   WHERE and HAVING, ignoring ordering and pagination
//!
//! Count specs are derived at compile time; only requested keys are run,
//! and requested counts run concurrently.

use std::collections::{BTreeMap, BTreeSet};

use futures_util::future::try_join_all;
use serde::Serialize;

use crate::executor::QueryExecutor;
use crate::filter::{HavingPredicate, JoinKind, JoinPlan, Predicate, ROOT_ALIAS};
use crate::find::FindResult;
use crate::observability::{log_event, Event, QueryMetrics};
use crate::planner::ExecutableQuery;
use crate::request::MetaKey;
use crate::schema::TableSchema;

/// A `COUNT(DISTINCT pk)` query over a root table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountSpec {
    pub table: String,
    pub alias: String,
    pub primary_key: String,
    pub joins: JoinPlan,
    pub filter: Vec<Predicate>,
    pub having: Vec<HavingPredicate>,
}

impl CountSpec {
    /// Counts every row of `table`
    pub fn total(table: &TableSchema) -> Self {
        Self {
            table: table.name.clone(),
            alias: ROOT_ALIAS.to_string(),
            primary_key: table.primary_key.clone(),
            joins: JoinPlan::new(),
            filter: Vec::new(),
            having: Vec::new(),
        }
    }

    /// Counts the rows `query` selects before ordering and pagination.
    ///
    /// Lookup joins and aggregate joins used only for ordering never change
    /// the matching set, so they are dropped.
    pub fn filtered(query: &ExecutableQuery) -> Self {
        let having_aliases: BTreeSet<&str> = query.having.iter().map(|h| h.alias.as_str()).collect();
        let mut joins = query.joins.clone();
        joins.retain(|join| match &join.kind {
            JoinKind::Filter => true,
            JoinKind::Lookup => false,
            JoinKind::Aggregate(_) => having_aliases.contains(join.link.alias.as_str()),
        });

        Self {
            table: query.table.clone(),
            alias: query.alias.clone(),
            primary_key: query.primary_key.clone(),
            joins,
            filter: query.filter.clone(),
            having: query.having.clone(),
        }
    }
}

pub struct CountEngine;

impl CountEngine {
    /// Count specs for the requested meta keys, in key order
    pub fn plan(
        requested: &BTreeSet<MetaKey>,
        table: &TableSchema,
        root: &ExecutableQuery,
    ) -> Vec<(MetaKey, CountSpec)> {
        requested
            .iter()
            .map(|key| {
                let spec = match key {
                    MetaKey::TotalCount => CountSpec::total(table),
                    MetaKey::FilterCount => CountSpec::filtered(root),
                };
                (*key, spec)
            })
            .collect()
    }

    /// Runs every spec concurrently. Any failure fails the whole call.
    pub async fn run(
        executor: &dyn QueryExecutor,
        specs: &[(MetaKey, CountSpec)],
        metrics: &QueryMetrics,
        request_id: &str,
    ) -> FindResult<BTreeMap<MetaKey, u64>> {
        let counts = specs.iter().map(|(key, spec)| async move {
            metrics.increment_count_queries();
            log_event(
                Event::CountQuery,
                &[("request_id", request_id), ("key", key.as_str()), ("table", spec.table.as_str())],
            );
            let count = executor.execute_count(spec).await?;
            Ok::<_, crate::find::FindError>((*key, count))
        });

        Ok(try_join_all(counts).await?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FindConfig, ToManySortPolicy};
    use crate::filter::compile_filter;
    use crate::planner::QueryPlanner;
    use crate::request::{parse_filter, parse_sort_list};
    use crate::schema::SchemaProvider;
    use crate::sort::SortResolver;
    use crate::test_fixtures::{blog_catalog, blog_engine};
    use serde_json::{json, Value};

    fn root_query(filter: Value, sort: Value) -> ExecutableQuery {
        let catalog = blog_catalog();
        let user = catalog.resolve_table("user").unwrap();
        let node = parse_filter(&filter).unwrap();
        let predicates = compile_filter(&catalog, &user, Some(&node)).unwrap();
        let order = SortResolver::new(&catalog, ToManySortPolicy::DirectionAware)
            .resolve(&parse_sort_list(&sort).unwrap(), &user)
            .unwrap();
        let config = FindConfig::default();
        QueryPlanner::new(&config)
            .plan(&user, predicates, order, Some(2), Some(1))
            .unwrap()
    }

    fn requested(keys: &[MetaKey]) -> BTreeSet<MetaKey> {
        keys.iter().copied().collect()
    }

    #[test]
    fn test_plan_only_requested_keys() {
        let catalog = blog_catalog();
        let user = catalog.resolve_table("user").unwrap();
        let root = root_query(json!({}), json!([]));

        assert!(CountEngine::plan(&BTreeSet::new(), &user, &root).is_empty());

        let specs = CountEngine::plan(&requested(&[MetaKey::FilterCount]), &user, &root);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].0, MetaKey::FilterCount);
    }

    #[test]
    fn test_filtered_spec_drops_ordering_joins() {
        let root = root_query(
            json!({"posts": {"_count": {"_gte": 1}}, "age": {"_gt": 20}}),
            json!(["-posts__views"]),
        );
        assert_eq!(root.joins.len(), 2);

        let spec = CountSpec::filtered(&root);
        let aliases: Vec<&str> = spec.joins.iter().map(|j| j.link.alias.as_str()).collect();
        assert_eq!(aliases, vec!["a1"]);
        assert_eq!(spec.filter.len(), 1);
        assert_eq!(spec.having.len(), 1);
    }

    #[tokio::test]
    async fn test_counts_ignore_pagination() {
        let engine = blog_engine();
        let catalog = blog_catalog();
        let user = catalog.resolve_table("user").unwrap();
        let root = root_query(json!({"age": {"_gt": 30}}), json!([]));
        let metrics = QueryMetrics::new();

        let specs = CountEngine::plan(
            &requested(&[MetaKey::TotalCount, MetaKey::FilterCount]),
            &user,
            &root,
        );
        let counts = CountEngine::run(&engine, &specs, &metrics, "r-1").await.unwrap();

        assert_eq!(counts[&MetaKey::TotalCount], 8);
        // ages over 30: 35, 41, 35, 52, 33, 47
        assert_eq!(counts[&MetaKey::FilterCount], 6);
        assert_eq!(metrics.snapshot().count_queries, 2);
    }

    #[tokio::test]
    async fn test_count_failure_propagates() {
        let engine = blog_engine().with_failing_counts();
        let catalog = blog_catalog();
        let user = catalog.resolve_table("user").unwrap();
        let root = root_query(json!({}), json!([]));
        let specs = CountEngine::plan(&requested(&[MetaKey::TotalCount]), &user, &root);

        let err = CountEngine::run(&engine, &specs, &QueryMetrics::new(), "r-1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "EXECUTION_QUERY_FAILED");
    }
}

//! In-memory query engine
//!
//! Executes planned queries over JSON rows held in memory, following the
//! same semantics as the rendered SQL:
//!
//! 1. Bind root rows to the root alias
//! 2. Expand filter joins (inner) and lookup joins (left)
//! 3. Attach pre-aggregated join values
//! 4. Apply WHERE predicates
//! 5. Collapse to one tuple per root primary key when grouped
//! 6. Apply HAVING predicates
//! 7. Sort, then rank within partitions when partitioned
//! 8. Apply offset and limit
//!
//! Datasets look like `{"tables": [<TableSchema>...], "rows": {"user": [...]}}`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::errors::{ExecutionError, ExecutionResult};
use super::filters::{aggregate, matches_op, PredicateFilter, Tuple};
use super::sorter::ResultSorter;
use super::value::{canonical_key, compare_values};
use super::{ExecutionFuture, QueryExecutor, Row};
use crate::count::CountSpec;
use crate::filter::{AggregateFn, AggregateJoin, ColumnRef, HavingPredicate, JoinKind, JoinLink, JoinPlan, Predicate};
use crate::planner::ExecutableQuery;
use crate::request::SortDirection;
use crate::schema::{Catalog, NotFoundError, SchemaError, SchemaProvider, SchemaResult, TableSchema};

#[derive(Debug, Deserialize)]
struct DatasetFile {
    tables: Vec<TableSchema>,
    #[serde(default)]
    rows: BTreeMap<String, Vec<Value>>,
}

struct Source<'q> {
    table: &'q str,
    alias: &'q str,
    primary_key: &'q str,
    joins: &'q JoinPlan,
    filter: &'q [Predicate],
    group: bool,
    having: &'q [HavingPredicate],
}

/// Query executor and schema provider over in-memory rows
#[derive(Debug)]
pub struct MemoryEngine {
    catalog: Catalog,
    tables: BTreeMap<String, Vec<Row>>,
    queries: AtomicU64,
    failing_counts: bool,
    failing_tables: BTreeSet<String>,
    latency: Option<Duration>,
}

impl MemoryEngine {
    /// Creates an engine with an empty table for every catalog table
    pub fn new(catalog: Catalog) -> Self {
        let tables = catalog
            .table_names()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        Self {
            catalog,
            tables,
            queries: AtomicU64::new(0),
            failing_counts: false,
            failing_tables: BTreeSet::new(),
            latency: None,
        }
    }

    /// Builds an engine from a dataset JSON value
    pub fn from_dataset(value: Value) -> SchemaResult<Self> {
        let file: DatasetFile = serde_json::from_value(value)?;
        Self::from_file(file)
    }

    /// Loads a dataset file from disk
    pub fn load(path: &Path) -> SchemaResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let file: DatasetFile = serde_json::from_str(&content)?;
        Self::from_file(file)
    }

    fn from_file(file: DatasetFile) -> SchemaResult<Self> {
        let mut engine = Self::new(Catalog::new(file.tables)?);
        for (table, rows) in file.rows {
            for row in rows {
                engine.insert(&table, row)?;
            }
        }
        Ok(engine)
    }

    /// Appends a row. Rows must be objects with a non-null primary key.
    pub fn insert(&mut self, table: &str, row: Value) -> SchemaResult<()> {
        let schema = self
            .catalog
            .resolve_table(table)
            .map_err(|_| SchemaError::UnknownDatasetTable(table.to_string()))?;
        let Value::Object(row) = row else {
            return Err(SchemaError::InvalidRow {
                table: table.to_string(),
                reason: "row must be a JSON object".into(),
            });
        };
        if row.get(&schema.primary_key).map_or(true, Value::is_null) {
            return Err(SchemaError::InvalidRow {
                table: table.to_string(),
                reason: format!("missing primary key '{}'", schema.primary_key),
            });
        }
        self.tables.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, Vec::len)
    }

    /// Number of queries issued since creation or the last reset
    pub fn queries_issued(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn reset_queries(&self) {
        self.queries.store(0, Ordering::Relaxed);
    }

    /// Makes every count query fail
    pub fn with_failing_counts(mut self) -> Self {
        self.failing_counts = true;
        self
    }

    /// Makes every row query against `table` fail
    pub fn with_failing_table(mut self, table: impl Into<String>) -> Self {
        self.failing_tables.insert(table.into());
        self
    }

    /// Delays every query
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Wraps the engine for use as both schema provider and executor
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    async fn begin(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn run_query(&self, query: &ExecutableQuery) -> ExecutionResult<Vec<Row>> {
        let mut tuples = self.select(&Source {
            table: &query.table,
            alias: &query.alias,
            primary_key: &query.primary_key,
            joins: &query.joins,
            filter: &query.filter,
            group: query.group_by_primary_key,
            having: &query.having,
        })?;

        ResultSorter::sort(&mut tuples, &query.order);

        if let Some(partition) = &query.partition {
            let column = ColumnRef::new(&query.alias, &partition.column);
            let mut ranks: HashMap<Option<String>, u64> = HashMap::new();
            tuples.retain(|t| {
                let rank = ranks.entry(canonical_key(&t.value(&column))).or_insert(0);
                *rank += 1;
                *rank <= partition.limit
            });
            tuples.sort_by(|a, b| compare_values(&a.value(&column), &b.value(&column)));
        }

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        Ok(tuples
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|t| t.row(&query.alias).cloned())
            .collect())
    }

    fn run_count(&self, spec: &CountSpec) -> ExecutionResult<u64> {
        let tuples = self.select(&Source {
            table: &spec.table,
            alias: &spec.alias,
            primary_key: &spec.primary_key,
            joins: &spec.joins,
            filter: &spec.filter,
            group: true,
            having: &spec.having,
        })?;
        Ok(tuples.len() as u64)
    }

    fn select<'a>(&'a self, source: &Source<'_>) -> ExecutionResult<Vec<Tuple<'a>>> {
        let filter = PredicateFilter::new(&self.tables);
        let base = self
            .tables
            .get(source.table)
            .ok_or_else(|| ExecutionError::unknown_table(source.table))?;

        let mut tuples: Vec<Tuple<'a>> = base.iter().map(|row| Tuple::root(source.alias, row)).collect();

        for join in source.joins.iter() {
            let link = &join.link;
            match &join.kind {
                JoinKind::Filter | JoinKind::Lookup => {
                    let keep_unmatched = matches!(join.kind, JoinKind::Lookup);
                    let mut expanded = Vec::with_capacity(tuples.len());
                    for tuple in &tuples {
                        let related = filter.related(tuple, link)?;
                        if related.is_empty() && keep_unmatched {
                            expanded.push(tuple.bind(&link.alias, None));
                        }
                        for row in related {
                            expanded.push(tuple.bind(&link.alias, Some(row)));
                        }
                    }
                    tuples = expanded;
                }
                JoinKind::Aggregate(aggregate_join) => {
                    let values = self.aggregate_values(&filter, link, aggregate_join)?;
                    let parent = ColumnRef::new(&link.parent_alias, &link.parent_column);
                    for tuple in &mut tuples {
                        let value = canonical_key(&tuple.value(&parent))
                            .and_then(|key| values.get(&key).cloned())
                            .unwrap_or(Value::Null);
                        tuple.set_aggregate(&link.alias, value);
                    }
                }
            }
        }

        let mut matched = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            if filter.matches(&tuple, source.filter)? {
                matched.push(tuple);
            }
        }

        if source.group {
            let key_column = ColumnRef::new(source.alias, source.primary_key);
            let mut seen = HashSet::new();
            matched.retain(|t| seen.insert(canonical_key(&t.value(&key_column))));
        }

        if source.having.is_empty() {
            return Ok(matched);
        }
        let mut kept = Vec::with_capacity(matched.len());
        for tuple in matched {
            if Self::matches_having(&tuple, source.having)? {
                kept.push(tuple);
            }
        }
        Ok(kept)
    }

    fn matches_having(tuple: &Tuple<'_>, having: &[HavingPredicate]) -> ExecutionResult<bool> {
        for h in having {
            let mut value = tuple.aggregate(&h.alias);
            if h.func == AggregateFn::Count && value.is_null() {
                value = Value::from(0u64);
            }
            if !matches_op(h.func.as_str(), &value, &h.op)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Aggregate value per join key over the linked table
    fn aggregate_values(
        &self,
        filter: &PredicateFilter<'_>,
        link: &JoinLink,
        join: &AggregateJoin,
    ) -> ExecutionResult<HashMap<String, Value>> {
        let rows = self
            .tables
            .get(&link.table)
            .ok_or_else(|| ExecutionError::unknown_table(&link.table))?;

        let mut groups: BTreeMap<String, Vec<&Row>> = BTreeMap::new();
        for row in rows {
            if let Some(scope) = &join.scope {
                if !filter.eval(&Tuple::root(&link.alias, row), scope)? {
                    continue;
                }
            }
            if let Some(key) = row.get(&link.column).and_then(canonical_key) {
                groups.entry(key).or_default().push(row);
            }
        }

        let mut values = HashMap::with_capacity(groups.len());
        for (key, mut group) in groups {
            if join.func == AggregateFn::First {
                group.sort_by(|a, b| {
                    for (column, direction) in &join.order {
                        let null = Value::Null;
                        let ordering = compare_values(
                            a.get(column).unwrap_or(&null),
                            b.get(column).unwrap_or(&null),
                        );
                        let ordering = match direction {
                            SortDirection::Asc => ordering,
                            SortDirection::Desc => ordering.reverse(),
                        };
                        if ordering != std::cmp::Ordering::Equal {
                            return ordering;
                        }
                    }
                    std::cmp::Ordering::Equal
                });
            }
            values.insert(key, aggregate(join.func, join.column.as_deref(), &group)?);
        }
        Ok(values)
    }
}

impl SchemaProvider for MemoryEngine {
    fn resolve_table(&self, name: &str) -> Result<Arc<TableSchema>, NotFoundError> {
        self.catalog.resolve_table(name)
    }
}

impl QueryExecutor for MemoryEngine {
    fn execute_query<'a>(&'a self, query: &'a ExecutableQuery) -> ExecutionFuture<'a, Vec<Row>> {
        Box::pin(async move {
            self.begin().await;
            if self.failing_tables.contains(&query.table) {
                return Err(ExecutionError::unavailable(format!(
                    "table '{}' is unavailable",
                    query.table
                )));
            }
            self.run_query(query)
        })
    }

    fn execute_count<'a>(&'a self, spec: &'a CountSpec) -> ExecutionFuture<'a, u64> {
        Box::pin(async move {
            self.begin().await;
            if self.failing_counts {
                return Err(ExecutionError::query_failed(format!(
                    "count over '{}' failed",
                    spec.table
                )));
            }
            self.run_count(spec)
        })
    }
}

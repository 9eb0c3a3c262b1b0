//! Find service

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::errors::{FindError, FindResult};
use crate::config::FindConfig;
use crate::count::{CountEngine, CountSpec};
use crate::deep::{DeepLoader, DeepPlan};
use crate::executor::QueryExecutor;
use crate::filter::compile_filter;
use crate::observability::{log_event, Event, ObservationScope, QueryMetrics};
use crate::planner::{Dialect, ExecutableQuery, ExplainPlan, QueryPlanner};
use crate::request::{MetaKey, QueryRequest};
use crate::result::QueryResult;
use crate::schema::{SchemaProvider, TableSchema};
use crate::sort::SortResolver;

/// Stands in for the parent key list of a deep query in explain output
const PARENT_KEYS_PLACEHOLDER: &str = "<parent keys>";

/// Everything a request will execute, compiled up front
#[derive(Debug, Clone)]
pub struct CompiledFind {
    pub table: Arc<TableSchema>,
    pub root: ExecutableQuery,
    pub counts: Vec<(MetaKey, CountSpec)>,
    pub deep: DeepPlan,
    pub meta: BTreeSet<MetaKey>,
}

impl CompiledFind {
    /// Upper bound on the queries this request issues
    pub fn planned_queries(&self) -> usize {
        1 + self.counts.len() + self.deep.len()
    }

    pub fn explain(&self, dialect: Dialect) -> ExplainPlan {
        let mut plan = ExplainPlan::from_query(&self.root, dialect);
        for (key, spec) in &self.counts {
            plan = plan.with_count(*key, spec);
        }
        for step in self.deep.steps() {
            let query = step.query_for(vec![Value::String(PARENT_KEYS_PLACEHOLDER.to_string())]);
            plan = plan.with_deep(&step.path, step.ranking, &query);
        }
        plan
    }
}

/// Executes find requests against a schema provider and an executor
pub struct FindService {
    schema: Arc<dyn SchemaProvider>,
    executor: Arc<dyn QueryExecutor>,
    config: FindConfig,
    metrics: Arc<QueryMetrics>,
}

impl FindService {
    pub fn new(schema: Arc<dyn SchemaProvider>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            schema,
            executor,
            config: FindConfig::default(),
            metrics: Arc::new(QueryMetrics::new()),
        }
    }

    pub fn with_config(mut self, config: FindConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares a metrics registry across services
    pub fn with_metrics(mut self, metrics: Arc<QueryMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &FindConfig {
        &self.config
    }

    pub fn metrics(&self) -> &QueryMetrics {
        &self.metrics
    }

    /// Compiles a request without executing anything
    pub fn compile(&self, request: &QueryRequest) -> FindResult<CompiledFind> {
        let schema = self.schema.as_ref();
        let table = schema.resolve_table(&request.table_name)?;

        let deep = DeepPlan::compile(&table, &request.deep, schema, &self.config)?;
        let predicates = compile_filter(schema, &table, request.filter.as_ref())?;
        let order = SortResolver::new(schema, self.config.to_many_sort)
            .with_deep(&request.deep)
            .resolve(&request.sort, &table)?;
        let root = QueryPlanner::new(&self.config).plan(&table, predicates, order, request.page, request.limit)?;
        let counts = CountEngine::plan(&request.meta, &table, &root);

        Ok(CompiledFind {
            table,
            root,
            counts,
            deep,
            meta: request.meta.clone(),
        })
    }

    pub async fn find(&self, request: &QueryRequest) -> FindResult<QueryResult> {
        self.run(request, None).await
    }

    /// Like `find`, but aborts every in-flight query once `token` fires
    pub async fn find_with_cancellation(
        &self,
        request: &QueryRequest,
        token: &CancellationToken,
    ) -> FindResult<QueryResult> {
        self.run(request, Some(token)).await
    }

    /// Renders every statement a request would issue
    pub fn explain(&self, request: &QueryRequest, dialect: Dialect) -> ExplainPlan {
        log_event(
            Event::ExplainBegin,
            &[("table", request.table_name.as_str()), ("dialect", dialect.to_string().as_str())],
        );
        let plan = match self.compile(request) {
            Ok(compiled) => compiled.explain(dialect),
            Err(err) => ExplainPlan::from_error(&err, dialect),
        };
        log_event(
            Event::ExplainComplete,
            &[("accepted", if plan.accepted { "true" } else { "false" })],
        );
        plan
    }

    async fn run(&self, request: &QueryRequest, cancel: Option<&CancellationToken>) -> FindResult<QueryResult> {
        let request_id = Uuid::new_v4().to_string();
        let scope = ObservationScope::new(
            "FIND",
            vec![
                ("request_id", request_id.clone()),
                ("table", request.table_name.clone()),
            ],
        );

        let compiled = match self.compile(request) {
            Ok(compiled) => compiled,
            Err(err) => {
                self.metrics.increment_finds_rejected();
                scope.reject(err.code(), &err.to_string());
                return Err(err);
            }
        };

        let work = self.execute(&compiled, &request_id);
        let outcome = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(FindError::Cancelled),
                result = work => result,
            },
            None => work.await,
        };

        match outcome {
            Ok(result) => {
                let rows = result.len();
                self.metrics.increment_finds_completed();
                self.metrics.add_rows_returned(rows as u64);
                scope.complete(&[("rows", rows.to_string().as_str())]);
                Ok(result)
            }
            Err(FindError::Cancelled) => {
                self.metrics.increment_finds_cancelled();
                scope.cancel();
                Err(FindError::Cancelled)
            }
            Err(err) => {
                self.metrics.increment_finds_failed();
                scope.fail(err.code(), &err.to_string());
                Err(err)
            }
        }
    }

    async fn execute(&self, compiled: &CompiledFind, request_id: &str) -> FindResult<QueryResult> {
        let executor = self.executor.as_ref();

        self.metrics.increment_root_queries();
        log_event(
            Event::RootQuery,
            &[("request_id", request_id), ("table", compiled.root.table.as_str())],
        );
        let rows = executor.execute_query(&compiled.root).await?;

        let loader = DeepLoader::new(executor, &self.metrics, request_id);
        let (counts, rows) = tokio::try_join!(
            CountEngine::run(executor, &compiled.counts, &self.metrics, request_id),
            loader.load(&compiled.deep, rows),
        )?;

        Ok(QueryResult::assemble(rows, &counts, &compiled.meta))
    }
}

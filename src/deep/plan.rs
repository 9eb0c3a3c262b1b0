//! Deep-load planning
//!
//! Every declared relation path is compiled before the root query runs, so
//! a bad path fails the request without issuing any query. Steps are
//! grouped into levels by path depth; a level only depends on the level
//! above it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::{DeepRanking, FindConfig};
use crate::filter::{ColumnRef, Predicate, PredicatePlan, ROOT_ALIAS};
use crate::find::FindResult;
use crate::planner::{check_limit, CompileError, ExecutableQuery, QueryPlanner, RankPartition};
use crate::request::{FieldOp, RelationOptions, RelationPath};
use crate::schema::{Cardinality, NotFoundError, SchemaProvider, TableSchema};
use crate::sort::SortResolver;

/// One batched load of a relation path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeepStep {
    pub path: RelationPath,
    /// Relation name; also the field attached to parent rows
    pub relation: String,
    pub cardinality: Cardinality,
    /// Join column read from parent rows
    pub parent_column: String,
    /// Join column matched on related rows
    pub target_column: String,
    /// Rows kept per parent; `None` keeps all
    pub limit: Option<u64>,
    pub ranking: DeepRanking,
    /// Columns of the related table
    columns: Vec<String>,
    template: ExecutableQuery,
}

impl DeepStep {
    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    /// Parent path; `None` for relations of the root table
    pub fn parent(&self) -> Option<RelationPath> {
        self.path.parent()
    }

    /// The batched query for a set of parent keys
    pub fn query_for(&self, keys: Vec<Value>) -> ExecutableQuery {
        let mut query = self.template.clone();
        query.filter.push(Predicate::Compare {
            column: ColumnRef::new(ROOT_ALIAS, &self.target_column),
            op: FieldOp::In(keys),
        });
        if let (Some(limit), DeepRanking::Window, Cardinality::ToMany) =
            (self.limit, self.ranking, self.cardinality)
        {
            query.partition = Some(RankPartition {
                column: self.target_column.clone(),
                limit,
                columns: self.columns.clone(),
            });
        }
        query
    }
}

/// Deep-load steps grouped by depth, shallowest first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeepPlan {
    levels: Vec<Vec<DeepStep>>,
}

impl DeepPlan {
    /// Compiles every declared path against the root table
    pub fn compile(
        root: &Arc<TableSchema>,
        deep: &BTreeMap<RelationPath, RelationOptions>,
        schema: &dyn SchemaProvider,
        config: &FindConfig,
    ) -> FindResult<Self> {
        let mut levels: Vec<Vec<DeepStep>> = Vec::new();

        for (path, options) in deep {
            if path.depth() > config.max_deep_depth {
                return Err(CompileError::deep_too_deep(path.to_string(), config.max_deep_depth).into());
            }
            if let Some(parent) = path.parent() {
                if !deep.contains_key(&parent) {
                    return Err(CompileError::deep_parent_missing(path.to_string(), parent.to_string()).into());
                }
            }

            let step = Self::compile_step(root, path, options, schema, config)?;
            let depth = path.depth();
            if levels.len() < depth {
                levels.resize_with(depth, Vec::new);
            }
            levels[depth - 1].push(step);
        }

        Ok(Self { levels })
    }

    fn compile_step(
        root: &Arc<TableSchema>,
        path: &RelationPath,
        options: &RelationOptions,
        schema: &dyn SchemaProvider,
        config: &FindConfig,
    ) -> FindResult<DeepStep> {
        let mut table = Arc::clone(root);
        let mut relation = None;
        for segment in path.segments() {
            let next = table
                .relation(segment)
                .ok_or_else(|| NotFoundError::RelationPath(path.to_string()))?
                .clone();
            table = schema.resolve_table(&next.target)?;
            relation = Some(next);
        }
        let relation = relation.ok_or_else(|| NotFoundError::RelationPath(path.to_string()))?;

        if let Some(limit) = options.limit {
            check_limit(limit, config)?;
        }

        let order = SortResolver::new(schema, config.to_many_sort).resolve(&options.sort, &table)?;
        let template = QueryPlanner::assemble(&table, PredicatePlan::default(), order);
        let columns = table.columns.iter().map(|c| c.name.clone()).collect();

        Ok(DeepStep {
            path: path.clone(),
            relation: relation.name,
            cardinality: relation.cardinality,
            parent_column: relation.source_column,
            target_column: relation.target_column,
            limit: options.limit,
            ranking: config.deep_ranking,
            columns,
            template,
        })
    }

    pub fn levels(&self) -> &[Vec<DeepStep>] {
        &self.levels
    }

    pub fn steps(&self) -> impl Iterator<Item = &DeepStep> {
        self.levels.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}

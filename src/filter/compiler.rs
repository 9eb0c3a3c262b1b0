//! # Filter Compiler
//!
//! Turns a `FilterNode` tree into a `PredicatePlan`.
//!
//! Nodes in conjunctive position (reached from the root through `_and`
//! and relation filters only) compile to joins: the first relation filter
//! on a path becomes an inner join shared with its own nested filters, and
//! root-level aggregate filters become pre-aggregated joins plus HAVING
//! predicates.
//!
//! Relation and aggregate filters below `_or` / `_not`, aggregates nested
//! under a relation filter, and any further relation filter on a path that
//! is already joined compile to correlated subqueries. Each relation filter
//! is then matched by its own related row, and `_not(x)` is exactly the
//! complement of `x`.

use std::sync::Arc;

use serde::Serialize;

use super::joins::{
    join_alias, AggregateFn, AggregateJoin, JoinKind, JoinLink, JoinPlan, PlannedJoin, ROOT_ALIAS,
};
use super::predicate::{ColumnRef, HavingPredicate, Predicate, Subquery};
use crate::find::FindResult;
use crate::planner::CompileError;
use crate::request::{AggregateFilter, FieldPredicate, FilterNode, RelationPath};
use crate::schema::{RelationDef, SchemaProvider, TableSchema};

/// Output of filter compilation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredicatePlan {
    /// Conjunction applied as WHERE
    pub root_predicates: Vec<Predicate>,
    pub joins: JoinPlan,
    /// Conjunction applied as HAVING after grouping by the root key
    pub having: Vec<HavingPredicate>,
}

/// Where a node is being compiled
struct Scope {
    alias: String,
    table: Arc<TableSchema>,
    /// `Some` for path joins, `None` for the root and for subqueries
    path: Option<RelationPath>,
    /// True when joins may still be added (root and path joins)
    joinable: bool,
}

impl Scope {
    fn root(table: Arc<TableSchema>) -> Self {
        Self {
            alias: ROOT_ALIAS.to_string(),
            table,
            path: None,
            joinable: true,
        }
    }

    fn correlated(alias: String, table: Arc<TableSchema>) -> Self {
        Self {
            alias,
            table,
            path: None,
            joinable: false,
        }
    }

    fn is_root(&self) -> bool {
        self.joinable && self.path.is_none()
    }

    fn child_path(&self, relation: &str) -> RelationPath {
        match &self.path {
            Some(path) => path.child(relation),
            None => RelationPath::from_segments([relation]),
        }
    }
}

/// Compiles filter trees against a schema provider
pub struct FilterCompiler<'a> {
    schema: &'a dyn SchemaProvider,
    joins: JoinPlan,
    having: Vec<HavingPredicate>,
    aggregate_seq: usize,
    subquery_seq: usize,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(schema: &'a dyn SchemaProvider) -> Self {
        Self {
            schema,
            joins: JoinPlan::new(),
            having: Vec::new(),
            aggregate_seq: 0,
            subquery_seq: 0,
        }
    }

    /// Compiles `filter` rooted at `table`. `None` matches every row.
    pub fn compile(
        mut self,
        table: &Arc<TableSchema>,
        filter: Option<&FilterNode>,
    ) -> FindResult<PredicatePlan> {
        let root_predicates = match filter {
            Some(node) => self.compile_conjunctive(node, &Scope::root(Arc::clone(table)))?,
            None => Vec::new(),
        };
        Ok(PredicatePlan {
            root_predicates,
            joins: self.joins,
            having: self.having,
        })
    }

    fn compile_conjunctive(&mut self, node: &FilterNode, scope: &Scope) -> FindResult<Vec<Predicate>> {
        match node {
            FilterNode::And(children) => {
                let mut predicates = Vec::new();
                for child in children {
                    predicates.extend(self.compile_conjunctive(child, scope)?);
                }
                Ok(predicates)
            }
            FilterNode::Field(field) => Ok(vec![compare(scope, field)?]),
            FilterNode::Relation(filter) => {
                let (relation, target) = self.resolve_relation(&scope.table, &filter.relation)?;
                let path = scope.child_path(&relation.name);
                let alias = join_alias(&path);
                if self.joins.get(&alias).is_some() {
                    // a sibling filter owns this join
                    return Ok(vec![self.compile_expression(node, scope)?]);
                }
                self.joins.add(PlannedJoin {
                    link: JoinLink::new(alias.clone(), scope.alias.clone(), &relation, &target),
                    kind: JoinKind::Filter,
                });
                let inner = Scope {
                    alias,
                    table: target,
                    path: Some(path),
                    joinable: true,
                };
                self.compile_conjunctive(&filter.child, &inner)
            }
            FilterNode::Aggregate(filter) if scope.is_root() => {
                self.root_aggregate(scope, filter)?;
                Ok(Vec::new())
            }
            FilterNode::Aggregate(_) | FilterNode::Or(_) | FilterNode::Not(_) => {
                Ok(vec![self.compile_expression(node, scope)?])
            }
        }
    }

    /// Compiles a node to a standalone expression with no new joins
    fn compile_expression(&mut self, node: &FilterNode, scope: &Scope) -> FindResult<Predicate> {
        match node {
            FilterNode::And(children) => Ok(Predicate::And(
                children
                    .iter()
                    .map(|c| self.compile_expression(c, scope))
                    .collect::<FindResult<_>>()?,
            )),
            FilterNode::Or(children) => Ok(Predicate::Or(
                children
                    .iter()
                    .map(|c| self.compile_expression(c, scope))
                    .collect::<FindResult<_>>()?,
            )),
            FilterNode::Not(child) => Ok(Predicate::Not(Box::new(
                self.compile_expression(child, scope)?,
            ))),
            FilterNode::Field(field) => compare(scope, field),
            FilterNode::Relation(filter) => {
                let (relation, target) = self.resolve_relation(&scope.table, &filter.relation)?;
                let subquery = self.subquery(scope, &relation, target, Some(filter.child.as_ref()))?;
                Ok(Predicate::Exists(Box::new(subquery)))
            }
            FilterNode::Aggregate(filter) => {
                let (relation, target) = self.resolve_relation(&scope.table, &filter.relation)?;
                let (func, column) = aggregate_target(filter, &target)?;
                let subquery = self.subquery(scope, &relation, target, filter.scope.as_deref())?;
                Ok(Predicate::AggregateCompare {
                    subquery: Box::new(subquery),
                    func,
                    column,
                    op: filter.op.clone(),
                })
            }
        }
    }

    fn subquery(
        &mut self,
        scope: &Scope,
        relation: &RelationDef,
        target: Arc<TableSchema>,
        filter: Option<&FilterNode>,
    ) -> FindResult<Subquery> {
        self.subquery_seq += 1;
        let alias = format!("s{}", self.subquery_seq);
        let link = JoinLink::new(alias.clone(), scope.alias.clone(), relation, &target);
        let inner = Scope::correlated(alias, target);
        let predicate = match filter {
            Some(node) if !node.is_match_all() => Some(self.compile_expression(node, &inner)?),
            _ => None,
        };
        Ok(Subquery { link, predicate })
    }

    fn root_aggregate(&mut self, scope: &Scope, filter: &AggregateFilter) -> FindResult<()> {
        let (relation, target) = self.resolve_relation(&scope.table, &filter.relation)?;
        let (func, column) = aggregate_target(filter, &target)?;

        self.aggregate_seq += 1;
        let alias = format!("a{}", self.aggregate_seq);
        let link = JoinLink::new(alias.clone(), scope.alias.clone(), &relation, &target);
        let inner = Scope::correlated(alias.clone(), target);
        let aggregate_scope = match filter.scope.as_deref() {
            Some(node) if !node.is_match_all() => Some(self.compile_expression(node, &inner)?),
            _ => None,
        };

        self.joins.add(PlannedJoin {
            link,
            kind: JoinKind::Aggregate(AggregateJoin {
                func,
                column,
                scope: aggregate_scope,
                order: Vec::new(),
            }),
        });
        self.having.push(HavingPredicate {
            alias,
            func,
            op: filter.op.clone(),
        });
        Ok(())
    }

    fn resolve_relation(
        &self,
        table: &TableSchema,
        name: &str,
    ) -> FindResult<(RelationDef, Arc<TableSchema>)> {
        let relation = table.relation(name).ok_or_else(|| {
            if table.has_column(name) {
                CompileError::query_invalid(format!(
                    "Column '{}' requires an operator",
                    name
                ))
            } else {
                CompileError::unknown_relation(&table.name, name)
            }
        })?;
        let target = self.schema.resolve_table(&relation.target)?;
        Ok((relation.clone(), target))
    }
}

fn compare(scope: &Scope, field: &FieldPredicate) -> FindResult<Predicate> {
    if !scope.table.has_column(&field.field) {
        let err = if scope.table.relation(&field.field).is_some() {
            CompileError::query_invalid(format!(
                "Relation '{}' cannot be compared with '{}'",
                field.field,
                field.op.name()
            ))
        } else {
            CompileError::unknown_field(&scope.table.name, field.field.as_str())
        };
        return Err(err.into());
    }
    Ok(Predicate::Compare {
        column: ColumnRef::new(scope.alias.clone(), field.field.clone()),
        op: field.op.clone(),
    })
}

/// Validates the aggregated column against the related table
fn aggregate_target(
    filter: &AggregateFilter,
    target: &TableSchema,
) -> Result<(AggregateFn, Option<String>), CompileError> {
    let func = AggregateFn::from(filter.kind);
    let column = match (&filter.field, func) {
        (None, AggregateFn::Count) => return Ok((func, None)),
        (None, _) => {
            return Err(CompileError::missing_aggregate_field(
                filter.kind.key(),
                filter.relation.as_str(),
            ))
        }
        (Some(column), _) => column,
    };

    let def = target
        .column(column)
        .ok_or_else(|| CompileError::unknown_field(&target.name, column.as_str()))?;
    if matches!(func, AggregateFn::Sum | AggregateFn::Avg) && !def.column_type.is_numeric() {
        return Err(CompileError::invalid_aggregate(format!(
            "'{}' requires a numeric column, '{}.{}' is {}",
            filter.kind.key(),
            target.name,
            column,
            def.column_type.as_str()
        )));
    }
    Ok((func, Some(column.clone())))
}

/// Compiles a filter tree. Convenience wrapper over `FilterCompiler`.
pub fn compile_filter(
    schema: &dyn SchemaProvider,
    table: &Arc<TableSchema>,
    filter: Option<&FilterNode>,
) -> FindResult<PredicatePlan> {
    FilterCompiler::new(schema).compile(table, filter)
}

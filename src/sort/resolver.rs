//! # Sort Resolver
//!
//! Turns sort tokens into order terms and the joins they need.
//!
//! - Root columns need no join.
//! - To-one hops become left lookup joins.
//! - A to-many hop must be the last relation in the path. When that path is
//!   deep-loaded, the row sorts by the first related row under the deep
//!   sort; otherwise by an aggregate picked by `ToManySortPolicy`.
//! - Primary key ascending is always the final term.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::ToManySortPolicy;
use crate::filter::{
    join_alias, AggregateFn, AggregateJoin, ColumnRef, JoinKind, JoinLink, JoinPlan, PlannedJoin,
    ROOT_ALIAS,
};
use crate::find::FindResult;
use crate::planner::CompileError;
use crate::request::{RelationOptions, RelationPath, SortDirection, SortToken};
use crate::schema::{Cardinality, SchemaProvider, TableSchema};

/// What an order term sorts by
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKey {
    Column(ColumnRef),
    /// Value of the aggregate join with this alias
    Aggregate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderTerm {
    pub key: OrderKey,
    pub direction: SortDirection,
}

impl OrderTerm {
    pub fn column(alias: &str, column: &str, direction: SortDirection) -> Self {
        Self {
            key: OrderKey::Column(ColumnRef::new(alias, column)),
            direction,
        }
    }
}

/// Output of sort resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderPlan {
    pub terms: Vec<OrderTerm>,
    pub joins: JoinPlan,
}

/// Resolves sort tokens against a schema provider
pub struct SortResolver<'a> {
    schema: &'a dyn SchemaProvider,
    policy: ToManySortPolicy,
    deep: Option<&'a BTreeMap<RelationPath, RelationOptions>>,
}

impl<'a> SortResolver<'a> {
    pub fn new(schema: &'a dyn SchemaProvider, policy: ToManySortPolicy) -> Self {
        Self {
            schema,
            policy,
            deep: None,
        }
    }

    /// Deep-load options consulted when sorting by to-many columns
    pub fn with_deep(mut self, deep: &'a BTreeMap<RelationPath, RelationOptions>) -> Self {
        self.deep = Some(deep);
        self
    }

    pub fn resolve(&self, tokens: &[SortToken], table: &Arc<TableSchema>) -> FindResult<OrderPlan> {
        let mut plan = OrderPlan::default();
        let mut aggregate_seq = 0;

        for token in tokens {
            let term = match token.path.as_slice() {
                [column] => {
                    if !table.has_column(column) {
                        return Err(CompileError::unknown_field(&table.name, column.as_str()).into());
                    }
                    OrderTerm::column(ROOT_ALIAS, column, token.direction)
                }
                [relations @ .., column] => {
                    self.resolve_path(token, relations, column, table, &mut plan.joins, &mut aggregate_seq)?
                }
                [] => return Err(CompileError::query_invalid("Empty sort token").into()),
            };
            plan.terms.push(term);
        }

        let tiebreak = OrderTerm::column(ROOT_ALIAS, &table.primary_key, SortDirection::Asc);
        let has_key_term = plan.terms.iter().any(|t| t.key == tiebreak.key);
        if !has_key_term {
            plan.terms.push(tiebreak);
        }
        Ok(plan)
    }

    fn resolve_path(
        &self,
        token: &SortToken,
        relations: &[String],
        column: &str,
        root: &Arc<TableSchema>,
        joins: &mut JoinPlan,
        aggregate_seq: &mut usize,
    ) -> FindResult<OrderTerm> {
        let mut table = Arc::clone(root);
        let mut alias = ROOT_ALIAS.to_string();
        let mut path: Option<RelationPath> = None;

        for (i, name) in relations.iter().enumerate() {
            let relation = table
                .relation(name)
                .ok_or_else(|| CompileError::unknown_relation(&table.name, name.as_str()))?
                .clone();
            let target = self.schema.resolve_table(&relation.target)?;
            let next_path = match &path {
                Some(p) => p.child(name),
                None => RelationPath::from_segments([name.as_str()]),
            };

            if relation.cardinality == Cardinality::ToMany {
                if i + 1 != relations.len() {
                    return Err(CompileError::unsupported_sort(
                        token.path_string(),
                        "a to-many relation must be the last hop",
                    )
                    .into());
                }
                if !target.has_column(column) {
                    return Err(CompileError::unknown_field(&target.name, column).into());
                }

                *aggregate_seq += 1;
                let agg_alias = format!("o{}", aggregate_seq);
                let aggregate = self.to_many_aggregate(token, &next_path, column, &target)?;
                joins.add(PlannedJoin {
                    link: JoinLink::new(agg_alias.clone(), alias, &relation, &target),
                    kind: JoinKind::Aggregate(aggregate),
                });
                return Ok(OrderTerm {
                    key: OrderKey::Aggregate(agg_alias),
                    direction: token.direction,
                });
            }

            let lookup_alias = join_alias(&next_path);
            joins.add(PlannedJoin {
                link: JoinLink::new(lookup_alias.clone(), alias, &relation, &target),
                kind: JoinKind::Lookup,
            });
            alias = lookup_alias;
            table = target;
            path = Some(next_path);
        }

        if !table.has_column(column) {
            return Err(CompileError::unknown_field(&table.name, column).into());
        }
        Ok(OrderTerm::column(&alias, column, token.direction))
    }

    /// Picks the value a to-many relation contributes to the parent's order
    fn to_many_aggregate(
        &self,
        token: &SortToken,
        path: &RelationPath,
        column: &str,
        target: &TableSchema,
    ) -> FindResult<AggregateJoin> {
        let deep_options = self.deep.and_then(|deep| deep.get(path));
        let Some(options) = deep_options else {
            return Ok(AggregateJoin {
                func: self.policy.aggregate(token.direction),
                column: Some(column.to_string()),
                scope: None,
                order: Vec::new(),
            });
        };

        let mut order = Vec::with_capacity(options.sort.len() + 1);
        for deep_token in &options.sort {
            let deep_column = deep_token.as_column().ok_or_else(|| {
                CompileError::unsupported_sort(
                    token.path_string(),
                    "deep sort used for ordering must reference plain columns",
                )
            })?;
            if !target.has_column(deep_column) {
                return Err(CompileError::unknown_field(&target.name, deep_column).into());
            }
            order.push((deep_column.to_string(), deep_token.direction));
        }
        if !order.iter().any(|(c, _)| *c == target.primary_key) {
            order.push((target.primary_key.clone(), SortDirection::Asc));
        }

        Ok(AggregateJoin {
            func: AggregateFn::First,
            column: Some(column.to_string()),
            scope: None,
            order,
        })
    }
}

//! Filter compilation: filter trees to predicates, joins and HAVING

mod compiler;
mod joins;
mod predicate;

pub use compiler::{compile_filter, FilterCompiler, PredicatePlan};
pub use joins::{
    join_alias, AggregateFn, AggregateJoin, JoinKind, JoinLink, JoinPlan, PlannedJoin, ROOT_ALIAS,
};
pub use predicate::{ColumnRef, HavingPredicate, Predicate, Subquery};

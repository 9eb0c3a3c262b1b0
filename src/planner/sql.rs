//! SQL rendering
//!
//! Renders executable queries and count specs as parameterised SQL for a
//! relational engine. Identifiers are always quoted; values are always bound.
//!
//! Aggregate joins render as pre-aggregated derived tables keyed by the join
//! column (`__key`, `__value`), so they never multiply root rows. `First`
//! uses `ROW_NUMBER()` and keeps rank 1. `NOT p` renders as
//! `NOT COALESCE(p, FALSE)` to keep predicate logic two-valued.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use super::query::ExecutableQuery;
use crate::count::CountSpec;
use crate::filter::{
    AggregateFn, AggregateJoin, ColumnRef, HavingPredicate, JoinKind, JoinPlan, Predicate, Subquery,
};
use crate::request::{FieldOp, SortDirection};
use crate::sort::{OrderKey, OrderTerm};

/// Target SQL dialect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(format!("unknown dialect '{}'", other)),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// SQL text with its bound parameters in placeholder order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

struct SqlWriter {
    dialect: Dialect,
    sql: String,
    params: Vec<Value>,
}

impl SqlWriter {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(256),
            params: Vec::new(),
        }
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn ident(&mut self, name: &str) {
        self.sql.push('"');
        self.sql.push_str(&name.replace('"', "\"\""));
        self.sql.push('"');
    }

    fn qualified(&mut self, alias: &str, column: &str) {
        self.ident(alias);
        self.sql.push('.');
        self.ident(column);
    }

    fn column(&mut self, column: &ColumnRef) {
        self.qualified(&column.alias, &column.column);
    }

    fn bind(&mut self, value: Value) {
        self.params.push(value);
        match self.dialect {
            Dialect::Postgres => {
                let n = self.params.len();
                self.sql.push_str(&format!("${}", n));
            }
            Dialect::Sqlite => self.sql.push('?'),
        }
    }

    fn finish(self) -> SqlStatement {
        SqlStatement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Renders a root or deep-load query
pub fn render_query(query: &ExecutableQuery, dialect: Dialect) -> SqlStatement {
    let mut w = SqlWriter::new(dialect);

    match &query.partition {
        Some(partition) => {
            w.push("SELECT ");
            for (i, column) in partition.columns.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.qualified("ranked", column);
            }
            w.push(" FROM (SELECT ");
            w.ident(&query.alias);
            w.push(".*, ROW_NUMBER() OVER (PARTITION BY ");
            w.qualified(&query.alias, &partition.column);
            if !query.order.is_empty() {
                w.push(" ORDER BY ");
                write_order(&mut w, query, &query.order);
            }
            w.push(") AS ");
            w.ident("__rank");
            write_from(&mut w, query);
            w.push(") AS ");
            w.ident("ranked");
            w.push(" WHERE ");
            w.qualified("ranked", "__rank");
            w.push(&format!(" <= {}", partition.limit));
            w.push(" ORDER BY ");
            w.qualified("ranked", &partition.column);
            w.push(", ");
            w.qualified("ranked", "__rank");
        }
        None => {
            w.push("SELECT ");
            w.ident(&query.alias);
            w.push(".*");
            write_from(&mut w, query);
            if !query.order.is_empty() {
                w.push(" ORDER BY ");
                write_order(&mut w, query, &query.order);
            }
        }
    }

    if let Some(limit) = query.limit {
        w.push(&format!(" LIMIT {}", limit));
    }
    if query.offset > 0 {
        w.push(&format!(" OFFSET {}", query.offset));
    }
    w.finish()
}

/// Renders a count query
pub fn render_count(spec: &CountSpec, dialect: Dialect) -> SqlStatement {
    let mut w = SqlWriter::new(dialect);
    let source = Source {
        table: &spec.table,
        alias: &spec.alias,
        primary_key: &spec.primary_key,
        joins: &spec.joins,
        filter: &spec.filter,
        group: !spec.having.is_empty(),
        having: &spec.having,
    };

    if spec.having.is_empty() {
        w.push("SELECT COUNT(DISTINCT ");
        w.qualified(&spec.alias, &spec.primary_key);
        w.push(")");
        write_source(&mut w, &source);
    } else {
        w.push("SELECT COUNT(*) FROM (SELECT ");
        w.qualified(&spec.alias, &spec.primary_key);
        write_source(&mut w, &source);
        w.push(") AS ");
        w.ident("counted");
    }
    w.finish()
}

struct Source<'a> {
    table: &'a str,
    alias: &'a str,
    primary_key: &'a str,
    joins: &'a JoinPlan,
    filter: &'a [Predicate],
    group: bool,
    having: &'a [HavingPredicate],
}

fn write_from(w: &mut SqlWriter, query: &ExecutableQuery) {
    write_source(
        w,
        &Source {
            table: &query.table,
            alias: &query.alias,
            primary_key: &query.primary_key,
            joins: &query.joins,
            filter: &query.filter,
            group: query.group_by_primary_key,
            having: &query.having,
        },
    );
}

fn write_source(w: &mut SqlWriter, source: &Source<'_>) {
    w.push(" FROM ");
    w.ident(source.table);
    w.push(" AS ");
    w.ident(source.alias);

    for join in source.joins.iter() {
        let link = &join.link;
        match &join.kind {
            JoinKind::Filter | JoinKind::Lookup => {
                w.push(if matches!(join.kind, JoinKind::Filter) {
                    " INNER JOIN "
                } else {
                    " LEFT JOIN "
                });
                w.ident(&link.table);
                w.push(" AS ");
                w.ident(&link.alias);
                w.push(" ON ");
                w.qualified(&link.alias, &link.column);
            }
            JoinKind::Aggregate(aggregate) => {
                w.push(" LEFT JOIN (");
                write_aggregate_table(w, &link.table, &link.alias, &link.column, aggregate);
                w.push(") AS ");
                w.ident(&link.alias);
                w.push(" ON ");
                w.qualified(&link.alias, "__key");
            }
        }
        w.push(" = ");
        w.qualified(&link.parent_alias, &link.parent_column);
    }

    if !source.filter.is_empty() {
        w.push(" WHERE ");
        write_conjunction(w, source.filter);
    }

    if source.group {
        w.push(" GROUP BY ");
        w.qualified(source.alias, source.primary_key);
    }

    if !source.having.is_empty() {
        w.push(" HAVING ");
        for (i, having) in source.having.iter().enumerate() {
            if i > 0 {
                w.push(" AND ");
            }
            write_comparison(
                w,
                |w| write_grouped_value(w, &having.alias, having.func),
                &having.op,
            );
        }
    }
}

fn write_grouped_value(w: &mut SqlWriter, alias: &str, func: AggregateFn) {
    if func == AggregateFn::Count {
        w.push("COALESCE(MAX(");
        w.qualified(alias, "__value");
        w.push("), 0)");
    } else {
        w.push("MAX(");
        w.qualified(alias, "__value");
        w.push(")");
    }
}

fn write_aggregate_table(
    w: &mut SqlWriter,
    table: &str,
    alias: &str,
    key_column: &str,
    aggregate: &AggregateJoin,
) {
    if aggregate.func == AggregateFn::First {
        w.push("SELECT ");
        w.qualified("r", "__key");
        w.push(", ");
        w.qualified("r", "__value");
        w.push(" FROM (SELECT ");
        w.qualified(alias, key_column);
        w.push(" AS ");
        w.ident("__key");
        w.push(", ");
        match &aggregate.column {
            Some(column) => w.qualified(alias, column),
            None => w.push("NULL"),
        }
        w.push(" AS ");
        w.ident("__value");
        w.push(", ROW_NUMBER() OVER (PARTITION BY ");
        w.qualified(alias, key_column);
        if !aggregate.order.is_empty() {
            w.push(" ORDER BY ");
            for (i, (column, direction)) in aggregate.order.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.qualified(alias, column);
                write_direction(w, *direction);
            }
        }
        w.push(") AS ");
        w.ident("__rank");
        w.push(" FROM ");
        w.ident(table);
        w.push(" AS ");
        w.ident(alias);
        write_scope(w, aggregate.scope.as_ref());
        w.push(") AS ");
        w.ident("r");
        w.push(" WHERE ");
        w.qualified("r", "__rank");
        w.push(" = 1");
        return;
    }

    w.push("SELECT ");
    w.qualified(alias, key_column);
    w.push(" AS ");
    w.ident("__key");
    w.push(", ");
    write_aggregate_call(w, alias, aggregate.func, aggregate.column.as_deref());
    w.push(" AS ");
    w.ident("__value");
    w.push(" FROM ");
    w.ident(table);
    w.push(" AS ");
    w.ident(alias);
    write_scope(w, aggregate.scope.as_ref());
    w.push(" GROUP BY ");
    w.qualified(alias, key_column);
}

fn write_scope(w: &mut SqlWriter, scope: Option<&Predicate>) {
    if let Some(predicate) = scope {
        w.push(" WHERE ");
        write_predicate(w, predicate);
    }
}

fn write_aggregate_call(w: &mut SqlWriter, alias: &str, func: AggregateFn, column: Option<&str>) {
    let name = match func {
        AggregateFn::Count => "COUNT",
        AggregateFn::Sum => "SUM",
        AggregateFn::Avg => "AVG",
        AggregateFn::Min | AggregateFn::First => "MIN",
        AggregateFn::Max => "MAX",
    };
    w.push(name);
    w.push("(");
    match column {
        Some(column) => w.qualified(alias, column),
        None => w.push("*"),
    }
    w.push(")");
}

fn write_order(w: &mut SqlWriter, query: &ExecutableQuery, terms: &[OrderTerm]) {
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        match &term.key {
            OrderKey::Column(column) if !query.group_by_primary_key || column.alias == query.alias => {
                w.column(column)
            }
            OrderKey::Column(column) => {
                w.push("MAX(");
                w.column(column);
                w.push(")");
            }
            OrderKey::Aggregate(alias) if query.group_by_primary_key => {
                w.push("MAX(");
                w.qualified(alias, "__value");
                w.push(")");
            }
            OrderKey::Aggregate(alias) => w.qualified(alias, "__value"),
        }
        write_direction(w, term.direction);
    }
}

/// NULL sorts lowest in both dialects
fn write_direction(w: &mut SqlWriter, direction: SortDirection) {
    w.push(" ");
    w.push(direction.as_str());
    if w.dialect == Dialect::Postgres {
        w.push(match direction {
            SortDirection::Asc => " NULLS FIRST",
            SortDirection::Desc => " NULLS LAST",
        });
    }
}

fn write_conjunction(w: &mut SqlWriter, predicates: &[Predicate]) {
    for (i, predicate) in predicates.iter().enumerate() {
        if i > 0 {
            w.push(" AND ");
        }
        write_predicate(w, predicate);
    }
}

fn write_predicate(w: &mut SqlWriter, predicate: &Predicate) {
    match predicate {
        Predicate::Compare { column, op } => write_comparison(w, |w| w.column(column), op),
        Predicate::And(children) | Predicate::Or(children) if children.is_empty() => {
            w.push(if matches!(predicate, Predicate::And(_)) {
                "TRUE"
            } else {
                "FALSE"
            })
        }
        Predicate::And(children) | Predicate::Or(children) => {
            let joiner = if matches!(predicate, Predicate::And(_)) {
                " AND "
            } else {
                " OR "
            };
            w.push("(");
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    w.push(joiner);
                }
                write_predicate(w, child);
            }
            w.push(")");
        }
        Predicate::Not(child) => {
            w.push("NOT COALESCE(");
            write_predicate(w, child);
            w.push(", FALSE)");
        }
        Predicate::Exists(subquery) => {
            w.push("EXISTS (SELECT 1");
            write_subquery_source(w, subquery);
            w.push(")");
        }
        Predicate::AggregateCompare {
            subquery,
            func,
            column,
            op,
        } => write_comparison(
            w,
            |w| {
                w.push("(SELECT ");
                write_aggregate_call(w, &subquery.link.alias, *func, column.as_deref());
                write_subquery_source(w, subquery);
                w.push(")");
            },
            op,
        ),
    }
}

fn write_subquery_source(w: &mut SqlWriter, subquery: &Subquery) {
    let link = &subquery.link;
    w.push(" FROM ");
    w.ident(&link.table);
    w.push(" AS ");
    w.ident(&link.alias);
    w.push(" WHERE ");
    w.qualified(&link.alias, &link.column);
    w.push(" = ");
    w.qualified(&link.parent_alias, &link.parent_column);
    if let Some(predicate) = &subquery.predicate {
        w.push(" AND ");
        write_predicate(w, predicate);
    }
}

/// Writes `<lhs> <op> <operand>`; `lhs` is written at most once
fn write_comparison<F>(w: &mut SqlWriter, lhs: F, op: &FieldOp)
where
    F: FnOnce(&mut SqlWriter),
{
    let binary = |w: &mut SqlWriter, lhs: F, sql_op: &str, value: &Value| {
        lhs(w);
        w.push(sql_op);
        w.bind(value.clone());
    };

    match op {
        FieldOp::Eq(Value::Null) | FieldOp::IsNull(true) => {
            lhs(w);
            w.push(" IS NULL");
        }
        FieldOp::Ne(Value::Null) | FieldOp::IsNull(false) => {
            lhs(w);
            w.push(" IS NOT NULL");
        }
        FieldOp::Eq(v) => binary(w, lhs, " = ", v),
        FieldOp::Ne(v) => binary(w, lhs, " <> ", v),
        FieldOp::Gt(v) => binary(w, lhs, " > ", v),
        FieldOp::Gte(v) => binary(w, lhs, " >= ", v),
        FieldOp::Lt(v) => binary(w, lhs, " < ", v),
        FieldOp::Lte(v) => binary(w, lhs, " <= ", v),
        FieldOp::In(values) if values.is_empty() => w.push("FALSE"),
        FieldOp::Nin(values) if values.is_empty() => {
            lhs(w);
            w.push(" IS NOT NULL");
        }
        FieldOp::In(values) | FieldOp::Nin(values) => {
            lhs(w);
            w.push(if matches!(op, FieldOp::In(_)) {
                " IN ("
            } else {
                " NOT IN ("
            });
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.bind(value.clone());
            }
            w.push(")");
        }
        FieldOp::Between(low, high) => {
            lhs(w);
            w.push(" BETWEEN ");
            w.bind(low.clone());
            w.push(" AND ");
            w.bind(high.clone());
        }
        FieldOp::Contains(s) => write_like(w, lhs, format!("%{}%", escape_like(s))),
        FieldOp::StartsWith(s) => write_like(w, lhs, format!("{}%", escape_like(s))),
        FieldOp::EndsWith(s) => write_like(w, lhs, format!("%{}", escape_like(s))),
    }
}

fn write_like<F>(w: &mut SqlWriter, lhs: F, pattern: String)
where
    F: FnOnce(&mut SqlWriter),
{
    lhs(w);
    w.push(" LIKE ");
    w.bind(Value::String(pattern));
    w.push(" ESCAPE '\\'");
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

//! Query planner
//!
//! Combines a predicate plan, an order plan and pagination into one
//! executable query. Rows are grouped by the root primary key whenever a
//! join fans out or any aggregate is present, so each root row appears once.

use super::errors::{CompileError, CompileResult};
use super::query::ExecutableQuery;
use crate::config::FindConfig;
use crate::filter::{PredicatePlan, ROOT_ALIAS};
use crate::schema::TableSchema;
use crate::sort::OrderPlan;

/// Validated pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    /// Resolves 1-based `page` and `limit` against configured bounds
    pub fn resolve(page: Option<u64>, limit: Option<u64>, config: &FindConfig) -> CompileResult<Self> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(config.default_limit);
        if page == 0 {
            return Err(CompileError::invalid_pagination("page must be >= 1"));
        }
        check_limit(limit, config)?;
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| CompileError::invalid_pagination("page * limit overflows"))?;
        Ok(Self { offset, limit })
    }
}

/// Rejects zero limits and limits above `max_limit`
pub fn check_limit(limit: u64, config: &FindConfig) -> CompileResult<()> {
    if limit == 0 {
        return Err(CompileError::invalid_pagination("limit must be >= 1"));
    }
    if limit > config.max_limit {
        return Err(CompileError::limit_exceeded(limit, config.max_limit));
    }
    Ok(())
}

/// Builds executable queries
pub struct QueryPlanner<'a> {
    config: &'a FindConfig,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(config: &'a FindConfig) -> Self {
        Self { config }
    }

    /// Plans the root query of a find request
    pub fn plan(
        &self,
        table: &TableSchema,
        predicates: PredicatePlan,
        order: OrderPlan,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> CompileResult<ExecutableQuery> {
        let page = Page::resolve(page, limit, self.config)?;
        let mut query = Self::assemble(table, predicates, order);
        query.offset = page.offset;
        query.limit = Some(page.limit);
        Ok(query)
    }

    /// Combines filter and order plans without pagination
    pub fn assemble(table: &TableSchema, predicates: PredicatePlan, order: OrderPlan) -> ExecutableQuery {
        let mut joins = predicates.joins;
        joins.merge(order.joins);

        let group_by_primary_key =
            joins.fans_out() || joins.has_aggregates() || !predicates.having.is_empty();

        ExecutableQuery {
            table: table.name.clone(),
            alias: ROOT_ALIAS.to_string(),
            primary_key: table.primary_key.clone(),
            joins,
            filter: predicates.root_predicates,
            group_by_primary_key,
            having: predicates.having,
            order: order.terms,
            partition: None,
            offset: 0,
            limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToManySortPolicy;
    use crate::filter::compile_filter;
    use crate::planner::CompileErrorCode;
    use crate::request::{parse_filter, parse_sort_list};
    use crate::schema::SchemaProvider;
    use crate::sort::SortResolver;
    use crate::test_fixtures::blog_catalog;
    use serde_json::{json, Value};

    fn plan(filter: Value, sort: Value, page: Option<u64>, limit: Option<u64>) -> CompileResult<ExecutableQuery> {
        let catalog = blog_catalog();
        let user = catalog.resolve_table("user").unwrap();
        let node = parse_filter(&filter).unwrap();
        let predicates = compile_filter(&catalog, &user, Some(&node)).unwrap();
        let tokens = parse_sort_list(&sort).unwrap();
        let order = SortResolver::new(&catalog, ToManySortPolicy::DirectionAware)
            .resolve(&tokens, &user)
            .unwrap();
        let config = FindConfig::default();
        QueryPlanner::new(&config).plan(&user, predicates, order, page, limit)
    }

    #[test]
    fn test_offset_from_page() {
        let query = plan(json!({}), json!([]), Some(3), Some(10)).unwrap();
        assert_eq!(query.offset, 20);
        assert_eq!(query.limit, Some(10));
        assert!(!query.group_by_primary_key);
    }

    #[test]
    fn test_default_limit() {
        let query = plan(json!({}), json!([]), None, None).unwrap();
        assert_eq!(query.offset, 0);
        assert_eq!(query.limit, Some(100));
    }

    #[test]
    fn test_pagination_errors() {
        let err = plan(json!({}), json!([]), Some(0), None).unwrap_err();
        assert_eq!(err.code(), CompileErrorCode::InvalidPagination);
        let err = plan(json!({}), json!([]), None, Some(0)).unwrap_err();
        assert_eq!(err.code(), CompileErrorCode::InvalidPagination);
        let err = plan(json!({}), json!([]), None, Some(1001)).unwrap_err();
        assert_eq!(err.code(), CompileErrorCode::LimitExceeded);
        let err = plan(json!({}), json!([]), Some(u64::MAX), Some(1000)).unwrap_err();
        assert_eq!(err.code(), CompileErrorCode::InvalidPagination);
    }

    #[test]
    fn test_grouping_rules() {
        let to_many = plan(json!({"posts": {"views": {"_gt": 1}}}), json!([]), None, None).unwrap();
        assert!(to_many.group_by_primary_key);

        let aggregate = plan(json!({"posts": {"_count": {"_gt": 1}}}), json!([]), None, None).unwrap();
        assert!(aggregate.group_by_primary_key);
        assert_eq!(aggregate.having.len(), 1);

        let sorted = plan(json!({}), json!(["-posts__views"]), None, None).unwrap();
        assert!(sorted.group_by_primary_key);

        let scalar = plan(json!({"age": {"_gt": 1}}), json!(["-age"]), None, None).unwrap();
        assert!(!scalar.group_by_primary_key);
    }

    #[test]
    fn test_filter_and_order_joins_are_merged() {
        let query = plan(
            json!({"posts": {"views": {"_gt": 1}}}),
            json!(["posts__views"]),
            None,
            None,
        )
        .unwrap();
        let aliases: Vec<&str> = query.joins.iter().map(|j| j.link.alias.as_str()).collect();
        assert_eq!(aliases, vec!["j_posts", "o1"]);
        assert_eq!(query.order.len(), 2);
    }
}

//! End-to-end find scenarios over the blog dataset
//!
//! - Filters restrict rows, sorts totally order them
//! - Counts are pagination invariant
//! - Identical requests give identical results
//! - Rejected requests issue no queries

mod common;

use std::sync::Arc;

use aeroquery::request::MetaKey;
use common::{engine, find, ids, request, service};
use serde_json::json;

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_comparison_filter() {
    let result = find(json!({"tableName": "user", "filter": {"age": {"_gt": 30}}})).await;
    assert_eq!(ids(&result), vec![2, 3, 4, 5, 6, 8]);
    assert!(result.data.iter().all(|u| u["age"].as_i64().unwrap() > 30));
}

#[tokio::test]
async fn test_every_comparison_holds_for_returned_rows() {
    for (op, bound) in [("_gt", 35), ("_gte", 35), ("_lt", 35), ("_lte", 35)] {
        let result = find(json!({"tableName": "user", "filter": {"age": {op: bound}}})).await;
        assert!(!result.is_empty(), "{} returned nothing", op);
        for user in &result.data {
            let age = user["age"].as_i64().unwrap();
            let holds = match op {
                "_gt" => age > bound,
                "_gte" => age >= bound,
                "_lt" => age < bound,
                _ => age <= bound,
            };
            assert!(holds, "age {} fails {} {}", age, op, bound);
        }
    }
}

#[tokio::test]
async fn test_sort_with_descending_tiebreak() {
    let result = find(json!({"tableName": "user", "sort": ["-age", "-id"]})).await;
    assert_eq!(ids(&result), vec![5, 8, 3, 4, 2, 6, 1, 7]);
}

#[tokio::test]
async fn test_ties_break_on_primary_key() {
    let result = find(json!({"tableName": "user", "sort": "age"})).await;
    assert_eq!(ids(&result), vec![7, 1, 6, 2, 4, 3, 8, 5]);
}

#[tokio::test]
async fn test_counts_are_pagination_invariant() {
    for (page, limit) in [(1, 2), (2, 2), (3, 5), (1, 100)] {
        let result = find(json!({
            "tableName": "user",
            "filter": {"age": {"_gt": 30}},
            "meta": "totalCount,filterCount",
            "page": page,
            "limit": limit
        }))
        .await;

        assert_eq!(result.meta(MetaKey::TotalCount), Some(8));
        assert_eq!(result.meta(MetaKey::FilterCount), Some(6));
        assert!(result.len() as u64 <= 6);
    }
}

#[tokio::test]
async fn test_pages_partition_the_filtered_rows() {
    let mut seen = Vec::new();
    for page in 1..=3 {
        let result = find(json!({
            "tableName": "user",
            "filter": {"age": {"_gt": 30}},
            "page": page,
            "limit": 4
        }))
        .await;
        seen.extend(ids(&result));
    }
    assert_eq!(seen, vec![2, 3, 4, 5, 6, 8]);
}

#[tokio::test]
async fn test_total_count_ignores_filter() {
    let result = find(json!({
        "tableName": "post",
        "filter": {"views": {"_gt": 90}},
        "meta": "*"
    }))
    .await;
    assert_eq!(result.meta(MetaKey::TotalCount), Some(18));
    assert_eq!(result.meta(MetaKey::FilterCount), Some(2));
    assert_eq!(ids(&result), vec![8, 16]);
}

#[tokio::test]
async fn test_filter_count_with_relation_join() {
    // users with at least one post over 80 views: 3, 4, 6, 8
    let result = find(json!({
        "tableName": "user",
        "filter": {"posts": {"views": {"_gt": 80}}},
        "meta": "filterCount",
        "limit": 1
    }))
    .await;
    assert_eq!(result.meta(MetaKey::FilterCount), Some(4));
    assert_eq!(result.len(), 1);
}

#[tokio::test]
async fn test_count_aggregate_filter() {
    let result = find(json!({"tableName": "user", "filter": {"posts": {"_count": {"_gte": 3}}}})).await;
    assert_eq!(ids(&result), vec![1, 3, 6, 8]);
}

#[tokio::test]
async fn test_or_filter() {
    let result = find(json!({
        "tableName": "user",
        "filter": {"_or": [{"age": {"_lt": 25}}, {"age": {"_gt": 45}}]}
    }))
    .await;
    assert_eq!(ids(&result), vec![1, 5, 7, 8]);
}

#[tokio::test]
async fn test_meta_omitted_unless_requested() {
    let result = find(json!({"tableName": "user", "limit": 1})).await;
    let wire = serde_json::to_value(&result).unwrap();
    assert!(wire.get("meta").is_none());
    assert_eq!(wire["data"].as_array().unwrap().len(), 1);
}

// =============================================================================
// Determinism and rejection
// =============================================================================

#[tokio::test]
async fn test_identical_requests_identical_results() {
    let engine = Arc::new(engine());
    let service = service(&engine);
    let request = request(json!({
        "tableName": "user",
        "filter": {"posts": {"views": {"_gt": 20}}},
        "sort": ["-posts__views"],
        "meta": "*",
        "deep": {"posts": {"limit": 2, "sort": "-views"}}
    }));

    let first = service.find(&request).await.unwrap();
    for _ in 0..5 {
        assert_eq!(service.find(&request).await.unwrap(), first);
    }
}

#[tokio::test]
async fn test_rejected_requests_issue_no_queries() {
    let engine = Arc::new(engine());
    let service = service(&engine);

    let cases = vec![
        (json!({"tableName": "nope"}), "NOT_FOUND_TABLE"),
        (json!({"tableName": "user", "filter": {"agee": {"_gt": 1}}}), "QUERY_UNKNOWN_FIELD"),
        (json!({"tableName": "user", "filter": {"age": {"_like": 1}}}), "QUERY_UNKNOWN_OPERATOR"),
        (json!({"tableName": "user", "filter": {"friends": {"age": {"_gt": 1}}}}), "QUERY_UNKNOWN_RELATION"),
        (json!({"tableName": "user", "sort": ["height"]}), "QUERY_UNKNOWN_FIELD"),
        (json!({"tableName": "user", "limit": 5000}), "QUERY_LIMIT_EXCEEDED"),
        (json!({"tableName": "user", "page": 0}), "QUERY_INVALID_PAGINATION"),
        (json!({"tableName": "user", "deep": {"friends": {}}}), "NOT_FOUND_RELATION_PATH"),
        (json!({"tableName": "user", "deep": {"posts__comments": {}}}), "QUERY_DEEP_PARENT_MISSING"),
    ];

    for (value, code) in cases {
        let err = service.find(&request(value.clone())).await.unwrap_err();
        assert_eq!(err.code(), code, "request {}", value);
        assert!(err.is_rejection());
    }
    assert_eq!(engine.queries_issued(), 0);
}

#[tokio::test]
async fn test_type_mismatch_is_execution_error() {
    let engine = Arc::new(engine());
    let service = service(&engine);
    let err = service
        .find(&request(json!({"tableName": "user", "filter": {"age": {"_gt": "old"}}})))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "EXECUTION_TYPE_MISMATCH");
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn test_failing_count_fails_request() {
    let engine = engine().with_failing_counts().shared();
    let service = service(&engine);

    let plain = request(json!({"tableName": "user"}));
    assert!(service.find(&plain).await.is_ok());

    let counted = request(json!({"tableName": "user", "meta": "filterCount"}));
    let err = service.find(&counted).await.unwrap_err();
    assert_eq!(err.code(), "EXECUTION_QUERY_FAILED");
}

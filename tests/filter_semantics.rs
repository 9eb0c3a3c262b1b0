//! Filter semantics
//!
//! - `_not(x)` is exactly the complement of `x`, nulls included
//! - `_or` is the union of its branches
//! - Relation filters are existential; aggregate siblings scope the aggregate

mod common;

use std::collections::BTreeSet;

use common::{find, ids, user_ids};
use serde_json::{json, Value};

const ALL_USERS: [i64; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

async fn assert_complement(filter: Value) {
    let matched: BTreeSet<i64> = user_ids(filter.clone()).await.into_iter().collect();
    let negated: BTreeSet<i64> = user_ids(json!({"_not": filter.clone()})).await.into_iter().collect();

    assert!(matched.is_disjoint(&negated), "overlap for {}", filter);
    let union: Vec<i64> = matched.union(&negated).copied().collect();
    assert_eq!(union, ALL_USERS.to_vec(), "gap for {}", filter);
}

// =============================================================================
// Field operators
// =============================================================================

#[tokio::test]
async fn test_membership_and_range_operators() {
    assert_eq!(user_ids(json!({"age": {"_in": [35, 41]}})).await, vec![2, 3, 4]);
    assert_eq!(user_ids(json!({"age": {"_nin": [35, 41]}})).await, vec![1, 5, 6, 7, 8]);
    assert_eq!(user_ids(json!({"age": {"_between": [30, 41]}})).await, vec![2, 3, 4, 6]);
    assert_eq!(user_ids(json!({"age": {"_in": []}})).await, Vec::<i64>::new());
}

#[tokio::test]
async fn test_string_operators_are_case_sensitive() {
    assert_eq!(user_ids(json!({"name": {"_contains": "a"}})).await, vec![1, 3, 4, 6, 7]);
    assert_eq!(user_ids(json!({"name": {"_starts_with": "e"}})).await, vec![5]);
    assert_eq!(user_ids(json!({"name": {"_ends_with": "e"}})).await, vec![1, 4, 7]);
    assert_eq!(user_ids(json!({"name": {"_contains": "A"}})).await, Vec::<i64>::new());
}

#[tokio::test]
async fn test_null_handling() {
    assert_eq!(user_ids(json!({"city": {"_is_null": true}})).await, vec![2, 4, 7]);
    assert_eq!(user_ids(json!({"city": {"_is_null": false}})).await, vec![1, 3, 5, 6, 8]);
    assert_eq!(user_ids(json!({"city": {"_eq": null}})).await, vec![2, 4, 7]);
    // comparisons never match a null column
    assert_eq!(user_ids(json!({"city": {"_ne": "berlin"}})).await, vec![3, 6, 8]);
}

#[tokio::test]
async fn test_sibling_operators_are_conjoined() {
    assert_eq!(
        user_ids(json!({"age": {"_gte": 33, "_lt": 41}, "city": {"_is_null": true}})).await,
        vec![2, 4]
    );
}

// =============================================================================
// Combinators
// =============================================================================

#[tokio::test]
async fn test_not_is_complement() {
    assert_complement(json!({"age": {"_gt": 30}})).await;
    assert_complement(json!({"city": {"_eq": "berlin"}})).await;
    assert_complement(json!({"city": {"_ne": "berlin"}})).await;
    assert_complement(json!({"posts": {"views": {"_gt": 80}}})).await;
    assert_complement(json!({"posts": {"_count": {"_gte": 3}}})).await;
    assert_complement(json!({"_or": [{"age": {"_lt": 25}}, {"posts": {"title": {"_eq": "post 8"}}}]})).await;
}

#[tokio::test]
async fn test_or_is_union() {
    let a = json!({"city": {"_eq": "paris"}});
    let b = json!({"posts": {"_count": {"_lt": 1}}});

    let left: BTreeSet<i64> = user_ids(a.clone()).await.into_iter().collect();
    let right: BTreeSet<i64> = user_ids(b.clone()).await.into_iter().collect();
    let both = user_ids(json!({"_or": [a, b]})).await;

    let expected: Vec<i64> = left.union(&right).copied().collect();
    assert_eq!(both, expected);
    assert_eq!(both, vec![2, 3, 7, 8]);
}

#[tokio::test]
async fn test_empty_combinators() {
    assert_eq!(user_ids(json!({"_and": []})).await, ALL_USERS.to_vec());
    assert_eq!(user_ids(json!({"_or": []})).await, Vec::<i64>::new());
}

// =============================================================================
// Relation and aggregate filters
// =============================================================================

#[tokio::test]
async fn test_relation_filter_is_existential() {
    assert_eq!(user_ids(json!({"posts": {"title": {"_eq": "post 7"}}})).await, vec![3]);
    assert_eq!(user_ids(json!({"posts": {"views": {"_gt": 80}}})).await, vec![3, 4, 6, 8]);
}

#[tokio::test]
async fn test_path_shorthand_matches_nested_form() {
    let nested = user_ids(json!({"posts": {"views": {"_gt": 80}}})).await;
    let shorthand = user_ids(json!({"posts__views": {"_gt": 80}})).await;
    assert_eq!(nested, shorthand);
}

#[tokio::test]
async fn test_sibling_relation_filters_match_independently() {
    // alice: post 2 (74 views) and post 3 (11); frank: post 13 (81) and post 11 (7)
    let both = json!({"_and": [{"posts": {"views": {"_gt": 70}}}, {"posts": {"views": {"_lt": 20}}}]});
    assert_eq!(user_ids(both.clone()).await, vec![1, 6]);
    assert_complement(both).await;

    let shorthand = json!({"posts__views": {"_gt": 70}, "posts": {"views": {"_lt": 20}}});
    assert_eq!(user_ids(shorthand.clone()).await, vec![1, 6]);
    assert_complement(shorthand).await;

    // one nested filter still needs a single post satisfying both
    assert_eq!(
        user_ids(json!({"posts": {"views": {"_gt": 70, "_lt": 80}}})).await,
        vec![1]
    );
}

#[tokio::test]
async fn test_to_one_relation_filter() {
    let result = find(json!({
        "tableName": "post",
        "filter": {"author": {"age": {"_gt": 45}}}
    }))
    .await;
    assert_eq!(ids(&result), vec![9, 10, 16, 17, 18]);
}

#[tokio::test]
async fn test_aggregate_filters() {
    // users with no posts count as zero
    assert_eq!(user_ids(json!({"posts": {"_count": {"_lt": 1}}})).await, vec![2, 7]);
    assert_eq!(user_ids(json!({"posts": {"_max": {"views": {"_gte": 90}}}})).await, vec![4, 8]);
    // view sums: 170, 166, 96, 103, 205, 187
    assert_eq!(user_ids(json!({"posts": {"_sum": {"views": {"_gt": 200}}}})).await, vec![6]);
    assert_eq!(user_ids(json!({"posts": {"_avg": {"views": {"_gt": 80}}}})).await, vec![4]);
    assert_eq!(user_ids(json!({"posts": {"_min": {"views": {"_lt": 10}}}})).await, vec![6]);
}

#[tokio::test]
async fn test_aggregate_siblings_scope_the_aggregate() {
    // posts over 50 views per user: 1, 0, 2, 1, 1, 2, 0, 2
    assert_eq!(
        user_ids(json!({"posts": {"views": {"_gt": 50}, "_count": {"_gte": 2}}})).await,
        vec![3, 6, 8]
    );
}

#[tokio::test]
async fn test_nested_aggregate_under_relation() {
    // posts with four comments: 4 (alice), 9 (erin), 14 (frank)
    assert_eq!(
        user_ids(json!({"posts": {"comments": {"_count": {"_gte": 4}}}})).await,
        vec![1, 5, 6]
    );
}

#[tokio::test]
async fn test_combined_aggregate_and_field_filter() {
    assert_eq!(
        user_ids(json!({"posts": {"_count": {"_gte": 3}}, "age": {"_gt": 30}})).await,
        vec![3, 6, 8]
    );
}

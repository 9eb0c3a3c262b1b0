//! Shared blog dataset for integration tests
//!
//! `user -(posts)-> post -(comments)-> comment`
//!
//! | user | name  | age | city   | posts      |
//! |------|-------|-----|--------|------------|
//! | 1    | alice | 22  | berlin | 1..=4      |
//! | 2    | bob   | 35  |        |            |
//! | 3    | carol | 41  | paris  | 5..=7      |
//! | 4    | dave  | 35  |        | 8          |
//! | 5    | erin  | 52  | berlin | 9..=10     |
//! | 6    | frank | 33  | oslo   | 11..=15    |
//! | 7    | grace | 19  |        |            |
//! | 8    | heidi | 47  | paris  | 16..=18    |
//!
//! Post `p` has `views = p * 37 % 100` and `p % 5` comments; comment `c`
//! has `likes = c * 13 % 17`.

#![allow(dead_code)]

use std::sync::Arc;

use aeroquery::{FindService, MemoryEngine, QueryRequest, QueryResult};
use serde_json::{json, Value};

const USERS: [(&str, i64, Option<&str>, i64); 8] = [
    ("alice", 22, Some("berlin"), 4),
    ("bob", 35, None, 0),
    ("carol", 41, Some("paris"), 3),
    ("dave", 35, None, 1),
    ("erin", 52, Some("berlin"), 2),
    ("frank", 33, Some("oslo"), 5),
    ("grace", 19, None, 0),
    ("heidi", 47, Some("paris"), 3),
];

pub fn blog_dataset() -> Value {
    let mut users = Vec::new();
    let mut posts = Vec::new();
    let mut comments = Vec::new();
    let mut post_id = 0i64;
    let mut comment_id = 0i64;

    for (i, (name, age, city, post_count)) in USERS.iter().enumerate() {
        let user_id = i as i64 + 1;
        users.push(json!({"id": user_id, "name": name, "age": age, "city": city}));
        for _ in 0..*post_count {
            post_id += 1;
            posts.push(json!({
                "id": post_id,
                "user_id": user_id,
                "title": format!("post {}", post_id),
                "views": post_id * 37 % 100
            }));
            for _ in 0..post_id % 5 {
                comment_id += 1;
                comments.push(json!({
                    "id": comment_id,
                    "post_id": post_id,
                    "body": format!("comment {}", comment_id),
                    "likes": comment_id * 13 % 17
                }));
            }
        }
    }

    json!({
        "tables": [
            {
                "name": "user",
                "primaryKey": "id",
                "columns": [
                    {"name": "id", "type": "integer"},
                    {"name": "name", "type": "string"},
                    {"name": "age", "type": "integer"},
                    {"name": "city", "type": "string", "nullable": true}
                ],
                "relations": [
                    {"name": "posts", "target": "post", "cardinality": "to_many",
                     "sourceColumn": "id", "targetColumn": "user_id"}
                ]
            },
            {
                "name": "post",
                "primaryKey": "id",
                "columns": [
                    {"name": "id", "type": "integer"},
                    {"name": "user_id", "type": "integer"},
                    {"name": "title", "type": "string"},
                    {"name": "views", "type": "integer"}
                ],
                "relations": [
                    {"name": "author", "target": "user", "cardinality": "to_one",
                     "sourceColumn": "user_id", "targetColumn": "id"},
                    {"name": "comments", "target": "comment", "cardinality": "to_many",
                     "sourceColumn": "id", "targetColumn": "post_id"}
                ]
            },
            {
                "name": "comment",
                "primaryKey": "id",
                "columns": [
                    {"name": "id", "type": "integer"},
                    {"name": "post_id", "type": "integer"},
                    {"name": "body", "type": "string"},
                    {"name": "likes", "type": "integer"}
                ],
                "relations": [
                    {"name": "post", "target": "post", "cardinality": "to_one",
                     "sourceColumn": "post_id", "targetColumn": "id"}
                ]
            }
        ],
        "rows": {"user": users, "post": posts, "comment": comments}
    })
}

pub fn engine() -> MemoryEngine {
    MemoryEngine::from_dataset(blog_dataset()).unwrap()
}

pub fn service(engine: &Arc<MemoryEngine>) -> FindService {
    FindService::new(engine.clone(), engine.clone())
}

pub fn request(value: Value) -> QueryRequest {
    QueryRequest::from_json(&value).unwrap()
}

/// Runs a request against a fresh engine
pub async fn find(value: Value) -> QueryResult {
    let engine = Arc::new(engine());
    service(&engine).find(&request(value)).await.unwrap()
}

/// Root primary keys in result order
pub fn ids(result: &QueryResult) -> Vec<i64> {
    result.data.iter().map(|row| row["id"].as_i64().unwrap()).collect()
}

/// Primary keys of users matching `filter`, ascending
pub async fn user_ids(filter: Value) -> Vec<i64> {
    ids(&find(json!({"tableName": "user", "filter": filter, "sort": ["id"]})).await)
}

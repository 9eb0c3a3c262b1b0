//! Shared blog fixture for unit tests
//!
//! `user -(posts)-> post -(comments)-> comment`, with the to-one inverses
//! `post.author` and `comment.post`.
//!
//! | user | name  | age | posts      |
//! |------|-------|-----|------------|
//! | 1    | alice | 22  | 1..=4      |
//! | 2    | bob   | 35  |            |
//! | 3    | carol | 41  | 5..=7      |
//! | 4    | dave  | 35  | 8          |
//! | 5    | erin  | 52  | 9..=10     |
//! | 6    | frank | 33  | 11..=15    |
//! | 7    | grace | 19  |            |
//! | 8    | heidi | 47  | 16..=18    |
//!
//! Post `p` has `views = p * 37 % 100` and `p % 5` comments; comment `c`
//! has `likes = c * 13 % 17`.

use serde_json::json;

use crate::executor::MemoryEngine;
use crate::schema::{Catalog, ColumnDef, ColumnType, RelationDef, TableSchema};

const NAMES: [&str; 8] = ["alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi"];
const AGES: [i64; 8] = [22, 35, 41, 35, 52, 33, 19, 47];
const POSTS_PER_USER: [i64; 8] = [4, 0, 3, 1, 2, 5, 0, 3];

pub fn blog_catalog() -> Catalog {
    let user = TableSchema::new(
        "user",
        "id",
        vec![
            ColumnDef::new("id", ColumnType::Integer),
            ColumnDef::new("name", ColumnType::String),
            ColumnDef::new("age", ColumnType::Integer),
        ],
    )
    .with_relation(RelationDef::to_many("posts", "post", "id", "user_id"));

    let post = TableSchema::new(
        "post",
        "id",
        vec![
            ColumnDef::new("id", ColumnType::Integer),
            ColumnDef::new("user_id", ColumnType::Integer),
            ColumnDef::new("title", ColumnType::String),
            ColumnDef::new("views", ColumnType::Integer),
        ],
    )
    .with_relation(RelationDef::to_one("author", "user", "user_id", "id"))
    .with_relation(RelationDef::to_many("comments", "comment", "id", "post_id"));

    let comment = TableSchema::new(
        "comment",
        "id",
        vec![
            ColumnDef::new("id", ColumnType::Integer),
            ColumnDef::new("post_id", ColumnType::Integer),
            ColumnDef::new("body", ColumnType::String),
            ColumnDef::new("likes", ColumnType::Integer),
        ],
    )
    .with_relation(RelationDef::to_one("post", "post", "post_id", "id"));

    Catalog::new(vec![user, post, comment]).unwrap()
}

pub fn blog_engine() -> MemoryEngine {
    let mut engine = MemoryEngine::new(blog_catalog());
    let mut post_id = 0;
    let mut comment_id = 0;

    for (i, (name, age)) in NAMES.iter().zip(AGES).enumerate() {
        let user_id = i as i64 + 1;
        engine
            .insert("user", json!({"id": user_id, "name": name, "age": age}))
            .unwrap();

        for _ in 0..POSTS_PER_USER[i] {
            post_id += 1;
            engine
                .insert(
                    "post",
                    json!({
                        "id": post_id,
                        "user_id": user_id,
                        "title": format!("post {}", post_id),
                        "views": post_id * 37 % 100
                    }),
                )
                .unwrap();

            for _ in 0..post_id % 5 {
                comment_id += 1;
                engine
                    .insert(
                        "comment",
                        json!({
                            "id": comment_id,
                            "post_id": post_id,
                            "body": format!("comment {}", comment_id),
                            "likes": comment_id * 13 % 17
                        }),
                    )
                    .unwrap();
            }
        }
    }

    engine
}

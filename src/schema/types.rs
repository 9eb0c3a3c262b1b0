//! Table metadata types
//!
//! A `TableSchema` is everything the compiler needs to know about a table:
//! its columns, its primary key and the relations that leave it.

use serde::{Deserialize, Serialize};

/// Column value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Boolean,
    Datetime,
    Json,
}

impl ColumnType {
    /// Returns true for types that `_sum` and `_avg` accept
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Returns the type name as written in catalog files
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::Datetime => "datetime",
            ColumnType::Json => "json",
        }
    }
}

/// A single column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnDef {
    /// Create a non-nullable column
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
        }
    }

    /// Create a nullable column
    pub fn nullable(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
        }
    }
}

/// How many target rows a relation yields per source row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ToOne,
    ToMany,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::ToOne => "to_one",
            Cardinality::ToMany => "to_many",
        }
    }
}

/// A named relation from one table to another.
///
/// Rows are related when `source.source_column = target.target_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDef {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub source_column: String,
    pub target_column: String,
}

impl RelationDef {
    /// Create a to-many relation (`user.id -> post.user_id`)
    pub fn to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::ToMany,
            source_column: source_column.into(),
            target_column: target_column.into(),
        }
    }

    /// Create a to-one relation (`post.user_id -> user.id`)
    pub fn to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::ToOne,
            source_column: source_column.into(),
            target_column: target_column.into(),
        }
    }
}

/// Metadata for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: String,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

impl TableSchema {
    /// Create a table with no relations
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
            primary_key: primary_key.into(),
            relations: Vec::new(),
        }
    }

    /// Add a relation
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Looks up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up a relation by name
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_schema_wire_format() {
        let json = serde_json::json!({
            "name": "post",
            "primaryKey": "id",
            "columns": [
                {"name": "id", "type": "integer"},
                {"name": "title", "type": "string", "nullable": true}
            ],
            "relations": [
                {"name": "author", "target": "user", "cardinality": "to_one",
                 "sourceColumn": "user_id", "targetColumn": "id"}
            ]
        });

        let table: TableSchema = serde_json::from_value(json).unwrap();
        assert_eq!(table.primary_key, "id");
        assert!(table.column("title").unwrap().nullable);
        assert!(!table.column("id").unwrap().nullable);

        let author = table.relation("author").unwrap();
        assert_eq!(author.cardinality, Cardinality::ToOne);
        assert_eq!(author.source_column, "user_id");
    }

    #[test]
    fn test_numeric_types() {
        assert!(ColumnType::Integer.is_numeric());
        assert!(ColumnType::Float.is_numeric());
        assert!(!ColumnType::String.is_numeric());
        assert!(!ColumnType::Datetime.is_numeric());
    }

    #[test]
    fn test_relations_default_to_empty() {
        let json = serde_json::json!({
            "name": "tag",
            "primaryKey": "id",
            "columns": [{"name": "id", "type": "integer"}]
        });
        let table: TableSchema = serde_json::from_value(json).unwrap();
        assert!(table.relations.is_empty());
        assert!(table.relation("anything").is_none());
    }
}

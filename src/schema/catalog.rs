//! In-memory catalog of table schemas
//!
//! The catalog is validated once when built and immutable afterwards.
//! Catalog files look like `{"tables": [<TableSchema>, ...]}`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use super::errors::{NotFoundError, SchemaError, SchemaResult};
use super::types::TableSchema;
use super::SchemaProvider;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    tables: Vec<TableSchema>,
}

/// A validated set of table schemas
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: BTreeMap<String, Arc<TableSchema>>,
}

impl Catalog {
    /// Builds a catalog, rejecting inconsistent metadata.
    ///
    /// Checks: unique table and column names, primary key is a column,
    /// relation targets and join columns exist, no relation shadows a column.
    pub fn new(tables: Vec<TableSchema>) -> SchemaResult<Self> {
        let mut map = BTreeMap::new();
        for table in tables {
            if map.contains_key(&table.name) {
                return Err(SchemaError::DuplicateTable(table.name));
            }
            map.insert(table.name.clone(), Arc::new(table));
        }

        let catalog = Self { tables: map };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parses a catalog from a JSON value
    pub fn from_json(value: serde_json::Value) -> SchemaResult<Self> {
        let file: CatalogFile = serde_json::from_value(value)?;
        Self::new(file.tables)
    }

    /// Loads a catalog file from disk
    pub fn load(path: &Path) -> SchemaResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let file: CatalogFile = serde_json::from_str(&content)?;
        Self::new(file.tables)
    }

    fn validate(&self) -> SchemaResult<()> {
        for table in self.tables.values() {
            let mut seen = BTreeSet::new();
            for column in &table.columns {
                if !seen.insert(column.name.as_str()) {
                    return Err(SchemaError::DuplicateColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
            }

            if !table.has_column(&table.primary_key) {
                return Err(SchemaError::MissingPrimaryKey {
                    table: table.name.clone(),
                    column: table.primary_key.clone(),
                });
            }

            for relation in &table.relations {
                if table.has_column(&relation.name) {
                    return Err(SchemaError::NameCollision {
                        table: table.name.clone(),
                        relation: relation.name.clone(),
                    });
                }

                let target = self.tables.get(&relation.target).ok_or_else(|| {
                    SchemaError::UnknownTarget {
                        table: table.name.clone(),
                        relation: relation.name.clone(),
                        target: relation.target.clone(),
                    }
                })?;

                let join_columns = [
                    (table.as_ref(), &relation.source_column),
                    (target.as_ref(), &relation.target_column),
                ];
                for (owner, column) in join_columns {
                    if !owner.has_column(column) {
                        return Err(SchemaError::UnknownJoinColumn {
                            table: table.name.clone(),
                            relation: relation.name.clone(),
                            column: format!("{}.{}", owner.name, column),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns the table names in sorted order
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl SchemaProvider for Catalog {
    fn resolve_table(&self, name: &str) -> Result<Arc<TableSchema>, NotFoundError> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| NotFoundError::Table(name.to_string()))
    }
}

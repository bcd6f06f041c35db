//! In-memory table schema consumed by the mergers.

use crate::value::{ColumnId, ValueType};

/// One column of a table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSchema {
    name: String,
    value_type: ValueType,
    aggregate: Option<String>,
}

impl ColumnSchema {
    /// Plain (latest-wins) column.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            aggregate: None,
        }
    }

    /// Returns `self` folded through the aggregate function `function`.
    pub fn with_aggregate(self, function: impl Into<String>) -> Self {
        Self {
            aggregate: Some(function.into()),
            ..self
        }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared value type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Aggregate function name, for aggregating columns.
    pub fn aggregate(&self) -> Option<&str> {
        self.aggregate.as_deref()
    }

    /// Returns true for aggregating columns.
    pub fn is_aggregate(&self) -> bool {
        self.aggregate.is_some()
    }
}

/// Ordered columns; the first `key_column_count` form the key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<ColumnSchema>,
    key_column_count: usize,
}

impl TableSchema {
    /// Build a schema. `key_column_count` is clamped to the column count.
    pub fn new(columns: Vec<ColumnSchema>, key_column_count: usize) -> Self {
        let key_column_count = key_column_count.min(columns.len());
        Self {
            columns,
            key_column_count,
        }
    }

    /// All columns.
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// Column by id.
    pub fn column(&self, id: ColumnId) -> Option<&ColumnSchema> {
        self.columns.get(id as usize)
    }

    /// Number of leading key columns.
    pub fn key_column_count(&self) -> usize {
        self.key_column_count
    }

    /// Returns true when column `id` exists and aggregates.
    pub fn is_aggregate(&self, id: ColumnId) -> bool {
        self.column(id).is_some_and(ColumnSchema::is_aggregate)
    }
}

/// Columns requested from the schemaful merger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ColumnFilter {
    /// Every schema column, in schema order.
    #[default]
    All,
    /// The listed column ids, in the given order.
    Indexes(Vec<ColumnId>),
}

impl ColumnFilter {
    /// Resolve the filter against `schema`, dropping ids outside the schema.
    pub fn column_ids(&self, schema: &TableSchema) -> Vec<ColumnId> {
        match self {
            ColumnFilter::All => (0..schema.columns().len() as ColumnId).collect(),
            ColumnFilter::Indexes(ids) => ids
                .iter()
                .copied()
                .filter(|id| (*id as usize) < schema.columns().len())
                .collect(),
        }
    }
}

use std::sync::Arc;

use super::{MergeError, RowMerger};
use crate::{
    evaluator::AggregateEvaluator,
    row::{RowBuffer, UnversionedRow},
    schema::TableSchema,
    value::{ColumnId, UnversionedValue},
};

/// Upsert-style merge of unversioned partial rows in call order.
///
/// Partial rows carry the key columns positionally followed by any subset of
/// the value columns, identified by column id.
pub struct UnversionedRowMerger {
    buffer: RowBuffer,
    schema: Arc<TableSchema>,
    evaluator: Arc<dyn AggregateEvaluator>,
    merged_row: Vec<UnversionedValue>,
    valid: Vec<bool>,
    deleted: bool,
    started: bool,
}

impl UnversionedRowMerger {
    /// Merger over rows of `schema`.
    pub fn new(schema: Arc<TableSchema>, evaluator: Arc<dyn AggregateEvaluator>) -> Self {
        let column_count = schema.columns().len();
        Self {
            buffer: RowBuffer::new(),
            schema,
            evaluator,
            merged_row: Vec::with_capacity(column_count),
            valid: vec![false; column_count],
            deleted: false,
            started: false,
        }
    }

    fn init(&mut self, row: &UnversionedRow) {
        if self.started {
            return;
        }
        let key_column_count = self.schema.key_column_count();
        self.merged_row.clear();
        for (index, column) in self.schema.columns().iter().enumerate() {
            let id = index as ColumnId;
            if index < key_column_count {
                self.valid[index] = true;
                let key = row
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| UnversionedValue::null(id));
                self.merged_row.push(key);
            } else {
                self.valid[index] = false;
                self.merged_row
                    .push(UnversionedValue::null(id).with_aggregate(column.is_aggregate()));
            }
        }
        self.started = true;
    }

    /// Record a delete of the key: every value column becomes `Null` and,
    /// unless a later partial row is added, the merged row is key-only.
    pub fn delete_partial_row(&mut self, row: &UnversionedRow) {
        self.init(row);
        let key_column_count = self.schema.key_column_count();
        for (index, value) in self.merged_row.iter_mut().enumerate().skip(key_column_count) {
            self.valid[index] = true;
            *value = UnversionedValue::null(index as ColumnId);
        }
        self.deleted = true;
    }

    fn build(&mut self) -> Option<UnversionedRow> {
        if !self.started {
            return None;
        }
        let key_column_count = self.schema.key_column_count();
        let values: Vec<&UnversionedValue> = if self.deleted {
            self.merged_row[..key_column_count].iter().collect()
        } else {
            self.merged_row
                .iter()
                .zip(&self.valid)
                .filter_map(|(value, valid)| valid.then_some(value))
                .collect()
        };
        Some(
            values
                .into_iter()
                .map(|value| self.buffer.capture_value(value))
                .collect(),
        )
    }

    fn cleanup(&mut self) {
        self.merged_row.clear();
        self.valid.iter_mut().for_each(|valid| *valid = false);
        self.deleted = false;
        self.started = false;
    }
}

impl RowMerger for UnversionedRowMerger {
    type Input = UnversionedRow;
    type Output = UnversionedRow;

    fn add_partial_row(&mut self, row: &UnversionedRow) -> Result<(), MergeError> {
        let key_column_count = self.schema.key_column_count();
        for value in row.iter().skip(key_column_count) {
            let column = self
                .schema
                .column(value.id)
                .ok_or(MergeError::UnknownColumn { column_id: value.id })?;
            if value.aggregate && !column.is_aggregate() {
                return Err(MergeError::UnexpectedAggregate { column_id: value.id });
            }
        }

        self.init(row);

        for value in row.iter().skip(key_column_count) {
            let id = value.id;
            let index = id as usize;
            self.valid[index] = true;

            if value.aggregate {
                let state = &self.merged_row[index];
                let mut merged =
                    self.evaluator
                        .merge_aggregate(id, state, value, &mut self.buffer)?;
                merged.aggregate = state.aggregate;
                self.merged_row[index] = merged;
            } else if !value.is_null() {
                self.merged_row[index] = value.clone();
            }
        }

        self.deleted = false;
        Ok(())
    }

    fn build_merged_row(&mut self) -> Result<Option<UnversionedRow>, MergeError> {
        let row = self.build();
        self.cleanup();
        Ok(row)
    }

    fn reset(&mut self) {
        self.cleanup();
        self.buffer.clear();
    }
}

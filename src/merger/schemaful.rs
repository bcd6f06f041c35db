use std::{mem, sync::Arc};

use super::{MergeError, RowMerger};
use crate::{
    evaluator::AggregateEvaluator,
    mvcc::Timestamp,
    row::{RowBuffer, UnversionedRow, VersionedRow},
    schema::{ColumnFilter, TableSchema},
    value::{ColumnId, UnversionedValue, VersionedValue},
};

/// Reads the latest visible version of every requested column.
///
/// Partial rows are expected to carry at most the single latest write and
/// delete timestamp of their store, as produced by a point-in-time read.
pub struct SchemafulRowMerger {
    buffer: RowBuffer,
    schema: Arc<TableSchema>,
    evaluator: Arc<dyn AggregateEvaluator>,
    column_ids: Vec<ColumnId>,
    // Position of each non-key schema column in the output row.
    column_id_to_index: Vec<Option<usize>>,
    merged_row: Vec<UnversionedValue>,
    merged_timestamps: Vec<Timestamp>,
    aggregate_values: Vec<VersionedValue>,
    latest_write: Timestamp,
    latest_delete: Timestamp,
    started: bool,
}

impl SchemafulRowMerger {
    /// Merger emitting the columns selected by `column_filter`, in filter order.
    pub fn new(
        schema: Arc<TableSchema>,
        column_filter: &ColumnFilter,
        evaluator: Arc<dyn AggregateEvaluator>,
    ) -> Self {
        let column_ids = column_filter.column_ids(&schema);
        let mut column_id_to_index = vec![None; schema.columns().len()];
        for (index, id) in column_ids.iter().enumerate() {
            if (*id as usize) >= schema.key_column_count() {
                column_id_to_index[*id as usize] = Some(index);
            }
        }

        Self {
            buffer: RowBuffer::new(),
            schema,
            evaluator,
            column_ids,
            column_id_to_index,
            merged_row: Vec::new(),
            merged_timestamps: Vec::new(),
            aggregate_values: Vec::new(),
            latest_write: Timestamp::NULL,
            latest_delete: Timestamp::NULL,
            started: false,
        }
    }

    /// Column ids of the output row, in output order.
    pub fn column_ids(&self) -> &[ColumnId] {
        &self.column_ids
    }

    fn start(&mut self, row: &VersionedRow) {
        debug_assert_eq!(row.key_count(), self.schema.key_column_count());
        self.merged_row.clear();
        self.merged_timestamps.clear();
        for id in &self.column_ids {
            if (*id as usize) < self.schema.key_column_count() {
                let key = row
                    .keys()
                    .get(*id as usize)
                    .cloned()
                    .unwrap_or_else(|| UnversionedValue::null(*id));
                self.merged_row.push(key);
                self.merged_timestamps.push(Timestamp::MAX);
            } else {
                self.merged_row.push(UnversionedValue::null(*id));
                self.merged_timestamps.push(Timestamp::NULL);
            }
        }
        self.started = true;
    }

    fn build(&mut self) -> Result<Option<UnversionedRow>, MergeError> {
        if !self.started {
            return Ok(None);
        }
        if self.latest_write.is_null() || self.latest_write <= self.latest_delete {
            return Ok(None);
        }

        let latest_delete = self.latest_delete;
        let mut aggregates = mem::take(&mut self.aggregate_values);
        aggregates.retain(|value| value.timestamp > latest_delete);
        aggregates.sort_by_key(|value| (value.id, value.timestamp));
        aggregates.dedup_by(|next, prev| next.id == prev.id && next.timestamp == prev.timestamp);

        for run in aggregates.chunk_by(|lhs, rhs| lhs.id == rhs.id) {
            let id = run[0].id;
            // A plain write restarts the fold.
            let begin = run.iter().rposition(|value| !value.aggregate).unwrap_or(0);

            let mut state = UnversionedValue::null(id);
            for value in &run[begin..] {
                state = self
                    .evaluator
                    .merge_aggregate(id, &state, value, &mut self.buffer)?;
            }
            state.aggregate = false;

            if let Some(index) = self.column_id_to_index[id as usize] {
                self.merged_row[index] = state;
                self.merged_timestamps[index] = run[run.len() - 1].timestamp;
            }
        }

        for (index, id) in self.column_ids.iter().enumerate() {
            if self.merged_timestamps[index] <= latest_delete && !self.schema.is_aggregate(*id) {
                self.merged_row[index] = UnversionedValue::null(*id);
            }
        }

        let merged = mem::take(&mut self.merged_row);
        let row = merged
            .iter()
            .map(|value| self.buffer.capture_value(value))
            .collect();
        Ok(Some(row))
    }

    fn cleanup(&mut self) {
        self.merged_row.clear();
        self.merged_timestamps.clear();
        self.aggregate_values.clear();
        self.latest_write = Timestamp::NULL;
        self.latest_delete = Timestamp::NULL;
        self.started = false;
    }
}

impl RowMerger for SchemafulRowMerger {
    type Input = VersionedRow;
    type Output = UnversionedRow;

    fn add_partial_row(&mut self, row: &VersionedRow) -> Result<(), MergeError> {
        if let Some(value) = row
            .values()
            .iter()
            .find(|value| self.schema.column(value.id).is_none())
        {
            return Err(MergeError::UnknownColumn {
                column_id: value.id,
            });
        }

        if !self.started {
            self.start(row);
        }

        if let Some(delete) = row.delete_timestamps().iter().max() {
            self.latest_delete = self.latest_delete.max(*delete);
        }

        let Some(&write) = row.write_timestamps().iter().max() else {
            return Ok(());
        };
        self.latest_write = self.latest_write.max(write);
        if write < self.latest_delete {
            return Ok(());
        }

        for value in row.values() {
            if value.timestamp <= self.latest_delete {
                continue;
            }
            let Some(column) = self.schema.column(value.id) else {
                continue;
            };
            let Some(index) = self.column_id_to_index[value.id as usize] else {
                continue;
            };
            if column.is_aggregate() {
                self.aggregate_values.push(value.clone());
            } else if self.merged_timestamps[index] < value.timestamp {
                self.merged_row[index] = value.value.clone();
                self.merged_timestamps[index] = value.timestamp;
            }
        }
        Ok(())
    }

    fn build_merged_row(&mut self) -> Result<Option<UnversionedRow>, MergeError> {
        let result = self.build();
        self.cleanup();
        result
    }

    fn reset(&mut self) {
        self.cleanup();
        self.buffer.clear();
    }
}

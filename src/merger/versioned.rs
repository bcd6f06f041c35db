//! Retention-aware merge of versioned rows, used by compaction.
//!
//! Each column's cells are laid out on one timeline together with the row's
//! delete timestamps, the latter represented by `TheBottom` markers. The newest
//! entries of the timeline are retained according to [`RetentionConfig`];
//! aggregate columns additionally collapse everything below the retention
//! window (and below the major timestamp) into a single folded cell.

use std::{mem, sync::Arc};

use super::{MergeError, RowMerger};
use crate::{
    evaluator::AggregateEvaluator,
    logging::rowmerge_log,
    mvcc::{is_expired, Timestamp},
    option::RetentionConfig,
    row::{sort_descending_unique, RowBuffer, VersionedRow},
    schema::TableSchema,
    value::{ColumnId, UnversionedValue, VersionedValue},
};

/// Folds versioned fragments of one key into a single versioned row.
pub struct VersionedRowMerger {
    buffer: RowBuffer,
    schema: Arc<TableSchema>,
    config: RetentionConfig,
    current_timestamp: Timestamp,
    major_timestamp: Timestamp,
    evaluator: Arc<dyn AggregateEvaluator>,
    keys: Vec<UnversionedValue>,
    partial_values: Vec<VersionedValue>,
    column_values: Vec<VersionedValue>,
    merged_values: Vec<VersionedValue>,
    write_timestamps: Vec<Timestamp>,
    delete_timestamps: Vec<Timestamp>,
    started: bool,
}

impl VersionedRowMerger {
    /// Merger applying `config` as seen at `current_timestamp`; aggregate cells
    /// below `major_timestamp` may be folded irreversibly.
    pub fn new(
        schema: Arc<TableSchema>,
        config: RetentionConfig,
        current_timestamp: Timestamp,
        major_timestamp: Timestamp,
        evaluator: Arc<dyn AggregateEvaluator>,
    ) -> Self {
        Self {
            buffer: RowBuffer::new(),
            schema,
            config,
            current_timestamp,
            major_timestamp,
            evaluator,
            keys: Vec::new(),
            partial_values: Vec::new(),
            column_values: Vec::new(),
            merged_values: Vec::new(),
            write_timestamps: Vec::new(),
            delete_timestamps: Vec::new(),
            started: false,
        }
    }

    /// Wall-clock reference for TTL checks.
    pub fn current_timestamp(&self) -> Timestamp {
        self.current_timestamp
    }

    /// Watermark below which aggregates are folded.
    pub fn major_timestamp(&self) -> Timestamp {
        self.major_timestamp
    }

    fn build(&mut self) -> Result<Option<VersionedRow>, MergeError> {
        if !self.started {
            return Ok(None);
        }

        self.delete_timestamps.sort_unstable();
        self.delete_timestamps.dedup();

        let mut partial_values = mem::take(&mut self.partial_values);
        partial_values.sort_by_key(|value| (value.id, value.timestamp));
        partial_values.dedup_by(|next, prev| next.id == prev.id && next.timestamp == prev.timestamp);

        for column in partial_values.chunk_by(|lhs, rhs| lhs.id == rhs.id) {
            self.merge_column(column)?;
        }
        partial_values.clear();
        self.partial_values = partial_values;

        self.delete_timestamps.reverse();
        sort_descending_unique(&mut self.write_timestamps);

        // Deletes older than every retained write and below the major
        // timestamp no longer shadow anything.
        let earliest_write = self
            .write_timestamps
            .last()
            .copied()
            .unwrap_or(Timestamp::MAX);
        let major_timestamp = self.major_timestamp;
        let retained = self
            .delete_timestamps
            .iter()
            .take_while(|delete| **delete > earliest_write || **delete >= major_timestamp)
            .count();
        self.delete_timestamps.truncate(retained);

        if self.merged_values.is_empty()
            && self.write_timestamps.is_empty()
            && self.delete_timestamps.is_empty()
        {
            rowmerge_log!(
                log::Level::Trace,
                "versioned_row_purged",
                "key_columns={}",
                self.keys.len()
            );
            return Ok(None);
        }

        let keys = self
            .keys
            .iter()
            .map(|value| self.buffer.capture_value(value))
            .collect();
        let values = self
            .merged_values
            .iter()
            .map(|value| self.buffer.capture_versioned_value(value))
            .collect();
        Ok(Some(VersionedRow::new(
            keys,
            values,
            mem::take(&mut self.write_timestamps),
            mem::take(&mut self.delete_timestamps),
        )))
    }

    fn merge_column(&mut self, column: &[VersionedValue]) -> Result<(), MergeError> {
        let id = column[0].id;

        // Interleave the column with delete markers; a cell sharing a delete's
        // timestamp is placed after the marker.
        self.column_values.clear();
        let mut values = column.iter().peekable();
        let mut deletes = self.delete_timestamps.iter().peekable();
        loop {
            let take_value = match (values.peek(), deletes.peek()) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(value), Some(delete)) => value.timestamp < **delete,
            };
            if take_value {
                if let Some(value) = values.next() {
                    self.column_values.push(value.clone());
                }
            } else if let Some(delete) = deletes.next() {
                self.column_values
                    .push(VersionedValue::the_bottom(id, *delete));
            }
        }
        debug_assert!(self
            .column_values
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));

        let len = self.column_values.len();

        // Safety limit: the newest `min_data_versions` entries plus anything
        // younger than `min_data_ttl`.
        let mut safety_end = len.saturating_sub(self.config.min_data_versions);
        while safety_end > 0
            && !is_expired(
                self.column_values[safety_end - 1].timestamp,
                self.current_timestamp,
                self.config.min_data_ttl,
            )
        {
            safety_end -= 1;
        }

        let mut retention_begin = safety_end;
        while retention_begin > 0 {
            if len - retention_begin >= self.config.max_data_versions {
                break;
            }
            if is_expired(
                self.column_values[retention_begin - 1].timestamp,
                self.current_timestamp,
                self.config.max_data_ttl,
            ) {
                break;
            }
            retention_begin -= 1;
        }

        if self.schema.is_aggregate(id) {
            retention_begin = self.fold_aggregate(id, retention_begin)?;
        }

        for value in self.column_values[retention_begin..].iter().rev() {
            if !value.is_the_bottom() {
                self.write_timestamps.push(value.timestamp);
                self.merged_values.push(value.clone());
            }
        }
        Ok(())
    }

    /// Extends the retention window over entries not yet major-compacted and
    /// folds the aggregate run ending at its first entry. Returns the new
    /// window start.
    fn fold_aggregate(
        &mut self,
        id: ColumnId,
        mut retention_begin: usize,
    ) -> Result<usize, MergeError> {
        let len = self.column_values.len();
        while retention_begin > 0
            && (retention_begin == len
                || self.column_values[retention_begin].timestamp >= self.major_timestamp)
        {
            retention_begin -= 1;
        }

        if retention_begin > 0 && retention_begin < len {
            let mut aggregate_begin = 0;
            for index in (0..=retention_begin).rev() {
                let value = &self.column_values[index];
                if value.is_the_bottom() {
                    aggregate_begin = index + 1;
                    break;
                }
                if !value.aggregate {
                    aggregate_begin = index;
                    break;
                }
            }

            if aggregate_begin < retention_begin {
                let mut state = UnversionedValue::null(id);
                for value in &self.column_values[aggregate_begin..=retention_begin] {
                    state = self
                        .evaluator
                        .merge_aggregate(id, &state, value, &mut self.buffer)?;
                }
                self.column_values[retention_begin].value = state;
            }
        }

        if let Some(value) = self.column_values.get_mut(retention_begin) {
            if value.timestamp < self.major_timestamp {
                value.aggregate = false;
            }
        }
        Ok(retention_begin)
    }

    fn cleanup(&mut self) {
        self.keys.clear();
        self.partial_values.clear();
        self.column_values.clear();
        self.merged_values.clear();
        self.write_timestamps.clear();
        self.delete_timestamps.clear();
        self.started = false;
    }
}

impl RowMerger for VersionedRowMerger {
    type Input = VersionedRow;
    type Output = VersionedRow;

    fn add_partial_row(&mut self, row: &VersionedRow) -> Result<(), MergeError> {
        if !self.started {
            debug_assert_eq!(row.key_count(), self.schema.key_column_count());
            self.keys.extend_from_slice(row.keys());
            self.started = true;
        }

        for value in row.values() {
            if self.schema.column(value.id).is_none() {
                return Err(MergeError::UnknownColumn {
                    column_id: value.id,
                });
            }
        }
        self.partial_values.extend_from_slice(row.values());
        self.delete_timestamps
            .extend_from_slice(row.delete_timestamps());
        Ok(())
    }

    fn build_merged_row(&mut self) -> Result<Option<VersionedRow>, MergeError> {
        let result = self.build();
        self.cleanup();
        result
    }

    fn reset(&mut self) {
        self.cleanup();
        self.buffer.clear();
    }
}

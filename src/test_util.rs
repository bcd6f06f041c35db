//! Test-only helpers for building schemas and rows.

use std::sync::Arc;

use crate::{
    evaluator::{AggregateEvaluator, ColumnEvaluator},
    mvcc::Timestamp,
    row::{UnversionedRow, VersionedRow, VersionedRowBuilder},
    schema::{ColumnSchema, TableSchema},
    value::{ColumnId, UnversionedValue, ValueData, ValueType, VersionedValue},
};

/// `k` key column followed by three plain columns.
pub(crate) fn typical_schema() -> Arc<TableSchema> {
    Arc::new(TableSchema::new(
        vec![
            ColumnSchema::new("k", ValueType::Int64),
            ColumnSchema::new("l", ValueType::Int64),
            ColumnSchema::new("m", ValueType::Double),
            ColumnSchema::new("n", ValueType::String),
        ],
        1,
    ))
}

/// Like [`typical_schema`], with `n` summing `Int64` deltas.
pub(crate) fn aggregate_sum_schema() -> Arc<TableSchema> {
    Arc::new(TableSchema::new(
        vec![
            ColumnSchema::new("k", ValueType::Int64),
            ColumnSchema::new("l", ValueType::Int64),
            ColumnSchema::new("m", ValueType::Double),
            ColumnSchema::new("n", ValueType::Int64).with_aggregate("sum"),
        ],
        1,
    ))
}

pub(crate) fn evaluator(schema: &Arc<TableSchema>) -> Arc<dyn AggregateEvaluator> {
    Arc::new(ColumnEvaluator::new(schema.clone()).unwrap())
}

/// Timestamp of the first commit in `seconds`.
pub(crate) fn seconds(seconds: u64) -> Timestamp {
    Timestamp::from_seconds(seconds)
}

pub(crate) fn cell(id: ColumnId, ts: u64, data: ValueData) -> VersionedValue {
    VersionedValue::new(UnversionedValue::new(data, id), seconds(ts))
}

pub(crate) fn agg(id: ColumnId, ts: u64, data: ValueData) -> VersionedValue {
    VersionedValue::new(
        UnversionedValue::new(data, id).with_aggregate(true),
        seconds(ts),
    )
}

/// Row keyed by a single `Int64`, with delete timestamps given in seconds.
pub(crate) fn versioned_row(key: i64, values: Vec<VersionedValue>, deletes: &[u64]) -> VersionedRow {
    let mut builder = VersionedRowBuilder::new();
    builder.add_key(UnversionedValue::int64(key, 0));
    for value in values {
        builder.add_value(value);
    }
    for delete in deletes {
        builder.add_delete_timestamp(seconds(*delete));
    }
    builder.finish()
}

pub(crate) fn unversioned_row(values: Vec<UnversionedValue>) -> UnversionedRow {
    UnversionedRow::new(values)
}

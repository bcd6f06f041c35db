#![deny(missing_docs)]
//! Row reconciliation for sorted, multi-versioned table stores.
//!
//! A logical table row may be spread over several stores, each holding a
//! timestamped fragment of it. The mergers in [`merger`] fold those fragments
//! into one row, honouring deletes, aggregate columns and version retention;
//! the readers in [`reader`] drive that fold across many asynchronous store
//! cursors while keeping the output ordered by key.

mod logging;

#[cfg(test)]
mod test_util;

/// Total order over values and key rows.
pub mod compare;

/// Aggregate column folding.
pub mod evaluator;

/// Folding of partial rows that share a key.
pub mod merger;

/// MVCC timestamps and TTL arithmetic.
pub mod mvcc;

/// Retention and reader configuration.
pub mod option;

/// Overlapping range and lookup readers.
pub mod reader;

/// Row representations and the row buffer.
pub mod row;

/// Table and column schemas.
pub mod schema;

/// Column values.
pub mod value;

pub use crate::{
    compare::{default_key_comparer, CompareError, KeyComparer},
    evaluator::{AggregateError, AggregateEvaluator, ColumnEvaluator},
    merger::{MergeError, RowMerger, SchemafulRowMerger, UnversionedRowMerger, VersionedRowMerger},
    mvcc::Timestamp,
    option::{ReaderOptions, RetentionConfig},
    reader::{OverlappingLookupReader, OverlappingRangeReader, ReaderError},
    row::{RowBuffer, UnversionedRow, VersionedRow, VersionedRowBuilder},
    schema::{ColumnFilter, ColumnSchema, TableSchema},
    value::{ColumnId, UnversionedValue, ValueData, ValueType, VersionedValue},
};

//! Folding partial rows that share a key into one logical row.
//!
//! Every merger follows the same lifecycle: any number of
//! [`RowMerger::add_partial_row`] calls, then [`RowMerger::build_merged_row`],
//! which emits the merged row (or `None` when the key is absent) and returns the
//! merger to its idle state. [`RowMerger::reset`] abandons an accumulation and
//! releases the merger's [`RowBuffer`](crate::row::RowBuffer).

mod schemaful;
mod unversioned;
mod versioned;

pub use schemaful::SchemafulRowMerger;
use thiserror::Error;
pub use unversioned::UnversionedRowMerger;
pub use versioned::VersionedRowMerger;

use crate::{evaluator::AggregateError, value::ColumnId};

/// Errors raised while merging partial rows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// The aggregate evaluator rejected a fold.
    #[error("aggregate merge failed: {0}")]
    Aggregate(#[from] AggregateError),
    /// A partial row carried an aggregate delta for a non-aggregate column.
    #[error("aggregate value supplied for non-aggregate column {column_id}")]
    UnexpectedAggregate {
        /// Offending column.
        column_id: ColumnId,
    },
    /// A partial row referenced a column outside the table schema.
    #[error("column {column_id} is not part of the table schema")]
    UnknownColumn {
        /// Offending column.
        column_id: ColumnId,
    },
}

/// Accumulate/build/reset contract shared by every merger.
pub trait RowMerger {
    /// Partial row type accepted by the merger.
    type Input;
    /// Merged row type emitted by the merger.
    type Output;

    /// Fold `row` into the current accumulation.
    fn add_partial_row(&mut self, row: &Self::Input) -> Result<(), MergeError>;

    /// Emit the merged row and return to idle. `None` means the key has no
    /// live row (never written, fully deleted or purged).
    fn build_merged_row(&mut self) -> Result<Option<Self::Output>, MergeError>;

    /// Abandon any accumulation and clear the merger's buffer. Rows emitted
    /// earlier hold their own references to captured payloads and stay valid.
    fn reset(&mut self);
}

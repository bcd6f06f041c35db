//! Multi-store readers feeding equal-key runs into a [`RowMerger`].
//!
//! Each store is consumed through an asynchronous cursor yielding batches of
//! rows already sorted by key. The readers keep one [`session`] per store and
//! suspend only while waiting for a session's next batch; dropping a reader
//! drops every open cursor.
//!
//! [`RowMerger`]: crate::merger::RowMerger

mod heap;
mod lookup;
mod range;
mod session;

pub use futures_util::stream::BoxStream;
pub use lookup::OverlappingLookupReader;
pub use range::OverlappingRangeReader;
use thiserror::Error;

use crate::{compare::CompareError, merger::MergeError};

/// Failure reported by a store cursor; carried to the caller unchanged.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Cursor over one store: batches of rows in key order.
pub type StoreStream<'r, T> = BoxStream<'r, Result<Vec<T>, StoreError>>;

type SessionFactory<'r, T> = Box<dyn FnMut(usize) -> StoreStream<'r, T> + Send + 'r>;

/// Errors surfaced by the overlapping readers.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// A store cursor failed.
    #[error("store {index} failed: {source}")]
    Store {
        /// Index of the failing store.
        index: usize,
        /// Error reported by the cursor.
        #[source]
        source: StoreError,
    },
    /// Keys could not be ordered.
    #[error(transparent)]
    Compare(#[from] CompareError),
    /// The row merger rejected a partial row.
    #[error(transparent)]
    Merge(#[from] MergeError),
}

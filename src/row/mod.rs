//! Unversioned and versioned row representations.

mod buffer;

use std::ops::Deref;

pub use buffer::{RowBuffer, RowHandle};

use crate::{
    mvcc::Timestamp,
    value::{UnversionedValue, VersionedValue},
};

/// Flat sequence of values; by convention the first `key_column_count` values
/// form the key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnversionedRow {
    values: Vec<UnversionedValue>,
}

impl UnversionedRow {
    /// Wrap `values`.
    pub fn new(values: Vec<UnversionedValue>) -> Self {
        Self { values }
    }

    /// Values of the row.
    pub fn values(&self) -> &[UnversionedValue] {
        &self.values
    }

    /// The first `key_column_count` values (or all values, if fewer).
    pub fn keys(&self, key_column_count: usize) -> &[UnversionedValue] {
        &self.values[..self.values.len().min(key_column_count)]
    }

    /// Append a value.
    pub fn push(&mut self, value: UnversionedValue) {
        self.values.push(value);
    }

    /// Keep only the first `count` values.
    pub fn truncate(&mut self, count: usize) {
        self.values.truncate(count);
    }

    /// Unwrap into the underlying values.
    pub fn into_values(self) -> Vec<UnversionedValue> {
        self.values
    }
}

impl Deref for UnversionedRow {
    type Target = [UnversionedValue];

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl From<Vec<UnversionedValue>> for UnversionedRow {
    fn from(values: Vec<UnversionedValue>) -> Self {
        Self::new(values)
    }
}

impl FromIterator<UnversionedValue> for UnversionedRow {
    fn from_iter<T: IntoIterator<Item = UnversionedValue>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Key prefix plus a bag of timestamped cells and sorted write/delete
/// timestamp sets.
///
/// Rows produced by [`VersionedRowBuilder`] and by the versioned merger keep
/// cells ordered by column id ascending and timestamp descending, and both
/// timestamp sets in descending order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VersionedRow {
    keys: Vec<UnversionedValue>,
    values: Vec<VersionedValue>,
    write_timestamps: Vec<Timestamp>,
    delete_timestamps: Vec<Timestamp>,
}

impl VersionedRow {
    /// Assemble a row from its parts as given.
    pub fn new(
        keys: Vec<UnversionedValue>,
        values: Vec<VersionedValue>,
        write_timestamps: Vec<Timestamp>,
        delete_timestamps: Vec<Timestamp>,
    ) -> Self {
        Self {
            keys,
            values,
            write_timestamps,
            delete_timestamps,
        }
    }

    /// Key values.
    pub fn keys(&self) -> &[UnversionedValue] {
        &self.keys
    }

    /// Timestamped cells.
    pub fn values(&self) -> &[VersionedValue] {
        &self.values
    }

    /// Commit timestamps of writes to this row.
    pub fn write_timestamps(&self) -> &[Timestamp] {
        &self.write_timestamps
    }

    /// Commit timestamps of deletes of this row.
    pub fn delete_timestamps(&self) -> &[Timestamp] {
        &self.delete_timestamps
    }

    /// Number of key values.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

/// Incremental [`VersionedRow`] construction with canonical ordering.
#[derive(Debug, Default)]
pub struct VersionedRowBuilder {
    keys: Vec<UnversionedValue>,
    values: Vec<VersionedValue>,
    write_timestamps: Vec<Timestamp>,
    delete_timestamps: Vec<Timestamp>,
}

impl VersionedRowBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key value.
    pub fn add_key(&mut self, value: UnversionedValue) -> &mut Self {
        self.keys.push(value);
        self
    }

    /// Add a cell; its timestamp joins the write timestamps.
    pub fn add_value(&mut self, value: VersionedValue) -> &mut Self {
        self.write_timestamps.push(value.timestamp);
        self.values.push(value);
        self
    }

    /// Record a delete.
    pub fn add_delete_timestamp(&mut self, timestamp: Timestamp) -> &mut Self {
        self.delete_timestamps.push(timestamp);
        self
    }

    /// Sort cells by `(id asc, timestamp desc)`, sort and dedup both
    /// timestamp sets descending, and emit the row.
    pub fn finish(&mut self) -> VersionedRow {
        let mut values = std::mem::take(&mut self.values);
        values.sort_by(|lhs, rhs| {
            lhs.id
                .cmp(&rhs.id)
                .then_with(|| rhs.timestamp.cmp(&lhs.timestamp))
        });

        let mut write_timestamps = std::mem::take(&mut self.write_timestamps);
        sort_descending_unique(&mut write_timestamps);
        let mut delete_timestamps = std::mem::take(&mut self.delete_timestamps);
        sort_descending_unique(&mut delete_timestamps);

        VersionedRow::new(
            std::mem::take(&mut self.keys),
            values,
            write_timestamps,
            delete_timestamps,
        )
    }
}

pub(crate) fn sort_descending_unique(timestamps: &mut Vec<Timestamp>) {
    timestamps.sort_unstable_by(|lhs, rhs| rhs.cmp(lhs));
    timestamps.dedup();
}

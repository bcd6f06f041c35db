//! Append-only arena for captured rows and values.
//!
//! The buffer owns two regions: an aligned region of value slots backing rows
//! captured through [`RowBuffer::capture_row`], and an unaligned region of
//! payload bytes that every captured string-like value is deep-copied into.
//! [`RowBuffer::clear`] resets both and bumps a generation counter; reading a
//! [`RowHandle`] issued before the clear is a programmer error and panics.

use std::mem::size_of;

use bytes::{Bytes, BytesMut};

use super::{UnversionedRow, VersionedRow};
use crate::value::{UnversionedValue, VersionedValue};

const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Handle to a row captured into a [`RowBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowHandle {
    generation: u64,
    offset: usize,
    len: usize,
}

impl RowHandle {
    /// Number of values in the captured row.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true for a captured empty row.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Arena owning captured rows and payload bytes.
#[derive(Debug)]
pub struct RowBuffer {
    aligned: Vec<UnversionedValue>,
    unaligned: BytesMut,
    chunk_size: usize,
    unaligned_size: usize,
    unaligned_capacity: usize,
    generation: u64,
}

impl Default for RowBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RowBuffer {
    /// Buffer allocating payload chunks of the default size.
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Buffer allocating payload chunks of at least `chunk_size` bytes.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            aligned: Vec::new(),
            unaligned: BytesMut::new(),
            chunk_size: chunk_size.max(1),
            unaligned_size: 0,
            unaligned_capacity: 0,
            generation: 0,
        }
    }

    /// Deep-copy the payload of `value` into the arena.
    pub fn capture_value(&mut self, value: &UnversionedValue) -> UnversionedValue {
        match value.data.payload() {
            Some(payload) => {
                let bytes = self.allocate_unaligned(payload);
                UnversionedValue {
                    id: value.id,
                    aggregate: value.aggregate,
                    data: value.data.with_payload(bytes),
                }
            }
            None => value.clone(),
        }
    }

    /// Deep-copy the payload of a versioned cell into the arena.
    pub fn capture_versioned_value(&mut self, value: &VersionedValue) -> VersionedValue {
        VersionedValue::new(self.capture_value(&value.value), value.timestamp)
    }

    /// Capture `values` as one contiguous block of slots.
    pub fn capture_row(&mut self, values: &[UnversionedValue]) -> RowHandle {
        let offset = self.aligned.len();
        self.aligned.reserve(values.len());
        for value in values {
            let captured = self.capture_value(value);
            self.aligned.push(captured);
        }
        RowHandle {
            generation: self.generation,
            offset,
            len: values.len(),
        }
    }

    /// Values of a captured row.
    ///
    /// # Panics
    /// Panics when `handle` was issued before the last [`RowBuffer::clear`].
    pub fn row(&self, handle: RowHandle) -> &[UnversionedValue] {
        assert_eq!(
            handle.generation, self.generation,
            "row read after its buffer was cleared"
        );
        &self.aligned[handle.offset..handle.offset + handle.len]
    }

    /// Copy a captured row out of the arena slots.
    pub fn to_unversioned_row(&self, handle: RowHandle) -> UnversionedRow {
        UnversionedRow::new(self.row(handle).to_vec())
    }

    /// Deep-copy every payload of a versioned row.
    pub fn capture_versioned_row(&mut self, row: &VersionedRow) -> VersionedRow {
        let keys = row.keys().iter().map(|v| self.capture_value(v)).collect();
        let values = row
            .values()
            .iter()
            .map(|v| self.capture_versioned_value(v))
            .collect();
        VersionedRow::new(
            keys,
            values,
            row.write_timestamps().to_vec(),
            row.delete_timestamps().to_vec(),
        )
    }

    /// Returns true when `handle` is still readable.
    pub fn is_live(&self, handle: RowHandle) -> bool {
        handle.generation == self.generation
    }

    /// Bytes in use across both regions.
    pub fn size(&self) -> usize {
        self.aligned.len() * size_of::<UnversionedValue>() + self.unaligned_size
    }

    /// Bytes reserved across both regions.
    pub fn capacity(&self) -> usize {
        self.aligned.capacity() * size_of::<UnversionedValue>() + self.unaligned_capacity
    }

    /// Drop every capture. Handles issued so far become unreadable; slot
    /// capacity is kept for reuse.
    pub fn clear(&mut self) {
        self.aligned.clear();
        self.unaligned_size = 0;
        self.unaligned_capacity = self.unaligned.capacity();
        self.generation += 1;
    }

    fn allocate_unaligned(&mut self, payload: &[u8]) -> Bytes {
        if self.unaligned.capacity() - self.unaligned.len() < payload.len() {
            let chunk = self.chunk_size.max(payload.len());
            self.unaligned = BytesMut::with_capacity(chunk);
            self.unaligned_capacity += chunk;
        }
        self.unaligned.extend_from_slice(payload);
        self.unaligned_size += payload.len();
        self.unaligned.split().freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mvcc::Timestamp,
        row::VersionedRowBuilder,
        value::{UnversionedValue, ValueData},
    };

    #[test]
    fn capture_copies_payload_into_arena() {
        let mut buffer = RowBuffer::with_chunk_size(64);
        let source = UnversionedValue::string("payload", 3).with_aggregate(true);
        let captured = buffer.capture_value(&source);

        assert_eq!(captured, source);
        let (ValueData::String(lhs), ValueData::String(rhs)) = (&captured.data, &source.data)
        else {
            unreachable!()
        };
        assert_ne!(lhs.as_ptr(), rhs.as_ptr());
        assert_eq!(buffer.size(), 7);
        assert!(buffer.capacity() >= 64);
    }

    #[test]
    fn capture_row_round_trips_through_handle() {
        let mut buffer = RowBuffer::new();
        let values = vec![
            UnversionedValue::int64(1, 0),
            UnversionedValue::string("abc", 1),
            UnversionedValue::null(2),
        ];
        let handle = buffer.capture_row(&values);

        assert_eq!(handle.len(), 3);
        assert_eq!(buffer.row(handle), values.as_slice());
        assert_eq!(buffer.to_unversioned_row(handle).into_values(), values);
        assert!(buffer.size() >= 3 * size_of::<UnversionedValue>() + 3);
    }

    #[test]
    fn large_payload_gets_its_own_chunk() {
        let mut buffer = RowBuffer::with_chunk_size(4);
        let big = vec![7u8; 100];
        let captured = buffer.capture_value(&UnversionedValue::any(&big, 0));
        assert_eq!(captured.data.payload().map(|b| b.len()), Some(100));
        assert!(buffer.capacity() >= 100);
    }

    #[test]
    fn clear_invalidates_handles() {
        let mut buffer = RowBuffer::new();
        let handle = buffer.capture_row(&[UnversionedValue::int64(1, 0)]);
        assert!(buffer.is_live(handle));

        buffer.clear();
        assert!(!buffer.is_live(handle));
        assert_eq!(buffer.size(), 0);

        let fresh = buffer.capture_row(&[UnversionedValue::int64(2, 0)]);
        assert_eq!(buffer.row(fresh)[0], UnversionedValue::int64(2, 0));
    }

    #[test]
    #[should_panic(expected = "row read after its buffer was cleared")]
    fn reading_stale_handle_panics() {
        let mut buffer = RowBuffer::new();
        let handle = buffer.capture_row(&[UnversionedValue::int64(1, 0)]);
        buffer.clear();
        let _ = buffer.row(handle);
    }

    #[test]
    fn versioned_capture_keeps_structure() {
        let mut buffer = RowBuffer::new();
        let row = VersionedRowBuilder::new()
            .add_key(UnversionedValue::string("k", 0))
            .add_value(VersionedValue::new(
                UnversionedValue::string("v", 1),
                Timestamp::new(5),
            ))
            .add_delete_timestamp(Timestamp::new(2))
            .finish();
        assert_eq!(buffer.capture_versioned_row(&row), row);
        assert_eq!(buffer.size(), 2);
    }
}

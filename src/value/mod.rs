//! Tagged-union cell values and their versioned wrapper.
//!
//! Variable-width payloads (`String`, `Any`, `Composite`) are held in [`Bytes`]
//! so a value either owns its bytes outright or shares them with the
//! [`crate::row::RowBuffer`] arena chunk it was captured into.

use std::{
    fmt,
    ops::{Deref, DerefMut},
};

use bytes::Bytes;

use crate::mvcc::Timestamp;

/// Column identifier within a table schema.
pub type ColumnId = u16;

/// Type tag of a value.
///
/// The discriminants fix the cross-type ordering used by the comparator:
/// `Min` sorts before and `Max` after every other type.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueType {
    /// Lower range-boundary sentinel.
    Min = 0x00,
    /// Delete marker inside a per-column timeline; internal to versioned merges.
    TheBottom = 0x01,
    /// Missing value.
    Null = 0x02,
    /// Signed 64-bit integer.
    Int64 = 0x03,
    /// Unsigned 64-bit integer.
    Uint64 = 0x04,
    /// IEEE-754 double.
    Double = 0x05,
    /// Boolean.
    Boolean = 0x06,
    /// Byte string.
    String = 0x10,
    /// Opaque structured payload.
    Any = 0x11,
    /// Opaque nested payload.
    Composite = 0x12,
    /// Upper range-boundary sentinel.
    Max = 0xef,
}

impl ValueType {
    /// Returns true for `Min`, `Max`, `Null` and `TheBottom`.
    pub fn is_sentinel(self) -> bool {
        matches!(
            self,
            ValueType::Min | ValueType::Max | ValueType::Null | ValueType::TheBottom
        )
    }

    /// Returns true for payloads that carry no total order.
    pub fn is_opaque(self) -> bool {
        matches!(self, ValueType::Any | ValueType::Composite)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Min => "min",
            ValueType::TheBottom => "the_bottom",
            ValueType::Null => "null",
            ValueType::Int64 => "int64",
            ValueType::Uint64 => "uint64",
            ValueType::Double => "double",
            ValueType::Boolean => "boolean",
            ValueType::String => "string",
            ValueType::Any => "any",
            ValueType::Composite => "composite",
            ValueType::Max => "max",
        };
        f.write_str(name)
    }
}

/// Payload of a value.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueData {
    /// See [`ValueType::Min`].
    Min,
    /// See [`ValueType::TheBottom`].
    TheBottom,
    /// See [`ValueType::Null`].
    Null,
    /// See [`ValueType::Int64`].
    Int64(i64),
    /// See [`ValueType::Uint64`].
    Uint64(u64),
    /// See [`ValueType::Double`].
    Double(f64),
    /// See [`ValueType::Boolean`].
    Boolean(bool),
    /// See [`ValueType::String`].
    String(Bytes),
    /// See [`ValueType::Any`].
    Any(Bytes),
    /// See [`ValueType::Composite`].
    Composite(Bytes),
    /// See [`ValueType::Max`].
    Max,
}

impl ValueData {
    /// Type tag of this payload.
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueData::Min => ValueType::Min,
            ValueData::TheBottom => ValueType::TheBottom,
            ValueData::Null => ValueType::Null,
            ValueData::Int64(_) => ValueType::Int64,
            ValueData::Uint64(_) => ValueType::Uint64,
            ValueData::Double(_) => ValueType::Double,
            ValueData::Boolean(_) => ValueType::Boolean,
            ValueData::String(_) => ValueType::String,
            ValueData::Any(_) => ValueType::Any,
            ValueData::Composite(_) => ValueType::Composite,
            ValueData::Max => ValueType::Max,
        }
    }

    /// Sentinel payload for a sentinel type tag; `None` for data-carrying tags.
    pub fn sentinel(value_type: ValueType) -> Option<Self> {
        match value_type {
            ValueType::Min => Some(ValueData::Min),
            ValueType::TheBottom => Some(ValueData::TheBottom),
            ValueType::Null => Some(ValueData::Null),
            ValueType::Max => Some(ValueData::Max),
            _ => None,
        }
    }

    /// Variable-width payload, if any.
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            ValueData::String(bytes) | ValueData::Any(bytes) | ValueData::Composite(bytes) => {
                Some(bytes)
            }
            _ => None,
        }
    }

    /// Rebuilds a string-like payload around `bytes`, keeping the type tag.
    pub(crate) fn with_payload(&self, bytes: Bytes) -> Self {
        match self {
            ValueData::String(_) => ValueData::String(bytes),
            ValueData::Any(_) => ValueData::Any(bytes),
            ValueData::Composite(_) => ValueData::Composite(bytes),
            other => other.clone(),
        }
    }
}

/// A cell without a timestamp: column id, aggregate flag and payload.
#[derive(Clone, Debug, PartialEq)]
pub struct UnversionedValue {
    /// Column the value belongs to.
    pub id: ColumnId,
    /// Whether the value is a partial aggregate delta rather than an overwrite.
    pub aggregate: bool,
    /// Payload.
    pub data: ValueData,
}

impl UnversionedValue {
    /// Non-aggregate value for column `id`.
    pub fn new(data: ValueData, id: ColumnId) -> Self {
        Self {
            id,
            aggregate: false,
            data,
        }
    }

    /// `Null` for column `id`.
    pub fn null(id: ColumnId) -> Self {
        Self::new(ValueData::Null, id)
    }

    /// `Min` sentinel for column `id`.
    pub fn min(id: ColumnId) -> Self {
        Self::new(ValueData::Min, id)
    }

    /// `Max` sentinel for column `id`.
    pub fn max(id: ColumnId) -> Self {
        Self::new(ValueData::Max, id)
    }

    /// Signed integer value.
    pub fn int64(value: i64, id: ColumnId) -> Self {
        Self::new(ValueData::Int64(value), id)
    }

    /// Unsigned integer value.
    pub fn uint64(value: u64, id: ColumnId) -> Self {
        Self::new(ValueData::Uint64(value), id)
    }

    /// Double value.
    pub fn double(value: f64, id: ColumnId) -> Self {
        Self::new(ValueData::Double(value), id)
    }

    /// Boolean value.
    pub fn boolean(value: bool, id: ColumnId) -> Self {
        Self::new(ValueData::Boolean(value), id)
    }

    /// String value owning a copy of `value`.
    pub fn string(value: impl AsRef<[u8]>, id: ColumnId) -> Self {
        Self::new(
            ValueData::String(Bytes::copy_from_slice(value.as_ref())),
            id,
        )
    }

    /// Opaque `Any` value owning a copy of `value`.
    pub fn any(value: impl AsRef<[u8]>, id: ColumnId) -> Self {
        Self::new(ValueData::Any(Bytes::copy_from_slice(value.as_ref())), id)
    }

    /// Opaque `Composite` value owning a copy of `value`.
    pub fn composite(value: impl AsRef<[u8]>, id: ColumnId) -> Self {
        Self::new(
            ValueData::Composite(Bytes::copy_from_slice(value.as_ref())),
            id,
        )
    }

    /// Returns `self` with the aggregate flag replaced.
    pub fn with_aggregate(self, aggregate: bool) -> Self {
        Self { aggregate, ..self }
    }

    /// Type tag of the payload.
    pub fn value_type(&self) -> ValueType {
        self.data.value_type()
    }

    /// Returns true when the payload is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self.data, ValueData::Null)
    }
}

/// A cell stamped with the timestamp of the write that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionedValue {
    /// Column id, aggregate flag and payload.
    pub value: UnversionedValue,
    /// Commit timestamp of the write.
    pub timestamp: Timestamp,
}

impl VersionedValue {
    /// Stamp `value` with `timestamp`.
    pub fn new(value: UnversionedValue, timestamp: Timestamp) -> Self {
        Self { value, timestamp }
    }

    /// Delete marker for column `id` at `timestamp`.
    pub(crate) fn the_bottom(id: ColumnId, timestamp: Timestamp) -> Self {
        Self::new(UnversionedValue::new(ValueData::TheBottom, id), timestamp)
    }

    /// Returns true for a delete marker.
    pub(crate) fn is_the_bottom(&self) -> bool {
        matches!(self.value.data, ValueData::TheBottom)
    }

    /// Drops the timestamp.
    pub fn into_unversioned(self) -> UnversionedValue {
        self.value
    }
}

impl Deref for VersionedValue {
    type Target = UnversionedValue;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl DerefMut for VersionedValue {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tags_order_sentinels_around_data() {
        assert!(ValueType::Min < ValueType::TheBottom);
        assert!(ValueType::TheBottom < ValueType::Null);
        assert!(ValueType::Null < ValueType::Int64);
        assert!(ValueType::Boolean < ValueType::String);
        assert!(ValueType::Composite < ValueType::Max);
    }

    #[test]
    fn payload_helpers() {
        let value = UnversionedValue::string("abc", 3);
        assert_eq!(value.value_type(), ValueType::String);
        assert_eq!(value.data.payload().map(|b| b.as_ref()), Some(&b"abc"[..]));
        assert_eq!(UnversionedValue::int64(1, 0).data.payload(), None);

        let rebuilt = value.data.with_payload(Bytes::from_static(b"xyz"));
        assert_eq!(rebuilt, ValueData::String(Bytes::from_static(b"xyz")));
    }

    #[test]
    fn versioned_value_derefs() {
        let mut value = VersionedValue::new(
            UnversionedValue::int64(7, 2).with_aggregate(true),
            Timestamp::new(10),
        );
        assert_eq!(value.id, 2);
        assert!(value.aggregate);
        value.aggregate = false;
        assert!(!value.into_unversioned().aggregate);

        assert!(VersionedValue::the_bottom(1, Timestamp::new(3)).is_the_bottom());
        assert_eq!(ValueData::sentinel(ValueType::Int64), None);
    }
}

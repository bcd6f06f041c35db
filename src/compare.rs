//! Total order over values and rows.
//!
//! Values of different types order by their [`ValueType`] tag, which places
//! `Min` before and `Max` after every real value of a column. Opaque payloads
//! (`Any`, `Composite`) may only meet sentinels, and NaN never participates in a
//! comparison.

use std::{cmp::Ordering, sync::Arc};

use thiserror::Error;

use crate::value::{UnversionedValue, ValueData, ValueType};

/// Errors raised while ordering values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompareError {
    /// An opaque payload met something other than a sentinel.
    #[error(
        "cannot compare values of types {lhs} and {rhs}; only scalar types are allowed for key \
         columns"
    )]
    IncomparableType {
        /// Type of the left operand.
        lhs: ValueType,
        /// Type of the right operand.
        rhs: ValueType,
    },
    /// A NaN double participated in a key comparison.
    #[error("NaN value cannot be used as a key component")]
    InvalidDoubleValue,
}

/// Key ordering used by the overlapping readers.
pub type KeyComparer = Arc<
    dyn Fn(&[UnversionedValue], &[UnversionedValue]) -> Result<Ordering, CompareError>
        + Send
        + Sync,
>;

/// [`compare_rows`] wrapped as a [`KeyComparer`].
pub fn default_key_comparer() -> KeyComparer {
    Arc::new(|lhs: &[UnversionedValue], rhs: &[UnversionedValue]| compare_rows(lhs, rhs))
}

/// Compare two values, ignoring their column ids and aggregate flags.
pub fn compare_values(
    lhs: &UnversionedValue,
    rhs: &UnversionedValue,
) -> Result<Ordering, CompareError> {
    compare_value_data(&lhs.data, &rhs.data)
}

/// Compare two payloads.
pub fn compare_value_data(lhs: &ValueData, rhs: &ValueData) -> Result<Ordering, CompareError> {
    let lhs_type = lhs.value_type();
    let rhs_type = rhs.value_type();

    if (lhs_type.is_opaque() || rhs_type.is_opaque())
        && !lhs_type.is_sentinel()
        && !rhs_type.is_sentinel()
    {
        return Err(CompareError::IncomparableType {
            lhs: lhs_type,
            rhs: rhs_type,
        });
    }

    validate_double(lhs)?;
    validate_double(rhs)?;

    if lhs_type != rhs_type {
        return Ok(lhs_type.cmp(&rhs_type));
    }

    let ordering = match (lhs, rhs) {
        (ValueData::Int64(lhs), ValueData::Int64(rhs)) => lhs.cmp(rhs),
        (ValueData::Uint64(lhs), ValueData::Uint64(rhs)) => lhs.cmp(rhs),
        (ValueData::Double(lhs), ValueData::Double(rhs)) => lhs
            .partial_cmp(rhs)
            .ok_or(CompareError::InvalidDoubleValue)?,
        (ValueData::Boolean(lhs), ValueData::Boolean(rhs)) => lhs.cmp(rhs),
        (ValueData::String(lhs), ValueData::String(rhs)) => lhs.as_ref().cmp(rhs.as_ref()),
        // All sentinels of the same type are equal.
        (ValueData::Null, ValueData::Null)
        | (ValueData::Min, ValueData::Min)
        | (ValueData::Max, ValueData::Max)
        | (ValueData::TheBottom, ValueData::TheBottom) => Ordering::Equal,
        _ => {
            return Err(CompareError::IncomparableType {
                lhs: lhs_type,
                rhs: rhs_type,
            })
        }
    };
    Ok(ordering)
}

fn validate_double(value: &ValueData) -> Result<(), CompareError> {
    match value {
        ValueData::Double(double) if double.is_nan() => Err(CompareError::InvalidDoubleValue),
        _ => Ok(()),
    }
}

/// Lexicographic comparison; a strict prefix orders first.
pub fn compare_rows(
    lhs: &[UnversionedValue],
    rhs: &[UnversionedValue],
) -> Result<Ordering, CompareError> {
    for (lhs, rhs) in lhs.iter().zip(rhs.iter()) {
        let ordering = compare_values(lhs, rhs)?;
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(lhs.len().cmp(&rhs.len()))
}

/// Compare the first `prefix_length` values of two possibly absent rows.
///
/// An absent row sorts before any present row and equals only another absent
/// row.
pub fn compare_row_prefix(
    lhs: Option<&[UnversionedValue]>,
    rhs: Option<&[UnversionedValue]>,
    prefix_length: usize,
) -> Result<Ordering, CompareError> {
    match (lhs, rhs) {
        (None, None) => Ok(Ordering::Equal),
        (Some(_), None) => Ok(Ordering::Greater),
        (None, Some(_)) => Ok(Ordering::Less),
        (Some(lhs), Some(rhs)) => compare_rows(
            &lhs[..lhs.len().min(prefix_length)],
            &rhs[..rhs.len().min(prefix_length)],
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::*;

    fn int(value: i64) -> UnversionedValue {
        UnversionedValue::int64(value, 0)
    }

    #[test]
    fn scalars_compare_naturally() {
        assert_eq!(compare_values(&int(1), &int(2)), Ok(Ordering::Less));
        assert_eq!(
            compare_values(
                &UnversionedValue::uint64(9, 0),
                &UnversionedValue::uint64(3, 0)
            ),
            Ok(Ordering::Greater)
        );
        assert_eq!(
            compare_values(
                &UnversionedValue::boolean(false, 0),
                &UnversionedValue::boolean(true, 0)
            ),
            Ok(Ordering::Less)
        );
        assert_eq!(
            compare_values(
                &UnversionedValue::double(1.5, 0),
                &UnversionedValue::double(1.5, 0)
            ),
            Ok(Ordering::Equal)
        );
    }

    #[test]
    fn strings_compare_bytewise_shorter_first() {
        let ab = UnversionedValue::string("ab", 0);
        let abc = UnversionedValue::string("abc", 0);
        let b = UnversionedValue::string("b", 0);
        assert_eq!(compare_values(&ab, &abc), Ok(Ordering::Less));
        assert_eq!(compare_values(&abc, &b), Ok(Ordering::Less));
        assert_eq!(compare_values(&ab, &ab), Ok(Ordering::Equal));
    }

    #[test]
    fn different_types_order_by_tag() {
        assert_eq!(
            compare_values(&int(i64::MAX), &UnversionedValue::string("", 0)),
            Ok(Ordering::Less)
        );
        assert_eq!(
            compare_values(&UnversionedValue::min(0), &int(i64::MIN)),
            Ok(Ordering::Less)
        );
        assert_eq!(
            compare_values(&UnversionedValue::max(0), &UnversionedValue::string("zzz", 0)),
            Ok(Ordering::Greater)
        );
        assert_eq!(
            compare_values(&UnversionedValue::null(0), &int(0)),
            Ok(Ordering::Less)
        );
        assert_eq!(
            compare_values(&UnversionedValue::double(1.0, 0), &int(5)),
            Ok(Ordering::Greater)
        );
    }

    #[test]
    fn sentinels_of_same_type_are_equal() {
        assert_eq!(
            compare_values(&UnversionedValue::null(0), &UnversionedValue::null(4)),
            Ok(Ordering::Equal)
        );
        assert_eq!(
            compare_values(&UnversionedValue::max(1), &UnversionedValue::max(2)),
            Ok(Ordering::Equal)
        );
    }

    #[test]
    fn opaque_values_only_meet_sentinels() {
        let composite = UnversionedValue::composite(b"{}", 0);
        let any = UnversionedValue::any(b"[]", 0);
        assert_eq!(
            compare_values(&composite, &int(1)),
            Err(CompareError::IncomparableType {
                lhs: ValueType::Composite,
                rhs: ValueType::Int64,
            })
        );
        assert!(compare_values(&any, &any).is_err());
        assert_eq!(
            compare_values(&composite, &UnversionedValue::max(0)),
            Ok(Ordering::Less)
        );
        assert_eq!(
            compare_values(&UnversionedValue::min(0), &any),
            Ok(Ordering::Less)
        );
        assert_eq!(
            compare_values(&UnversionedValue::null(0), &composite),
            Ok(Ordering::Less)
        );
    }

    #[test]
    fn nan_is_rejected() {
        let nan = UnversionedValue::double(f64::NAN, 0);
        assert_eq!(
            compare_values(&nan, &UnversionedValue::double(1.0, 0)),
            Err(CompareError::InvalidDoubleValue)
        );
        assert_eq!(
            compare_values(&int(1), &nan),
            Err(CompareError::InvalidDoubleValue)
        );
    }

    #[test]
    fn rows_compare_lexicographically() {
        assert_eq!(
            compare_rows(&[int(1), int(2)], &[int(1), int(3)]),
            Ok(Ordering::Less)
        );
        assert_eq!(compare_rows(&[int(1)], &[int(1), int(0)]), Ok(Ordering::Less));
        assert_eq!(compare_rows(&[int(2)], &[int(1), int(9)]), Ok(Ordering::Greater));
        let empty: [UnversionedValue; 0] = [];
        assert_eq!(compare_rows(&empty, &empty), Ok(Ordering::Equal));
    }

    #[test]
    fn prefix_comparison_truncates_and_orders_absent_first() {
        let lhs = [int(1), int(2)];
        let rhs = [int(1), int(3)];
        assert_eq!(
            compare_row_prefix(Some(&lhs[..]), Some(&rhs[..]), 1),
            Ok(Ordering::Equal)
        );
        assert_eq!(
            compare_row_prefix(Some(&lhs[..]), Some(&rhs[..]), 2),
            Ok(Ordering::Less)
        );
        assert_eq!(compare_row_prefix(None, Some(&rhs[..]), 2), Ok(Ordering::Less));
        assert_eq!(compare_row_prefix(Some(&lhs[..]), None, 2), Ok(Ordering::Greater));
        assert_eq!(compare_row_prefix(None, None, 2), Ok(Ordering::Equal));
    }

    #[test]
    fn default_comparer_matches_compare_rows() {
        let comparer = default_key_comparer();
        assert_eq!(comparer(&[int(3)], &[int(4)]), Ok(Ordering::Less));
    }
}

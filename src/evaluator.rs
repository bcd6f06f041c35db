//! Aggregate folding for aggregating columns.
//!
//! The mergers call [`AggregateEvaluator::merge_aggregate`] left to right in
//! timestamp (or call) order, starting from a `Null` state. Every builtin treats
//! `Null` as the neutral element, so folding a chunked input piecewise yields the
//! same result as folding it in one pass.

use std::{cmp::Ordering, sync::Arc};

use thiserror::Error;

use crate::{
    compare::{compare_values, CompareError},
    row::RowBuffer,
    schema::TableSchema,
    value::{ColumnId, UnversionedValue, ValueData, ValueType},
};

/// Errors raised while folding aggregate values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// The schema names an aggregate function that is not registered.
    #[error("unknown aggregate function {function:?} for column {column_id}")]
    UnknownFunction {
        /// Column declaring the function.
        column_id: ColumnId,
        /// Declared function name.
        function: String,
    },
    /// A fold was requested for a column that does not aggregate.
    #[error("column {column_id} is not an aggregate column")]
    NotAggregate {
        /// Offending column.
        column_id: ColumnId,
    },
    /// The function does not accept the given operand types.
    #[error("aggregate {function} cannot combine {state} with {incoming} in column {column_id}")]
    TypeMismatch {
        /// Column being folded.
        column_id: ColumnId,
        /// Function name.
        function: &'static str,
        /// Type of the running state.
        state: ValueType,
        /// Type of the incoming value.
        incoming: ValueType,
    },
    /// Ordering-based aggregates met incomparable operands.
    #[error("aggregate operands are incomparable: {0}")]
    Compare(#[from] CompareError),
}

/// Folds one incoming partial value into a running aggregate state.
pub trait AggregateEvaluator: Send + Sync {
    /// Combine `state` with `incoming` for column `column_id`.
    ///
    /// Any variable-width payload in the result must be captured into
    /// `buffer`.
    fn merge_aggregate(
        &self,
        column_id: ColumnId,
        state: &UnversionedValue,
        incoming: &UnversionedValue,
        buffer: &mut RowBuffer,
    ) -> Result<UnversionedValue, AggregateError>;
}

/// Builtin aggregate functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinAggregate {
    /// Numeric sum with wrapping integer arithmetic.
    Sum,
    /// Least value.
    Min,
    /// Greatest value.
    Max,
    /// First non-null value.
    First,
}

impl BuiltinAggregate {
    /// Resolve a function by its schema name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(BuiltinAggregate::Sum),
            "min" => Some(BuiltinAggregate::Min),
            "max" => Some(BuiltinAggregate::Max),
            "first" => Some(BuiltinAggregate::First),
            _ => None,
        }
    }

    /// Schema name of the function.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinAggregate::Sum => "sum",
            BuiltinAggregate::Min => "min",
            BuiltinAggregate::Max => "max",
            BuiltinAggregate::First => "first",
        }
    }

    fn apply(
        self,
        column_id: ColumnId,
        state: &UnversionedValue,
        incoming: &UnversionedValue,
    ) -> Result<ValueData, AggregateError> {
        if incoming.is_null() {
            return Ok(state.data.clone());
        }
        if state.is_null() {
            return Ok(incoming.data.clone());
        }
        let data = match self {
            BuiltinAggregate::Sum => match (&state.data, &incoming.data) {
                (ValueData::Int64(lhs), ValueData::Int64(rhs)) => {
                    ValueData::Int64(lhs.wrapping_add(*rhs))
                }
                (ValueData::Uint64(lhs), ValueData::Uint64(rhs)) => {
                    ValueData::Uint64(lhs.wrapping_add(*rhs))
                }
                (ValueData::Double(lhs), ValueData::Double(rhs)) => ValueData::Double(lhs + rhs),
                _ => {
                    return Err(AggregateError::TypeMismatch {
                        column_id,
                        function: self.name(),
                        state: state.value_type(),
                        incoming: incoming.value_type(),
                    })
                }
            },
            BuiltinAggregate::Min | BuiltinAggregate::Max => {
                if state.value_type() != incoming.value_type() {
                    return Err(AggregateError::TypeMismatch {
                        column_id,
                        function: self.name(),
                        state: state.value_type(),
                        incoming: incoming.value_type(),
                    });
                }
                let ordering = compare_values(incoming, state)?;
                let take_incoming = match self {
                    BuiltinAggregate::Min => ordering == Ordering::Less,
                    _ => ordering == Ordering::Greater,
                };
                if take_incoming {
                    incoming.data.clone()
                } else {
                    state.data.clone()
                }
            }
            BuiltinAggregate::First => state.data.clone(),
        };
        Ok(data)
    }
}

/// [`AggregateEvaluator`] resolving each column's aggregate by schema name.
#[derive(Debug)]
pub struct ColumnEvaluator {
    functions: Vec<Option<BuiltinAggregate>>,
}

impl ColumnEvaluator {
    /// Resolve every aggregate named in `schema`.
    pub fn new(schema: Arc<TableSchema>) -> Result<Self, AggregateError> {
        let functions = schema
            .columns()
            .iter()
            .enumerate()
            .map(|(id, column)| match column.aggregate() {
                None => Ok(None),
                Some(name) => BuiltinAggregate::from_name(name).map(Some).ok_or_else(|| {
                    AggregateError::UnknownFunction {
                        column_id: id as ColumnId,
                        function: name.to_string(),
                    }
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { functions })
    }

    /// Aggregate function of column `column_id`, if it aggregates.
    pub fn function(&self, column_id: ColumnId) -> Option<BuiltinAggregate> {
        self.functions.get(column_id as usize).copied().flatten()
    }
}

impl AggregateEvaluator for ColumnEvaluator {
    fn merge_aggregate(
        &self,
        column_id: ColumnId,
        state: &UnversionedValue,
        incoming: &UnversionedValue,
        buffer: &mut RowBuffer,
    ) -> Result<UnversionedValue, AggregateError> {
        let function = self
            .function(column_id)
            .ok_or(AggregateError::NotAggregate { column_id })?;
        let data = function.apply(column_id, state, incoming)?;
        Ok(buffer.capture_value(&UnversionedValue::new(data, column_id)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::ColumnSchema;

    fn evaluator() -> ColumnEvaluator {
        let schema = TableSchema::new(
            vec![
                ColumnSchema::new("k", ValueType::Int64),
                ColumnSchema::new("sum", ValueType::Int64).with_aggregate("sum"),
                ColumnSchema::new("min", ValueType::String).with_aggregate("min"),
                ColumnSchema::new("max", ValueType::Double).with_aggregate("max"),
                ColumnSchema::new("first", ValueType::String).with_aggregate("first"),
            ],
            1,
        );
        ColumnEvaluator::new(Arc::new(schema)).unwrap()
    }

    fn fold(evaluator: &ColumnEvaluator, id: ColumnId, values: &[UnversionedValue]) -> UnversionedValue {
        let mut buffer = RowBuffer::new();
        let mut state = UnversionedValue::null(id);
        for value in values {
            state = evaluator
                .merge_aggregate(id, &state, value, &mut buffer)
                .unwrap();
        }
        state
    }

    #[test]
    fn sum_skips_nulls() {
        let evaluator = evaluator();
        let result = fold(
            &evaluator,
            1,
            &[
                UnversionedValue::int64(3, 1),
                UnversionedValue::null(1),
                UnversionedValue::int64(4, 1),
            ],
        );
        assert_eq!(result, UnversionedValue::int64(7, 1));
    }

    #[test]
    fn folding_is_chunk_independent() {
        let evaluator = evaluator();
        let values: Vec<_> = (1..=6).map(|v| UnversionedValue::int64(v, 1)).collect();
        let whole = fold(&evaluator, 1, &values);
        let head = fold(&evaluator, 1, &values[..2]);
        let mut tail = vec![head];
        tail.extend_from_slice(&values[2..]);
        assert_eq!(fold(&evaluator, 1, &tail), whole);
    }

    #[test]
    fn ordering_aggregates() {
        let evaluator = evaluator();
        let min = fold(
            &evaluator,
            2,
            &[
                UnversionedValue::string("pear", 2),
                UnversionedValue::string("apple", 2),
                UnversionedValue::string("plum", 2),
            ],
        );
        assert_eq!(min, UnversionedValue::string("apple", 2));

        let max = fold(
            &evaluator,
            3,
            &[UnversionedValue::double(1.5, 3), UnversionedValue::double(-2.0, 3)],
        );
        assert_eq!(max, UnversionedValue::double(1.5, 3));

        let first = fold(
            &evaluator,
            4,
            &[
                UnversionedValue::null(4),
                UnversionedValue::string("a", 4),
                UnversionedValue::string("b", 4),
            ],
        );
        assert_eq!(first, UnversionedValue::string("a", 4));
    }

    #[test]
    fn errors() {
        let evaluator = evaluator();
        let mut buffer = RowBuffer::new();
        assert_eq!(
            evaluator.merge_aggregate(
                0,
                &UnversionedValue::null(0),
                &UnversionedValue::int64(1, 0),
                &mut buffer
            ),
            Err(AggregateError::NotAggregate { column_id: 0 })
        );
        assert!(matches!(
            evaluator.merge_aggregate(
                1,
                &UnversionedValue::int64(1, 1),
                &UnversionedValue::string("x", 1),
                &mut buffer
            ),
            Err(AggregateError::TypeMismatch { function: "sum", .. })
        ));

        let schema = TableSchema::new(
            vec![ColumnSchema::new("x", ValueType::Int64).with_aggregate("median")],
            0,
        );
        assert!(matches!(
            ColumnEvaluator::new(Arc::new(schema)),
            Err(AggregateError::UnknownFunction { column_id: 0, .. })
        ));
    }
}

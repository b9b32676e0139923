//! Per-property aggregators. All three are commutative and associative, so
//! the tablet engine may merge entries in any order and any grouping.

use crate::value::{Value, ValueKind};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error as ThisError;

///
/// AggregateError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum AggregateError {
    #[error("cannot aggregate {left} with {right}")]
    KindMismatch { left: ValueKind, right: ValueKind },

    #[error("{aggregator} overflowed on {kind}")]
    Overflow {
        aggregator: Aggregator,
        kind: ValueKind,
    },

    #[error("{aggregator} does not support {kind}")]
    Unsupported {
        aggregator: Aggregator,
        kind: ValueKind,
    },
}

///
/// Aggregator
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregator {
    #[display("sum")]
    Sum,
    #[display("min")]
    Min,
    #[display("max")]
    Max,
}

impl Aggregator {
    #[must_use]
    pub const fn supports(self, kind: ValueKind) -> bool {
        match self {
            Self::Sum => kind.is_numeric(),
            Self::Min | Self::Max => true,
        }
    }

    /// Merge two values of the same declared kind.
    pub fn apply(self, left: Value, right: Value) -> Result<Value, AggregateError> {
        if left.kind() != right.kind() {
            return Err(AggregateError::KindMismatch {
                left: left.kind(),
                right: right.kind(),
            });
        }

        match self {
            Self::Sum => sum(self, left, right),
            Self::Min | Self::Max => {
                let ordering = left
                    .canonical_cmp(&right)
                    .unwrap_or(Ordering::Equal);
                let keep_left = match self {
                    Self::Min => ordering != Ordering::Greater,
                    _ => ordering != Ordering::Less,
                };
                Ok(if keep_left { left } else { right })
            }
        }
    }
}

fn sum(aggregator: Aggregator, left: Value, right: Value) -> Result<Value, AggregateError> {
    let kind = left.kind();
    let overflow = || AggregateError::Overflow { aggregator, kind };

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
        (Value::Uint(a), Value::Uint(b)) => a.checked_add(b).map(Value::Uint).ok_or_else(overflow),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        _ => Err(AggregateError::Unsupported { aggregator, kind }),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_adds_numerics() {
        assert_eq!(
            Aggregator::Sum.apply(Value::Int(3), Value::Int(4)).unwrap(),
            Value::Int(7)
        );
        assert_eq!(
            Aggregator::Sum.apply(Value::Uint(1), Value::Uint(2)).unwrap(),
            Value::Uint(3)
        );
    }

    #[test]
    fn sum_overflow_is_an_error() {
        assert!(matches!(
            Aggregator::Sum.apply(Value::Int(i64::MAX), Value::Int(1)),
            Err(AggregateError::Overflow { .. })
        ));
    }

    #[test]
    fn min_max_keep_the_extreme() {
        assert_eq!(
            Aggregator::Max.apply(Value::Int(5), Value::Int(2)).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            Aggregator::Min
                .apply(Value::Text("b".into()), Value::Text("a".into()))
                .unwrap(),
            Value::Text("a".into())
        );
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        assert!(matches!(
            Aggregator::Max.apply(Value::Int(1), Value::Uint(1)),
            Err(AggregateError::KindMismatch { .. })
        ));
    }
}

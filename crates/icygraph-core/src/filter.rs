//! Compare predicates over element properties.
//!
//! A filter expression is a conjunction of per-property compare predicates.
//! That shape keeps view monotonicity trivially true (adding a predicate can
//! only shrink a result) and makes group-by safety a per-predicate property.
//! Comparison never crosses kinds: a predicate whose literal kind differs
//! from the property's value is simply false.

use crate::{element::Properties, value::Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Exists,
    NotExists,
}

impl CompareOp {
    /// Ops that compare against a literal; `Exists`/`NotExists` do not.
    #[must_use]
    pub const fn takes_literal(self) -> bool {
        !matches!(self, Self::Exists | Self::NotExists)
    }
}

///
/// ValuePredicate
/// One op plus its literal (absent for existence checks).
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValuePredicate {
    pub op: CompareOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<Value>,
}

impl ValuePredicate {
    #[must_use]
    pub const fn new(op: CompareOp, literal: Option<Value>) -> Self {
        Self { op, literal }
    }

    #[must_use]
    pub const fn exists() -> Self {
        Self {
            op: CompareOp::Exists,
            literal: None,
        }
    }

    /// Evaluate against a property that may be absent.
    #[must_use]
    pub fn eval(&self, value: Option<&Value>) -> bool {
        match self.op {
            CompareOp::Exists => value.is_some(),
            CompareOp::NotExists => value.is_none(),
            op => {
                let (Some(value), Some(literal)) = (value, self.literal.as_ref()) else {
                    return false;
                };
                value
                    .canonical_cmp(literal)
                    .is_some_and(|ordering| ordering_passes(op, ordering))
            }
        }
    }
}

const fn ordering_passes(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Eq => matches!(ordering, Ordering::Equal),
        CompareOp::Ne => !matches!(ordering, Ordering::Equal),
        CompareOp::Lt => matches!(ordering, Ordering::Less),
        CompareOp::Le => !matches!(ordering, Ordering::Greater),
        CompareOp::Gt => matches!(ordering, Ordering::Greater),
        CompareOp::Ge => !matches!(ordering, Ordering::Less),
        // existence checks never reach an ordering
        CompareOp::Exists | CompareOp::NotExists => false,
    }
}

///
/// ComparePredicate
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ComparePredicate {
    pub property: String,
    #[serde(flatten)]
    pub predicate: ValuePredicate,
}

impl ComparePredicate {
    #[must_use]
    pub fn new(property: impl Into<String>, op: CompareOp, literal: Option<Value>) -> Self {
        Self {
            property: property.into(),
            predicate: ValuePredicate::new(op, literal),
        }
    }

    #[must_use]
    pub fn eval(&self, properties: &Properties) -> bool {
        self.predicate.eval(properties.get(&self.property))
    }
}

///
/// FilterExpr
/// Conjunction of compare predicates.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterExpr(pub Vec<ComparePredicate>);

impl FilterExpr {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn with(mut self, predicate: ComparePredicate) -> Self {
        self.0.push(predicate);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn eval(&self, properties: &Properties) -> bool {
        self.0.iter().all(|p| p.eval(properties))
    }

    /// The property names this expression selects.
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|p| p.property.as_str())
    }

    /// Split into the predicates safe to run before aggregation (those over
    /// `safe` properties, whose values aggregation never changes) and the
    /// rest, which must wait for the post-aggregation plane.
    #[must_use]
    pub fn split_group_by_safe(&self, safe: &[String]) -> (Self, Self) {
        let (safe_preds, deferred): (Vec<_>, Vec<_>) = self
            .0
            .iter()
            .cloned()
            .partition(|p| safe.iter().any(|s| s == &p.property));
        (Self(safe_preds), Self(deferred))
    }

    /// Conjoin another expression onto this one.
    #[must_use]
    pub fn and(mut self, other: Self) -> Self {
        self.0.extend(other.0);
        self
    }
}

///
/// TESTS
///

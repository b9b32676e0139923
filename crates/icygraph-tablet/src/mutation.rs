//! Mutations are row-atomic write units: one row, one or more column puts.

use serde::{Deserialize, Serialize};

///
/// ColumnUpdate
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ColumnUpdate {
    #[serde(with = "serde_bytes")]
    pub family: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub qualifier: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub visibility: Vec<u8>,
    pub timestamp: u64,
    #[serde(with = "serde_bytes")]
    pub value: Vec<u8>,
}

///
/// Mutation
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    #[serde(with = "serde_bytes")]
    pub row: Vec<u8>,
    pub updates: Vec<ColumnUpdate>,
}

impl Mutation {
    #[must_use]
    pub const fn new(row: Vec<u8>) -> Self {
        Self {
            row,
            updates: Vec::new(),
        }
    }

    pub fn put(
        &mut self,
        family: Vec<u8>,
        qualifier: Vec<u8>,
        visibility: Vec<u8>,
        timestamp: u64,
        value: Vec<u8>,
    ) {
        self.updates.push(ColumnUpdate {
            family,
            qualifier,
            visibility,
            timestamp,
            value,
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

//! StoredKey is the full tablet-side coordinate of one cell: row, column
//! family, column qualifier, column visibility, timestamp.
//!
//! Ordering is the engine's scan order: the four byte planes ascending,
//! timestamp descending (newest version first). The first four planes form
//! the aggregation key under which the engine may merge adjacent entries.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Cell payload bytes. Opaque to the engine; only the graph codec can read
/// them, and only with a schema in hand.
pub type CellValue = Vec<u8>;

///
/// StoredKey
///

#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct StoredKey {
    #[serde(with = "serde_bytes")]
    pub row: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub family: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub qualifier: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub visibility: Vec<u8>,
    pub timestamp: u64,
}

impl StoredKey {
    #[must_use]
    pub const fn new(
        row: Vec<u8>,
        family: Vec<u8>,
        qualifier: Vec<u8>,
        visibility: Vec<u8>,
        timestamp: u64,
    ) -> Self {
        Self {
            row,
            family,
            qualifier,
            visibility,
            timestamp,
        }
    }

    /// First scan position of a row: every cell of `row` sorts at or after
    /// this key, because timestamps sort descending.
    #[must_use]
    pub const fn row_start(row: Vec<u8>) -> Self {
        Self {
            row,
            family: Vec::new(),
            qualifier: Vec::new(),
            visibility: Vec::new(),
            timestamp: u64::MAX,
        }
    }

    /// The aggregation key: two cells are mergeable iff these four planes
    /// are bytewise equal.
    #[must_use]
    pub fn aggregation_key(&self) -> (&[u8], &[u8], &[u8], &[u8]) {
        (&self.row, &self.family, &self.qualifier, &self.visibility)
    }

    #[must_use]
    pub fn same_aggregation_key(&self, other: &Self) -> bool {
        self.aggregation_key() == other.aggregation_key()
    }
}

impl Ord for StoredKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row
            .cmp(&other.row)
            .then_with(|| self.family.cmp(&other.family))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
            .then_with(|| self.visibility.cmp(&other.visibility))
            // newest version first
            .then_with(|| other.timestamp.cmp(&self.timestamp))
    }
}

impl PartialOrd for StoredKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StoredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{} @{}",
            hex(&self.row),
            String::from_utf8_lossy(&self.family),
            hex(&self.qualifier),
            self.timestamp
        )
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

///
/// TESTS
///

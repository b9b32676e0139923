//! Row-level scan ranges. A range is half-open on row bytes: every cell
//! whose row is in `[start, end)` is covered, across all column planes.

use crate::key::{CellValue, StoredKey};
use serde::{Deserialize, Serialize};

/// Stream of cells flowing through a server-side iterator stack.
pub type CellStream<'a> = Box<dyn Iterator<Item = (StoredKey, CellValue)> + 'a>;

///
/// ScanRange
/// An empty `end` means the range is unbounded above.
///

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ScanRange {
    #[serde(with = "serde_bytes")]
    pub start: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub end: Vec<u8>,
}

impl ScanRange {
    #[must_use]
    pub const fn new(start: Vec<u8>, end: Vec<u8>) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn from_start(start: Vec<u8>) -> Self {
        Self {
            start,
            end: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.end.is_empty()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.is_unbounded() && self.start >= self.end
    }

    #[must_use]
    pub fn contains_row(&self, row: &[u8]) -> bool {
        row >= self.start.as_slice() && (self.is_unbounded() || row < self.end.as_slice())
    }

    /// Merge a sorted range list, collapsing overlapping and adjacent
    /// entries. Sorting is the caller's contract; unsorted input is merged
    /// after an internal sort.
    #[must_use]
    pub fn coalesce(mut ranges: Vec<Self>) -> Vec<Self> {
        ranges.retain(|r| !r.is_empty());
        ranges.sort();

        let mut merged: Vec<Self> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if last.is_unbounded() => {}
                Some(last) if range.start <= last.end => {
                    if range.is_unbounded() || range.end > last.end {
                        last.end = range.end;
                    }
                }
                _ => merged.push(range),
            }
        }

        merged
    }
}

///
/// TESTS
///

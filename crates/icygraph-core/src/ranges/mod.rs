//! Range construction: from a seed to the row ranges that cover it.
//!
//! Every upper bound here is a prefix successor, not a sentinel suffix, so
//! endpoint encodings with high leading bytes stay covered. Ranges come out
//! sorted by start key; callers may coalesce them (`ScanRange::coalesce`)
//! without changing the result set.

use crate::{
    codec::{CodecError, ElementConverter, escape::DELIMITER, layout::RowDirection, layout::RowLayout},
    element::Seed,
    value::Value,
};
use icygraph_tablet::ScanRange;
use std::cmp::Ordering;

///
/// SeedScope
/// Which element kinds a seed's ranges must cover.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeedScope {
    EntitiesOnly,
    EdgesOnly,
    EntitiesAndEdges,
}

///
/// RangeFactory
///

#[derive(Clone)]
pub struct RangeFactory {
    codec: ElementConverter,
}

impl RangeFactory {
    #[must_use]
    pub const fn new(codec: ElementConverter) -> Self {
        Self { codec }
    }

    const fn layout(&self) -> RowLayout {
        self.codec.layout()
    }

    /// Ranges covering every key whose element touches `vertex`, narrowed
    /// to the requested scope. Edge scans overshoot onto the entity key by
    /// construction; the direction iterator trims it.
    pub fn entity_seed_ranges(
        &self,
        vertex: &Value,
        scope: SeedScope,
    ) -> Result<Vec<ScanRange>, CodecError> {
        let prefix = self.codec.encode_vertex(vertex)?;

        let range = match (scope, self.layout()) {
            (SeedScope::EntitiesOnly, layout) => {
                let row = layout.entity_row(&prefix);
                let end = append(row.clone(), DELIMITER);
                ScanRange::new(row, end)
            }
            (SeedScope::EdgesOnly, _) => ScanRange::new(
                append(prefix.clone(), DELIMITER),
                append(prefix, DELIMITER + 1),
            ),
            (SeedScope::EntitiesAndEdges, RowLayout::ByteEntity) => ScanRange::new(
                append(prefix.clone(), DELIMITER),
                append(prefix, DELIMITER + 1),
            ),
            (SeedScope::EntitiesAndEdges, RowLayout::Classic) => {
                ScanRange::new(prefix.clone(), append(prefix, DELIMITER + 1))
            }
        };

        Ok(vec![range])
    }

    /// The point range holding an edge seed's source-first row. The caller
    /// re-verifies decoded elements: several groups can share the row.
    pub fn edge_seed_range(
        &self,
        source: &Value,
        destination: &Value,
        directed: bool,
    ) -> Result<ScanRange, CodecError> {
        let (first, second) = if !directed
            && source.canonical_cmp(destination) == Some(Ordering::Greater)
        {
            (destination, source)
        } else {
            (source, destination)
        };

        let direction = if directed {
            RowDirection::SourceFirst
        } else {
            RowDirection::Undirected
        };

        let row = self.layout().edge_row(
            &self.codec.encode_vertex(first)?,
            &self.codec.encode_vertex(second)?,
            direction,
        );
        let end = append(row.clone(), DELIMITER);
        Ok(ScanRange::new(row, end))
    }

    /// All rows whose first endpoint sorts in `[low, high]`, inclusive of
    /// `high`'s own keys.
    pub fn vertex_range(&self, low: &Value, high: &Value) -> Result<ScanRange, CodecError> {
        let start = self.codec.encode_vertex(low)?;
        let end = append(self.codec.encode_vertex(high)?, DELIMITER + 1);
        Ok(ScanRange::new(start, end))
    }

    /// The whole table.
    #[must_use]
    pub fn full_range(&self) -> ScanRange {
        ScanRange::from_start(Vec::new())
    }

    /// Ranges for a seed list, sorted by start key.
    pub fn seed_ranges(
        &self,
        seeds: &[Seed],
        scope: SeedScope,
    ) -> Result<Vec<ScanRange>, CodecError> {
        let mut ranges = Vec::with_capacity(seeds.len());
        for seed in seeds {
            match seed {
                Seed::Entity { entity } => {
                    ranges.extend(self.entity_seed_ranges(entity, scope)?);
                }
                Seed::Edge {
                    edge: (source, destination, directed),
                } => ranges.push(self.edge_seed_range(source, destination, *directed)?),
            }
        }
        ranges.sort();
        Ok(ranges)
    }
}

fn append(mut bytes: Vec<u8>, byte: u8) -> Vec<u8> {
    bytes.push(byte);
    bytes
}

///
/// TESTS
///

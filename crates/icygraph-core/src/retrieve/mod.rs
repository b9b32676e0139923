//! Retrievers: the lazy, single-pass element stream over one scan.
//!
//! Each pulled cell decodes through the codec; undecodable cells are
//! logged, counted, and skipped so one corrupt entry never poisons a
//! query. Both row forms of an edge can fall inside the requested ranges;
//! the retriever returns each edge once, deduplicating on the canonical
//! (smaller) row form. Closing releases the scanner and is idempotent;
//! dropping closes.

use crate::{
    codec::ElementConverter,
    element::Element,
    error::Error,
    obs::metrics,
    store::StoreError,
};
use icygraph_tablet::{CellScanner, StoredKey};
use std::collections::HashSet;
use tracing::warn;
use xxhash_rust::xxh3::Xxh3;

/// Lazy element sequence produced by read operations.
pub type ElementStream = Box<dyn Iterator<Item = Result<Element, Error>>>;

/// Post-decode check a handler may install (set-membership verification,
/// seed re-verification). Elements failing it are silently skipped.
pub type ElementVerifier = Box<dyn Fn(&Element) -> bool>;

/// Pre-decode check on the raw key, for cheap skips (bloom-prefix
/// membership) before the codec runs.
pub type RowFilter = Box<dyn Fn(&StoredKey) -> bool>;

///
/// ElementRetriever
///

pub struct ElementRetriever {
    scanner: Option<Box<dyn CellScanner>>,
    codec: ElementConverter,
    include_matched: bool,
    seen_edges: HashSet<u64>,
    row_filter: Option<RowFilter>,
    verifier: Option<ElementVerifier>,
}

impl ElementRetriever {
    #[must_use]
    pub fn new(scanner: Box<dyn CellScanner>, codec: ElementConverter) -> Self {
        Self {
            scanner: Some(scanner),
            codec,
            include_matched: false,
            seen_edges: HashSet::new(),
            row_filter: None,
            verifier: None,
        }
    }

    /// Decoded edges carry the matched-end hint (adjacency queries).
    #[must_use]
    pub const fn with_matched_hint(mut self) -> Self {
        self.include_matched = true;
        self
    }

    #[must_use]
    pub fn with_row_filter(mut self, filter: RowFilter) -> Self {
        self.row_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: ElementVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Release the scanner. Idempotent; the stream ends afterwards.
    pub fn close(&mut self) {
        if let Some(mut scanner) = self.scanner.take() {
            scanner.close();
        }
    }

    /// Identity of a cell with its two edge row forms unified, for dedup.
    fn edge_identity(&self, key: &StoredKey, partner: Vec<u8>) -> u64 {
        let canonical = if partner.as_slice() < key.row.as_slice() {
            &partner
        } else {
            &key.row
        };

        let mut hasher = Xxh3::new();
        for plane in [
            canonical.as_slice(),
            key.family.as_slice(),
            key.qualifier.as_slice(),
            key.visibility.as_slice(),
        ] {
            hasher.update(&(plane.len() as u64).to_be_bytes());
            hasher.update(plane);
        }
        hasher.digest()
    }
}

impl Iterator for ElementRetriever {
    type Item = Result<Element, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let scanner = self.scanner.as_mut()?;

            let cell = match scanner.next_cell() {
                Ok(Some(cell)) => cell,
                Ok(None) => {
                    self.close();
                    return None;
                }
                Err(err) => {
                    self.close();
                    return Some(Err(StoreError::from(err).into()));
                }
            };
            metrics::record_rows_scanned(1);

            let (key, value) = cell;

            if self.row_filter.as_ref().is_some_and(|filter| !filter(&key)) {
                continue;
            }

            // unify dual-keyed edges before decoding
            match self.codec.partner_row(&key.row) {
                Ok(Some(partner)) => {
                    let identity = self.edge_identity(&key, partner);
                    if !self.seen_edges.insert(identity) {
                        continue;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(key = %key, error = %err, "skipping cell with unparsable row");
                    metrics::record_codec_failure();
                    continue;
                }
            }

            let element = match self.codec.from_key_value(&key, &value, self.include_matched) {
                Ok(element) => element,
                Err(err) => {
                    warn!(key = %key, error = %err, "skipping undecodable cell");
                    metrics::record_codec_failure();
                    continue;
                }
            };

            if self.verifier.as_ref().is_some_and(|verify| !verify(&element)) {
                continue;
            }

            metrics::record_element_returned();
            return Some(Ok(element));
        }
    }
}

impl Drop for ElementRetriever {
    fn drop(&mut self) {
        self.close();
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::layout::RowLayout,
        test_support::{converter, knows, person},
    };
    use icygraph_tablet::{CellValue, TabletError};

    struct VecScanner {
        cells: std::vec::IntoIter<(StoredKey, CellValue)>,
        closed: bool,
    }

    impl VecScanner {
        fn new(cells: Vec<(StoredKey, CellValue)>) -> Self {
            Self {
                cells: cells.into_iter(),
                closed: false,
            }
        }
    }

    impl CellScanner for VecScanner {
        fn next_cell(&mut self) -> Result<Option<(StoredKey, CellValue)>, TabletError> {
            if self.closed {
                return Err(TabletError::ScannerClosed);
            }
            Ok(self.cells.next())
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn all_cells(elements: &[Element]) -> Vec<(StoredKey, CellValue)> {
        let codec = converter(RowLayout::ByteEntity);
        let mut cells = Vec::new();
        for element in elements {
            let (first, second) = codec.to_keys(element).unwrap();
            let value = codec.to_value(element).unwrap();
            cells.push((first, value.clone()));
            if let Some(second) = second {
                cells.push((second, value));
            }
        }
        cells.sort_by(|a, b| a.0.cmp(&b.0));
        cells
    }

    fn retriever(elements: &[Element]) -> ElementRetriever {
        ElementRetriever::new(
            Box::new(VecScanner::new(all_cells(elements))),
            converter(RowLayout::ByteEntity),
        )
    }

    #[test]
    fn edges_return_once_despite_dual_keys() {
        let edge = knows("1", "2", 3);
        let out: Vec<_> = retriever(&[edge.clone()]).map(Result::unwrap).collect();
        assert_eq!(out, vec![edge]);
    }

    #[test]
    fn entities_pass_straight_through() {
        let entity = person("1", 30);
        let out: Vec<_> = retriever(&[entity.clone()]).map(Result::unwrap).collect();
        assert_eq!(out, vec![entity]);
    }

    #[test]
    fn corrupt_cells_are_skipped_not_fatal() {
        let codec = converter(RowLayout::ByteEntity);
        let good = person("1", 30);
        let (key, _) = codec.to_keys(&good).unwrap();
        let cells = vec![
            (key.clone(), vec![0xFF]), // truncated payload
            (key, codec.to_value(&good).unwrap()),
        ];

        let out: Vec<_> = ElementRetriever::new(Box::new(VecScanner::new(cells)), codec)
            .map(Result::unwrap)
            .collect();
        assert_eq!(out, vec![good]);
    }

    #[test]
    fn verifier_drops_elements() {
        let out: Vec<_> = retriever(&[person("1", 30), person("2", 40)])
            .with_verifier(Box::new(|element| {
                element.properties().get("age") == Some(&crate::value::Value::Int(40))
            }))
            .map(Result::unwrap)
            .collect();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn close_is_idempotent_and_ends_the_stream() {
        let mut retriever = retriever(&[person("1", 30)]);
        retriever.close();
        retriever.close();
        assert!(retriever.next().is_none());
    }
}

//! Dual-key consistency sweep.
//!
//! The two row forms of an edge are co-owned: finding one without the
//! other is a recoverable inconsistency, not an error. The sweep walks a
//! raw scan (no iterators, so unmerged entries are visible as written),
//! indexes every cell by identity hash, and re-emits the missing partner
//! of any unpaired edge cell with identical planes, value, and timestamp.

use crate::{
    error::Error,
    obs::metrics,
    store::{Store, StoreError},
};
use icygraph_tablet::{Mutation, StoredKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};
use xxhash_rust::xxh3::Xxh3;

///
/// RepairSummary
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RepairSummary {
    pub examined: u64,
    pub repaired: u64,
}

/// Find edge cells whose partner row form is missing and re-emit it.
pub fn repair_unpaired_edges(store: &Store) -> Result<RepairSummary, Error> {
    let codec = store.package().codec();
    let full = store.package().ranges().full_range();

    // pass one: index every cell identity
    let mut present: HashSet<u64> = HashSet::new();
    let mut cells: Vec<(StoredKey, Vec<u8>)> = Vec::new();
    let mut scanner = store.scan(std::slice::from_ref(&full), &[])?;
    loop {
        match scanner.next_cell() {
            Ok(Some((key, value))) => {
                present.insert(cell_identity(&key.row, &key));
                cells.push((key, value));
            }
            Ok(None) => break,
            Err(err) => {
                scanner.close();
                return Err(StoreError::from(err).into());
            }
        }
    }
    scanner.close();

    // pass two: re-emit missing partners
    let mut summary = RepairSummary::default();
    let mut writer = store.open_writer()?;
    for (key, value) in cells {
        let partner = match codec.partner_row(&key.row) {
            Ok(Some(partner)) => partner,
            Ok(None) => continue,
            Err(err) => {
                warn!(key = %key, error = %err, "skipping unparsable row during repair");
                continue;
            }
        };

        summary.examined += 1;
        if present.contains(&cell_identity(&partner, &key)) {
            continue;
        }

        let mut mutation = Mutation::new(partner);
        mutation.put(
            key.family.clone(),
            key.qualifier.clone(),
            key.visibility.clone(),
            key.timestamp,
            value,
        );
        match writer.submit(mutation) {
            Ok(()) => {
                summary.repaired += 1;
                metrics::record_elements_written(1);
            }
            Err(err) => {
                warn!(key = %key, error = %err, "failed to re-emit missing partner");
            }
        }
    }

    if let Err(err) = writer.close() {
        warn!(error = %err, "batch writer close failed");
    }

    if summary.repaired > 0 {
        info!(
            examined = summary.examined,
            repaired = summary.repaired,
            "re-emitted missing edge partners"
        );
    }
    Ok(summary)
}

/// Identity of one cell under a chosen row, shared planes from `key`.
fn cell_identity(row: &[u8], key: &StoredKey) -> u64 {
    let mut hasher = Xxh3::new();
    for plane in [
        row,
        key.family.as_slice(),
        key.qualifier.as_slice(),
        key.visibility.as_slice(),
    ] {
        hasher.update(&(plane.len() as u64).to_be_bytes());
        hasher.update(plane);
    }
    hasher.digest()
}

//! Runtime metrics are update-only by contract: executors increment, and
//! `report` snapshots. Counters are process-wide atomics; a snapshot is
//! not a transaction across them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static OPERATIONS_EXECUTED: AtomicU64 = AtomicU64::new(0);
static ROWS_SCANNED: AtomicU64 = AtomicU64::new(0);
static ELEMENTS_RETURNED: AtomicU64 = AtomicU64::new(0);
static ELEMENTS_WRITTEN: AtomicU64 = AtomicU64::new(0);
static ELEMENTS_SKIPPED: AtomicU64 = AtomicU64::new(0);
static CODEC_FAILURES: AtomicU64 = AtomicU64::new(0);

pub fn record_operation() {
    OPERATIONS_EXECUTED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_rows_scanned(count: u64) {
    ROWS_SCANNED.fetch_add(count, Ordering::Relaxed);
}

pub fn record_element_returned() {
    ELEMENTS_RETURNED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_elements_written(count: u64) {
    ELEMENTS_WRITTEN.fetch_add(count, Ordering::Relaxed);
}

pub fn record_element_skipped() {
    ELEMENTS_SKIPPED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_codec_failure() {
    CODEC_FAILURES.fetch_add(1, Ordering::Relaxed);
}

///
/// MetricsReport
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub operations_executed: u64,
    pub rows_scanned: u64,
    pub elements_returned: u64,
    pub elements_written: u64,
    pub elements_skipped: u64,
    pub codec_failures: u64,
}

#[must_use]
pub fn report() -> MetricsReport {
    MetricsReport {
        operations_executed: OPERATIONS_EXECUTED.load(Ordering::Relaxed),
        rows_scanned: ROWS_SCANNED.load(Ordering::Relaxed),
        elements_returned: ELEMENTS_RETURNED.load(Ordering::Relaxed),
        elements_written: ELEMENTS_WRITTEN.load(Ordering::Relaxed),
        elements_skipped: ELEMENTS_SKIPPED.load(Ordering::Relaxed),
        codec_failures: CODEC_FAILURES.load(Ordering::Relaxed),
    }
}

///
/// TESTS
///

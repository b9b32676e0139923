//! The engine contract: what icygraph requires from a tablet cluster.
//!
//! An implementation is an authenticated connection to one instance. It is
//! shared per store, created lazily, and never re-created per query; the
//! scanners and writers it hands out are per-query and owned by the caller.

use crate::{
    error::TabletError,
    iterator::IteratorSpec,
    key::{CellValue, StoredKey},
    mutation::Mutation,
    scan::ScanRange,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

///
/// Credentials
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

///
/// Authorizations
/// The visibility labels a connection is allowed to read.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Authorizations(BTreeSet<String>);

impl Authorizations {
    #[must_use]
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    /// A cell is readable when its label is empty or held by the caller.
    /// Boolean label algebra is the cluster engine's concern, not ours.
    #[must_use]
    pub fn can_see(&self, visibility: &[u8]) -> bool {
        if visibility.is_empty() {
            return true;
        }
        std::str::from_utf8(visibility).is_ok_and(|label| self.0.contains(label))
    }
}

///
/// Capability
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Capability {
    StoreValidation,
    Aggregation,
    Visibility,
}

impl Capability {
    const fn bit(self) -> u8 {
        match self {
            Self::StoreValidation => 1,
            Self::Aggregation => 1 << 1,
            Self::Visibility => 1 << 2,
        }
    }
}

///
/// Capabilities
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0b111);

    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    #[must_use]
    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }
}

///
/// TableConfig
/// Creation-time table settings, derived by the store from its key package
/// and schema. `keep_all_versions` disables version collapsing so that the
/// aggregation iterator sees every written entry.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TableConfig {
    pub split_points: Vec<Vec<u8>>,
    pub bloom_prefix: bool,
    pub keep_all_versions: bool,
}

///
/// CellScanner
/// Pull-based scan handle. Every `next_cell` may block on the network.
/// `close` is idempotent and releases server-side resources.
///

pub trait CellScanner {
    fn next_cell(&mut self) -> Result<Option<(StoredKey, CellValue)>, TabletError>;

    fn close(&mut self);
}

///
/// BatchWriter
/// Row-atomic batched writes. Submission order within a batch carries no
/// ordering guarantee.
///

pub trait BatchWriter {
    fn submit(&mut self, mutation: Mutation) -> Result<(), TabletError>;

    fn close(&mut self) -> Result<(), TabletError>;
}

///
/// TabletEngine
///

pub trait TabletEngine: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Create the table if missing, with `config`; a no-op when it exists.
    fn ensure_table(&self, table: &str, config: &TableConfig) -> Result<(), TabletError>;

    fn scan(
        &self,
        table: &str,
        ranges: &[ScanRange],
        iterators: &[IteratorSpec],
    ) -> Result<Box<dyn CellScanner>, TabletError>;

    fn writer(&self, table: &str) -> Result<Box<dyn BatchWriter>, TabletError>;
}

///
/// TESTS
///

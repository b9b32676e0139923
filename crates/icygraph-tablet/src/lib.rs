//! Tablet-engine contract for icygraph: the ordered key-value surface the
//! graph engine is written against, plus an in-memory engine for tests and
//! embedding.
//!
//! The real cluster client lives outside this workspace; everything here is
//! the seam it plugs into. The contract is deliberately narrow: ranged scans
//! with priority-ordered server-side iterators, a batch writer, per-cell
//! visibility labels, and username/password authentication.

pub mod engine;
pub mod error;
pub mod iterator;
pub mod key;
pub mod memory;
pub mod mutation;
pub mod scan;

pub use engine::{
    Authorizations, BatchWriter, Capabilities, Capability, CellScanner, Credentials, TableConfig,
    TabletEngine,
};
pub use error::TabletError;
pub use iterator::{IteratorRegistry, IteratorSpec, ServerIteratorBuilder};
pub use key::{CellValue, StoredKey};
pub use mutation::{ColumnUpdate, Mutation};
pub use scan::{CellStream, ScanRange};

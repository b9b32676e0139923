//! In-memory tablet engine.
//!
//! Honours the full contract on a single process: multi-version ordered
//! cells, visibility labels, server-side iterator execution at scan time,
//! username/password connections. The test suite runs against this engine;
//! it is also usable for embedding where a cluster is overkill.

use crate::{
    engine::{
        Authorizations, BatchWriter, Capabilities, CellScanner, Credentials, TableConfig,
        TabletEngine,
    },
    error::TabletError,
    iterator::{IteratorRegistry, IteratorSpec},
    key::{CellValue, StoredKey},
    mutation::Mutation,
    scan::ScanRange,
};
use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{Arc, Mutex},
};

///
/// MemoryTabletEngine
/// The "cluster": tables, users, and the iterator registry compiled in.
///

pub struct MemoryTabletEngine {
    shared: Arc<Shared>,
}

struct Shared {
    registry: IteratorRegistry,
    users: Mutex<BTreeMap<String, UserEntry>>,
    tables: Mutex<BTreeMap<String, Table>>,
}

struct UserEntry {
    password: String,
    auths: Authorizations,
}

// Duplicate full keys can coexist until a compaction would merge them
// (e.g. two writes inside one coarsened-timestamp bucket), so each key
// holds every written value, newest last.
struct Table {
    config: TableConfig,
    cells: BTreeMap<StoredKey, Vec<CellValue>>,
}

impl MemoryTabletEngine {
    #[must_use]
    pub fn new(registry: IteratorRegistry) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                users: Mutex::new(BTreeMap::new()),
                tables: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    pub fn add_user(
        &self,
        user: impl Into<String>,
        password: impl Into<String>,
        auths: Authorizations,
    ) {
        let mut users = self.shared.users.lock().expect("user table poisoned");
        users.insert(
            user.into(),
            UserEntry {
                password: password.into(),
                auths,
            },
        );
    }

    /// Authenticate and return a connection scoped to the user's labels.
    pub fn connect(&self, credentials: &Credentials) -> Result<MemoryTablet, TabletError> {
        let users = self.shared.users.lock().expect("user table poisoned");
        let entry = users
            .get(&credentials.user)
            .filter(|entry| entry.password == credentials.password)
            .ok_or_else(|| TabletError::AuthenticationFailed {
                user: credentials.user.clone(),
            })?;

        Ok(MemoryTablet {
            shared: Arc::clone(&self.shared),
            auths: entry.auths.clone(),
        })
    }
}

///
/// MemoryTablet
/// One authenticated connection.
///

pub struct MemoryTablet {
    shared: Arc<Shared>,
    auths: Authorizations,
}

impl MemoryTablet {
    fn collect_cells(
        &self,
        table: &str,
        ranges: &[ScanRange],
    ) -> Result<Vec<(StoredKey, CellValue)>, TabletError> {
        let tables = self.shared.tables.lock().expect("tables poisoned");
        let table = tables
            .get(table)
            .ok_or_else(|| TabletError::TableNotFound {
                table: table.to_string(),
            })?;

        let mut cells = Vec::new();
        for range in ScanRange::coalesce(ranges.to_vec()) {
            let start = Bound::Included(StoredKey::row_start(range.start.clone()));
            let end = if range.is_unbounded() {
                Bound::Unbounded
            } else {
                Bound::Excluded(StoredKey::row_start(range.end.clone()))
            };
            for (key, values) in table.cells.range((start, end)) {
                if !self.auths.can_see(&key.visibility) {
                    continue;
                }
                if table.config.keep_all_versions {
                    for value in values {
                        cells.push((key.clone(), value.clone()));
                    }
                } else if let Some(value) = values.last() {
                    cells.push((key.clone(), value.clone()));
                }
            }
        }

        if !table.config.keep_all_versions {
            cells = collapse_versions(cells);
        }

        Ok(cells)
    }
}

/// Keep only the newest version per aggregation key. Input is in scan
/// order, which already sorts the newest version first within a cell.
fn collapse_versions(cells: Vec<(StoredKey, CellValue)>) -> Vec<(StoredKey, CellValue)> {
    let mut out: Vec<(StoredKey, CellValue)> = Vec::with_capacity(cells.len());
    for (key, value) in cells {
        match out.last() {
            Some((prev, _)) if prev.same_aggregation_key(&key) => {}
            _ => out.push((key, value)),
        }
    }
    out
}

impl TabletEngine for MemoryTablet {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn ensure_table(&self, table: &str, config: &TableConfig) -> Result<(), TabletError> {
        let mut tables = self.shared.tables.lock().expect("tables poisoned");
        tables.entry(table.to_string()).or_insert_with(|| Table {
            config: config.clone(),
            cells: BTreeMap::new(),
        });
        Ok(())
    }

    fn scan(
        &self,
        table: &str,
        ranges: &[ScanRange],
        iterators: &[IteratorSpec],
    ) -> Result<Box<dyn CellScanner>, TabletError> {
        let cells = self.collect_cells(table, ranges)?;
        let stream = self
            .shared
            .registry
            .apply(iterators, Box::new(cells.into_iter()))?;

        Ok(Box::new(MemoryScanner {
            stream: Some(stream),
        }))
    }

    fn writer(&self, table: &str) -> Result<Box<dyn BatchWriter>, TabletError> {
        {
            let tables = self.shared.tables.lock().expect("tables poisoned");
            if !tables.contains_key(table) {
                return Err(TabletError::TableNotFound {
                    table: table.to_string(),
                });
            }
        }

        Ok(Box::new(MemoryWriter {
            shared: Arc::clone(&self.shared),
            table: table.to_string(),
        }))
    }
}

///
/// MemoryScanner
///

struct MemoryScanner {
    stream: Option<crate::scan::CellStream<'static>>,
}

impl CellScanner for MemoryScanner {
    fn next_cell(&mut self) -> Result<Option<(StoredKey, CellValue)>, TabletError> {
        match self.stream.as_mut() {
            Some(stream) => Ok(stream.next()),
            None => Err(TabletError::ScannerClosed),
        }
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

///
/// MemoryWriter
///

struct MemoryWriter {
    shared: Arc<Shared>,
    table: String,
}

impl BatchWriter for MemoryWriter {
    fn submit(&mut self, mutation: Mutation) -> Result<(), TabletError> {
        if mutation.row.is_empty() {
            return Err(TabletError::MutationRejected {
                reason: "empty row".to_string(),
            });
        }
        if mutation.is_empty() {
            return Err(TabletError::MutationRejected {
                reason: "no column updates".to_string(),
            });
        }

        let mut tables = self.shared.tables.lock().expect("tables poisoned");
        let table = tables
            .get_mut(&self.table)
            .ok_or_else(|| TabletError::TableNotFound {
                table: self.table.clone(),
            })?;

        // row-atomic: all updates land under one lock acquisition
        for update in mutation.updates {
            let key = StoredKey::new(
                mutation.row.clone(),
                update.family,
                update.qualifier,
                update.visibility,
                update.timestamp,
            );
            table.cells.entry(key).or_default().push(update.value);
        }

        Ok(())
    }

    fn close(&mut self) -> Result<(), TabletError> {
        Ok(())
    }
}

///
/// TESTS
///

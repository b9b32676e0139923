//! The store: one schema, one key package, one shared engine connection.
//!
//! Opening validates the schema, resolves the key package, and bootstraps
//! the table (splits, bloom settings, version retention) against the
//! engine. Queries run on the caller's thread over per-query scanners; the
//! store itself holds no mutable state after `open`.

use crate::{
    codec::ElementConverter,
    config::StoreConfig,
    error::Error,
    keypackage::KeyPackage,
    ops::{Operation, OperationOutput, handler},
    schema::Schema,
    view::View,
};
use icygraph_tablet::{
    BatchWriter, Capabilities, Capability, CellScanner, IteratorSpec, ScanRange, TabletEngine,
    TabletError, memory::MemoryTabletEngine,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error as ThisError;

#[cfg(test)]
mod tests;

///
/// StoreError
/// Engine connectivity and auth failures; never retried internally.
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("tablet engine: {0}")]
    Tablet(#[from] TabletError),
}

///
/// Store
///

pub struct Store {
    config: StoreConfig,
    schema: Arc<Schema>,
    package: KeyPackage,
    engine: Arc<dyn TabletEngine>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Open over an already-connected engine. Fails fast on an invalid
    /// schema or unknown key package, then bootstraps the table.
    pub fn open(
        config: StoreConfig,
        schema: Schema,
        engine: Arc<dyn TabletEngine>,
    ) -> Result<Self, Error> {
        schema.validate()?;
        let schema = Arc::new(schema);
        let package = KeyPackage::for_id(&config.key_package, schema.clone())?;

        let table_config = package.table_config(engine.capabilities());
        engine
            .ensure_table(&config.table, &table_config)
            .map_err(StoreError::from)?;

        Ok(Self {
            config,
            schema,
            package,
            engine,
        })
    }

    /// Authenticate against an in-memory cluster with the configured
    /// credentials and open over the resulting connection.
    pub fn open_with_cluster(
        config: StoreConfig,
        schema: Schema,
        cluster: &MemoryTabletEngine,
    ) -> Result<Self, Error> {
        let connection = cluster
            .connect(&config.credentials)
            .map_err(StoreError::from)?;
        Self::open(config, schema, Arc::new(connection))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub const fn package(&self) -> &KeyPackage {
        &self.package
    }

    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.engine.capabilities()
    }

    /// The codec that decodes query results: narrowed by the view's
    /// group-by when the engine aggregates at scan time, the base layout
    /// otherwise.
    #[must_use]
    pub(crate) fn retrieval_codec(&self, view: &View) -> ElementConverter {
        let codec = self.package.codec().clone();
        if self.capabilities().contains(Capability::Aggregation) {
            codec.with_view_group_by(view)
        } else {
            codec
        }
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Execute one declarative operation.
    pub fn execute(&self, operation: Operation) -> Result<OperationOutput, Error> {
        handler::execute(self, operation)
    }

    pub(crate) fn scan(
        &self,
        ranges: &[ScanRange],
        iterators: &[IteratorSpec],
    ) -> Result<Box<dyn CellScanner>, Error> {
        self.engine
            .scan(&self.config.table, ranges, iterators)
            .map_err(|err| StoreError::from(err).into())
    }

    pub(crate) fn open_writer(&self) -> Result<Box<dyn BatchWriter>, Error> {
        self.engine
            .writer(&self.config.table)
            .map_err(|err| StoreError::from(err).into())
    }
}

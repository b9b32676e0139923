//! Server-side iterator plumbing.
//!
//! The engine accepts iterator configuration only as string-keyed options.
//! A scan names its iterators; the engine resolves each name through an
//! explicit registry of builders and threads the cell stream through them
//! in ascending priority order (lowest priority sits closest to the data).

use crate::{error::TabletError, scan::CellStream};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

/// String-keyed iterator options. Values are opaque bytes; the builder that
/// owns the name decides how to decode them.
pub type IteratorOptions = BTreeMap<String, Vec<u8>>;

///
/// IteratorSpec
///
/// One configured iterator in a scan's stack. Priorities must be unique
/// within a scan; ties are a caller bug and resolve by name order.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IteratorSpec {
    pub priority: u8,
    pub name: String,
    pub options: IteratorOptions,
}

impl IteratorSpec {
    #[must_use]
    pub fn new(priority: u8, name: impl Into<String>) -> Self {
        Self {
            priority,
            name: name.into(),
            options: IteratorOptions::new(),
        }
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

///
/// ServerIteratorBuilder
///
/// Builds one iterator stage from its options, wrapping the upstream cell
/// stream. Build-time failures (bad options, version drift) surface before
/// the first cell is pulled.
///

pub trait ServerIteratorBuilder: Send + Sync {
    fn name(&self) -> &'static str;

    fn build<'a>(
        &self,
        options: &IteratorOptions,
        input: CellStream<'a>,
    ) -> Result<CellStream<'a>, TabletError>;
}

///
/// IteratorRegistry
///
/// Explicit name-to-builder registry. There is no reflective loading; an
/// engine knows exactly the iterators compiled into it.
///

#[derive(Clone, Default)]
pub struct IteratorRegistry {
    builders: BTreeMap<&'static str, Arc<dyn ServerIteratorBuilder>>,
}

impl IteratorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, builder: Arc<dyn ServerIteratorBuilder>) {
        self.builders.insert(builder.name(), builder);
    }

    #[must_use]
    pub fn with(mut self, builder: Arc<dyn ServerIteratorBuilder>) -> Self {
        self.register(builder);
        self
    }

    /// Thread `input` through `specs` in ascending priority order.
    pub fn apply<'a>(
        &self,
        specs: &[IteratorSpec],
        input: CellStream<'a>,
    ) -> Result<CellStream<'a>, TabletError> {
        let mut ordered: Vec<&IteratorSpec> = specs.iter().collect();
        ordered.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));

        let mut stream = input;
        for spec in ordered {
            let builder =
                self.builders
                    .get(spec.name.as_str())
                    .ok_or_else(|| TabletError::UnknownIterator {
                        name: spec.name.clone(),
                    })?;
            stream = builder.build(&spec.options, stream)?;
        }

        Ok(stream)
    }
}

///
/// TESTS
///

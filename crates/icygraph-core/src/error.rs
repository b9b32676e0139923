//! The engine's error taxonomy.
//!
//! Policy: configuration and schema errors abort startup; per-element
//! codec errors are logged, counted, and skipped by writers and retrievers;
//! everything else fails the current operation and propagates. Operation
//! chains abort at the first failure and release downstream scanners.

use crate::{
    codec::CodecError,
    config::ConfigError,
    iterator::config::IteratorConfigError,
    ops::OperationError,
    schema::SchemaError,
    store::StoreError,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    IteratorConfig(#[from] IteratorConfigError),
}

impl Error {
    /// Stable kind, independent of error-message text.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Schema(_) => ErrorKind::Schema,
            Self::Codec(_) => ErrorKind::Codec,
            Self::Store(_) => ErrorKind::Store,
            Self::Operation(_) => ErrorKind::Operation,
            Self::IteratorConfig(_) => ErrorKind::IteratorConfig,
        }
    }
}

///
/// ErrorKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Config,
    Schema,
    Codec,
    Store,
    Operation,
    IteratorConfig,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Schema => "schema",
            Self::Codec => "codec",
            Self::Store => "store",
            Self::Operation => "operation",
            Self::IteratorConfig => "iterator_config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// TESTS
///

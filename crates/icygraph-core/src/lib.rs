//! Core engine for icygraph: the element/key codec, range construction,
//! server-side iterator stack, retrievers, operation handlers, writer, and
//! the key packages that bundle one on-disk layout each.
//!
//! A property graph (entities and dual-keyed edges, both carrying typed
//! properties) is stored in an ordered tablet engine so that one range scan
//! recovers every element touching a seed vertex. Queries are declarative
//! operations; filtering and aggregation are pushed down into server-side
//! iterators configured from the immutable schema and per-query view.

pub mod codec;
pub mod config;
pub mod element;
pub mod error;
pub mod filter;
pub mod iterator;
pub mod keypackage;
pub mod obs;
pub mod ops;
pub mod ranges;
pub mod repair;
pub mod retrieve;
pub mod schema;
pub mod store;
pub mod value;
pub mod view;
pub mod write;

#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Domain vocabulary only. No errors, handlers, stores, or helpers are
/// re-exported here.
///

pub mod prelude {
    pub use crate::{
        element::{Edge, Element, Entity, Seed},
        schema::{GroupName, Schema},
        value::{Value, ValueKind},
        view::View,
    };
}

//! Key packages: one bundle of key functor, codec, range factory, and
//! iterator factory per on-disk layout.
//!
//! Layouts are looked up through an explicit registry of identifier
//! strings; an engine knows exactly the layouts compiled into it, and an
//! unknown identifier is a configuration error, not a classpath hunt.

use crate::{
    codec::{ElementConverter, escape::DELIMITER, layout::RowLayout},
    config::ConfigError,
    iterator::IteratorStackFactory,
    ranges::RangeFactory,
    schema::Schema,
};
use icygraph_tablet::{Capabilities, Capability, TableConfig};
use std::sync::Arc;

///
/// KeyFunctor
/// Extracts the bloom-filter prefix of a row: the escaped bytes of its
/// first endpoint. Every key of one vertex shares this prefix, which is
/// what makes it a useful bloom key and a cheap membership pre-filter.
///

#[derive(Clone, Copy, Debug)]
pub struct KeyFunctor {
    layout: RowLayout,
}

impl KeyFunctor {
    #[must_use]
    pub const fn new(layout: RowLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub const fn layout(&self) -> RowLayout {
        self.layout
    }

    #[must_use]
    pub fn seed_prefix<'a>(&self, row: &'a [u8]) -> &'a [u8] {
        row.split(|&b| b == DELIMITER).next().unwrap_or_default()
    }
}

///
/// KeyPackage
///

#[derive(Clone)]
pub struct KeyPackage {
    layout: RowLayout,
    schema: Arc<Schema>,
    codec: ElementConverter,
    ranges: RangeFactory,
    iterators: IteratorStackFactory,
    functor: KeyFunctor,
}

impl KeyPackage {
    /// The registry. Extend this match to add a layout.
    pub fn for_id(id: &str, schema: Arc<Schema>) -> Result<Self, ConfigError> {
        RowLayout::from_id(id)
            .map(|layout| Self::for_layout(layout, schema))
            .ok_or_else(|| ConfigError::UnknownKeyPackage { id: id.to_string() })
    }

    #[must_use]
    pub fn for_layout(layout: RowLayout, schema: Arc<Schema>) -> Self {
        let codec = ElementConverter::new(layout, schema.clone());
        Self {
            layout,
            ranges: RangeFactory::new(codec.clone()),
            iterators: IteratorStackFactory::new(layout, schema.clone()),
            functor: KeyFunctor::new(layout),
            codec,
            schema,
        }
    }

    #[must_use]
    pub const fn known_ids() -> [&'static str; 2] {
        [RowLayout::BYTE_ENTITY_ID, RowLayout::CLASSIC_ID]
    }

    #[must_use]
    pub const fn layout(&self) -> RowLayout {
        self.layout
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub const fn codec(&self) -> &ElementConverter {
        &self.codec
    }

    #[must_use]
    pub const fn ranges(&self) -> &RangeFactory {
        &self.ranges
    }

    #[must_use]
    pub const fn iterators(&self) -> &IteratorStackFactory {
        &self.iterators
    }

    #[must_use]
    pub const fn functor(&self) -> &KeyFunctor {
        &self.functor
    }

    /// Table-creation settings for this layout against a given engine:
    /// bloom filters over the seed prefix, and version retention whenever
    /// the engine aggregates at scan time (the aggregation iterator needs
    /// to see every written entry).
    #[must_use]
    pub fn table_config(&self, capabilities: Capabilities) -> TableConfig {
        TableConfig {
            split_points: Vec::new(),
            bloom_prefix: true,
            keep_all_versions: capabilities.contains(Capability::Aggregation),
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{converter, knows, person, social_schema};

    #[test]
    fn registry_resolves_both_layouts() {
        for id in KeyPackage::known_ids() {
            let package = KeyPackage::for_id(id, social_schema()).unwrap();
            assert_eq!(package.layout().id(), id);
        }
    }

    #[test]
    fn unknown_ids_are_config_errors() {
        assert!(matches!(
            KeyPackage::for_id("reflective", social_schema()),
            Err(ConfigError::UnknownKeyPackage { .. })
        ));
    }

    #[test]
    fn functor_prefix_is_shared_by_every_key_of_a_vertex() {
        for layout in [RowLayout::ByteEntity, RowLayout::Classic] {
            let codec = converter(layout);
            let functor = KeyFunctor::new(layout);

            let (entity_key, _) = codec.to_keys(&person("alice", 1)).unwrap();
            let (edge_key, _) = codec.to_keys(&knows("alice", "bob", 1)).unwrap();

            let prefix = functor.seed_prefix(&entity_key.row);
            assert!(!prefix.is_empty());
            assert_eq!(prefix, functor.seed_prefix(&edge_key.row));
        }
    }

    #[test]
    fn aggregating_engines_keep_all_versions() {
        let package = KeyPackage::for_layout(RowLayout::ByteEntity, social_schema());
        assert!(package.table_config(Capabilities::ALL).keep_all_versions);
        assert!(!package.table_config(Capabilities::NONE).keep_all_versions);
    }
}

//! The schema: immutable, construction-time-validated description of every
//! group's layout. It is broadcast (serialised) into each server-side
//! iterator's configuration, so everything here derives Serialize.
//!
//! Byte-layout rules that hang off the schema:
//! - qualifier bytes carry the group-by properties in declared group-by order
//! - value bytes carry the remaining properties in declared property order,
//!   minus the visibility and timestamp properties, which ride in the key
//! - every group must share one vertex kind, because row bytes from
//!   different groups interleave in the same table

pub mod aggregate;

use crate::{
    filter::ValuePredicate,
    value::ValueKind,
};
use aggregate::Aggregator;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// SchemaError
/// Fatal at initialisation; a store never opens over an invalid schema.
///

#[derive(Debug, ThisError)]
pub enum SchemaError {
    #[error("schema declares no groups")]
    Empty,

    #[error("group declared as both entity and edge: {group}")]
    DuplicateGroup { group: GroupName },

    #[error("group {group} declares property {property} twice")]
    DuplicateProperty { group: GroupName, property: String },

    #[error("group {group} groups by unknown property {property}")]
    UnknownGroupByProperty { group: GroupName, property: String },

    #[error("group {group} vertex kind {found} differs from {expected}")]
    MixedVertexKinds {
        group: GroupName,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("group {group} property {property}: {aggregator} cannot aggregate {kind}")]
    InvalidAggregator {
        group: GroupName,
        property: String,
        aggregator: Aggregator,
        kind: ValueKind,
    },

    #[error("group {group} visibility property {property} must be text, not {kind}")]
    InvalidVisibilityKind {
        group: GroupName,
        property: String,
        kind: ValueKind,
    },

    #[error("group {group} timestamp property {property} must be uint, not {kind}")]
    InvalidTimestampKind {
        group: GroupName,
        property: String,
        kind: ValueKind,
    },

    #[error("group {group} puts key-plane property {property} in its group-by")]
    KeyPlanePropertyInGroupBy { group: GroupName, property: String },

    #[error("schema fingerprint failed: {0}")]
    Fingerprint(String),
}

///
/// GroupName
///

#[derive(
    Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupName(String);

impl GroupName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for GroupName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GroupName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

///
/// PropertyDef
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub kind: ValueKind,
    pub aggregator: Aggregator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<ValuePredicate>,
}

impl PropertyDef {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind, aggregator: Aggregator) -> Self {
        Self {
            name: name.into(),
            kind,
            aggregator,
            validator: None,
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: ValuePredicate) -> Self {
        self.validator = Some(validator);
        self
    }
}

///
/// ElementKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ElementKind {
    Entity,
    Edge,
}

///
/// ElementDef
/// One group's layout: vertex kind, ordered properties, group-by subset.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ElementDef {
    pub vertex: ValueKind,
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub group_by: Vec<String>,
}

impl ElementDef {
    #[must_use]
    pub const fn new(vertex: ValueKind) -> Self {
        Self {
            vertex,
            properties: Vec::new(),
            group_by: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    #[must_use]
    pub fn with_group_by<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }
}

///
/// Schema
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub entities: BTreeMap<GroupName, ElementDef>,
    pub edges: BTreeMap<GroupName, ElementDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_property: Option<String>,
}

impl Schema {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            edges: BTreeMap::new(),
            visibility_property: None,
            timestamp_property: None,
        }
    }

    #[must_use]
    pub fn with_entity(mut self, group: impl Into<GroupName>, def: ElementDef) -> Self {
        self.entities.insert(group.into(), def);
        self
    }

    #[must_use]
    pub fn with_edge(mut self, group: impl Into<GroupName>, def: ElementDef) -> Self {
        self.edges.insert(group.into(), def);
        self
    }

    #[must_use]
    pub fn with_visibility_property(mut self, name: impl Into<String>) -> Self {
        self.visibility_property = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_timestamp_property(mut self, name: impl Into<String>) -> Self {
        self.timestamp_property = Some(name.into());
        self
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    #[must_use]
    pub fn def(&self, group: &GroupName) -> Option<(ElementKind, &ElementDef)> {
        self.entities
            .get(group)
            .map(|def| (ElementKind::Entity, def))
            .or_else(|| self.edges.get(group).map(|def| (ElementKind::Edge, def)))
    }

    #[must_use]
    pub fn has_group(&self, group: &GroupName) -> bool {
        self.def(group).is_some()
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupName> {
        self.entities.keys().chain(self.edges.keys())
    }

    /// The single vertex kind every group shares. Meaningful only after
    /// `validate`; an empty schema never validates.
    #[must_use]
    pub fn vertex_kind(&self) -> ValueKind {
        self.entities
            .values()
            .chain(self.edges.values())
            .map(|def| def.vertex)
            .next()
            .unwrap_or(ValueKind::Text)
    }

    /// Is `property` carried in the key planes (visibility or timestamp)
    /// rather than in the value bytes?
    #[must_use]
    pub fn is_key_plane_property(&self, property: &str) -> bool {
        self.visibility_property.as_deref() == Some(property)
            || self.timestamp_property.as_deref() == Some(property)
    }

    /// Properties that land in the value bytes, in declared order, for the
    /// given effective group-by.
    #[must_use]
    pub fn value_properties<'a>(
        &self,
        def: &'a ElementDef,
        group_by: &[String],
    ) -> Vec<&'a PropertyDef> {
        def.properties
            .iter()
            .filter(|p| !group_by.contains(&p.name))
            .filter(|p| !self.is_key_plane_property(&p.name))
            .collect()
    }

    /// Properties that land in the qualifier bytes, in group-by order.
    #[must_use]
    pub fn qualifier_properties<'a>(
        &self,
        def: &'a ElementDef,
        group_by: &'a [String],
    ) -> Vec<&'a PropertyDef> {
        group_by.iter().filter_map(|name| def.property(name)).collect()
    }

    // ------------------------------------------------------------------
    // Validation & fingerprint
    // ------------------------------------------------------------------

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.entities.is_empty() && self.edges.is_empty() {
            return Err(SchemaError::Empty);
        }

        for group in self.entities.keys() {
            if self.edges.contains_key(group) {
                return Err(SchemaError::DuplicateGroup {
                    group: group.clone(),
                });
            }
        }

        let expected_vertex = self.vertex_kind();
        let all = self.entities.iter().chain(self.edges.iter());
        for (group, def) in all {
            if def.vertex != expected_vertex {
                return Err(SchemaError::MixedVertexKinds {
                    group: group.clone(),
                    expected: expected_vertex,
                    found: def.vertex,
                });
            }

            for (index, property) in def.properties.iter().enumerate() {
                if def.properties[..index].iter().any(|p| p.name == property.name) {
                    return Err(SchemaError::DuplicateProperty {
                        group: group.clone(),
                        property: property.name.clone(),
                    });
                }

                if !property.aggregator.supports(property.kind) {
                    return Err(SchemaError::InvalidAggregator {
                        group: group.clone(),
                        property: property.name.clone(),
                        aggregator: property.aggregator,
                        kind: property.kind,
                    });
                }

                if self.visibility_property.as_deref() == Some(property.name.as_str())
                    && property.kind != ValueKind::Text
                {
                    return Err(SchemaError::InvalidVisibilityKind {
                        group: group.clone(),
                        property: property.name.clone(),
                        kind: property.kind,
                    });
                }

                if self.timestamp_property.as_deref() == Some(property.name.as_str())
                    && property.kind != ValueKind::Uint
                {
                    return Err(SchemaError::InvalidTimestampKind {
                        group: group.clone(),
                        property: property.name.clone(),
                        kind: property.kind,
                    });
                }
            }

            for name in &def.group_by {
                if def.property(name).is_none() {
                    return Err(SchemaError::UnknownGroupByProperty {
                        group: group.clone(),
                        property: name.clone(),
                    });
                }
                if self.is_key_plane_property(name) {
                    return Err(SchemaError::KeyPlanePropertyInGroupBy {
                        group: group.clone(),
                        property: name.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Stable digest of the full layout, embedded in iterator configs to
    /// catch schema drift between client and servers.
    pub fn fingerprint(&self) -> Result<[u8; 32], SchemaError> {
        let bytes =
            serde_cbor::to_vec(self).map_err(|err| SchemaError::Fingerprint(err.to_string()))?;
        Ok(Sha256::digest(&bytes).into())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

///
/// TESTS
///

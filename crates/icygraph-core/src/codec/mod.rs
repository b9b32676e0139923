//! The element⇄key codec.
//!
//! `ElementConverter` is the bijection between graph elements and tablet
//! cells. An entity becomes one key; an edge becomes two (source-first and
//! destination-first), sharing value bytes, visibility, and timestamp, so
//! that a single range scan over either endpoint's row prefix finds it.
//!
//! Plane assignment:
//! - row: escaped endpoint bytes joined by the delimiter, plus a marker
//! - family: the group name
//! - qualifier: group-by property values, length-prefixed, group-by order
//! - visibility: the declared visibility property's text, when present
//! - timestamp: the declared timestamp property, else a coarsened clock
//! - value: the remaining properties, length-prefixed, declared order
//!
//! A converter built with view overrides swaps a group's group-by for the
//! narrowed list; the qualifier and value planes move in lockstep, which is
//! what lets query-time aggregation re-encode merged cells.

pub mod escape;
pub mod layout;

use crate::{
    element::{Edge, Element, Entity, MatchedEnd, Properties},
    schema::{ElementDef, ElementKind, GroupName, Schema},
    value::{
        Value, ValueKind,
        bytes::{ValueBytesError, from_ordered_bytes, to_ordered_bytes},
    },
    view::View,
};
use escape::EscapeError;
use icygraph_tablet::StoredKey;
use layout::{ParsedRow, RowDirection, RowLayout};
use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error as ThisError;

/// Clock coarsening bucket for elements without a timestamp property.
/// Writes of an identical element within one bucket collide on the
/// aggregation key deterministically.
pub const COARSE_BUCKET_MS: u64 = 3_600_000;

///
/// CodecError
/// Per-element; writers log and skip, they never abort a batch on these.
///

#[derive(Debug, ThisError)]
pub enum CodecError {
    #[error("unknown group {group}")]
    UnknownGroup { group: GroupName },

    #[error("group {group} is not an {expected} group")]
    WrongElementKind {
        group: GroupName,
        expected: &'static str,
    },

    #[error("group {group} element is missing property {property}")]
    MissingProperty { group: GroupName, property: String },

    #[error("group {group} element carries undeclared property {property}")]
    UndeclaredProperty { group: GroupName, property: String },

    #[error("group {group} property {property} is {found}, schema declares {expected}")]
    PropertyKind {
        group: GroupName,
        property: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("vertex is {found}, schema declares {expected}")]
    VertexKind { expected: ValueKind, found: ValueKind },

    #[error(transparent)]
    Value(#[from] ValueBytesError),

    #[error(transparent)]
    Escape(#[from] EscapeError),

    #[error("invalid row: {reason}")]
    InvalidRow { reason: &'static str },

    #[error("invalid direction marker {byte:#04x}")]
    InvalidMarker { byte: u8 },

    #[error("column family is not a valid group name")]
    InvalidFamily,

    #[error("truncated {plane} payload")]
    TruncatedPayload { plane: &'static str },

    #[error("trailing bytes after {plane} payload")]
    TrailingBytes { plane: &'static str },

    #[error("oversized chunk: {len} bytes")]
    OversizedChunk { len: usize },
}

///
/// ElementConverter
///

#[derive(Clone)]
pub struct ElementConverter {
    schema: Arc<Schema>,
    layout: RowLayout,
    group_by_overrides: BTreeMap<GroupName, Vec<String>>,
}

impl ElementConverter {
    #[must_use]
    pub const fn new(layout: RowLayout, schema: Arc<Schema>) -> Self {
        Self {
            schema,
            layout,
            group_by_overrides: BTreeMap::new(),
        }
    }

    /// Adopt the view's narrowed group-bys. The returned converter encodes
    /// and decodes the qualifier and value planes under the narrowed lists.
    #[must_use]
    pub fn with_view_group_by(mut self, view: &View) -> Self {
        let overridden = view.entities.iter().chain(view.edges.iter());
        for (group, view_group) in overridden {
            if let Some(narrowed) = &view_group.group_by {
                self.group_by_overrides
                    .insert(group.clone(), narrowed.clone());
            }
        }
        self
    }

    #[must_use]
    pub const fn layout(&self) -> RowLayout {
        self.layout
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    // ------------------------------------------------------------------
    // Element -> cell
    // ------------------------------------------------------------------

    /// Entity keys come back as `(key, None)`; edge keys as both row forms.
    pub fn to_keys(&self, element: &Element) -> Result<(StoredKey, Option<StoredKey>), CodecError> {
        match element {
            Element::Entity(entity) => {
                let def = self.def_of(&entity.group, ElementKind::Entity)?;
                let vertex = self.encode_vertex(&entity.vertex)?;
                let row = self.layout.entity_row(&vertex);
                let key = self.key_for(&entity.group, def, &entity.properties, row)?;
                Ok((key, None))
            }
            Element::Edge(edge) => {
                let def = self.def_of(&edge.group, ElementKind::Edge)?;
                let source = self.encode_vertex(&edge.source)?;
                let destination = self.encode_vertex(&edge.destination)?;

                let (first_direction, second_direction) = if edge.directed {
                    (RowDirection::SourceFirst, RowDirection::DestinationFirst)
                } else {
                    (RowDirection::Undirected, RowDirection::Undirected)
                };

                let first_row = self.layout.edge_row(&source, &destination, first_direction);
                let second_row = self
                    .layout
                    .edge_row(&destination, &source, second_direction);

                let first = self.key_for(&edge.group, def, &edge.properties, first_row)?;
                let mut second = first.clone();
                second.row = second_row;

                Ok((first, Some(second)))
            }
        }
    }

    pub fn to_value(&self, element: &Element) -> Result<Vec<u8>, CodecError> {
        let group = element.group();
        let (_, def) = self
            .schema
            .def(group)
            .ok_or_else(|| CodecError::UnknownGroup {
                group: group.clone(),
            })?;
        self.reject_undeclared(group, def, element.properties())?;
        self.value_bytes(group, def, element.properties())
    }

    // ------------------------------------------------------------------
    // Cell -> element
    // ------------------------------------------------------------------

    /// Decode one cell. With `include_matched`, decoded edges carry the
    /// hint saying which logical end the row-first endpoint was.
    pub fn from_key_value(
        &self,
        key: &StoredKey,
        value: &[u8],
        include_matched: bool,
    ) -> Result<Element, CodecError> {
        let group: GroupName = std::str::from_utf8(&key.family)
            .map_err(|_| CodecError::InvalidFamily)?
            .into();

        match self.layout.parse_row(&key.row)? {
            ParsedRow::Entity { vertex } => {
                let def = self.def_of(&group, ElementKind::Entity)?;
                let vertex = self.decode_vertex(vertex)?;
                let properties = self.decode_properties(&group, def, key, value)?;
                let mut entity = Entity::new(group, vertex);
                entity.properties = properties;
                Ok(Element::Entity(entity))
            }
            ParsedRow::Edge {
                first,
                second,
                direction,
            } => {
                let def = self.def_of(&group, ElementKind::Edge)?;
                let first = self.decode_vertex(first)?;
                let second = self.decode_vertex(second)?;

                let (source, destination, matched) = match direction {
                    RowDirection::SourceFirst => (first, second, MatchedEnd::Source),
                    RowDirection::DestinationFirst => (second, first, MatchedEnd::Destination),
                    RowDirection::Undirected => {
                        let row_first = first.clone();
                        let edge = Edge::new(group.clone(), first, second, false);
                        let matched = if edge.source == row_first {
                            MatchedEnd::Source
                        } else {
                            MatchedEnd::Destination
                        };
                        (edge.source, edge.destination, matched)
                    }
                };

                let mut edge = Edge::new(group.clone(), source, destination, direction.directed());
                edge.properties = self.decode_properties(&group, def, key, value)?;
                if include_matched {
                    edge.matched = Some(matched);
                }
                Ok(Element::Edge(edge))
            }
        }
    }

    /// The other row form of an edge row; `None` for entity rows.
    pub fn partner_row(&self, row: &[u8]) -> Result<Option<Vec<u8>>, CodecError> {
        self.layout.partner_row(row)
    }

    /// Recompute the qualifier and value planes for an element whose
    /// properties changed server-side (aggregation merge, transform). The
    /// row and visibility planes are never re-derived there.
    pub(crate) fn encode_planes(&self, element: &Element) -> Result<(Vec<u8>, Vec<u8>), CodecError> {
        let group = element.group();
        let (_, def) = self
            .schema
            .def(group)
            .ok_or_else(|| CodecError::UnknownGroup {
                group: group.clone(),
            })?;
        Ok((
            self.qualifier_bytes(group, def, element.properties())?,
            self.value_bytes(group, def, element.properties())?,
        ))
    }

    // ------------------------------------------------------------------
    // Column planes
    // ------------------------------------------------------------------

    pub(crate) fn encode_vertex(&self, vertex: &Value) -> Result<Vec<u8>, CodecError> {
        let expected = self.schema.vertex_kind();
        if !vertex.matches_kind(expected) {
            return Err(CodecError::VertexKind {
                expected,
                found: vertex.kind(),
            });
        }
        Ok(escape::escape(&to_ordered_bytes(vertex)))
    }

    pub(crate) fn decode_vertex(&self, field: &[u8]) -> Result<Value, CodecError> {
        let raw = escape::unescape(field)?;
        Ok(from_ordered_bytes(self.schema.vertex_kind(), &raw)?)
    }

    pub(crate) fn effective_group_by<'a>(
        &'a self,
        group: &GroupName,
        def: &'a ElementDef,
    ) -> &'a [String] {
        self.group_by_overrides
            .get(group)
            .map_or(&def.group_by, Vec::as_slice)
    }

    fn def_of(&self, group: &GroupName, expected: ElementKind) -> Result<&ElementDef, CodecError> {
        let (kind, def) = self
            .schema
            .def(group)
            .ok_or_else(|| CodecError::UnknownGroup {
                group: group.clone(),
            })?;
        if kind != expected {
            return Err(CodecError::WrongElementKind {
                group: group.clone(),
                expected: match expected {
                    ElementKind::Entity => "entity",
                    ElementKind::Edge => "edge",
                },
            });
        }
        Ok(def)
    }

    fn key_for(
        &self,
        group: &GroupName,
        def: &ElementDef,
        properties: &Properties,
        row: Vec<u8>,
    ) -> Result<StoredKey, CodecError> {
        self.reject_undeclared(group, def, properties)?;
        Ok(StoredKey::new(
            row,
            group.as_bytes().to_vec(),
            self.qualifier_bytes(group, def, properties)?,
            self.visibility_bytes(def, properties),
            self.timestamp_for(def, properties),
        ))
    }

    fn qualifier_bytes(
        &self,
        group: &GroupName,
        def: &ElementDef,
        properties: &Properties,
    ) -> Result<Vec<u8>, CodecError> {
        let group_by = self.effective_group_by(group, def);
        let mut out = Vec::new();
        for property in self.schema.qualifier_properties(def, group_by) {
            let value = self.require(group, property.name.as_str(), property.kind, properties)?;
            put_chunk(&mut out, &to_ordered_bytes(value))?;
        }
        Ok(out)
    }

    fn value_bytes(
        &self,
        group: &GroupName,
        def: &ElementDef,
        properties: &Properties,
    ) -> Result<Vec<u8>, CodecError> {
        let group_by = self.effective_group_by(group, def);
        let mut out = Vec::new();
        for property in self.schema.value_properties(def, group_by) {
            let value = self.require(group, property.name.as_str(), property.kind, properties)?;
            put_chunk(&mut out, &to_ordered_bytes(value))?;
        }
        Ok(out)
    }

    fn visibility_bytes(&self, def: &ElementDef, properties: &Properties) -> Vec<u8> {
        let Some(name) = self.schema.visibility_property.as_deref() else {
            return Vec::new();
        };
        if def.property(name).is_none() {
            return Vec::new();
        }
        match properties.get(name) {
            Some(Value::Text(label)) => label.as_bytes().to_vec(),
            _ => Vec::new(),
        }
    }

    fn timestamp_for(&self, def: &ElementDef, properties: &Properties) -> u64 {
        self.schema
            .timestamp_property
            .as_deref()
            .filter(|name| def.property(name).is_some())
            .and_then(|name| match properties.get(name) {
                Some(Value::Uint(ts)) => Some(*ts),
                _ => None,
            })
            .unwrap_or_else(coarse_timestamp_now)
    }

    fn decode_properties(
        &self,
        group: &GroupName,
        def: &ElementDef,
        key: &StoredKey,
        value: &[u8],
    ) -> Result<Properties, CodecError> {
        let group_by = self.effective_group_by(group, def);
        let mut properties = Properties::new();

        let mut qualifier = key.qualifier.as_slice();
        for property in self.schema.qualifier_properties(def, group_by) {
            let chunk = read_chunk(&mut qualifier, "qualifier")?;
            properties.insert(property.name.clone(), from_ordered_bytes(property.kind, chunk)?);
        }
        if !qualifier.is_empty() {
            return Err(CodecError::TrailingBytes { plane: "qualifier" });
        }

        let mut payload = value;
        for property in self.schema.value_properties(def, group_by) {
            let chunk = read_chunk(&mut payload, "value")?;
            properties.insert(property.name.clone(), from_ordered_bytes(property.kind, chunk)?);
        }
        if !payload.is_empty() {
            return Err(CodecError::TrailingBytes { plane: "value" });
        }

        if let Some(name) = self.schema.visibility_property.as_deref()
            && def.property(name).is_some()
            && !key.visibility.is_empty()
        {
            let label = std::str::from_utf8(&key.visibility)
                .map_err(|_| ValueBytesError::InvalidUtf8)?;
            properties.insert(name.to_string(), Value::Text(label.to_string()));
        }

        if let Some(name) = self.schema.timestamp_property.as_deref()
            && def.property(name).is_some()
        {
            properties.insert(name.to_string(), Value::Uint(key.timestamp));
        }

        Ok(properties)
    }

    fn require<'a>(
        &self,
        group: &GroupName,
        name: &str,
        expected: ValueKind,
        properties: &'a Properties,
    ) -> Result<&'a Value, CodecError> {
        let value = properties
            .get(name)
            .ok_or_else(|| CodecError::MissingProperty {
                group: group.clone(),
                property: name.to_string(),
            })?;
        if !value.matches_kind(expected) {
            return Err(CodecError::PropertyKind {
                group: group.clone(),
                property: name.to_string(),
                expected,
                found: value.kind(),
            });
        }
        Ok(value)
    }

    fn reject_undeclared(
        &self,
        group: &GroupName,
        def: &ElementDef,
        properties: &Properties,
    ) -> Result<(), CodecError> {
        for (name, _) in properties.iter() {
            if def.property(name).is_none() {
                return Err(CodecError::UndeclaredProperty {
                    group: group.clone(),
                    property: name.clone(),
                });
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Length-prefixed chunks
// ----------------------------------------------------------------------

fn put_chunk(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<(), CodecError> {
    let len =
        u32::try_from(bytes.len()).map_err(|_| CodecError::OversizedChunk { len: bytes.len() })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn read_chunk<'a>(bytes: &mut &'a [u8], plane: &'static str) -> Result<&'a [u8], CodecError> {
    let Some((len_bytes, rest)) = bytes.split_first_chunk::<4>() else {
        return Err(CodecError::TruncatedPayload { plane });
    };
    let len = u32::from_be_bytes(*len_bytes) as usize;
    if rest.len() < len {
        return Err(CodecError::TruncatedPayload { plane });
    }
    let (chunk, rest) = rest.split_at(len);
    *bytes = rest;
    Ok(chunk)
}

fn coarse_timestamp_now() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default();
    millis - millis % COARSE_BUCKET_MS
}

///
/// TESTS
///

#[cfg(test)]
mod tests;

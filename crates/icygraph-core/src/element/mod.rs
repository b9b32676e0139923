//! Graph elements: entities, edges, and the seeds that query them.
//!
//! Undirected edges are canonicalized at construction (endpoints in
//! canonical value order) so that the two stored row forms and the logical
//! element agree on which endpoint is the source. Equality on edges ignores
//! the matched-end hint, which is scan provenance rather than data.

use crate::{
    schema::GroupName,
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

///
/// Properties
/// Name-to-value map. Byte layouts are governed by the schema's declared
/// order, never by this map's own ordering.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, Value>);

impl Properties {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Properties {
    fn from_iter<T: IntoIterator<Item = (S, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

///
/// MatchedEnd
/// Which logical endpoint of a decoded edge the scan's seed row matched.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MatchedEnd {
    Source,
    Destination,
}

impl MatchedEnd {
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::Source => Self::Destination,
            Self::Destination => Self::Source,
        }
    }
}

///
/// Entity
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub group: GroupName,
    pub vertex: Value,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

impl Entity {
    #[must_use]
    pub fn new(group: impl Into<GroupName>, vertex: Value) -> Self {
        Self {
            group: group.into(),
            vertex,
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name, value);
        self
    }
}

///
/// Edge
///

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Edge {
    pub group: GroupName,
    pub source: Value,
    pub destination: Value,
    pub directed: bool,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    /// Scan provenance; set by retrievers, never stored, ignored by Eq.
    #[serde(default, skip_serializing)]
    pub matched: Option<MatchedEnd>,
}

impl Edge {
    /// Undirected endpoints are stored and reported in canonical order, so
    /// construction normalizes them; directed endpoints are meaningful as
    /// given.
    #[must_use]
    pub fn new(group: impl Into<GroupName>, source: Value, destination: Value, directed: bool) -> Self {
        let (source, destination) = if !directed
            && source.canonical_cmp(&destination) == Some(Ordering::Greater)
        {
            (destination, source)
        } else {
            (source, destination)
        };

        Self {
            group: group.into(),
            source,
            destination,
            directed,
            properties: Properties::new(),
            matched: None,
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name, value);
        self
    }

    /// The endpoint opposite to the matched end; source when no hint is set.
    #[must_use]
    pub const fn far_end(&self) -> &Value {
        match self.matched {
            Some(MatchedEnd::Destination) => &self.source,
            _ => &self.destination,
        }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.group == other.group
            && self.source == other.source
            && self.destination == other.destination
            && self.directed == other.directed
            && self.properties == other.properties
    }
}

impl Eq for Edge {}

///
/// Element
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Entity(Entity),
    Edge(Edge),
}

impl Element {
    #[must_use]
    pub const fn group(&self) -> &GroupName {
        match self {
            Self::Entity(e) => &e.group,
            Self::Edge(e) => &e.group,
        }
    }

    #[must_use]
    pub const fn properties(&self) -> &Properties {
        match self {
            Self::Entity(e) => &e.properties,
            Self::Edge(e) => &e.properties,
        }
    }

    pub const fn properties_mut(&mut self) -> &mut Properties {
        match self {
            Self::Entity(e) => &mut e.properties,
            Self::Edge(e) => &mut e.properties,
        }
    }

    #[must_use]
    pub const fn is_edge(&self) -> bool {
        matches!(self, Self::Edge(_))
    }
}

impl From<Entity> for Element {
    fn from(e: Entity) -> Self {
        Self::Entity(e)
    }
}

impl From<Edge> for Element {
    fn from(e: Edge) -> Self {
        Self::Edge(e)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(e) => write!(f, "entity {}({})", e.group, e.vertex),
            Self::Edge(e) => {
                let arrow = if e.directed { "->" } else { "--" };
                write!(f, "edge {}({} {} {})", e.group, e.source, arrow, e.destination)
            }
        }
    }
}

///
/// Seed
/// A query starting point. The JSON surface is `{"entity": v}` or
/// `{"edge": [source, destination, directed]}`.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seed {
    Entity { entity: Value },
    Edge { edge: (Value, Value, bool) },
}

impl Seed {
    #[must_use]
    pub const fn entity(vertex: Value) -> Self {
        Self::Entity { entity: vertex }
    }

    #[must_use]
    pub const fn edge(source: Value, destination: Value, directed: bool) -> Self {
        Self::Edge {
            edge: (source, destination, directed),
        }
    }

    /// The vertex for entity seeds; `None` for edge seeds.
    #[must_use]
    pub const fn vertex(&self) -> Option<&Value> {
        match self {
            Self::Entity { entity } => Some(entity),
            Self::Edge { .. } => None,
        }
    }
}

///
/// TESTS
///

//! Inclusion flags shared by operations and the direction iterator.

use crate::ranges::SeedScope;
use serde::{Deserialize, Serialize};

///
/// InOutType
/// Which directed edges a seed scan keeps, relative to the seed endpoint.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InOutType {
    #[default]
    Either,
    Incoming,
    Outgoing,
}

///
/// EdgeInclude
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeInclude {
    #[default]
    All,
    Directed,
    Undirected,
    None,
}

///
/// Inclusion
/// The three flags together. Undirected edges match a seed from either
/// end, so they pass every `InOutType`; the in/out split constrains
/// directed edges only.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Inclusion {
    pub include_entities: bool,
    pub include_edges: EdgeInclude,
    #[serde(rename = "includeIncomingOutgoingType")]
    pub include_incoming_outgoing: InOutType,
}

impl Default for Inclusion {
    fn default() -> Self {
        Self {
            include_entities: true,
            include_edges: EdgeInclude::All,
            include_incoming_outgoing: InOutType::Either,
        }
    }
}

impl Inclusion {
    #[must_use]
    pub const fn entities_only() -> Self {
        Self {
            include_entities: true,
            include_edges: EdgeInclude::None,
            include_incoming_outgoing: InOutType::Either,
        }
    }

    #[must_use]
    pub const fn edges_only() -> Self {
        Self {
            include_entities: false,
            include_edges: EdgeInclude::All,
            include_incoming_outgoing: InOutType::Either,
        }
    }

    #[must_use]
    pub const fn wants_edges(self) -> bool {
        !matches!(self.include_edges, EdgeInclude::None)
    }

    /// Nothing can match under these flags.
    #[must_use]
    pub const fn is_vacuous(self) -> bool {
        !self.include_entities && !self.wants_edges()
    }

    /// The narrowest range scope that still covers everything included.
    #[must_use]
    pub const fn seed_scope(self) -> SeedScope {
        match (self.include_entities, self.wants_edges()) {
            (true, false) => SeedScope::EntitiesOnly,
            (false, _) => SeedScope::EdgesOnly,
            (true, true) => SeedScope::EntitiesAndEdges,
        }
    }
}

///
/// TESTS
///

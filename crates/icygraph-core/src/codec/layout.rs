//! Row layouts: how escaped endpoint bytes and marker bytes assemble into
//! a row, and how a row parses back.
//!
//! Two interchangeable on-disk layouts exist. `ByteEntity` suffixes entity
//! rows with an explicit marker so entities and edges share one row space;
//! `Classic` leaves entity rows bare. Their edge marker values differ, so a
//! table written with one layout must always be read with the same one.

use crate::codec::{
    CodecError,
    escape::{DELIMITER, split_fields},
};
use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// RowLayout
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowLayout {
    #[display("byte-entity")]
    ByteEntity,
    #[display("classic")]
    Classic,
}

/// Which logical end of an edge comes first in this row, and whether the
/// edge is directed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RowDirection {
    SourceFirst,
    DestinationFirst,
    Undirected,
}

impl RowDirection {
    #[must_use]
    pub const fn directed(self) -> bool {
        !matches!(self, Self::Undirected)
    }
}

///
/// ParsedRow
///

#[derive(Debug, Eq, PartialEq)]
pub enum ParsedRow<'a> {
    Entity {
        vertex: &'a [u8],
    },
    Edge {
        first: &'a [u8],
        second: &'a [u8],
        direction: RowDirection,
    },
}

struct Markers {
    undirected: u8,
    source_first: u8,
    destination_first: u8,
}

impl RowLayout {
    pub const BYTE_ENTITY_ID: &'static str = "byte-entity";
    pub const CLASSIC_ID: &'static str = "classic";

    // byte-entity entity rows carry this marker as their second field
    const ENTITY_MARKER: u8 = 0x01;

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::ByteEntity => Self::BYTE_ENTITY_ID,
            Self::Classic => Self::CLASSIC_ID,
        }
    }

    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            Self::BYTE_ENTITY_ID => Some(Self::ByteEntity),
            Self::CLASSIC_ID => Some(Self::Classic),
            _ => None,
        }
    }

    const fn markers(self) -> Markers {
        match self {
            Self::ByteEntity => Markers {
                source_first: 0x02,
                destination_first: 0x03,
                undirected: 0x04,
            },
            Self::Classic => Markers {
                undirected: 0x01,
                source_first: 0x02,
                destination_first: 0x03,
            },
        }
    }

    const fn marker_for(self, direction: RowDirection) -> u8 {
        let markers = self.markers();
        match direction {
            RowDirection::SourceFirst => markers.source_first,
            RowDirection::DestinationFirst => markers.destination_first,
            RowDirection::Undirected => markers.undirected,
        }
    }

    fn direction_for(self, marker: u8) -> Result<RowDirection, CodecError> {
        let markers = self.markers();
        if marker == markers.source_first {
            Ok(RowDirection::SourceFirst)
        } else if marker == markers.destination_first {
            Ok(RowDirection::DestinationFirst)
        } else if marker == markers.undirected {
            Ok(RowDirection::Undirected)
        } else {
            Err(CodecError::InvalidMarker { byte: marker })
        }
    }

    // ------------------------------------------------------------------
    // Row assembly
    // ------------------------------------------------------------------

    #[must_use]
    pub fn entity_row(self, vertex: &[u8]) -> Vec<u8> {
        match self {
            Self::ByteEntity => {
                let mut row = Vec::with_capacity(vertex.len() + 2);
                row.extend_from_slice(vertex);
                row.push(DELIMITER);
                row.push(Self::ENTITY_MARKER);
                row
            }
            Self::Classic => vertex.to_vec(),
        }
    }

    #[must_use]
    pub fn edge_row(self, first: &[u8], second: &[u8], direction: RowDirection) -> Vec<u8> {
        let mut row = Vec::with_capacity(first.len() + second.len() + 3);
        row.extend_from_slice(first);
        row.push(DELIMITER);
        row.extend_from_slice(second);
        row.push(DELIMITER);
        row.push(self.marker_for(direction));
        row
    }

    // ------------------------------------------------------------------
    // Row parsing
    // ------------------------------------------------------------------

    pub fn parse_row(self, row: &[u8]) -> Result<ParsedRow<'_>, CodecError> {
        let fields = split_fields(row);
        match (self, fields.as_slice()) {
            (Self::ByteEntity, [vertex, marker]) if **marker == [Self::ENTITY_MARKER] => {
                Ok(ParsedRow::Entity { vertex })
            }
            (Self::Classic, [vertex]) => Ok(ParsedRow::Entity { vertex }),
            (_, [first, second, marker]) => {
                let &[marker] = *marker else {
                    return Err(CodecError::InvalidRow {
                        reason: "edge marker field is not one byte",
                    });
                };
                Ok(ParsedRow::Edge {
                    first,
                    second,
                    direction: self.direction_for(marker)?,
                })
            }
            _ => Err(CodecError::InvalidRow {
                reason: "unexpected field count",
            }),
        }
    }

    /// Build the other row form of an edge row; `None` for entity rows.
    pub fn partner_row(self, row: &[u8]) -> Result<Option<Vec<u8>>, CodecError> {
        match self.parse_row(row)? {
            ParsedRow::Entity { .. } => Ok(None),
            ParsedRow::Edge {
                first,
                second,
                direction,
            } => {
                let flipped = match direction {
                    RowDirection::SourceFirst => RowDirection::DestinationFirst,
                    RowDirection::DestinationFirst => RowDirection::SourceFirst,
                    RowDirection::Undirected => RowDirection::Undirected,
                };
                Ok(Some(self.edge_row(second, first, flipped)))
            }
        }
    }
}

///
/// TESTS
///

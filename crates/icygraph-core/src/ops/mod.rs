//! Declarative operations and their JSON surface.
//!
//! The wire form is a `class`-tagged object; dispatch is an exhaustive
//! match over the enum, so an unsupported kind cannot slip past the
//! compiler, and an unknown `class` string fails at parse time as an
//! `OperationError`. Handlers live in [`handler`]; the typed chain
//! combinators in [`chain`].

pub mod chain;
pub mod handler;
pub mod options;

use crate::{
    element::{Element, Seed},
    error::Error,
    retrieve::ElementStream,
    view::{View, ViewError},
    write::WriteSummary,
};
use options::{InOutType, Inclusion};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Lazy seed sequence produced by adjacency queries.
pub type SeedStream = Box<dyn Iterator<Item = Result<Seed, Error>>>;

///
/// OperationError
/// Surfaced synchronously, before any scan begins.
///

#[derive(Debug, ThisError)]
pub enum OperationError {
    #[error(transparent)]
    View(#[from] ViewError),

    #[error("operation requires entity seeds")]
    EntitySeedsRequired,

    #[error("malformed operation: {message}")]
    Malformed { message: String },

    #[error("operation produced {found}, caller expected {expected}")]
    WrongOutput {
        expected: &'static str,
        found: &'static str,
    },
}

///
/// Operation kinds
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GetElements {
    #[serde(default)]
    pub seeds: Vec<Seed>,
    #[serde(default)]
    pub view: View,
    #[serde(flatten)]
    pub inclusion: Inclusion,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GetAllElements {
    #[serde(default)]
    pub view: View,
    #[serde(flatten)]
    pub inclusion: Inclusion,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAdjacentEntitySeeds {
    #[serde(default)]
    pub seeds: Vec<Seed>,
    #[serde(default)]
    pub view: View,
    #[serde(default, rename = "includeIncomingOutgoingType")]
    pub include_incoming_outgoing: InOutType,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetElementsWithinSet {
    #[serde(default)]
    pub seeds: Vec<Seed>,
    #[serde(default)]
    pub view: View,
    #[serde(default = "default_true")]
    pub include_entities: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetElementsBetweenSets {
    #[serde(default)]
    pub seeds: Vec<Seed>,
    #[serde(default)]
    pub seeds_b: Vec<Seed>,
    #[serde(default)]
    pub view: View,
    #[serde(default = "default_true")]
    pub include_entities: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GetElementsInRanges {
    #[serde(default)]
    pub ranges: Vec<(Seed, Seed)>,
    #[serde(default)]
    pub view: View,
    #[serde(flatten)]
    pub inclusion: Inclusion,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SummariseGroupOverRanges {
    #[serde(default)]
    pub ranges: Vec<(Seed, Seed)>,
    #[serde(default)]
    pub view: View,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AddElements {
    #[serde(default)]
    pub elements: Vec<Element>,
}

const fn default_true() -> bool {
    true
}

///
/// Operation
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum Operation {
    GetElements(GetElements),
    GetAllElements(GetAllElements),
    GetAdjacentEntitySeeds(GetAdjacentEntitySeeds),
    GetElementsWithinSet(GetElementsWithinSet),
    GetElementsBetweenSets(GetElementsBetweenSets),
    GetElementsInRanges(GetElementsInRanges),
    SummariseGroupOverRanges(SummariseGroupOverRanges),
    AddElements(AddElements),
}

impl Operation {
    /// Parse the JSON surface. An unknown `class` is an operation error,
    /// not a panic or a silent skip.
    pub fn from_json(json: &str) -> Result<Self, OperationError> {
        serde_json::from_str(json).map_err(|err| OperationError::Malformed {
            message: err.to_string(),
        })
    }
}

///
/// OperationOutput
///

pub enum OperationOutput {
    Elements(ElementStream),
    Seeds(SeedStream),
    Write(WriteSummary),
}

impl OperationOutput {
    const fn label(&self) -> &'static str {
        match self {
            Self::Elements(_) => "elements",
            Self::Seeds(_) => "seeds",
            Self::Write(_) => "write summary",
        }
    }

    pub fn into_elements(self) -> Result<ElementStream, Error> {
        match self {
            Self::Elements(stream) => Ok(stream),
            other => Err(wrong_output("elements", &other)),
        }
    }

    pub fn into_seeds(self) -> Result<SeedStream, Error> {
        match self {
            Self::Seeds(stream) => Ok(stream),
            other => Err(wrong_output("seeds", &other)),
        }
    }

    pub fn into_write_summary(self) -> Result<WriteSummary, Error> {
        match self {
            Self::Write(summary) => Ok(summary),
            other => Err(wrong_output("write summary", &other)),
        }
    }
}

fn wrong_output(expected: &'static str, found: &OperationOutput) -> Error {
    OperationError::WrongOutput {
        expected,
        found: found.label(),
    }
    .into()
}

///
/// TESTS
///

//! Direction filter: trims cells by entity/edge inclusion and the in/out
//! flags, reading only the row's marker byte. Installed by edge-oriented
//! operations as the topmost stage.

use crate::{
    codec::layout::{ParsedRow, RowDirection},
    iterator::{DIRECTION_NAME, build_error, config::IteratorConfig},
    ops::options::{EdgeInclude, InOutType, Inclusion},
};
use icygraph_tablet::{CellStream, ServerIteratorBuilder, TabletError, iterator::IteratorOptions};
use tracing::warn;

pub struct DirectionIterator;

impl ServerIteratorBuilder for DirectionIterator {
    fn name(&self) -> &'static str {
        DIRECTION_NAME
    }

    fn build<'a>(
        &self,
        options: &IteratorOptions,
        input: CellStream<'a>,
    ) -> Result<CellStream<'a>, TabletError> {
        let config =
            IteratorConfig::from_options(options).map_err(|e| build_error(DIRECTION_NAME, &e))?;
        let layout = config.layout;
        let inclusion = config.inclusion.unwrap_or_default();

        Ok(Box::new(input.filter(move |(key, _)| {
            match layout.parse_row(&key.row) {
                Ok(ParsedRow::Entity { .. }) => inclusion.include_entities,
                Ok(ParsedRow::Edge { direction, .. }) => edge_passes(inclusion, direction),
                Err(err) => {
                    warn!(key = %key, error = %err, "dropping unparsable row");
                    false
                }
            }
        })))
    }
}

/// Undirected edges match a seed from either end, so they pass every
/// `InOutType`; the in/out split constrains directed edges by which
/// logical end sits row-first.
const fn edge_passes(inclusion: Inclusion, direction: RowDirection) -> bool {
    let kind_ok = match inclusion.include_edges {
        EdgeInclude::All => true,
        EdgeInclude::Directed => direction.directed(),
        EdgeInclude::Undirected => !direction.directed(),
        EdgeInclude::None => false,
    };
    if !kind_ok {
        return false;
    }

    match (inclusion.include_incoming_outgoing, direction) {
        (InOutType::Either, _)
        | (_, RowDirection::Undirected)
        | (InOutType::Outgoing, RowDirection::SourceFirst)
        | (InOutType::Incoming, RowDirection::DestinationFirst) => true,
        _ => false,
    }
}

///
/// TESTS
///

//! One handler per operation kind. Each validates the view against the
//! schema, lowers seeds to ranges, builds the iterator stack, and hands a
//! retriever's lazy stream back; nothing is materialised here except seed
//! sets.

use crate::{
    element::{Element, Seed},
    error::Error,
    obs::metrics,
    ops::{
        GetAdjacentEntitySeeds, GetAllElements, GetElements, GetElementsBetweenSets,
        GetElementsInRanges, GetElementsWithinSet, Operation, OperationError, OperationOutput,
        SeedStream, SummariseGroupOverRanges,
        options::{EdgeInclude, InOutType, Inclusion},
    },
    ranges::SeedScope,
    retrieve::{ElementRetriever, ElementStream, ElementVerifier, RowFilter},
    store::Store,
    value::{Value, bytes::to_ordered_bytes},
    view::View,
    write,
};
use icygraph_tablet::ScanRange;
use std::collections::HashSet;
use tracing::debug;

/// Exhaustive dispatch. A new operation kind fails compilation here until
/// it gets a handler.
pub fn execute(store: &Store, operation: Operation) -> Result<OperationOutput, Error> {
    metrics::record_operation();
    match operation {
        Operation::GetElements(op) => {
            get_elements(store, op, Vec::new()).map(OperationOutput::Elements)
        }
        Operation::GetAllElements(op) => get_all_elements(store, op).map(OperationOutput::Elements),
        Operation::GetAdjacentEntitySeeds(op) => {
            get_adjacent_entity_seeds(store, op, Vec::new()).map(OperationOutput::Seeds)
        }
        Operation::GetElementsWithinSet(op) => {
            get_elements_within_set(store, op).map(OperationOutput::Elements)
        }
        Operation::GetElementsBetweenSets(op) => {
            get_elements_between_sets(store, op).map(OperationOutput::Elements)
        }
        Operation::GetElementsInRanges(op) => {
            get_elements_in_ranges(store, op).map(OperationOutput::Elements)
        }
        Operation::SummariseGroupOverRanges(op) => {
            summarise_group_over_ranges(store, op).map(OperationOutput::Elements)
        }
        Operation::AddElements(op) => {
            let elements: ElementStream = Box::new(op.elements.into_iter().map(Ok));
            write::add_elements(store, elements).map(OperationOutput::Write)
        }
    }
}

// ----------------------------------------------------------------------
// Handlers
// ----------------------------------------------------------------------

pub(crate) fn get_elements(
    store: &Store,
    op: GetElements,
    extra_seeds: Vec<Seed>,
) -> Result<ElementStream, Error> {
    validate_view(store, &op.view)?;
    if op.inclusion.is_vacuous() {
        return Ok(empty_elements());
    }

    let mut seeds = op.seeds;
    seeds.extend(extra_seeds);
    if seeds.is_empty() {
        return Ok(empty_elements());
    }

    let ranges = store
        .package()
        .ranges()
        .seed_ranges(&seeds, op.inclusion.seed_scope())?;

    // edge seeds hit a shared row; the decoded element must be re-checked
    let verifier = seeds
        .iter()
        .any(|seed| matches!(seed, Seed::Edge { .. }))
        .then(|| seed_verifier(&seeds));

    open_stream(store, &op.view, op.inclusion, ranges, false, None, verifier)
}

pub(crate) fn get_all_elements(store: &Store, op: GetAllElements) -> Result<ElementStream, Error> {
    validate_view(store, &op.view)?;
    if op.inclusion.is_vacuous() {
        return Ok(empty_elements());
    }

    let ranges = vec![store.package().ranges().full_range()];
    open_stream(store, &op.view, op.inclusion, ranges, false, None, None)
}

pub(crate) fn get_adjacent_entity_seeds(
    store: &Store,
    op: GetAdjacentEntitySeeds,
    extra_seeds: Vec<Seed>,
) -> Result<SeedStream, Error> {
    validate_view(store, &op.view)?;

    let mut seeds = op.seeds;
    seeds.extend(extra_seeds);
    if seeds.is_empty() {
        return Ok(Box::new(std::iter::empty()));
    }
    require_entity_seeds(&seeds)?;

    let inclusion = Inclusion {
        include_entities: false,
        include_edges: EdgeInclude::All,
        include_incoming_outgoing: op.include_incoming_outgoing,
    };
    let ranges = store
        .package()
        .ranges()
        .seed_ranges(&seeds, SeedScope::EdgesOnly)?;

    let stream = open_stream(store, &op.view, inclusion, ranges, true, None, None)?;

    // project each edge to its far endpoint, once
    let mut seen: HashSet<Vec<u8>> = HashSet::new();
    Ok(Box::new(stream.filter_map(move |result| match result {
        Err(err) => Some(Err(err)),
        Ok(Element::Edge(edge)) => {
            let far = edge.far_end().clone();
            seen.insert(to_ordered_bytes(&far))
                .then(|| Ok(Seed::entity(far)))
        }
        Ok(Element::Entity(_)) => None,
    })))
}

pub(crate) fn get_elements_within_set(
    store: &Store,
    op: GetElementsWithinSet,
) -> Result<ElementStream, Error> {
    validate_view(store, &op.view)?;
    require_entity_seeds(&op.seeds)?;
    if op.seeds.is_empty() {
        return Ok(empty_elements());
    }

    let inclusion = Inclusion {
        include_entities: op.include_entities,
        include_edges: EdgeInclude::All,
        include_incoming_outgoing: InOutType::Either,
    };
    let ranges = store
        .package()
        .ranges()
        .seed_ranges(&op.seeds, inclusion.seed_scope())?;

    let set = vertex_byte_set(&op.seeds);
    let verifier: ElementVerifier = Box::new(move |element| match element {
        Element::Entity(_) => true,
        Element::Edge(edge) => {
            set.contains(&to_ordered_bytes(&edge.source))
                && set.contains(&to_ordered_bytes(&edge.destination))
        }
    });

    let row_filter = seed_prefix_filter(store, &op.seeds)?;
    open_stream(
        store,
        &op.view,
        inclusion,
        ranges,
        false,
        Some(row_filter),
        Some(verifier),
    )
}

pub(crate) fn get_elements_between_sets(
    store: &Store,
    op: GetElementsBetweenSets,
) -> Result<ElementStream, Error> {
    validate_view(store, &op.view)?;
    require_entity_seeds(&op.seeds)?;
    require_entity_seeds(&op.seeds_b)?;
    if op.seeds.is_empty() {
        return Ok(empty_elements());
    }

    let inclusion = Inclusion {
        include_entities: op.include_entities,
        include_edges: EdgeInclude::All,
        include_incoming_outgoing: InOutType::Either,
    };
    let ranges = store
        .package()
        .ranges()
        .seed_ranges(&op.seeds, inclusion.seed_scope())?;

    let set_a = vertex_byte_set(&op.seeds);
    let set_b = vertex_byte_set(&op.seeds_b);
    let verifier: ElementVerifier = Box::new(move |element| match element {
        Element::Entity(_) => true,
        Element::Edge(edge) => {
            let source = to_ordered_bytes(&edge.source);
            let destination = to_ordered_bytes(&edge.destination);
            (set_a.contains(&source) && set_b.contains(&destination))
                || (set_a.contains(&destination) && set_b.contains(&source))
        }
    });

    let row_filter = seed_prefix_filter(store, &op.seeds)?;
    open_stream(
        store,
        &op.view,
        inclusion,
        ranges,
        false,
        Some(row_filter),
        Some(verifier),
    )
}

pub(crate) fn get_elements_in_ranges(
    store: &Store,
    op: GetElementsInRanges,
) -> Result<ElementStream, Error> {
    validate_view(store, &op.view)?;
    if op.inclusion.is_vacuous() || op.ranges.is_empty() {
        return Ok(empty_elements());
    }

    let ranges = lower_vertex_ranges(store, &op.ranges)?;
    open_stream(store, &op.view, op.inclusion, ranges, false, None, None)
}

pub(crate) fn summarise_group_over_ranges(
    store: &Store,
    op: SummariseGroupOverRanges,
) -> Result<ElementStream, Error> {
    validate_view(store, &op.view)?;
    if op.ranges.is_empty() {
        return Ok(empty_elements());
    }

    // aggregation-only view: every group's group-by collapses to nothing,
    // so the whole group merges per endpoint pair
    let view = op.view.with_collapsed_group_by(store.schema());
    let ranges = lower_vertex_ranges(store, &op.ranges)?;
    open_stream(
        store,
        &view,
        Inclusion::default(),
        ranges,
        false,
        None,
        None,
    )
}

// ----------------------------------------------------------------------
// Shared pieces
// ----------------------------------------------------------------------

fn validate_view(store: &Store, view: &View) -> Result<(), Error> {
    view.validate(store.schema())
        .map_err(|err| OperationError::from(err).into())
}

fn require_entity_seeds(seeds: &[Seed]) -> Result<(), Error> {
    if seeds.iter().all(|seed| seed.vertex().is_some()) {
        Ok(())
    } else {
        Err(OperationError::EntitySeedsRequired.into())
    }
}

fn vertex_byte_set(seeds: &[Seed]) -> HashSet<Vec<u8>> {
    seeds
        .iter()
        .filter_map(Seed::vertex)
        .map(to_ordered_bytes)
        .collect()
}

/// Bloom-role prefilter: the row's seed prefix must belong to the seed
/// set. Exactness is the verifier's job; this only skips decodes.
fn seed_prefix_filter(store: &Store, seeds: &[Seed]) -> Result<RowFilter, Error> {
    let functor = *store.package().functor();
    let mut prefixes: HashSet<Vec<u8>> = HashSet::with_capacity(seeds.len());
    for vertex in seeds.iter().filter_map(Seed::vertex) {
        prefixes.insert(store.package().codec().encode_vertex(vertex)?);
    }
    Ok(Box::new(move |key| {
        prefixes.contains(functor.seed_prefix(&key.row))
    }))
}

fn lower_vertex_ranges(
    store: &Store,
    pairs: &[(Seed, Seed)],
) -> Result<Vec<ScanRange>, Error> {
    let mut ranges = Vec::with_capacity(pairs.len());
    for (low, high) in pairs {
        let (Some(low), Some(high)) = (low.vertex(), high.vertex()) else {
            return Err(OperationError::EntitySeedsRequired.into());
        };
        ranges.push(store.package().ranges().vertex_range(low, high)?);
    }
    ranges.sort();
    Ok(ranges)
}

/// Re-verification for edge-seeded queries: a decoded element survives if
/// it matches an edge seed exactly or touches an entity-seed vertex.
fn seed_verifier(seeds: &[Seed]) -> ElementVerifier {
    let vertices = vertex_byte_set(seeds);
    let edges: HashSet<(Vec<u8>, Vec<u8>, bool)> = seeds
        .iter()
        .filter_map(|seed| match seed {
            Seed::Edge {
                edge: (source, destination, directed),
            } => Some(canonical_edge_identity(source, destination, *directed)),
            Seed::Entity { .. } => None,
        })
        .collect();

    Box::new(move |element| match element {
        Element::Entity(entity) => vertices.contains(&to_ordered_bytes(&entity.vertex)),
        Element::Edge(edge) => {
            let source = to_ordered_bytes(&edge.source);
            let destination = to_ordered_bytes(&edge.destination);
            vertices.contains(&source)
                || vertices.contains(&destination)
                || edges.contains(&(source, destination, edge.directed))
        }
    })
}

fn canonical_edge_identity(
    source: &Value,
    destination: &Value,
    directed: bool,
) -> (Vec<u8>, Vec<u8>, bool) {
    let (mut a, mut b) = (to_ordered_bytes(source), to_ordered_bytes(destination));
    if !directed && b < a {
        std::mem::swap(&mut a, &mut b);
    }
    (a, b, directed)
}

fn empty_elements() -> ElementStream {
    Box::new(std::iter::empty())
}

fn open_stream(
    store: &Store,
    view: &View,
    inclusion: Inclusion,
    ranges: Vec<ScanRange>,
    matched_hint: bool,
    row_filter: Option<RowFilter>,
    verifier: Option<ElementVerifier>,
) -> Result<ElementStream, Error> {
    let ranges = ScanRange::coalesce(ranges);
    debug!(ranges = ranges.len(), "opening element scan");

    let stack = store
        .package()
        .iterators()
        .stack(view, Some(inclusion), store.capabilities())?;
    let scanner = store.scan(&ranges, &stack)?;

    let mut retriever = ElementRetriever::new(scanner, store.retrieval_codec(view));
    if matched_hint {
        retriever = retriever.with_matched_hint();
    }
    if let Some(filter) = row_filter {
        retriever = retriever.with_row_filter(filter);
    }
    if let Some(verifier) = verifier {
        retriever = retriever.with_verifier(verifier);
    }

    Ok(Box::new(retriever))
}

//! Aggregation stage: collapses cells sharing an aggregation key by
//! applying each property's declared aggregator.
//!
//! Cells arrive full-encoded and sorted, so one (row, family) run holds
//! every contribution to a logical element. Within a run, cells are merged
//! per (narrowed group-by tuple, visibility); a narrowed group-by is an
//! arbitrary subset of the declared one, so equal narrowed tuples need not
//! be byte-adjacent and the run is buffered. Runs are bounded by a row's
//! cell count. Merged cells are re-encoded under the narrowed layout with
//! the newest contributing timestamp.

use crate::{
    codec::ElementConverter,
    element::Element,
    iterator::{AGGREGATION_NAME, build_error, config::IteratorConfig},
    schema::Schema,
    value::Value,
};
use icygraph_tablet::{
    CellStream, ServerIteratorBuilder, StoredKey, TabletError, iterator::IteratorOptions,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::warn;

pub struct AggregationIterator;

impl ServerIteratorBuilder for AggregationIterator {
    fn name(&self) -> &'static str {
        AGGREGATION_NAME
    }

    fn build<'a>(
        &self,
        options: &IteratorOptions,
        input: CellStream<'a>,
    ) -> Result<CellStream<'a>, TabletError> {
        let config =
            IteratorConfig::from_options(options).map_err(|e| build_error(AGGREGATION_NAME, &e))?;

        let schema = Arc::new(config.schema.clone());
        let base = ElementConverter::new(config.layout, schema.clone());
        let narrowed = match &config.view {
            Some(view) => base.clone().with_view_group_by(view),
            None => base.clone(),
        };

        Ok(Box::new(AggregatedStream {
            input: input.peekable(),
            base,
            narrowed,
            schema,
            pending: VecDeque::new(),
        }))
    }
}

struct AggregatedStream<'a> {
    input: std::iter::Peekable<CellStream<'a>>,
    base: ElementConverter,
    narrowed: ElementConverter,
    schema: Arc<Schema>,
    pending: VecDeque<(StoredKey, Vec<u8>)>,
}

struct Merged {
    element: Element,
    timestamp: u64,
}

impl Iterator for AggregatedStream<'_> {
    type Item = (StoredKey, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(cell) = self.pending.pop_front() {
                return Some(cell);
            }

            let (row, family) = {
                let (key, _) = self.input.peek()?;
                (key.row.clone(), key.family.clone())
            };

            let mut run = Vec::new();
            while let Some((key, _)) = self.input.peek() {
                if key.row != row || key.family != family {
                    break;
                }
                if let Some(cell) = self.input.next() {
                    run.push(cell);
                }
            }

            self.aggregate_run(&row, &family, run);
        }
    }
}

impl AggregatedStream<'_> {
    fn aggregate_run(&mut self, row: &[u8], family: &[u8], run: Vec<(StoredKey, Vec<u8>)>) {
        // merge key: (narrowed qualifier bytes, visibility)
        let mut groups: BTreeMap<(Vec<u8>, Vec<u8>), Merged> = BTreeMap::new();

        for (key, value) in run {
            let element = match self.base.from_key_value(&key, &value, false) {
                Ok(element) => element,
                Err(err) => {
                    warn!(key = %key, error = %err, "dropping unmergeable cell");
                    continue;
                }
            };

            let qualifier = match self.narrowed.encode_planes(&element) {
                Ok((qualifier, _)) => qualifier,
                Err(err) => {
                    warn!(key = %key, error = %err, "dropping unmergeable cell");
                    continue;
                }
            };

            groups
                .entry((qualifier, key.visibility.clone()))
                .and_modify(|merged| {
                    self.merge_into(merged, &element);
                    merged.timestamp = merged.timestamp.max(key.timestamp);
                })
                .or_insert(Merged {
                    element,
                    timestamp: key.timestamp,
                });
        }

        for ((qualifier, visibility), mut merged) in groups {
            self.stamp_timestamp_property(&mut merged);
            match self.narrowed.encode_planes(&merged.element) {
                Ok((_, value)) => self.pending.push_back((
                    StoredKey::new(
                        row.to_vec(),
                        family.to_vec(),
                        qualifier,
                        visibility,
                        merged.timestamp,
                    ),
                    value,
                )),
                Err(err) => {
                    warn!(error = %err, "dropping merged cell that failed to re-encode");
                }
            }
        }
    }

    /// Fold `incoming` into the merged element, aggregating every property
    /// outside the effective group-by.
    fn merge_into(&self, merged: &mut Merged, incoming: &Element) {
        let group = incoming.group().clone();
        let Some((_, def)) = self.schema.def(&group) else {
            return;
        };
        let group_by = self.narrowed.effective_group_by(&group, def).to_vec();

        for property in &def.properties {
            if group_by.contains(&property.name) {
                continue;
            }
            let existing = merged.element.properties().get(&property.name).cloned();
            let arriving = incoming.properties().get(&property.name).cloned();
            match (existing, arriving) {
                (Some(left), Some(right)) => {
                    match property.aggregator.apply(left, right) {
                        Ok(folded) => merged.element.properties_mut().insert(property.name.clone(), folded),
                        Err(err) => {
                            warn!(property = %property.name, error = %err, "aggregator failed, keeping existing value");
                        }
                    }
                }
                (None, Some(right)) => {
                    merged.element.properties_mut().insert(property.name.clone(), right);
                }
                _ => {}
            }
        }
    }

    /// A declared timestamp property must agree with the merged cell's
    /// timestamp plane.
    fn stamp_timestamp_property(&self, merged: &mut Merged) {
        let group = merged.element.group().clone();
        if let Some(name) = self.schema.timestamp_property.clone()
            && self
                .schema
                .def(&group)
                .is_some_and(|(_, def)| def.property(&name).is_some())
        {
            merged
                .element
                .properties_mut()
                .insert(name, Value::Uint(merged.timestamp));
        }
    }
}

///
/// TESTS
///

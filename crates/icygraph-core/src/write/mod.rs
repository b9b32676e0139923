//! The writer: elements in, batched mutations out.
//!
//! Per-element codec failures and per-mutation rejections are logged,
//! counted, and skipped; one malformed element never poisons a bulk load.
//! Anything else (connectivity, missing table) aborts the batch. Close
//! failures are logged as warnings; durability past submit-and-close is
//! the engine's concern. The caller gets a summary instead of silence.

use crate::{
    codec::{CodecError, ElementConverter},
    element::Element,
    error::Error,
    obs::metrics,
    store::{Store, StoreError},
};
use icygraph_tablet::{BatchWriter, Mutation, StoredKey, TabletError};
use serde::{Deserialize, Serialize};
use tracing::warn;

///
/// WriteSummary
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct WriteSummary {
    pub written: u64,
    pub skipped: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}

impl WriteSummary {
    fn record_skip(&mut self, error: &dyn std::fmt::Display) {
        self.skipped += 1;
        if self.first_error.is_none() {
            self.first_error = Some(error.to_string());
        }
        metrics::record_element_skipped();
    }
}

/// Convert and submit a stream of elements. Upstream stream errors abort
/// (an operation chain fails at its first error); element-local failures
/// skip.
pub fn add_elements(
    store: &Store,
    elements: impl Iterator<Item = Result<Element, Error>>,
) -> Result<WriteSummary, Error> {
    let codec = store.package().codec();
    let mut writer = store.open_writer()?;
    let mut summary = WriteSummary::default();

    for element in elements {
        let element = match element {
            Ok(element) => element,
            Err(err) => {
                close_quietly(&mut writer);
                return Err(err);
            }
        };

        let mutations = match to_mutations(codec, &element) {
            Ok(mutations) => mutations,
            Err(err) => {
                warn!(element = %element, error = %err, "skipping element that failed to encode");
                metrics::record_codec_failure();
                summary.record_skip(&err);
                continue;
            }
        };

        match submit_all(&mut writer, mutations) {
            Ok(()) => {
                summary.written += 1;
                metrics::record_elements_written(1);
            }
            Err(SubmitOutcome::Rejected(reason)) => {
                warn!(element = %element, reason = %reason, "mutation rejected, skipping element");
                summary.record_skip(&reason);
            }
            Err(SubmitOutcome::Fatal(err)) => {
                close_quietly(&mut writer);
                return Err(StoreError::from(err).into());
            }
        }
    }

    if let Err(err) = writer.close() {
        warn!(error = %err, "batch writer close failed");
    }

    Ok(summary)
}

enum SubmitOutcome {
    Rejected(String),
    Fatal(TabletError),
}

fn submit_all(
    writer: &mut Box<dyn BatchWriter>,
    mutations: Vec<Mutation>,
) -> Result<(), SubmitOutcome> {
    for mutation in mutations {
        match writer.submit(mutation) {
            Ok(()) => {}
            Err(TabletError::MutationRejected { reason }) => {
                return Err(SubmitOutcome::Rejected(reason));
            }
            Err(err) => return Err(SubmitOutcome::Fatal(err)),
        }
    }
    Ok(())
}

/// One mutation per key form: a single put at the row, carrying every
/// other plane.
fn to_mutations(codec: &ElementConverter, element: &Element) -> Result<Vec<Mutation>, CodecError> {
    let (first, second) = codec.to_keys(element)?;
    let value = codec.to_value(element)?;

    let mut mutations = Vec::with_capacity(2);
    mutations.push(mutation_for(&first, value.clone()));
    if let Some(second) = second {
        mutations.push(mutation_for(&second, value));
    }
    Ok(mutations)
}

fn mutation_for(key: &StoredKey, value: Vec<u8>) -> Mutation {
    let mut mutation = Mutation::new(key.row.clone());
    mutation.put(
        key.family.clone(),
        key.qualifier.clone(),
        key.visibility.clone(),
        key.timestamp,
        value,
    );
    mutation
}

fn close_quietly(writer: &mut Box<dyn BatchWriter>) {
    if let Err(err) = writer.close() {
        warn!(error = %err, "batch writer close failed");
    }
}

//! Transform stage: applies each group's declared transformer and
//! re-encodes the qualifier and value planes in place. The row, visibility,
//! and timestamp planes never change here; visibility in particular is
//! evaluated by the engine before any iterator runs, so a transform must
//! not be able to move a cell between labels.

use crate::{
    iterator::{TRANSFORM_NAME, build_error, config::IteratorConfig, stage_codec},
    view::View,
};
use icygraph_tablet::{CellStream, ServerIteratorBuilder, TabletError, iterator::IteratorOptions};
use tracing::warn;

pub struct TransformIterator;

impl ServerIteratorBuilder for TransformIterator {
    fn name(&self) -> &'static str {
        TRANSFORM_NAME
    }

    fn build<'a>(
        &self,
        options: &IteratorOptions,
        input: CellStream<'a>,
    ) -> Result<CellStream<'a>, TabletError> {
        let config =
            IteratorConfig::from_options(options).map_err(|e| build_error(TRANSFORM_NAME, &e))?;
        let codec = stage_codec(&config);
        let view = config.view.clone().unwrap_or_else(View::new);

        Ok(Box::new(input.filter_map(move |(mut key, value)| {
            let Some(transformer) = view
                .group(&group_of(&key))
                .and_then(|vg| vg.transformer.as_ref())
            else {
                return Some((key, value));
            };

            let mut element = match codec.from_key_value(&key, &value, false) {
                Ok(element) => element,
                Err(err) => {
                    warn!(key = %key, error = %err, "dropping undecodable cell");
                    return None;
                }
            };

            transformer.apply(element.properties_mut());

            match codec.encode_planes(&element) {
                Ok((qualifier, value)) => {
                    key.qualifier = qualifier;
                    Some((key, value))
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "dropping cell that failed to re-encode after transform");
                    None
                }
            }
        })))
    }
}

fn group_of(key: &icygraph_tablet::StoredKey) -> crate::schema::GroupName {
    String::from_utf8_lossy(&key.family).into_owned().into()
}

///
/// TESTS
///

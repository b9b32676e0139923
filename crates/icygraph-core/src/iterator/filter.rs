//! The three filter planes, one builder each, sharing an evaluator.
//!
//! Every plane also enforces group selection: under a restricted view,
//! cells from unnamed groups are dropped. The pre plane evaluates only the
//! group-by-safe part of each group's pre-aggregation filter; the post
//! plane picks up the deferred remainder together with the declared
//! post-aggregation filter; the final plane runs against transformed
//! values.

use crate::{
    iterator::{
        FINAL_FILTER_NAME, FilterPhase, POST_FILTER_NAME, PRE_FILTER_NAME, build_error,
        config::IteratorConfig, phase_filter, stage_codec,
    },
    view::View,
};
use icygraph_tablet::{CellStream, ServerIteratorBuilder, TabletError, iterator::IteratorOptions};
use tracing::warn;

pub struct FilterIterator {
    phase: FilterPhase,
    name: &'static str,
}

impl FilterIterator {
    #[must_use]
    pub const fn pre() -> Self {
        Self {
            phase: FilterPhase::Pre,
            name: PRE_FILTER_NAME,
        }
    }

    #[must_use]
    pub const fn post() -> Self {
        Self {
            phase: FilterPhase::Post,
            name: POST_FILTER_NAME,
        }
    }

    #[must_use]
    pub const fn post_transform() -> Self {
        Self {
            phase: FilterPhase::Final,
            name: FINAL_FILTER_NAME,
        }
    }
}

impl ServerIteratorBuilder for FilterIterator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn build<'a>(
        &self,
        options: &IteratorOptions,
        input: CellStream<'a>,
    ) -> Result<CellStream<'a>, TabletError> {
        let name = self.name;
        let config = IteratorConfig::from_options(options).map_err(|e| build_error(name, &e))?;
        let codec = stage_codec(&config);
        let schema = codec.schema().clone();
        let view = config.view.clone().unwrap_or_else(View::new);
        let phase = self.phase;

        Ok(Box::new(input.filter(move |(key, value)| {
            let element = match codec.from_key_value(key, value, false) {
                Ok(element) => element,
                Err(err) => {
                    warn!(key = %key, error = %err, "dropping undecodable cell");
                    return false;
                }
            };
            let group = element.group();

            if !view.includes_group(group) {
                return false;
            }
            let Some(view_group) = view.group(group) else {
                // unrestricted view: nothing to evaluate
                return true;
            };
            let Some((_, def)) = schema.def(group) else {
                return false;
            };

            let group_by = view.effective_group_by(group, def);
            phase_filter(phase, group_by, view_group).eval(element.properties())
        })))
    }
}

///
/// TESTS
///

//! The server-side iterator stack.
//!
//! Stages in apply order (lowest priority sits closest to the data):
//!
//! 1. validation: drops cells whose decoded element fails a declared
//!    property validator (installed when the store advertises validation)
//! 2. aggregation: collapses cells sharing an aggregation key, honouring
//!    the view's narrowed group-by (installed when the store advertises
//!    aggregation)
//! 3. pre-aggregation filter: group selection plus the group-by-safe part
//!    of each group's pre-aggregation filter; predicates over non-group-by
//!    properties must wait for the post-aggregation plane
//! 4. post-aggregation filter: deferred predicates plus the declared
//!    post-aggregation filters
//! 5. transform: per-group property transforms, re-encoded in place
//! 6. post-transformation filter: evaluated against transformed values
//! 7. direction filter: row-marker-based entity/edge and in/out trimming,
//!    installed by edge-oriented operations
//!
//! The order is contract: a filter's meaning depends on whether it sees
//! pre- or post-aggregation property values.

pub mod aggregation;
pub mod config;
pub mod direction;
pub mod filter;
pub mod transform;
pub mod validation;

use crate::{
    codec::{ElementConverter, layout::RowLayout},
    filter::FilterExpr,
    ops::options::Inclusion,
    schema::Schema,
    view::View,
};
use config::{IteratorConfig, IteratorConfigError};
use icygraph_tablet::{
    Capabilities, Capability, IteratorRegistry, IteratorSpec, TabletError,
};
use std::sync::Arc;

pub const VALIDATION_NAME: &str = "icygraph.validate";
pub const AGGREGATION_NAME: &str = "icygraph.aggregate";
pub const PRE_FILTER_NAME: &str = "icygraph.filter.pre";
pub const POST_FILTER_NAME: &str = "icygraph.filter.post";
pub const TRANSFORM_NAME: &str = "icygraph.transform";
pub const FINAL_FILTER_NAME: &str = "icygraph.filter.final";
pub const DIRECTION_NAME: &str = "icygraph.direction";

pub const VALIDATION_PRIORITY: u8 = 20;
pub const AGGREGATION_PRIORITY: u8 = 30;
pub const PRE_FILTER_PRIORITY: u8 = 40;
pub const POST_FILTER_PRIORITY: u8 = 50;
pub const TRANSFORM_PRIORITY: u8 = 60;
pub const FINAL_FILTER_PRIORITY: u8 = 70;
pub const DIRECTION_PRIORITY: u8 = 80;

/// Every iterator this engine can be asked to run, for wiring into an
/// engine's registry.
#[must_use]
pub fn server_iterator_registry() -> IteratorRegistry {
    IteratorRegistry::new()
        .with(Arc::new(validation::ValidationIterator))
        .with(Arc::new(aggregation::AggregationIterator))
        .with(Arc::new(filter::FilterIterator::pre()))
        .with(Arc::new(filter::FilterIterator::post()))
        .with(Arc::new(filter::FilterIterator::post_transform()))
        .with(Arc::new(transform::TransformIterator))
        .with(Arc::new(direction::DirectionIterator))
}

/// The codec a stage decodes cells with: narrowed when an aggregation
/// stage below it re-encoded them under the view's group-by.
pub(crate) fn stage_codec(config: &IteratorConfig) -> ElementConverter {
    let base = ElementConverter::new(config.layout, Arc::new(config.schema.clone()));
    match (&config.view, config.narrowed) {
        (Some(view), true) => base.with_view_group_by(view),
        _ => base,
    }
}

pub(crate) fn build_error(name: &'static str, err: &IteratorConfigError) -> TabletError {
    TabletError::IteratorBuild {
        name: name.to_string(),
        reason: err.to_string(),
    }
}

///
/// IteratorStackFactory
///

#[derive(Clone)]
pub struct IteratorStackFactory {
    layout: RowLayout,
    schema: Arc<Schema>,
}

impl IteratorStackFactory {
    #[must_use]
    pub const fn new(layout: RowLayout, schema: Arc<Schema>) -> Self {
        Self { layout, schema }
    }

    /// Build the configured stack for one query. `inclusion` is passed by
    /// edge-oriented operations and installs the direction filter.
    pub fn stack(
        &self,
        view: &View,
        inclusion: Option<Inclusion>,
        capabilities: Capabilities,
    ) -> Result<Vec<IteratorSpec>, IteratorConfigError> {
        let aggregating = capabilities.contains(Capability::Aggregation);
        let needs = StackNeeds::analyse(&self.schema, view);
        let mut specs = Vec::new();

        if capabilities.contains(Capability::StoreValidation) {
            specs.push(self.config()?.into_spec(VALIDATION_PRIORITY, VALIDATION_NAME)?);
        }

        if aggregating {
            specs.push(
                self.config()?
                    .with_view(view.clone())
                    .into_spec(AGGREGATION_PRIORITY, AGGREGATION_NAME)?,
            );
        }

        let filter_config = || -> Result<IteratorConfig, IteratorConfigError> {
            Ok(self
                .config()?
                .with_view(view.clone())
                .with_narrowed(aggregating))
        };

        if needs.pre_filter {
            specs.push(filter_config()?.into_spec(PRE_FILTER_PRIORITY, PRE_FILTER_NAME)?);
        }
        if needs.post_filter {
            specs.push(filter_config()?.into_spec(POST_FILTER_PRIORITY, POST_FILTER_NAME)?);
        }
        if needs.transform {
            specs.push(filter_config()?.into_spec(TRANSFORM_PRIORITY, TRANSFORM_NAME)?);
        }
        if needs.final_filter {
            specs.push(filter_config()?.into_spec(FINAL_FILTER_PRIORITY, FINAL_FILTER_NAME)?);
        }

        if let Some(inclusion) = inclusion {
            specs.push(
                self.config()?
                    .with_inclusion(inclusion)
                    .into_spec(DIRECTION_PRIORITY, DIRECTION_NAME)?,
            );
        }

        Ok(specs)
    }

    fn config(&self) -> Result<IteratorConfig, IteratorConfigError> {
        IteratorConfig::new(self.layout, &self.schema)
    }
}

///
/// StackNeeds
/// Which optional stages this view actually requires.
///

#[derive(Debug, Default)]
struct StackNeeds {
    pre_filter: bool,
    post_filter: bool,
    transform: bool,
    final_filter: bool,
}

impl StackNeeds {
    fn analyse(schema: &Schema, view: &View) -> Self {
        let mut needs = Self {
            // a restricted view needs the pre plane for group selection
            pre_filter: !view.is_unrestricted(),
            ..Self::default()
        };

        for (group, view_group) in view.entities.iter().chain(view.edges.iter()) {
            let Some((_, def)) = schema.def(group) else {
                continue;
            };
            let group_by = view.effective_group_by(group, def);

            if let Some(filter) = &view_group.pre_aggregation_filter {
                let (safe, deferred) = filter.split_group_by_safe(group_by);
                if !safe.is_empty() {
                    needs.pre_filter = true;
                }
                if !deferred.is_empty() {
                    needs.post_filter = true;
                }
            }
            if view_group
                .post_aggregation_filter
                .as_ref()
                .is_some_and(|f| !f.is_empty())
            {
                needs.post_filter = true;
            }
            if view_group.transformer.as_ref().is_some_and(|t| !t.is_empty()) {
                needs.transform = true;
            }
            if view_group
                .post_transformation_filter
                .as_ref()
                .is_some_and(|f| !f.is_empty())
            {
                needs.final_filter = true;
            }
        }

        needs
    }
}

/// The filter expression one phase evaluates for one group.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FilterPhase {
    Pre,
    Post,
    Final,
}

pub(crate) fn phase_filter(
    phase: FilterPhase,
    group_by: &[String],
    view_group: &crate::view::ViewGroup,
) -> FilterExpr {
    match phase {
        FilterPhase::Pre => view_group
            .pre_aggregation_filter
            .as_ref()
            .map(|f| f.split_group_by_safe(group_by).0)
            .unwrap_or_default(),
        FilterPhase::Post => {
            let deferred = view_group
                .pre_aggregation_filter
                .as_ref()
                .map(|f| f.split_group_by_safe(group_by).1)
                .unwrap_or_default();
            deferred.and(view_group.post_aggregation_filter.clone().unwrap_or_default())
        }
        FilterPhase::Final => view_group
            .post_transformation_filter
            .clone()
            .unwrap_or_default(),
    }
}

///
/// TESTS
///

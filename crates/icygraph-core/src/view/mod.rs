//! Views: the per-query overlay on the schema.
//!
//! A view that names no groups selects every group unchanged. A view that
//! names any group excludes the rest. Per group it may narrow the group-by
//! (coarsening query-time aggregation) and attach filters to three planes:
//! pre-aggregation, post-aggregation, and post-transformation. Views are
//! immutable once built and are broadcast into iterator configurations.

pub mod transform;

use crate::{
    filter::FilterExpr,
    schema::{ElementDef, ElementKind, GroupName, Schema},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;
use transform::Transform;

///
/// ViewError
/// Surfaced before any scan begins.
///

#[derive(Debug, ThisError)]
pub enum ViewError {
    #[error("view references unknown group {group}")]
    UnknownGroup { group: GroupName },

    #[error("view declares {group} as {declared}, schema says otherwise")]
    WrongElementKind { group: GroupName, declared: &'static str },

    #[error("view filter on {group} selects unknown property {property}")]
    UnknownFilterProperty { group: GroupName, property: String },

    #[error("view transform on {group} references unknown property {property}")]
    UnknownTransformProperty { group: GroupName, property: String },

    #[error("view group-by on {group} names {property}, which is not in the schema group-by")]
    GroupByNotNarrowing { group: GroupName, property: String },
}

///
/// ViewGroup
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_aggregation_filter: Option<FilterExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_aggregation_filter: Option<FilterExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_transformation_filter: Option<FilterExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<String>>,
}

impl ViewGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pre_aggregation_filter(mut self, filter: FilterExpr) -> Self {
        self.pre_aggregation_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_post_aggregation_filter(mut self, filter: FilterExpr) -> Self {
        self.post_aggregation_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_transformer(mut self, transformer: Transform) -> Self {
        self.transformer = Some(transformer);
        self
    }

    #[must_use]
    pub fn with_post_transformation_filter(mut self, filter: FilterExpr) -> Self {
        self.post_transformation_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_group_by<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = Some(names.into_iter().map(Into::into).collect());
        self
    }

    fn filters(&self) -> impl Iterator<Item = &FilterExpr> {
        self.pre_aggregation_filter
            .iter()
            .chain(self.post_aggregation_filter.iter())
            .chain(self.post_transformation_filter.iter())
    }
}

///
/// View
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct View {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<GroupName, ViewGroup>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub edges: BTreeMap<GroupName, ViewGroup>,
}

impl View {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_entity(mut self, group: impl Into<GroupName>, view: ViewGroup) -> Self {
        self.entities.insert(group.into(), view);
        self
    }

    #[must_use]
    pub fn with_edge(mut self, group: impl Into<GroupName>, view: ViewGroup) -> Self {
        self.edges.insert(group.into(), view);
        self
    }

    /// A view naming no groups is the identity overlay.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.entities.is_empty() && self.edges.is_empty()
    }

    #[must_use]
    pub fn group(&self, group: &GroupName) -> Option<&ViewGroup> {
        self.entities.get(group).or_else(|| self.edges.get(group))
    }

    #[must_use]
    pub fn includes_group(&self, group: &GroupName) -> bool {
        self.is_unrestricted() || self.group(group).is_some()
    }

    /// The group-by in force for a group under this view.
    #[must_use]
    pub fn effective_group_by<'a>(&'a self, group: &GroupName, def: &'a ElementDef) -> &'a [String] {
        self.group(group)
            .and_then(|vg| vg.group_by.as_deref())
            .unwrap_or(&def.group_by)
    }

    /// Replace every group's group-by override with the empty list, so the
    /// whole group aggregates per row. Groups absent from a restricted view
    /// stay absent.
    #[must_use]
    pub fn with_collapsed_group_by(&self, schema: &Schema) -> Self {
        let collapse = |groups: &BTreeMap<GroupName, ViewGroup>| {
            groups
                .iter()
                .map(|(g, vg)| {
                    let mut vg = vg.clone();
                    vg.group_by = Some(Vec::new());
                    (g.clone(), vg)
                })
                .collect()
        };

        if self.is_unrestricted() {
            // materialise every schema group with an empty group-by
            let collapse_all = |defs: &BTreeMap<GroupName, ElementDef>| {
                defs.keys()
                    .map(|g| (g.clone(), ViewGroup::new().with_group_by(Vec::<String>::new())))
                    .collect()
            };
            return Self {
                entities: collapse_all(&schema.entities),
                edges: collapse_all(&schema.edges),
            };
        }

        Self {
            entities: collapse(&self.entities),
            edges: collapse(&self.edges),
        }
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    pub fn validate(&self, schema: &Schema) -> Result<(), ViewError> {
        for (group, view_group) in &self.entities {
            let def = expect_kind(schema, group, ElementKind::Entity, "entity")?;
            validate_group(schema, group, def, view_group)?;
        }
        for (group, view_group) in &self.edges {
            let def = expect_kind(schema, group, ElementKind::Edge, "edge")?;
            validate_group(schema, group, def, view_group)?;
        }
        Ok(())
    }
}

fn expect_kind<'a>(
    schema: &'a Schema,
    group: &GroupName,
    expected: ElementKind,
    declared: &'static str,
) -> Result<&'a ElementDef, ViewError> {
    let (kind, def) = schema.def(group).ok_or_else(|| ViewError::UnknownGroup {
        group: group.clone(),
    })?;
    if kind != expected {
        return Err(ViewError::WrongElementKind {
            group: group.clone(),
            declared,
        });
    }
    Ok(def)
}

fn validate_group(
    schema: &Schema,
    group: &GroupName,
    def: &ElementDef,
    view_group: &ViewGroup,
) -> Result<(), ViewError> {
    for filter in view_group.filters() {
        for property in filter.selected() {
            if def.property(property).is_none() && !schema.is_key_plane_property(property) {
                return Err(ViewError::UnknownFilterProperty {
                    group: group.clone(),
                    property: property.to_string(),
                });
            }
        }
    }

    if let Some(transformer) = &view_group.transformer {
        for property in transformer.referenced() {
            if def.property(property).is_none() {
                return Err(ViewError::UnknownTransformProperty {
                    group: group.clone(),
                    property: property.to_string(),
                });
            }
        }
    }

    if let Some(narrowed) = &view_group.group_by {
        for property in narrowed {
            if !def.group_by.contains(property) {
                return Err(ViewError::GroupByNotNarrowing {
                    group: group.clone(),
                    property: property.clone(),
                });
            }
        }
    }

    Ok(())
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        filter::{CompareOp, ComparePredicate, FilterExpr},
        schema::{aggregate::Aggregator, PropertyDef},
        value::{Value, ValueKind},
    };

    fn schema() -> Schema {
        Schema::new().with_edge(
            "e",
            ElementDef::new(ValueKind::Text)
                .with_property(PropertyDef::new("bucket", ValueKind::Int, Aggregator::Max))
                .with_property(PropertyDef::new("count", ValueKind::Int, Aggregator::Sum))
                .with_group_by(["bucket"]),
        )
    }

    fn count_filter() -> FilterExpr {
        FilterExpr::new().with(ComparePredicate::new(
            "count",
            CompareOp::Gt,
            Some(Value::Int(5)),
        ))
    }

    #[test]
    fn unrestricted_view_includes_everything() {
        let view = View::new();
        assert!(view.includes_group(&"e".into()));
    }

    #[test]
    fn restricted_view_excludes_unnamed_groups() {
        let view = View::new().with_edge("e", ViewGroup::new());
        assert!(view.includes_group(&"e".into()));
        assert!(!view.includes_group(&"other".into()));
    }

    #[test]
    fn unknown_group_fails_validation() {
        let view = View::new().with_edge("missing", ViewGroup::new());
        assert!(matches!(
            view.validate(&schema()),
            Err(ViewError::UnknownGroup { .. })
        ));
    }

    #[test]
    fn entity_edge_mixups_fail_validation() {
        let view = View::new().with_entity("e", ViewGroup::new());
        assert!(matches!(
            view.validate(&schema()),
            Err(ViewError::WrongElementKind { .. })
        ));
    }

    #[test]
    fn filters_must_select_declared_properties() {
        let bad = FilterExpr::new().with(ComparePredicate::new(
            "missing",
            CompareOp::Exists,
            None,
        ));
        let view = View::new().with_edge("e", ViewGroup::new().with_post_aggregation_filter(bad));
        assert!(matches!(
            view.validate(&schema()),
            Err(ViewError::UnknownFilterProperty { .. })
        ));
    }

    #[test]
    fn group_by_override_must_narrow() {
        let view = View::new().with_edge("e", ViewGroup::new().with_group_by(["count"]));
        assert!(matches!(
            view.validate(&schema()),
            Err(ViewError::GroupByNotNarrowing { .. })
        ));

        let ok = View::new()
            .with_edge("e", ViewGroup::new().with_group_by(Vec::<String>::new()));
        ok.validate(&schema()).unwrap();
    }

    #[test]
    fn effective_group_by_prefers_the_override() {
        let schema = schema();
        let (_, def) = schema.def(&"e".into()).unwrap();

        let plain = View::new().with_edge("e", ViewGroup::new().with_post_aggregation_filter(count_filter()));
        assert_eq!(plain.effective_group_by(&"e".into(), def), &["bucket".to_string()]);

        let collapsed = plain.with_collapsed_group_by(&schema);
        assert!(collapsed.effective_group_by(&"e".into(), def).is_empty());
    }
}

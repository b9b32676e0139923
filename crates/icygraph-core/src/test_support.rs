//! Shared fixtures for the crate's test modules.

use crate::{
    codec::{ElementConverter, layout::RowLayout},
    element::{Edge, Element, Entity},
    filter::{CompareOp, ComparePredicate, FilterExpr},
    schema::{ElementDef, PropertyDef, Schema, aggregate::Aggregator},
    value::{Value, ValueKind},
};
use std::sync::Arc;

/// Text vertices; a "person" entity group aggregating `age` by max, and a
/// "knows" edge group with a `bucket` group-by and summed `count`.
pub(crate) fn social_schema() -> Arc<Schema> {
    let schema = Schema::new()
        .with_entity(
            "person",
            ElementDef::new(ValueKind::Text)
                .with_property(PropertyDef::new("age", ValueKind::Int, Aggregator::Max)),
        )
        .with_edge(
            "knows",
            ElementDef::new(ValueKind::Text)
                .with_property(PropertyDef::new("bucket", ValueKind::Int, Aggregator::Max))
                .with_property(PropertyDef::new("count", ValueKind::Int, Aggregator::Sum))
                .with_group_by(["bucket"]),
        );
    schema.validate().expect("fixture schema is valid");
    Arc::new(schema)
}

/// `social_schema` plus visibility and timestamp planes on an "event" edge
/// group.
pub(crate) fn plane_schema() -> Arc<Schema> {
    let schema = Schema::new()
        .with_edge(
            "event",
            ElementDef::new(ValueKind::Text)
                .with_property(PropertyDef::new("count", ValueKind::Int, Aggregator::Sum))
                .with_property(PropertyDef::new("vis", ValueKind::Text, Aggregator::Max))
                .with_property(PropertyDef::new("ts", ValueKind::Uint, Aggregator::Max)),
        )
        .with_visibility_property("vis")
        .with_timestamp_property("ts");
    schema.validate().expect("fixture schema is valid");
    Arc::new(schema)
}

pub(crate) fn converter(layout: RowLayout) -> ElementConverter {
    ElementConverter::new(layout, social_schema())
}

pub(crate) fn person(vertex: &str, age: i64) -> Element {
    Entity::new("person", Value::Text(vertex.into()))
        .with_property("age", Value::Int(age))
        .into()
}

pub(crate) fn knows(source: &str, destination: &str, count: i64) -> Element {
    Edge::new(
        "knows",
        Value::Text(source.into()),
        Value::Text(destination.into()),
        true,
    )
    .with_property("bucket", Value::Int(0))
    .with_property("count", Value::Int(count))
    .into()
}

pub(crate) fn knows_undirected(source: &str, destination: &str, count: i64) -> Element {
    Edge::new(
        "knows",
        Value::Text(source.into()),
        Value::Text(destination.into()),
        false,
    )
    .with_property("bucket", Value::Int(0))
    .with_property("count", Value::Int(count))
    .into()
}

pub(crate) fn count_over(threshold: i64) -> FilterExpr {
    FilterExpr::new().with(ComparePredicate::new(
        "count",
        CompareOp::Gt,
        Some(Value::Int(threshold)),
    ))
}

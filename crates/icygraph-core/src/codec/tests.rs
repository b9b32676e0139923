use crate::{
    codec::{CodecError, ElementConverter, layout::RowLayout},
    element::{Edge, Element, Entity, MatchedEnd},
    test_support::{converter, knows, knows_undirected, person, plane_schema},
    value::Value,
    view::{View, ViewGroup},
};
use proptest::prelude::*;

const LAYOUTS: [RowLayout; 2] = [RowLayout::ByteEntity, RowLayout::Classic];

fn roundtrip(codec: &ElementConverter, element: &Element) -> Element {
    let (key, _) = codec.to_keys(element).unwrap();
    let value = codec.to_value(element).unwrap();
    codec.from_key_value(&key, &value, false).unwrap()
}

#[test]
fn entity_roundtrips_under_both_layouts() {
    for layout in LAYOUTS {
        let codec = converter(layout);
        let element = person("alice", 42);
        assert_eq!(roundtrip(&codec, &element), element);
    }
}

#[test]
fn directed_edge_roundtrips_through_either_row_form() {
    for layout in LAYOUTS {
        let codec = converter(layout);
        let element = knows("alice", "bob", 3);
        let (first, second) = codec.to_keys(&element).unwrap();
        let second = second.expect("edges are dual-keyed");
        let value = codec.to_value(&element).unwrap();

        assert_eq!(codec.from_key_value(&first, &value, false).unwrap(), element);
        assert_eq!(codec.from_key_value(&second, &value, false).unwrap(), element);
    }
}

#[test]
fn undirected_edge_roundtrips_through_either_row_form() {
    for layout in LAYOUTS {
        let codec = converter(layout);
        let element = knows_undirected("bob", "alice", 1);
        let (first, second) = codec.to_keys(&element).unwrap();
        let value = codec.to_value(&element).unwrap();

        assert_eq!(codec.from_key_value(&first, &value, false).unwrap(), element);
        assert_eq!(
            codec
                .from_key_value(&second.unwrap(), &value, false)
                .unwrap(),
            element
        );
    }
}

#[test]
fn dual_keys_share_every_plane_but_the_row() {
    for layout in LAYOUTS {
        let codec = converter(layout);
        let (first, second) = codec.to_keys(&knows("alice", "bob", 3)).unwrap();
        let second = second.unwrap();

        assert_ne!(first.row, second.row);
        assert_eq!(first.family, second.family);
        assert_eq!(first.qualifier, second.qualifier);
        assert_eq!(first.visibility, second.visibility);
        assert_eq!(first.timestamp, second.timestamp);
    }
}

#[test]
fn dual_rows_are_each_others_partner() {
    for layout in LAYOUTS {
        let codec = converter(layout);
        let (first, second) = codec.to_keys(&knows("alice", "bob", 3)).unwrap();
        let second = second.unwrap();

        assert_eq!(codec.partner_row(&first.row).unwrap().unwrap(), second.row);
        assert_eq!(codec.partner_row(&second.row).unwrap().unwrap(), first.row);
    }
}

#[test]
fn matched_end_tracks_the_row_first_endpoint() {
    let codec = converter(RowLayout::ByteEntity);
    let element = knows("alice", "bob", 3);
    let (first, second) = codec.to_keys(&element).unwrap();
    let value = codec.to_value(&element).unwrap();

    let Element::Edge(from_first) = codec.from_key_value(&first, &value, true).unwrap() else {
        panic!("expected an edge");
    };
    assert_eq!(from_first.matched, Some(MatchedEnd::Source));

    let Element::Edge(from_second) = codec
        .from_key_value(&second.unwrap(), &value, true)
        .unwrap()
    else {
        panic!("expected an edge");
    };
    assert_eq!(from_second.matched, Some(MatchedEnd::Destination));
    assert_eq!(from_second.far_end(), &Value::Text("alice".into()));
}

#[test]
fn entity_and_edge_rows_share_the_seed_prefix() {
    for layout in LAYOUTS {
        let codec = converter(layout);
        let (entity_key, _) = codec.to_keys(&person("alice", 1)).unwrap();
        let (edge_key, _) = codec.to_keys(&knows("alice", "bob", 1)).unwrap();

        let prefix = codec.encode_vertex(&Value::Text("alice".into())).unwrap();
        assert!(entity_key.row.starts_with(&prefix));
        assert!(edge_key.row.starts_with(&prefix));
    }
}

#[test]
fn missing_required_property_fails() {
    let codec = converter(RowLayout::ByteEntity);
    let element: Element = Entity::new("person", Value::Text("alice".into())).into();
    assert!(matches!(
        codec.to_value(&element),
        Err(CodecError::MissingProperty { .. })
    ));

    let edge: Element = Edge::new(
        "knows",
        Value::Text("a".into()),
        Value::Text("b".into()),
        true,
    )
    .with_property("count", Value::Int(1))
    .into();
    // bucket is in the group-by, so the key itself cannot be built
    assert!(matches!(
        codec.to_keys(&edge),
        Err(CodecError::MissingProperty { .. })
    ));
}

#[test]
fn undeclared_property_fails() {
    let codec = converter(RowLayout::ByteEntity);
    let element: Element = Entity::new("person", Value::Text("alice".into()))
        .with_property("age", Value::Int(1))
        .with_property("shoe_size", Value::Int(9))
        .into();
    assert!(matches!(
        codec.to_keys(&element),
        Err(CodecError::UndeclaredProperty { .. })
    ));
}

#[test]
fn unknown_group_fails() {
    let codec = converter(RowLayout::ByteEntity);
    let element: Element = Entity::new("ghost", Value::Text("alice".into())).into();
    assert!(matches!(
        codec.to_keys(&element),
        Err(CodecError::UnknownGroup { .. })
    ));
}

#[test]
fn wrong_vertex_kind_fails() {
    let codec = converter(RowLayout::ByteEntity);
    let element: Element = Entity::new("person", Value::Int(9))
        .with_property("age", Value::Int(1))
        .into();
    assert!(matches!(
        codec.to_keys(&element),
        Err(CodecError::VertexKind { .. })
    ));
}

#[test]
fn visibility_and_timestamp_ride_in_the_key() {
    let codec = ElementConverter::new(RowLayout::ByteEntity, plane_schema());
    let element: Element = Edge::new(
        "event",
        Value::Text("a".into()),
        Value::Text("b".into()),
        true,
    )
    .with_property("count", Value::Int(1))
    .with_property("vis", Value::Text("public".into()))
    .with_property("ts", Value::Uint(86_400_000))
    .into();

    let (key, _) = codec.to_keys(&element).unwrap();
    assert_eq!(key.visibility, b"public".to_vec());
    assert_eq!(key.timestamp, 86_400_000);

    // neither plane property appears in the value bytes
    let value = codec.to_value(&element).unwrap();
    assert_eq!(codec.from_key_value(&key, &value, false).unwrap(), element);
}

#[test]
fn narrowed_group_by_moves_bucket_into_the_value_plane() {
    let base = converter(RowLayout::ByteEntity);
    let narrowed_view = View::new().with_edge(
        "knows",
        ViewGroup::new().with_group_by(Vec::<String>::new()),
    );
    let narrowed = converter(RowLayout::ByteEntity).with_view_group_by(&narrowed_view);

    let element = knows("alice", "bob", 3);
    let (base_key, _) = base.to_keys(&element).unwrap();
    let (narrow_key, _) = narrowed.to_keys(&element).unwrap();

    assert!(!base_key.qualifier.is_empty());
    assert!(narrow_key.qualifier.is_empty());
    assert!(narrowed.to_value(&element).unwrap().len() > base.to_value(&element).unwrap().len());

    let value = narrowed.to_value(&element).unwrap();
    assert_eq!(
        narrowed.from_key_value(&narrow_key, &value, false).unwrap(),
        element
    );
}

#[test]
fn corrupt_value_payload_is_rejected() {
    let codec = converter(RowLayout::ByteEntity);
    let element = person("alice", 42);
    let (key, _) = codec.to_keys(&element).unwrap();
    let mut value = codec.to_value(&element).unwrap();
    value.truncate(value.len() - 1);
    assert!(matches!(
        codec.from_key_value(&key, &value, false),
        Err(CodecError::TruncatedPayload { .. })
    ));
}

proptest! {
    #[test]
    fn edge_roundtrip_holds_for_arbitrary_text_endpoints(
        source in "[a-z]{1,8}",
        destination in "[a-z]{1,8}",
        count in -1000i64..1000,
        directed: bool,
    ) {
        for layout in LAYOUTS {
            let codec = converter(layout);
            let element: Element = Edge::new(
                "knows",
                Value::Text(source.clone()),
                Value::Text(destination.clone()),
                directed,
            )
            .with_property("bucket", Value::Int(0))
            .with_property("count", Value::Int(count))
            .into();

            let (first, second) = codec.to_keys(&element).unwrap();
            let value = codec.to_value(&element).unwrap();
            prop_assert_eq!(&codec.from_key_value(&first, &value, false).unwrap(), &element);
            if let Some(second) = second {
                prop_assert_eq!(&codec.from_key_value(&second, &value, false).unwrap(), &element);
            }
        }
    }
}

//! End-to-end store tests over the in-memory engine: write through the
//! codec, read back through ranges, iterators, and retrievers.

use crate::{
    config::{ConfigError, StoreConfig},
    element::{Edge, Element, Seed},
    error::Error,
    iterator::server_iterator_registry,
    ops::{
        AddElements, GetAdjacentEntitySeeds, GetAllElements, GetElements,
        GetElementsBetweenSets, GetElementsInRanges, GetElementsWithinSet, Operation,
        SummariseGroupOverRanges,
        chain::{OperationChain, no_seeds},
        options::{InOutType, Inclusion},
    },
    repair::repair_unpaired_edges,
    schema::Schema,
    store::Store,
    test_support::{count_over, knows, knows_undirected, person, plane_schema, social_schema},
    value::Value,
    view::{View, ViewGroup},
};
use icygraph_tablet::{
    Authorizations, Credentials, TabletEngine, memory::MemoryTabletEngine,
};

const LAYOUT_IDS: [&str; 2] = ["byte-entity", "classic"];

fn cluster() -> MemoryTabletEngine {
    let cluster = MemoryTabletEngine::new(server_iterator_registry());
    cluster.add_user("root", "secret", Authorizations::new(["public"]));
    cluster
}

fn config(key_package: &str) -> StoreConfig {
    StoreConfig {
        instance: "test".to_string(),
        endpoints: vec!["local".to_string()],
        credentials: Credentials {
            user: "root".to_string(),
            password: "secret".to_string(),
        },
        authorizations: Authorizations::new(["public"]),
        table: "elements".to_string(),
        key_package: key_package.to_string(),
    }
}

fn open(key_package: &str, schema: &Schema) -> Store {
    Store::open_with_cluster(config(key_package), schema.clone(), &cluster()).unwrap()
}

fn social_store(key_package: &str) -> Store {
    open(key_package, &social_schema())
}

fn add(store: &Store, elements: Vec<Element>) -> crate::write::WriteSummary {
    store
        .execute(Operation::AddElements(AddElements { elements }))
        .unwrap()
        .into_write_summary()
        .unwrap()
}

fn elements_of(store: &Store, operation: Operation) -> Vec<Element> {
    store
        .execute(operation)
        .unwrap()
        .into_elements()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn seeds_of(store: &Store, operation: Operation) -> Vec<Seed> {
    store
        .execute(operation)
        .unwrap()
        .into_seeds()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn get_elements(seeds: Vec<Seed>) -> Operation {
    Operation::GetElements(GetElements {
        seeds,
        ..GetElements::default()
    })
}

fn count_of(element: &Element) -> i64 {
    match element.properties().get("count") {
        Some(Value::Int(count)) => *count,
        other => panic!("missing count: {other:?}"),
    }
}

// ----------------------------------------------------------------------
// Open-time failures
// ----------------------------------------------------------------------

#[test]
fn unknown_key_package_fails_to_open() {
    let err = Store::open_with_cluster(config("reflective"), (*social_schema()).clone(), &cluster())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::UnknownKeyPackage { .. })
    ));
}

#[test]
fn invalid_schema_fails_to_open() {
    let err =
        Store::open_with_cluster(config("byte-entity"), Schema::new(), &cluster()).unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[test]
fn bad_credentials_fail_to_open() {
    let mut bad = config("byte-entity");
    bad.credentials.password = "wrong".to_string();
    let err =
        Store::open_with_cluster(bad, (*social_schema()).clone(), &cluster()).unwrap_err();
    assert!(matches!(err, Error::Store(_)));
}

// ----------------------------------------------------------------------
// Scenario S1: summed edges from a seed
// ----------------------------------------------------------------------

#[test]
fn seed_query_returns_aggregated_touching_edges_only() {
    for id in LAYOUT_IDS {
        let store = social_store(id);
        add(
            &store,
            vec![knows("1", "2", 3), knows("1", "2", 4), knows("2", "3", 1)],
        );

        let out = elements_of(&store, get_elements(vec![Seed::entity(Value::Text("1".into()))]));
        assert_eq!(out.len(), 1, "exactly one edge touches vertex 1 ({id})");
        assert_eq!(count_of(&out[0]), 7);
    }
}

// ----------------------------------------------------------------------
// Scenario S2: adjacency
// ----------------------------------------------------------------------

#[test]
fn outgoing_adjacency_returns_far_endpoints() {
    let store = social_store("byte-entity");
    add(
        &store,
        vec![knows("1", "2", 3), knows("1", "2", 4), knows("2", "3", 1)],
    );

    let out = seeds_of(
        &store,
        Operation::GetAdjacentEntitySeeds(GetAdjacentEntitySeeds {
            seeds: vec![Seed::entity(Value::Text("1".into()))],
            view: View::new(),
            include_incoming_outgoing: InOutType::Outgoing,
        }),
    );
    assert_eq!(out, vec![Seed::entity(Value::Text("2".into()))]);
}

#[test]
fn incoming_adjacency_sees_the_reverse_direction() {
    let store = social_store("byte-entity");
    add(&store, vec![knows("1", "2", 3), knows("2", "3", 1)]);

    let incoming = seeds_of(
        &store,
        Operation::GetAdjacentEntitySeeds(GetAdjacentEntitySeeds {
            seeds: vec![Seed::entity(Value::Text("2".into()))],
            view: View::new(),
            include_incoming_outgoing: InOutType::Incoming,
        }),
    );
    assert_eq!(incoming, vec![Seed::entity(Value::Text("1".into()))]);
}

// ----------------------------------------------------------------------
// Scenario S3: entity aggregation by max
// ----------------------------------------------------------------------

#[test]
fn entity_max_aggregation_keeps_the_larger_value() {
    for id in LAYOUT_IDS {
        let store = social_store(id);
        add(&store, vec![person("1", 5), person("1", 2)]);

        let out = elements_of(
            &store,
            Operation::GetElements(GetElements {
                seeds: vec![Seed::entity(Value::Text("1".into()))],
                inclusion: Inclusion::entities_only(),
                ..GetElements::default()
            }),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].properties().get("age"), Some(&Value::Int(5)));
    }
}

// ----------------------------------------------------------------------
// Scenario S4: view filter after aggregation
// ----------------------------------------------------------------------

#[test]
fn post_aggregation_filter_sees_merged_values() {
    let store = social_store("byte-entity");
    add(
        &store,
        vec![knows("1", "2", 3), knows("1", "2", 4), knows("2", "3", 1)],
    );

    let view = View::new().with_edge(
        "knows",
        ViewGroup::new().with_post_aggregation_filter(count_over(5)),
    );
    let out = elements_of(
        &store,
        Operation::GetAllElements(GetAllElements {
            view,
            inclusion: Inclusion::default(),
        }),
    );
    assert_eq!(out.len(), 1);
    assert_eq!(count_of(&out[0]), 7);
}

#[test]
fn adding_a_filter_never_adds_results() {
    let store = social_store("byte-entity");
    add(&store, vec![knows("1", "2", 7), knows("2", "3", 1)]);

    let unfiltered = elements_of(
        &store,
        Operation::GetAllElements(GetAllElements::default()),
    );
    let filtered = elements_of(
        &store,
        Operation::GetAllElements(GetAllElements {
            view: View::new().with_edge(
                "knows",
                ViewGroup::new().with_post_aggregation_filter(count_over(5)),
            ),
            inclusion: Inclusion::default(),
        }),
    );
    assert!(filtered.len() <= unfiltered.len());
    assert!(filtered.iter().all(|e| unfiltered.contains(e)));
}

// ----------------------------------------------------------------------
// Scenario S5: a malformed element never poisons a batch
// ----------------------------------------------------------------------

#[test]
fn malformed_elements_are_skipped_not_fatal() {
    let store = social_store("byte-entity");

    let mut elements: Vec<Element> = (0..1000)
        .map(|i| knows(&format!("s{i}"), &format!("d{i}"), 1))
        .collect();
    // vertex kind violates the schema, so the codec rejects it
    elements.push(
        Edge::new("knows", Value::Int(13), Value::Text("x".into()), true)
            .with_property("bucket", Value::Int(0))
            .with_property("count", Value::Int(1))
            .into(),
    );

    let summary = add(&store, elements);
    assert_eq!(summary.written, 1000);
    assert_eq!(summary.skipped, 1);
    assert!(summary.first_error.is_some());

    let out = elements_of(&store, Operation::GetAllElements(GetAllElements::default()));
    assert_eq!(out.len(), 1000);
}

// ----------------------------------------------------------------------
// Scenario S6: within-set and between-sets
// ----------------------------------------------------------------------

#[test]
fn within_set_requires_both_endpoints_inside() {
    let store = social_store("byte-entity");
    add(&store, vec![knows("1", "2", 1), knows("2", "4", 1)]);

    let out = elements_of(
        &store,
        Operation::GetElementsWithinSet(GetElementsWithinSet {
            seeds: ["1", "2", "3"]
                .into_iter()
                .map(|v| Seed::entity(Value::Text(v.into())))
                .collect(),
            view: View::new(),
            include_entities: true,
        }),
    );
    assert_eq!(out.len(), 1);
    let Element::Edge(edge) = &out[0] else {
        panic!("expected an edge");
    };
    assert_eq!(edge.destination, Value::Text("2".into()));
}

#[test]
fn between_sets_requires_one_endpoint_in_each() {
    let store = social_store("byte-entity");
    add(&store, vec![knows("1", "2", 1), knows("1", "3", 1), knows("3", "1", 1)]);

    let out = elements_of(
        &store,
        Operation::GetElementsBetweenSets(GetElementsBetweenSets {
            seeds: vec![Seed::entity(Value::Text("1".into()))],
            seeds_b: vec![Seed::entity(Value::Text("3".into()))],
            view: View::new(),
            include_entities: true,
        }),
    );
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|e| {
        let Element::Edge(edge) = e else { return false };
        let pair = (edge.source.clone(), edge.destination.clone());
        pair == (Value::Text("1".into()), Value::Text("3".into()))
            || pair == (Value::Text("3".into()), Value::Text("1".into()))
    }));
}

// ----------------------------------------------------------------------
// Ranges and summarisation
// ----------------------------------------------------------------------

#[test]
fn range_queries_cover_first_endpoints_inclusively() {
    let store = social_store("byte-entity");
    add(
        &store,
        vec![knows("a", "z", 1), knows("b", "z", 1), knows("c", "z", 1)],
    );

    let out = elements_of(
        &store,
        Operation::GetElementsInRanges(GetElementsInRanges {
            ranges: vec![(
                Seed::entity(Value::Text("a".into())),
                Seed::entity(Value::Text("b".into())),
            )],
            ..GetElementsInRanges::default()
        }),
    );
    assert_eq!(out.len(), 2);
}

#[test]
fn summarise_collapses_the_group_by_over_ranges() {
    let store = social_store("byte-entity");
    let mut high_bucket = knows("1", "2", 4);
    if let Element::Edge(edge) = &mut high_bucket {
        edge.properties.insert("bucket", Value::Int(9));
    }
    add(&store, vec![knows("1", "2", 3), high_bucket]);

    // distinct buckets: a plain read sees two edges
    let plain = elements_of(&store, get_elements(vec![Seed::entity(Value::Text("1".into()))]));
    assert_eq!(plain.len(), 2);

    // the summary collapses them into one
    let out = elements_of(
        &store,
        Operation::SummariseGroupOverRanges(SummariseGroupOverRanges {
            ranges: vec![(
                Seed::entity(Value::Text("1".into())),
                Seed::entity(Value::Text("1".into())),
            )],
            view: View::new(),
        }),
    );
    assert_eq!(out.len(), 1);
    assert_eq!(count_of(&out[0]), 7);
}

#[test]
fn duplicate_seeds_do_not_duplicate_results() {
    let store = social_store("byte-entity");
    add(&store, vec![knows("1", "2", 3)]);

    let once = elements_of(&store, get_elements(vec![Seed::entity(Value::Text("1".into()))]));
    let twice = elements_of(
        &store,
        get_elements(vec![
            Seed::entity(Value::Text("1".into())),
            Seed::entity(Value::Text("1".into())),
            Seed::entity(Value::Text("2".into())),
        ]),
    );
    assert_eq!(once.len(), 1);
    assert_eq!(twice.len(), 1);
}

// ----------------------------------------------------------------------
// Edge seeds and undirected edges
// ----------------------------------------------------------------------

#[test]
fn edge_seeds_fetch_exactly_that_edge() {
    let store = social_store("byte-entity");
    add(&store, vec![knows("1", "2", 3), knows("1", "3", 1)]);

    let out = elements_of(
        &store,
        get_elements(vec![Seed::edge(
            Value::Text("1".into()),
            Value::Text("2".into()),
            true,
        )]),
    );
    assert_eq!(out.len(), 1);
    assert_eq!(count_of(&out[0]), 3);
}

#[test]
fn undirected_edges_are_reachable_from_both_ends() {
    for id in LAYOUT_IDS {
        let store = social_store(id);
        add(&store, vec![knows_undirected("1", "2", 5)]);

        for seed in ["1", "2"] {
            let out =
                elements_of(&store, get_elements(vec![Seed::entity(Value::Text(seed.into()))]));
            assert_eq!(out.len(), 1, "seed {seed} under {id}");
            assert_eq!(count_of(&out[0]), 5);
        }
    }
}

// ----------------------------------------------------------------------
// Chains
// ----------------------------------------------------------------------

#[test]
fn two_hop_chain_composes_adjacency_into_get_elements() {
    let store = social_store("byte-entity");
    add(&store, vec![knows("1", "2", 3), knows("2", "3", 1)]);

    let chain = OperationChain::start(GetAdjacentEntitySeeds {
        seeds: vec![Seed::entity(Value::Text("1".into()))],
        view: View::new(),
        include_incoming_outgoing: InOutType::Outgoing,
    })
    .then(GetElements {
        inclusion: Inclusion::edges_only(),
        ..GetElements::default()
    });

    let out: Vec<Element> = chain
        .execute(&store, no_seeds())
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    // seeds resolve to {2}; both edges touch vertex 2
    assert_eq!(out.len(), 2);
}

#[test]
fn chains_can_terminate_in_a_write() {
    let store = social_store("byte-entity");

    let chain = OperationChain::start(GetAllElements::default()).then(AddElements::default());
    let summary = chain.execute(&store, ()).unwrap();
    assert_eq!(summary.written, 0);

    add(&store, vec![knows("1", "2", 3)]);
    let chain = OperationChain::start(GetAllElements::default()).then(AddElements::default());
    let summary = chain.execute(&store, ()).unwrap();
    // the read-back edge rewrites cleanly
    assert_eq!(summary.written, 1);
    assert_eq!(summary.skipped, 0);
}

// ----------------------------------------------------------------------
// Visibility
// ----------------------------------------------------------------------

#[test]
fn visibility_labels_trim_results_per_connection() {
    let cluster = cluster();
    cluster.add_user("outsider", "pw", Authorizations::default());

    let store =
        Store::open_with_cluster(config("byte-entity"), (*plane_schema()).clone(), &cluster)
            .unwrap();

    let element: Element = Edge::new(
        "event",
        Value::Text("a".into()),
        Value::Text("b".into()),
        true,
    )
    .with_property("count", Value::Int(1))
    .with_property("vis", Value::Text("public".into()))
    .with_property("ts", Value::Uint(1000))
    .into();
    add(&store, vec![element]);

    assert_eq!(
        elements_of(&store, Operation::GetAllElements(GetAllElements::default())).len(),
        1
    );

    let mut outsider_config = config("byte-entity");
    outsider_config.credentials = Credentials {
        user: "outsider".to_string(),
        password: "pw".to_string(),
    };
    let outsider =
        Store::open_with_cluster(outsider_config, (*plane_schema()).clone(), &cluster).unwrap();
    assert!(elements_of(&outsider, Operation::GetAllElements(GetAllElements::default())).is_empty());
}

// ----------------------------------------------------------------------
// Repair
// ----------------------------------------------------------------------

#[test]
fn repair_re_emits_a_missing_edge_partner() {
    let cluster = cluster();
    let store =
        Store::open_with_cluster(config("byte-entity"), (*social_schema()).clone(), &cluster)
            .unwrap();

    // write only one row form, bypassing the element writer
    let element = knows("1", "2", 3);
    let codec = store.package().codec();
    let (first, _) = codec.to_keys(&element).unwrap();
    let value = codec.to_value(&element).unwrap();

    let raw = cluster
        .connect(&Credentials {
            user: "root".to_string(),
            password: "secret".to_string(),
        })
        .unwrap();
    let mut writer = raw.writer("elements").unwrap();
    let mut mutation = icygraph_tablet::Mutation::new(first.row.clone());
    mutation.put(
        first.family.clone(),
        first.qualifier.clone(),
        first.visibility.clone(),
        first.timestamp,
        value,
    );
    writer.submit(mutation).unwrap();
    writer.close().unwrap();

    // the destination-side seed cannot see the half-written edge
    let before = elements_of(&store, get_elements(vec![Seed::entity(Value::Text("2".into()))]));
    assert!(before.is_empty());

    let summary = repair_unpaired_edges(&store).unwrap();
    assert_eq!(summary.repaired, 1);

    let after = elements_of(&store, get_elements(vec![Seed::entity(Value::Text("2".into()))]));
    assert_eq!(after.len(), 1);
}

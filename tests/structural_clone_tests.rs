/// Structural clone tests
///
/// Derived clones, identity preservation and freezing of stored copies.
/// Run with: cargo test --test structural_clone_tests
use std::collections::BTreeMap;
use std::sync::Arc;
use unitstore::{
    Behavior, DataStore, Entity, EntityKey, Shared, StoreError, StructuralClone, deep_clone,
    deep_freeze,
};

#[derive(Debug, Clone, PartialEq)]
struct Money(i64);

unitstore::plain_data!(Money);

#[derive(Debug, Clone, PartialEq, StructuralClone)]
enum Status {
    Draft,
    Published { at: i64, by: String },
    Archived(String),
}

#[derive(Debug, Clone, PartialEq, Entity, StructuralClone)]
#[entity(type = "profile")]
struct Profile {
    id: i64,
    name: String,
    tags: Vec<String>,
    scores: BTreeMap<String, u32>,
    nickname: Option<String>,
    status: Status,
    balance: Money,
}

#[derive(Debug, StructuralClone)]
struct Node {
    label: String,
    next: Option<Shared<Node>>,
}

#[derive(Debug, Entity, StructuralClone)]
#[entity(type = "graph")]
struct Graph {
    id: i64,
    head: Shared<Node>,
}

#[derive(Debug, Entity, StructuralClone)]
#[entity(type = "team")]
struct Team {
    id: i64,
    lead: Shared<String>,
    members: Vec<Shared<String>>,
}

#[derive(Debug, Entity, StructuralClone)]
#[entity(type = "pricing")]
struct Pricing {
    id: i64,
    rule: Behavior<dyn Fn(u32) -> u32 + Send + Sync>,
    #[structural(shallow)]
    catalog: Arc<Vec<String>>,
}

fn profile() -> Profile {
    Profile {
        id: 1,
        name: "Ada".into(),
        tags: vec!["admin".into()],
        scores: BTreeMap::from([("chess".to_string(), 3)]),
        nickname: None,
        status: Status::Published {
            at: 1_700_000_000,
            by: "editor".into(),
        },
        balance: Money(250),
    }
}

fn cyclic_graph(id: i64) -> Graph {
    let head = Shared::new(Node {
        label: "head".into(),
        next: None,
    });
    let tail = Shared::new(Node {
        label: "tail".into(),
        next: Some(head.clone()),
    });
    head.write(|node| node.next = Some(tail.clone())).unwrap();
    Graph { id, head }
}

fn break_cycle(graph: &Graph) {
    graph.head.write(|node| node.next = None).unwrap();
}

#[test]
fn test_derived_clone_is_equal_and_independent() {
    let original = profile();
    let mut copy = deep_clone(&original);
    assert_eq!(copy, original);

    copy.tags.push("ops".into());
    copy.scores.insert("go".into(), 1);
    copy.status = Status::Archived("retired".into());

    assert_eq!(original.tags, vec!["admin".to_string()]);
    assert_eq!(original.scores.len(), 1);
    assert!(matches!(original.status, Status::Published { .. }));
}

#[test]
fn test_enum_variants_clone() {
    for status in [
        Status::Draft,
        Status::Archived("old".into()),
        Status::Published {
            at: 1,
            by: "x".into(),
        },
    ] {
        assert_eq!(deep_clone(&status), status);
    }
}

#[test]
fn test_round_trip_through_store_returns_equal_copy() {
    let store = DataStore::new();
    let mut session = store.session();
    session.save(&profile());
    session.flush().unwrap();

    assert_eq!(store.session().find_one::<Profile>(1).unwrap(), Some(profile()));
}

#[test]
fn test_cycle_survives_round_trip_through_store() {
    let store = DataStore::new();
    let graph = cyclic_graph(1);

    let mut session = store.session();
    session.save(&graph);
    session.flush().unwrap();

    let found = store.session().find_one::<Graph>(1).unwrap().unwrap();
    assert!(!Shared::ptr_eq(&found.head, &graph.head));

    let tail = found.head.read(|node| node.next.clone()).unwrap().unwrap();
    let back = tail.read(|node| node.next.clone()).unwrap().unwrap();
    assert!(Shared::ptr_eq(&back, &found.head));
    assert_eq!(tail.read(|node| node.label.clone()).unwrap(), "tail");

    break_cycle(&found);
    break_cycle(&graph);
}

#[test]
fn test_aliasing_inside_entity_is_preserved() {
    let lead = Shared::new("ada".to_string());
    let team = Team {
        id: 7,
        lead: lead.clone(),
        members: vec![lead.clone(), Shared::new("bob".to_string())],
    };

    let store = DataStore::new();
    let mut session = store.session();
    session.save(&team);

    let found = session.find_one::<Team>(7).unwrap().unwrap();
    assert!(Shared::ptr_eq(&found.lead, &found.members[0]));
    assert!(!Shared::ptr_eq(&found.lead, &found.members[1]));
    assert!(!Shared::ptr_eq(&found.lead, &lead));

    found.lead.replace("grace".to_string()).unwrap();
    assert_eq!(found.members[0].get().unwrap(), "grace");
    assert_eq!(lead.get().unwrap(), "ada");
}

#[test]
fn test_stored_copy_is_frozen_but_caller_value_is_not() {
    let store = DataStore::new();
    let team = Team {
        id: 1,
        lead: Shared::new("ada".to_string()),
        members: Vec::new(),
    };

    let mut session = store.session();
    session.save(&team);
    session.flush().unwrap();

    assert!(!team.lead.is_frozen());
    team.lead.replace("changed".to_string()).unwrap();

    let snapshot = store.snapshot().unwrap();
    let frozen = snapshot
        .get_frozen(&Team::ENTITY_TYPE, &EntityKey::from(1))
        .unwrap();
    let attempt = frozen
        .inspect(|stored: &Team| stored.lead.write(|name| name.push('!')))
        .unwrap();
    assert!(matches!(attempt, Err(StoreError::Frozen(_))));

    let found = session.find_one::<Team>(1).unwrap().unwrap();
    assert_eq!(found.lead.get().unwrap(), "ada");
    assert!(!found.lead.is_frozen());
}

#[test]
fn test_writes_on_found_copy_do_not_reach_store() {
    let store = DataStore::new();
    let mut session = store.session();
    session.save(&Team {
        id: 1,
        lead: Shared::new("ada".to_string()),
        members: Vec::new(),
    });
    session.flush().unwrap();

    let found = session.find_one::<Team>(1).unwrap().unwrap();
    found.lead.replace("mallory".to_string()).unwrap();

    let again = session.find_one::<Team>(1).unwrap().unwrap();
    assert_eq!(again.lead.get().unwrap(), "ada");
}

#[test]
fn test_behavior_and_shallow_fields_keep_identity() {
    let rule: Arc<dyn Fn(u32) -> u32 + Send + Sync> = Arc::new(|price| price * 2);
    let pricing = Pricing {
        id: 1,
        rule: Behavior::from(rule),
        catalog: Arc::new(vec!["lamp".into()]),
    };

    let store = DataStore::new();
    let mut session = store.session();
    session.save(&pricing);
    session.flush().unwrap();

    let found = store.session().find_one::<Pricing>(1).unwrap().unwrap();
    assert!(Behavior::ptr_eq(&found.rule, &pricing.rule));
    assert!(Arc::ptr_eq(&found.catalog, &pricing.catalog));
    assert_eq!((*found.rule)(21), 42);
}

#[test]
fn test_deep_freeze_then_clone() {
    let graph = cyclic_graph(2);
    deep_freeze(&graph);
    assert!(graph.head.is_frozen());

    let copy = deep_clone(&graph);
    assert!(!copy.head.is_frozen());
    copy.head.write(|node| node.label = "new head".into()).unwrap();
    assert_eq!(graph.head.read(|node| node.label.clone()).unwrap(), "head");

    break_cycle(&copy);
}

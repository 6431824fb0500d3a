//! Error handling and edge case tests.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use subflatten::{
    CollectionPath, CollectionSnapshot, Composite, Depth, DocumentPath, DocumentSchema,
    DocumentSnapshot, FlattenConfig, FlattenError, FlattenEvent, Flattener, ListenerRegistration,
    Location, MemoryStore, Rule, Ruleset, Snapshot, SnapshotListener, SnapshotStore, Updater,
};

#[derive(Clone, Default)]
struct Recorder {
    updates: Arc<Mutex<Vec<Value>>>,
    errors: Arc<Mutex<Vec<FlattenError>>>,
}

impl Updater for Recorder {
    fn update(&self, composite: &Composite) {
        self.updates.lock().push(composite.to_value());
    }

    fn on_error(&self, error: &FlattenError) {
        self.errors.lock().push(error.clone());
    }
}

fn doc(path: &str) -> DocumentPath {
    DocumentPath::parse(path).unwrap()
}

/// Delivers one fixed snapshot synchronously from inside `listen`.
struct FixedStore {
    snapshot: Snapshot,
    fail_collections: bool,
}

impl SnapshotStore for FixedStore {
    fn listen(
        &self,
        location: &Location,
        listener: SnapshotListener,
    ) -> subflatten::Result<ListenerRegistration> {
        if self.fail_collections && location.is_collection() {
            return Err(FlattenError::Listen {
                location: location.to_string(),
                message: "permission denied".to_string(),
            });
        }
        listener(Ok(self.snapshot.clone()));
        Ok(ListenerRegistration::new(|| {}))
    }
}

fn user_snapshot() -> Snapshot {
    Snapshot::Document(DocumentSnapshot {
        id: "a".to_string(),
        data: json!({"name": "A"}).as_object().cloned(),
    })
}

// --- Store Errors ---

#[test]
fn test_store_error_reaches_root_updater() {
    let store = MemoryStore::new();
    store.set(&doc("users/a"), json!({"name": "A"})).unwrap();

    let recorder = Recorder::default();
    let _handle = Flattener::new(store.clone())
        .subscribe(
            Ruleset::new(vec![Rule::new("items")]),
            doc("users/a"),
            recorder.clone(),
        )
        .unwrap();

    let items = Location::Collection(doc("users/a").collection("items").unwrap());
    store.fail(&items, "permission denied");

    assert_eq!(
        *recorder.errors.lock(),
        vec![FlattenError::Listen {
            location: "users/a/items".to_string(),
            message: "permission denied".to_string(),
        }]
    );

    // The tree stays live after the error.
    let before = recorder.updates.lock().len();
    store.set(&doc("users/a/items/1"), json!({"val": 1})).unwrap();
    assert!(recorder.updates.lock().len() > before);
}

#[test]
fn test_store_error_on_channel() {
    let store = MemoryStore::new();
    let root = Location::Collection(CollectionPath::parse("users").unwrap());

    let sub = Flattener::new(store.clone())
        .subscribe_channel(Ruleset::default(), root.clone())
        .unwrap();
    store.fail(&root, "unavailable");

    let events: Vec<FlattenEvent> = std::iter::from_fn(|| sub.try_recv().ok()).collect();
    assert!(events
        .iter()
        .any(|e| matches!(e, FlattenEvent::Error(FlattenError::Listen { message, .. }) if message == "unavailable")));
}

#[test]
fn test_errors_after_cancel_are_silent() {
    let store = MemoryStore::new();
    let items = Location::Collection(doc("users/a").collection("items").unwrap());
    store.set(&doc("users/a"), json!({"name": "A"})).unwrap();

    let recorder = Recorder::default();
    let handle = Flattener::new(store.clone())
        .subscribe(
            Ruleset::new(vec![Rule::new("items")]),
            doc("users/a"),
            recorder.clone(),
        )
        .unwrap();
    handle.cancel();

    store.fail(&items, "late");
    assert!(recorder.errors.lock().is_empty());
}

// --- Misbehaving Stores ---

#[test]
fn test_snapshot_kind_mismatch() {
    let store = FixedStore {
        snapshot: user_snapshot(),
        fail_collections: false,
    };

    let recorder = Recorder::default();
    let _handle = Flattener::new(store)
        .subscribe(
            Ruleset::default(),
            CollectionPath::parse("users").unwrap(),
            recorder.clone(),
        )
        .unwrap();

    assert!(recorder.updates.lock().is_empty());
    assert_eq!(
        *recorder.errors.lock(),
        vec![FlattenError::SnapshotMismatch {
            location: "users".to_string()
        }]
    );
}

#[test]
fn test_failed_child_listen_is_reported() {
    let store = FixedStore {
        snapshot: user_snapshot(),
        fail_collections: true,
    };

    let recorder = Recorder::default();
    let handle = Flattener::new(store)
        .subscribe(
            Ruleset::new(vec![Rule::new("items"), Rule::new("notes")]),
            doc("users/a"),
            recorder.clone(),
        )
        .unwrap();

    assert_eq!(recorder.errors.lock().len(), 2);
    assert_eq!(handle.child_count(), 0);
    assert_eq!(
        recorder.updates.lock().last().cloned(),
        Some(json!({"name": "A"}))
    );
}

#[test]
fn test_failed_root_listen_is_returned() {
    let store = FixedStore {
        snapshot: Snapshot::Collection(CollectionSnapshot::default()),
        fail_collections: true,
    };

    let result = Flattener::new(store).subscribe(
        Ruleset::default(),
        CollectionPath::parse("users").unwrap(),
        |_: &Composite| {},
    );
    assert!(matches!(result, Err(FlattenError::Listen { .. })));
}

#[test]
fn test_synchronous_store_builds_tree() {
    // Every location answers with the same document; the collection nodes
    // see a mismatch, which is reported but does not deadlock.
    let store = FixedStore {
        snapshot: user_snapshot(),
        fail_collections: false,
    };

    let recorder = Recorder::default();
    let handle = Flattener::new(store)
        .subscribe(
            Ruleset::new(vec![Rule::new("items")]),
            doc("users/a"),
            recorder.clone(),
        )
        .unwrap();

    assert_eq!(handle.child_count(), 1);
    assert_eq!(recorder.errors.lock().len(), 1);
}

// --- Ruleset Errors ---

#[test]
fn test_depth_limit() {
    let store = MemoryStore::new();
    let config = FlattenConfig {
        max_depth: Some(2),
        ..Default::default()
    };
    let flattener = Flattener::new(store).with_config(config);

    let deep = Ruleset::new(vec![Rule::nested(
        "items",
        Ruleset::new(vec![Rule::new("tags")]),
    )]);
    let result = flattener.subscribe(deep, doc("users/a"), |_: &Composite| {});
    assert_eq!(
        result.err(),
        Some(FlattenError::DepthLimitExceeded { depth: 3, limit: 2 })
    );

    let shallow = Ruleset::new(vec![Rule::new("items")]);
    assert!(flattener
        .subscribe(shallow, doc("users/a"), |_: &Composite| {})
        .is_ok());
}

#[test]
fn test_invalid_start_depth() {
    let store = MemoryStore::new();
    store.set(&doc("users/a"), json!({"name": "A"})).unwrap();
    let flattener = Flattener::new(store.clone());

    let result = flattener.subscribe_at_depth(
        Ruleset::default(),
        doc("users/a"),
        Depth(0),
        |_: &Composite| {},
    );
    assert_eq!(result.err(), Some(FlattenError::InvalidDepth(0)));

    // The nested level would sit past u32::MAX.
    let result = flattener.subscribe_at_depth(
        Ruleset::new(vec![Rule::new("items")]),
        doc("users/a"),
        Depth(u32::MAX),
        |_: &Composite| {},
    );
    assert_eq!(result.err(), Some(FlattenError::InvalidDepth(u32::MAX)));
    assert_eq!(store.listener_count(), 0);

    // A flat ruleset never spawns children, so the last depth is usable.
    let handle = flattener
        .subscribe_at_depth(
            Ruleset::default(),
            doc("users/a"),
            Depth(u32::MAX),
            |_: &Composite| {},
        )
        .unwrap();
    assert_eq!(handle.depth(), Depth(u32::MAX));
    handle.cancel();
}

#[test]
fn test_untrusted_ruleset_validation() {
    let schema: DocumentSchema = serde_json::from_value(json!({
        "fields": ["name"],
        "collections": {"items": {"fields": ["val"]}}
    }))
    .unwrap();

    let good = Ruleset::from_json(r#"[{"collection": "items"}]"#).unwrap();
    assert!(good.validate(&schema).is_ok());

    let bad = Ruleset::from_json(r#"[{"collection": "name"}]"#).unwrap();
    assert_eq!(
        bad.validate(&schema),
        Err(FlattenError::UnknownCollection {
            path: "name".to_string()
        })
    );
}

#[test]
fn test_unvalidated_mismatch_yields_empty_field() {
    // A ruleset naming a plain field is not rejected by the engine: the
    // field is replaced by an empty nested collection.
    let store = MemoryStore::new();
    store
        .set(&doc("users/a"), json!({"name": "A", "age": 3}))
        .unwrap();

    let recorder = Recorder::default();
    let _handle = Flattener::new(store.clone())
        .subscribe(
            Ruleset::new(vec![Rule::new("age")]),
            doc("users/a"),
            recorder.clone(),
        )
        .unwrap();

    assert_eq!(
        recorder.updates.lock().last().cloned(),
        Some(json!({"name": "A", "age": []}))
    );
    assert!(recorder.errors.lock().is_empty());
}

#[test]
fn test_invalid_paths() {
    assert!(matches!(
        DocumentPath::parse("users"),
        Err(FlattenError::InvalidPath(_))
    ));
    assert!(matches!(
        doc("users/a").collection(""),
        Err(FlattenError::InvalidPath(_))
    ));
}

//! Performance benchmarks for subscription trees.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use subflatten::{CollectionPath, Composite, DocumentPath, Flattener, MemoryStore, Rule, Ruleset};

fn nested_rules() -> Ruleset {
    Ruleset::new(vec![Rule::nested(
        "items",
        Ruleset::new(vec![Rule::new("tags")]),
    )])
}

/// `users` documents, each with `items` items holding two tags.
fn populate(store: &MemoryStore, users: usize, items: usize) {
    let root = CollectionPath::parse("users").unwrap();
    for u in 0..users {
        let user = root.doc(&format!("u{:04}", u)).unwrap();
        store.set(&user, json!({"name": u})).unwrap();
        let coll = user.collection("items").unwrap();
        for i in 0..items {
            let item = coll.doc(&format!("i{:04}", i)).unwrap();
            store.set(&item, json!({"val": i})).unwrap();
            let tags = item.collection("tags").unwrap();
            for t in 0..2 {
                store
                    .set(&tags.doc(&format!("t{}", t)).unwrap(), json!({"label": t}))
                    .unwrap();
            }
        }
    }
}

/// Benchmark building a full tree from scratch
fn bench_initial_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("initial_build");

    for users in [10, 50, 200] {
        group.bench_with_input(BenchmarkId::new("users", users), &users, |b, &users| {
            let store = MemoryStore::new();
            populate(&store, users, 5);
            let flattener = Flattener::new(store.clone());

            b.iter(|| {
                let handle = flattener
                    .subscribe(
                        nested_rules(),
                        CollectionPath::parse("users").unwrap(),
                        |c: &Composite| {
                            black_box(c);
                        },
                    )
                    .unwrap();
                handle.cancel();
            });
        });
    }

    group.finish();
}

/// Benchmark a root-level change, which rebuilds every level below
fn bench_root_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("root_rebuild");

    for users in [10, 50, 200] {
        group.bench_with_input(BenchmarkId::new("users", users), &users, |b, &users| {
            let store = MemoryStore::new();
            populate(&store, users, 5);
            let handle = Flattener::new(store.clone())
                .subscribe(
                    nested_rules(),
                    CollectionPath::parse("users").unwrap(),
                    |c: &Composite| {
                        black_box(c);
                    },
                )
                .unwrap();
            let target = DocumentPath::parse("users/u0000").unwrap();

            let mut n = 0u64;
            b.iter(|| {
                n += 1;
                store.set(&target, json!({"name": n})).unwrap();
            });
            handle.cancel();
        });
    }

    group.finish();
}

/// Benchmark a leaf change bubbling up to the root
fn bench_leaf_bubble(c: &mut Criterion) {
    let store = MemoryStore::new();
    populate(&store, 50, 5);
    let handle = Flattener::new(store.clone())
        .subscribe(
            nested_rules(),
            CollectionPath::parse("users").unwrap(),
            |c: &Composite| {
                black_box(c);
            },
        )
        .unwrap();
    let tag = DocumentPath::parse("users/u0025/items/i0002/tags/t0").unwrap();

    let mut n = 0u64;
    c.bench_function("leaf_bubble", |b| {
        b.iter(|| {
            n += 1;
            store.set(&tag, json!({"label": n})).unwrap();
        })
    });
    handle.cancel();
}

criterion_group!(benches, bench_initial_build, bench_root_rebuild, bench_leaf_bubble);
criterion_main!(benches);

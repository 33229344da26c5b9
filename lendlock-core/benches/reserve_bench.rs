use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use lendlock_core::client::LendingClient;
use lendlock_core::config::ReservationConfig;
use lendlock_core::store::{Condition, Consistency, Key, ReplicatedStore, Value, row};
use lendlock_core::store_in_memory::InMemoryStore;

const DUE: u64 = 1_700_000_000_000;

fn bench_reserve_release(c: &mut Criterion) {
    let client = LendingClient::in_memory(ReservationConfig::default()).unwrap();
    client.register_holder("alice").unwrap();
    let item = client.add_item("Dune", "Frank Herbert").unwrap();

    c.bench_function("reserve_release_cycle", |b| {
        b.iter(|| {
            let reserved = client.reserve("alice", &item.id, "Dune", Some(DUE)).unwrap();
            let released = client.release("alice", &item.id, "Dune").unwrap();
            black_box((reserved, released))
        })
    });
}

fn bench_conditional_put(c: &mut Criterion) {
    let store = InMemoryStore::new();
    let key = Key::item("Dune", "i1");
    store
        .put(&key, row([("available", Value::from(true))]), Consistency::Quorum)
        .unwrap();

    c.bench_function("conditional_put_flip", |b| {
        let mut available = true;
        b.iter(|| {
            let applied = store
                .conditional_put(
                    &key,
                    row([("available", Value::from(!available))]),
                    &Condition::equals("available", available),
                    Consistency::Serial,
                )
                .unwrap();
            available = !available;
            black_box(applied)
        })
    });
}

fn bench_fill_catalog(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_catalog");

    for holders in [10, 50, 100] {
        group.bench_with_input(BenchmarkId::new("holders", holders), &holders, |b, &count| {
            b.iter(|| {
                let client = LendingClient::in_memory(ReservationConfig::default()).unwrap();
                // One holder per book, every book reserved once
                for i in 0..count {
                    let name = format!("holder-{}", i);
                    client.register_holder(&name).unwrap();
                    let item = client.add_item(&format!("Book {}", i % 7), "Anonymous").unwrap();
                    client.reserve(&name, &item.id, &item.title, Some(DUE)).unwrap();
                }
                black_box(client.audit().unwrap().reservations)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reserve_release, bench_conditional_put, bench_fill_catalog);
criterion_main!(benches);

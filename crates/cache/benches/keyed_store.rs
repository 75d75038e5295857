use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use buildvault_cache::{
    all_key, query_key, single_key, EntityType, InMemoryKeyedStore, KeyedStore, QueryParams,
};

const BUILD: EntityType = EntityType::new("build");

fn populated(entries: i64) -> Arc<InMemoryKeyedStore> {
    let store = InMemoryKeyedStore::arc();
    for i in 0..entries {
        store.put(single_key(BUILD, i), format!("build-{}", i));
        store.put(
            query_key(BUILD, QueryParams::new().with("page", i.to_string())),
            vec![i],
        );
    }
    store.put(all_key(BUILD), (0..entries).collect::<Vec<_>>());
    store
}

fn bench_point_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_reads");
    for entries in [1_000_i64, 10_000] {
        let store = populated(entries);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(entries), &entries, |b, &n| {
            let mut i = 0_i64;
            b.iter(|| {
                i = (i + 1) % n;
                black_box(store.get::<String>(&single_key(BUILD, i)))
            });
        });
    }
    group.finish();
}

fn bench_query_key(c: &mut Criterion) {
    c.bench_function("query_key_canonicalize", |b| {
        b.iter(|| {
            let params = QueryParams::new()
                .with("theme", "Medieval")
                .with_absent("color")
                .with("author", "Ann")
                .with("page", "3");
            black_box(query_key(BUILD, params))
        })
    });
}

fn bench_evict_by_type(c: &mut Criterion) {
    c.bench_function("evict_by_type_10k", |b| {
        b.iter_batched(
            || populated(10_000),
            |store| black_box(store.evict_by_type(BUILD)),
            criterion::BatchSize::LargeInput,
        )
    });
}

fn bench_contended_writes(c: &mut Criterion) {
    c.bench_function("contended_writes_4_threads", |b| {
        b.iter(|| {
            let store = InMemoryKeyedStore::arc();
            let handles: Vec<_> = (0..4_i64)
                .map(|t| {
                    let store = Arc::clone(&store);
                    thread::spawn(move || {
                        for i in 0..250_i64 {
                            store.put(single_key(BUILD, t * 1_000 + i), i);
                        }
                    })
                })
                .collect();
            for h in handles {
                let _ = h.join();
            }
            black_box(store.len())
        })
    });
}

criterion_group!(
    benches,
    bench_point_reads,
    bench_query_key,
    bench_evict_by_type,
    bench_contended_writes
);
criterion_main!(benches);

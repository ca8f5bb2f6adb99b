//! Throughput benchmarks for the command pipeline and MVCC layer (spec
//! §4.3/§4.4), in the teacher's `criterion` harness.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use kv::config::EngineConfig;
use kv::core::Engine;
use kv::executor::transaction::ClientState;

fn set_get_throughput(c: &mut Criterion) {
    let engine: Engine = Engine::new(EngineConfig::default());
    let mut client = ClientState::new(0);

    let mut group = c.benchmark_group("set_get");
    group.bench_function("set", |b| {
        let mut i: u64 = 0;
        b.iter(|| {
            i += 1;
            let key = Bytes::from(format!("key:{i}"));
            engine
                .execute(&mut client, "SET", vec![key, Bytes::from("value")], 0)
                .unwrap();
        });
    });

    engine
        .execute(&mut client, "SET", vec![Bytes::from("bench-key"), Bytes::from("value")], 0)
        .unwrap();
    group.bench_function("get", |b| {
        b.iter(|| {
            black_box(engine.execute(&mut client, "GET", vec![Bytes::from("bench-key")], 0).unwrap());
        });
    });
    group.finish();
}

fn snapshot_create_and_iterate(c: &mut Criterion) {
    let engine: Engine = Engine::new(EngineConfig::default());
    let mut client = ClientState::new(0);
    for i in 0..1000 {
        engine
            .execute(&mut client, "SET", vec![Bytes::from(format!("k{i}")), Bytes::from("v")], 0)
            .unwrap();
    }

    let mut group = c.benchmark_group("snapshot");
    group.bench_function(BenchmarkId::new("create_and_drop", 1000), |b| {
        b.iter(|| {
            let snap = engine.create_snapshot(0, 0);
            engine.end_snapshot(0, snap);
        });
    });

    let snap = engine.create_snapshot(0, 0);
    group.bench_function(BenchmarkId::new("iter_keys", 1000), |b| {
        b.iter(|| black_box(snap.iter_keys().len()));
    });
    group.finish();
    engine.end_snapshot(0, snap);
}

fn hash_and_zset_writes(c: &mut Criterion) {
    let engine: Engine = Engine::new(EngineConfig::default());
    let mut client = ClientState::new(0);

    let mut group = c.benchmark_group("composite_types");
    group.bench_function("hset", |b| {
        let mut i: u64 = 0;
        b.iter(|| {
            i += 1;
            engine
                .execute(
                    &mut client,
                    "HSET",
                    vec![Bytes::from("h"), Bytes::from(format!("f{i}")), Bytes::from("v")],
                    0,
                )
                .unwrap();
        });
    });
    group.bench_function("zadd", |b| {
        let mut i: u64 = 0;
        b.iter(|| {
            i += 1;
            engine
                .execute(
                    &mut client,
                    "ZADD",
                    vec![Bytes::from("z"), Bytes::from(i.to_string()), Bytes::from(format!("m{i}"))],
                    0,
                )
                .unwrap();
        });
    });
    group.finish();
}

criterion_group!(benches, set_get_throughput, snapshot_create_and_iterate, hash_and_zset_writes);
criterion_main!(benches);

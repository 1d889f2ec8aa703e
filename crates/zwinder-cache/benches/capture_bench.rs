//! Benchmarks for capture and closest-state queries.

use std::hint::black_box;
use std::io::Write;

use criterion::{criterion_group, criterion_main, Criterion};
use zwinder_cache::{CacheConfig, RingConfig, StateManager};

const SNAPSHOT_BYTES: usize = 64 * 1024;

fn bench_config() -> CacheConfig {
    CacheConfig {
        current: RingConfig::new(32 * 1024 * 1024, 2),
        recent: RingConfig::new(16 * 1024 * 1024, 16),
        gap: RingConfig::new(8 * 1024 * 1024, 1),
        ancient_interval: 500,
    }
}

fn populated(frames: u32) -> StateManager {
    let mut cache = StateManager::new(bench_config(), Box::new(|_| false));
    cache.engage(&[0u8; SNAPSHOT_BYTES]);
    let payload = vec![0u8; SNAPSHOT_BYTES];
    for frame in 1..=frames {
        let mut source = |sink: &mut dyn Write| sink.write_all(&payload);
        cache.capture(frame, &mut source, false).unwrap();
    }
    cache
}

fn bench_capture_throughput(c: &mut Criterion) {
    let mut cache = StateManager::new(bench_config(), Box::new(|_| false));
    cache.engage(&[0u8; SNAPSHOT_BYTES]);
    let payload = vec![0u8; SNAPSHOT_BYTES];
    let mut frame = 0u32;

    c.bench_function("capture_64k_snapshot", |b| {
        b.iter(|| {
            frame += 2;
            let mut source = |sink: &mut dyn Write| sink.write_all(&payload);
            cache.capture(black_box(frame), &mut source, false).unwrap();
        });
    });
}

fn bench_get_closest(c: &mut Criterion) {
    let cache = populated(4_000);
    let mut query = 0u32;

    c.bench_function("get_closest", |b| {
        b.iter(|| {
            query = (query + 37) % 4_000;
            let state = cache.get_closest(black_box(query)).unwrap();
            black_box(state);
        });
    });
}

fn bench_save(c: &mut Criterion) {
    let cache = populated(1_000);

    c.bench_function("save_history", |b| {
        b.iter(|| {
            let mut blob: Vec<u8> = Vec::new();
            cache.save(&mut blob).unwrap();
            black_box(blob);
        });
    });
}

criterion_group!(
    benches,
    bench_capture_throughput,
    bench_get_closest,
    bench_save
);
criterion_main!(benches);

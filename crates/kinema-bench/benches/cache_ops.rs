//! Criterion benchmarks for scene switching through the cache.

use criterion::{criterion_group, criterion_main, Criterion};
use kinema_bench::{scene_path, scene_rig};

/// Benchmark: switching between two scenes that both stay cached.
fn bench_switch_cached(c: &mut Criterion) {
    let mut runtime = scene_rig(2, 2).unwrap();
    runtime.load_environment(&scene_path(0), None).unwrap();
    runtime.load_environment(&scene_path(1), None).unwrap();
    let paths = [scene_path(0), scene_path(1)];
    let mut next = 0;

    c.bench_function("switch_cached", |b| {
        b.iter(|| {
            runtime.load_environment(&paths[next], None).unwrap();
            next ^= 1;
        });
    });
}

/// Benchmark: cycling three scenes through a two-entry cache, so every
/// switch evicts one scene and loads another.
fn bench_switch_evicting(c: &mut Criterion) {
    let mut runtime = scene_rig(3, 2).unwrap();
    let paths: Vec<String> = (0..3).map(scene_path).collect();
    let mut next = 0;

    c.bench_function("switch_evicting", |b| {
        b.iter(|| {
            runtime.load_environment(&paths[next], None).unwrap();
            next = (next + 1) % paths.len();
        });
    });
}

criterion_group!(benches, bench_switch_cached, bench_switch_evicting);
criterion_main!(benches);

//! Directory emulation benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polypath_core::emulation::{glob_candidates, group_walk, KeyMatcher};
use polypath_core::memory::MemoryClient;
use polypath_core::store::{Listing, ObjectInfo};
use polypath_core::BlockingPath;
use std::sync::Arc;

/// Keys of a tree `fanout` directories wide and `depth` levels deep
fn generate_keys(prefix: &str, fanout: usize, depth: usize, files_per_dir: usize) -> Vec<String> {
    let mut keys = Vec::new();
    let mut dirs = vec![prefix.to_string()];
    for _ in 0..depth {
        let mut next = Vec::new();
        for dir in &dirs {
            for f in 0..files_per_dir {
                keys.push(format!("{}file_{}.dat", dir, f));
            }
            for d in 0..fanout {
                next.push(format!("{}dir_{}/", dir, d));
            }
        }
        dirs = next;
    }
    keys.extend(dirs);
    keys
}

fn listing(keys: &[String]) -> Listing {
    Listing {
        objects: keys
            .iter()
            .map(|key| ObjectInfo {
                key: key.clone(),
                size: 0,
                last_modified: None,
                etag: None,
                metadata: Default::default(),
            })
            .collect(),
        common_prefixes: Vec::new(),
    }
}

/// Benchmark grouping a full listing into walk levels
fn bench_group_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_walk");

    for (fanout, depth) in [(4, 3), (8, 3), (4, 5)] {
        let keys = generate_keys("root/", fanout, depth, 10);
        group.bench_with_input(
            BenchmarkId::new("keys", keys.len()),
            &keys,
            |b, keys| {
                b.iter(|| group_walk("root/", black_box(keys.iter().map(String::as_str))))
            },
        );
    }

    group.finish();
}

/// Benchmark recursive glob matching over a full listing
fn bench_glob(c: &mut Criterion) {
    let mut group = c.benchmark_group("glob");
    let keys = generate_keys("root/", 8, 3, 10);
    let listing = listing(&keys);
    let matcher = KeyMatcher::new("**/file_1*.dat").unwrap();

    group.bench_function("candidates", |b| {
        b.iter(|| glob_candidates("root/", black_box(&listing)))
    });
    group.bench_function("candidates_and_match", |b| {
        b.iter(|| {
            glob_candidates("root/", black_box(&listing))
                .into_iter()
                .filter(|rel| matcher.matches(rel))
                .count()
        })
    });

    group.finish();
}

/// Benchmark a walk through the blocking bridge on an in-memory store
fn bench_memory_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_walk");
    group.sample_size(20);

    let backend: Arc<dyn polypath_core::BlockingBackend> =
        Arc::new(polypath_core::bridge::Blocking::new(
            polypath_core::object::ObjectBackend::new("memory", Arc::new(MemoryClient::new())),
        ));
    let root = BlockingPath::new("memory://bench/root")
        .unwrap()
        .with_client(backend);
    for key in generate_keys("", 4, 3, 5) {
        if key.ends_with('/') {
            root.join(&key).mkdir(true, true).unwrap();
        } else {
            root.join(&key).write_bytes(b"x").unwrap();
        }
    }

    group.bench_function("walk", |b| b.iter(|| root.walk().unwrap().len()));
    group.bench_function("rglob", |b| b.iter(|| root.rglob("*.dat").unwrap().len()));

    group.finish();
}

criterion_group!(benches, bench_group_walk, bench_glob, bench_memory_walk);
criterion_main!(benches);

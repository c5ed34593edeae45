//! Benchmarks for CIDR derivation and ASN cache lookups.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::net::{IpAddr, Ipv4Addr};

use harrier::net::{AsnCache, AsnRecord, range_to_cidr};

fn populate_cache(size: usize) -> AsnCache {
    let cache = AsnCache::new();
    for i in 0..size {
        let first = IpAddr::V4(Ipv4Addr::from((i as u32) << 8));
        let last = IpAddr::V4(Ipv4Addr::from(((i as u32) << 8) | 0xff));
        let prefix = range_to_cidr(first, last).unwrap();
        cache.update(AsnRecord {
            address: first,
            asn: 64512 + i as u32,
            cc: "US".to_string(),
            prefix,
            description: format!("AS{i}"),
        });
    }
    cache
}

fn bench_range_to_cidr(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_to_cidr");

    let aligned = (
        IpAddr::V4(Ipv4Addr::new(10, 20, 30, 0)),
        IpAddr::V4(Ipv4Addr::new(10, 20, 30, 255)),
    );
    group.bench_function("aligned_v4", |b| {
        b.iter(|| range_to_cidr(black_box(aligned.0), black_box(aligned.1)));
    });

    let unaligned = (
        IpAddr::V4(Ipv4Addr::new(10, 20, 30, 7)),
        IpAddr::V4(Ipv4Addr::new(10, 20, 31, 200)),
    );
    group.bench_function("unaligned_v4", |b| {
        b.iter(|| range_to_cidr(black_box(unaligned.0), black_box(unaligned.1)));
    });

    let full = (
        IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
        IpAddr::V4(Ipv4Addr::new(255, 255, 255, 255)),
    );
    group.bench_function("full_space", |b| {
        b.iter(|| range_to_cidr(black_box(full.0), black_box(full.1)));
    });

    group.finish();
}

fn bench_cache_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("asn_cache_lookup");

    for size in &[100usize, 1_000, 10_000] {
        let cache = populate_cache(*size);

        // An address inside one of the populated /24 blocks
        let hit = IpAddr::V4(Ipv4Addr::from(((*size as u32) / 2) << 8 | 5));
        group.bench_with_input(BenchmarkId::new("hit", size), &cache, |b, cache| {
            b.iter(|| cache.lookup(black_box(hit)));
        });

        let miss = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 1));
        group.bench_with_input(BenchmarkId::new("miss", size), &cache, |b, cache| {
            b.iter(|| cache.lookup(black_box(miss)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_range_to_cidr, bench_cache_lookup);
criterion_main!(benches);

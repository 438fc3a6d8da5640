use criterion::{Criterion, criterion_group, criterion_main};
use pdet_geodb::queries::BucketSpec;
use pdet_geodb::schema::{BuildingSource, CollectionKind, check_document, json_to_document};
use serde_json::{Value, json};
use std::hint::black_box;

/// A footprint polygon with `vertices` positions, like the larger Google detections
fn building(vertices: usize) -> Value {
    let ring: Vec<Value> = (0..vertices)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / vertices as f64;
            json!([-75.0 + 0.0001 * angle.cos(), 5.0 + 0.0001 * angle.sin()])
        })
        .chain(std::iter::once(json!([-74.9999, 5.0])))
        .collect();

    json!({
        "muni_code": "19050",
        "geom": { "type": "Polygon", "coordinates": [ring] },
        "area_m2": 84.5,
        "confidence": 0.81,
        "data_source": "Google Open Buildings",
        "created_at": { "$date": "2025-11-10T08:30:00Z" }
    })
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let kind = CollectionKind::Buildings(BuildingSource::Google);
    let small = json_to_document(&building(5)).expect("converts");
    let large = json_to_document(&building(500)).expect("converts");
    let raw = building(500);

    c.bench_function("check_document/5_vertices", |b| {
        b.iter(|| check_document(black_box(kind), black_box(&small)))
    });
    c.bench_function("check_document/500_vertices", |b| {
        b.iter(|| check_document(black_box(kind), black_box(&large)))
    });
    c.bench_function("json_to_document/500_vertices", |b| {
        b.iter(|| json_to_document(black_box(&raw)))
    });

    let spec = BucketSpec::area_distribution();
    let areas: Vec<f64> = (0..10_000).map(|i| f64::from(i) * 1.7).collect();
    c.bench_function("bucket_tally/10k", |b| {
        b.iter(|| spec.tally(black_box(areas.iter().copied())))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

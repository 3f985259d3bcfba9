use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use geo::{Point, Polygon, polygon};
use zonemap::prelude::*;

fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon {
    polygon![
        (x: min_x, y: min_y),
        (x: max_x, y: min_y),
        (x: max_x, y: max_y),
        (x: min_x, y: max_y),
    ]
}

/// One barangay split into a `side` x `side` grid of puroks, with residents
/// spread on a regular lattice.
fn grid_engine(side: u64, residents: u64) -> Engine {
    let _ = env_logger::try_init();
    let extent = 1_000.0;
    let cell = extent / side as f64;
    let mut builder = Engine::builder().zone(Zone::new(
        ZoneId(1),
        "Barangay",
        ZoneLevel::BARANGAY,
        rect(0.0, 0.0, extent, extent),
        None,
    ));

    for row in 0..side {
        for col in 0..side {
            let (x, y) = (col as f64 * cell, row as f64 * cell);
            builder = builder.zone(Zone::new(
                ZoneId(100 + row * side + col),
                format!("Purok {}-{}", row, col),
                ZoneLevel::PUROK,
                rect(x, y, x + cell, y + cell),
                Some(ZoneId(1)),
            ));
        }
    }

    let per_row = (residents as f64).sqrt().ceil() as u64;
    let step = extent / per_row as f64;
    builder
        .residents((0..residents).map(|i| {
            let (r, c) = (i / per_row, i % per_row);
            (ResidentId(i), Point::new(c as f64 * step + 0.5, r as f64 * step + 0.5))
        }))
        .build()
        .unwrap()
}

fn benchmark_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("zone_resolution");

    for side in [4u64, 16, 32] {
        let engine = grid_engine(side, 1_000);
        group.bench_with_input(BenchmarkId::new("resolve_purok", side * side), &side, |b, _| {
            let mut counter = 0u64;
            b.iter(|| {
                let (x, y) = ((counter % 997) as f64, (counter * 7 % 991) as f64);
                let p = Point::new(x + 0.25, y + 0.25);
                counter += 1;
                engine
                    .resolve_zone(black_box(&p), ZoneLevel::PUROK, None)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn benchmark_proximity(c: &mut Criterion) {
    let mut group = c.benchmark_group("proximity");
    let engine = grid_engine(8, 10_000);
    let center = Point::new(500.0, 500.0);

    for k in [1usize, 10, 50] {
        group.bench_with_input(BenchmarkId::new("k_nearest", k), &k, |b, &k| {
            b.iter(|| {
                engine
                    .k_nearest_residents(black_box(&center), k, None)
                    .unwrap()
            })
        });
    }

    for radius in [10.0, 50.0, 100.0] {
        group.bench_with_input(
            BenchmarkId::new("within_radius", radius as u64),
            &radius,
            |b, &radius| {
                b.iter(|| {
                    engine
                        .residents_within_radius(black_box(&center), radius, None)
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}

fn benchmark_mirror_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("resident_mirror");
    let engine = grid_engine(8, 10_000);

    group.bench_function("upsert_moving_resident", |b| {
        let mut counter = 0u64;
        b.iter(|| {
            let id = ResidentId(counter % 10_000);
            let p = Point::new((counter % 1_000) as f64, (counter / 1_000 % 1_000) as f64);
            counter += 1;
            engine.upsert_resident_location(black_box(id), p).unwrap()
        })
    });

    group.bench_function("upsert_batch_100", |b| {
        let mut counter = 0u64;
        b.iter(|| {
            let start = counter;
            engine
                .upsert_resident_locations((0..100u64).map(|i| {
                    let id = ResidentId(20_000 + (start + i) % 5_000);
                    (id, Point::new(i as f64 * 9.0, (start % 1_000) as f64))
                }))
                .unwrap();
            counter += 100;
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_resolution,
    benchmark_proximity,
    benchmark_mirror_updates
);
criterion_main!(benches);

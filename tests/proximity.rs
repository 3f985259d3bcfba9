use rstar::primitives::GeomWithData;
use std::time::Instant;
use zonemap::prelude::*;

const EPS: f64 = 1e-9;

/// Deterministic pseudo-random points so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    fn point(&mut self, extent: f64) -> Point {
        Point::new(self.next_f64() * extent, self.next_f64() * extent)
    }
}

fn residents(n: u64, seed: u64) -> Vec<(ResidentId, Point)> {
    let mut rng = Lcg(seed);
    (0..n).map(|i| (ResidentId(i), rng.point(1_000.0))).collect()
}

fn populated(n: u64) -> (Engine, Vec<(ResidentId, Point)>) {
    let people = residents(n, 42);
    let engine = Engine::builder()
        .config(Config::default().with_index(IndexConfig::default().with_max_entries(16)))
        .residents(people.clone())
        .build()
        .unwrap();
    (engine, people)
}

fn brute_force(people: &[(ResidentId, Point)], query: &Point) -> Vec<(ResidentId, f64)> {
    let mut all: Vec<(ResidentId, f64)> = people
        .iter()
        .map(|(id, p)| (*id, ((p.x() - query.x()).powi(2) + (p.y() - query.y()).powi(2)).sqrt()))
        .collect();
    all.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    all
}

#[test]
fn test_k_nearest_matches_brute_force() {
    let (engine, people) = populated(10_000);
    let mut rng = Lcg(7);

    for _ in 0..50 {
        let query = rng.point(1_000.0);
        let hits = engine.k_nearest_residents(&query, 5, None).unwrap();
        let expected = brute_force(&people, &query);

        assert_eq!(hits.len(), 5);
        for (hit, (_, d)) in hits.iter().zip(expected.iter()) {
            assert!((hit.distance - d).abs() <= EPS, "{} vs {}", hit.distance, d);
        }
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }
}

#[test]
fn test_k_nearest_agrees_with_rstar() {
    let (engine, people) = populated(10_000);
    let oracle = rstar::RTree::bulk_load(
        people
            .iter()
            .map(|(id, p)| GeomWithData::new([p.x(), p.y()], id.0))
            .collect::<Vec<_>>(),
    );

    let mut rng = Lcg(99);
    for _ in 0..50 {
        let query = rng.point(1_200.0);
        let hits = engine.k_nearest_residents(&query, 8, None).unwrap();
        let theirs: Vec<f64> = oracle
            .nearest_neighbor_iter(&[query.x(), query.y()])
            .take(8)
            .map(|g| {
                let [x, y] = *g.geom();
                ((x - query.x()).powi(2) + (y - query.y()).powi(2)).sqrt()
            })
            .collect();

        assert_eq!(hits.len(), theirs.len());
        for (hit, d) in hits.iter().zip(&theirs) {
            assert!((hit.distance - d).abs() <= EPS);
        }
    }
}

#[test]
fn test_k_larger_than_population() {
    let (engine, _) = populated(3);
    let hits = engine
        .k_nearest_residents(&Point::new(0.0, 0.0), 10, None)
        .unwrap();
    assert_eq!(hits.len(), 3);
    assert!(engine
        .k_nearest_residents(&Point::new(0.0, 0.0), 0, None)
        .unwrap()
        .is_empty());
}

#[test]
fn test_within_radius_matches_brute_force() {
    let (engine, people) = populated(5_000);
    let mut rng = Lcg(3);

    for radius in [0.0, 5.0, 25.0, 80.0] {
        let query = rng.point(1_000.0);
        let hits = engine
            .residents_within_radius(&query, radius, None)
            .unwrap();
        let expected: Vec<ResidentId> = brute_force(&people, &query)
            .into_iter()
            .take_while(|(_, d)| *d <= radius)
            .map(|(id, _)| id)
            .collect();

        let got: Vec<ResidentId> = hits.iter().map(|h| h.resident_id).collect();
        assert_eq!(got, expected, "radius {}", radius);
    }

    assert!(matches!(
        engine.residents_within_radius(&Point::new(0.0, 0.0), -1.0, None),
        Err(GisError::InvalidInput(_))
    ));
}

#[test]
fn test_insert_then_remove_leaves_queries_unchanged() {
    let (engine, _) = populated(2_000);
    let query = Point::new(500.0, 500.0);
    let area = BoundingBox2D::new(400.0, 400.0, 600.0, 600.0);

    let range_before = engine.query_range(&area, None).unwrap().len();
    let knn_before = engine.k_nearest_residents(&query, 10, None).unwrap();

    let extra: Vec<(ResidentId, Point)> = (0..200u64)
        .map(|i| {
            let at = Point::new(450.0 + (i % 20) as f64, 450.0 + (i / 20) as f64);
            (ResidentId(100_000 + i), at)
        })
        .collect();
    engine.upsert_resident_locations(extra.clone()).unwrap();
    assert_eq!(engine.query_range(&area, None).unwrap().len(), range_before + 200);

    for (id, _) in &extra {
        engine.remove_resident_location(*id).unwrap();
    }

    assert_eq!(engine.query_range(&area, None).unwrap().len(), range_before);
    assert_eq!(engine.k_nearest_residents(&query, 10, None).unwrap(), knn_before);
    assert!(!engine.verify_index().unwrap());
}

#[test]
fn test_moved_resident_is_found_at_new_point() {
    let (engine, _) = populated(1_000);
    engine
        .upsert_resident_location(ResidentId(5), Point::new(-50.0, -50.0))
        .unwrap();

    let nearest = engine
        .k_nearest_residents(&Point::new(-50.0, -50.0), 1, None)
        .unwrap();
    assert_eq!(nearest[0].resident_id, ResidentId(5));
    assert!(nearest[0].distance <= EPS);
    assert_eq!(engine.stats().unwrap().residents, 1_000);
}

#[test]
fn test_cancelled_and_expired_queries_are_interrupted() {
    let (engine, _) = populated(2_000);
    let query = Point::new(100.0, 100.0);

    let cancelled = CancelSignal::new();
    cancelled.cancel();
    let err = engine
        .k_nearest_residents(&query, 5, Some(&cancelled))
        .unwrap_err();
    assert!(err.is_interrupted());
    assert!(matches!(err, GisError::Cancelled));

    let expired = CancelSignal::with_deadline(Instant::now());
    let err = engine
        .residents_within_radius(&query, 50.0, Some(&expired))
        .unwrap_err();
    assert!(matches!(err, GisError::DeadlineExceeded));

    let err = engine
        .resolve_zone_with(&query, ZoneLevel::BARANGAY, None, Some(&cancelled))
        .unwrap_err();
    assert!(err.is_interrupted());
}

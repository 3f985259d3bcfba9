use geo::{Point, Polygon, polygon};
use zonemap::compute::geometry::polygons_overlap;
use zonemap::prelude::*;
use zonemap::{AuditAction, IntegrityError, IntegrityKind, MemoryAuditSink, Tolerance};
use std::sync::Arc;

fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon {
    polygon![
        (x: min_x, y: min_y),
        (x: max_x, y: min_y),
        (x: max_x, y: max_y),
        (x: min_x, y: max_y),
    ]
}

fn clerk() -> ActorId {
    ActorId::new("clerk-integration")
}

/// Barangay 0..100 square split at x=50 into two puroks.
fn split_barangay() -> Engine {
    Engine::builder()
        .zone(Zone::new(
            ZoneId(1),
            "San Isidro",
            ZoneLevel::BARANGAY,
            rect(0.0, 0.0, 100.0, 100.0),
            None,
        ))
        .zone(Zone::new(
            ZoneId(11),
            "Purok 1",
            ZoneLevel::PUROK,
            rect(0.0, 0.0, 50.0, 100.0),
            Some(ZoneId(1)),
        ))
        .zone(Zone::new(
            ZoneId(12),
            "Purok 2",
            ZoneLevel::PUROK,
            rect(50.0, 0.0, 100.0, 100.0),
            Some(ZoneId(1)),
        ))
        .build()
        .unwrap()
}

#[test]
fn test_split_square_scenario() {
    let engine = split_barangay();

    let west = engine
        .resolve_zone(&Point::new(25.0, 25.0), ZoneLevel::PUROK, None)
        .unwrap();
    assert_eq!(west.zone(), Some(ZoneId(11)));

    let edge = engine
        .resolve_zone(&Point::new(50.0, 50.0), ZoneLevel::PUROK, None)
        .unwrap();
    assert!(!edge.is_ambiguous());
    assert!(matches!(edge.zone(), Some(ZoneId(11)) | Some(ZoneId(12))));

    let outside = engine
        .resolve_zone(&Point::new(150.0, 50.0), ZoneLevel::PUROK, None)
        .unwrap();
    assert!(outside.is_unassigned());
}

#[test]
fn test_shared_edge_never_flaps() {
    let engine = split_barangay();
    let first = engine
        .resolve_zone(&Point::new(50.0, 12.5), ZoneLevel::PUROK, None)
        .unwrap()
        .zone();
    assert!(first.is_some());

    for _ in 0..100 {
        let again = engine
            .resolve_zone(&Point::new(50.0, 12.5), ZoneLevel::PUROK, None)
            .unwrap()
            .zone();
        assert_eq!(again, first);
    }
}

#[test]
fn test_purok_past_parent_is_not_contained() {
    let engine = split_barangay();
    engine
        .remove_zone(ZoneId(12), &clerk(), CommitOptions::default())
        .unwrap();

    let wide = Zone::new(
        ZoneId(12),
        "Purok 2",
        ZoneLevel::PUROK,
        rect(50.0, 0.0, 110.0, 100.0),
        Some(ZoneId(1)),
    );
    let err = engine
        .commit_zone(wide, &clerk(), CommitOptions::default())
        .unwrap_err();
    assert_eq!(err.integrity_kind(), Some(IntegrityKind::NotContained));
    assert!(matches!(
        err,
        GisError::Integrity(IntegrityError::NotContained {
            zone: ZoneId(12),
            parent: ZoneId(1)
        })
    ));
}

#[test]
fn test_points_strictly_inside_resolve_to_their_zone() {
    let engine = Engine::builder().build().unwrap();
    let opts = CommitOptions::default();
    engine
        .commit_zone(
            Zone::new(
                ZoneId(1),
                "Root",
                ZoneLevel::BARANGAY,
                rect(0.0, 0.0, 90.0, 90.0),
                None,
            ),
            &clerk(),
            opts,
        )
        .unwrap();

    // 3x3 grid of puroks, each 30x30
    for row in 0..3 {
        for col in 0..3 {
            let id = ZoneId(100 + row * 3 + col);
            let (x, y) = (col as f64 * 30.0, row as f64 * 30.0);
            engine
                .commit_zone(
                    Zone::new(
                        id,
                        format!("Purok {}", id.0),
                        ZoneLevel::PUROK,
                        rect(x, y, x + 30.0, y + 30.0),
                        Some(ZoneId(1)),
                    ),
                    &clerk(),
                    opts,
                )
                .unwrap();
        }
    }

    for zone in engine.zones_at_level(ZoneLevel::PUROK).unwrap() {
        let bbox = zonemap::compute::geometry::bounding_box(zone.polygon()).unwrap();
        for i in 1..10 {
            for j in 1..10 {
                let p = Point::new(
                    bbox.min_x() + bbox.width() * i as f64 / 10.0,
                    bbox.min_y() + bbox.height() * j as f64 / 10.0,
                );
                let r = engine.resolve_zone(&p, ZoneLevel::PUROK, None).unwrap();
                assert_eq!(
                    r.outcome,
                    ZoneMatch::Resolved {
                        zone: zone.id,
                        position: Position::Inside
                    }
                );
            }
        }
    }

    // committed siblings never overlap
    let puroks = engine.children_of(ZoneId(1)).unwrap();
    for (i, a) in puroks.iter().enumerate() {
        for b in &puroks[i + 1..] {
            assert!(!polygons_overlap(a.polygon(), b.polygon(), Tolerance::default()));
        }
    }
}

#[test]
fn test_recommit_same_polygon_is_idempotent() {
    let engine = split_barangay();
    let probes = [
        Point::new(10.0, 10.0),
        Point::new(75.0, 80.0),
        Point::new(50.0, 50.0),
        Point::new(120.0, 5.0),
    ];
    let before: Vec<Option<ZoneId>> = probes
        .iter()
        .map(|p| engine.resolve_zone(p, ZoneLevel::PUROK, None).unwrap().zone())
        .collect();

    let same = Zone::new(
        ZoneId(11),
        "Purok 1",
        ZoneLevel::PUROK,
        rect(0.0, 0.0, 50.0, 100.0),
        Some(ZoneId(1)),
    );
    let v1 = engine
        .commit_zone(same.clone(), &clerk(), CommitOptions::default())
        .unwrap();
    let v2 = engine
        .commit_zone(same, &clerk(), CommitOptions::default())
        .unwrap();
    assert_eq!(v2, v1.next());

    let after: Vec<Option<ZoneId>> = probes
        .iter()
        .map(|p| engine.resolve_zone(p, ZoneLevel::PUROK, None).unwrap().zone())
        .collect();
    assert_eq!(before, after);
    assert_eq!(engine.stats().unwrap().zones, 3);
}

#[test]
fn test_moving_a_boundary_between_siblings() {
    let sink = Arc::new(MemoryAuditSink::new());
    let engine = Engine::builder()
        .audit_sink(sink.clone())
        .zone(Zone::new(
            ZoneId(1),
            "Root",
            ZoneLevel::BARANGAY,
            rect(0.0, 0.0, 100.0, 100.0),
            None,
        ))
        .zone(Zone::new(
            ZoneId(11),
            "West",
            ZoneLevel::PUROK,
            rect(0.0, 0.0, 40.0, 100.0),
            Some(ZoneId(1)),
        ))
        .zone(Zone::new(
            ZoneId(12),
            "East",
            ZoneLevel::PUROK,
            rect(60.0, 0.0, 100.0, 100.0),
            Some(ZoneId(1)),
        ))
        .resident(ResidentId(1), Point::new(30.0, 50.0))
        .build()
        .unwrap();

    // East grows first, so the later West shrink hands the resident over
    let east = Zone::new(
        ZoneId(12),
        "East",
        ZoneLevel::PUROK,
        rect(20.0, 0.0, 100.0, 100.0),
        Some(ZoneId(1)),
    );
    assert!(matches!(
        engine.commit_zone(east, &clerk(), CommitOptions::default()),
        Err(GisError::Integrity(IntegrityError::Overlap { sibling: ZoneId(11), .. }))
    ));

    let west = Zone::new(
        ZoneId(11),
        "West",
        ZoneLevel::PUROK,
        rect(0.0, 0.0, 20.0, 100.0),
        Some(ZoneId(1)),
    );
    let err = engine
        .commit_zone(west.clone(), &clerk(), CommitOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        GisError::Integrity(IntegrityError::OrphanRisk { count: 1, .. })
    ));

    engine
        .commit_zone(west, &clerk(), CommitOptions::allow_reassignment())
        .unwrap();
    let east = Zone::new(
        ZoneId(12),
        "East",
        ZoneLevel::PUROK,
        rect(20.0, 0.0, 100.0, 100.0),
        Some(ZoneId(1)),
    );
    let version = engine
        .commit_zone(east, &clerk(), CommitOptions::default())
        .unwrap();

    let r = engine
        .resident_zone(ResidentId(1), ZoneLevel::PUROK, None)
        .unwrap();
    assert_eq!(r.zone(), Some(ZoneId(12)));
    assert_eq!(r.version, version);

    let commits = sink
        .events()
        .iter()
        .filter(|e| e.action == AuditAction::CommitZone)
        .count();
    assert_eq!(commits, 2);
    assert!(sink.events().iter().all(|e| e.actor == clerk()));
}

#[test]
fn test_holes_are_outside() {
    let donut = Polygon::new(
        rect(0.0, 0.0, 100.0, 100.0).exterior().clone(),
        vec![rect(40.0, 40.0, 60.0, 60.0).exterior().clone()],
    );
    let engine = Engine::builder()
        .zone(Zone::new(ZoneId(1), "Ring", ZoneLevel::BARANGAY, donut, None))
        .build()
        .unwrap();

    assert!(engine
        .resolve_zone(&Point::new(50.0, 50.0), ZoneLevel::BARANGAY, None)
        .unwrap()
        .is_unassigned());
    assert_eq!(
        engine
            .resolve_zone(&Point::new(10.0, 50.0), ZoneLevel::BARANGAY, None)
            .unwrap()
            .zone(),
        Some(ZoneId(1))
    );
}

#[test]
fn test_purok_around_an_enclave() {
    let with_hole = |hole: Polygon| {
        Polygon::new(
            rect(0.0, 0.0, 100.0, 100.0).exterior().clone(),
            vec![hole.exterior().clone()],
        )
    };
    let barangay = Zone::new(
        ZoneId(1),
        "San Isidro",
        ZoneLevel::BARANGAY,
        with_hole(rect(40.0, 40.0, 60.0, 60.0)),
        None,
    );
    let engine = Engine::builder().zone(barangay.clone()).build().unwrap();

    // same outline and enclave as the barangay
    let purok = Zone::new(
        ZoneId(2),
        "Purok 1",
        ZoneLevel::PUROK,
        with_hole(rect(40.0, 40.0, 60.0, 60.0)),
        Some(ZoneId(1)),
    );
    engine
        .commit_zone(purok, &clerk(), CommitOptions::default())
        .unwrap();

    // the barangay can be recommitted around its holed child
    engine
        .commit_zone(barangay, &clerk(), CommitOptions::default())
        .unwrap();

    // a purok that fills part of the enclave is still refused
    let filled = Zone::new(
        ZoneId(2),
        "Purok 1",
        ZoneLevel::PUROK,
        with_hole(rect(45.0, 45.0, 55.0, 55.0)),
        Some(ZoneId(1)),
    );
    let err = engine
        .commit_zone(filled, &clerk(), CommitOptions::default())
        .unwrap_err();
    assert_eq!(err.integrity_kind(), Some(IntegrityKind::NotContained));

    let inside = engine
        .resolve_zone(&Point::new(10.0, 10.0), ZoneLevel::PUROK, None)
        .unwrap();
    assert_eq!(inside.zone(), Some(ZoneId(2)));
    assert!(engine
        .resolve_zone(&Point::new(50.0, 50.0), ZoneLevel::PUROK, None)
        .unwrap()
        .is_unassigned());
}

#[test]
fn test_non_finite_query_point_rejected() {
    let engine = split_barangay();
    assert!(matches!(
        engine.resolve_zone(&Point::new(f64::NAN, 1.0), ZoneLevel::PUROK, None),
        Err(GisError::Geometry(_))
    ));
}

#[cfg(feature = "geojson")]
#[test]
fn test_bulk_load_from_geojson() {
    let json = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"id": 2, "name": "Purok 1", "level": 1, "parent_id": 1},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0,0],[50,0],[50,100],[0,100],[0,0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"id": 1, "name": "San Isidro", "level": 0},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0,0],[100,0],[100,100],[0,100],[0,0]]]
                }
            }
        ]
    }"#;

    let engine = Engine::builder().geojson_zones(json).unwrap().build().unwrap();
    let r = engine
        .resolve_zone(&Point::new(10.0, 10.0), ZoneLevel::PUROK, None)
        .unwrap();
    assert_eq!(r.zone(), Some(ZoneId(2)));

    let exported = zonemap::geojson::zones_to_feature_collection(
        engine.zones_at_level(ZoneLevel::PUROK).unwrap().iter().map(|z| z.as_ref()),
    )
    .unwrap();
    assert!(exported.contains("Purok 1"));
}

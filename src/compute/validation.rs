//! Validation for planar coordinates and zone polygons.

use crate::compute::geometry::{
    Tolerance, distinct_vertices, polygon_contains, polygons_overlap, ring_area,
    ring_self_intersection,
};
use crate::error::GeometryError;
use geo::{Coord, LineString, Point, Polygon};
use zonemap_types::bbox::BoundingBox2D;

fn validate_coord(coord: &Coord, envelope: Option<&BoundingBox2D>) -> Result<(), GeometryError> {
    let (x, y) = (coord.x, coord.y);
    if !x.is_finite() || !y.is_finite() {
        return Err(GeometryError::NonFiniteCoordinate { x, y });
    }
    if let Some(envelope) = envelope
        && !envelope.contains_point(&Point::new(x, y))
    {
        return Err(GeometryError::OutsideEnvelope { x, y });
    }
    Ok(())
}

/// Validates a point is finite and, when an envelope is given, inside it.
///
/// # Examples
///
/// ```
/// use geo::Point;
/// use zonemap::compute::validation::validate_point;
/// use zonemap_types::bbox::BoundingBox2D;
///
/// let municipality = BoundingBox2D::new(0.0, 0.0, 1000.0, 1000.0);
/// assert!(validate_point(&Point::new(10.0, 10.0), Some(&municipality)).is_ok());
/// assert!(validate_point(&Point::new(1500.0, 10.0), Some(&municipality)).is_err());
/// assert!(validate_point(&Point::new(f64::NAN, 10.0), None).is_err());
/// ```
pub fn validate_point(
    point: &Point,
    envelope: Option<&BoundingBox2D>,
) -> Result<(), GeometryError> {
    validate_coord(&point.0, envelope)
}

fn validate_ring(
    ring: &LineString,
    index: usize,
    tol: Tolerance,
    envelope: Option<&BoundingBox2D>,
) -> Result<Vec<Coord>, GeometryError> {
    for coord in ring.coords() {
        validate_coord(coord, envelope)?;
    }

    let vertices = distinct_vertices(ring, tol);
    if vertices.len() < 3 {
        return Err(GeometryError::TooFewVertices {
            ring: index,
            found: vertices.len(),
        });
    }

    if ring_area(&vertices) <= tol.epsilon() * tol.epsilon() {
        return Err(GeometryError::ZeroArea { ring: index });
    }

    if let Some(at) = ring_self_intersection(&vertices, tol) {
        return Err(GeometryError::SelfIntersection {
            ring: index,
            x: at.x,
            y: at.y,
        });
    }

    Ok(vertices)
}

/// Validates a zone polygon: finite coordinates, simple rings with positive
/// area, and holes that sit inside the exterior without overlapping.
///
/// Ring 0 is the exterior; holes are numbered from 1 in error reports.
///
/// # Examples
///
/// ```
/// use geo::polygon;
/// use zonemap::compute::geometry::Tolerance;
/// use zonemap::compute::validation::validate_polygon;
///
/// let bowtie = polygon![
///     (x: 0.0, y: 0.0),
///     (x: 10.0, y: 10.0),
///     (x: 10.0, y: 0.0),
///     (x: 0.0, y: 10.0),
/// ];
/// assert!(validate_polygon(&bowtie, Tolerance::default(), None).is_err());
/// ```
pub fn validate_polygon(
    polygon: &Polygon,
    tol: Tolerance,
    envelope: Option<&BoundingBox2D>,
) -> Result<(), GeometryError> {
    validate_ring(polygon.exterior(), 0, tol, envelope)?;

    let shell = Polygon::new(polygon.exterior().clone(), vec![]);
    let mut holes: Vec<Polygon> = Vec::with_capacity(polygon.interiors().len());

    for (idx, interior) in polygon.interiors().iter().enumerate() {
        validate_ring(interior, idx + 1, tol, envelope)?;

        let hole = Polygon::new(interior.clone(), vec![]);
        if !polygon_contains(&shell, &hole, tol) {
            return Err(GeometryError::HoleOutsideShell { hole: idx + 1 });
        }
        if let Some(other) = holes.iter().position(|h| polygons_overlap(h, &hole, tol)) {
            return Err(GeometryError::SelfIntersection {
                ring: idx + 1,
                x: holes[other].exterior().0[0].x,
                y: holes[other].exterior().0[0].y,
            });
        }
        holes.push(hole);
    }

    Ok(())
}

//! Compute layer: geometry predicates, input validation and spatial indexing.
//!
//! Everything here is free of engine state. The engine modules combine these
//! pieces with locking, versioning and the resident mirror.

pub mod geometry;
pub mod spatial;
pub mod validation;

pub use geometry::{
    Position, Tolerance, bounding_box, distance, point_in_polygon, polygon_contains,
    polygons_overlap,
};
pub use validation::{validate_point, validate_polygon};

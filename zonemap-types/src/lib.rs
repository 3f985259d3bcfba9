//! # zonemap-types
//!
//! Core value types for the zonemap engine.
//!
//! - **Envelopes**: `BoundingBox2D`
//! - **Hierarchy**: `Zone`, `ZoneId`, `ZoneLevel`
//! - **Residents**: `ResidentLocation`, `ResidentId`
//! - **Versioning**: `BoundaryVersion`
//! - **Audit**: `ActorId`
//!
//! All types are serializable with Serde and built on top of the `geo` crate's
//! geometric primitives. Coordinates are planar (a local projected system),
//! not longitude/latitude.
//!
//! ## Examples
//!
//! ```rust
//! use zonemap_types::bbox::BoundingBox2D;
//! use geo::Point;
//!
//! let municipality = BoundingBox2D::new(0.0, 0.0, 5000.0, 5000.0);
//! assert!(municipality.contains_point(&Point::new(1200.0, 300.0)));
//! ```

pub mod actor;
pub mod bbox;
pub mod resident;
pub mod version;
pub mod zone;

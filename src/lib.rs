//! In-memory zone resolution engine for barangay civic records.
//!
//! Keeps administrative boundary polygons and resident locations in a shared
//! R-tree and answers which zone a point belongs to, who lives near a point,
//! and whether a proposed boundary keeps the hierarchy consistent.
//!
//! ```rust
//! use geo::{Point, polygon};
//! use zonemap::prelude::*;
//!
//! let engine = Engine::builder()
//!     .zone(Zone::new(
//!         ZoneId(1),
//!         "San Isidro",
//!         ZoneLevel::BARANGAY,
//!         polygon![
//!             (x: 0.0, y: 0.0),
//!             (x: 100.0, y: 0.0),
//!             (x: 100.0, y: 100.0),
//!             (x: 0.0, y: 100.0),
//!         ],
//!         None,
//!     ))
//!     .resident(ResidentId(7), Point::new(12.0, 40.0))
//!     .build()?;
//!
//! let here = engine.resolve_zone(&Point::new(50.0, 50.0), ZoneLevel::BARANGAY, None)?;
//! assert_eq!(here.zone(), Some(ZoneId(1)));
//!
//! let near = engine.k_nearest_residents(&Point::new(10.0, 40.0), 1, None)?;
//! assert_eq!(near[0].resident_id, ResidentId(7));
//! # Ok::<(), zonemap::GisError>(())
//! ```

pub mod audit;
pub mod builder;
pub mod cancel;
pub mod compute;
pub mod config;
pub mod engine;
pub mod error;

#[cfg(feature = "geojson")]
pub mod geojson;

pub use audit::{AuditAction, AuditEvent, AuditSink, LogAuditSink, MemoryAuditSink};
pub use builder::EngineBuilder;
pub use cancel::CancelSignal;
pub use config::{Config, DEFAULT_EPSILON, IndexConfig};
pub use engine::{
    CommitOptions, Engine, EngineStats, Nearby, ResidentHit, Resolution, ZoneMatch,
};
pub use error::{
    GeometryError, GisError, IndexCorruption, IntegrityError, IntegrityKind, Result,
};

pub use compute::geometry::{Position, Tolerance};
pub use compute::spatial::{EntryKind, IndexEntry, IndexRef, IndexStats};

pub use geo::{Point, Polygon};

pub use zonemap_types::actor::ActorId;
pub use zonemap_types::bbox::BoundingBox2D;
pub use zonemap_types::resident::{ResidentId, ResidentLocation};
pub use zonemap_types::version::BoundaryVersion;
pub use zonemap_types::zone::{Zone, ZoneId, ZoneLevel};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Engine, EngineBuilder, GisError, Result};

    pub use crate::{CancelSignal, CommitOptions, Config, IndexConfig, Nearby};

    pub use crate::{Position, Resolution, ResidentHit, ZoneMatch};

    pub use crate::{
        ActorId, BoundaryVersion, BoundingBox2D, ResidentId, ResidentLocation, Zone, ZoneId,
        ZoneLevel,
    };

    pub use geo::{Point, Polygon};
}

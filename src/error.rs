//! Error types for the zonemap engine.

use thiserror::Error;
use zonemap_types::resident::ResidentId;
use zonemap_types::zone::{ZoneId, ZoneLevel};

pub type Result<T> = std::result::Result<T, GisError>;

/// Malformed geometry. Rejected at input validation, never stored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("ring {ring} has {found} distinct vertices, at least 3 are required")]
    TooFewVertices { ring: usize, found: usize },

    #[error("non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate { x: f64, y: f64 },

    #[error("ring {ring} has zero area")]
    ZeroArea { ring: usize },

    #[error("ring {ring} self-intersects near ({x}, {y})")]
    SelfIntersection { ring: usize, x: f64, y: f64 },

    #[error("hole {hole} is not inside the exterior ring")]
    HoleOutsideShell { hole: usize },

    #[error("coordinate ({x}, {y}) is outside the municipal envelope")]
    OutsideEnvelope { x: f64, y: f64 },
}

/// Category of an [`IntegrityError`], for callers that branch on kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegrityKind {
    Geometry,
    Hierarchy,
    NotContained,
    Overlap,
    OrphanRisk,
}

/// A proposed boundary change that would break the zone hierarchy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityError {
    #[error("invalid polygon: {0}")]
    Geometry(#[from] GeometryError),

    #[error("parent {parent} of {zone} does not exist")]
    MissingParent { zone: ZoneId, parent: ZoneId },

    #[error("{zone} at level {level} must have a parent")]
    ParentRequired { zone: ZoneId, level: ZoneLevel },

    #[error("root {zone} must not declare a parent")]
    RootWithParent { zone: ZoneId },

    #[error("{zone} has level {level} but its parent is at level {parent_level}")]
    LevelMismatch {
        zone: ZoneId,
        level: ZoneLevel,
        parent_level: ZoneLevel,
    },

    #[error("{zone} may only replace its polygon; parent and level are fixed")]
    HierarchyChange { zone: ZoneId },

    #[error("{zone} is not contained in its parent {parent}")]
    NotContained { zone: ZoneId, parent: ZoneId },

    #[error("existing child {child} would no longer be contained in {zone}")]
    ChildNotContained { zone: ZoneId, child: ZoneId },

    #[error("{zone} overlaps sibling {sibling}")]
    Overlap { zone: ZoneId, sibling: ZoneId },

    #[error("{count} resident(s) of {zone} would become unassigned")]
    OrphanRisk {
        zone: ZoneId,
        count: usize,
        sample: Vec<ResidentId>,
    },

    #[error("{zone} still has {count} child zone(s)")]
    HasChildren { zone: ZoneId, count: usize },
}

impl IntegrityError {
    pub fn kind(&self) -> IntegrityKind {
        match self {
            IntegrityError::Geometry(_) => IntegrityKind::Geometry,
            IntegrityError::MissingParent { .. }
            | IntegrityError::ParentRequired { .. }
            | IntegrityError::RootWithParent { .. }
            | IntegrityError::LevelMismatch { .. }
            | IntegrityError::HierarchyChange { .. }
            | IntegrityError::HasChildren { .. } => IntegrityKind::Hierarchy,
            IntegrityError::NotContained { .. } | IntegrityError::ChildNotContained { .. } => {
                IntegrityKind::NotContained
            }
            IntegrityError::Overlap { .. } => IntegrityKind::Overlap,
            IntegrityError::OrphanRisk { .. } => IntegrityKind::OrphanRisk,
        }
    }
}

/// Structural damage found inside a spatial index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("spatial index corrupted: {0}")]
pub struct IndexCorruption(pub String);

#[derive(Debug, Error)]
pub enum GisError {
    #[error("Engine is closed")]
    EngineClosed,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("Integrity violation: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Zone not found: {0}")]
    ZoneNotFound(ZoneId),

    #[error("Resident not found: {0}")]
    ResidentNotFound(ResidentId),

    #[error(transparent)]
    IndexCorrupted(#[from] IndexCorruption),

    #[error("Query cancelled")]
    Cancelled,

    #[error("Query deadline exceeded")]
    DeadlineExceeded,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GisError {
    /// True for cancellation and deadline outcomes, which are not empty results.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, GisError::Cancelled | GisError::DeadlineExceeded)
    }

    pub fn integrity_kind(&self) -> Option<IntegrityKind> {
        match self {
            GisError::Integrity(e) => Some(e.kind()),
            _ => None,
        }
    }
}

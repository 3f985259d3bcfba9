//! Point to zone resolution.
//!
//! Candidates come from the spatial index (zone envelopes covering the
//! point at the requested level) and are confirmed with the exact
//! point-in-polygon test, smallest envelope first.

use crate::cancel::{CancelSignal, checkpoint};
use crate::compute::geometry::{Position, Tolerance, point_in_polygon};
use crate::compute::spatial::{IndexRef, Snapshot};
use crate::engine::boundary_store::Hierarchy;
use crate::error::Result;
use geo::Point;
use smallvec::SmallVec;
use std::sync::Arc;
use zonemap_types::bbox::BoundingBox2D;
use zonemap_types::version::BoundaryVersion;
use zonemap_types::zone::{Zone, ZoneId, ZoneLevel};

/// Outcome of resolving one point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneMatch {
    /// The point lies inside, or on the owned boundary of, exactly one zone.
    Resolved { zone: ZoneId, position: Position },
    /// More than one zone claims the interior point. Signals overlapping
    /// siblings in the data; never resolved by picking one.
    Ambiguous(Vec<ZoneId>),
    /// No zone at the level covers the point.
    Unassigned,
}

/// A [`ZoneMatch`] tagged with the hierarchy version it was computed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: ZoneMatch,
    pub level: ZoneLevel,
    pub version: BoundaryVersion,
    /// The caller's version hint did not match `version`.
    pub stale_hint: bool,
}

impl Resolution {
    pub fn zone(&self) -> Option<ZoneId> {
        match self.outcome {
            ZoneMatch::Resolved { zone, .. } => Some(zone),
            _ => None,
        }
    }

    pub fn is_unassigned(&self) -> bool {
        self.outcome == ZoneMatch::Unassigned
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self.outcome, ZoneMatch::Ambiguous(_))
    }
}

pub struct ZoneResolver<'a> {
    hierarchy: &'a Hierarchy,
    index: &'a Snapshot,
    tol: Tolerance,
}

impl<'a> ZoneResolver<'a> {
    pub fn new(hierarchy: &'a Hierarchy, index: &'a Snapshot, tol: Tolerance) -> Self {
        Self {
            hierarchy,
            index,
            tol,
        }
    }

    /// Zones at `level` whose envelope covers `point`, ordered by envelope
    /// area and then id.
    pub fn candidates(
        &self,
        point: &Point,
        level: ZoneLevel,
        signal: Option<&CancelSignal>,
    ) -> Result<Vec<Arc<Zone>>> {
        let mut found: Vec<(f64, Arc<Zone>)> = self
            .index
            .query_range(&BoundingBox2D::from_point(point).expand(self.tol.epsilon()), signal)?
            .into_iter()
            .filter_map(|entry| match entry.item {
                IndexRef::Zone(id) => self
                    .hierarchy
                    .get(id)
                    .filter(|zone| zone.level == level)
                    .map(|zone| (entry.bbox.area(), Arc::clone(zone))),
                IndexRef::Resident(_) => None,
            })
            .collect();

        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
        Ok(found.into_iter().map(|(_, zone)| zone).collect())
    }

    pub fn resolve(
        &self,
        point: &Point,
        level: ZoneLevel,
        signal: Option<&CancelSignal>,
    ) -> Result<ZoneMatch> {
        let candidates = self.candidates(point, level, signal)?;

        let mut inside: SmallVec<[ZoneId; 2]> = SmallVec::new();
        let mut boundary = None;
        for zone in &candidates {
            checkpoint(signal)?;
            match point_in_polygon(point, zone.polygon(), self.tol) {
                Position::Inside => inside.push(zone.id),
                // First candidate tested owns a shared edge.
                Position::OnBoundary if boundary.is_none() => boundary = Some(zone.id),
                _ => {}
            }
        }

        Ok(match inside.as_slice() {
            [] => match boundary {
                Some(zone) => ZoneMatch::Resolved {
                    zone,
                    position: Position::OnBoundary,
                },
                None => ZoneMatch::Unassigned,
            },
            [zone] => ZoneMatch::Resolved {
                zone: *zone,
                position: Position::Inside,
            },
            many => {
                let mut zones = many.to_vec();
                zones.sort();
                log::warn!(
                    "Point ({}, {}) is inside {} zones at level {}: {:?}",
                    point.x(),
                    point.y(),
                    zones.len(),
                    level,
                    zones
                );
                ZoneMatch::Ambiguous(zones)
            }
        })
    }
}

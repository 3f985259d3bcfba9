//! Resident proximity queries.
//!
//! Both queries use the index as a fast reject and then measure the exact
//! distance to the resident's indexed point. A resident whose envelope falls
//! inside the search square is not necessarily inside the circle. Everything
//! is read from one index snapshot, so a concurrent upsert is either wholly
//! visible or not at all.

use crate::cancel::CancelSignal;
use crate::compute::geometry::{Tolerance, distance};
use crate::compute::spatial::{EntryKind, IndexEntry, IndexRef, Snapshot};
use crate::error::{GisError, Result};
use geo::Point;
use zonemap_types::bbox::BoundingBox2D;
use zonemap_types::resident::ResidentId;

/// A resident and its distance from the query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidentHit {
    pub resident_id: ResidentId,
    pub distance: f64,
}

/// Shape of a proximity query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Nearby {
    /// Every resident within this distance, inclusive.
    Radius(f64),
    /// The `k` closest residents.
    Nearest(usize),
}

pub struct ProximityQuery<'a> {
    index: &'a Snapshot,
    tol: Tolerance,
}

impl<'a> ProximityQuery<'a> {
    pub fn new(index: &'a Snapshot, tol: Tolerance) -> Self {
        Self { index, tol }
    }

    pub fn run(
        &self,
        point: &Point,
        query: Nearby,
        signal: Option<&CancelSignal>,
    ) -> Result<Vec<ResidentHit>> {
        match query {
            Nearby::Radius(radius) => self.within_radius(point, radius, signal),
            Nearby::Nearest(k) => self.k_nearest(point, k, signal),
        }
    }

    /// Resident entries are degenerate boxes around their point.
    fn exact(&self, point: &Point, entry: &IndexEntry) -> Option<(ResidentId, f64)> {
        let IndexRef::Resident(id) = entry.item else {
            return None;
        };
        Some((id, distance(point, &entry.bbox.center())))
    }

    /// Residents within `radius` of `point`, nearest first, ties by id.
    pub fn within_radius(
        &self,
        point: &Point,
        radius: f64,
        signal: Option<&CancelSignal>,
    ) -> Result<Vec<ResidentHit>> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(GisError::InvalidInput(format!(
                "Radius must be finite and non-negative, got {}",
                radius
            )));
        }

        let limit = radius + self.tol.epsilon();
        let mut hits: Vec<ResidentHit> = self
            .index
            .query_range(&BoundingBox2D::around(point, limit), signal)?
            .iter()
            .filter(|e| e.kind() == EntryKind::Resident)
            .filter_map(|e| self.exact(point, e))
            .filter(|(_, d)| *d <= limit)
            .map(|(resident_id, distance)| ResidentHit {
                resident_id,
                distance,
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.resident_id.cmp(&b.resident_id))
        });
        Ok(hits)
    }

    /// The `k` nearest residents in non-decreasing distance, ties by id.
    pub fn k_nearest(
        &self,
        point: &Point,
        k: usize,
        signal: Option<&CancelSignal>,
    ) -> Result<Vec<ResidentHit>> {
        let found = self.index.nearest(
            point,
            k,
            |e| e.kind() == EntryKind::Resident,
            |e| self.exact(point, e).map(|(_, d)| d),
            signal,
        )?;

        Ok(found
            .into_iter()
            .filter_map(|(entry, distance)| match entry.item {
                IndexRef::Resident(resident_id) => Some(ResidentHit {
                    resident_id,
                    distance,
                }),
                IndexRef::Zone(_) => None,
            })
            .collect())
    }
}

//! Gatekeeper for boundary changes.
//!
//! Every zone passes these checks before it reaches the boundary store, in
//! this order, stopping at the first violation:
//!
//! 1. the polygon is simple, finite and has positive area
//! 2. parent, level and root rules of the hierarchy hold
//! 3. a non-root zone lies inside its parent, and a replaced zone still
//!    contains its own children
//! 4. no sibling overlaps it
//! 5. a replacement or removal leaves no resident without a zone, unless
//!    reassignment is explicitly allowed

use crate::compute::geometry::{
    Tolerance, bounding_box, point_in_polygon, polygon_contains, polygons_overlap,
};
use crate::compute::spatial::{EntryKind, IndexRef, Snapshot};
use crate::compute::validation::validate_polygon;
use crate::engine::boundary_store::Hierarchy;
use crate::error::{IntegrityError, Result};
use geo::{Point, Polygon};
use zonemap_types::bbox::BoundingBox2D;
use zonemap_types::resident::ResidentId;
use zonemap_types::zone::Zone;

/// Residents listed in an orphan report.
const ORPHAN_SAMPLE: usize = 10;

/// Caller choices for a boundary change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Accept the change even when residents would be left without a zone.
    pub allow_reassignment: bool,
}

impl CommitOptions {
    pub fn allow_reassignment() -> Self {
        Self {
            allow_reassignment: true,
        }
    }
}

pub struct IntegrityChecker<'a> {
    hierarchy: &'a Hierarchy,
    index: &'a Snapshot,
    tol: Tolerance,
    envelope: Option<&'a BoundingBox2D>,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(
        hierarchy: &'a Hierarchy,
        index: &'a Snapshot,
        tol: Tolerance,
        envelope: Option<&'a BoundingBox2D>,
    ) -> Self {
        Self {
            hierarchy,
            index,
            tol,
            envelope,
        }
    }

    /// Check a new or replacement zone against the hierarchy.
    pub fn validate(&self, candidate: &Zone, options: CommitOptions) -> Result<()> {
        validate_polygon(candidate.polygon(), self.tol, self.envelope)
            .map_err(IntegrityError::from)?;
        self.check_structure(candidate)?;

        if let Some(parent_id) = candidate.parent_id
            && let Some(parent) = self.hierarchy.get(parent_id)
            && !polygon_contains(parent.polygon(), candidate.polygon(), self.tol)
        {
            return Err(IntegrityError::NotContained {
                zone: candidate.id,
                parent: parent_id,
            }
            .into());
        }

        let existing = self.hierarchy.get(candidate.id);
        if existing.is_some() {
            for child in self.hierarchy.children_of(candidate.id) {
                if !polygon_contains(candidate.polygon(), child.polygon(), self.tol) {
                    return Err(IntegrityError::ChildNotContained {
                        zone: candidate.id,
                        child: child.id,
                    }
                    .into());
                }
            }
        }

        for sibling in self.hierarchy.siblings_of(candidate) {
            if polygons_overlap(sibling.polygon(), candidate.polygon(), self.tol) {
                return Err(IntegrityError::Overlap {
                    zone: candidate.id,
                    sibling: sibling.id,
                }
                .into());
            }
        }

        if let Some(existing) = existing
            && !options.allow_reassignment
        {
            self.check_orphans(existing, Some(candidate.polygon()))?;
        }
        Ok(())
    }

    /// Check that `zone` can be dropped from the hierarchy.
    pub fn validate_removal(&self, zone: &Zone, options: CommitOptions) -> Result<()> {
        let children = self.hierarchy.child_ids(zone.id);
        if !children.is_empty() {
            return Err(IntegrityError::HasChildren {
                zone: zone.id,
                count: children.len(),
            }
            .into());
        }
        if !options.allow_reassignment {
            self.check_orphans(zone, None)?;
        }
        Ok(())
    }

    fn check_structure(&self, candidate: &Zone) -> std::result::Result<(), IntegrityError> {
        if let Some(existing) = self.hierarchy.get(candidate.id)
            && (existing.parent_id != candidate.parent_id || existing.level != candidate.level)
        {
            return Err(IntegrityError::HierarchyChange { zone: candidate.id });
        }

        match (candidate.level.is_root(), candidate.parent_id) {
            (true, None) => Ok(()),
            (true, Some(_)) => Err(IntegrityError::RootWithParent { zone: candidate.id }),
            (false, None) => Err(IntegrityError::ParentRequired {
                zone: candidate.id,
                level: candidate.level,
            }),
            (false, Some(parent_id)) => {
                let parent = self.hierarchy.get(parent_id).ok_or(IntegrityError::MissingParent {
                    zone: candidate.id,
                    parent: parent_id,
                })?;
                if parent.level.child() != Some(candidate.level) {
                    return Err(IntegrityError::LevelMismatch {
                        zone: candidate.id,
                        level: candidate.level,
                        parent_level: parent.level,
                    });
                }
                Ok(())
            }
        }
    }

    /// Fail with `OrphanRisk` if [`orphans`](Self::orphans) finds anyone.
    pub fn check_orphans(&self, existing: &Zone, replacement: Option<&Polygon>) -> Result<()> {
        let orphans = self.orphans(existing, replacement)?;
        if orphans.is_empty() {
            return Ok(());
        }
        Err(IntegrityError::OrphanRisk {
            zone: existing.id,
            count: orphans.len(),
            sample: orphans.into_iter().take(ORPHAN_SAMPLE).collect(),
        }
        .into())
    }

    /// Residents covered by `existing` that neither `replacement` nor any
    /// sibling would cover afterwards. Sorted by id.
    pub fn orphans(
        &self,
        existing: &Zone,
        replacement: Option<&Polygon>,
    ) -> Result<Vec<ResidentId>> {
        let Some(bbox) = bounding_box(existing.polygon()) else {
            return Ok(Vec::new());
        };
        let siblings = self.hierarchy.siblings_of(existing);

        let covered_elsewhere = |p: &Point| {
            replacement.is_some_and(|poly| point_in_polygon(p, poly, self.tol).is_covered())
                || siblings.iter().any(|s| {
                    bounding_box(s.polygon())
                        .is_some_and(|b| b.expand(self.tol.epsilon()).contains_point(p))
                        && point_in_polygon(p, s.polygon(), self.tol).is_covered()
                })
        };

        let mut orphans: Vec<ResidentId> = self
            .index
            .query_range(&bbox.expand(self.tol.epsilon()), None)?
            .into_iter()
            .filter(|e| e.kind() == EntryKind::Resident)
            .filter_map(|e| match e.item {
                IndexRef::Resident(id) => Some((id, e.bbox.center())),
                IndexRef::Zone(_) => None,
            })
            .filter(|(_, p)| point_in_polygon(p, existing.polygon(), self.tol).is_covered())
            .filter(|(_, p)| !covered_elsewhere(p))
            .map(|(id, _)| id)
            .collect();
        orphans.sort();
        Ok(orphans)
    }
}

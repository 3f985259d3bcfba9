//! The zone resolution engine.
//!
//! [`Engine`] owns the boundary store, the resident mirror and the shared
//! spatial index, and exposes the calls made by the service layer and by the
//! residents registry. It is built once (see [`EngineBuilder`]) and shared by
//! reference; every method takes `&self`.
//!
//! # Consistency
//!
//! Zone commits are serialised by the boundary store. The index write lock is
//! held while a new hierarchy is published, and readers pair a hierarchy with
//! an index root under the read lock, so a query never sees a zone polygon
//! from one generation with an envelope from another.
//!
//! # Examples
//!
//! ```rust
//! use geo::{Point, polygon};
//! use zonemap::prelude::*;
//!
//! let engine = Engine::builder().build()?;
//! let clerk = ActorId::new("clerk-1");
//!
//! let root = Zone::new(
//!     ZoneId(1),
//!     "San Isidro",
//!     ZoneLevel::BARANGAY,
//!     polygon![
//!         (x: 0.0, y: 0.0),
//!         (x: 100.0, y: 0.0),
//!         (x: 100.0, y: 100.0),
//!         (x: 0.0, y: 100.0),
//!     ],
//!     None,
//! );
//! let version = engine.commit_zone(root, &clerk, CommitOptions::default())?;
//!
//! let here = Point::new(10.0, 10.0);
//! let resolution = engine.resolve_zone(&here, ZoneLevel::BARANGAY, Some(version))?;
//! assert_eq!(resolution.zone(), Some(ZoneId(1)));
//! assert!(!resolution.stale_hint);
//! # Ok::<(), zonemap::GisError>(())
//! ```

pub mod boundary_store;
pub mod index;
pub mod integrity;
pub mod proximity;
pub mod residents;
pub mod resolver;

pub use boundary_store::{BoundaryStore, Hierarchy};
pub use index::SpatialIndex;
pub use integrity::{CommitOptions, IntegrityChecker};
pub use proximity::{Nearby, ProximityQuery, ResidentHit};
pub use residents::ResidentMirror;
pub use resolver::{Resolution, ZoneMatch, ZoneResolver};

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::builder::EngineBuilder;
use crate::cancel::CancelSignal;
use crate::compute::geometry::{Tolerance, bounding_box, point_in_polygon};
use crate::compute::spatial::{EntryKind, IndexEntry, IndexRef, IndexStats, RTree, Snapshot};
use crate::compute::validation::validate_point;
use crate::config::Config;
use crate::error::{GisError, IndexCorruption, Result};
use geo::{Point, Polygon};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use zonemap_types::actor::ActorId;
use zonemap_types::bbox::BoundingBox2D;
use zonemap_types::resident::{ResidentId, ResidentLocation};
use zonemap_types::version::BoundaryVersion;
use zonemap_types::zone::{Zone, ZoneId, ZoneLevel};

/// Counts and index shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStats {
    pub zones: usize,
    pub residents: usize,
    pub boundary_version: BoundaryVersion,
    pub index: IndexStats,
}

/// Hierarchy and index root captured together.
struct View {
    hierarchy: Arc<Hierarchy>,
    index: Snapshot,
}

pub struct Engine {
    config: Config,
    tol: Tolerance,
    store: BoundaryStore,
    residents: ResidentMirror,
    index: SpatialIndex,
    audit: Arc<dyn AuditSink>,
    closed: AtomicBool,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// An empty engine.
    pub fn new(config: Config) -> Result<Self> {
        EngineBuilder::new().config(config).build()
    }

    pub(crate) fn from_parts(
        config: Config,
        hierarchy: Hierarchy,
        residents: ResidentMirror,
        index: SpatialIndex,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            tol: Tolerance::new(config.epsilon),
            config,
            store: BoundaryStore::from_hierarchy(hierarchy),
            residents,
            index,
            audit,
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tol
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(GisError::EngineClosed);
        }
        Ok(())
    }

    fn view(&self) -> View {
        let tree = self.index.read();
        View {
            hierarchy: self.store.snapshot(),
            index: tree.snapshot(),
        }
    }

    fn record(
        &self,
        actor: &ActorId,
        action: AuditAction,
        subject: String,
        version: BoundaryVersion,
    ) {
        self.audit.record(&AuditEvent {
            actor: actor.clone(),
            action,
            subject,
            version,
        });
    }

    /// Entries for every zone in `hierarchy` and every mirrored resident.
    fn authoritative_entries(&self, hierarchy: &Hierarchy) -> Vec<IndexEntry> {
        let mut entries: Vec<IndexEntry> = hierarchy
            .zones()
            .filter_map(|zone| bounding_box(zone.polygon()).map(|b| IndexEntry::zone(zone.id, b)))
            .collect();
        entries.extend(self.residents.index_entries());
        entries
    }

    /// Orphan check against the residents indexed right now. Commits validate
    /// on an earlier snapshot, and resident upserts do not wait for the store
    /// writer, so this runs again under the index write lock before publish.
    fn recheck_orphans(
        &self,
        hierarchy: &Hierarchy,
        tree: &RTree,
        existing: &Zone,
        replacement: Option<&Polygon>,
    ) -> Result<()> {
        let current = tree.snapshot();
        IntegrityChecker::new(hierarchy, &current, self.tol, self.config.envelope.as_ref())
            .check_orphans(existing, replacement)
    }

    /// A structural op found the tree damaged: throw it away and repack.
    fn recover(&self, tree: &mut RTree, hierarchy: &Hierarchy, err: IndexCorruption) {
        log::error!("{}; rebuilding from boundary store and resident mirror", err);
        index::rebuild_from(tree, self.authoritative_entries(hierarchy));
    }

    // ===== Zone resolution =====

    /// Most specific zone at `level` containing `point`.
    ///
    /// `hint` is the boundary version the caller last saw; a mismatch is
    /// flagged on the result rather than treated as an error.
    pub fn resolve_zone(
        &self,
        point: &Point,
        level: ZoneLevel,
        hint: Option<BoundaryVersion>,
    ) -> Result<Resolution> {
        self.resolve_zone_with(point, level, hint, None)
    }

    pub fn resolve_zone_with(
        &self,
        point: &Point,
        level: ZoneLevel,
        hint: Option<BoundaryVersion>,
        signal: Option<&CancelSignal>,
    ) -> Result<Resolution> {
        self.ensure_open()?;
        validate_point(point, None)?;

        let view = self.view();
        let outcome = ZoneResolver::new(&view.hierarchy, &view.index, self.tol)
            .resolve(point, level, signal)?;
        let version = view.hierarchy.version();

        let stale_hint = hint.is_some_and(|h| h != version);
        if stale_hint {
            log::warn!(
                "Resolving against {} but caller expected {:?}",
                version,
                hint
            );
        }
        Ok(Resolution {
            outcome,
            level,
            version,
            stale_hint,
        })
    }

    /// Resolve the mirrored location of a resident.
    pub fn resident_zone(
        &self,
        resident: ResidentId,
        level: ZoneLevel,
        signal: Option<&CancelSignal>,
    ) -> Result<Resolution> {
        self.ensure_open()?;
        let point = self
            .residents
            .point(resident)
            .ok_or(GisError::ResidentNotFound(resident))?;
        self.resolve_zone_with(&point, level, None, signal)
    }

    /// Residents whose point is inside or on the boundary of `zone_id`,
    /// ordered by id.
    pub fn residents_in_zone(
        &self,
        zone_id: ZoneId,
        signal: Option<&CancelSignal>,
    ) -> Result<Vec<ResidentId>> {
        self.ensure_open()?;
        let view = self.view();
        let zone = view
            .hierarchy
            .get(zone_id)
            .ok_or(GisError::ZoneNotFound(zone_id))?;
        let Some(bbox) = bounding_box(zone.polygon()) else {
            return Ok(Vec::new());
        };

        let mut ids: Vec<ResidentId> = view
            .index
            .query_range(&bbox.expand(self.tol.epsilon()), signal)?
            .into_iter()
            .filter_map(|e| match e.item {
                IndexRef::Resident(id) => Some((id, e.bbox.center())),
                IndexRef::Zone(_) => None,
            })
            .filter(|(_, p)| point_in_polygon(p, zone.polygon(), self.tol).is_covered())
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    // ===== Proximity =====

    pub fn residents_near(
        &self,
        point: &Point,
        query: Nearby,
        signal: Option<&CancelSignal>,
    ) -> Result<Vec<ResidentHit>> {
        self.ensure_open()?;
        validate_point(point, None)?;
        let view = self.view();
        ProximityQuery::new(&view.index, self.tol).run(point, query, signal)
    }

    pub fn residents_within_radius(
        &self,
        point: &Point,
        radius: f64,
        signal: Option<&CancelSignal>,
    ) -> Result<Vec<ResidentHit>> {
        self.residents_near(point, Nearby::Radius(radius), signal)
    }

    pub fn k_nearest_residents(
        &self,
        point: &Point,
        k: usize,
        signal: Option<&CancelSignal>,
    ) -> Result<Vec<ResidentHit>> {
        self.residents_near(point, Nearby::Nearest(k), signal)
    }

    /// Raw envelope query over zones and residents.
    pub fn query_range(
        &self,
        bbox: &BoundingBox2D,
        signal: Option<&CancelSignal>,
    ) -> Result<Vec<IndexEntry>> {
        self.ensure_open()?;
        self.view().index.query_range(bbox, signal)
    }

    // ===== Boundary store =====

    pub fn get_zone(&self, id: ZoneId) -> Result<Option<Arc<Zone>>> {
        self.ensure_open()?;
        Ok(self.store.get(id))
    }

    pub fn children_of(&self, id: ZoneId) -> Result<Vec<Arc<Zone>>> {
        self.ensure_open()?;
        Ok(self.store.children_of(id))
    }

    pub fn zones_at_level(&self, level: ZoneLevel) -> Result<Vec<Arc<Zone>>> {
        self.ensure_open()?;
        Ok(self.store.all_at_level(level))
    }

    pub fn boundary_version(&self) -> BoundaryVersion {
        self.store.version()
    }

    /// Run every integrity check without committing.
    pub fn validate_zone(&self, zone: &Zone, options: CommitOptions) -> Result<()> {
        self.ensure_open()?;
        let view = self.view();
        IntegrityChecker::new(
            &view.hierarchy,
            &view.index,
            self.tol,
            self.config.envelope.as_ref(),
        )
        .validate(zone, options)
    }

    /// Create or replace a zone. Nothing changes unless every check passes.
    pub fn commit_zone(
        &self,
        zone: Zone,
        actor: &ActorId,
        options: CommitOptions,
    ) -> Result<BoundaryVersion> {
        self.ensure_open()?;
        let commit = self.store.begin();
        let index = self.index.snapshot();

        let checked = IntegrityChecker::new(
            commit.base(),
            &index,
            self.tol,
            self.config.envelope.as_ref(),
        )
        .validate(&zone, options);
        if let Err(e) = checked {
            log::warn!("Rejected {} from {}: {}", zone.id, actor, e);
            return Err(e);
        }

        let bbox = bounding_box(zone.polygon())
            .ok_or_else(|| GisError::InvalidInput(format!("{} has an empty polygon", zone.id)))?;
        let zone_id = zone.id;
        let replaced = commit.base().contains(zone_id);

        let version = {
            let mut tree = self.index.write();
            if let Some(existing) = commit.base().get(zone_id)
                && !options.allow_reassignment
            {
                self.recheck_orphans(commit.base(), &tree, existing, Some(zone.polygon()))
                    .inspect_err(|e| log::warn!("Rejected {} from {}: {}", zone_id, actor, e))?;
            }

            let mut next = commit.stage();
            next.put(zone);
            if let Err(e) = tree.update(IndexRef::Zone(zone_id), bbox) {
                self.recover(&mut tree, &next, e);
            }
            commit.publish(next)
        };

        log::info!(
            "{} {} at {}",
            if replaced { "Replaced" } else { "Created" },
            zone_id,
            version
        );
        self.record(actor, AuditAction::CommitZone, zone_id.to_string(), version);
        Ok(version)
    }

    /// Drop a childless zone.
    pub fn remove_zone(
        &self,
        zone_id: ZoneId,
        actor: &ActorId,
        options: CommitOptions,
    ) -> Result<BoundaryVersion> {
        self.ensure_open()?;
        let commit = self.store.begin();
        let zone = commit
            .base()
            .get(zone_id)
            .cloned()
            .ok_or(GisError::ZoneNotFound(zone_id))?;
        let index = self.index.snapshot();

        IntegrityChecker::new(commit.base(), &index, self.tol, self.config.envelope.as_ref())
            .validate_removal(&zone, options)?;

        let version = {
            let mut tree = self.index.write();
            if !options.allow_reassignment {
                self.recheck_orphans(commit.base(), &tree, &zone, None)?;
            }

            let mut next = commit.stage();
            next.take(zone_id);
            match tree.remove(&IndexRef::Zone(zone_id)) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    let err = IndexCorruption(format!("{} was never indexed", zone_id));
                    self.recover(&mut tree, &next, err);
                }
                Err(e) => self.recover(&mut tree, &next, e),
            }
            commit.publish(next)
        };

        log::info!("Removed {} at {}", zone_id, version);
        self.record(actor, AuditAction::RemoveZone, zone_id.to_string(), version);
        Ok(version)
    }

    // ===== Resident mirror =====

    pub fn resident_location(&self, id: ResidentId) -> Result<Option<ResidentLocation>> {
        self.ensure_open()?;
        Ok(self.residents.get(id))
    }

    /// Mirror a resident's registered address.
    pub fn upsert_resident_location(
        &self,
        id: ResidentId,
        point: Point,
    ) -> Result<BoundaryVersion> {
        self.upsert_resident_locations([(id, point)])
    }

    /// Mirror many addresses under one index lock. Every point is validated
    /// before any is applied, so a bad point rejects the whole batch.
    pub fn upsert_resident_locations(
        &self,
        batch: impl IntoIterator<Item = (ResidentId, Point)>,
    ) -> Result<BoundaryVersion> {
        self.ensure_open()?;
        let batch: Vec<(ResidentId, Point)> = batch.into_iter().collect();
        for (id, point) in &batch {
            validate_point(point, self.config.envelope.as_ref()).inspect_err(|e| {
                log::warn!("Rejected location for {}: {}", id, e);
            })?;
        }

        let mut tree = self.index.write();
        let version = self.store.version();
        let mut damage = None;
        for (id, point) in &batch {
            self.residents
                .upsert(ResidentLocation::new(*id, *point, version));
            if damage.is_none()
                && let Err(e) = tree.insert(IndexEntry::resident(*id, point))
            {
                damage = Some(e);
            }
        }
        if let Some(e) = damage {
            self.recover(&mut tree, &self.store.snapshot(), e);
        }

        log::debug!("Mirrored {} resident location(s) at {}", batch.len(), version);
        Ok(version)
    }

    /// Forget a resident. Removing an unknown id is a no-op.
    pub fn remove_resident_location(&self, id: ResidentId) -> Result<BoundaryVersion> {
        self.ensure_open()?;
        let mut tree = self.index.write();
        let mirrored = self.residents.remove(id).is_some();

        match tree.remove(&IndexRef::Resident(id)) {
            Ok(Some(_)) => {}
            Ok(None) if !mirrored => log::debug!("{} was not mirrored", id),
            Ok(None) => {
                let err = IndexCorruption(format!("{} was mirrored but never indexed", id));
                self.recover(&mut tree, &self.store.snapshot(), err);
            }
            Err(e) => self.recover(&mut tree, &self.store.snapshot(), e),
        }
        Ok(self.store.version())
    }

    // ===== Maintenance =====

    pub fn stats(&self) -> Result<EngineStats> {
        self.ensure_open()?;
        let tree = self.index.read();
        let hierarchy = self.store.snapshot();
        Ok(EngineStats {
            zones: hierarchy.len(),
            residents: self.residents.len(),
            boundary_version: hierarchy.version(),
            index: tree.stats(),
        })
    }

    /// Repack the index from the boundary store and resident mirror.
    pub fn rebuild_index(&self, actor: &ActorId) -> Result<IndexStats> {
        self.ensure_open()?;
        let stats = {
            let mut tree = self.index.write();
            let entries = self.authoritative_entries(&self.store.snapshot());
            index::rebuild_from(&mut tree, entries);
            tree.stats()
        };
        self.record(actor, AuditAction::RebuildIndex, "index".to_string(), self.store.version());
        Ok(stats)
    }

    /// Check the index structure, rebuilding it if damaged. Returns whether a
    /// rebuild was needed.
    pub fn verify_index(&self) -> Result<bool> {
        self.ensure_open()?;
        let mut tree = self.index.write();
        match tree.check_invariants() {
            Ok(()) => Ok(false),
            Err(e) => {
                self.recover(&mut tree, &self.store.snapshot(), e);
                Ok(true)
            }
        }
    }

    /// Close the engine and release its index, zones and mirror. Later calls
    /// fail with [`GisError::EngineClosed`].
    pub fn shutdown(&self, actor: &ActorId) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(GisError::EngineClosed);
        }
        let version = self.store.version();
        self.index.clear();
        self.residents.clear();
        self.store.clear();

        log::info!("Engine shut down at {}", version);
        self.record(actor, AuditAction::Shutdown, "engine".to_string(), version);
        Ok(())
    }

    /// Number of index entries of each kind, for diagnostics.
    pub fn index_counts(&self) -> Result<(usize, usize)> {
        self.ensure_open()?;
        let entries = self.view().index.entries();
        let zones = entries.iter().filter(|e| e.kind() == EntryKind::Zone).count();
        Ok((zones, entries.len() - zones))
    }
}

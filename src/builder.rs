//! Engine builder and initial bulk load.
//!
//! Zones and resident locations are handed over in one go at startup. Zones
//! are validated parent-first through the same integrity checks as a live
//! commit, then everything is packed into the spatial index in one pass.

use crate::audit::{AuditSink, LogAuditSink};
use crate::compute::geometry::{Tolerance, bounding_box};
use crate::compute::spatial::{IndexEntry, Snapshot};
use crate::compute::validation::validate_point;
use crate::config::Config;
use crate::engine::{
    CommitOptions, Engine, Hierarchy, IntegrityChecker, ResidentMirror, SpatialIndex,
};
use crate::error::{GisError, Result};
use geo::Point;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use zonemap_types::resident::{ResidentId, ResidentLocation};
use zonemap_types::version::BoundaryVersion;
use zonemap_types::zone::Zone;

/// Builder for an [`Engine`] with its initial zones and residents.
pub struct EngineBuilder {
    config: Config,
    zones: Vec<Zone>,
    residents: Vec<(ResidentId, Point)>,
    audit: Arc<dyn AuditSink>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            zones: Vec::new(),
            residents: Vec::new(),
            audit: Arc::new(LogAuditSink),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Where audit events go. Defaults to [`LogAuditSink`].
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn zone(mut self, zone: Zone) -> Self {
        self.zones.push(zone);
        self
    }

    pub fn zones(mut self, zones: impl IntoIterator<Item = Zone>) -> Self {
        self.zones.extend(zones);
        self
    }

    pub fn resident(mut self, id: ResidentId, point: Point) -> Self {
        self.residents.push((id, point));
        self
    }

    /// Later entries for the same resident replace earlier ones.
    pub fn residents(mut self, residents: impl IntoIterator<Item = (ResidentId, Point)>) -> Self {
        self.residents.extend(residents);
        self
    }

    /// Add zones from a GeoJSON `FeatureCollection`.
    #[cfg(feature = "geojson")]
    pub fn geojson_zones(self, json: &str) -> Result<Self> {
        let zones = crate::geojson::zones_from_feature_collection(json)?;
        Ok(self.zones(zones))
    }

    pub fn build(self) -> Result<Engine> {
        self.config.validate().map_err(GisError::InvalidConfig)?;
        let tol = Tolerance::new(self.config.epsilon);
        let envelope = self.config.envelope.as_ref();

        let mut zones = self.zones;
        zones.sort_by_key(|z| (z.level, z.id));
        let mut seen = FxHashSet::default();
        if let Some(dup) = zones.iter().find(|z| !seen.insert(z.id)) {
            return Err(GisError::InvalidInput(format!("{} appears more than once", dup.id)));
        }

        let mut hierarchy = Hierarchy::default();
        let no_residents = Snapshot::default();
        let mut entries = Vec::with_capacity(zones.len() + self.residents.len());
        for zone in zones {
            IntegrityChecker::new(&hierarchy, &no_residents, tol, envelope)
                .validate(&zone, CommitOptions::allow_reassignment())
                .inspect_err(|e| log::warn!("Bulk load rejected {}: {}", zone.id, e))?;
            if let Some(bbox) = bounding_box(zone.polygon()) {
                entries.push(IndexEntry::zone(zone.id, bbox));
            }
            hierarchy.put(zone);
        }

        let mirror = ResidentMirror::new();
        for (id, point) in self.residents {
            validate_point(&point, envelope)
                .inspect_err(|e| log::warn!("Bulk load rejected {}: {}", id, e))?;
            mirror.upsert(ResidentLocation::new(id, point, BoundaryVersion::INITIAL));
        }
        entries.extend(mirror.index_entries());

        let index = SpatialIndex::bulk_load(self.config.index.clone(), entries);
        log::info!(
            "Loaded {} zones and {} residents (index height {})",
            hierarchy.len(),
            mirror.len(),
            index.stats().height
        );

        Ok(Engine::from_parts(self.config, hierarchy, mirror, index, self.audit))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Read-optimized mirror of resident locations.
//!
//! The residents registry owns the records; the engine keeps one point per
//! resident id, replaced on every upsert.

use crate::compute::spatial::IndexEntry;
use dashmap::DashMap;
use geo::Point;
use zonemap_types::resident::{ResidentId, ResidentLocation};

#[derive(Debug, Default)]
pub struct ResidentMirror {
    locations: DashMap<ResidentId, ResidentLocation>,
}

impl ResidentMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn contains(&self, id: ResidentId) -> bool {
        self.locations.contains_key(&id)
    }

    pub fn get(&self, id: ResidentId) -> Option<ResidentLocation> {
        self.locations.get(&id).map(|v| v.clone())
    }

    pub fn point(&self, id: ResidentId) -> Option<Point> {
        self.locations.get(&id).map(|v| v.point)
    }

    /// Store a location, returning the one it replaces.
    pub fn upsert(&self, location: ResidentLocation) -> Option<ResidentLocation> {
        self.locations.insert(location.resident_id, location)
    }

    pub fn remove(&self, id: ResidentId) -> Option<ResidentLocation> {
        self.locations.remove(&id).map(|(_, location)| location)
    }

    /// Index entries for every mirrored resident.
    pub fn index_entries(&self) -> Vec<IndexEntry> {
        self.locations
            .iter()
            .map(|item| IndexEntry::resident(*item.key(), &item.point))
            .collect()
    }

    pub fn clear(&self) {
        self.locations.clear();
        self.locations.shrink_to_fit();
    }
}

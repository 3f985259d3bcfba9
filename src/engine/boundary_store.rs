//! Versioned zone hierarchy.
//!
//! The committed state is an immutable [`Hierarchy`] behind an `Arc`. Readers
//! clone the `Arc` and see either the old or the new hierarchy, never a mix.
//! Writers go through [`BoundaryStore::begin`], which serialises them and
//! publishes a complete replacement with the next [`BoundaryVersion`].

use parking_lot::{Mutex, MutexGuard, RwLock};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use zonemap_types::version::BoundaryVersion;
use zonemap_types::zone::{Zone, ZoneId, ZoneLevel};

/// One committed generation of the zone hierarchy.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    zones: FxHashMap<ZoneId, Arc<Zone>>,
    /// Child ids per parent, kept sorted.
    children: FxHashMap<ZoneId, Vec<ZoneId>>,
    roots: Vec<ZoneId>,
    version: BoundaryVersion,
}

impl Hierarchy {
    pub fn version(&self) -> BoundaryVersion {
        self.version
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn get(&self, id: ZoneId) -> Option<&Arc<Zone>> {
        self.zones.get(&id)
    }

    pub fn contains(&self, id: ZoneId) -> bool {
        self.zones.contains_key(&id)
    }

    pub fn child_ids(&self, id: ZoneId) -> &[ZoneId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Children of `id`, ordered by zone id.
    pub fn children_of(&self, id: ZoneId) -> Vec<Arc<Zone>> {
        self.child_ids(id)
            .iter()
            .filter_map(|child| self.zones.get(child).cloned())
            .collect()
    }

    pub fn roots(&self) -> Vec<Arc<Zone>> {
        self.roots
            .iter()
            .filter_map(|id| self.zones.get(id).cloned())
            .collect()
    }

    /// Every zone at `level`, ordered by zone id.
    pub fn all_at_level(&self, level: ZoneLevel) -> Vec<Arc<Zone>> {
        let mut zones: Vec<Arc<Zone>> = self
            .zones
            .values()
            .filter(|z| z.level == level)
            .cloned()
            .collect();
        zones.sort_by_key(|z| z.id);
        zones
    }

    /// Zones sharing a parent with `zone` (other roots for a root), excluding
    /// any zone with the same id.
    pub fn siblings_of(&self, zone: &Zone) -> Vec<Arc<Zone>> {
        let ids = match zone.parent_id {
            Some(parent) => self.child_ids(parent),
            None => &self.roots,
        };
        ids.iter()
            .filter(|id| **id != zone.id)
            .filter_map(|id| self.zones.get(id).cloned())
            .collect()
    }

    pub fn zones(&self) -> impl Iterator<Item = &Arc<Zone>> {
        self.zones.values()
    }

    /// Insert or replace a zone, keeping the parent/child links in step.
    pub(crate) fn put(&mut self, zone: Zone) -> Option<Arc<Zone>> {
        let previous = self.take(zone.id);
        let slot = match zone.parent_id {
            Some(parent) => self.children.entry(parent).or_default(),
            None => &mut self.roots,
        };
        if let Err(pos) = slot.binary_search(&zone.id) {
            slot.insert(pos, zone.id);
        }
        self.zones.insert(zone.id, Arc::new(zone));
        previous
    }

    /// Remove a zone. Its own child list is left to the caller, which only
    /// removes childless zones.
    pub(crate) fn take(&mut self, id: ZoneId) -> Option<Arc<Zone>> {
        let zone = self.zones.remove(&id)?;
        let slot = match zone.parent_id {
            Some(parent) => self.children.get_mut(&parent),
            None => Some(&mut self.roots),
        };
        if let Some(slot) = slot
            && let Ok(pos) = slot.binary_search(&id)
        {
            slot.remove(pos);
        }
        if let Some(parent) = zone.parent_id
            && self.children.get(&parent).is_some_and(Vec::is_empty)
        {
            self.children.remove(&parent);
        }
        Some(zone)
    }
}

/// Holds the current [`Hierarchy`] and serialises commits.
#[derive(Debug, Default)]
pub struct BoundaryStore {
    current: RwLock<Arc<Hierarchy>>,
    writer: Mutex<()>,
}

impl BoundaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_hierarchy(hierarchy: Hierarchy) -> Self {
        Self {
            current: RwLock::new(Arc::new(hierarchy)),
            writer: Mutex::new(()),
        }
    }

    /// The committed hierarchy as of now.
    pub fn snapshot(&self) -> Arc<Hierarchy> {
        Arc::clone(&self.current.read())
    }

    pub fn version(&self) -> BoundaryVersion {
        self.current.read().version
    }

    pub fn get(&self, id: ZoneId) -> Option<Arc<Zone>> {
        self.current.read().get(id).cloned()
    }

    pub fn children_of(&self, id: ZoneId) -> Vec<Arc<Zone>> {
        self.snapshot().children_of(id)
    }

    pub fn all_at_level(&self, level: ZoneLevel) -> Vec<Arc<Zone>> {
        self.snapshot().all_at_level(level)
    }

    /// Start a commit. Other writers wait until the returned guard is
    /// published or dropped; dropping it discards the change.
    pub fn begin(&self) -> Commit<'_> {
        let lock = self.writer.lock();
        Commit {
            store: self,
            base: self.snapshot(),
            _lock: lock,
        }
    }

    /// Replace the hierarchy with an empty one at the same version.
    pub fn clear(&self) {
        let _lock = self.writer.lock();
        let mut current = self.current.write();
        let version = current.version;
        *current = Arc::new(Hierarchy {
            version,
            ..Hierarchy::default()
        });
    }
}

/// An in-progress commit holding the store's writer lock.
pub struct Commit<'a> {
    store: &'a BoundaryStore,
    base: Arc<Hierarchy>,
    _lock: MutexGuard<'a, ()>,
}

impl Commit<'_> {
    /// The hierarchy this commit starts from.
    pub fn base(&self) -> &Hierarchy {
        &self.base
    }

    /// A mutable copy of the base to stage changes on.
    pub fn stage(&self) -> Hierarchy {
        Hierarchy::clone(&self.base)
    }

    /// Make `next` current under the next version.
    pub fn publish(self, mut next: Hierarchy) -> BoundaryVersion {
        let version = self.base.version.next();
        next.version = version;
        *self.store.current.write() = Arc::new(next);
        version
    }
}

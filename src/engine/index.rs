//! Shared spatial index: one writer at a time, lock-free reads on snapshots.
//!
//! Readers hold the read lock only long enough to clone the root, then run
//! their whole scan on that [`Snapshot`]. Structural writes and rebuilds take
//! the write lock, so new readers queue behind them while scans already in
//! flight keep their view.

use crate::compute::spatial::{IndexEntry, IndexRef, IndexStats, RTree, Snapshot};
use crate::config::IndexConfig;
use crate::error::IndexCorruption;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use zonemap_types::bbox::BoundingBox2D;

pub struct SpatialIndex {
    tree: RwLock<RTree>,
}

impl SpatialIndex {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            tree: RwLock::new(RTree::new(config)),
        }
    }

    pub fn bulk_load(config: IndexConfig, entries: Vec<IndexEntry>) -> Self {
        Self {
            tree: RwLock::new(RTree::bulk_load(config, entries)),
        }
    }

    /// Root of the current tree.
    pub fn snapshot(&self) -> Snapshot {
        self.tree.read().snapshot()
    }

    /// Hold off writers while pairing the index with other state.
    pub fn read(&self) -> RwLockReadGuard<'_, RTree> {
        self.tree.read()
    }

    /// Exclusive access for a sequence of structural changes.
    pub fn write(&self) -> RwLockWriteGuard<'_, RTree> {
        self.tree.write()
    }

    pub fn insert(&self, entry: IndexEntry) -> Result<(), IndexCorruption> {
        self.tree.write().insert(entry)
    }

    pub fn remove(&self, item: &IndexRef) -> Result<Option<IndexEntry>, IndexCorruption> {
        self.tree.write().remove(item)
    }

    pub fn update(&self, item: IndexRef, bbox: BoundingBox2D) -> Result<(), IndexCorruption> {
        self.tree.write().update(item, bbox)
    }

    pub fn len(&self) -> usize {
        self.tree.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.read().is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        self.tree.read().stats()
    }

    pub fn check(&self) -> Result<(), IndexCorruption> {
        self.tree.read().check_invariants()
    }

    /// Drop all nodes.
    pub fn clear(&self) {
        let mut tree = self.tree.write();
        let config = tree.config().clone();
        *tree = RTree::new(config);
    }
}

/// Replace a damaged tree with one packed from authoritative entries.
///
/// The caller already holds the write lock, so no reader sees the broken tree
/// after this returns.
pub fn rebuild_from(tree: &mut RTree, entries: Vec<IndexEntry>) {
    let rebuilds = tree.stats().rebuilds;
    let config = tree.config().clone();
    *tree = RTree::bulk_load(config, entries);
    tree.set_rebuilds(rebuilds + 1);
    log::info!("Rebuilt spatial index with {} entries", tree.len());
}

//! Hierarchical bounding-box index (R-tree) over zone and resident envelopes.
//!
//! Leaves hold [`IndexEntry`] values, internal nodes hold the minimal box that
//! covers their children. The tree never owns geometry: entries are envelopes
//! plus back-references resolved by the caller.
//!
//! ## Maintenance
//!
//! 1. **Insert** descends by least area enlargement and splits overfull nodes
//!    with Guttman's quadratic split.
//! 2. **Remove** drops the entry and any node left empty, without reinsertion.
//! 3. **Rebuild** repacks everything with Sort-Tile-Recursive once enough
//!    removals have pushed average leaf fill below the configured ratio.
//!
//! ## Snapshots
//!
//! Nodes are shared through `Arc` and mutated with `Arc::make_mut`, so a
//! [`Snapshot`] taken before a write keeps seeing the old tree while the
//! writer copies only the nodes on the path it touches.
//!
//! ```rust
//! use geo::Point;
//! use zonemap::compute::spatial::{IndexEntry, IndexRef, RTree};
//! use zonemap::config::IndexConfig;
//! use zonemap_types::bbox::BoundingBox2D;
//! use zonemap_types::resident::ResidentId;
//!
//! let mut tree = RTree::new(IndexConfig::default());
//! for i in 0..100u64 {
//!     let p = Point::new(i as f64, i as f64);
//!     tree.insert(IndexEntry::resident(ResidentId(i), &p)).unwrap();
//! }
//!
//! let hits = tree
//!     .snapshot()
//!     .query_range(&BoundingBox2D::new(10.0, 10.0, 19.5, 19.5), None)
//!     .unwrap();
//! assert_eq!(hits.len(), 10);
//! # Ok::<(), zonemap::GisError>(())
//! ```

use crate::cancel::{CancelSignal, checkpoint};
use crate::config::IndexConfig;
use crate::error::{IndexCorruption, Result};
use geo::Point;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use zonemap_types::bbox::BoundingBox2D;
use zonemap_types::resident::ResidentId;
use zonemap_types::zone::ZoneId;

/// Discriminator of what an entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Zone,
    Resident,
}

/// Back-reference stored in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexRef {
    Zone(ZoneId),
    Resident(ResidentId),
}

impl IndexRef {
    pub fn kind(&self) -> EntryKind {
        match self {
            IndexRef::Zone(_) => EntryKind::Zone,
            IndexRef::Resident(_) => EntryKind::Resident,
        }
    }
}

/// Envelope plus back-reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexEntry {
    pub bbox: BoundingBox2D,
    pub item: IndexRef,
}

impl IndexEntry {
    pub fn new(bbox: BoundingBox2D, item: IndexRef) -> Self {
        Self { bbox, item }
    }

    pub fn zone(id: ZoneId, bbox: BoundingBox2D) -> Self {
        Self::new(bbox, IndexRef::Zone(id))
    }

    pub fn resident(id: ResidentId, point: &Point) -> Self {
        Self::new(BoundingBox2D::from_point(point), IndexRef::Resident(id))
    }

    pub fn kind(&self) -> EntryKind {
        self.item.kind()
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf(Vec<IndexEntry>),
    Internal(Vec<Arc<Node>>),
}

#[derive(Debug, Clone)]
struct Node {
    bbox: BoundingBox2D,
    kind: NodeKind,
}

impl Node {
    fn leaf(entries: Vec<IndexEntry>) -> Self {
        let bbox = cover(entries.iter().map(|e| e.bbox));
        Self {
            bbox,
            kind: NodeKind::Leaf(entries),
        }
    }

    fn internal(children: Vec<Arc<Node>>) -> Self {
        let bbox = cover(children.iter().map(|c| c.bbox));
        Self {
            bbox,
            kind: NodeKind::Internal(children),
        }
    }

    fn len(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(entries) => entries.len(),
            NodeKind::Internal(children) => children.len(),
        }
    }

    fn refresh_bbox(&mut self) {
        self.bbox = match &self.kind {
            NodeKind::Leaf(entries) => cover(entries.iter().map(|e| e.bbox)),
            NodeKind::Internal(children) => cover(children.iter().map(|c| c.bbox)),
        };
    }
}

/// Union of boxes. An empty input yields a degenerate box at the origin,
/// which only ever labels a node that is about to be dropped.
fn cover(mut boxes: impl Iterator<Item = BoundingBox2D>) -> BoundingBox2D {
    let Some(first) = boxes.next() else {
        return BoundingBox2D::new(0.0, 0.0, 0.0, 0.0);
    };
    boxes.fold(first, |acc, b| acc.union(&b))
}

/// Guttman's quadratic split.
fn quadratic_split<T>(
    mut items: Vec<T>,
    min_fill: usize,
    bbox_of: impl Fn(&T) -> BoundingBox2D,
) -> (Vec<T>, Vec<T>) {
    // Seeds: the pair wasting the most area when grouped, margin as tiebreak
    // so points on a line still separate.
    let (mut s1, mut s2) = (0, 1);
    let mut worst = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let (a, b) = (bbox_of(&items[i]), bbox_of(&items[j]));
            let union = a.union(&b);
            let key = (union.area() - a.area() - b.area(), union.margin());
            if key.0 > worst.0 || (key.0 == worst.0 && key.1 > worst.1) {
                worst = key;
                (s1, s2) = (i, j);
            }
        }
    }

    let seed2 = items.swap_remove(s2);
    let seed1 = items.swap_remove(s1);
    let mut box1 = bbox_of(&seed1);
    let mut box2 = bbox_of(&seed2);
    let mut group1 = vec![seed1];
    let mut group2 = vec![seed2];

    while !items.is_empty() {
        if group1.len() + items.len() <= min_fill {
            group1.append(&mut items);
            break;
        }
        if group2.len() + items.len() <= min_fill {
            group2.append(&mut items);
            break;
        }

        let mut pick = 0;
        let mut best_diff = f64::NEG_INFINITY;
        for (idx, item) in items.iter().enumerate() {
            let b = bbox_of(item);
            let diff = (box1.enlargement(&b) - box2.enlargement(&b)).abs();
            if diff > best_diff {
                best_diff = diff;
                pick = idx;
            }
        }

        let item = items.swap_remove(pick);
        let b = bbox_of(&item);
        let (grow1, grow2) = (box1.enlargement(&b), box2.enlargement(&b));
        let to_first = match grow1.total_cmp(&grow2) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => match box1.area().total_cmp(&box2.area()) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => group1.len() <= group2.len(),
            },
        };
        if to_first {
            box1 = box1.union(&b);
            group1.push(item);
        } else {
            box2 = box2.union(&b);
            group2.push(item);
        }
    }

    (group1, group2)
}

/// Sort-Tile-Recursive grouping of items into runs of at most `capacity`.
fn str_pack<T>(
    mut items: Vec<T>,
    capacity: usize,
    center_of: impl Fn(&T) -> Point,
) -> Vec<Vec<T>> {
    let groups = items.len().div_ceil(capacity);
    let slices = (groups as f64).sqrt().ceil().max(1.0) as usize;
    let slice_len = (slices * capacity).max(1);

    items.sort_by(|a, b| center_of(a).x().total_cmp(&center_of(b).x()));

    let mut packed = Vec::with_capacity(groups);
    let mut rest = items;
    while !rest.is_empty() {
        let tail = rest.split_off(slice_len.min(rest.len()));
        let mut slice = std::mem::replace(&mut rest, tail);
        slice.sort_by(|a, b| center_of(a).y().total_cmp(&center_of(b).y()));
        while !slice.is_empty() {
            let tail = slice.split_off(capacity.min(slice.len()));
            packed.push(std::mem::replace(&mut slice, tail));
        }
    }
    packed
}

/// Shape and occupancy figures.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndexStats {
    pub len: usize,
    pub height: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub avg_leaf_fill: f64,
    pub rebuilds: u64,
}

/// Read-only view of the tree at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    root: Option<Arc<Node>>,
    len: usize,
}

#[derive(Debug)]
enum Candidate<'a> {
    Node(&'a Node),
    Envelope(&'a IndexEntry),
    /// Entry with its refined distance. The heap key is clamped to the
    /// envelope bound; the reported distance is not.
    Exact(&'a IndexEntry, f64),
}

impl Candidate<'_> {
    fn rank(&self) -> u8 {
        match self {
            Candidate::Exact(..) => 0,
            Candidate::Envelope(_) => 1,
            Candidate::Node(_) => 2,
        }
    }

    fn item(&self) -> Option<IndexRef> {
        match self {
            Candidate::Exact(e, _) | Candidate::Envelope(e) => Some(e.item),
            Candidate::Node(_) => None,
        }
    }
}

struct Queued<'a> {
    dist: f64,
    candidate: Candidate<'a>,
}

impl PartialEq for Queued<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued<'_> {}

impl PartialOrd for Queued<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: smaller distance, then finalized results, then lower ids.
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.candidate.rank().cmp(&self.candidate.rank()))
            .then_with(|| other.candidate.item().cmp(&self.candidate.item()))
    }
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries whose envelope intersects `bbox`.
    pub fn query_range(
        &self,
        bbox: &BoundingBox2D,
        signal: Option<&CancelSignal>,
    ) -> Result<Vec<IndexEntry>> {
        let mut results = Vec::new();
        let Some(root) = &self.root else {
            return Ok(results);
        };

        let mut stack: Vec<&Node> = vec![root];
        while let Some(node) = stack.pop() {
            checkpoint(signal)?;
            if !node.bbox.intersects(bbox) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(entries) => {
                    results.extend(entries.iter().filter(|e| e.bbox.intersects(bbox)));
                }
                NodeKind::Internal(children) => {
                    stack.extend(children.iter().map(|c| c.as_ref()));
                }
            }
        }
        Ok(results)
    }

    /// Entries whose envelope covers `point`.
    pub fn query_point(
        &self,
        point: &Point,
        signal: Option<&CancelSignal>,
    ) -> Result<Vec<IndexEntry>> {
        self.query_range(&BoundingBox2D::from_point(point), signal)
    }

    /// The `k` closest entries to `point` among those accepted by `filter`.
    ///
    /// Candidates are ordered by envelope distance first; each is then refined
    /// with `exact`, which may return `None` to drop an entry. Results come
    /// back in non-decreasing exact distance, ties broken by reference.
    pub fn nearest(
        &self,
        point: &Point,
        k: usize,
        filter: impl Fn(&IndexEntry) -> bool,
        mut exact: impl FnMut(&IndexEntry) -> Option<f64>,
        signal: Option<&CancelSignal>,
    ) -> Result<Vec<(IndexEntry, f64)>> {
        let mut results = Vec::with_capacity(k.min(self.len));
        let Some(root) = &self.root else {
            return Ok(results);
        };
        if k == 0 {
            return Ok(results);
        }

        let mut heap = BinaryHeap::new();
        heap.push(Queued {
            dist: root.bbox.min_distance_to_point(point),
            candidate: Candidate::Node(root),
        });

        while let Some(Queued { dist, candidate }) = heap.pop() {
            match candidate {
                Candidate::Node(node) => {
                    checkpoint(signal)?;
                    match &node.kind {
                        NodeKind::Leaf(entries) => {
                            for entry in entries {
                                if !filter(entry) {
                                    continue;
                                }
                                heap.push(Queued {
                                    dist: entry.bbox.min_distance_to_point(point),
                                    candidate: Candidate::Envelope(entry),
                                });
                            }
                        }
                        NodeKind::Internal(children) => {
                            for child in children {
                                heap.push(Queued {
                                    dist: child.bbox.min_distance_to_point(point),
                                    candidate: Candidate::Node(child),
                                });
                            }
                        }
                    }
                }
                Candidate::Envelope(entry) => {
                    if let Some(d) = exact(entry) {
                        heap.push(Queued {
                            dist: d.max(dist),
                            candidate: Candidate::Exact(entry, d),
                        });
                    }
                }
                Candidate::Exact(entry, exact_dist) => {
                    results.push((*entry, exact_dist));
                    if results.len() == k {
                        break;
                    }
                }
            }
        }
        Ok(results)
    }

    /// Every entry, in tree order.
    pub fn entries(&self) -> Vec<IndexEntry> {
        let mut out = Vec::with_capacity(self.len);
        let Some(root) = &self.root else {
            return out;
        };
        let mut stack: Vec<&Node> = vec![root];
        while let Some(node) = stack.pop() {
            match &node.kind {
                NodeKind::Leaf(entries) => out.extend(entries.iter().copied()),
                NodeKind::Internal(children) => stack.extend(children.iter().map(|c| c.as_ref())),
            }
        }
        out
    }
}

/// Mutable R-tree. Cloning is cheap only for the snapshot; use [`RTree::snapshot`]
/// to hand readers a view.
#[derive(Debug, Clone)]
pub struct RTree {
    root: Option<Arc<Node>>,
    locator: FxHashMap<IndexRef, BoundingBox2D>,
    config: IndexConfig,
    height: usize,
    leaves: usize,
    removals_since_rebuild: usize,
    rebuilds: u64,
}

impl RTree {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            root: None,
            locator: FxHashMap::default(),
            config,
            height: 0,
            leaves: 0,
            removals_since_rebuild: 0,
            rebuilds: 0,
        }
    }

    /// Build a packed tree in one pass. Later duplicates of a reference win.
    pub fn bulk_load(config: IndexConfig, entries: Vec<IndexEntry>) -> Self {
        let mut tree = Self::new(config);
        for entry in entries {
            tree.locator.insert(entry.item, entry.bbox);
        }
        tree.repack();
        tree
    }

    pub fn len(&self) -> usize {
        self.locator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locator.is_empty()
    }

    pub fn contains(&self, item: &IndexRef) -> bool {
        self.locator.contains_key(item)
    }

    pub fn bbox_of(&self, item: &IndexRef) -> Option<BoundingBox2D> {
        self.locator.get(item).copied()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub(crate) fn set_rebuilds(&mut self, rebuilds: u64) {
        self.rebuilds = rebuilds;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            root: self.root.clone(),
            len: self.locator.len(),
        }
    }

    fn max_entries(&self) -> usize {
        self.config.max_entries
    }

    fn min_fill(&self) -> usize {
        (self.config.max_entries * 2 / 5).max(2)
    }

    fn pack_capacity(&self) -> usize {
        (self.config.max_entries * 3 / 4).max(2)
    }

    /// Insert an entry, replacing any existing entry for the same reference.
    pub fn insert(&mut self, entry: IndexEntry) -> std::result::Result<(), IndexCorruption> {
        if self.locator.contains_key(&entry.item) {
            self.remove_inner(&entry.item)?;
        }
        self.locator.insert(entry.item, entry.bbox);

        let max = self.max_entries();
        let min_fill = self.min_fill();
        let Some(root) = self.root.as_mut() else {
            self.root = Some(Arc::new(Node::leaf(vec![entry])));
            self.height = 1;
            self.leaves = 1;
            return Ok(());
        };

        let mut leaf_splits = 0;
        if let Some(sibling) = insert_into(root, entry, max, min_fill, &mut leaf_splits) {
            let old_root = Arc::clone(root);
            *root = Arc::new(Node::internal(vec![old_root, sibling]));
            self.height += 1;
        }
        self.leaves += leaf_splits;
        Ok(())
    }

    /// Remove the entry for `item`. `Ok(None)` when it was never indexed.
    pub fn remove(
        &mut self,
        item: &IndexRef,
    ) -> std::result::Result<Option<IndexEntry>, IndexCorruption> {
        if !self.locator.contains_key(item) {
            return Ok(None);
        }
        let removed = self.remove_inner(item)?;
        self.locator.remove(item);
        self.removals_since_rebuild += 1;
        self.maybe_rebuild();
        Ok(Some(removed))
    }

    /// Move an entry to a new envelope.
    pub fn update(
        &mut self,
        item: IndexRef,
        bbox: BoundingBox2D,
    ) -> std::result::Result<(), IndexCorruption> {
        self.insert(IndexEntry::new(bbox, item))
    }

    fn remove_inner(
        &mut self,
        item: &IndexRef,
    ) -> std::result::Result<IndexEntry, IndexCorruption> {
        let bbox = self.locator.get(item).copied().ok_or_else(|| {
            IndexCorruption(format!("{:?} missing from locator", item))
        })?;

        let path = self
            .root
            .as_deref()
            .and_then(|root| find_path(root, item, &bbox))
            .ok_or_else(|| IndexCorruption(format!("{:?} is located but not in the tree", item)))?;

        let Some(root) = self.root.as_mut() else {
            return Err(IndexCorruption("tree has no root".to_string()));
        };
        let mut dropped_leaves = 0;
        let removed = remove_at(root, &path, item, &mut dropped_leaves)
            .ok_or_else(|| IndexCorruption(format!("{:?} vanished during removal", item)))?;
        self.leaves -= dropped_leaves;

        if root.len() == 0 {
            self.root = None;
            self.height = 0;
            self.leaves = 0;
        } else {
            while let Some(root) = self.root.as_ref()
                && let NodeKind::Internal(children) = &root.kind
                && children.len() == 1
            {
                let only = Arc::clone(&children[0]);
                self.root = Some(only);
                self.height -= 1;
            }
        }
        Ok(removed)
    }

    /// Average share of leaf slots in use.
    pub fn leaf_fill(&self) -> f64 {
        if self.leaves == 0 {
            return 1.0;
        }
        self.locator.len() as f64 / (self.leaves * self.max_entries()) as f64
    }

    fn maybe_rebuild(&mut self) {
        if self.removals_since_rebuild >= self.config.rebuild_min_removals
            && self.leaf_fill() < self.config.min_fill_ratio
        {
            log::debug!(
                "Rebuilding index: fill {:.2} below {:.2} after {} removals",
                self.leaf_fill(),
                self.config.min_fill_ratio,
                self.removals_since_rebuild
            );
            self.rebuild();
        }
    }

    /// Repack the whole tree from the locator.
    pub fn rebuild(&mut self) {
        self.repack();
        self.rebuilds += 1;
    }

    fn repack(&mut self) {
        let entries: Vec<IndexEntry> = self
            .locator
            .iter()
            .map(|(item, bbox)| IndexEntry::new(*bbox, *item))
            .collect();
        self.removals_since_rebuild = 0;

        if entries.is_empty() {
            self.root = None;
            self.height = 0;
            self.leaves = 0;
            return;
        }

        let capacity = self.pack_capacity();
        let mut level: Vec<Arc<Node>> = str_pack(entries, capacity, |e| e.bbox.center())
            .into_iter()
            .map(|group| Arc::new(Node::leaf(group)))
            .collect();
        self.leaves = level.len();
        self.height = 1;

        while level.len() > 1 {
            level = str_pack(level, capacity, |n| n.bbox.center())
                .into_iter()
                .map(|group| Arc::new(Node::internal(group)))
                .collect();
            self.height += 1;
        }
        self.root = level.pop();
    }

    pub fn stats(&self) -> IndexStats {
        let mut nodes = 0;
        if let Some(root) = &self.root {
            let mut stack: Vec<&Node> = vec![root];
            while let Some(node) = stack.pop() {
                nodes += 1;
                if let NodeKind::Internal(children) = &node.kind {
                    stack.extend(children.iter().map(|c| c.as_ref()));
                }
            }
        }
        IndexStats {
            len: self.len(),
            height: self.height,
            nodes,
            leaves: self.leaves,
            avg_leaf_fill: self.leaf_fill(),
            rebuilds: self.rebuilds,
        }
    }

    /// Verify structure: covering boxes, uniform leaf depth, fan-out bounds,
    /// and agreement between tree contents and the locator.
    pub fn check_invariants(&self) -> std::result::Result<(), IndexCorruption> {
        let Some(root) = &self.root else {
            if self.locator.is_empty() {
                return Ok(());
            }
            return Err(IndexCorruption(format!(
                "empty tree but {} located entries",
                self.locator.len()
            )));
        };

        let mut seen = 0usize;
        let mut leaves = 0usize;
        let mut stack: Vec<(&Node, usize)> = vec![(root, 1)];
        while let Some((node, depth)) = stack.pop() {
            if node.len() == 0 || node.len() > self.max_entries() {
                return Err(IndexCorruption(format!(
                    "node at depth {} holds {} entries",
                    depth,
                    node.len()
                )));
            }
            match &node.kind {
                NodeKind::Leaf(entries) => {
                    if depth != self.height {
                        return Err(IndexCorruption(format!(
                            "leaf at depth {} in tree of height {}",
                            depth, self.height
                        )));
                    }
                    leaves += 1;
                    for entry in entries {
                        if !node.bbox.contains_bbox(&entry.bbox) {
                            return Err(IndexCorruption(format!(
                                "{:?} escapes its leaf box",
                                entry.item
                            )));
                        }
                        if self.locator.get(&entry.item) != Some(&entry.bbox) {
                            return Err(IndexCorruption(format!(
                                "{:?} disagrees with the locator",
                                entry.item
                            )));
                        }
                        seen += 1;
                    }
                }
                NodeKind::Internal(children) => {
                    for child in children {
                        if !node.bbox.contains_bbox(&child.bbox) {
                            return Err(IndexCorruption(format!(
                                "child box escapes parent at depth {}",
                                depth
                            )));
                        }
                        stack.push((child, depth + 1));
                    }
                }
            }
        }

        if seen != self.locator.len() {
            return Err(IndexCorruption(format!(
                "tree holds {} entries, locator {}",
                seen,
                self.locator.len()
            )));
        }
        if leaves != self.leaves {
            return Err(IndexCorruption(format!(
                "counted {} leaves, tracked {}",
                leaves, self.leaves
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_test(&mut self, item: IndexRef) {
        // Point the locator somewhere no node covers.
        self.locator
            .insert(item, BoundingBox2D::new(-1e9, -1e9, -1e9, -1e9));
    }
}

fn choose_subtree(children: &[Arc<Node>], bbox: &BoundingBox2D) -> usize {
    let mut best = 0;
    let mut best_key = (f64::INFINITY, f64::INFINITY);
    for (idx, child) in children.iter().enumerate() {
        let key = (child.bbox.enlargement(bbox), child.bbox.area());
        if key.0 < best_key.0 || (key.0 == best_key.0 && key.1 < best_key.1) {
            best_key = key;
            best = idx;
        }
    }
    best
}

/// Insert below `node`; returns a new sibling when `node` had to split.
fn insert_into(
    node: &mut Arc<Node>,
    entry: IndexEntry,
    max: usize,
    min_fill: usize,
    leaf_splits: &mut usize,
) -> Option<Arc<Node>> {
    let node = Arc::make_mut(node);
    node.bbox = node.bbox.union(&entry.bbox);

    match &mut node.kind {
        NodeKind::Leaf(entries) => {
            entries.push(entry);
            if entries.len() <= max {
                return None;
            }
            let (keep, moved) = quadratic_split(std::mem::take(entries), min_fill, |e| e.bbox);
            *entries = keep;
            node.refresh_bbox();
            *leaf_splits += 1;
            Some(Arc::new(Node::leaf(moved)))
        }
        NodeKind::Internal(children) => {
            let idx = choose_subtree(children, &entry.bbox);
            let split = insert_into(&mut children[idx], entry, max, min_fill, leaf_splits);
            if let Some(sibling) = split {
                children.push(sibling);
            }
            if children.len() <= max {
                return None;
            }
            let (keep, moved) = quadratic_split(std::mem::take(children), min_fill, |c| c.bbox);
            *children = keep;
            node.refresh_bbox();
            Some(Arc::new(Node::internal(moved)))
        }
    }
}

/// Child indices leading to the leaf holding `item`.
fn find_path(node: &Node, item: &IndexRef, bbox: &BoundingBox2D) -> Option<Vec<usize>> {
    if !node.bbox.contains_bbox(bbox) {
        return None;
    }
    match &node.kind {
        NodeKind::Leaf(entries) => entries.iter().any(|e| e.item == *item).then(Vec::new),
        NodeKind::Internal(children) => children.iter().enumerate().find_map(|(idx, child)| {
            find_path(child, item, bbox).map(|mut path| {
                path.insert(0, idx);
                path
            })
        }),
    }
}

fn remove_at(
    node: &mut Arc<Node>,
    path: &[usize],
    item: &IndexRef,
    dropped_leaves: &mut usize,
) -> Option<IndexEntry> {
    let node = Arc::make_mut(node);
    let removed = match (&mut node.kind, path.split_first()) {
        (NodeKind::Leaf(entries), None) => {
            let pos = entries.iter().position(|e| e.item == *item)?;
            Some(entries.remove(pos))
        }
        (NodeKind::Internal(children), Some((&idx, rest))) => {
            let child = children.get_mut(idx)?;
            let removed = remove_at(child, rest, item, dropped_leaves)?;
            if child.len() == 0 {
                if matches!(child.kind, NodeKind::Leaf(_)) {
                    *dropped_leaves += 1;
                }
                children.remove(idx);
            }
            Some(removed)
        }
        _ => None,
    }?;
    if node.len() > 0 {
        node.refresh_bbox();
    }
    Some(removed)
}

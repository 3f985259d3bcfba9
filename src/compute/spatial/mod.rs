//! Spatial indexing.

pub mod rtree;

pub use rtree::{EntryKind, IndexEntry, IndexRef, IndexStats, RTree, Snapshot};

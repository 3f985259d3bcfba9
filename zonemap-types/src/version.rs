use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic generation counter of the committed zone hierarchy.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BoundaryVersion(pub u64);

impl BoundaryVersion {
    pub const INITIAL: BoundaryVersion = BoundaryVersion(0);

    pub fn next(self) -> Self {
        BoundaryVersion(self.0 + 1)
    }
}

impl fmt::Display for BoundaryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

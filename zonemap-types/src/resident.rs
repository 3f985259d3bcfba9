use crate::version::BoundaryVersion;
use geo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier supplied by the residents registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResidentId(pub u64);

impl fmt::Display for ResidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resident:{}", self.0)
    }
}

/// Mirrored location of a resident's registered address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentLocation {
    pub resident_id: ResidentId,
    pub point: Point,
    /// Boundary version that was current when this location was last written.
    pub last_updated_version: BoundaryVersion,
}

impl ResidentLocation {
    pub fn new(resident_id: ResidentId, point: Point, version: BoundaryVersion) -> Self {
        Self {
            resident_id,
            point,
            last_updated_version: version,
        }
    }
}

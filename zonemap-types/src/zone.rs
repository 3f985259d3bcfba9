use geo::Polygon;
use geo::orient::{Direction, Orient};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a zone (barangay or sub-zone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub u64);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone:{}", self.0)
    }
}

/// Depth of a zone in the administrative hierarchy.
///
/// Level 0 is the barangay boundary itself; each subdivision is one deeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneLevel(pub u8);

impl ZoneLevel {
    pub const BARANGAY: ZoneLevel = ZoneLevel(0);
    pub const PUROK: ZoneLevel = ZoneLevel(1);

    pub fn is_root(&self) -> bool {
        self.0 == 0
    }

    /// The level directly below this one.
    pub fn child(&self) -> Option<ZoneLevel> {
        self.0.checked_add(1).map(ZoneLevel)
    }
}

impl fmt::Display for ZoneLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// An administrative zone with its boundary polygon.
///
/// The polygon's winding is normalized on construction: exterior ring
/// counter-clockwise, holes clockwise.
///
/// # Examples
///
/// ```
/// use geo::polygon;
/// use zonemap_types::zone::{Zone, ZoneId, ZoneLevel};
///
/// let root = Zone::new(
///     ZoneId(1),
///     "Barangay San Isidro",
///     ZoneLevel::BARANGAY,
///     polygon![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0), (x: 100.0, y: 100.0), (x: 0.0, y: 100.0)],
///     None,
/// );
/// assert!(root.is_root());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub level: ZoneLevel,
    polygon: Polygon,
    pub parent_id: Option<ZoneId>,
}

impl Zone {
    pub fn new(
        id: ZoneId,
        name: impl Into<String>,
        level: ZoneLevel,
        polygon: Polygon,
        parent_id: Option<ZoneId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            level,
            polygon: polygon.orient(Direction::Default),
            parent_id,
        }
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    /// Same zone with its whole polygon replaced.
    pub fn with_polygon(mut self, polygon: Polygon) -> Self {
        self.polygon = polygon.orient(Direction::Default);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

use geo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A 2D axis-aligned bounding box (envelope).
///
/// Wraps `geo::Rect` and adds the arithmetic the spatial index needs:
/// area, union, enlargement and point distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2D {
    /// The underlying geometric rectangle
    pub rect: Rect,
}

impl BoundingBox2D {
    /// Create a new bounding box from minimum and maximum coordinates.
    ///
    /// Corners are normalized, so swapped arguments still produce a valid box.
    ///
    /// # Examples
    ///
    /// ```
    /// use zonemap_types::bbox::BoundingBox2D;
    ///
    /// let bbox = BoundingBox2D::new(0.0, 0.0, 100.0, 50.0);
    /// assert_eq!(bbox.area(), 5000.0);
    /// ```
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            rect: Rect::new(
                geo::coord! { x: min_x, y: min_y },
                geo::coord! { x: max_x, y: max_y },
            ),
        }
    }

    /// Create a bounding box from a `geo::Rect`.
    pub fn from_rect(rect: Rect) -> Self {
        Self { rect }
    }

    /// Degenerate box covering a single point.
    pub fn from_point(point: &Point) -> Self {
        Self::new(point.x(), point.y(), point.x(), point.y())
    }

    /// Square box of half-width `radius` centred on `point`.
    pub fn around(point: &Point, radius: f64) -> Self {
        Self::new(
            point.x() - radius,
            point.y() - radius,
            point.x() + radius,
            point.y() + radius,
        )
    }

    pub fn min_x(&self) -> f64 {
        self.rect.min().x
    }

    pub fn min_y(&self) -> f64 {
        self.rect.min().y
    }

    pub fn max_x(&self) -> f64 {
        self.rect.max().x
    }

    pub fn max_y(&self) -> f64 {
        self.rect.max().y
    }

    /// Get the center point of the bounding box.
    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x() + self.max_x()) / 2.0,
            (self.min_y() + self.max_y()) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x() - self.min_x()
    }

    pub fn height(&self) -> f64 {
        self.max_y() - self.min_y()
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Half perimeter, used to rank degenerate (zero-area) boxes.
    pub fn margin(&self) -> f64 {
        self.width() + self.height()
    }

    /// Check if a point is contained within this bounding box (inclusive).
    pub fn contains_point(&self, point: &Point) -> bool {
        point.x() >= self.min_x()
            && point.x() <= self.max_x()
            && point.y() >= self.min_y()
            && point.y() <= self.max_y()
    }

    /// Check if `other` lies entirely within this box (inclusive).
    pub fn contains_bbox(&self, other: &BoundingBox2D) -> bool {
        other.min_x() >= self.min_x()
            && other.max_x() <= self.max_x()
            && other.min_y() >= self.min_y()
            && other.max_y() <= self.max_y()
    }

    /// Check if this bounding box intersects with another (touching counts).
    pub fn intersects(&self, other: &BoundingBox2D) -> bool {
        !(self.max_x() < other.min_x()
            || self.min_x() > other.max_x()
            || self.max_y() < other.min_y()
            || self.min_y() > other.max_y())
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox2D) -> Self {
        Self::new(
            self.min_x().min(other.min_x()),
            self.min_y().min(other.min_y()),
            self.max_x().max(other.max_x()),
            self.max_y().max(other.max_y()),
        )
    }

    /// Area growth needed to also cover `other`.
    pub fn enlargement(&self, other: &BoundingBox2D) -> f64 {
        self.union(other).area() - self.area()
    }

    /// Euclidean distance from `point` to the nearest point of the box.
    /// Zero when the point is inside.
    pub fn min_distance_to_point(&self, point: &Point) -> f64 {
        let dx = if point.x() < self.min_x() {
            self.min_x() - point.x()
        } else if point.x() > self.max_x() {
            point.x() - self.max_x()
        } else {
            0.0
        };
        let dy = if point.y() < self.min_y() {
            self.min_y() - point.y()
        } else if point.y() > self.max_y() {
            point.y() - self.max_y()
        } else {
            0.0
        };
        dx.hypot(dy)
    }

    /// Expand the bounding box by a given amount in all directions.
    pub fn expand(&self, amount: f64) -> Self {
        Self::new(
            self.min_x() - amount,
            self.min_y() - amount,
            self.max_x() + amount,
            self.max_y() + amount,
        )
    }

    /// Every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        [self.min_x(), self.min_y(), self.max_x(), self.max_y()]
            .iter()
            .all(|v| v.is_finite())
    }
}

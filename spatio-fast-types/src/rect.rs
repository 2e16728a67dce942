use crate::point::Point;
use geo::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Tolerance used by the overlap tests so that touching edges count as overlapping.
pub const OVERLAP_EPSILON: f64 = 1e-6;

/// An axis-aligned rectangle.
///
/// Wraps `geo::Rect`; the corners are normalized on construction so `min`
/// is always the lower-left corner.
///
/// # Examples
///
/// ```
/// use spatio_fast_types::rect::Rectangle;
///
/// let a = Rectangle::new(0.0, 0.0, 4.0, 4.0);
/// let b = Rectangle::new(2.0, 2.0, 6.0, 6.0);
/// assert!(a.overlaps(&b));
/// assert_eq!(a.intersection(&b).area(), 4.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    rect: Rect<f64>,
}

impl Rectangle {
    /// Create a rectangle from its minimum and maximum coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            rect: Rect::new(
                geo::coord! { x: min_x, y: min_y },
                geo::coord! { x: max_x, y: max_y },
            ),
        }
    }

    /// Create a rectangle from two corner points.
    pub fn from_corners(min: Point, max: Point) -> Self {
        Self::new(min.x(), min.y(), max.x(), max.y())
    }

    /// Access the underlying `geo::Rect`.
    pub fn inner(&self) -> &Rect<f64> {
        &self.rect
    }

    /// Lower-left corner.
    pub fn min(&self) -> Point {
        Point::new(self.rect.min().x, self.rect.min().y)
    }

    /// Upper-right corner.
    pub fn max(&self) -> Point {
        Point::new(self.rect.max().x, self.rect.max().y)
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

    /// Width along the x axis.
    pub fn width(&self) -> f64 {
        self.max_x() - self.min_x()
    }

    /// Height along the y axis.
    pub fn height(&self) -> f64 {
        self.max_y() - self.min_y()
    }

    /// Area of the rectangle. Degenerate rectangles have zero area.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Whether all four coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.min().is_finite() && self.max().is_finite()
    }

    /// Check if a point lies within the closed rectangle.
    pub fn contains_point(&self, point: &Point) -> bool {
        point.x() >= self.min_x()
            && point.x() <= self.max_x()
            && point.y() >= self.min_y()
            && point.y() <= self.max_y()
    }

    /// Check if this rectangle overlaps another, treating edges closer than
    /// [`OVERLAP_EPSILON`] as touching.
    pub fn overlaps(&self, other: &Rectangle) -> bool {
        leq(self.min_x(), other.max_x())
            && leq(other.min_x(), self.max_x())
            && leq(self.min_y(), other.max_y())
            && leq(other.min_y(), self.max_y())
    }

    /// Point variant of [`Rectangle::overlaps`].
    pub fn overlaps_point(&self, point: &Point) -> bool {
        leq(self.min_x(), point.x())
            && leq(point.x(), self.max_x())
            && leq(self.min_y(), point.y())
            && leq(point.y(), self.max_y())
    }

    /// Intersection of two rectangles.
    ///
    /// Disjoint rectangles yield a degenerate (zero-area) rectangle placed at
    /// the boundary between them.
    pub fn intersection(&self, other: &Rectangle) -> Rectangle {
        let min_x = self.min_x().max(other.min_x());
        let min_y = self.min_y().max(other.min_y());
        let max_x = self.max_x().min(other.max_x()).max(min_x);
        let max_y = self.max_y().min(other.max_y()).max(min_y);
        Rectangle::new(min_x, min_y, max_x, max_y)
    }

    /// Map this rectangle onto a uniform grid anchored at `origin`.
    ///
    /// Returns the inclusive span of cell indices the rectangle touches, clamped
    /// into `0..cells_per_side`.
    pub fn map_to_cells(
        &self,
        origin: &Point,
        step_x: f64,
        step_y: f64,
        cells_per_side: u32,
    ) -> CellSpan {
        CellSpan {
            min_x: cell_index(self.min_x(), origin.x(), step_x, cells_per_side),
            min_y: cell_index(self.min_y(), origin.y(), step_y, cells_per_side),
            max_x: cell_index(self.max_x(), origin.x(), step_x, cells_per_side),
            max_y: cell_index(self.max_y(), origin.y(), step_y, cells_per_side),
        }
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} - {}]", self.min(), self.max())
    }
}

/// An inclusive span of grid cell indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSpan {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl CellSpan {
    pub fn x_range(&self) -> RangeInclusive<u32> {
        self.min_x..=self.max_x
    }

    pub fn y_range(&self) -> RangeInclusive<u32> {
        self.min_y..=self.max_y
    }

    /// Number of cells covered by the span.
    pub fn cell_count(&self) -> u64 {
        (u64::from(self.max_x - self.min_x) + 1) * (u64::from(self.max_y - self.min_y) + 1)
    }

    /// Iterate over every `(x, y)` pair in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.x_range()
            .flat_map(move |x| self.y_range().map(move |y| (x, y)))
    }
}

/// Index of the grid cell holding `coord`, clamped into `0..cells_per_side`.
pub fn cell_index(coord: f64, origin: f64, step: f64, cells_per_side: u32) -> u32 {
    let last = cells_per_side.saturating_sub(1);
    let raw = ((coord - origin) / step).floor();
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    if raw >= f64::from(last) {
        last
    } else {
        raw as u32
    }
}

#[inline]
fn leq(a: f64, b: f64) -> bool {
    a <= b || (a - b).abs() < OVERLAP_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_normalizes_corners() {
        let r = Rectangle::new(10.0, 8.0, 2.0, 4.0);
        assert_eq!(r.min(), Point::new(2.0, 4.0));
        assert_eq!(r.max(), Point::new(10.0, 8.0));
        assert_eq!(r.area(), 32.0);
    }

    #[test]
    fn test_contains_point_is_closed() {
        let r = Rectangle::new(0.0, 0.0, 4.0, 4.0);
        assert!(r.contains_point(&Point::new(0.0, 0.0)));
        assert!(r.contains_point(&Point::new(4.0, 4.0)));
        assert!(r.contains_point(&Point::new(2.0, 3.0)));
        assert!(!r.contains_point(&Point::new(4.0001, 1.0)));
    }

    #[test]
    fn test_overlaps_touching_edges() {
        let a = Rectangle::new(0.0, 0.0, 5.0, 5.0);
        let b = Rectangle::new(5.0, 0.0, 10.0, 5.0);
        let c = Rectangle::new(5.0 + 1e-7, 0.0, 10.0, 5.0);
        let d = Rectangle::new(5.1, 0.0, 10.0, 5.0);
        assert!(a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(!a.overlaps(&d));
        assert!(!d.overlaps(&a));
    }

    #[test]
    fn test_overlaps_point() {
        let r = Rectangle::new(0.0, 0.0, 1.0, 1.0);
        assert!(r.overlaps_point(&Point::new(1.0 + 1e-7, 0.5)));
        assert!(!r.overlaps_point(&Point::new(1.1, 0.5)));
    }

    #[test]
    fn test_intersection() {
        let a = Rectangle::new(0.0, 0.0, 4.0, 4.0);
        let b = Rectangle::new(2.0, 1.0, 6.0, 3.0);
        assert_eq!(a.intersection(&b), Rectangle::new(2.0, 1.0, 4.0, 3.0));

        let far = Rectangle::new(8.0, 8.0, 9.0, 9.0);
        assert_eq!(a.intersection(&far).area(), 0.0);
    }

    #[test]
    fn test_map_to_cells_clamps() {
        let origin = Point::new(0.0, 0.0);
        let r = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let span = r.map_to_cells(&origin, 10.0, 10.0, 1);
        assert_eq!(span.x_range(), 0..=0);
        assert_eq!(span.cell_count(), 1);

        let span = r.map_to_cells(&origin, 2.5, 2.5, 4);
        assert_eq!(span.x_range(), 0..=3);
        assert_eq!(span.y_range(), 0..=3);
        assert_eq!(span.cells().count(), 16);

        let partial = Rectangle::new(6.0, 7.0, 10.0, 10.0).map_to_cells(&origin, 5.0, 5.0, 2);
        assert_eq!(partial, CellSpan { min_x: 1, min_y: 1, max_x: 1, max_y: 1 });
    }

    #[test]
    fn test_cell_index_edges() {
        assert_eq!(cell_index(-3.0, 0.0, 1.25, 8), 0);
        assert_eq!(cell_index(1.25, 0.0, 1.25, 8), 1);
        assert_eq!(cell_index(9.99, 0.0, 1.25, 8), 7);
        assert_eq!(cell_index(25.0, 0.0, 1.25, 8), 7);
        assert_eq!(cell_index(f64::NAN, 0.0, 1.25, 8), 0);
    }

    #[test]
    fn test_serde_roundtrip() {
        let r = Rectangle::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&r).unwrap();
        let back: Rectangle = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}

//! Geometric primitives for diagram layout and positioning.
//!
//! # Coordinate System
//!
//! Weir uses a coordinate system consistent with SVG and BPMN DI:
//!
//! ```text
//!   (0,0) ────────► +X
//!     │
//!     ▼
//!    +Y
//! ```
//!
//! - **Origin**: Top-left corner at `(0, 0)`
//! - **X-axis**: Increases rightward
//! - **Y-axis**: Increases downward
//!
//! Element positions in the model are top-left anchored (matching BPMN DI
//! `dc:Bounds`); layout math usually works on centers via [`Bounds`].

/// A 2D point in diagram coordinate space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    x: f32,
    y: f32,
}

impl Point {
    /// Creates a new point with the specified coordinates
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the x-coordinate of the point
    pub fn x(self) -> f32 {
        self.x
    }

    /// Returns the y-coordinate of the point
    pub fn y(self) -> f32 {
        self.y
    }

    /// Creates a new point with the specified x-coordinate
    pub fn with_x(mut self, x: f32) -> Self {
        self.x = x;
        self
    }

    /// Creates a new point with the specified y-coordinate
    pub fn with_y(mut self, y: f32) -> Self {
        self.y = y;
        self
    }

    /// Adds another point to this point, returning a new point
    pub fn add_point(self, other: Point) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Subtracts another point from this point, returning a new point
    pub fn sub_point(self, other: Point) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    /// Calculates the midpoint between this point and another point
    pub fn midpoint(self, other: Point) -> Self {
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    /// Euclidean distance to another point
    pub fn distance(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Manhattan distance to another point.
    ///
    /// Used as the tiebreaker in label-candidate scoring, where orthogonal
    /// travel matters more than straight-line distance.
    pub fn manhattan_distance(self, other: Point) -> f32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Width and height of an element.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    width: f32,
    height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Returns the width dimension of this size
    pub fn width(self) -> f32 {
        self.width
    }

    /// Returns the height dimension of this size
    pub fn height(self) -> f32 {
        self.height
    }

    /// Returns a new Size with the maximum width and height of both sizes
    pub fn max(self, other: Size) -> Self {
        Self {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }

    /// Returns a new Size grown by the given insets on all sides
    pub fn add_padding(self, insets: Insets) -> Self {
        Self {
            width: self.width + insets.horizontal_sum(),
            height: self.height + insets.vertical_sum(),
        }
    }
}

/// A border of a rectangular shape.
///
/// Boundary events dock onto one of these; gateways exit branches through
/// `Top`/`Bottom` when the branch target sits off the gateway's row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Border {
    Top,
    Right,
    Bottom,
    Left,
}

/// A rectangular bounding box with minimum and maximum coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Bounds {
    /// Creates a new bounds from a center point and a size
    pub fn new_from_center(center: Point, size: Size) -> Self {
        let half_width = size.width / 2.0;
        let half_height = size.height / 2.0;
        Self {
            min_x: center.x - half_width,
            min_y: center.y - half_height,
            max_x: center.x + half_width,
            max_y: center.y + half_height,
        }
    }

    /// Creates a new bounds from a top-left point and a size
    pub fn new_from_top_left(top_left: Point, size: Size) -> Self {
        Self {
            min_x: top_left.x,
            min_y: top_left.y,
            max_x: top_left.x + size.width,
            max_y: top_left.y + size.height,
        }
    }

    /// Returns the minimum x-coordinate of the bounds
    pub fn min_x(self) -> f32 {
        self.min_x
    }

    /// Returns the minimum y-coordinate of the bounds
    pub fn min_y(self) -> f32 {
        self.min_y
    }

    /// Returns the maximum x-coordinate of the bounds
    pub fn max_x(self) -> f32 {
        self.max_x
    }

    /// Returns the maximum y-coordinate of the bounds
    pub fn max_y(self) -> f32 {
        self.max_y
    }

    /// Returns the center point of the bounds
    pub fn center(self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Returns the width of the bounds
    pub fn width(self) -> f32 {
        self.max_x - self.min_x
    }

    /// Returns the height of the bounds
    pub fn height(self) -> f32 {
        self.max_y - self.min_y
    }

    /// Returns the top-left corner as a Point
    pub fn min_point(self) -> Point {
        Point {
            x: self.min_x,
            y: self.min_y,
        }
    }

    /// Converts bounds to a Size
    pub fn to_size(self) -> Size {
        Size {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Merges two bounds into the smallest bounds containing both
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Moves the bounds by the specified offset
    pub fn translate(&self, offset: Point) -> Self {
        Self {
            min_x: self.min_x + offset.x,
            min_y: self.min_y + offset.y,
            max_x: self.max_x + offset.x,
            max_y: self.max_y + offset.y,
        }
    }

    /// Grows the bounds outward by the given margin on every side.
    ///
    /// A negative margin shrinks the bounds.
    pub fn grow(&self, margin: f32) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    /// Checks whether the point lies inside or on the border of the bounds
    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Checks whether this bounds fully contains another
    pub fn contains_bounds(&self, other: &Self) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    /// Checks whether two bounds overlap when both are grown by `margin`.
    ///
    /// Touching edges count as overlap only when `margin > 0`.
    pub fn overlaps(&self, other: &Self, margin: f32) -> bool {
        let a = self.grow(margin);
        a.min_x < other.max_x
            && a.max_x > other.min_x
            && a.min_y < other.max_y
            && a.max_y > other.min_y
    }

    /// Distance from a point to the nearest point on the perimeter.
    ///
    /// Zero when the point lies exactly on the border; points inside the
    /// bounds report their distance to the closest border.
    pub fn perimeter_distance(&self, p: Point) -> f32 {
        if self.contains_point(p) {
            let to_left = p.x - self.min_x;
            let to_right = self.max_x - p.x;
            let to_top = p.y - self.min_y;
            let to_bottom = self.max_y - p.y;
            to_left.min(to_right).min(to_top).min(to_bottom)
        } else {
            let dx = (self.min_x - p.x).max(0.0).max(p.x - self.max_x);
            let dy = (self.min_y - p.y).max(0.0).max(p.y - self.max_y);
            dx.hypot(dy)
        }
    }

    /// Returns the point at the middle of the given border
    pub fn border_midpoint(&self, border: Border) -> Point {
        let center = self.center();
        match border {
            Border::Top => Point::new(center.x, self.min_y),
            Border::Right => Point::new(self.max_x, center.y),
            Border::Bottom => Point::new(center.x, self.max_y),
            Border::Left => Point::new(self.min_x, center.y),
        }
    }

    /// Clamps the point onto the perimeter of the bounds.
    ///
    /// The point is projected onto the nearest border. Used to dock edge
    /// endpoints onto their source/target shapes.
    pub fn clamp_to_perimeter(&self, p: Point) -> Point {
        if !self.contains_point(p) {
            let x = p.x.clamp(self.min_x, self.max_x);
            let y = p.y.clamp(self.min_y, self.max_y);
            // The clamped point lies on the perimeter unless p was inside.
            return Point::new(x, y);
        }
        let to_left = p.x - self.min_x;
        let to_right = self.max_x - p.x;
        let to_top = p.y - self.min_y;
        let to_bottom = self.max_y - p.y;
        let min = to_left.min(to_right).min(to_top).min(to_bottom);
        if min == to_left {
            Point::new(self.min_x, p.y)
        } else if min == to_right {
            Point::new(self.max_x, p.y)
        } else if min == to_top {
            Point::new(p.x, self.min_y)
        } else {
            Point::new(p.x, self.max_y)
        }
    }

    /// Intersection of the segment `a -> b` with the perimeter of the bounds.
    ///
    /// Returns the intersection point closest to `a`, or `None` when the
    /// segment never touches the bounds. Used to re-dock disconnected edge
    /// endpoints onto the shape they should touch.
    pub fn segment_intersection(&self, a: Point, b: Point) -> Option<Point> {
        let dx = b.x - a.x;
        let dy = b.y - a.y;

        // Liang-Barsky clipping against the four half-planes.
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;
        let checks = [
            (-dx, a.x - self.min_x),
            (dx, self.max_x - a.x),
            (-dy, a.y - self.min_y),
            (dy, self.max_y - a.y),
        ];
        for (p, q) in checks {
            if p.abs() < f32::EPSILON {
                if q < 0.0 {
                    return None;
                }
            } else {
                let t = q / p;
                if p < 0.0 {
                    t_min = t_min.max(t);
                } else {
                    t_max = t_max.min(t);
                }
                if t_min > t_max {
                    return None;
                }
            }
        }

        // Prefer the entry point; when a starts inside, use the exit.
        let t = if t_min > 0.0 { t_min } else { t_max };
        if !(0.0..=1.0).contains(&t) {
            return None;
        }
        Some(Point::new(a.x + t * dx, a.y + t * dy))
    }

    /// Checks whether the segment `a -> b` passes through the interior.
    ///
    /// Segments that merely touch the border do not count.
    pub fn segment_crosses(&self, a: Point, b: Point) -> bool {
        // Quick accept when either endpoint is strictly inside.
        let strictly_inside = |p: Point| {
            p.x > self.min_x && p.x < self.max_x && p.y > self.min_y && p.y < self.max_y
        };
        if strictly_inside(a) || strictly_inside(b) {
            return true;
        }
        let shrunk = self.grow(-0.5);
        shrunk.segment_intersection(a, b).is_some()
    }
}

/// Spacing around an element with potentially different values per side.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Insets {
    top: f32,
    right: f32,
    bottom: f32,
    left: f32,
}

impl Insets {
    /// Creates new insets with specified values for each side
    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Creates uniform insets with the same value for all sides
    pub fn uniform(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    /// Returns the top inset value
    pub fn top(self) -> f32 {
        self.top
    }

    /// Returns the right inset value
    pub fn right(self) -> f32 {
        self.right
    }

    /// Returns the bottom inset value
    pub fn bottom(self) -> f32 {
        self.bottom
    }

    /// Returns the left inset value
    pub fn left(self) -> f32 {
        self.left
    }

    /// Returns a new Insets with the specified left value
    pub fn with_left(self, left: f32) -> Self {
        Self { left, ..self }
    }

    /// Returns the sum of left and right insets
    pub fn horizontal_sum(self) -> f32 {
        self.left + self.right
    }

    /// Returns the sum of top and bottom insets
    pub fn vertical_sum(self) -> f32 {
        self.top + self.bottom
    }
}

/// Checks whether two segments properly cross each other.
///
/// Shared endpoints and mere touching do not count as a crossing; this is
/// the predicate behind the crossing counter, which only cares about flows
/// visually cutting through each other.
pub fn segments_cross(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    const EPS: f32 = 0.01;

    let d = |p: Point, q: Point, r: Point| (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);

    let d1 = d(b1, b2, a1);
    let d2 = d(b1, b2, a2);
    let d3 = d(a1, a2, b1);
    let d4 = d(a1, a2, b2);

    // Proper crossing: each segment's endpoints strictly straddle the other.
    ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS))
        && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
}


#[cfg(test)]
mod proptest_tests {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;

    fn bounds_strategy() -> impl Strategy<Value = Bounds> {
        (
            -1000.0f32..1000.0,
            -1000.0f32..1000.0,
            1.0f32..500.0,
            1.0f32..500.0,
        )
            .prop_map(|(x, y, w, h)| Bounds::new_from_top_left(Point::new(x, y), Size::new(w, h)))
    }

    fn point_strategy() -> impl Strategy<Value = Point> {
        (-1000.0f32..1000.0, -1000.0f32..1000.0).prop_map(|(x, y)| Point::new(x, y))
    }

    proptest! {
        #[test]
        fn merge_contains_both(b1 in bounds_strategy(), b2 in bounds_strategy()) {
            let merged = b1.merge(&b2);
            prop_assert!(merged.contains_bounds(&b1.grow(-0.001)));
            prop_assert!(merged.contains_bounds(&b2.grow(-0.001)));
        }

        #[test]
        fn overlap_is_symmetric(b1 in bounds_strategy(), b2 in bounds_strategy()) {
            prop_assert_eq!(b1.overlaps(&b2, 0.0), b2.overlaps(&b1, 0.0));
            prop_assert_eq!(b1.overlaps(&b2, 5.0), b2.overlaps(&b1, 5.0));
        }

        #[test]
        fn clamp_lands_on_perimeter(b in bounds_strategy(), p in point_strategy()) {
            let clamped = b.clamp_to_perimeter(p);
            prop_assert!(b.perimeter_distance(clamped) < 0.01);
        }

        #[test]
        fn translate_preserves_size(b in bounds_strategy(), p in point_strategy()) {
            let moved = b.translate(p);
            prop_assert!(approx_eq!(f32, moved.width(), b.width(), epsilon = 0.01));
            prop_assert!(approx_eq!(f32, moved.height(), b.height(), epsilon = 0.01));
        }

        #[test]
        fn segment_intersection_lies_on_perimeter(
            b in bounds_strategy(),
            a in point_strategy(),
            z in point_strategy(),
        ) {
            if let Some(hit) = b.segment_intersection(a, z) {
                // Intersections reported for a segment that starts outside
                // must land on (or very near) the perimeter.
                if !b.contains_point(a) {
                    prop_assert!(b.perimeter_distance(hit) < 0.1);
                }
            }
        }
    }
}

// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A rectangle.

use crate::Point;

/// An axis-aligned rectangle, stored as `[minx, miny, maxx, maxy]`.
///
/// Path, shape and clip bounds all use this type.
#[derive(Clone, Copy, Default, Debug, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    /// The minimum x coordinate (left edge).
    pub x0: f64,
    /// The minimum y coordinate (top edge in y-down spaces).
    pub y0: f64,
    /// The maximum x coordinate (right edge).
    pub x1: f64,
    /// The maximum y coordinate (bottom edge in y-down spaces).
    pub y1: f64,
}

impl Rect {
    /// The empty rectangle at the origin.
    pub const ZERO: Rect = Rect::new(0., 0., 0., 0.);

    /// A new rectangle from minimum and maximum coordinates.
    #[inline(always)]
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect {
        Rect { x0, y0, x1, y1 }
    }

    /// A new rectangle from two points.
    ///
    /// The result will have non-negative width and height.
    #[inline]
    pub fn from_points(p0: impl Into<Point>, p1: impl Into<Point>) -> Rect {
        let p0 = p0.into();
        let p1 = p1.into();
        Rect::new(p0.x.min(p1.x), p0.y.min(p1.y), p0.x.max(p1.x), p0.y.max(p1.y))
    }

    /// The width of the rectangle.
    ///
    /// Note: nothing forbids negative width.
    #[inline]
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    /// The height of the rectangle.
    ///
    /// Note: nothing forbids negative height.
    #[inline]
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// The top left corner.
    #[inline]
    pub fn origin(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    /// The smallest rectangle enclosing two rectangles.
    ///
    /// Results are valid only if width and height are non-negative.
    #[inline]
    pub fn union(&self, other: Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Compute the union with one point.
    ///
    /// This method includes the perimeter of zero-area rectangles.
    /// Thus, a succession of `union_pt` operations on a series of
    /// points yields their enclosing rectangle.
    #[inline]
    pub fn union_pt(&self, pt: Point) -> Rect {
        Rect::new(
            self.x0.min(pt.x),
            self.y0.min(pt.y),
            self.x1.max(pt.x),
            self.y1.max(pt.y),
        )
    }

    /// Whether the point lies inside the rectangle, edges included.
    #[inline]
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.x0 && pt.x <= self.x1 && pt.y >= self.y0 && pt.y <= self.y1
    }

    /// Multiply every coordinate by `s`.
    #[inline]
    pub fn scale(&self, s: f64) -> Rect {
        Rect::new(self.x0 * s, self.y0 * s, self.x1 * s, self.y1 * s)
    }

    /// Translate by `(tx, ty)` and then scale each axis, as the viewport
    /// fit does for points.
    #[inline]
    pub fn offset_scale(&self, tx: f64, ty: f64, sx: f64, sy: f64) -> Rect {
        Rect::new(
            (self.x0 + tx) * sx,
            (self.y0 + ty) * sy,
            (self.x1 + tx) * sx,
            (self.y1 + ty) * sy,
        )
    }

    /// The union of all rectangles in the iterator, or `None` if it is empty.
    pub fn union_all(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
        rects.into_iter().reduce(|acc, r| acc.union(r))
    }
}

impl From<[f64; 4]> for Rect {
    #[inline]
    fn from(v: [f64; 4]) -> Rect {
        Rect::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Rect> for [f64; 4] {
    #[inline]
    fn from(r: Rect) -> [f64; 4] {
        [r.x0, r.y0, r.x1, r.y1]
    }
}

// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cubic Bézier segments.

use core::ops::Mul;

use arrayvec::ArrayVec;

use crate::{Affine, Point, Rect};

/// Roots closer than this to either end of the parameter range are ignored,
/// as are near-zero polynomial coefficients.
const ROOT_EPSILON: f64 = 1e-12;

/// A single cubic Bézier segment.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CubicBez {
    /// The start point.
    pub p0: Point,
    /// The first control point.
    pub p1: Point,
    /// The second control point.
    pub p2: Point,
    /// The end point.
    pub p3: Point,
}

impl CubicBez {
    /// Create a new cubic Bézier segment.
    #[inline]
    pub fn new<P: Into<Point>>(p0: P, p1: P, p2: P, p3: P) -> CubicBez {
        CubicBez {
            p0: p0.into(),
            p1: p1.into(),
            p2: p2.into(),
            p3: p3.into(),
        }
    }

    /// Evaluate the curve at parameter `t`.
    #[inline]
    pub fn eval(&self, t: f64) -> Point {
        Point::new(
            eval_bezier(t, self.p0.x, self.p1.x, self.p2.x, self.p3.x),
            eval_bezier(t, self.p0.y, self.p1.y, self.p2.y, self.p3.y),
        )
    }

    /// The tight axis-aligned bounding box of the curve.
    ///
    /// See [`curve_bounds`].
    #[inline]
    pub fn bounding_box(&self) -> Rect {
        curve_bounds(self)
    }

    /// Parameter values of the interior extrema along one axis.
    ///
    /// These are the roots of the derivative
    /// `3(1-t)²(v1-v0) + 6(1-t)t(v2-v1) + 3t²(v3-v2)`, written as `at² + bt + c`,
    /// restricted to the open interval `(0, 1)` with a small margin.
    fn axis_extrema(v0: f64, v1: f64, v2: f64, v3: f64) -> ArrayVec<f64, 2> {
        let a = -3.0 * v0 + 9.0 * v1 - 9.0 * v2 + 3.0 * v3;
        let b = 6.0 * v0 - 12.0 * v1 + 6.0 * v2;
        let c = 3.0 * v1 - 3.0 * v0;
        let mut roots = ArrayVec::new();
        let mut push = |t: f64| {
            if t > ROOT_EPSILON && t < 1.0 - ROOT_EPSILON {
                roots.push(t);
            }
        };
        if a.abs() < ROOT_EPSILON {
            if b.abs() > ROOT_EPSILON {
                push(-c / b);
            }
        } else {
            let b2ac = b * b - 4.0 * c * a;
            if b2ac > ROOT_EPSILON {
                let sq = b2ac.sqrt();
                push((-b + sq) / (2.0 * a));
                push((-b - sq) / (2.0 * a));
            }
        }
        roots
    }
}

/// Bernstein evaluation of one coordinate.
#[inline]
fn eval_bezier(t: f64, p0: f64, p1: f64, p2: f64, p3: f64) -> f64 {
    let it = 1.0 - t;
    it * it * it * p0 + 3.0 * it * it * t * p1 + 3.0 * it * t * t * p2 + t * t * t * p3
}

/// Compute the exact bounding box of a cubic segment.
///
/// The box starts from the endpoints. When both control points already lie
/// inside it, the curve does too, by the convex hull property. Otherwise the
/// derivative roots are solved per axis and the curve is evaluated at each
/// root inside `(0, 1)` to extend the box. No sampling is involved.
pub fn curve_bounds(c: &CubicBez) -> Rect {
    let mut bounds = Rect::from_points(c.p0, c.p3);
    if bounds.contains(c.p1) && bounds.contains(c.p2) {
        return bounds;
    }
    for t in CubicBez::axis_extrema(c.p0.x, c.p1.x, c.p2.x, c.p3.x) {
        let v = eval_bezier(t, c.p0.x, c.p1.x, c.p2.x, c.p3.x);
        bounds.x0 = bounds.x0.min(v);
        bounds.x1 = bounds.x1.max(v);
    }
    for t in CubicBez::axis_extrema(c.p0.y, c.p1.y, c.p2.y, c.p3.y) {
        let v = eval_bezier(t, c.p0.y, c.p1.y, c.p2.y, c.p3.y);
        bounds.y0 = bounds.y0.min(v);
        bounds.y1 = bounds.y1.max(v);
    }
    bounds
}

impl Mul<CubicBez> for Affine {
    type Output = CubicBez;

    #[inline]
    fn mul(self, c: CubicBez) -> CubicBez {
        CubicBez {
            p0: self * c.p0,
            p1: self * c.p1,
            p2: self * c.p2,
            p3: self * c.p3,
        }
    }
}

// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Endpoint-parameterized elliptical arcs.

use core::f64::consts::{FRAC_PI_2, PI};

use smallvec::SmallVec;

use crate::{Affine, Point, Vec2};

/// Arcs with a chord or a radius shorter than this become straight lines.
const DEGENERATE_EPSILON: f64 = 1e-6;

/// An elliptical arc in the form of the SVG `A` path command.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EllipticalArc {
    /// The arc's start point.
    pub from: Point,
    /// The arc's end point.
    pub to: Point,
    /// The arc's radii, where the vector's x-component is the radius in the
    /// positive x direction after applying `x_rotation`. Signs are ignored.
    pub radii: Vec2,
    /// How much the ellipse is rotated, in degrees.
    pub x_rotation: f64,
    /// Does this arc sweep through more than π radians?
    pub large_arc: bool,
    /// Determines if the arc should begin moving at positive angles.
    pub sweep: bool,
}

/// One piece of an arc converted to path segments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ArcSegment {
    /// The arc degenerated to a straight line to this point.
    Line(Point),
    /// A cubic segment given by its two control points and end point.
    Cubic(Point, Point, Point),
}

impl EllipticalArc {
    /// Convert the arc to cubic Bézier segments of at most 90° each.
    ///
    /// This follows the endpoint to center conversion of the SVG
    /// implementation notes. Radii too small to reach the end point are
    /// scaled up uniformly. A zero-length chord or a near-zero radius yields
    /// a single [`ArcSegment::Line`] to the end point.
    pub fn to_cubics(&self) -> SmallVec<[ArcSegment; 5]> {
        let mut out = SmallVec::new();
        let mut rx = self.radii.x.abs();
        let mut ry = self.radii.y.abs();
        let (x1, y1) = (self.from.x, self.from.y);
        let (x2, y2) = (self.to.x, self.to.y);

        let dx = x1 - x2;
        let dy = y1 - y2;
        if dx.hypot(dy) < DEGENERATE_EPSILON || rx < DEGENERATE_EPSILON || ry < DEGENERATE_EPSILON {
            out.push(ArcSegment::Line(self.to));
            return out;
        }

        let (sinrx, cosrx) = self.x_rotation.to_radians().sin_cos();

        // Rotated half chord.
        let x1p = cosrx * dx / 2.0 + sinrx * dy / 2.0;
        let y1p = -sinrx * dx / 2.0 + cosrx * dy / 2.0;
        let d = sqr(x1p) / sqr(rx) + sqr(y1p) / sqr(ry);
        if d > 1.0 {
            let d = d.sqrt();
            rx *= d;
            ry *= d;
        }

        // Center in the rotated frame.
        let sa = (sqr(rx) * sqr(ry) - sqr(rx) * sqr(y1p) - sqr(ry) * sqr(x1p)).max(0.0);
        let sb = sqr(rx) * sqr(y1p) + sqr(ry) * sqr(x1p);
        let mut s = if sb > 0.0 { (sa / sb).sqrt() } else { 0.0 };
        if self.large_arc == self.sweep {
            s = -s;
        }
        let cxp = s * rx * y1p / ry;
        let cyp = s * -ry * x1p / rx;

        let cx = (x1 + x2) / 2.0 + cosrx * cxp - sinrx * cyp;
        let cy = (y1 + y2) / 2.0 + sinrx * cxp + cosrx * cyp;

        let u = Vec2::new((x1p - cxp) / rx, (y1p - cyp) / ry);
        let v = Vec2::new((-x1p - cxp) / rx, (-y1p - cyp) / ry);
        let a1 = vec_angle(Vec2::new(1.0, 0.0), u);
        let mut da = vec_angle(u, v);
        if !self.sweep && da > 0.0 {
            da -= 2.0 * PI;
        } else if self.sweep && da < 0.0 {
            da += 2.0 * PI;
        }

        let t = Affine::new([cosrx, sinrx, -sinrx, cosrx, cx, cy]);

        // One iteration per end point, start included.
        let ndivs = (da.abs() / FRAC_PI_2 + 1.0) as usize;
        let mut hda = da / ndivs as f64 / 2.0;
        // The cotangent blows up near zero; use the small-angle limit there.
        if hda.abs() < 1e-3 {
            hda *= 0.5;
        } else {
            hda = (1.0 - hda.cos()) / hda.sin();
        }
        let mut kappa = (4.0 / 3.0 * hda).abs();
        if da < 0.0 {
            kappa = -kappa;
        }

        let mut prev = Point::ZERO;
        let mut prev_tan = Vec2::ZERO;
        for i in 0..=ndivs {
            let a = a1 + da * (i as f64 / ndivs as f64);
            let (dy, dx) = a.sin_cos();
            let p = t * Point::new(dx * rx, dy * ry);
            let tan = transform_vec(t, Vec2::new(-dy * rx * kappa, dx * ry * kappa));
            if i > 0 {
                out.push(ArcSegment::Cubic(prev + prev_tan, p - tan, p));
            }
            prev = p;
            prev_tan = tan;
        }
        out
    }
}

#[inline]
fn sqr(x: f64) -> f64 {
    x * x
}

/// The signed angle from `u` to `v`.
fn vec_angle(u: Vec2, v: Vec2) -> f64 {
    let r = (u.dot(v) / (u.hypot() * v.hypot())).clamp(-1.0, 1.0);
    let sign = if u.x * v.y < u.y * v.x { -1.0 } else { 1.0 };
    sign * r.acos()
}

/// Apply only the linear part of `t`.
#[inline]
fn transform_vec(t: Affine, v: Vec2) -> Vec2 {
    let c = t.as_coeffs();
    Vec2::new(v.x * c[0] + v.y * c[2], v.x * c[1] + v.y * c[3])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(p0: Point, p1: Point) {
        assert!((p1 - p0).hypot() < 1e-9, "{p0:?} != {p1:?}");
    }

    fn arc(
        from: (f64, f64),
        to: (f64, f64),
        r: (f64, f64),
        large_arc: bool,
        sweep: bool,
    ) -> EllipticalArc {
        EllipticalArc {
            from: from.into(),
            to: to.into(),
            radii: r.into(),
            x_rotation: 0.0,
            large_arc,
            sweep,
        }
    }

    #[test]
    fn degenerate_arcs_are_lines() {
        for a in [
            arc((0.0, 0.0), (10.0, 0.0), (0.0, 5.0), false, true),
            arc((0.0, 0.0), (10.0, 0.0), (5.0, 1e-9), false, true),
            arc((3.0, 3.0), (3.0, 3.0), (5.0, 5.0), true, true),
        ] {
            let segs = a.to_cubics();
            assert_eq!(segs.as_slice(), &[ArcSegment::Line(a.to)]);
        }
    }

    fn cubic_ends(segs: &[ArcSegment]) -> Vec<Point> {
        segs.iter()
            .map(|seg| match *seg {
                ArcSegment::Cubic(_, _, p) => p,
                ArcSegment::Line(_) => panic!("expected cubic"),
            })
            .collect()
    }

    #[test]
    fn semicircle() {
        // Half of the unit circle centered at (1, 0), in 60° pieces.
        let segs = arc((0.0, 0.0), (2.0, 0.0), (1.0, 1.0), false, true).to_cubics();
        let ends = cubic_ends(&segs);
        assert_eq!(ends.len(), 3);
        for p in &ends {
            assert!((p.distance(Point::new(1.0, 0.0)) - 1.0).abs() < 1e-9, "{p:?}");
            assert!(p.y <= 1e-9, "positive sweep stays above the chord: {p:?}");
        }
        assert_near(ends[2], Point::new(2.0, 0.0));
    }

    #[test]
    fn sweep_flag_picks_side() {
        let segs = arc((0.0, 0.0), (2.0, 0.0), (1.0, 1.0), false, false).to_cubics();
        for p in cubic_ends(&segs) {
            assert!(p.y >= -1e-9, "negative sweep stays below the chord: {p:?}");
        }
    }

    #[test]
    fn small_radii_are_scaled() {
        // Radius 0.5 cannot span a chord of 4; it grows to 2.
        let segs = arc((0.0, 0.0), (4.0, 0.0), (0.5, 0.5), false, true).to_cubics();
        for seg in &segs {
            let ArcSegment::Cubic(_, _, p) = *seg else {
                panic!("expected cubic");
            };
            assert!((p.distance(Point::new(2.0, 0.0)) - 2.0).abs() < 1e-9, "{p:?}");
        }
    }

    #[test]
    fn large_arc_uses_more_segments() {
        let small = arc((0.0, 0.0), (1.0, 1.0), (1.0, 1.0), false, true).to_cubics();
        let large = arc((0.0, 0.0), (1.0, 1.0), (1.0, 1.0), true, true).to_cubics();
        assert!(large.len() > small.len(), "{} <= {}", large.len(), small.len());
        for segs in [&small, &large] {
            let ends = cubic_ends(segs);
            assert_near(ends[ends.len() - 1], Point::new(1.0, 1.0));
        }
    }
}

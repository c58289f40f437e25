// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The resolved scene: paths, shapes, clip paths and the image root.

use arrayvec::ArrayVec;

use crate::{curve_bounds, Affine, Animate, CubicBez, Paint, Point, Rect};

/// A run of cubic segments sharing a start point.
///
/// The first point is the start; every following group of three is
/// `(control1, control2, end)` of one cubic. Straight lines are stored as
/// cubics with their handles at the thirds.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    points: Vec<Point>,
    closed: bool,
    bounds: Rect,
}

impl Path {
    /// Build a path from its points.
    ///
    /// Returns `None` unless there are at least 4 points and the count is one
    /// more than a multiple of 3.
    pub fn from_points(points: Vec<Point>, closed: bool) -> Option<Path> {
        if points.len() < 4 || points.len() % 3 != 1 {
            return None;
        }
        let mut path = Path {
            points,
            closed,
            bounds: Rect::ZERO,
        };
        path.update_bounds();
        Some(path)
    }

    /// The points, start point first.
    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Whether the last point connects back to the first.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The tight bounding box of the curve.
    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// The cubic segments of the path.
    pub fn segments(&self) -> impl Iterator<Item = CubicBez> + '_ {
        let start = self.points[0];
        self.points[1..]
            .chunks_exact(3)
            .scan(start, |p0, c| {
                let seg = CubicBez::new(*p0, c[0], c[1], c[2]);
                *p0 = c[2];
                Some(seg)
            })
    }

    /// Map every point through `f` and recompute the bounds.
    pub(crate) fn map_points(&mut self, f: impl Fn(Point) -> Point) {
        for p in &mut self.points {
            *p = f(*p);
        }
        self.update_bounds();
    }

    /// Apply the viewport mapping `(p + t) * s` to points and bounds.
    ///
    /// The bounds are mapped rather than recomputed, which is exact for a
    /// positive scale.
    pub(crate) fn offset_scale(&mut self, tx: f64, ty: f64, sx: f64, sy: f64) {
        for p in &mut self.points {
            *p = p.offset_scale(tx, ty, sx, sy);
        }
        self.bounds = self.bounds.offset_scale(tx, ty, sx, sy);
    }

    fn update_bounds(&mut self) {
        self.bounds =
            Rect::union_all(self.segments().map(|c| curve_bounds(&c))).unwrap_or_default();
    }
}

/// How the ends of open strokes are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineCap {
    /// Flat at the end point.
    #[default]
    Butt,
    /// A half disc.
    Round,
    /// A half square.
    Square,
}

impl LineCap {
    pub(crate) fn parse(s: &str) -> LineCap {
        match s {
            "round" => LineCap::Round,
            "square" => LineCap::Square,
            _ => LineCap::Butt,
        }
    }
}

/// How stroke segments are joined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineJoin {
    /// A sharp corner, up to the miter limit.
    #[default]
    Miter,
    /// A circular arc.
    Round,
    /// A straight cut.
    Bevel,
}

impl LineJoin {
    pub(crate) fn parse(s: &str) -> LineJoin {
        match s {
            "round" => LineJoin::Round,
            "bevel" => LineJoin::Bevel,
            _ => LineJoin::Miter,
        }
    }
}

/// The fill rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FillRule {
    /// Non-zero winding.
    #[default]
    NonZero,
    /// Even-odd.
    EvenOdd,
}

impl FillRule {
    pub(crate) fn parse(s: &str) -> FillRule {
        match s {
            "evenodd" => FillRule::EvenOdd,
            _ => FillRule::NonZero,
        }
    }
}

/// The `mix-blend-mode` of a shape, used for its gradient fills.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendMode {
    /// Ordinary source-over.
    #[default]
    Normal,
    /// `multiply`.
    Multiply,
    /// `screen`.
    Screen,
}

impl BlendMode {
    pub(crate) fn parse(s: &str) -> BlendMode {
        match s {
            "multiply" => BlendMode::Multiply,
            "screen" => BlendMode::Screen,
            _ => BlendMode::Normal,
        }
    }
}

/// Maximum number of dash entries.
pub const MAX_DASHES: usize = 8;

/// Stroke geometry parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct StrokeStyle {
    /// Stroke width.
    pub width: f64,
    /// Offset into the dash pattern.
    pub dash_offset: f64,
    /// Alternating dash and gap lengths. Empty means solid.
    pub dashes: ArrayVec<f64, MAX_DASHES>,
    /// End cap.
    pub cap: LineCap,
    /// Corner join.
    pub join: LineJoin,
    /// Miter limit.
    pub miter_limit: f64,
}

impl Default for StrokeStyle {
    fn default() -> StrokeStyle {
        StrokeStyle {
            width: 1.0,
            dash_offset: 0.0,
            dashes: ArrayVec::new(),
            cap: LineCap::Butt,
            join: LineJoin::Miter,
            miter_limit: 4.0,
        }
    }
}

impl StrokeStyle {
    /// Multiply the lengths by `s`.
    pub(crate) fn scale(&mut self, s: f64) {
        self.width *= s;
        self.dash_offset *= s;
        for d in &mut self.dashes {
            *d *= s;
        }
    }
}

/// The target size range outside of which a shape is hidden, from an
/// `@media` rule. Zero means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaRange {
    /// `min-width`.
    pub min_width: f64,
    /// `max-width`.
    pub max_width: f64,
    /// `min-height`.
    pub min_height: f64,
    /// `max-height`.
    pub max_height: f64,
}

impl MediaRange {
    /// Is a target of this size outside the range?
    pub fn excludes(&self, width: f64, height: f64) -> bool {
        (self.max_width > 0.0 && self.max_width < width)
            || (self.max_height > 0.0 && self.max_height < height)
            || self.min_width > width
            || self.min_height > height
    }
}

/// Index of a clip path in [`Image::clip_paths`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub usize);

/// A clip path: geometry only, drawn as an opaque mask.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClipPath {
    /// The `id` it was defined with.
    pub id: String,
    /// The mask geometry, in document coordinates.
    pub paths: Vec<Path>,
}

/// One drawable item.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    /// The `id` attribute, possibly empty.
    pub id: String,
    /// Interior paint.
    pub fill: Paint,
    /// Outline paint.
    pub stroke: Paint,
    /// Group opacity.
    pub opacity: f64,
    /// Fill opacity.
    pub fill_opacity: f64,
    /// Stroke opacity.
    pub stroke_opacity: f64,
    /// Stroke geometry.
    pub stroke_style: StrokeStyle,
    /// Fill rule.
    pub fill_rule: FillRule,
    /// Whether the shape is drawn at all.
    pub visible: bool,
    /// Union of the path bounds, or of nothing for text and images.
    pub bounds: Rect,
    /// The transform in effect when the shape was built. The points are
    /// already transformed; this is kept for paint servers.
    pub transform: Affine,
    /// Geometry.
    pub paths: Vec<Path>,
    /// The clip path this shape is drawn through.
    pub clip: Option<ClipId>,
    /// Blend mode for gradient fills.
    pub blend: BlendMode,
    /// Size range from `@media`.
    pub media: Option<MediaRange>,
    /// Animation descriptor from an enclosing `animateTransform`.
    pub animate: Option<Animate>,
    /// Font size in effect.
    pub font_size: f64,
}

impl Default for Shape {
    fn default() -> Shape {
        Shape {
            id: String::new(),
            fill: Paint::None,
            stroke: Paint::None,
            opacity: 1.0,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            stroke_style: StrokeStyle::default(),
            fill_rule: FillRule::NonZero,
            visible: true,
            bounds: Rect::ZERO,
            transform: Affine::IDENTITY,
            paths: Vec::new(),
            clip: None,
            blend: BlendMode::Normal,
            media: None,
            animate: None,
            font_size: 0.0,
        }
    }
}

impl Shape {
    /// Recompute [`Shape::bounds`] from the paths.
    pub(crate) fn update_bounds(&mut self) {
        self.bounds = Rect::union_all(self.paths.iter().map(Path::bounds)).unwrap_or_default();
    }
}

/// A parsed and resolved document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Image {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
    /// Shapes in painting order, back to front.
    pub shapes: Vec<Shape>,
    /// Clip paths referenced by [`Shape::clip`].
    pub clip_paths: Vec<ClipPath>,
}

impl Image {
    /// The clip path with the given index.
    pub fn clip_path(&self, id: ClipId) -> Option<&ClipPath> {
        self.clip_paths.get(id.0)
    }
}

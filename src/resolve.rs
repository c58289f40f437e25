// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The pass that turns a parsed [`Document`] into an [`Image`].
//!
//! Paint references become patterns or gradients, the view box is fitted
//! to the requested size, and clip paths no shape uses are dropped.

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::attr::Viewport;
use crate::defs::{GradientDef, GradientKind, PatternDef};
use crate::lexer::{Coordinate, Units};
use crate::parser::{AspectRatio, Document, Fit, RawPaint, ShapeDraft, ViewBox};
use crate::{
    Affine, ClipId, CoordinateSpace, Gradient, GradientGeometry, Image, Paint, ParseOptions,
    Pattern, Point, Rect, Shape,
};

/// `href` chains are followed for at most this many hops.
pub(crate) const MAX_HREF_HOPS: usize = 32;

/// Indices of `start` and the definitions its `href` chain reaches, in
/// order. Stops at a missing id, a cycle or [`MAX_HREF_HOPS`].
fn href_chain<T>(
    defs: &[T],
    start: usize,
    id: impl Fn(&T) -> &str,
    href: impl Fn(&T) -> &str,
) -> SmallVec<[usize; 4]> {
    let mut chain = SmallVec::new();
    chain.push(start);
    let mut cur = start;
    for _ in 0..MAX_HREF_HOPS {
        let target = href(&defs[cur]);
        if target.is_empty() {
            break;
        }
        let Some(next) = defs.iter().rposition(|d| id(d) == target) else {
            break;
        };
        if chain.contains(&next) {
            break;
        }
        chain.push(next);
        cur = next;
    }
    chain
}

/// Lookup tables for paint references.
struct Resolver<'a> {
    gradients: &'a [GradientDef],
    patterns: &'a [PatternDef],
    viewport: Viewport,
}

impl Resolver<'_> {
    /// Resolve a draft. Pattern content is resolved with `nested` set, where
    /// pattern references become [`Paint::None`].
    fn shape(&self, draft: ShapeDraft, nested: bool) -> Shape {
        let ShapeDraft {
            mut shape,
            fill,
            stroke,
            fill_gradient,
            fill_pattern,
            stroke_gradient,
        } = draft;
        let fill = match fill {
            RawPaint::Url => {
                let pattern = self
                    .patterns
                    .iter()
                    .rposition(|p| p.id == fill_pattern && !p.id.is_empty());
                match pattern {
                    Some(_) if nested => Paint::None,
                    Some(index) => self.pattern(index),
                    None => self.gradient(&fill_gradient, &shape),
                }
            }
            other => convert(other),
        };
        let stroke = match stroke {
            RawPaint::Url => self.gradient(&stroke_gradient, &shape),
            other => convert(other),
        };
        shape.fill = fill;
        shape.stroke = stroke;
        shape
    }

    fn gradient(&self, id: &str, shape: &Shape) -> Paint {
        let Some(start) = self.gradients.iter().rposition(|g| g.id == id && !id.is_empty()) else {
            warn!(id, "unresolved paint reference");
            return Paint::None;
        };
        let chain = href_chain(self.gradients, start, |g| g.id.as_str(), |g| g.href.as_str());
        let def = &self.gradients[start];
        let inherited = |f: fn(&GradientDef) -> bool| {
            chain.iter().map(|&i| &self.gradients[i]).find(|g| f(g))
        };
        let units =
            inherited(|g| g.units_set).map_or(CoordinateSpace::ObjectBoundingBox, |g| g.units);
        let transform = inherited(|g| g.transform_set).map_or(Affine::IDENTITY, |g| g.transform);
        let Some(stops) = inherited(|g| !g.stops.is_empty()).map(|g| g.stops.clone()) else {
            return Paint::None;
        };

        let vp = &self.viewport;
        let coord = |i: usize, origin: f64, length: f64| {
            resolve_coord(def.coords[i], units, vp, origin, length)
        };
        let transform = match units {
            CoordinateSpace::UserSpace => shape.transform * transform,
            CoordinateSpace::ObjectBoundingBox => transform,
        };
        let (geometry, linear) = match def.kind {
            GradientKind::Linear => (
                GradientGeometry::Linear {
                    start: Point::new(coord(0, vp.x, vp.width), coord(1, vp.y, vp.height)),
                    end: Point::new(coord(2, vp.x, vp.width), coord(3, vp.y, vp.height)),
                },
                true,
            ),
            GradientKind::Radial => (
                GradientGeometry::Radial {
                    center: Point::new(coord(0, vp.x, vp.width), coord(1, vp.y, vp.height)),
                    radius: coord(2, 0.0, vp.diagonal()),
                    focus: Point::new(coord(3, vp.x, vp.width), coord(4, vp.y, vp.height)),
                },
                false,
            ),
        };
        let gradient = Box::new(Gradient {
            geometry,
            stops,
            spread: def.spread,
            units,
            transform,
        });
        if linear {
            Paint::LinearGradient(gradient)
        } else {
            Paint::RadialGradient(gradient)
        }
    }

    /// A pattern takes tile geometry and content from the first definition
    /// along its `href` chain that has them.
    fn pattern(&self, index: usize) -> Paint {
        let chain = href_chain(self.patterns, index, |p| p.id.as_str(), |p| p.href.as_str());
        let defs = || chain.iter().map(|&i| &self.patterns[i]);
        let def = &self.patterns[index];
        let size = defs()
            .find(|p| p.width.value > 0.0 && p.height.value > 0.0)
            .map_or((0.0, 0.0), |p| (p.width.value, p.height.value));
        let content = defs().find(|p| !p.shapes.is_empty() || p.image.is_some()).unwrap_or(def);
        let mut shapes: Vec<Shape> = content
            .shapes
            .iter()
            .cloned()
            .map(|draft| self.shape(draft, true))
            .collect();
        let [vx, vy, vw, vh] = content.view_box;
        if vw > 0.0 && vh > 0.0 && size.0 > 0.0 && size.1 > 0.0 {
            let (sx, sy) = (size.0 / vw, size.1 / vh);
            for shape in &mut shapes {
                for path in &mut shape.paths {
                    path.offset_scale(-vx, -vy, sx, sy);
                }
                shape.update_bounds();
            }
        }
        Paint::Pattern(Box::new(Pattern {
            x: def.x.value,
            y: def.y.value,
            width: size.0,
            height: size.1,
            units: def.units,
            shapes,
            image: content.image.clone(),
        }))
    }
}

fn convert(paint: RawPaint) -> Paint {
    match paint {
        RawPaint::None | RawPaint::Url => Paint::None,
        RawPaint::Color(c) => Paint::Color(c),
        RawPaint::Text(text, c) => Paint::Text(text, c),
        RawPaint::Image(image) => Paint::Image(image),
    }
}

/// A gradient coordinate. Percentages are fractions of the bounding box, or
/// of the viewport in user space.
fn resolve_coord(
    c: Coordinate,
    units: CoordinateSpace,
    vp: &Viewport,
    origin: f64,
    length: f64,
) -> f64 {
    match (c.units, units) {
        (Units::Percent, CoordinateSpace::ObjectBoundingBox) => c.value / 100.0,
        (Units::Percent, CoordinateSpace::UserSpace) => origin + c.value / 100.0 * length,
        _ => c.to_pixels(vp.dpi, 0.0, 0.0, 0.0),
    }
}

/// The mapping from document units to output pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ViewTransform {
    tx: f64,
    ty: f64,
    sx: f64,
    sy: f64,
}

impl ViewTransform {
    fn affine(self) -> Affine {
        Affine::new([self.sx, 0.0, 0.0, self.sy, self.tx * self.sx, self.ty * self.sy])
    }
}

/// Work out the view box mapping, filling in a missing image size.
fn fit_view_box(
    image: &mut Image,
    vb: ViewBox,
    aspect: AspectRatio,
    options: &ParseOptions,
) -> ViewTransform {
    let bounds = Rect::union_all(
        image
            .shapes
            .iter()
            .filter(|s| !s.paths.is_empty())
            .map(|s| s.bounds),
    )
    .unwrap_or_default();
    let ViewBox {
        x: mut vx,
        y: mut vy,
        width: mut vw,
        height: mut vh,
    } = vb;
    if vw == 0.0 {
        if image.width > 0.0 {
            vw = image.width;
        } else {
            vx = bounds.x0;
            vw = bounds.width();
        }
    }
    if vh == 0.0 {
        if image.height > 0.0 {
            vh = image.height;
        } else {
            vy = bounds.y0;
            vh = bounds.height();
        }
    }
    if image.width == 0.0 {
        image.width = vw;
    }
    if image.height == 0.0 {
        image.height = vh;
    }

    let (mut tx, mut ty) = (-vx, -vy);
    let mut sx = if vw > 0.0 { image.width / vw } else { 0.0 };
    let mut sy = if vh > 0.0 { image.height / vh } else { 0.0 };
    let uniform = match aspect.fit {
        Fit::Meet => Some(sx.min(sy)),
        Fit::Slice => Some(sx.max(sy)),
        Fit::None => None,
    };
    if let Some(s) = uniform {
        sx = s;
        sy = s;
        if s > 0.0 {
            tx += aspect.x.offset(vw * s, image.width) / s;
            ty += aspect.y.offset(vh * s, image.height) / s;
        }
    }
    let unit = Coordinate::new(1.0, options.units).to_pixels(options.dpi, 0.0, 0.0, 1.0);
    let us = if unit > 0.0 { 1.0 / unit } else { 1.0 };
    ViewTransform {
        tx,
        ty,
        sx: sx * us,
        sy: sy * us,
    }
}

fn scale_paint(paint: &mut Paint, view: ViewTransform) {
    match paint {
        Paint::Text(text, _) => {
            text.x *= view.sx;
            text.y *= view.sy;
        }
        Paint::Image(image) => {
            image.x *= view.sx;
            image.y *= view.sy;
            image.width *= view.sx;
            image.height *= view.sy;
        }
        Paint::LinearGradient(g) | Paint::RadialGradient(g)
            if g.units == CoordinateSpace::UserSpace =>
        {
            g.transform = view.affine() * g.transform;
        }
        _ => {}
    }
}

/// Map every shape and clip path from document units into output pixels.
fn scale_to_view_box(image: &mut Image, vb: ViewBox, aspect: AspectRatio, options: &ParseOptions) {
    let view = fit_view_box(image, vb, aspect, options);
    let ViewTransform { tx, ty, sx, sy } = view;
    let average = (sx + sy) * 0.5;
    debug!(tx, ty, sx, sy, "view box mapping");
    for shape in &mut image.shapes {
        shape.bounds = shape.bounds.offset_scale(tx, ty, sx, sy);
        for path in &mut shape.paths {
            path.offset_scale(tx, ty, sx, sy);
        }
        shape.stroke_style.scale(average);
        scale_paint(&mut shape.fill, view);
        scale_paint(&mut shape.stroke, view);
    }
    for clip in &mut image.clip_paths {
        for path in &mut clip.paths {
            path.offset_scale(tx, ty, sx, sy);
        }
    }
}

/// Visit the clip reference of every shape, pattern content included.
fn for_each_clip(shapes: &mut [Shape], f: &mut impl FnMut(&mut Option<ClipId>)) {
    for shape in shapes {
        f(&mut shape.clip);
        if let Paint::Pattern(pattern) = &mut shape.fill {
            for_each_clip(&mut pattern.shapes, f);
        }
    }
}

/// Drop the clip paths no shape refers to and renumber the rest.
fn sweep_clip_paths(image: &mut Image) {
    let mut used = vec![false; image.clip_paths.len()];
    for_each_clip(&mut image.shapes, &mut |clip| {
        if let Some(ClipId(i)) = *clip {
            match used.get_mut(i) {
                Some(slot) => *slot = true,
                None => *clip = None,
            }
        }
    });
    let mut remap = vec![None; used.len()];
    let mut next = 0;
    for (slot, &keep) in remap.iter_mut().zip(&used) {
        if keep {
            *slot = Some(ClipId(next));
            next += 1;
        }
    }
    for_each_clip(&mut image.shapes, &mut |clip| {
        *clip = clip.and_then(|ClipId(i)| remap[i]);
    });
    let before = image.clip_paths.len();
    let mut used = used.into_iter();
    image.clip_paths.retain(|_| used.next().unwrap_or(false));
    debug!(before, after = image.clip_paths.len(), "swept clip paths");
}

/// Resolve references and fit the view box.
pub(crate) fn resolve(doc: Document, options: &ParseOptions) -> Image {
    let Document {
        width,
        height,
        view_box,
        aspect,
        viewport,
        shapes,
        gradients,
        patterns,
        clip_paths,
    } = doc;
    let resolver = Resolver {
        gradients: &gradients,
        patterns: &patterns,
        viewport,
    };
    let shapes = shapes.into_iter().map(|draft| resolver.shape(draft, false)).collect();
    let mut image = Image {
        width,
        height,
        shapes,
        clip_paths,
    };
    scale_to_view_box(&mut image, view_box, aspect, options);
    sweep_clip_paths(&mut image);
    image
}

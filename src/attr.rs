// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Inherited presentation attributes.

use core::f64::consts::SQRT_2;

use arrayvec::ArrayVec;

use crate::css::parse_declarations;
use crate::lexer::{atof, is_space, Coordinate};
use crate::shape::MAX_DASHES;
use crate::transform::parse_transform;
use crate::{
    parse_color, parse_rgba_alpha, Affine, BlendMode, Color, FillRule, LineCap, LineJoin,
    StrokeStyle,
};

/// The attribute stack holds at most this many records.
pub(crate) const MAX_ATTRIB_DEPTH: usize = 128;

/// Identifiers longer than this are truncated.
pub(crate) const MAX_ID_LEN: usize = 63;

/// Where a fill or stroke comes from, before references are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum PaintSource {
    /// `none`.
    None,
    /// The solid color in the record.
    #[default]
    Color,
    /// A `url(#id)` reference.
    Url,
}

/// Lengths are converted against this box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Viewport {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
    pub(crate) dpi: f64,
}

impl Viewport {
    pub(crate) fn new(dpi: f64) -> Viewport {
        Viewport {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            dpi,
        }
    }

    /// The reference length for radii and stroke widths.
    pub(crate) fn diagonal(&self) -> f64 {
        self.width.hypot(self.height) / SQRT_2
    }

    pub(crate) fn x(&self, s: &str, font_size: f64) -> f64 {
        Coordinate::parse(s).to_pixels(self.dpi, font_size, self.x, self.width)
    }

    pub(crate) fn y(&self, s: &str, font_size: f64) -> f64 {
        Coordinate::parse(s).to_pixels(self.dpi, font_size, self.y, self.height)
    }

    /// A horizontal extent; percentages are of the viewport width.
    pub(crate) fn width(&self, s: &str, font_size: f64) -> f64 {
        Coordinate::parse(s).to_pixels(self.dpi, font_size, 0.0, self.width)
    }

    pub(crate) fn height(&self, s: &str, font_size: f64) -> f64 {
        Coordinate::parse(s).to_pixels(self.dpi, font_size, 0.0, self.height)
    }

    pub(crate) fn length(&self, s: &str, font_size: f64) -> f64 {
        Coordinate::parse(s).to_pixels(self.dpi, font_size, 0.0, self.diagonal())
    }
}

/// What attribute assignment needs to know about the document.
pub(crate) struct AttrContext<'a> {
    pub(crate) viewport: Viewport,
    /// Whether a pattern with this id has been defined so far.
    pub(crate) is_pattern: &'a dyn Fn(&str) -> bool,
}

/// One record of the attribute stack.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Attrib {
    pub(crate) id: String,
    pub(crate) transform: Affine,
    pub(crate) fill_color: Color,
    pub(crate) stroke_color: Color,
    pub(crate) opacity: f64,
    pub(crate) fill_opacity: f64,
    pub(crate) stroke_opacity: f64,
    pub(crate) fill: PaintSource,
    pub(crate) stroke: PaintSource,
    /// `fill` was given explicitly on this element or an ancestor.
    pub(crate) fill_set: bool,
    /// `stroke` was given explicitly on this element or an ancestor.
    pub(crate) stroke_set: bool,
    pub(crate) fill_gradient: String,
    pub(crate) fill_pattern: String,
    pub(crate) stroke_gradient: String,
    pub(crate) clip_path: String,
    pub(crate) stroke_style: StrokeStyle,
    pub(crate) fill_rule: FillRule,
    pub(crate) font_size: f64,
    pub(crate) stop_color: Color,
    pub(crate) stop_opacity: f64,
    pub(crate) stop_offset: f64,
    pub(crate) visible: bool,
    pub(crate) blend: BlendMode,
    pub(crate) transform_origin: String,
    pub(crate) transform_box: String,
}

impl Default for Attrib {
    fn default() -> Attrib {
        Attrib {
            id: String::new(),
            transform: Affine::IDENTITY,
            fill_color: Color::from_rgb8(0, 0, 0),
            stroke_color: Color::from_rgb8(0, 0, 0),
            opacity: 1.0,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            fill: PaintSource::Color,
            stroke: PaintSource::None,
            fill_set: false,
            stroke_set: false,
            fill_gradient: String::new(),
            fill_pattern: String::new(),
            stroke_gradient: String::new(),
            clip_path: String::new(),
            stroke_style: StrokeStyle::default(),
            fill_rule: FillRule::NonZero,
            font_size: 0.0,
            stop_color: Color::TRANSPARENT,
            stop_opacity: 1.0,
            stop_offset: 0.0,
            visible: true,
            blend: BlendMode::Normal,
            transform_origin: String::new(),
            transform_box: String::new(),
        }
    }
}

impl Attrib {
    /// Assign one presentation attribute.
    ///
    /// Returns `false` for names this table does not know, so the caller can
    /// try element specific attributes.
    pub(crate) fn apply(&mut self, name: &str, value: &str, cx: &AttrContext<'_>) -> bool {
        let vp = &cx.viewport;
        match name {
            "style" => self.apply_style(value, cx),
            "display" => {
                if value.contains("none") {
                    self.visible = false;
                }
            }
            "fill" => {
                self.fill_set = true;
                if value == "none" {
                    self.fill = PaintSource::None;
                } else if value.starts_with("url(") {
                    self.fill = PaintSource::Url;
                    let id = parse_url(value);
                    if (cx.is_pattern)(id) {
                        self.fill_pattern = id.to_string();
                    } else {
                        self.fill_gradient = id.to_string();
                    }
                } else {
                    self.fill = PaintSource::Color;
                    self.fill_color = parse_color(value);
                    if value.contains("rgba(") {
                        self.fill_opacity = parse_rgba_alpha(value).clamp(0.0, 1.0);
                    }
                }
            }
            "stroke" => {
                self.stroke_set = true;
                if value == "none" {
                    self.stroke = PaintSource::None;
                } else if value.starts_with("url(") {
                    self.stroke = PaintSource::Url;
                    self.stroke_gradient = parse_url(value).to_string();
                } else {
                    self.stroke = PaintSource::Color;
                    self.stroke_color = parse_color(value);
                    if value.contains("rgba(") {
                        self.stroke_opacity = parse_rgba_alpha(value).clamp(0.0, 1.0);
                    }
                }
            }
            "opacity" => {
                let v = if value == "null" { 1.0 } else { parse_opacity(value) };
                self.opacity = self.opacity.min(v);
            }
            "fill-opacity" => self.fill_opacity = parse_opacity(value),
            "stroke-opacity" => self.stroke_opacity = parse_opacity(value),
            "stroke-width" => self.stroke_style.width = vp.length(value, self.font_size),
            "stroke-dasharray" => {
                self.stroke_style.dashes = parse_dash_array(value, vp, self.font_size);
            }
            "stroke-dashoffset" => {
                self.stroke_style.dash_offset = vp.length(value, self.font_size);
            }
            "stroke-linecap" => self.stroke_style.cap = LineCap::parse(value),
            "stroke-linejoin" => self.stroke_style.join = LineJoin::parse(value),
            "stroke-miterlimit" => self.stroke_style.miter_limit = parse_miter_limit(value),
            "fill-rule" => self.fill_rule = FillRule::parse(value),
            "font-size" => self.font_size = vp.length(value, self.font_size),
            "transform" => self.transform = self.transform * parse_transform(value),
            "clip-path" => self.clip_path = parse_url(value).to_string(),
            "stop-color" => self.stop_color = parse_color(value),
            "stop-opacity" => self.stop_opacity = parse_opacity(value),
            "offset" => {
                self.stop_offset =
                    Coordinate::parse(value).to_pixels(vp.dpi, self.font_size, 0.0, 1.0);
            }
            "id" => self.id = truncate(value, MAX_ID_LEN).to_string(),
            "mix-blend-mode" => self.blend = BlendMode::parse(value),
            "transform-origin" => self.transform_origin = value.to_string(),
            "transform-box" => self.transform_box = value.to_string(),
            _ => return false,
        }
        true
    }

    /// Assign every declaration of an inline `style` attribute.
    fn apply_style(&mut self, style: &str, cx: &AttrContext<'_>) {
        for (name, value) in parse_declarations(style) {
            self.apply(name, value, cx);
        }
    }
}

/// The attribute stack.
///
/// Pushing copies the top record. At [`MAX_ATTRIB_DEPTH`] a push does
/// nothing, and popping the base record does nothing.
#[derive(Clone, Debug, Default)]
pub(crate) struct AttribStack {
    top: Attrib,
    saved: Vec<Attrib>,
}

impl AttribStack {
    pub(crate) fn top(&self) -> &Attrib {
        &self.top
    }

    pub(crate) fn top_mut(&mut self) -> &mut Attrib {
        &mut self.top
    }

    pub(crate) fn depth(&self) -> usize {
        self.saved.len() + 1
    }

    pub(crate) fn push(&mut self) {
        if self.depth() < MAX_ATTRIB_DEPTH {
            self.saved.push(self.top.clone());
        }
    }

    pub(crate) fn pop(&mut self) {
        if let Some(attr) = self.saved.pop() {
            self.top = attr;
        }
    }
}

/// Truncate to at most `max` bytes on a character boundary.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// An opacity clamped to `0..=1`.
pub(crate) fn parse_opacity(s: &str) -> f64 {
    atof(s.trim_start_matches(|c: char| c.is_ascii() && is_space(c as u8))).clamp(0.0, 1.0)
}

/// A miter limit, never negative.
pub(crate) fn parse_miter_limit(s: &str) -> f64 {
    atof(s.trim_start_matches(|c: char| c.is_ascii() && is_space(c as u8))).max(0.0)
}

/// The identifier inside `url(#id)`.
///
/// Also accepts `url('#id')` and a missing `#`.
pub(crate) fn parse_url(s: &str) -> &str {
    let s = s.strip_prefix("url(").unwrap_or(s);
    let s = s.strip_prefix('\'').unwrap_or(s);
    let s = s.strip_prefix('#').unwrap_or(s);
    let end = s.find([')', '\'']).unwrap_or(s.len());
    truncate(&s[..end], MAX_ID_LEN)
}

/// Parse `stroke-dasharray`.
///
/// Entries are absolute lengths. A pattern that sums to zero is no pattern,
/// and a single entry is repeated to make a dash and a gap.
pub(crate) fn parse_dash_array(
    s: &str,
    vp: &Viewport,
    font_size: f64,
) -> ArrayVec<f64, MAX_DASHES> {
    let mut dashes = ArrayVec::new();
    if s.starts_with('n') {
        return dashes;
    }
    for item in s
        .split(|c: char| c == ',' || (c.is_ascii() && is_space(c as u8)))
        .filter(|item| !item.is_empty())
        .take(MAX_DASHES)
    {
        dashes.push(vp.length(item, font_size).abs());
    }
    if dashes.iter().sum::<f64>() <= 1e-6 {
        dashes.clear();
    } else if dashes.len() == 1 {
        dashes.push(dashes[0]);
    }
    dashes
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn cx(is_pattern: &dyn Fn(&str) -> bool) -> AttrContext<'_> {
        let mut viewport = Viewport::new(96.0);
        viewport.width = 100.0;
        viewport.height = 100.0;
        AttrContext { viewport, is_pattern }
    }

    fn no_patterns(_: &str) -> bool {
        false
    }

    #[test]
    fn defaults() {
        let a = Attrib::default();
        assert_eq!(a.fill, PaintSource::Color);
        assert_eq!(a.stroke, PaintSource::None);
        assert_eq!(a.fill_color, Color(0));
        assert_eq!(a.stroke_style.width, 1.0);
        assert_eq!(a.stroke_style.miter_limit, 4.0);
        assert_eq!(a.opacity, 1.0);
        assert!(a.visible);
    }

    #[test]
    fn opacity_takes_minimum() {
        let cx = cx(&no_patterns);
        let mut a = Attrib::default();
        a.apply("opacity", "0.5", &cx);
        a.apply("opacity", "0.8", &cx);
        assert_eq!(a.opacity, 0.5);
        a.apply("opacity", "0.2", &cx);
        assert_eq!(a.opacity, 0.2);
        a.apply("opacity", "null", &cx);
        assert_eq!(a.opacity, 0.2);
        a.apply("fill-opacity", "7", &cx);
        assert_eq!(a.fill_opacity, 1.0);
    }

    #[test]
    fn fill_and_stroke() {
        let cx = cx(&|id: &str| id == "pat");
        let mut a = Attrib::default();
        assert!(a.apply("fill", "#ff0000", &cx));
        assert_eq!(a.fill_color, Color::from_rgb8(255, 0, 0));
        assert!(a.fill_set);
        a.apply("fill", "url(#grad)", &cx);
        assert_eq!(a.fill, PaintSource::Url);
        assert_eq!(a.fill_gradient, "grad");
        a.apply("fill", "url('#pat')", &cx);
        assert_eq!(a.fill_pattern, "pat");
        a.apply("fill", "rgba(0,0,255,0.5)", &cx);
        assert_eq!(a.fill, PaintSource::Color);
        assert_eq!(a.fill_opacity, 0.5);
        a.apply("stroke", "none", &cx);
        assert_eq!(a.stroke, PaintSource::None);
        a.apply("stroke", "blue", &cx);
        assert_eq!(a.stroke, PaintSource::Color);
        assert_eq!(a.stroke_color, Color::from_rgb8(0, 0, 255));
    }

    #[test]
    fn inline_style() {
        let cx = cx(&no_patterns);
        let mut a = Attrib::default();
        a.apply("style", " fill : none ; stroke-width:3; stroke-linecap: round;bogus", &cx);
        assert_eq!(a.fill, PaintSource::None);
        assert_eq!(a.stroke_style.width, 3.0);
        assert_eq!(a.stroke_style.cap, LineCap::Round);
    }

    #[test]
    fn unknown_names_are_not_handled() {
        let cx = cx(&no_patterns);
        let mut a = Attrib::default();
        assert!(!a.apply("x", "10", &cx));
        assert!(!a.apply("width", "10", &cx));
        assert_eq!(a, Attrib::default());
    }

    #[test]
    fn transform_composes() {
        let cx = cx(&no_patterns);
        let mut a = Attrib::default();
        a.apply("transform", "translate(10 0)", &cx);
        a.apply("transform", "scale(2)", &cx);
        let p = a.transform * crate::Point::new(1.0, 1.0);
        assert_eq!(p, crate::Point::new(12.0, 2.0));
    }

    #[test]
    fn dash_arrays() {
        let vp = cx(&no_patterns).viewport;
        assert_eq!(parse_dash_array("none", &vp, 0.0).as_slice(), &[] as &[f64]);
        assert_eq!(parse_dash_array("5", &vp, 0.0).as_slice(), &[5.0, 5.0]);
        assert_eq!(parse_dash_array("1,-2 3", &vp, 0.0).as_slice(), &[1.0, 2.0, 3.0]);
        assert!(parse_dash_array("0 0", &vp, 0.0).is_empty());
        assert_eq!(parse_dash_array("1 1 1 1 1 1 1 1 1 1", &vp, 0.0).len(), MAX_DASHES);
    }

    #[test]
    fn urls() {
        assert_eq!(parse_url("url(#a)"), "a");
        assert_eq!(parse_url("url('#b')"), "b");
        assert_eq!(parse_url("url(c)"), "c");
        assert_eq!(parse_url(&format!("url(#{})", "x".repeat(100))).len(), MAX_ID_LEN);
    }

    #[test]
    fn miter_and_stops() {
        let cx = cx(&no_patterns);
        let mut a = Attrib::default();
        a.apply("stroke-miterlimit", "-3", &cx);
        assert_eq!(a.stroke_style.miter_limit, 0.0);
        a.apply("offset", "50%", &cx);
        assert_eq!(a.stop_offset, 0.5);
        a.apply("offset", "0.25", &cx);
        assert_eq!(a.stop_offset, 0.25);
    }

    #[test]
    fn stack_balance() {
        let cx = cx(&no_patterns);
        let mut rng = StdRng::seed_from_u64(7);
        let mut stack = AttribStack::default();
        let mut snapshots = Vec::new();
        for _ in 0..500 {
            let push =
                stack.depth() == 1 || (stack.depth() < MAX_ATTRIB_DEPTH && rng.random_bool(0.55));
            if push {
                snapshots.push(stack.top().clone());
                stack.push();
                let w = rng.random_range(0.0..10.0_f64);
                stack.top_mut().apply("stroke-width", &w.to_string(), &cx);
                stack.top_mut().apply("opacity", "0.5", &cx);
            } else {
                stack.pop();
                let expected = snapshots.pop().unwrap();
                assert_eq!(stack.top(), &expected, "pop must restore the pushed record");
            }
        }
    }

    #[test]
    fn stack_bound() {
        let mut stack = AttribStack::default();
        for _ in 0..MAX_ATTRIB_DEPTH + 10 {
            stack.push();
        }
        assert_eq!(stack.depth(), MAX_ATTRIB_DEPTH);
        for _ in 0..MAX_ATTRIB_DEPTH + 10 {
            stack.pop();
        }
        assert_eq!(stack.depth(), 1);
    }
}

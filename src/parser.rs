// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Turning markup events into shapes and definitions.
//!
//! The parser is a single pass over the markup. Elements that can be drawn
//! become [`ShapeDraft`]s as soon as they are seen; definitions go into
//! tables consulted later by [`resolve`](crate::resolve). References that
//! cannot be resolved until the whole document is known stay as
//! [`RawPaint::Url`] until then.

use arrayvec::ArrayVec;
use tracing::{debug, warn};

use crate::attr::{truncate, AttrContext, AttribStack, PaintSource, Viewport, MAX_ID_LEN};
use crate::css::parse_stylesheet;
use crate::defs::{
    Capture, DefsPath, GradientDef, GradientKind, PatternDef, TextDraft, TextPathDraft,
};
use crate::lexer::{atof, is_space, number_list, Coordinate};
use crate::path::PathBuilder;
use crate::path_data::parse_path_data;
use crate::style::StyleRule;
use crate::xml::{Event, Scanner, Tag};
use crate::{
    Animate, AnimateKind, ClipId, ClipPath, Color, EmbeddedImage, FillRule, LineCap, LineJoin,
    ParseOptions, Path, Point, Shape, StrokeStyle, Text,
};

/// Handle length of a cubic quarter circle, relative to the radius.
pub(crate) const KAPPA90: f64 = 0.552_284_749_3;

/// The class stack holds at most this many names.
pub(crate) const MAX_CLASSES: usize = 10;

/// `<use>` references nest at most this deep.
pub(crate) const MAX_REPLAY_DEPTH: usize = 16;

/// Document size used when the root element does not give one.
const DEFAULT_SIZE: f64 = 400.0;

/// A paint as recorded at parse time.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) enum RawPaint {
    #[default]
    None,
    Color(Color),
    /// A gradient or pattern reference, named in the draft.
    Url,
    Text(Box<Text>, Color),
    Image(Box<EmbeddedImage>),
}

/// A shape whose paint references are not resolved yet.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ShapeDraft {
    /// Everything but the paints. `clip` indexes [`Document::clip_paths`].
    pub(crate) shape: Shape,
    pub(crate) fill: RawPaint,
    pub(crate) stroke: RawPaint,
    pub(crate) fill_gradient: String,
    pub(crate) fill_pattern: String,
    pub(crate) stroke_gradient: String,
}

/// Alignment on one axis for `preserveAspectRatio`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Align {
    #[default]
    Min,
    Mid,
    Max,
}

impl Align {
    /// Offset of content of size `content` inside `container`.
    pub(crate) fn offset(self, content: f64, container: f64) -> f64 {
        match self {
            Align::Min => 0.0,
            Align::Mid => (container - content) * 0.5,
            Align::Max => container - content,
        }
    }
}

/// How the view box is fitted to the viewport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Fit {
    /// Scale each axis independently.
    None,
    /// Uniform scale, the whole view box visible.
    #[default]
    Meet,
    /// Uniform scale, the whole viewport covered.
    Slice,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct AspectRatio {
    pub(crate) x: Align,
    pub(crate) y: Align,
    pub(crate) fit: Fit,
}

impl AspectRatio {
    pub(crate) fn parse(s: &str) -> AspectRatio {
        let mut ratio = AspectRatio::default();
        if s.contains("none") {
            ratio.fit = Fit::None;
            return ratio;
        }
        if s.contains("xMid") {
            ratio.x = Align::Mid;
        } else if s.contains("xMax") {
            ratio.x = Align::Max;
        }
        if s.contains("YMid") {
            ratio.y = Align::Mid;
        } else if s.contains("YMax") {
            ratio.y = Align::Max;
        }
        if s.contains("slice") {
            ratio.fit = Fit::Slice;
        }
        ratio
    }
}

/// A `viewBox`. A zero size means "not given".
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct ViewBox {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
}

impl ViewBox {
    /// Read up to four numbers separated by whitespace, commas or `%`.
    pub(crate) fn parse(s: &str) -> ViewBox {
        let mut v = [0.0; 4];
        let numbers = s
            .split(|c: char| c == ',' || c == '%' || (c.is_ascii() && is_space(c as u8)))
            .filter(|item| !item.is_empty())
            .map(atof);
        for (slot, n) in v.iter_mut().zip(numbers) {
            *slot = n;
        }
        ViewBox {
            x: v[0],
            y: v[1],
            width: v[2],
            height: v[3],
        }
    }
}

/// Everything the parse pass produces.
#[derive(Clone, Debug, Default)]
pub(crate) struct Document {
    /// Requested width, zero when unknown.
    pub(crate) width: f64,
    pub(crate) height: f64,
    pub(crate) view_box: ViewBox,
    pub(crate) aspect: AspectRatio,
    /// The box percentages and user space gradients refer to.
    pub(crate) viewport: Viewport,
    pub(crate) shapes: Vec<ShapeDraft>,
    pub(crate) gradients: Vec<GradientDef>,
    pub(crate) patterns: Vec<PatternDef>,
    pub(crate) clip_paths: Vec<ClipPath>,
}

/// What an open `<g>` has to undo when it closes.
#[derive(Clone, Copy, Debug, Default)]
struct GroupFrame {
    pushed: bool,
    classed: bool,
}

/// Parser state.
#[derive(Debug)]
pub(crate) struct Parser {
    pub(crate) doc: Document,
    pub(crate) attrs: AttribStack,
    pub(crate) builder: PathBuilder,
    pub(crate) symbols: Vec<Capture>,
    pub(crate) defs_tags: Vec<Capture>,
    pub(crate) defs_paths: Vec<DefsPath>,
    pub(crate) defs_images: Vec<EmbeddedImage>,
    pub(crate) styles: Vec<StyleRule>,
    pub(crate) text: Option<TextDraft>,
    pub(crate) text_path: Option<TextPathDraft>,
    pub(crate) in_defs: bool,
    pub(crate) in_pattern: bool,
    pub(crate) in_clip: bool,
    pub(crate) replay_depth: usize,
    classes: ArrayVec<String, MAX_CLASSES>,
    groups: Vec<GroupFrame>,
    animate: Option<Animate>,
    in_style: bool,
}

/// Run the parse pass over a whole document.
pub(crate) fn parse_document(input: &str, options: &ParseOptions) -> Document {
    let mut parser = Parser::new(options);
    parser.feed(input);
    debug!(
        shapes = parser.doc.shapes.len(),
        gradients = parser.doc.gradients.len(),
        patterns = parser.doc.patterns.len(),
        clip_paths = parser.doc.clip_paths.len(),
        "parsed document"
    );
    parser.doc
}

impl Parser {
    pub(crate) fn new(options: &ParseOptions) -> Parser {
        Parser {
            doc: Document {
                viewport: Viewport::new(options.dpi),
                ..Document::default()
            },
            attrs: AttribStack::default(),
            builder: PathBuilder::new(),
            symbols: Vec::new(),
            defs_tags: Vec::new(),
            defs_paths: Vec::new(),
            defs_images: Vec::new(),
            styles: Vec::new(),
            text: None,
            text_path: None,
            in_defs: false,
            in_pattern: false,
            in_clip: false,
            replay_depth: 0,
            classes: ArrayVec::new(),
            groups: Vec::new(),
            animate: None,
            in_style: false,
        }
    }

    /// Scan `input` and dispatch its events.
    pub(crate) fn feed(&mut self, input: &str) {
        let mut scanner = Scanner::new(input);
        while let Some(event) = scanner.next() {
            match event {
                Event::Tag(tag) => {
                    if tag.opens {
                        self.start_element(&tag, &mut scanner);
                    }
                    if tag.closes {
                        self.end_element(tag.name);
                    }
                }
                Event::Text(text) => self.content(text),
            }
        }
    }

    fn start_element(&mut self, tag: &Tag<'_>, scanner: &mut Scanner<'_>) {
        if self.in_style {
            self.add_style_element(tag);
            return;
        }

        if self.in_defs {
            let fall_through = match tag.name {
                "linearGradient" => {
                    self.parse_gradient(tag, GradientKind::Linear);
                    false
                }
                "radialGradient" => {
                    self.parse_gradient(tag, GradientKind::Radial);
                    false
                }
                "stop" => {
                    self.parse_stop(tag);
                    false
                }
                "symbol" => {
                    self.capture_symbol(tag, scanner);
                    false
                }
                "pattern" => {
                    self.parse_pattern(tag);
                    false
                }
                "image" => {
                    self.parse_defs_image(tag);
                    false
                }
                "style" => {
                    self.in_style = true;
                    false
                }
                "clipPath" => {
                    self.parse_clip_path(tag);
                    false
                }
                "path" => {
                    if !self.in_pattern && !self.in_clip {
                        self.parse_defs_path(tag);
                    }
                    true
                }
                _ => {
                    let skipped = self.capture_defs_tag(tag, scanner);
                    if tag.name == "g" && !skipped && !self.in_pattern && !self.in_clip {
                        // Its end tag is still to come.
                        self.groups.push(GroupFrame::default());
                    }
                    !skipped
                }
            };
            // Pattern tiles and clip paths are built from their content.
            if !fall_through || (!self.in_pattern && !self.in_clip) {
                return;
            }
        }

        match tag.name {
            "g" => self.start_group(tag),
            "animateTransform" => self.parse_animate(tag),
            "path" => self.scoped(|p| p.parse_path(tag)),
            "rect" => self.scoped(|p| p.parse_rect(tag)),
            "circle" => self.scoped(|p| p.parse_circle(tag)),
            "ellipse" => self.scoped(|p| p.parse_ellipse(tag)),
            "line" => self.scoped(|p| p.parse_line(tag)),
            "polyline" => self.scoped(|p| p.parse_poly(tag, false)),
            "polygon" => self.scoped(|p| p.parse_poly(tag, true)),
            "symbol" => self.capture_symbol(tag, scanner),
            "use" => self.scoped(|p| p.parse_use(tag)),
            "linearGradient" => self.parse_gradient(tag, GradientKind::Linear),
            "radialGradient" => self.parse_gradient(tag, GradientKind::Radial),
            "stop" => self.parse_stop(tag),
            "clipPath" => self.parse_clip_path(tag),
            "defs" => self.in_defs = true,
            "svg" => self.parse_svg(tag),
            "text" => self.start_text(tag),
            "textPath" => self.start_text_path(tag),
            "style" => self.in_style = true,
            _ => {}
        }
    }

    fn end_element(&mut self, name: &str) {
        match name {
            "g" => {
                if let Some(frame) = self.groups.pop() {
                    if frame.pushed {
                        self.attrs.pop();
                    }
                    if frame.classed {
                        self.classes.pop();
                    }
                }
                self.animate = None;
            }
            "defs" => self.in_defs = false,
            "pattern" => self.in_pattern = false,
            "clipPath" => self.in_clip = false,
            "text" => {
                if self.text.take().is_some() {
                    self.attrs.pop();
                }
            }
            "textPath" => {
                if self.text_path.take().is_some() {
                    self.attrs.pop();
                }
            }
            "style" => self.in_style = false,
            _ => {}
        }
    }

    fn content(&mut self, s: &str) {
        if self.in_style {
            self.add_stylesheet(s);
        } else if self.text_path.is_some() {
            self.add_text_path_shape(s);
        } else if self.text.is_some() {
            self.add_text_shape(s);
        }
    }

    /// Run `f` with a fresh copy of the top attribute record.
    fn scoped(&mut self, f: impl FnOnce(&mut Parser)) {
        self.attrs.push();
        f(self);
        self.attrs.pop();
    }

    /// Assign a presentation attribute to the top record.
    ///
    /// Returns `false` for names the attribute table does not know. `class`
    /// counts as handled; callers push it with [`Parser::push_tag_class`].
    pub(crate) fn apply_attr(&mut self, name: &str, value: &str) -> bool {
        if name == "class" {
            return true;
        }
        let patterns = &self.doc.patterns;
        let is_pattern = |id: &str| patterns.iter().any(|p| p.id == id);
        let cx = AttrContext {
            viewport: self.doc.viewport,
            is_pattern: &is_pattern,
        };
        self.attrs.top_mut().apply(name, value, &cx)
    }

    /// Push the element's class, if it has one. Returns whether a name was
    /// pushed.
    pub(crate) fn push_tag_class(&mut self, tag: &Tag<'_>) -> bool {
        let Some(class) = tag.attr("class") else {
            return false;
        };
        let name = class
            .split(|c: char| c.is_ascii() && is_space(c as u8))
            .find(|s| !s.is_empty())
            .unwrap_or("");
        self.classes.try_push(truncate(name, MAX_ID_LEN).to_string()).is_ok()
    }

    pub(crate) fn pop_class(&mut self) {
        self.classes.pop();
    }

    fn start_group(&mut self, tag: &Tag<'_>) {
        self.attrs.push();
        let classed = self.push_tag_class(tag);
        for &(name, value) in &tag.attrs {
            self.apply_attr(name, value);
        }
        self.groups.push(GroupFrame { pushed: true, classed });
    }

    fn parse_animate(&mut self, tag: &Tag<'_>) {
        fn triple(s: &str) -> [i32; 3] {
            let mut v = [0; 3];
            for (slot, item) in v.iter_mut().zip(s.split(' ').filter(|s| !s.is_empty())) {
                *slot = atof(item) as i32;
            }
            v
        }
        let mut animate = Animate::default();
        for &(name, value) in &tag.attrs {
            match name {
                "attributeName" => animate.attribute_name = truncate(value, 15).to_string(),
                "attributeType" => animate.attribute_type = truncate(value, 15).to_string(),
                "type" => animate.kind = AnimateKind::parse(value),
                "begin" => animate.begin = atof(value) as i32,
                "dur" => animate.dur = atof(value) as i32,
                "from" => animate.from = triple(value),
                "to" => animate.to = triple(value),
                "repeatCount" => {
                    animate.repeat_count = if value == "indefinite" {
                        -1
                    } else {
                        atof(value) as i32
                    };
                }
                _ => {}
            }
        }
        self.animate = Some(animate);
    }

    /// The animation descriptor for a shape built now.
    pub(crate) fn current_animate(&self) -> Option<Animate> {
        let attr = self.attrs.top();
        self.animate.as_ref().map(|a| Animate {
            transform_origin: truncate(&attr.transform_origin, 15).to_string(),
            transform_box: truncate(&attr.transform_box, 15).to_string(),
            ..a.clone()
        })
    }

    fn parse_svg(&mut self, tag: &Tag<'_>) {
        let (mut width_set, mut height_set) = (false, false);
        for &(name, value) in &tag.attrs {
            if self.apply_attr(name, value) {
                continue;
            }
            let dpi = self.doc.viewport.dpi;
            let font_size = self.attrs.top().font_size;
            match name {
                "width" => {
                    self.doc.width = Coordinate::parse(value).to_pixels(dpi, font_size, 0.0, 0.0);
                    width_set = true;
                }
                "height" => {
                    self.doc.height = Coordinate::parse(value).to_pixels(dpi, font_size, 0.0, 0.0);
                    height_set = true;
                }
                "viewBox" => self.doc.view_box = ViewBox::parse(value),
                "preserveAspectRatio" => self.doc.aspect = AspectRatio::parse(value),
                _ => {}
            }
        }
        if !width_set || !height_set {
            warn!(
                "document does not set its width and height, using {DEFAULT_SIZE}x{DEFAULT_SIZE}"
            );
            self.doc.width = DEFAULT_SIZE;
            self.doc.height = DEFAULT_SIZE;
        }
        let vb = self.doc.view_box;
        let vp = &mut self.doc.viewport;
        if vb.width > 0.0 && vb.height > 0.0 {
            (vp.x, vp.y, vp.width, vp.height) = (vb.x, vb.y, vb.width, vb.height);
        } else {
            (vp.x, vp.y, vp.width, vp.height) = (0.0, 0.0, self.doc.width, self.doc.height);
        }
    }

    fn add_style_element(&mut self, tag: &Tag<'_>) {
        let patterns = &self.doc.patterns;
        let is_pattern = |id: &str| patterns.iter().any(|p| p.id == id);
        let cx = AttrContext {
            viewport: self.doc.viewport,
            is_pattern: &is_pattern,
        };
        let mut style = StyleRule::new(tag.name);
        for &(name, value) in &tag.attrs {
            style.apply(name, value, &cx);
        }
        self.styles.push(style);
    }

    fn add_stylesheet(&mut self, s: &str) {
        let sheet = parse_stylesheet(s);
        let patterns = &self.doc.patterns;
        let is_pattern = |id: &str| patterns.iter().any(|p| p.id == id);
        let cx = AttrContext {
            viewport: self.doc.viewport,
            is_pattern: &is_pattern,
        };
        self.styles
            .extend(sheet.rules.iter().map(|rule| StyleRule::from_rule(rule, &cx)));
        if let Some(query) = &sheet.media {
            for style in &mut self.styles {
                style.apply_media(query);
            }
        }
    }

    /// The most recent rule with this name.
    pub(crate) fn find_style(&self, name: &str) -> Option<&StyleRule> {
        self.styles.iter().rev().find(|s| s.name == name)
    }

    // Primitive shapes.

    fn parse_path(&mut self, tag: &Tag<'_>) {
        let classed = self.push_tag_class(tag);
        for &(name, value) in &tag.attrs {
            if name != "d" {
                self.apply_attr(name, value);
            }
        }
        if let Some(d) = tag.attr("d") {
            let transform = self.attrs.top().transform;
            parse_path_data(d, &mut self.builder, transform);
        }
        self.commit_shape(classed);
    }

    /// Apply presentation attributes, handing the rest to `geometry` with
    /// the viewport and font size they are converted against.
    fn parse_geometry(
        &mut self,
        tag: &Tag<'_>,
        mut geometry: impl FnMut(&str, &str, &Viewport, f64),
    ) {
        for &(name, value) in &tag.attrs {
            if !self.apply_attr(name, value) {
                geometry(name, value, &self.doc.viewport, self.attrs.top().font_size);
            }
        }
    }

    fn parse_rect(&mut self, tag: &Tag<'_>) {
        let classed = self.push_tag_class(tag);
        let (mut x, mut y, mut w, mut h) = (0.0, 0.0, 0.0, 0.0);
        // Negative means not given.
        let (mut rx, mut ry) = (-1.0_f64, -1.0_f64);
        self.parse_geometry(tag, |name, value, vp, fs| match name {
            "x" => x = vp.x(value, fs),
            "y" => y = vp.y(value, fs),
            "width" => w = vp.width(value, fs),
            "height" => h = vp.height(value, fs),
            "rx" => rx = vp.width(value, fs).abs(),
            "ry" => ry = vp.height(value, fs).abs(),
            _ => {}
        });
        if rx < 0.0 && ry > 0.0 {
            rx = ry;
        }
        if ry < 0.0 && rx > 0.0 {
            ry = rx;
        }
        let rx = rx.max(0.0).min(w / 2.0);
        let ry = ry.max(0.0).min(h / 2.0);

        if w != 0.0 && h != 0.0 {
            let b = &mut self.builder;
            b.reset();
            if rx < 0.00001 || ry < 0.00001 {
                b.move_to(Point::new(x, y));
                b.line_to(Point::new(x + w, y));
                b.line_to(Point::new(x + w, y + h));
                b.line_to(Point::new(x, y + h));
            } else {
                let (kx, ky) = (rx * (1.0 - KAPPA90), ry * (1.0 - KAPPA90));
                b.move_to(Point::new(x + rx, y));
                b.line_to(Point::new(x + w - rx, y));
                b.cubic_to(
                    Point::new(x + w - kx, y),
                    Point::new(x + w, y + ky),
                    Point::new(x + w, y + ry),
                );
                b.line_to(Point::new(x + w, y + h - ry));
                b.cubic_to(
                    Point::new(x + w, y + h - ky),
                    Point::new(x + w - kx, y + h),
                    Point::new(x + w - rx, y + h),
                );
                b.line_to(Point::new(x + rx, y + h));
                b.cubic_to(
                    Point::new(x + kx, y + h),
                    Point::new(x, y + h - ky),
                    Point::new(x, y + h - ry),
                );
                b.line_to(Point::new(x, y + ry));
                b.cubic_to(Point::new(x, y + ky), Point::new(x + kx, y), Point::new(x + rx, y));
            }
            self.add_path(true);
        }
        self.commit_shape(classed);
    }

    fn parse_circle(&mut self, tag: &Tag<'_>) {
        let classed = self.push_tag_class(tag);
        let (mut cx, mut cy, mut r) = (0.0, 0.0, 0.0);
        self.parse_geometry(tag, |name, value, vp, fs| match name {
            "cx" => cx = vp.x(value, fs),
            "cy" => cy = vp.y(value, fs),
            "r" => r = vp.length(value, fs).abs(),
            _ => {}
        });
        if r > 0.0 {
            self.ellipse_path(Point::new(cx, cy), r, r);
        }
        self.commit_shape(classed);
    }

    fn parse_ellipse(&mut self, tag: &Tag<'_>) {
        let classed = self.push_tag_class(tag);
        let (mut cx, mut cy, mut rx, mut ry) = (0.0, 0.0, 0.0, 0.0);
        self.parse_geometry(tag, |name, value, vp, fs| match name {
            "cx" => cx = vp.x(value, fs),
            "cy" => cy = vp.y(value, fs),
            "rx" => rx = vp.width(value, fs).abs(),
            "ry" => ry = vp.height(value, fs).abs(),
            _ => {}
        });
        if rx > 0.0 && ry > 0.0 {
            self.ellipse_path(Point::new(cx, cy), rx, ry);
        }
        self.commit_shape(classed);
    }

    /// Four quarter arcs, starting at the rightmost point.
    fn ellipse_path(&mut self, c: Point, rx: f64, ry: f64) {
        let (kx, ky) = (rx * KAPPA90, ry * KAPPA90);
        let b = &mut self.builder;
        b.reset();
        b.move_to(Point::new(c.x + rx, c.y));
        b.cubic_to(
            Point::new(c.x + rx, c.y + ky),
            Point::new(c.x + kx, c.y + ry),
            Point::new(c.x, c.y + ry),
        );
        b.cubic_to(
            Point::new(c.x - kx, c.y + ry),
            Point::new(c.x - rx, c.y + ky),
            Point::new(c.x - rx, c.y),
        );
        b.cubic_to(
            Point::new(c.x - rx, c.y - ky),
            Point::new(c.x - kx, c.y - ry),
            Point::new(c.x, c.y - ry),
        );
        b.cubic_to(
            Point::new(c.x + kx, c.y - ry),
            Point::new(c.x + rx, c.y - ky),
            Point::new(c.x + rx, c.y),
        );
        self.add_path(true);
    }

    fn parse_line(&mut self, tag: &Tag<'_>) {
        let classed = self.push_tag_class(tag);
        let (mut p0, mut p1) = (Point::ZERO, Point::ZERO);
        self.parse_geometry(tag, |name, value, vp, fs| match name {
            "x1" => p0.x = vp.x(value, fs),
            "y1" => p0.y = vp.y(value, fs),
            "x2" => p1.x = vp.x(value, fs),
            "y2" => p1.y = vp.y(value, fs),
            _ => {}
        });
        self.builder.reset();
        self.builder.move_to(p0);
        self.builder.line_to(p1);
        self.add_path(false);
        self.commit_shape(classed);
    }

    fn parse_poly(&mut self, tag: &Tag<'_>, closed: bool) {
        let classed = self.push_tag_class(tag);
        let mut points = Vec::new();
        self.parse_geometry(tag, |name, value, _, _| {
            if name == "points" {
                let coords: Vec<f64> = number_list(value).collect();
                points.extend(coords.chunks_exact(2).map(|c| Point::new(c[0], c[1])));
            }
        });
        self.builder.reset();
        for (i, &p) in points.iter().enumerate() {
            if i == 0 {
                self.builder.move_to(p);
            } else {
                self.builder.line_to(p);
            }
        }
        self.add_path(closed);
        self.commit_shape(classed);
    }

    /// Commit the pending subpath with the current transform.
    fn add_path(&mut self, closed: bool) {
        let transform = self.attrs.top().transform;
        self.builder.commit(closed, transform);
        self.builder.reset();
    }

    // Shape commit.

    /// Turn the committed paths into a shape, then drop the element's class.
    pub(crate) fn commit_shape(&mut self, classed: bool) {
        if classed || !self.classes.is_empty() {
            self.add_class_shape();
        } else {
            self.add_shape();
        }
        if classed {
            self.pop_class();
        }
    }

    /// Take the committed paths for a new shape.
    ///
    /// Inside a `<clipPath>` the paths go to the clip path instead and
    /// `None` is returned.
    fn take_shape_paths(&mut self) -> Option<Vec<Path>> {
        let paths = self.builder.take_paths();
        if paths.is_empty() {
            return None;
        }
        if self.in_clip {
            if let Some(clip) = self.doc.clip_paths.last_mut() {
                clip.paths.extend(paths);
            }
            return None;
        }
        Some(paths)
    }

    /// The clip path defined so far under `id`.
    pub(crate) fn find_clip(&self, id: &str) -> Option<ClipId> {
        if id.is_empty() {
            return None;
        }
        self.doc.clip_paths.iter().rposition(|c| c.id == id).map(ClipId)
    }

    /// Add a finished draft to the document, or to the open pattern.
    pub(crate) fn push_draft(&mut self, draft: ShapeDraft) {
        if self.in_pattern {
            if let Some(pattern) = self.doc.patterns.last_mut() {
                pattern.shapes.push(draft);
            }
        } else {
            self.doc.shapes.push(draft);
        }
    }

    /// A shape styled only by inherited attributes.
    fn add_shape(&mut self) {
        let Some(paths) = self.take_shape_paths() else {
            return;
        };
        let attr = self.attrs.top();
        let mut stroke_style = attr.stroke_style.clone();
        stroke_style.scale(attr.transform.average_scale());
        let mut shape = Shape {
            id: attr.id.clone(),
            opacity: non_zero_or_one(attr.opacity),
            fill_opacity: non_zero_or_one(attr.fill_opacity),
            stroke_opacity: non_zero_or_one(attr.stroke_opacity),
            stroke_style,
            fill_rule: attr.fill_rule,
            visible: attr.visible,
            transform: attr.transform,
            paths,
            clip: self.find_clip(&attr.clip_path),
            blend: attr.blend,
            animate: self.current_animate(),
            font_size: attr.font_size,
            ..Shape::default()
        };
        shape.update_bounds();
        let fill = match attr.fill {
            PaintSource::Color if attr.fill_opacity != 0.0 => {
                RawPaint::Color(attr.fill_color.with_opacity_alpha(attr.fill_opacity))
            }
            PaintSource::Color | PaintSource::None => RawPaint::None,
            PaintSource::Url => RawPaint::Url,
        };
        let stroke = match attr.stroke {
            PaintSource::None => RawPaint::None,
            PaintSource::Color => {
                RawPaint::Color(attr.stroke_color.with_opacity_alpha(attr.stroke_opacity))
            }
            PaintSource::Url => RawPaint::Url,
        };
        let draft = ShapeDraft {
            shape,
            fill,
            stroke,
            fill_gradient: attr.fill_gradient.clone(),
            fill_pattern: attr.fill_pattern.clone(),
            stroke_gradient: attr.stroke_gradient.clone(),
        };
        self.push_draft(draft);
    }

    /// A shape styled by inline attributes and then by class rules.
    ///
    /// Inline paint only counts when it was given explicitly. Rules are
    /// consulted from the innermost class outwards and only fill fields
    /// that are still unset. With no fill source at all the fill is opaque
    /// black.
    fn add_class_shape(&mut self) {
        let Some(paths) = self.take_shape_paths() else {
            return;
        };
        let attr = self.attrs.top();
        let scale = attr.transform.average_scale();
        let mut shape = Shape {
            id: attr.id.clone(),
            stroke_style: StrokeStyle {
                width: 0.0,
                miter_limit: 0.0,
                ..StrokeStyle::default()
            },
            visible: attr.visible,
            transform: attr.transform,
            paths,
            clip: self.find_clip(&attr.clip_path),
            animate: self.current_animate(),
            font_size: attr.font_size,
            ..Shape::default()
        };
        shape.update_bounds();
        let mut fill = RawPaint::Color(Color::BLACK);
        let mut stroke = RawPaint::None;
        let mut fill_gradient = attr.fill_gradient.clone();
        let mut fill_pattern = attr.fill_pattern.clone();
        let (mut fill_found, mut stroke_found, mut blend_found) = (false, false, false);

        if attr.fill_set {
            fill_found = true;
            shape.fill_rule = attr.fill_rule;
            if attr.opacity != 0.0 {
                shape.opacity = attr.opacity;
            }
            if attr.fill_opacity != 0.0 {
                shape.fill_opacity = attr.fill_opacity;
            }
            fill = match attr.fill {
                PaintSource::None => RawPaint::None,
                PaintSource::Color => {
                    RawPaint::Color(attr.fill_color.with_opacity_alpha(attr.fill_opacity))
                }
                PaintSource::Url => RawPaint::Url,
            };
        }
        if attr.stroke_set {
            stroke_found = true;
            shape.stroke_style = attr.stroke_style.clone();
            shape.stroke_style.scale(scale);
            if attr.stroke_opacity != 0.0 {
                shape.stroke_opacity = attr.stroke_opacity;
            }
            stroke = match attr.stroke {
                PaintSource::None => RawPaint::None,
                PaintSource::Color => {
                    RawPaint::Color(attr.stroke_color.with_opacity_alpha(attr.stroke_opacity))
                }
                PaintSource::Url => RawPaint::Url,
            };
        }
        let stroke_gradient = attr.stroke_gradient.clone();

        for class in self.classes.iter().rev() {
            let Some(style) = self.find_style(class) else {
                continue;
            };
            if fill_gradient.is_empty() && !style.fill_gradient.is_empty() {
                fill_gradient.clone_from(&style.fill_gradient);
            }
            if fill_pattern.is_empty() && !style.fill_pattern.is_empty() {
                fill_pattern.clone_from(&style.fill_pattern);
            }
            let ss = &mut shape.stroke_style;
            if ss.width == 0.0 && style.stroke_width != 0.0 {
                ss.width = style.stroke_width * scale;
            }
            if ss.join == LineJoin::Miter {
                ss.join = style.stroke_join.unwrap_or(ss.join);
            }
            if ss.cap == LineCap::Butt {
                ss.cap = style.stroke_cap.unwrap_or(ss.cap);
            }
            if ss.miter_limit == 0.0 && style.miter_limit != 0.0 {
                ss.miter_limit = style.miter_limit;
            }
            if shape.fill_rule == FillRule::NonZero {
                shape.fill_rule = style.fill_rule.unwrap_or(shape.fill_rule);
            }
            if shape.opacity == 1.0 && style.opacity != 0.0 {
                shape.opacity = style.opacity;
            }
            if shape.fill_opacity == 1.0 && style.fill_opacity != 0.0 {
                shape.fill_opacity = style.fill_opacity;
            }
            if shape.stroke_opacity == 1.0 && style.stroke_opacity != 0.0 {
                shape.stroke_opacity = style.stroke_opacity;
            }
            if shape.media.is_none() {
                shape.media = style.media;
            }
            if !blend_found {
                if let Some(blend) = style.blend {
                    shape.blend = blend;
                    blend_found = true;
                }
            }
            if !fill_found {
                if let Some(source) = style.fill {
                    fill_found = true;
                    fill = match source {
                        PaintSource::None => RawPaint::None,
                        PaintSource::Color => {
                            RawPaint::Color(style.fill_color.with_opacity_alpha(style.fill_opacity))
                        }
                        PaintSource::Url => RawPaint::Url,
                    };
                }
            }
            if !stroke_found && style.stroke.is_some() {
                stroke_found = true;
                if !matches!(stroke, RawPaint::Color(_)) {
                    if let Some(color) = style.stroke_paint_color() {
                        stroke = RawPaint::Color(color);
                    }
                }
            }
        }

        let draft = ShapeDraft {
            shape,
            fill,
            stroke,
            fill_gradient,
            fill_pattern,
            stroke_gradient,
        };
        self.push_draft(draft);
    }

    /// A shape that draws a defined image.
    pub(crate) fn add_image_shape(&mut self, image: EmbeddedImage) {
        let attr = self.attrs.top();
        let shape = Shape {
            id: attr.id.clone(),
            fill_rule: attr.fill_rule,
            opacity: non_zero_or_one(attr.opacity),
            fill_opacity: non_zero_or_one(attr.fill_opacity),
            stroke_opacity: non_zero_or_one(attr.stroke_opacity),
            visible: attr.visible,
            transform: attr.transform,
            ..Shape::default()
        };
        self.push_draft(ShapeDraft {
            shape,
            fill: RawPaint::Image(Box::new(image)),
            ..ShapeDraft::default()
        });
    }

    /// Parse captured markup as if it appeared here.
    ///
    /// Returns `false` when the nesting limit stops the replay.
    pub(crate) fn replay(&mut self, content: &str) -> bool {
        if self.replay_depth >= MAX_REPLAY_DEPTH {
            return false;
        }
        self.replay_depth += 1;
        self.feed(content);
        self.replay_depth -= 1;
        true
    }
}

/// Opacity fields of shapes treat zero as unset.
pub(crate) fn non_zero_or_one(v: f64) -> f64 {
    if v == 0.0 {
        1.0
    } else {
        v
    }
}

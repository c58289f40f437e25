// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Definitions and the elements that refer to them.
//!
//! Gradients, patterns and clip paths are recorded in the document tables.
//! Symbols and other elements inside `<defs>` are captured as raw markup and
//! parsed again, in the context of the referencing `<use>`, every time they
//! are used.

use tracing::warn;

use crate::attr::{truncate, PaintSource, MAX_ID_LEN};
use crate::lexer::{atof, is_space, number_list, Coordinate, Units};
use crate::parser::{non_zero_or_one, Parser, RawPaint, ShapeDraft, ViewBox};
use crate::transform::parse_transform;
use crate::xml::{Scanner, Tag};
use crate::{
    Affine, ClipPath, Color, CoordinateSpace, EmbeddedImage, GradientStop, Point, Shape,
    SpreadMode, Text, Vec2,
};

/// Raw markup captured under an id.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Capture {
    pub(crate) id: String,
    pub(crate) content: String,
}

/// A path in `<defs>`, kept as an anchor for `<textPath>`.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct DefsPath {
    pub(crate) id: String,
    /// The first moveto of the path data.
    pub(crate) anchor: Point,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum GradientKind {
    #[default]
    Linear,
    Radial,
}

/// A gradient as written, before `href` inheritance.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct GradientDef {
    pub(crate) id: String,
    pub(crate) kind: GradientKind,
    pub(crate) units: CoordinateSpace,
    pub(crate) units_set: bool,
    pub(crate) transform: Affine,
    pub(crate) transform_set: bool,
    /// `x1 y1 x2 y2` for linear gradients, `cx cy r fx fy` for radial ones.
    pub(crate) coords: [Coordinate; 5],
    pub(crate) spread: SpreadMode,
    pub(crate) href: String,
    /// Sorted by offset.
    pub(crate) stops: Vec<GradientStop>,
}

impl GradientDef {
    pub(crate) fn new(kind: GradientKind) -> GradientDef {
        let pct = |v| Coordinate::new(v, Units::Percent);
        let coords = match kind {
            GradientKind::Linear => [
                pct(0.0),
                pct(0.0),
                pct(100.0),
                pct(0.0),
                Coordinate::default(),
            ],
            GradientKind::Radial => [
                pct(50.0),
                pct(50.0),
                pct(50.0),
                Coordinate::default(),
                Coordinate::default(),
            ],
        };
        GradientDef {
            id: String::new(),
            kind,
            units: CoordinateSpace::ObjectBoundingBox,
            units_set: false,
            transform: Affine::IDENTITY,
            transform_set: false,
            coords,
            spread: SpreadMode::Pad,
            href: String::new(),
            stops: Vec::new(),
        }
    }

    fn coord_index(&self, name: &str) -> Option<usize> {
        match (self.kind, name) {
            (GradientKind::Linear, "x1") | (GradientKind::Radial, "cx") => Some(0),
            (GradientKind::Linear, "y1") | (GradientKind::Radial, "cy") => Some(1),
            (GradientKind::Linear, "x2") | (GradientKind::Radial, "r") => Some(2),
            (GradientKind::Linear, "y2") | (GradientKind::Radial, "fx") => Some(3),
            (GradientKind::Radial, "fy") => Some(4),
            _ => None,
        }
    }

    /// Insert a stop before the first stop with a greater offset.
    pub(crate) fn insert_stop(&mut self, stop: GradientStop) {
        let i = self
            .stops
            .iter()
            .position(|s| s.offset > stop.offset)
            .unwrap_or(self.stops.len());
        self.stops.insert(i, stop);
    }
}

/// A pattern as written. Its shapes are still drafts.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct PatternDef {
    pub(crate) id: String,
    pub(crate) units: CoordinateSpace,
    pub(crate) x: Coordinate,
    pub(crate) y: Coordinate,
    pub(crate) width: Coordinate,
    pub(crate) height: Coordinate,
    pub(crate) view_box: [f64; 4],
    pub(crate) href: String,
    pub(crate) shapes: Vec<ShapeDraft>,
    pub(crate) image: Option<EmbeddedImage>,
}

/// An open `<text>` element.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct TextDraft {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) dx: f64,
    pub(crate) dy: f64,
    pub(crate) rotate: f64,
    pub(crate) font_family: String,
    /// As written, zero when absent.
    pub(crate) font_size: f64,
    pub(crate) class: String,
}

/// An open `<textPath>` element.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct TextPathDraft {
    pub(crate) href: String,
    pub(crate) class: String,
    pub(crate) text_length: f64,
}

/// Paint of a text run after its class rules are applied.
#[derive(Clone, Debug)]
struct TextPaint {
    font_size: f64,
    fill_color: Option<Color>,
    fill_opacity: f64,
    stroke_color: Option<Color>,
    stroke_opacity: f64,
    stroke_width: f64,
    miter_limit: f64,
}

/// An `href` value without its leading `#`.
fn href_id(value: &str) -> &str {
    truncate(value.get(1..).unwrap_or(""), MAX_ID_LEN)
}

/// The first whitespace separated token.
fn first_token(s: &str) -> &str {
    s.split(|c: char| c.is_ascii() && is_space(c as u8))
        .find(|t| !t.is_empty())
        .unwrap_or("")
}

/// Split an image `href` into format, encoding and payload.
///
/// `data:image/png;base64,AAAA` gives `("png", "base64", "AAAA")`. An href
/// without a payload is a reference to an image stored elsewhere.
fn parse_image_href(href: &str) -> (String, String, String) {
    let head_len = href.find([' ', ';']).unwrap_or(href.len());
    let head = &href[..head_len];
    let rest = href.get(head_len + 1..).unwrap_or("");
    let encoding_len = rest.find([' ', ',']).unwrap_or(rest.len());
    let encoding = &rest[..encoding_len];
    let data = rest.get(encoding_len + 1..).unwrap_or("");
    if data.is_empty() {
        return (EmbeddedImage::FORMAT_URL.to_string(), String::new(), head.to_string());
    }
    let format = head.split_once('/').map_or(head, |(_, f)| f);
    (format.to_string(), encoding.to_string(), data.to_string())
}

/// Byte offset just past the first `>` at or after `from`.
fn past_close(input: &str, from: usize) -> usize {
    input[from..].find('>').map_or(input.len(), |i| from + i + 1)
}

impl Parser {
    pub(crate) fn parse_gradient(&mut self, tag: &Tag<'_>, kind: GradientKind) {
        let mut grad = GradientDef::new(kind);
        for &(name, value) in &tag.attrs {
            if let Some(i) = grad.coord_index(name) {
                grad.coords[i] = Coordinate::parse(value);
                continue;
            }
            match name {
                "id" => grad.id = truncate(value, MAX_ID_LEN).to_string(),
                "gradientUnits" => {
                    grad.units = if value == "userSpaceOnUse" {
                        CoordinateSpace::UserSpace
                    } else {
                        CoordinateSpace::ObjectBoundingBox
                    };
                    grad.units_set = true;
                }
                "gradientTransform" => {
                    grad.transform = parse_transform(value);
                    grad.transform_set = true;
                }
                "spreadMethod" => {
                    grad.spread = match value {
                        "reflect" => SpreadMode::Reflect,
                        "repeat" => SpreadMode::Repeat,
                        _ => SpreadMode::Pad,
                    };
                }
                "xlink:href" | "href" => grad.href = href_id(value).to_string(),
                _ => {}
            }
        }
        self.doc.gradients.push(grad);
    }

    pub(crate) fn parse_stop(&mut self, tag: &Tag<'_>) {
        let attr = self.attrs.top_mut();
        attr.stop_offset = 0.0;
        attr.stop_color = Color::TRANSPARENT;
        attr.stop_opacity = 1.0;
        for &(name, value) in &tag.attrs {
            self.apply_attr(name, value);
        }
        let attr = self.attrs.top();
        let stop = GradientStop {
            offset: attr.stop_offset,
            color: attr.stop_color.with_opacity_alpha(attr.stop_opacity),
        };
        if let Some(grad) = self.doc.gradients.last_mut() {
            grad.insert_stop(stop);
        }
    }

    pub(crate) fn parse_pattern(&mut self, tag: &Tag<'_>) {
        let mut pattern = PatternDef::default();
        for &(name, value) in &tag.attrs {
            match name {
                "id" => pattern.id = truncate(value, MAX_ID_LEN).to_string(),
                "x" => pattern.x = Coordinate::parse(value),
                "y" => pattern.y = Coordinate::parse(value),
                "width" => pattern.width = Coordinate::parse(value),
                "height" => pattern.height = Coordinate::parse(value),
                "patternUnits" => {
                    if value == "userSpaceOnUse" {
                        pattern.units = CoordinateSpace::UserSpace;
                    }
                }
                "viewBox" => {
                    let vb = ViewBox::parse(value);
                    pattern.view_box = [vb.x, vb.y, vb.width, vb.height];
                }
                "xlink:href" | "href" => pattern.href = href_id(value).to_string(),
                _ => {}
            }
        }
        self.doc.patterns.push(pattern);
        self.in_pattern = !tag.closes;
    }

    pub(crate) fn parse_clip_path(&mut self, tag: &Tag<'_>) {
        let id = tag.attr("id").unwrap_or("");
        self.doc.clip_paths.push(ClipPath {
            id: truncate(id, MAX_ID_LEN).to_string(),
            paths: Vec::new(),
        });
        self.in_clip = !tag.closes;
    }

    /// Capture the content of a `<symbol>` and step over it.
    pub(crate) fn capture_symbol(&mut self, tag: &Tag<'_>, scanner: &mut Scanner<'_>) {
        if tag.closes {
            return;
        }
        let input = scanner.input();
        let after = &input[tag.end..];
        let Some(close) = after.find("</symbol") else {
            return;
        };
        let open = after[..close].find('<').unwrap_or(close);
        self.symbols.push(Capture {
            id: truncate(tag.attr("id").unwrap_or(""), MAX_ID_LEN).to_string(),
            content: after[open..close].to_string(),
        });
        scanner.skip_to(past_close(input, tag.end + close));
    }

    /// Capture an element inside `<defs>` for later `<use>`.
    ///
    /// A `g` contributes its inner markup and any other element its own.
    /// The scanner steps over the captured markup, except inside a pattern
    /// or clip path whose content is also drawn. Returns whether it did.
    pub(crate) fn capture_defs_tag(&mut self, tag: &Tag<'_>, scanner: &mut Scanner<'_>) -> bool {
        let input = scanner.input();
        let after = &input[tag.end..];
        let step_over = !self.in_pattern && !self.in_clip;
        let (content, end) = if tag.name == "g" {
            if tag.closes {
                ("", None)
            } else {
                let inner = after.trim_start_matches(|c: char| c.is_ascii() && is_space(c as u8));
                if inner.starts_with("<symbol") {
                    return false;
                }
                match after.find("</g") {
                    Some(close) => (&after[..close], Some(past_close(input, tag.end + close))),
                    None => (after, None),
                }
            }
        } else if tag.closes {
            (&input[tag.start..tag.end], None)
        } else {
            let close_tag = format!("</{}", tag.name);
            match after.find(&close_tag) {
                Some(close) => {
                    let end = past_close(input, tag.end + close);
                    (&input[tag.start..end], Some(end))
                }
                None => (&input[tag.start..tag.end], None),
            }
        };
        let id = truncate(tag.attr("id").unwrap_or(""), MAX_ID_LEN);
        if !id.is_empty() {
            self.defs_tags.push(Capture {
                id: id.to_string(),
                content: content.to_string(),
            });
        }
        match end {
            Some(end) if step_over => {
                scanner.skip_to(end);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn parse_defs_path(&mut self, tag: &Tag<'_>) {
        let d = tag.attr("d").unwrap_or("");
        let mut numbers = number_list(d.get(1..).unwrap_or(""));
        let anchor = match (numbers.next(), numbers.next()) {
            (Some(x), Some(y)) => Point::new(x, y),
            _ => Point::ZERO,
        };
        self.defs_paths.push(DefsPath {
            id: truncate(tag.attr("id").unwrap_or(""), MAX_ID_LEN).to_string(),
            anchor,
        });
    }

    pub(crate) fn parse_defs_image(&mut self, tag: &Tag<'_>) {
        let mut image = EmbeddedImage {
            drawable: true,
            ..EmbeddedImage::default()
        };
        for &(name, value) in &tag.attrs {
            match name {
                "id" => image.id = truncate(value, MAX_ID_LEN).to_string(),
                "x" => image.x = atof(value),
                "y" => image.y = atof(value),
                "width" => image.width = atof(value),
                "height" => image.height = atof(value),
                "xlink:href" | "href" => {
                    (image.format, image.encoding, image.data) = parse_image_href(value);
                }
                _ => {}
            }
        }
        if image.data.len() >= EmbeddedImage::MAX_DATA_LEN {
            warn!(
                id = %image.id,
                len = image.data.len(),
                "embedded image payload too large, not drawn"
            );
            image.drawable = false;
            image.data = String::new();
        }
        if self.in_pattern {
            if let Some(pattern) = self.doc.patterns.last_mut() {
                if pattern.image.is_none() {
                    pattern.image = Some(image.clone());
                }
            }
        }
        self.defs_images.push(image);
    }

    /// Parse a `<use>`. The caller has pushed an attribute record.
    pub(crate) fn parse_use(&mut self, tag: &Tag<'_>) {
        let classed = self.push_tag_class(tag);
        let (mut x, mut y) = (0.0, 0.0);
        let mut href = "";
        for &(name, value) in &tag.attrs {
            if self.apply_attr(name, value) {
                continue;
            }
            let vp = self.doc.viewport;
            let font_size = self.attrs.top().font_size;
            match name {
                "x" => x = vp.x(value, font_size),
                "y" => y = vp.y(value, font_size),
                "href" | "xlink:href" => href = href_id(value),
                _ => {}
            }
        }
        let attr = self.attrs.top_mut();
        attr.transform = attr
            .transform
            .with_translation(attr.transform.translation() + Vec2::new(x, y));

        let mut found = false;
        let symbol = self.symbols.iter().rev().find(|c| c.id == href).map(|c| c.content.clone());
        if let Some(content) = symbol {
            found = true;
            self.replay_use(href, &content);
        }
        let captured = self
            .defs_tags
            .iter()
            .rev()
            .find(|c| c.id == href)
            .map(|c| c.content.clone());
        if let Some(content) = captured {
            found = true;
            self.replay_use(href, &content);
        }
        let image = self.defs_images.iter().rev().find(|i| i.id == href).cloned();
        if let Some(mut image) = image {
            found = true;
            image.x = x;
            image.y = y;
            self.add_image_shape(image);
        }
        if !found {
            warn!(href, "unresolved use reference");
        }
        if classed {
            self.pop_class();
        }
    }

    fn replay_use(&mut self, href: &str, content: &str) {
        if !self.replay(content) {
            warn!(href, "use references nested too deeply, skipped");
        }
    }

    pub(crate) fn start_text(&mut self, tag: &Tag<'_>) {
        self.attrs.push();
        let mut draft = TextDraft::default();
        for &(name, value) in &tag.attrs {
            match name {
                "class" => draft.class = truncate(first_token(value), MAX_ID_LEN).to_string(),
                "font-family" => draft.font_family = truncate(value, MAX_ID_LEN).to_string(),
                "rotate" => draft.rotate = atof(value),
                "font-size" => draft.font_size = atof(value),
                _ => {}
            }
            if self.apply_attr(name, value) {
                continue;
            }
            let vp = self.doc.viewport;
            let font_size = self.attrs.top().font_size;
            match name {
                "x" => draft.x = vp.x(value, font_size),
                "y" => draft.y = vp.y(value, font_size),
                "width" => draft.dx = vp.width(value, font_size),
                "height" => draft.dy = vp.height(value, font_size),
                _ => {}
            }
        }
        self.text = Some(draft);
    }

    pub(crate) fn start_text_path(&mut self, tag: &Tag<'_>) {
        self.attrs.push();
        let mut draft = TextPathDraft::default();
        for &(name, value) in &tag.attrs {
            match name {
                "href" | "xlink:href" => draft.href = href_id(value).to_string(),
                "class" => draft.class = truncate(first_token(value), MAX_ID_LEN).to_string(),
                "textLength" => draft.text_length = atof(value),
                _ => {
                    self.apply_attr(name, value);
                }
            }
        }
        self.text_path = Some(draft);
    }

    /// Apply the rule for `class` to `paint`. With `override_only`, only
    /// positive values replace what is there.
    fn apply_text_class(&self, class: &str, paint: &mut TextPaint, override_only: bool) {
        let Some(style) = self.find_style(class) else {
            return;
        };
        let take = |current: f64, v: f64| if !override_only || v > 0.0 { v } else { current };
        paint.font_size = take(paint.font_size, style.font_size);
        if style.fill == Some(PaintSource::Color) {
            paint.fill_color = Some(style.fill_color);
            paint.fill_opacity = take(paint.fill_opacity, style.fill_opacity);
        }
        if style.stroke == Some(PaintSource::Color) {
            paint.stroke_color = Some(style.stroke_color);
            paint.stroke_opacity =
                non_zero_or_one(take(paint.stroke_opacity, style.stroke_opacity));
            paint.stroke_width = take(paint.stroke_width, style.stroke_width);
            paint.miter_limit = take(paint.miter_limit, style.miter_limit);
        }
    }

    /// Build a text shape with the paint worked out from the attributes and
    /// class rules, and add it to the document.
    fn add_text_draft(&mut self, mut text: Text, paint: &TextPaint) {
        let attr = self.attrs.top();
        let mut stroke_style = attr.stroke_style.clone();
        stroke_style.scale(attr.transform.average_scale());
        if paint.stroke_width > 0.0 {
            stroke_style.width = paint.stroke_width;
        }
        if paint.miter_limit > 0.0 {
            stroke_style.miter_limit = paint.miter_limit;
        }
        if text.font_size == 0.0 {
            text.font_size = attr.font_size;
        }
        let color = match paint.fill_color {
            Some(c) => c.with_opacity_alpha(paint.fill_opacity),
            None => attr.fill_color.with_alpha(0xff),
        };
        let stroke = match paint.stroke_color {
            Some(c) => {
                text.has_stroke = true;
                RawPaint::Color(c.with_alpha(0xff))
            }
            None => RawPaint::None,
        };
        let shape = Shape {
            id: attr.id.clone(),
            opacity: attr.opacity,
            fill_opacity: paint.fill_opacity,
            stroke_opacity: paint.stroke_opacity,
            stroke_style,
            fill_rule: attr.fill_rule,
            visible: attr.visible,
            transform: attr.transform,
            clip: self.find_clip(&attr.clip_path),
            blend: attr.blend,
            animate: self.current_animate(),
            font_size: attr.font_size,
            ..Shape::default()
        };
        self.push_draft(ShapeDraft {
            shape,
            fill: RawPaint::Text(Box::new(text), color),
            stroke,
            ..ShapeDraft::default()
        });
    }

    pub(crate) fn add_text_shape(&mut self, content: &str) {
        let Some(draft) = self.text.as_ref() else {
            return;
        };
        let attr = self.attrs.top();
        let mut paint = TextPaint {
            font_size: 0.0,
            fill_color: None,
            fill_opacity: attr.fill_opacity,
            stroke_color: (attr.stroke == PaintSource::Color).then_some(attr.stroke_color),
            stroke_opacity: non_zero_or_one(attr.stroke_opacity),
            stroke_width: 0.0,
            miter_limit: 0.0,
        };
        self.apply_text_class(&draft.class, &mut paint, false);
        let text = Text {
            x: draft.x,
            y: draft.y,
            dx: draft.dx,
            dy: draft.dy,
            rotate: draft.rotate,
            font_size: if draft.font_size != 0.0 { draft.font_size } else { paint.font_size },
            font_family: draft.font_family.clone(),
            content: truncate(content, Text::MAX_CHARS).to_string(),
            ..Text::default()
        };
        self.add_text_draft(text, &paint);
    }

    /// Text along a path starts at the first point of the referenced path.
    /// Without that path nothing is drawn.
    pub(crate) fn add_text_path_shape(&mut self, content: &str) {
        let Some(draft) = self.text_path.as_ref() else {
            return;
        };
        let Some(anchor) = self
            .defs_paths
            .iter()
            .rev()
            .find(|p| p.id == draft.href)
            .map(|p| p.anchor)
        else {
            return;
        };
        let (text_class, font_family) = self
            .text
            .as_ref()
            .map(|t| (t.class.clone(), t.font_family.clone()))
            .unwrap_or_default();
        let attr = self.attrs.top();
        let mut paint = TextPaint {
            font_size: 0.0,
            fill_color: None,
            fill_opacity: attr.fill_opacity,
            stroke_color: None,
            stroke_opacity: 1.0,
            stroke_width: 0.0,
            miter_limit: 0.0,
        };
        self.apply_text_class(&text_class, &mut paint, false);
        let override_class = if draft.class.is_empty() { &text_class } else { &draft.class };
        self.apply_text_class(override_class, &mut paint, true);
        let text = Text {
            x: anchor.x,
            y: anchor.y,
            text_length: draft.text_length,
            font_size: paint.font_size,
            font_family,
            content: truncate(content, Text::MAX_CHARS).to_string(),
            ..Text::default()
        };
        self.add_text_draft(text, &paint);
    }
}

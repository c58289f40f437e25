// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Class rules collected from `<style>` elements.

use crate::attr::{
    parse_miter_limit, parse_opacity, parse_url, truncate, AttrContext, PaintSource, MAX_ID_LEN,
};
use crate::css::{MediaFeature, MediaQuery, Rule};
use crate::lexer::Coordinate;
use crate::{
    parse_color, parse_rgba_alpha, BlendMode, Color, FillRule, LineCap, LineJoin, MediaRange,
};

/// A named rule. Unset fields are `None` or zero and never override.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct StyleRule {
    pub(crate) name: String,
    pub(crate) fill: Option<PaintSource>,
    pub(crate) fill_color: Color,
    pub(crate) fill_opacity: f64,
    pub(crate) fill_gradient: String,
    pub(crate) fill_pattern: String,
    pub(crate) stroke: Option<PaintSource>,
    pub(crate) stroke_color: Color,
    pub(crate) stroke_opacity: f64,
    pub(crate) stroke_width: f64,
    pub(crate) stroke_cap: Option<LineCap>,
    pub(crate) stroke_join: Option<LineJoin>,
    pub(crate) miter_limit: f64,
    pub(crate) fill_rule: Option<FillRule>,
    pub(crate) opacity: f64,
    /// Raw font size, in user units.
    pub(crate) font_size: f64,
    pub(crate) blend: Option<BlendMode>,
    pub(crate) media: Option<MediaRange>,
}

impl StyleRule {
    pub(crate) fn new(name: &str) -> StyleRule {
        StyleRule {
            name: truncate(name, MAX_ID_LEN).to_string(),
            fill: None,
            fill_color: Color::TRANSPARENT,
            fill_opacity: 1.0,
            fill_gradient: String::new(),
            fill_pattern: String::new(),
            stroke: None,
            stroke_color: Color::TRANSPARENT,
            stroke_opacity: 1.0,
            stroke_width: 0.0,
            stroke_cap: None,
            stroke_join: None,
            miter_limit: 0.0,
            fill_rule: None,
            opacity: 1.0,
            font_size: 0.0,
            blend: None,
            media: None,
        }
    }

    /// Build a rule from a parsed style sheet rule.
    pub(crate) fn from_rule(rule: &Rule<'_>, cx: &AttrContext<'_>) -> StyleRule {
        let mut style = StyleRule::new(rule.name);
        for (name, value) in &rule.declarations {
            style.apply(name, value, cx);
        }
        style
    }

    /// Assign one declaration. Unknown names are ignored.
    pub(crate) fn apply(&mut self, name: &str, value: &str, cx: &AttrContext<'_>) {
        match name {
            "stroke" => {
                if value == "none" {
                    self.stroke = Some(PaintSource::None);
                } else if value.starts_with("url(") {
                    // Stroke paint servers are not taken from class rules.
                    self.stroke = Some(self.stroke.unwrap_or(PaintSource::None));
                } else {
                    self.stroke = Some(PaintSource::Color);
                    self.stroke_color = parse_color(value);
                    if value.contains("rgba(") {
                        self.stroke_opacity = parse_rgba_alpha(value).clamp(0.0, 1.0);
                    }
                }
            }
            "fill" => {
                if value == "none" {
                    self.fill = Some(PaintSource::None);
                } else if value.starts_with("url(") {
                    self.fill = Some(PaintSource::Url);
                    let id = parse_url(value);
                    if (cx.is_pattern)(id) {
                        self.fill_pattern = id.to_string();
                    } else {
                        self.fill_gradient = id.to_string();
                    }
                } else {
                    self.fill = Some(PaintSource::Color);
                    self.fill_color = parse_color(value);
                    if value.contains("rgba(") {
                        self.fill_opacity = parse_rgba_alpha(value).clamp(0.0, 1.0);
                    }
                }
            }
            "opacity" => self.opacity = parse_opacity(value),
            "fill-opacity" => self.fill_opacity = parse_opacity(value),
            "stroke-opacity" => self.stroke_opacity = parse_opacity(value),
            "stroke-width" => self.stroke_width = cx.viewport.length(value, 0.0),
            "stroke-linecap" => self.stroke_cap = Some(LineCap::parse(value)),
            "stroke-linejoin" => self.stroke_join = Some(LineJoin::parse(value)),
            "stroke-miterlimit" => self.miter_limit = parse_miter_limit(value),
            "fill-rule" => self.fill_rule = Some(FillRule::parse(value)),
            "mix-blend-mode" => self.blend = Some(BlendMode::parse(value)),
            "font-size" => self.font_size = Coordinate::parse(value).value,
            _ => {}
        }
    }

    /// Record the size range of a media block mentioning this rule.
    pub(crate) fn apply_media(&mut self, query: &MediaQuery<'_>) {
        if !query.mentions(&self.name) {
            return;
        }
        let range = self.media.get_or_insert_with(MediaRange::default);
        match query.feature {
            Some(MediaFeature::MinWidth) => range.min_width = query.value,
            Some(MediaFeature::MaxWidth) => range.max_width = query.value,
            Some(MediaFeature::MinHeight) => range.min_height = query.value,
            Some(MediaFeature::MaxHeight) => range.max_height = query.value,
            None => {}
        }
    }

    /// The solid stroke color with its opacity as alpha, if this rule sets
    /// one.
    pub(crate) fn stroke_paint_color(&self) -> Option<Color> {
        (self.stroke == Some(PaintSource::Color))
            .then(|| self.stroke_color.with_opacity_alpha(self.stroke_opacity))
    }
}

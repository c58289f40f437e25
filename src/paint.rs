// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint servers and the descriptors a shape can carry instead of paths.

use crate::{Affine, Color, Point, Shape};

/// How a shape's interior or outline is painted.
///
/// Every reference in the document has been resolved by the time a `Paint`
/// exists; an unresolved or dangling reference becomes [`Paint::None`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Paint {
    /// Nothing is drawn.
    #[default]
    None,
    /// A solid color with its alpha already folded in.
    Color(Color),
    /// A linear gradient.
    LinearGradient(Box<Gradient>),
    /// A radial gradient.
    RadialGradient(Box<Gradient>),
    /// A tiled pattern.
    Pattern(Box<Pattern>),
    /// Text drawn glyph by glyph. The color is the text's fill color.
    Text(Box<Text>, Color),
    /// An embedded raster image.
    Image(Box<EmbeddedImage>),
}

impl Paint {
    /// Is this [`Paint::None`]?
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Paint::None)
    }

    /// The solid color of this paint, if it has one.
    pub fn color(&self) -> Option<Color> {
        match self {
            Paint::Color(c) | Paint::Text(_, c) => Some(*c),
            _ => None,
        }
    }
}

/// What happens beyond the ends of a gradient.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpreadMode {
    /// Extend the end colors.
    #[default]
    Pad,
    /// Mirror the ramp.
    Reflect,
    /// Repeat the ramp.
    Repeat,
}

/// The coordinate system of gradient and pattern geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoordinateSpace {
    /// Fractions of the painted shape's bounding box.
    #[default]
    ObjectBoundingBox,
    /// Absolute document coordinates.
    UserSpace,
}

/// One color stop of a gradient.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GradientStop {
    /// Position along the ramp, nominally in `0..=1`.
    pub offset: f64,
    /// The stop color with its stop opacity as alpha.
    pub color: Color,
}

/// The geometry of a gradient.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GradientGeometry {
    /// A ramp from `start` to `end`.
    Linear {
        /// Where offset 0 lies.
        start: Point,
        /// Where offset 1 lies.
        end: Point,
    },
    /// A ramp from the focal point out to the circle.
    Radial {
        /// Center of the end circle.
        center: Point,
        /// Radius of the end circle.
        radius: f64,
        /// Focal point. A zero coordinate means "same as the center".
        focus: Point,
    },
}

/// A resolved gradient.
///
/// Percent lengths have been normalized, so in object bounding box space the
/// geometry is in fractions of the shape's box.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    /// Linear or radial parameters.
    pub geometry: GradientGeometry,
    /// Stops sorted by offset.
    pub stops: Vec<GradientStop>,
    /// Behavior past the ends.
    pub spread: SpreadMode,
    /// What the geometry is relative to.
    pub units: CoordinateSpace,
    /// The gradient transform. In user space this includes the shape's
    /// transform.
    pub transform: Affine,
}

/// A resolved pattern tile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pattern {
    /// Tile origin x.
    pub x: f64,
    /// Tile origin y.
    pub y: f64,
    /// Tile width.
    pub width: f64,
    /// Tile height.
    pub height: f64,
    /// What the tile geometry is relative to.
    pub units: CoordinateSpace,
    /// The tile's content, in tile coordinates.
    pub shapes: Vec<Shape>,
    /// Used as the tile content when there are no shapes.
    pub image: Option<EmbeddedImage>,
}

/// A text run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Text {
    /// Pen start x.
    pub x: f64,
    /// Pen start (baseline) y.
    pub y: f64,
    /// Horizontal shift, from the `width` attribute.
    pub dx: f64,
    /// Vertical shift, from the `height` attribute.
    pub dy: f64,
    /// Rotation in degrees.
    pub rotate: f64,
    /// Requested advance of the whole run.
    pub text_length: f64,
    /// Font size in document units.
    pub font_size: f64,
    /// Requested font family, informational only.
    pub font_family: String,
    /// The characters, at most [`Text::MAX_CHARS`] bytes.
    pub content: String,
    /// Stroke the glyph outlines as well.
    pub has_stroke: bool,
}

impl Text {
    /// Longer text content is truncated to this many bytes, on a character
    /// boundary.
    pub const MAX_CHARS: usize = 127;
}

/// A raster image embedded in or referenced by the document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmbeddedImage {
    /// The `id` of the `<image>` element.
    pub id: String,
    /// Placement x.
    pub x: f64,
    /// Placement y.
    pub y: f64,
    /// Placement box width.
    pub width: f64,
    /// Placement box height.
    pub height: f64,
    /// The format from the data URL, for example `png`, or
    /// [`EmbeddedImage::FORMAT_URL`] for a by-reference image.
    pub format: String,
    /// The data URL encoding, normally `base64`.
    pub encoding: String,
    /// The encoded payload, or the reference for [`EmbeddedImage::FORMAT_URL`].
    pub data: String,
    /// `false` when the payload was too large to keep.
    pub drawable: bool,
}

impl EmbeddedImage {
    /// The format of images given by reference rather than inline data.
    pub const FORMAT_URL: &'static str = "url";
    /// Payloads of this many bytes or more are not kept.
    pub const MAX_DATA_LEN: usize = 8300;

    /// Is this a by-reference image?
    pub fn is_reference(&self) -> bool {
        self.format == Self::FORMAT_URL
    }
}

/// The kind of an `animateTransform`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnimateKind {
    /// `type` was missing or not recognized.
    #[default]
    Unknown,
    /// `translate`.
    Translate,
    /// `rotate`.
    Rotate,
    /// `scale`.
    Scale,
}

impl AnimateKind {
    pub(crate) fn parse(s: &str) -> AnimateKind {
        match s {
            "translate" => AnimateKind::Translate,
            "rotate" => AnimateKind::Rotate,
            "scale" => AnimateKind::Scale,
            _ => AnimateKind::Unknown,
        }
    }
}

/// An `animateTransform` descriptor attached to a shape.
///
/// The crate does not animate anything itself; the descriptor is carried for
/// the consumer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Animate {
    /// The transform kind.
    pub kind: AnimateKind,
    /// The `attributeName` attribute.
    pub attribute_name: String,
    /// The `attributeType` attribute.
    pub attribute_type: String,
    /// The shape's `transform-origin`.
    pub transform_origin: String,
    /// The shape's `transform-box`.
    pub transform_box: String,
    /// Up to three start values.
    pub from: [i32; 3],
    /// Up to three end values.
    pub to: [i32; 3],
    /// Begin time.
    pub begin: i32,
    /// Duration.
    pub dur: i32,
    /// Repeat count, `-1` for `indefinite`.
    pub repeat_count: i32,
}

// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The collaborators a render pass drives.
//!
//! The renderer does no rasterization of its own. It packs geometry into a
//! [`PathBuffer`] and issues calls to a [`VectorDrawEngine`]. Glyph outlines
//! come from a [`FontProvider`] and raster payloads from an
//! [`ImageDecoder`].

use crate::{
    Affine, Color, EngineError, FillRule, GradientGeometry, GradientStop, PathBuffer, Rect,
    SpreadMode, StrokeStyle,
};

/// A pixel buffer owned by the draw engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Surface {
    /// Engine-defined handle.
    pub handle: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// How drawn pixels combine with the destination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Blend {
    /// Replace the destination.
    #[default]
    None,
    /// Source over destination.
    SrcOver,
    /// Source masked by the destination alpha.
    SrcIn,
    /// Multiply.
    Multiply,
    /// Screen.
    Screen,
}

/// Optional engine capabilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Features {
    /// Radial gradient fills are available.
    pub radial_gradient: bool,
    /// [`VectorDrawEngine::draw_pattern`] can repeat a tile natively.
    pub pattern_tiling: bool,
}

/// Packed geometry plus what the engine needs to rasterize it.
#[derive(Clone, Copy, Debug)]
pub struct DrawPath<'a> {
    /// The opcode stream.
    pub data: &'a PathBuffer,
    /// Bounds of the geometry in pixels.
    pub bounds: Rect,
    /// Stroke parameters, already in pixels. `None` fills the path.
    pub stroke: Option<&'a StrokeStyle>,
}

/// A gradient with its geometry resolved to pixels.
#[derive(Clone, Copy, Debug)]
pub struct GradientRamp<'a> {
    /// Control points.
    pub geometry: GradientGeometry,
    /// Stops with the shape opacity applied.
    pub stops: &'a [GradientStop],
    /// Behavior past the ends.
    pub spread: SpreadMode,
    /// Extra transform of the gradient space.
    pub transform: Affine,
}

/// Layout of a decoded image's pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8 bits per channel, red first.
    #[default]
    Rgba8888,
    /// 8 bits per channel, blue first.
    Bgra8888,
    /// 16 bits, 5-6-5.
    Rgb565,
    /// Alpha only.
    A8,
}

/// A decoded raster image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per row.
    pub stride: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// The pixels, `stride * height` bytes.
    pub data: Vec<u8>,
}

/// The hardware or software vector rasterizer.
///
/// Every call may fail; a failure aborts the render pass.
pub trait VectorDrawEngine {
    /// Optional capabilities of this engine.
    fn features(&self) -> Features;

    /// Allocate an offscreen surface.
    fn allocate(&mut self, width: u32, height: u32) -> Result<Surface, EngineError>;

    /// Release a surface returned by [`allocate`](Self::allocate).
    fn free(&mut self, surface: Surface) -> Result<(), EngineError>;

    /// Fill the whole surface with a color.
    fn clear(&mut self, surface: &Surface, color: Color) -> Result<(), EngineError>;

    /// Fill or stroke a path with a solid color.
    fn draw(
        &mut self,
        target: &Surface,
        path: &DrawPath<'_>,
        fill_rule: FillRule,
        transform: Affine,
        blend: Blend,
        color: Color,
    ) -> Result<(), EngineError>;

    /// Fill or stroke a path with a gradient.
    fn draw_gradient(
        &mut self,
        target: &Surface,
        path: &DrawPath<'_>,
        ramp: &GradientRamp<'_>,
        transform: Affine,
        blend: Blend,
    ) -> Result<(), EngineError>;

    /// Fill or stroke a path with a repeating tile.
    ///
    /// Only called when [`Features::pattern_tiling`] is set.
    fn draw_pattern(
        &mut self,
        target: &Surface,
        path: &DrawPath<'_>,
        transform: Affine,
        tile: &Surface,
        tile_transform: Affine,
        blend: Blend,
    ) -> Result<(), EngineError>;

    /// Copy one surface onto another.
    fn blit(
        &mut self,
        target: &Surface,
        source: &Surface,
        transform: Affine,
        blend: Blend,
    ) -> Result<(), EngineError>;

    /// Copy decoded pixels onto a surface.
    fn blit_pixels(
        &mut self,
        target: &Surface,
        source: &PixelBuffer,
        transform: Affine,
        blend: Blend,
    ) -> Result<(), EngineError>;

    /// Flush queued work at the end of a pass.
    fn finish(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// A glyph outline as path data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Glyph {
    /// Outline bounds in font units.
    pub bounds: Rect,
    /// Pen advance in pixels.
    pub advance: f64,
    /// The outline in `d=` path syntax, in font units with y pointing down.
    pub outline: String,
    /// Pixels per font unit at the requested size.
    pub scale: f64,
}

/// Source of glyph outlines.
pub trait FontProvider {
    /// The outline of `c` at a pixel size, or `None` if the font lacks it.
    fn glyph(&mut self, c: char, size: f64) -> Option<Glyph>;
}

/// Decoder for embedded raster payloads.
pub trait ImageDecoder {
    /// Decode `data`, declared as `format` (`"png"`, `"url"`, ...).
    fn decode(&mut self, format: &str, data: &[u8]) -> Option<PixelBuffer>;
}

impl<F> ImageDecoder for F
where
    F: FnMut(&str, &[u8]) -> Option<PixelBuffer>,
{
    fn decode(&mut self, format: &str, data: &[u8]) -> Option<PixelBuffer> {
        self(format, data)
    }
}

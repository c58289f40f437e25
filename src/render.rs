// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drawing a resolved [`Image`] through a [`VectorDrawEngine`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use smallvec::SmallVec;
use tracing::{debug, error, warn};

use crate::path_data::path_data_to_paths;
use crate::{
    Affine, Blend, BlendMode, ClipId, Color, CoordinateSpace, DrawPath, EmbeddedImage, Features,
    FillRule, FontProvider, Gradient, GradientGeometry, GradientRamp, GradientStop, Image,
    ImageDecoder, Paint, Path, PathBuffer, Pattern, Point, Rect, RenderConfig, RenderError, Shape,
    StrokeStyle, Surface, Text, Vec2, VectorDrawEngine,
};

/// Font size used when a text run has none.
const DEFAULT_FONT_SIZE: f64 = 16.0;

#[derive(Default)]
struct Decoders {
    inline: Option<Box<dyn ImageDecoder>>,
    reference: Option<Box<dyn ImageDecoder>>,
}

/// Draws images through a [`VectorDrawEngine`].
///
/// The renderer owns the scratch buffers geometry is packed into, so one
/// renderer should not be shared between threads without synchronization.
/// Different renderers are independent.
pub struct Renderer {
    config: RenderConfig,
    decoders: Decoders,
    path: PathBuffer,
    pattern_path: PathBuffer,
    glyph_path: PathBuffer,
}

impl core::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("inline_decoder", &self.decoders.inline.is_some())
            .field("reference_decoder", &self.decoders.reference.is_some())
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// A renderer with the given settings and no image decoders.
    pub fn new(config: RenderConfig) -> Renderer {
        Renderer {
            config,
            decoders: Decoders::default(),
            path: PathBuffer::new(config.path_capacity),
            pattern_path: PathBuffer::new(config.pattern_capacity),
            glyph_path: PathBuffer::new(config.path_capacity),
        }
    }

    /// The settings this renderer was created with.
    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Set the decoder for inline base64 payloads such as PNG data URLs.
    pub fn set_inline_decoder(&mut self, decoder: impl ImageDecoder + 'static) {
        self.decoders.inline = Some(Box::new(decoder));
    }

    /// Register the decoder for by-reference images.
    ///
    /// Only one is active; a later registration replaces an earlier one.
    pub fn register_image_decoder(&mut self, decoder: impl ImageDecoder + 'static) {
        self.decoders.reference = Some(Box::new(decoder));
    }

    /// Draw `image` onto `target`.
    ///
    /// Shapes are drawn in order. The first failure aborts the pass: a shape
    /// whose geometry does not fit the path buffer, a rejected engine call,
    /// or an inline image the decoder cannot read. Shapes drawn before the
    /// failure stay on the target.
    ///
    /// Text is skipped with a warning when `font` is `None`.
    pub fn render(
        &mut self,
        image: &Image,
        engine: &mut dyn VectorDrawEngine,
        target: &Surface,
        font: Option<&mut dyn FontProvider>,
    ) -> Result<(), RenderError> {
        debug!(
            shapes = image.shapes.len(),
            width = target.width,
            height = target.height,
            scale = self.config.scale,
            "render pass"
        );
        let mut cx = RenderContext {
            features: engine.features(),
            engine,
            font,
            decoders: &mut self.decoders,
            path: &mut self.path,
            pattern_path: &mut self.pattern_path,
            glyph_path: &mut self.glyph_path,
            target: *target,
            current: *target,
            clip: None,
            scale: self.config.scale,
            transform: self.config.transform,
        };
        let result = cx.render_image(image);
        if let Err(e) = &result {
            error!(error = %e, "render SVG error");
            cx.abandon_clip_run();
        }
        result
    }
}

/// Per-pass state threaded through every draw.
struct RenderContext<'a, 'f> {
    engine: &'a mut dyn VectorDrawEngine,
    font: Option<&'a mut (dyn FontProvider + 'f)>,
    decoders: &'a mut Decoders,
    path: &'a mut PathBuffer,
    pattern_path: &'a mut PathBuffer,
    glyph_path: &'a mut PathBuffer,
    features: Features,
    target: Surface,
    /// Where shapes are drawn: the target, or the clip run's offscreen.
    current: Surface,
    clip: Option<(ClipId, Surface)>,
    scale: f64,
    transform: Affine,
}

impl RenderContext<'_, '_> {
    fn render_image(&mut self, image: &Image) -> Result<(), RenderError> {
        let [sx, _, _, sy, _, _] = self.transform.as_coeffs();
        let media_width = sx * f64::from(self.target.width);
        let media_height = sy * f64::from(self.target.height);
        for shape in &image.shapes {
            if !shape.visible {
                continue;
            }
            if let Some(media) = &shape.media {
                if media.excludes(media_width, media_height) {
                    debug!(id = %shape.id, "shape outside media range");
                    continue;
                }
            }
            self.switch_clip(image, shape.clip)?;
            self.render_shape(shape)?;
        }
        self.switch_clip(image, None)?;
        self.engine.finish()?;
        Ok(())
    }

    /// End the current clip run if `clip` differs from it, and start a new
    /// one if `clip` names a clip path.
    fn switch_clip(&mut self, image: &Image, clip: Option<ClipId>) -> Result<(), RenderError> {
        let clip = clip.and_then(|id| Some((id, image.clip_path(id)?)));
        if self.clip.map(|(id, _)| id) == clip.map(|(id, _)| id) {
            return Ok(());
        }
        if let Some((id, buffer)) = self.clip.take() {
            self.current = self.target;
            self.engine
                .blit(&self.target, &buffer, Affine::IDENTITY, Blend::SrcOver)?;
            self.engine.free(buffer)?;
            debug!(clip = id.0, "clip run end");
        }
        if let Some((id, clip_path)) = clip {
            debug!(clip = id.0, id = %clip_path.id, "clip run begin");
            let buffer = self.engine.allocate(self.target.width, self.target.height)?;
            self.clip = Some((id, buffer));
            self.engine.clear(&buffer, Color::TRANSPARENT)?;
            self.path.pack(&clip_path.paths, self.scale, false)?;
            let bounds = Rect::union_all(clip_path.paths.iter().map(Path::bounds))
                .unwrap_or_default()
                .scale(self.scale);
            let mask = DrawPath {
                data: &*self.path,
                bounds,
                stroke: None,
            };
            self.engine.draw(
                &buffer,
                &mask,
                FillRule::EvenOdd,
                self.transform,
                Blend::None,
                Color::BLACK,
            )?;
            self.engine
                .blit(&buffer, &self.target, Affine::IDENTITY, Blend::SrcIn)?;
            self.current = buffer;
        }
        Ok(())
    }

    /// Release an open clip run after a failure, without compositing it.
    fn abandon_clip_run(&mut self) {
        if let Some((_, buffer)) = self.clip.take() {
            if let Err(e) = self.engine.free(buffer) {
                warn!(error = %e, "failed to release clip buffer");
            }
            self.current = self.target;
        }
    }

    fn render_shape(&mut self, shape: &Shape) -> Result<(), RenderError> {
        let has_fill = !shape.fill.is_none();
        let has_stroke = !shape.stroke.is_none();
        let bounds = shape.bounds.scale(self.scale);
        self.path
            .pack(&shape.paths, self.scale, has_stroke && !has_fill)?;
        if has_fill {
            self.fill(shape, bounds)?;
        }
        if has_stroke && !shape.paths.is_empty() {
            self.stroke(shape, bounds)?;
        }
        Ok(())
    }

    fn solid_blend(&self, translucent: bool) -> Blend {
        if self.clip.is_some() {
            Blend::SrcIn
        } else if translucent {
            Blend::SrcOver
        } else {
            Blend::None
        }
    }

    fn fill(&mut self, shape: &Shape, bounds: Rect) -> Result<(), RenderError> {
        let translucent = shape.opacity < 1.0
            || shape.fill_opacity < 1.0
            || matches!(shape.fill, Paint::Pattern(_));
        let blend = self.solid_blend(translucent);
        match &shape.fill {
            Paint::None => {}
            Paint::Color(c) => {
                let path = DrawPath {
                    data: &*self.path,
                    bounds,
                    stroke: None,
                };
                self.engine.draw(
                    &self.current,
                    &path,
                    shape.fill_rule,
                    self.transform,
                    blend,
                    c.premultiply(shape.opacity),
                )?;
            }
            Paint::LinearGradient(g) | Paint::RadialGradient(g) => {
                self.draw_gradient(g, shape, bounds, None)?;
            }
            Paint::Pattern(p) => self.draw_pattern(p, bounds, blend, None)?,
            Paint::Text(text, c) => self.draw_text(text, shape, c.premultiply(shape.opacity))?,
            Paint::Image(img) => {
                let dest = self.current;
                self.draw_image(img, &dest, self.transform)?;
            }
        }
        Ok(())
    }

    fn stroke(&mut self, shape: &Shape, bounds: Rect) -> Result<(), RenderError> {
        let mut style = shape.stroke_style.clone();
        style.scale(self.scale);
        match &shape.stroke {
            Paint::Color(c) => {
                let color = stroke_color(*c, shape);
                let path = DrawPath {
                    data: &*self.path,
                    bounds,
                    stroke: Some(&style),
                };
                if color.a() != 0xff {
                    self.engine.draw(
                        &self.current,
                        &path,
                        shape.fill_rule,
                        self.transform,
                        Blend::None,
                        Color::TRANSPARENT,
                    )?;
                }
                let blend = self.solid_blend(shape.stroke_opacity < 1.0);
                self.engine.draw(
                    &self.current,
                    &path,
                    shape.fill_rule,
                    self.transform,
                    blend,
                    color,
                )?;
            }
            Paint::LinearGradient(g) | Paint::RadialGradient(g) => {
                self.draw_gradient(g, shape, bounds, Some(&style))?;
            }
            Paint::Pattern(p) => {
                let blend = self.solid_blend(true);
                self.draw_pattern(p, bounds, blend, Some(&style))?;
            }
            Paint::None | Paint::Text(..) | Paint::Image(_) => {}
        }
        Ok(())
    }

    fn draw_gradient(
        &mut self,
        gradient: &Gradient,
        shape: &Shape,
        bounds: Rect,
        stroke: Option<&StrokeStyle>,
    ) -> Result<(), RenderError> {
        if matches!(gradient.geometry, GradientGeometry::Radial { .. })
            && !self.features.radial_gradient
        {
            warn!(id = %shape.id, "radial gradients are not supported by the draw engine");
            return Ok(());
        }
        let blend = match shape.blend {
            BlendMode::Normal => Blend::SrcOver,
            BlendMode::Multiply => Blend::Multiply,
            BlendMode::Screen => Blend::Screen,
        };
        let stops: SmallVec<[GradientStop; 8]> = gradient
            .stops
            .iter()
            .map(|s| GradientStop {
                offset: s.offset,
                color: s.color.premultiply(shape.opacity),
            })
            .collect();
        let ramp = GradientRamp {
            geometry: gradient_geometry(gradient, bounds, self.scale),
            stops: &stops,
            spread: gradient.spread,
            transform: gradient.transform,
        };
        let path = DrawPath {
            data: &*self.path,
            bounds,
            stroke,
        };
        self.engine
            .draw_gradient(&self.current, &path, &ramp, self.transform, blend)?;
        Ok(())
    }

    fn draw_pattern(
        &mut self,
        pattern: &Pattern,
        bounds: Rect,
        blend: Blend,
        stroke: Option<&StrokeStyle>,
    ) -> Result<(), RenderError> {
        let tile_size = match pattern.units {
            CoordinateSpace::ObjectBoundingBox => Vec2::new(
                bounds.width() * pattern.width,
                bounds.height() * pattern.height,
            ),
            CoordinateSpace::UserSpace => {
                Vec2::new(pattern.width * self.scale, pattern.height * self.scale)
            }
        };
        let (w, h) = (tile_size.x as u32, tile_size.y as u32);
        if w == 0 || h == 0 {
            debug!("empty pattern tile");
            return Ok(());
        }
        let tile = self.engine.allocate(w, h)?;
        let result = self.paint_with_tile(pattern, &tile, bounds, blend, stroke);
        let freed = self.engine.free(tile);
        result?;
        freed?;
        Ok(())
    }

    fn paint_with_tile(
        &mut self,
        pattern: &Pattern,
        tile: &Surface,
        bounds: Rect,
        blend: Blend,
        stroke: Option<&StrokeStyle>,
    ) -> Result<(), RenderError> {
        self.engine.clear(tile, Color::WHITE)?;
        if pattern.shapes.is_empty() {
            if let Some(img) = &pattern.image {
                self.draw_image(img, tile, Affine::IDENTITY)?;
            }
        }
        for shape in &pattern.shapes {
            self.draw_tile_shape(shape, tile)?;
        }
        if self.features.pattern_tiling {
            let origin = match pattern.units {
                CoordinateSpace::ObjectBoundingBox => Point::new(
                    bounds.x0 + bounds.width() * pattern.x,
                    bounds.y0 + bounds.height() * pattern.y,
                ),
                CoordinateSpace::UserSpace => {
                    Point::new(pattern.x * self.scale, pattern.y * self.scale)
                }
            };
            let path = DrawPath {
                data: &*self.path,
                bounds,
                stroke,
            };
            self.engine.draw_pattern(
                &self.current,
                &path,
                self.transform,
                tile,
                Affine::translate(origin.to_vec2()),
                blend,
            )?;
            return Ok(());
        }
        let (w, h) = (bounds.width() as u32, bounds.height() as u32);
        if w == 0 || h == 0 {
            return Ok(());
        }
        let scratch = self.engine.allocate(w, h)?;
        let result = self.tile_manually(pattern, tile, &scratch, bounds, blend, stroke);
        let freed = self.engine.free(scratch);
        result?;
        freed?;
        Ok(())
    }

    /// Repeat the tile over the shape bounds with blits, for engines
    /// without native tiling.
    ///
    /// The shape is drawn as a white mask into `scratch`, tiles are blitted
    /// into it through the mask, and the result lands on the current
    /// surface at the bounds origin.
    fn tile_manually(
        &mut self,
        pattern: &Pattern,
        tile: &Surface,
        scratch: &Surface,
        bounds: Rect,
        blend: Blend,
        stroke: Option<&StrokeStyle>,
    ) -> Result<(), RenderError> {
        let tile_size = Vec2::new(f64::from(tile.width), f64::from(tile.height));
        let (start, offset) = tile_start(pattern, bounds, tile_size, self.scale);
        let extent = offset + Vec2::new(bounds.width(), bounds.height());
        let (Some(columns), Some(rows)) = (
            tile_count(start.x, extent.x, tile_size.x),
            tile_count(start.y, extent.y, tile_size.y),
        ) else {
            warn!(?start, ?tile_size, "pattern tiling out of range, skipping");
            return Ok(());
        };
        self.engine.clear(scratch, Color::TRANSPARENT)?;
        let mask = DrawPath {
            data: &*self.path,
            bounds,
            stroke,
        };
        self.engine.draw(
            scratch,
            &mask,
            FillRule::EvenOdd,
            Affine::translate((-bounds.x0, -bounds.y0)),
            Blend::SrcOver,
            Color::WHITE,
        )?;
        for i in 0..columns {
            let x = start.x + f64::from(i) * tile_size.x;
            for j in 0..rows {
                let y = start.y + f64::from(j) * tile_size.y;
                self.engine.blit(
                    scratch,
                    tile,
                    Affine::translate((x - offset.x, y - offset.y)),
                    Blend::SrcIn,
                )?;
            }
        }
        self.engine.blit(
            &self.current,
            scratch,
            self.transform * Affine::translate((bounds.x0, bounds.y0)),
            blend,
        )?;
        Ok(())
    }

    /// Draw one of a pattern's own shapes into its tile.
    ///
    /// Tile content is drawn with solid colors only.
    fn draw_tile_shape(&mut self, shape: &Shape, tile: &Surface) -> Result<(), RenderError> {
        if !shape.visible {
            return Ok(());
        }
        let fill = shape.fill.color();
        let stroke = shape.stroke.color();
        self.pattern_path
            .pack(&shape.paths, self.scale, stroke.is_some() && fill.is_none())?;
        let bounds = shape.bounds.scale(self.scale);
        if let Some(c) = fill {
            let path = DrawPath {
                data: &*self.pattern_path,
                bounds,
                stroke: None,
            };
            self.engine.draw(
                tile,
                &path,
                shape.fill_rule,
                Affine::IDENTITY,
                Blend::None,
                c.premultiply(shape.opacity),
            )?;
        }
        if let Some(c) = stroke {
            let mut style = shape.stroke_style.clone();
            style.scale(self.scale);
            let path = DrawPath {
                data: &*self.pattern_path,
                bounds,
                stroke: Some(&style),
            };
            self.engine.draw(
                tile,
                &path,
                shape.fill_rule,
                Affine::IDENTITY,
                Blend::None,
                stroke_color(c, shape),
            )?;
        }
        Ok(())
    }

    fn draw_text(&mut self, text: &Text, shape: &Shape, color: Color) -> Result<(), RenderError> {
        let Some(font) = self.font.as_deref_mut() else {
            warn!(id = %shape.id, "no font provider, skipping text");
            return Ok(());
        };
        let size = match text.font_size * self.scale {
            s if s != 0.0 => s,
            _ => DEFAULT_FONT_SIZE,
        };
        let stroke = match (&shape.stroke, text.has_stroke) {
            (Paint::Color(c), true) => {
                let mut style = shape.stroke_style.clone();
                style.scale(self.scale);
                Some((style, c.premultiply(shape.opacity)))
            }
            _ => None,
        };
        let mut pen = Point::new(text.x * self.scale, text.y * self.scale);
        for c in text.content.chars() {
            let Some(glyph) = font.glyph(c, size) else {
                warn!(code_point = u32::from(c), "missing glyph");
                continue;
            };
            let placement = Affine::translate(pen.to_vec2()) * Affine::scale(glyph.scale);
            let paths = path_data_to_paths(&glyph.outline, placement);
            self.glyph_path.pack(&paths, 1.0, false)?;
            let bounds = Rect::union_all(paths.iter().map(Path::bounds)).unwrap_or_default();
            let path = DrawPath {
                data: &*self.glyph_path,
                bounds,
                stroke: None,
            };
            self.engine.draw(
                &self.current,
                &path,
                FillRule::EvenOdd,
                self.transform,
                Blend::SrcOver,
                color,
            )?;
            if let Some((style, stroke_color)) = &stroke {
                let path = DrawPath {
                    stroke: Some(style),
                    ..path
                };
                self.engine.draw(
                    &self.current,
                    &path,
                    FillRule::EvenOdd,
                    self.transform,
                    Blend::SrcOver,
                    *stroke_color,
                )?;
            }
            pen.x += glyph.advance;
        }
        Ok(())
    }

    /// Decode an embedded image and blit it onto `dest`, fitted to its box.
    ///
    /// Payloads that cannot be read are skipped with a warning, except
    /// when the inline decoder rejects them.
    fn draw_image(
        &mut self,
        img: &EmbeddedImage,
        dest: &Surface,
        base: Affine,
    ) -> Result<(), RenderError> {
        if !img.drawable {
            warn!(id = %img.id, "skipping oversize embedded image");
            return Ok(());
        }
        let pixels = if img.is_reference() {
            let Some(decoder) = self.decoders.reference.as_deref_mut() else {
                warn!(id = %img.id, "no image decoder registered");
                return Ok(());
            };
            match decoder.decode(&img.format, img.data.as_bytes()) {
                Some(pixels) => pixels,
                None => {
                    warn!(id = %img.id, "image decoder failed");
                    return Ok(());
                }
            }
        } else {
            let payload: Vec<u8> = img
                .data
                .bytes()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            let bytes = match BASE64.decode(payload) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(id = %img.id, error = %e, "base64 decode failed");
                    return Ok(());
                }
            };
            let Some(decoder) = self.decoders.inline.as_deref_mut() else {
                warn!(id = %img.id, "no image decoder registered");
                return Ok(());
            };
            decoder
                .decode(&img.format, &bytes)
                .ok_or_else(|| RenderError::ImageDecode {
                    format: img.format.clone(),
                })?
        };
        if pixels.width == 0 || pixels.height == 0 {
            return Ok(());
        }
        let transform = base * image_fit(img, pixels.width, pixels.height, self.scale);
        self.engine
            .blit_pixels(dest, &pixels, transform, Blend::SrcOver)?;
        Ok(())
    }
}

/// The stroke color after the shape opacity.
///
/// A translucent shape, or one with a fully transparent fill, only has its
/// stroke alpha scaled; otherwise every channel is.
fn stroke_color(c: Color, shape: &Shape) -> Color {
    if shape.opacity < 1.0 || shape.fill_opacity == 0.0 {
        c.scale_alpha(shape.opacity)
    } else {
        c.premultiply(shape.opacity)
    }
}

/// Map gradient geometry to pixels.
///
/// Bounding box fractions map into `bounds`, which is already scaled; user
/// space coordinates are multiplied by `scale`. A zero focus coordinate
/// falls back to the center.
fn gradient_geometry(gradient: &Gradient, bounds: Rect, scale: f64) -> GradientGeometry {
    let size = Vec2::new(bounds.width(), bounds.height());
    let map = |p: Point| match gradient.units {
        CoordinateSpace::ObjectBoundingBox => {
            Point::new(bounds.x0 + p.x * size.x, bounds.y0 + p.y * size.y)
        }
        CoordinateSpace::UserSpace => Point::new(p.x * scale, p.y * scale),
    };
    match gradient.geometry {
        GradientGeometry::Linear { start, end } => GradientGeometry::Linear {
            start: map(start),
            end: map(end),
        },
        GradientGeometry::Radial {
            center,
            radius,
            focus,
        } => {
            let c = map(center);
            let f = map(focus);
            let radius = match gradient.units {
                CoordinateSpace::ObjectBoundingBox => radius * size.x.max(size.y),
                CoordinateSpace::UserSpace => radius * scale,
            };
            GradientGeometry::Radial {
                center: c,
                radius,
                focus: Point::new(
                    if focus.x == 0.0 { c.x } else { f.x },
                    if focus.y == 0.0 { c.y } else { f.y },
                ),
            }
        }
    }
}

/// The most tiles blitted along one axis of a manually tiled pattern.
const MAX_TILES: u32 = 4096;

/// Where manual tiling starts, and the offset of the scratch surface.
///
/// The start is the last tile edge, in phase with the pattern origin, at or
/// before the bounds origin.
fn tile_start(pattern: &Pattern, bounds: Rect, tile: Vec2, scale: f64) -> (Point, Vec2) {
    match pattern.units {
        CoordinateSpace::ObjectBoundingBox => {
            let first = |v: f64, extent: f64, step: f64| {
                let s = if v > 1.0 { 0.0 } else { extent * v };
                align_back(s, 0.0, step)
            };
            let start = Point::new(
                first(pattern.x, bounds.width(), tile.x),
                first(pattern.y, bounds.height(), tile.y),
            );
            (start, Vec2::ZERO)
        }
        CoordinateSpace::UserSpace => {
            let start = Point::new(
                align_back(pattern.x * scale, bounds.x0, tile.x),
                align_back(pattern.y * scale, bounds.y0, tile.y),
            );
            (start, bounds.origin().to_vec2())
        }
    }
}

/// The largest `s - n * step` with integer `n` that is at or before `limit`.
fn align_back(s: f64, limit: f64, step: f64) -> f64 {
    if step.is_nan() || step <= 0.0 {
        return s;
    }
    let phase = (s - limit).rem_euclid(step);
    if phase == 0.0 {
        limit
    } else {
        limit + phase - step
    }
}

/// Number of tiles of size `step` from `start` needed to reach `end`.
///
/// `None` when the count is not finite or above [`MAX_TILES`].
fn tile_count(start: f64, end: f64, step: f64) -> Option<u32> {
    let n = ((end - start) / step).ceil();
    if n.is_finite() && n <= f64::from(MAX_TILES) {
        Some(n.max(0.0) as u32)
    } else {
        None
    }
}

/// The placement of decoded pixels in an image's box.
///
/// The longer pixel dimension is scaled to fit the box and the image is
/// centered along the box's shorter side.
fn image_fit(img: &EmbeddedImage, width: u32, height: u32, scale: f64) -> Affine {
    let (w, h) = (f64::from(width), f64::from(height));
    let s = if h > w {
        img.height * scale / h
    } else {
        img.width * scale / w
    };
    let center = if img.height > img.width {
        Vec2::new((img.width * scale - w * s) / 2.0, 0.0)
    } else {
        Vec2::new(0.0, (img.height * scale - h * s) / 2.0)
    };
    Affine::translate((img.x * scale, img.y * scale)) * Affine::translate(center) * Affine::scale(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parse, ClipPath, EngineError, Glyph, Instruction, MediaRange, ParseOptions, PixelBuffer,
        SpreadMode,
    };

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Allocate(u32, u32),
        Free(u64),
        Clear(u64, Color),
        Draw {
            target: u64,
            blend: Blend,
            color: Color,
            stroke: bool,
            bounds: Rect,
            last: Option<Instruction>,
        },
        Gradient {
            blend: Blend,
            geometry: GradientGeometry,
            stops: Vec<GradientStop>,
        },
        Pattern {
            tile: u64,
            tile_transform: Affine,
        },
        Blit {
            target: u64,
            source: u64,
            blend: Blend,
        },
        BlitPixels {
            target: u64,
            transform: Affine,
        },
        Finish,
    }

    const TARGET: Surface = Surface {
        handle: 0,
        width: 200,
        height: 100,
    };

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
        features: Features,
        next: u64,
        fail_on_draw: Option<usize>,
        draws: usize,
    }

    impl Recorder {
        fn draws(&self) -> Vec<&Call> {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::Draw { .. }))
                .collect()
        }

        fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|c| f(c)).count()
        }
    }

    impl VectorDrawEngine for Recorder {
        fn features(&self) -> Features {
            self.features
        }

        fn allocate(&mut self, width: u32, height: u32) -> Result<Surface, EngineError> {
            self.next += 1;
            self.calls.push(Call::Allocate(width, height));
            Ok(Surface {
                handle: self.next,
                width,
                height,
            })
        }

        fn free(&mut self, surface: Surface) -> Result<(), EngineError> {
            self.calls.push(Call::Free(surface.handle));
            Ok(())
        }

        fn clear(&mut self, surface: &Surface, color: Color) -> Result<(), EngineError> {
            self.calls.push(Call::Clear(surface.handle, color));
            Ok(())
        }

        fn draw(
            &mut self,
            target: &Surface,
            path: &DrawPath<'_>,
            _fill_rule: FillRule,
            _transform: Affine,
            blend: Blend,
            color: Color,
        ) -> Result<(), EngineError> {
            self.draws += 1;
            if self.fail_on_draw == Some(self.draws) {
                return Err(EngineError(-1));
            }
            self.calls.push(Call::Draw {
                target: target.handle,
                blend,
                color,
                stroke: path.stroke.is_some(),
                bounds: path.bounds,
                last: path.data.instructions().last(),
            });
            Ok(())
        }

        fn draw_gradient(
            &mut self,
            _target: &Surface,
            _path: &DrawPath<'_>,
            ramp: &GradientRamp<'_>,
            _transform: Affine,
            blend: Blend,
        ) -> Result<(), EngineError> {
            self.calls.push(Call::Gradient {
                blend,
                geometry: ramp.geometry,
                stops: ramp.stops.to_vec(),
            });
            Ok(())
        }

        fn draw_pattern(
            &mut self,
            _target: &Surface,
            _path: &DrawPath<'_>,
            _transform: Affine,
            tile: &Surface,
            tile_transform: Affine,
            _blend: Blend,
        ) -> Result<(), EngineError> {
            self.calls.push(Call::Pattern {
                tile: tile.handle,
                tile_transform,
            });
            Ok(())
        }

        fn blit(
            &mut self,
            target: &Surface,
            source: &Surface,
            _transform: Affine,
            blend: Blend,
        ) -> Result<(), EngineError> {
            self.calls.push(Call::Blit {
                target: target.handle,
                source: source.handle,
                blend,
            });
            Ok(())
        }

        fn blit_pixels(
            &mut self,
            target: &Surface,
            _source: &PixelBuffer,
            transform: Affine,
            _blend: Blend,
        ) -> Result<(), EngineError> {
            self.calls.push(Call::BlitPixels {
                target: target.handle,
                transform,
            });
            Ok(())
        }

        fn finish(&mut self) -> Result<(), EngineError> {
            self.calls.push(Call::Finish);
            Ok(())
        }
    }

    fn rect_path(x0: f64, y0: f64, x1: f64, y1: f64) -> Path {
        let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)];
        let mut pts = vec![Point::new(x0, y0)];
        for w in corners.windows(2) {
            let a = Point::from(w[0]);
            let b = Point::from(w[1]);
            pts.extend([a.lerp(b, 1.0 / 3.0), a.lerp(b, 2.0 / 3.0), b]);
        }
        Path::from_points(pts, true).unwrap()
    }

    fn rect_shape(x0: f64, y0: f64, x1: f64, y1: f64, fill: Paint) -> Shape {
        let mut shape = Shape {
            fill,
            paths: vec![rect_path(x0, y0, x1, y1)],
            ..Shape::default()
        };
        shape.update_bounds();
        shape
    }

    fn red() -> Paint {
        Paint::Color(Color::from_rgba8(255, 0, 0, 255))
    }

    fn image_of(shapes: Vec<Shape>) -> Image {
        Image {
            width: 200.0,
            height: 100.0,
            shapes,
            clip_paths: Vec::new(),
        }
    }

    fn render(image: &Image, engine: &mut Recorder) -> Result<(), RenderError> {
        Renderer::new(RenderConfig::default()).render(image, engine, &TARGET, None)
    }

    fn assert_rect_near(r0: Rect, r1: Rect) {
        let d = (r0.x0 - r1.x0).abs()
            + (r0.y0 - r1.y0).abs()
            + (r0.x1 - r1.x1).abs()
            + (r0.y1 - r1.y1).abs();
        assert!(d < 1e-9, "{r0:?} != {r1:?}");
    }

    #[test]
    fn opaque_fill() {
        let image = image_of(vec![rect_shape(10.0, 10.0, 40.0, 40.0, red())]);
        let mut engine = Recorder::default();
        render(&image, &mut engine).unwrap();
        assert_eq!(engine.calls.len(), 2);
        let Call::Draw {
            target,
            blend,
            color,
            stroke,
            bounds,
            last,
        } = engine.calls[0].clone()
        else {
            panic!("expected a draw, got {:?}", engine.calls[0]);
        };
        assert_eq!(target, 0);
        assert_eq!(blend, Blend::None);
        assert_eq!(color, Color::from_rgba8(255, 0, 0, 255));
        assert!(!stroke);
        assert_rect_near(bounds, Rect::new(10.0, 10.0, 40.0, 40.0));
        assert_eq!(last, Some(Instruction::End));
        assert_eq!(engine.calls[1], Call::Finish);
    }

    #[test]
    fn translucent_fill_blends() {
        let mut shape = rect_shape(0.0, 0.0, 10.0, 10.0, red());
        shape.opacity = 0.5;
        let mut engine = Recorder::default();
        render(&image_of(vec![shape]), &mut engine).unwrap();
        let Call::Draw { blend, color, .. } = engine.draws()[0].clone() else {
            unreachable!()
        };
        assert_eq!(blend, Blend::SrcOver);
        assert_eq!(color, Color::from_rgba8(127, 0, 0, 127));
    }

    #[test]
    fn render_scale() {
        let image = image_of(vec![rect_shape(10.0, 10.0, 40.0, 40.0, red())]);
        let mut engine = Recorder::default();
        let config = RenderConfig {
            scale: 2.0,
            ..RenderConfig::default()
        };
        Renderer::new(config)
            .render(&image, &mut engine, &TARGET, None)
            .unwrap();
        let Call::Draw { bounds, .. } = engine.draws()[0].clone() else {
            unreachable!()
        };
        assert_rect_near(bounds, Rect::new(20.0, 20.0, 80.0, 80.0));
    }

    #[test]
    fn translucent_stroke_is_cleared_first() {
        let mut shape = rect_shape(0.0, 0.0, 10.0, 10.0, Paint::None);
        shape.stroke = Paint::Color(Color::from_rgba8(0, 0, 255, 128));
        shape.stroke_opacity = 0.5;
        let mut engine = Recorder::default();
        render(&image_of(vec![shape]), &mut engine).unwrap();
        let draws = engine.draws();
        assert_eq!(draws.len(), 2);
        let Call::Draw {
            color, blend, last, ..
        } = draws[0].clone()
        else {
            unreachable!()
        };
        assert_eq!(color, Color::TRANSPARENT);
        assert_eq!(blend, Blend::None);
        // Stroke-only geometry has no end instruction.
        assert_eq!(last, Some(Instruction::Close));
        let Call::Draw {
            color,
            blend,
            stroke,
            ..
        } = draws[1].clone()
        else {
            unreachable!()
        };
        assert!(stroke);
        assert_eq!(color, Color::from_rgba8(0, 0, 255, 128));
        assert_eq!(blend, Blend::SrcOver);
    }

    #[test]
    fn opaque_stroke_after_fill() {
        let mut shape = rect_shape(0.0, 0.0, 10.0, 10.0, red());
        shape.stroke = Paint::Color(Color::BLACK);
        let mut engine = Recorder::default();
        render(&image_of(vec![shape]), &mut engine).unwrap();
        let draws = engine.draws();
        assert_eq!(draws.len(), 2);
        assert!(matches!(draws[0], Call::Draw { stroke: false, .. }));
        assert!(matches!(
            draws[1],
            Call::Draw {
                stroke: true,
                color: Color::BLACK,
                ..
            }
        ));
    }

    #[test]
    fn stroke_opacity_rules() {
        let mut shape = rect_shape(0.0, 0.0, 10.0, 10.0, red());
        let c = Color::from_rgba8(200, 100, 50, 255);
        shape.opacity = 0.5;
        assert_eq!(stroke_color(c, &shape), Color::from_rgba8(200, 100, 50, 127));
        shape.opacity = 1.0;
        shape.fill_opacity = 0.0;
        assert_eq!(stroke_color(c, &shape), c);
    }

    #[test]
    fn clip_runs_share_one_pass() {
        let mut shapes = Vec::new();
        for clip in [0, 0, 1, 0] {
            let mut s = rect_shape(0.0, 0.0, 10.0, 10.0, red());
            s.clip = Some(ClipId(clip));
            shapes.push(s);
        }
        shapes.push(rect_shape(0.0, 0.0, 5.0, 5.0, red()));
        let mut image = image_of(shapes);
        image.clip_paths = vec![
            ClipPath {
                id: "a".into(),
                paths: vec![rect_path(0.0, 0.0, 5.0, 5.0)],
            },
            ClipPath {
                id: "b".into(),
                paths: vec![rect_path(5.0, 5.0, 10.0, 10.0)],
            },
        ];
        let mut engine = Recorder::default();
        render(&image, &mut engine).unwrap();
        assert_eq!(engine.count(|c| matches!(c, Call::Allocate(200, 100))), 3);
        assert_eq!(engine.count(|c| matches!(c, Call::Free(_))), 3);
        assert_eq!(
            engine.count(|c| matches!(
                c,
                Call::Blit {
                    target: 0,
                    blend: Blend::SrcOver,
                    ..
                }
            )),
            3
        );
        // The first run holds both of the first two shapes.
        let first_run: Vec<_> = engine
            .calls
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::Draw {
                        target: 1,
                        blend: Blend::SrcIn,
                        ..
                    }
                )
            })
            .collect();
        assert_eq!(first_run.len(), 2);
        // The unclipped last shape goes straight to the target.
        assert!(matches!(
            engine.draws().last(),
            Some(Call::Draw {
                target: 0,
                blend: Blend::None,
                ..
            })
        ));
    }

    #[test]
    fn media_range_skips_shape() {
        let mut shape = rect_shape(0.0, 0.0, 10.0, 10.0, red());
        shape.media = Some(MediaRange {
            max_width: 150.0,
            ..MediaRange::default()
        });
        let mut engine = Recorder::default();
        render(&image_of(vec![shape.clone()]), &mut engine).unwrap();
        assert!(engine.draws().is_empty());

        let config = RenderConfig {
            transform: Affine::scale(0.5),
            ..RenderConfig::default()
        };
        let mut engine = Recorder::default();
        Renderer::new(config)
            .render(&image_of(vec![shape]), &mut engine, &TARGET, None)
            .unwrap();
        assert_eq!(engine.draws().len(), 1);
    }

    #[test]
    fn capacity_error_aborts() {
        let small = rect_shape(0.0, 0.0, 10.0, 10.0, red());
        let mut big = small.clone();
        big.paths = (0..4_u8)
            .map(|i| rect_path(f64::from(i), 0.0, 10.0, 10.0))
            .collect();
        let image = image_of(vec![small.clone(), big, small]);
        let config = RenderConfig {
            path_capacity: 40,
            ..RenderConfig::default()
        };
        let mut engine = Recorder::default();
        let err = Renderer::new(config)
            .render(&image, &mut engine, &TARGET, None)
            .unwrap_err();
        assert!(matches!(err, RenderError::Pack(_)));
        assert_eq!(engine.draws().len(), 1);
        assert!(!engine.calls.contains(&Call::Finish));
    }

    #[test]
    fn engine_failure_aborts() {
        let shapes = (0..3)
            .map(|_| rect_shape(0.0, 0.0, 10.0, 10.0, red()))
            .collect();
        let mut engine = Recorder {
            fail_on_draw: Some(2),
            ..Recorder::default()
        };
        let err = render(&image_of(shapes), &mut engine).unwrap_err();
        assert_eq!(err, RenderError::Engine(EngineError(-1)));
        assert_eq!(engine.draws().len(), 1);
    }

    #[test]
    fn failure_inside_clip_run_releases_buffer() {
        let mut shape = rect_shape(0.0, 0.0, 10.0, 10.0, red());
        shape.clip = Some(ClipId(0));
        let mut image = image_of(vec![shape]);
        image.clip_paths = vec![ClipPath {
            id: "c".into(),
            paths: vec![rect_path(0.0, 0.0, 5.0, 5.0)],
        }];
        let mut engine = Recorder {
            fail_on_draw: Some(2),
            ..Recorder::default()
        };
        assert!(render(&image, &mut engine).is_err());
        assert_eq!(engine.count(|c| matches!(c, Call::Free(1))), 1);
    }

    fn gradient(geometry: GradientGeometry, units: CoordinateSpace) -> Gradient {
        Gradient {
            geometry,
            stops: vec![
                GradientStop {
                    offset: 0.0,
                    color: Color::from_rgba8(255, 255, 255, 255),
                },
                GradientStop {
                    offset: 1.0,
                    color: Color::from_rgba8(0, 0, 0, 255),
                },
            ],
            spread: SpreadMode::Pad,
            units,
            transform: Affine::IDENTITY,
        }
    }

    #[test]
    fn gradient_geometry_spaces() {
        let bounds = Rect::new(10.0, 20.0, 50.0, 40.0);
        let linear = GradientGeometry::Linear {
            start: Point::new(0.0, 0.0),
            end: Point::new(1.0, 0.5),
        };
        let g = gradient(linear, CoordinateSpace::ObjectBoundingBox);
        assert_eq!(
            gradient_geometry(&g, bounds, 2.0),
            GradientGeometry::Linear {
                start: Point::new(10.0, 20.0),
                end: Point::new(50.0, 30.0),
            }
        );
        let g = gradient(linear, CoordinateSpace::UserSpace);
        assert_eq!(
            gradient_geometry(&g, bounds, 2.0),
            GradientGeometry::Linear {
                start: Point::new(0.0, 0.0),
                end: Point::new(2.0, 1.0),
            }
        );
        let radial = GradientGeometry::Radial {
            center: Point::new(0.5, 0.5),
            radius: 0.5,
            focus: Point::new(0.0, 0.25),
        };
        let g = gradient(radial, CoordinateSpace::ObjectBoundingBox);
        assert_eq!(
            gradient_geometry(&g, bounds, 1.0),
            GradientGeometry::Radial {
                center: Point::new(30.0, 30.0),
                radius: 20.0,
                focus: Point::new(30.0, 25.0),
            }
        );
    }

    #[test]
    fn gradient_fill() {
        let mut shape = rect_shape(
            0.0,
            0.0,
            10.0,
            10.0,
            Paint::LinearGradient(Box::new(gradient(
                GradientGeometry::Linear {
                    start: Point::ZERO,
                    end: Point::new(1.0, 0.0),
                },
                CoordinateSpace::ObjectBoundingBox,
            ))),
        );
        shape.opacity = 0.5;
        shape.blend = BlendMode::Multiply;
        let mut engine = Recorder::default();
        render(&image_of(vec![shape]), &mut engine).unwrap();
        let Call::Gradient { blend, stops, .. } = &engine.calls[0] else {
            panic!("expected a gradient, got {:?}", engine.calls[0]);
        };
        assert_eq!(*blend, Blend::Multiply);
        assert_eq!(stops[0].color, Color::from_rgba8(127, 127, 127, 127));
    }

    #[test]
    fn unsupported_radial_is_skipped() {
        let radial = GradientGeometry::Radial {
            center: Point::new(0.5, 0.5),
            radius: 0.5,
            focus: Point::ZERO,
        };
        let shape = rect_shape(
            0.0,
            0.0,
            10.0,
            10.0,
            Paint::RadialGradient(Box::new(gradient(
                radial,
                CoordinateSpace::ObjectBoundingBox,
            ))),
        );
        let image = image_of(vec![shape]);
        let mut engine = Recorder::default();
        render(&image, &mut engine).unwrap();
        assert_eq!(engine.calls, vec![Call::Finish]);

        let mut engine = Recorder {
            features: Features {
                radial_gradient: true,
                ..Features::default()
            },
            ..Recorder::default()
        };
        render(&image, &mut engine).unwrap();
        assert_eq!(engine.count(|c| matches!(c, Call::Gradient { .. })), 1);
    }

    fn checker() -> Pattern {
        Pattern {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            units: CoordinateSpace::UserSpace,
            shapes: vec![rect_shape(0.0, 0.0, 5.0, 5.0, Paint::Color(Color::BLACK))],
            image: None,
        }
    }

    #[test]
    fn native_pattern_tiling() {
        let shape = rect_shape(0.0, 0.0, 20.0, 20.0, Paint::Pattern(Box::new(checker())));
        let mut engine = Recorder {
            features: Features {
                pattern_tiling: true,
                ..Features::default()
            },
            ..Recorder::default()
        };
        render(&image_of(vec![shape]), &mut engine).unwrap();
        assert_eq!(engine.calls[0], Call::Allocate(10, 10));
        assert_eq!(engine.calls[1], Call::Clear(1, Color::WHITE));
        assert!(matches!(engine.calls[2], Call::Draw { target: 1, .. }));
        assert_eq!(
            engine.calls[3],
            Call::Pattern {
                tile: 1,
                tile_transform: Affine::IDENTITY,
            }
        );
        assert_eq!(engine.calls[4], Call::Free(1));
    }

    #[test]
    fn manual_pattern_tiling() {
        let shape = rect_shape(0.0, 0.0, 20.0, 20.0, Paint::Pattern(Box::new(checker())));
        let mut engine = Recorder::default();
        render(&image_of(vec![shape]), &mut engine).unwrap();
        assert_eq!(engine.count(|c| matches!(c, Call::Allocate(..))), 2);
        assert!(engine.calls.contains(&Call::Allocate(20, 20)));
        // A 20x20 area is covered by four 10x10 tiles.
        let tiles = engine.count(|c| {
            matches!(
                c,
                Call::Blit {
                    target: 2,
                    source: 1,
                    blend: Blend::SrcIn,
                }
            )
        });
        assert_eq!(tiles, 4);
        assert!(engine.calls.contains(&Call::Blit {
            target: 0,
            source: 2,
            blend: Blend::SrcOver,
        }));
        assert_eq!(engine.count(|c| matches!(c, Call::Free(_))), 2);
    }

    #[test]
    fn tile_start_walks_back() {
        let mut pattern = checker();
        pattern.x = 25.0;
        pattern.y = 3.0;
        let bounds = Rect::new(2.0, 2.0, 40.0, 40.0);
        let (start, offset) = tile_start(&pattern, bounds, Vec2::new(10.0, 10.0), 1.0);
        assert_eq!(start, Point::new(-5.0, -7.0));
        assert_eq!(offset, Vec2::new(2.0, 2.0));

        pattern.units = CoordinateSpace::ObjectBoundingBox;
        pattern.x = 0.5;
        pattern.y = 2.0;
        let (start, offset) = tile_start(&pattern, bounds, Vec2::new(10.0, 10.0), 1.0);
        assert_eq!(start, Point::new(-1.0, 0.0));
        assert_eq!(offset, Vec2::ZERO);
    }

    #[test]
    fn tile_start_far_origin() {
        let mut pattern = checker();
        let bounds = Rect::new(2.0, 2.0, 40.0, 40.0);
        let step = Vec2::new(10.0, 10.0);
        for v in [1e20, -1e20, 1e300, -37.0] {
            pattern.x = v;
            pattern.y = v;
            let (start, _) = tile_start(&pattern, bounds, step, 1.0);
            assert!(start.x <= 2.0 && start.x > -8.0, "{v}: {start:?}");
            assert!(start.y <= 2.0 && start.y > -8.0, "{v}: {start:?}");
        }
        pattern.x = f64::INFINITY;
        let (start, _) = tile_start(&pattern, bounds, step, 1.0);
        assert_eq!(tile_count(start.x, 40.0, step.x), None);
        assert_eq!(tile_count(-1e20, 40.0, 1.0), None);
        assert_eq!(tile_count(5.0, 2.0, 10.0), Some(0));
    }

    #[test]
    fn offset_pattern_origin_adds_tiles() {
        let mut pattern = checker();
        pattern.x = -3.0;
        pattern.y = -13.0;
        let shape = rect_shape(0.0, 0.0, 20.0, 20.0, Paint::Pattern(Box::new(pattern)));
        let mut engine = Recorder::default();
        render(&image_of(vec![shape]), &mut engine).unwrap();
        // Tiles start at -3 on both axes, so three columns and three rows.
        let tiles = engine.count(|c| {
            matches!(
                c,
                Call::Blit {
                    source: 1,
                    blend: Blend::SrcIn,
                    ..
                }
            )
        });
        assert_eq!(tiles, 9);
    }

    #[test]
    fn far_pattern_origin_renders() {
        let image = parse(
            r##"<svg width="100" height="100">
                <defs><pattern id="p" x="1e20" y="-1e20" width="10" height="10" patternUnits="userSpaceOnUse">
                    <rect width="5" height="5" fill="black"/></pattern></defs>
                <rect width="20" height="20" fill="url(#p)"/></svg>"##,
            &ParseOptions::default(),
        );
        let mut engine = Recorder::default();
        render(&image, &mut engine).unwrap();
        let tiles = engine.count(|c| matches!(c, Call::Blit { blend: Blend::SrcIn, .. }));
        assert_eq!(tiles, 4);
        assert_eq!(engine.count(|c| matches!(c, Call::Free(_))), 2);
    }

    struct BoxFont;

    impl FontProvider for BoxFont {
        fn glyph(&mut self, c: char, _size: f64) -> Option<Glyph> {
            if c == '?' {
                return None;
            }
            Some(Glyph {
                bounds: Rect::new(0.0, 0.0, 100.0, 100.0),
                advance: 12.0,
                outline: "M0 0 L100 0 L100 100 Z".into(),
                scale: 0.1,
            })
        }
    }

    fn text_shape(content: &str) -> Shape {
        let text = Text {
            x: 5.0,
            y: 20.0,
            content: content.into(),
            ..Text::default()
        };
        Shape {
            fill: Paint::Text(Box::new(text), Color::BLACK),
            ..Shape::default()
        }
    }

    #[test]
    fn text_draws_each_glyph() {
        let image = image_of(vec![text_shape("a?b")]);
        let mut engine = Recorder::default();
        let mut font = BoxFont;
        Renderer::new(RenderConfig::default())
            .render(&image, &mut engine, &TARGET, Some(&mut font))
            .unwrap();
        let bounds: Vec<Rect> = engine
            .draws()
            .iter()
            .map(|c| match c {
                Call::Draw { bounds, blend, .. } => {
                    assert_eq!(*blend, Blend::SrcOver);
                    *bounds
                }
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(bounds.len(), 2);
        assert!((bounds[0].x0 - 5.0).abs() < 1e-9);
        assert!((bounds[0].x1 - 15.0).abs() < 1e-9);
        assert!((bounds[1].x0 - 17.0).abs() < 1e-9);
        assert!((bounds[1].y1 - 30.0).abs() < 1e-9);
    }

    #[test]
    fn text_without_font_is_skipped() {
        let mut engine = Recorder::default();
        render(&image_of(vec![text_shape("a")]), &mut engine).unwrap();
        assert_eq!(engine.calls, vec![Call::Finish]);
    }

    fn image_shape(format: &str, data: &str) -> Shape {
        let img = EmbeddedImage {
            id: "img".into(),
            x: 10.0,
            y: 10.0,
            width: 40.0,
            height: 20.0,
            format: format.into(),
            encoding: "base64".into(),
            data: data.into(),
            drawable: true,
        };
        Shape {
            fill: Paint::Image(Box::new(img)),
            ..Shape::default()
        }
    }

    fn pixels(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer {
            width,
            height,
            stride: width * 4,
            data: vec![0; (width * height * 4) as usize],
            ..PixelBuffer::default()
        }
    }

    #[test]
    fn inline_image_is_fitted() {
        let image = image_of(vec![image_shape("png", "AAEC\nAw==")]);
        let mut renderer = Renderer::new(RenderConfig::default());
        renderer.set_inline_decoder(|format: &str, data: &[u8]| {
            assert_eq!(format, "png");
            assert_eq!(data, [0_u8, 1, 2, 3]);
            Some(pixels(20, 20))
        });
        let mut engine = Recorder::default();
        renderer.render(&image, &mut engine, &TARGET, None).unwrap();
        // 20x20 pixels into a 40x20 box: scaled by 2, then centered
        // vertically within the box height.
        let expected = Affine::translate((10.0, 10.0))
            * Affine::translate((0.0, -10.0))
            * Affine::scale(2.0);
        assert_eq!(
            engine.calls[0],
            Call::BlitPixels {
                target: 0,
                transform: expected,
            }
        );
    }

    #[test]
    fn undecodable_inline_image_fails() {
        let image = image_of(vec![image_shape("png", "AAAA")]);
        let mut renderer = Renderer::new(RenderConfig::default());
        renderer.set_inline_decoder(|_: &str, _: &[u8]| -> Option<PixelBuffer> { None });
        let mut engine = Recorder::default();
        let err = renderer
            .render(&image, &mut engine, &TARGET, None)
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::ImageDecode {
                format: "png".into()
            }
        );
    }

    #[test]
    fn bad_base64_is_skipped() {
        let image = image_of(vec![image_shape("png", "not base64!")]);
        let mut renderer = Renderer::new(RenderConfig::default());
        renderer.set_inline_decoder(|_: &str, _: &[u8]| Some(pixels(1, 1)));
        let mut engine = Recorder::default();
        renderer.render(&image, &mut engine, &TARGET, None).unwrap();
        assert_eq!(engine.calls, vec![Call::Finish]);
    }

    #[test]
    fn reference_decoder_last_registration_wins() {
        let image = image_of(vec![image_shape(EmbeddedImage::FORMAT_URL, "icons/a.png")]);
        let mut renderer = Renderer::new(RenderConfig::default());
        let mut engine = Recorder::default();
        renderer.render(&image, &mut engine, &TARGET, None).unwrap();
        assert_eq!(engine.calls, vec![Call::Finish]);

        renderer.register_image_decoder(|_: &str, _: &[u8]| -> Option<PixelBuffer> { None });
        renderer.register_image_decoder(|format: &str, data: &[u8]| {
            assert_eq!(format, "url");
            assert_eq!(data, b"icons/a.png");
            Some(pixels(4, 8))
        });
        let mut engine = Recorder::default();
        renderer.render(&image, &mut engine, &TARGET, None).unwrap();
        assert_eq!(engine.count(|c| matches!(c, Call::BlitPixels { .. })), 1);
    }

    #[test]
    fn oversize_image_is_skipped() {
        let mut shape = image_shape("png", "AAAA");
        if let Paint::Image(img) = &mut shape.fill {
            img.drawable = false;
        }
        let mut renderer = Renderer::new(RenderConfig::default());
        renderer.set_inline_decoder(|_: &str, _: &[u8]| Some(pixels(1, 1)));
        let mut engine = Recorder::default();
        renderer
            .render(&image_of(vec![shape]), &mut engine, &TARGET, None)
            .unwrap();
        assert_eq!(engine.calls, vec![Call::Finish]);
    }

    #[test]
    fn parsed_document_renders() {
        let image = parse(
            r##"<svg width="100" height="100"><rect x="10" y="10" width="30" height="30" fill="#ff0000"/></svg>"##,
            &ParseOptions::default(),
        );
        let mut engine = Recorder::default();
        render(&image, &mut engine).unwrap();
        let draws = engine.draws();
        assert_eq!(draws.len(), 1);
        let Call::Draw { color, bounds, .. } = draws[0].clone() else {
            unreachable!()
        };
        assert_eq!(color, Color::from_rgba8(255, 0, 0, 255));
        assert_rect_near(bounds, Rect::new(10.0, 10.0, 40.0, 40.0));
    }
}

// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Packed colors and the color value grammar.

use core::fmt;

use crate::lexer::{atof, is_space, scan_number};

/// A color packed as `r | g << 8 | b << 16 | a << 24`.
///
/// This is the byte order the draw engine consumes. Colors coming out of
/// [`parse_color`] carry a zero alpha byte; the alpha is filled in from the
/// relevant opacity once the paint is resolved.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color(pub u32);

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Color = Color(0);
    /// Opaque black.
    pub const BLACK: Color = Color::from_rgba8(0, 0, 0, 0xff);
    /// Opaque white.
    pub const WHITE: Color = Color::from_rgba8(0xff, 0xff, 0xff, 0xff);
    /// The mid-gray every unparseable color degrades to, with zero alpha.
    pub const FALLBACK_GRAY: Color = Color::from_rgb8(128, 128, 128);

    /// A color from its channels, with zero alpha.
    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Color {
        Color::from_rgba8(r, g, b, 0)
    }

    /// A color from its four channels.
    #[inline]
    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Color {
        Color(r as u32 | (g as u32) << 8 | (b as u32) << 16 | (a as u32) << 24)
    }

    /// The red channel.
    #[inline]
    pub const fn r(self) -> u8 {
        self.0 as u8
    }

    /// The green channel.
    #[inline]
    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// The blue channel.
    #[inline]
    pub const fn b(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// The alpha channel.
    #[inline]
    pub const fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Replace the alpha channel.
    #[inline]
    #[must_use]
    pub const fn with_alpha(self, a: u8) -> Color {
        Color(self.0 & 0x00ff_ffff | (a as u32) << 24)
    }

    /// Replace the alpha channel with `opacity * 255`, truncated.
    #[inline]
    #[must_use]
    pub fn with_opacity_alpha(self, opacity: f64) -> Color {
        self.with_alpha(unit_to_byte(opacity))
    }

    /// Multiply every channel, alpha included, by `opacity`.
    ///
    /// An opacity of exactly 1 leaves the color untouched.
    #[must_use]
    pub fn premultiply(self, opacity: f64) -> Color {
        if opacity == 1.0 {
            return self;
        }
        let scale = |c: u8| (f64::from(c) * opacity) as u8;
        Color::from_rgba8(scale(self.r()), scale(self.g()), scale(self.b()), scale(self.a()))
    }

    /// Multiply only the alpha channel by `opacity`.
    #[must_use]
    pub fn scale_alpha(self, opacity: f64) -> Color {
        self.with_alpha((f64::from(self.a()) * opacity) as u8)
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a()
        )
    }
}

impl From<u32> for Color {
    #[inline]
    fn from(v: u32) -> Color {
        Color(v)
    }
}

/// Convert an opacity in `0..=1` to a byte, truncating.
#[inline]
pub(crate) fn unit_to_byte(v: f64) -> u8 {
    (v * 255.0) as u8
}

/// Parse a color value.
///
/// Recognizes `#rrggbb`, `#rgb`, `rgb(r, g, b)` with integer or percentage
/// channels, the color part of `rgba(r,g,b,a)`, and the CSS named colors.
/// Anything else is [`Color::FALLBACK_GRAY`]. The result always has a zero
/// alpha byte; use [`parse_rgba_alpha`] for the alpha of an `rgba()` value.
pub fn parse_color(s: &str) -> Color {
    let s = s.trim_start_matches(' ');
    if s.starts_with('#') {
        parse_hex(&s[1..])
    } else if let Some(rest) = s.strip_prefix("rgb(") {
        parse_rgb(rest)
    } else if let Some(i) = s.find("rgba(") {
        // Found anywhere, unlike `rgb(`, so leading junk before `rgba(` is accepted.
        parse_rgba(&s[i + 5..]).map_or(Color::FALLBACK_GRAY, |(c, _)| c)
    } else {
        named_color(s).unwrap_or(Color::FALLBACK_GRAY)
    }
}

/// The alpha of an `rgba(r,g,b,a)` value, or `1` if `s` is not one.
pub fn parse_rgba_alpha(s: &str) -> f64 {
    s.find("rgba(")
        .and_then(|i| parse_rgba(&s[i + 5..]))
        .and_then(|(_, a)| a)
        .unwrap_or(1.0)
}

/// Look up a CSS color keyword.
pub fn named_color(name: &str) -> Option<Color> {
    NAMED_COLORS
        .iter()
        .find(|(n, ..)| *n == name)
        .map(|&(_, r, g, b)| Color::from_rgb8(r, g, b))
}

fn parse_hex(s: &str) -> Color {
    if let Some([r, g, b]) = hex_fields(s, 2) {
        Color::from_rgb8(r, g, b)
    } else if let Some([r, g, b]) = hex_fields(s, 1) {
        Color::from_rgb8(r * 17, g * 17, b * 17)
    } else {
        Color::FALLBACK_GRAY
    }
}

/// Read three consecutive hex fields of up to `width` digits each.
fn hex_fields(s: &str, width: usize) -> Option<[u8; 3]> {
    let mut b = s.as_bytes();
    let mut out = [0_u8; 3];
    for v in &mut out {
        let n = b.iter().take(width).take_while(|c| c.is_ascii_hexdigit()).count();
        if n == 0 {
            return None;
        }
        *v = b[..n]
            .iter()
            .fold(0, |acc, &c| acc * 16 + hex_digit(c));
        b = &b[n..];
    }
    Some(out)
}

fn hex_digit(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => c - b'A' + 10,
    }
}

/// Scan an unsigned decimal integer after optional whitespace.
fn scan_uint(s: &str) -> Option<(u32, &str)> {
    let s = skip_space(s);
    let n = s.bytes().take_while(u8::is_ascii_digit).count();
    if n == 0 {
        return None;
    }
    let v = s[..n]
        .bytes()
        .fold(0_u32, |acc, c| acc.saturating_mul(10).saturating_add(u32::from(c - b'0')));
    Some((v, &s[n..]))
}

fn skip_space(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_ascii() && is_space(c as u8))
}

fn clamp_channel(v: u32) -> u8 {
    v.min(255) as u8
}

/// The body of `rgb(`, integer channels first, then percentages.
fn parse_rgb(s: &str) -> Color {
    if let Some([r, g, b]) = rgb_integers(s) {
        return Color::from_rgb8(clamp_channel(r), clamp_channel(g), clamp_channel(b));
    }
    match rgb_percentages(s) {
        Some(p) => {
            let [r, g, b] = p.map(|v| clamp_channel((v * 2.55).round().max(0.0) as u32));
            Color::from_rgb8(r, g, b)
        }
        None => Color::FALLBACK_GRAY,
    }
}

fn rgb_integers(mut s: &str) -> Option<[u32; 3]> {
    let mut out = [0; 3];
    for (i, v) in out.iter_mut().enumerate() {
        let (n, rest) = scan_uint(s)?;
        *v = n;
        s = skip_space(rest);
        if i < 2 {
            s = s.strip_prefix(',')?;
        }
    }
    Some(out)
}

fn rgb_percentages(mut s: &str) -> Option<[f64; 3]> {
    const DELIMITERS: [char; 3] = [',', ',', ')'];
    let mut out = [0.0; 3];
    for (v, delim) in out.iter_mut().zip(DELIMITERS) {
        s = skip_space(s);
        s = s.strip_prefix('+').unwrap_or(s);
        if s.is_empty() {
            return None;
        }
        *v = atof(s);
        s = s.trim_start_matches(|c: char| c.is_ascii_digit());
        if let Some(frac) = s.strip_prefix('.') {
            if !frac.starts_with(|c: char| c.is_ascii_digit()) {
                return None;
            }
            s = frac.trim_start_matches(|c: char| c.is_ascii_digit());
        }
        s = s.strip_prefix('%')?;
        s = skip_space(s).strip_prefix(delim)?;
    }
    Some(out)
}

/// The body of `rgba(`: three integer channels and an optional alpha.
fn parse_rgba(s: &str) -> Option<(Color, Option<f64>)> {
    let (r, s) = scan_uint(s)?;
    let s = s.strip_prefix(',')?;
    let (g, s) = scan_uint(s)?;
    let s = s.strip_prefix(',')?;
    let (b, s) = scan_uint(s)?;
    let color = Color::from_rgb8(clamp_channel(r), clamp_channel(g), clamp_channel(b));
    let alpha = s.strip_prefix(',').and_then(|s| {
        let (token, _) = scan_number(skip_space(s));
        token
            .bytes()
            .any(|c| c.is_ascii_digit())
            .then(|| atof(token))
    });
    Some((color, alpha))
}

/// The CSS color keywords.
pub const NAMED_COLORS: [(&str, u8, u8, u8); 147] = [
    ("red", 255, 0, 0),
    ("green", 0, 128, 0),
    ("blue", 0, 0, 255),
    ("yellow", 255, 255, 0),
    ("cyan", 0, 255, 255),
    ("magenta", 255, 0, 255),
    ("black", 0, 0, 0),
    ("grey", 128, 128, 128),
    ("gray", 128, 128, 128),
    ("white", 255, 255, 255),
    ("aliceblue", 240, 248, 255),
    ("antiquewhite", 250, 235, 215),
    ("aqua", 0, 255, 255),
    ("aquamarine", 127, 255, 212),
    ("azure", 240, 255, 255),
    ("beige", 245, 245, 220),
    ("bisque", 255, 228, 196),
    ("blanchedalmond", 255, 235, 205),
    ("blueviolet", 138, 43, 226),
    ("brown", 165, 42, 42),
    ("burlywood", 222, 184, 135),
    ("cadetblue", 95, 158, 160),
    ("chartreuse", 127, 255, 0),
    ("chocolate", 210, 105, 30),
    ("coral", 255, 127, 80),
    ("cornflowerblue", 100, 149, 237),
    ("cornsilk", 255, 248, 220),
    ("crimson", 220, 20, 60),
    ("darkblue", 0, 0, 139),
    ("darkcyan", 0, 139, 139),
    ("darkgoldenrod", 184, 134, 11),
    ("darkgray", 169, 169, 169),
    ("darkgreen", 0, 100, 0),
    ("darkgrey", 169, 169, 169),
    ("darkkhaki", 189, 183, 107),
    ("darkmagenta", 139, 0, 139),
    ("darkolivegreen", 85, 107, 47),
    ("darkorange", 255, 140, 0),
    ("darkorchid", 153, 50, 204),
    ("darkred", 139, 0, 0),
    ("darksalmon", 233, 150, 122),
    ("darkseagreen", 143, 188, 143),
    ("darkslateblue", 72, 61, 139),
    ("darkslategray", 47, 79, 79),
    ("darkslategrey", 47, 79, 79),
    ("darkturquoise", 0, 206, 209),
    ("darkviolet", 148, 0, 211),
    ("deeppink", 255, 20, 147),
    ("deepskyblue", 0, 191, 255),
    ("dimgray", 105, 105, 105),
    ("dimgrey", 105, 105, 105),
    ("dodgerblue", 30, 144, 255),
    ("firebrick", 178, 34, 34),
    ("floralwhite", 255, 250, 240),
    ("forestgreen", 34, 139, 34),
    ("fuchsia", 255, 0, 255),
    ("gainsboro", 220, 220, 220),
    ("ghostwhite", 248, 248, 255),
    ("gold", 255, 215, 0),
    ("goldenrod", 218, 165, 32),
    ("greenyellow", 173, 255, 47),
    ("honeydew", 240, 255, 240),
    ("hotpink", 255, 105, 180),
    ("indianred", 205, 92, 92),
    ("indigo", 75, 0, 130),
    ("ivory", 255, 255, 240),
    ("khaki", 240, 230, 140),
    ("lavender", 230, 230, 250),
    ("lavenderblush", 255, 240, 245),
    ("lawngreen", 124, 252, 0),
    ("lemonchiffon", 255, 250, 205),
    ("lightblue", 173, 216, 230),
    ("lightcoral", 240, 128, 128),
    ("lightcyan", 224, 255, 255),
    ("lightgoldenrodyellow", 250, 250, 210),
    ("lightgray", 211, 211, 211),
    ("lightgreen", 144, 238, 144),
    ("lightgrey", 211, 211, 211),
    ("lightpink", 255, 182, 193),
    ("lightsalmon", 255, 160, 122),
    ("lightseagreen", 32, 178, 170),
    ("lightskyblue", 135, 206, 250),
    ("lightslategray", 119, 136, 153),
    ("lightslategrey", 119, 136, 153),
    ("lightsteelblue", 176, 196, 222),
    ("lightyellow", 255, 255, 224),
    ("lime", 0, 255, 0),
    ("limegreen", 50, 205, 50),
    ("linen", 250, 240, 230),
    ("maroon", 128, 0, 0),
    ("mediumaquamarine", 102, 205, 170),
    ("mediumblue", 0, 0, 205),
    ("mediumorchid", 186, 85, 211),
    ("mediumpurple", 147, 112, 219),
    ("mediumseagreen", 60, 179, 113),
    ("mediumslateblue", 123, 104, 238),
    ("mediumspringgreen", 0, 250, 154),
    ("mediumturquoise", 72, 209, 204),
    ("mediumvioletred", 199, 21, 133),
    ("midnightblue", 25, 25, 112),
    ("mintcream", 245, 255, 250),
    ("mistyrose", 255, 228, 225),
    ("moccasin", 255, 228, 181),
    ("navajowhite", 255, 222, 173),
    ("navy", 0, 0, 128),
    ("oldlace", 253, 245, 230),
    ("olive", 128, 128, 0),
    ("olivedrab", 107, 142, 35),
    ("orange", 255, 165, 0),
    ("orangered", 255, 69, 0),
    ("orchid", 218, 112, 214),
    ("palegoldenrod", 238, 232, 170),
    ("palegreen", 152, 251, 152),
    ("paleturquoise", 175, 238, 238),
    ("palevioletred", 219, 112, 147),
    ("papayawhip", 255, 239, 213),
    ("peachpuff", 255, 218, 185),
    ("peru", 205, 133, 63),
    ("pink", 255, 192, 203),
    ("plum", 221, 160, 221),
    ("powderblue", 176, 224, 230),
    ("purple", 128, 0, 128),
    ("rosybrown", 188, 143, 143),
    ("royalblue", 65, 105, 225),
    ("saddlebrown", 139, 69, 19),
    ("salmon", 250, 128, 114),
    ("sandybrown", 244, 164, 96),
    ("seagreen", 46, 139, 87),
    ("seashell", 255, 245, 238),
    ("sienna", 160, 82, 45),
    ("silver", 192, 192, 192),
    ("skyblue", 135, 206, 235),
    ("slateblue", 106, 90, 205),
    ("slategray", 112, 128, 144),
    ("slategrey", 112, 128, 144),
    ("snow", 255, 250, 250),
    ("springgreen", 0, 255, 127),
    ("steelblue", 70, 130, 180),
    ("tan", 210, 180, 140),
    ("teal", 0, 128, 128),
    ("thistle", 216, 191, 216),
    ("tomato", 255, 99, 71),
    ("turquoise", 64, 224, 208),
    ("violet", 238, 130, 238),
    ("wheat", 245, 222, 179),
    ("whitesmoke", 245, 245, 245),
    ("yellowgreen", 154, 205, 50),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(c: Color) -> (u8, u8, u8, u8) {
        (c.r(), c.g(), c.b(), c.a())
    }

    #[test]
    fn hex_forms() {
        assert_eq!(rgb(parse_color("#ff0000")), (255, 0, 0, 0));
        assert_eq!(rgb(parse_color("#abc")), (0xaa, 0xbb, 0xcc, 0));
        assert_eq!(rgb(parse_color("  #102030")), (0x10, 0x20, 0x30, 0));
        assert_eq!(parse_color("#"), Color::FALLBACK_GRAY);
        assert_eq!(parse_color("#zz"), Color::FALLBACK_GRAY);
    }

    #[test]
    fn rgb_forms() {
        assert_eq!(rgb(parse_color("rgb(1, 2, 3)")), (1, 2, 3, 0));
        assert_eq!(rgb(parse_color("rgb(300,0,0)")), (255, 0, 0, 0));
        // 50 * 2.55 lands just below 127.5.
        assert_eq!(rgb(parse_color("rgb(100%, 50%, 0%)")), (255, 127, 0, 0));
        assert_eq!(rgb(parse_color("rgb(20.5%,0%,0%)")), (52, 0, 0, 0));
        assert_eq!(parse_color("rgb(10%, 20)"), Color::FALLBACK_GRAY);
        assert_eq!(parse_color("rgb(33.%,0%,0%)"), Color::FALLBACK_GRAY);
    }

    #[test]
    fn rgba_forms() {
        assert_eq!(rgb(parse_color("rgba(10,20,30,0.5)")), (10, 20, 30, 0));
        assert_eq!(parse_rgba_alpha("rgba(10,20,30,0.5)"), 0.5);
        assert_eq!(parse_rgba_alpha("rgba(10,20,30)"), 1.0);
        assert_eq!(parse_rgba_alpha("#fff"), 1.0);
        assert_eq!(rgb(parse_color("x rgba(1,2,3,1)")), (1, 2, 3, 0));
        assert_eq!(parse_color("x rgb(1,2,3)"), Color::FALLBACK_GRAY);
    }

    #[test]
    fn named() {
        assert_eq!(rgb(parse_color("cornflowerblue")), (100, 149, 237, 0));
        assert_eq!(rgb(parse_color("black")), (0, 0, 0, 0));
        assert_eq!(NAMED_COLORS.len(), 147);
    }

    #[test]
    fn fallback_is_gray() {
        for s in ["", "bluish", "hsl(0, 0%, 0%)", "url(#g)", "RED"] {
            assert_eq!(rgb(parse_color(s)), (128, 128, 128, 0), "{s:?}");
        }
    }

    #[test]
    fn opacity_scaling() {
        let c = Color::from_rgba8(200, 100, 50, 255);
        assert_eq!(c.premultiply(1.0), c);
        assert_eq!(rgb(c.premultiply(0.5)), (100, 50, 25, 127));
        assert_eq!(rgb(c.scale_alpha(0.5)), (200, 100, 50, 127));
        assert_eq!(rgb(Color::from_rgb8(1, 2, 3).with_opacity_alpha(1.0)), (1, 2, 3, 255));
    }
}

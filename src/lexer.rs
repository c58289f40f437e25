// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tokenizing numbers, units and path data.
//!
//! Everything here works on byte slices of ASCII syntax and never allocates.
//! Malformed input is never an error: a token without digits reads as `0`,
//! and an unknown unit suffix reads as user units.

/// Number tokens longer than this are truncated.
pub const MAX_TOKEN_LEN: usize = 63;

/// The unit suffix of a length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Units {
    /// No suffix: a raw number in user space.
    #[default]
    User,
    /// Pixels.
    Px,
    /// Points, 1/72 inch.
    Pt,
    /// Picas, 1/6 inch.
    Pc,
    /// Millimeters.
    Mm,
    /// Centimeters.
    Cm,
    /// Inches.
    In,
    /// A percentage of a reference length.
    Percent,
    /// Multiples of the font size.
    Em,
    /// Multiples of the x-height, taken as `0.52` of the font size.
    Ex,
}

impl Units {
    /// Read a unit from the start of `s`.
    ///
    /// Only the prefix is examined, so `"px;"` and `"pxfoo"` are both pixels.
    /// Anything unrecognized is [`Units::User`].
    pub fn parse(s: &str) -> Units {
        match s.as_bytes() {
            [b'p', b'x', ..] => Units::Px,
            [b'p', b't', ..] => Units::Pt,
            [b'p', b'c', ..] => Units::Pc,
            [b'm', b'm', ..] => Units::Mm,
            [b'c', b'm', ..] => Units::Cm,
            [b'i', b'n', ..] => Units::In,
            [b'%', ..] => Units::Percent,
            [b'e', b'm', ..] => Units::Em,
            [b'e', b'x', ..] => Units::Ex,
            _ => Units::User,
        }
    }
}

/// A number together with its unit, not yet converted to pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinate {
    /// The numeric value.
    pub value: f64,
    /// The unit the value is expressed in.
    pub units: Units,
}

impl Coordinate {
    /// Create a new coordinate.
    #[inline]
    pub const fn new(value: f64, units: Units) -> Coordinate {
        Coordinate { value, units }
    }

    /// Parse a number followed by an optional unit suffix.
    pub fn parse(s: &str) -> Coordinate {
        let (token, rest) = scan_number(s);
        Coordinate {
            value: atof(token),
            units: Units::parse(rest),
        }
    }

    /// Convert to pixels.
    ///
    /// Percentages are taken of `length` and offset by `origin`; `em` and
    /// `ex` are relative to `font_size`.
    pub fn to_pixels(self, dpi: f64, font_size: f64, origin: f64, length: f64) -> f64 {
        let v = self.value;
        match self.units {
            Units::User | Units::Px => v,
            Units::Pt => v / 72.0 * dpi,
            Units::Pc => v / 6.0 * dpi,
            Units::Mm => v / 25.4 * dpi,
            Units::Cm => v / 2.54 * dpi,
            Units::In => v * dpi,
            Units::Em => v * font_size,
            Units::Ex => v * font_size * 0.52,
            Units::Percent => origin + v / 100.0 * length,
        }
    }
}

/// The whitespace set of the markup grammar.
#[inline]
pub(crate) fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

/// Trim the markup whitespace set from both ends.
pub(crate) fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_ascii() && is_space(c as u8))
}

/// Skip leading whitespace and commas.
pub(crate) fn skip_separators(s: &str) -> &str {
    s.trim_start_matches(|c: char| c == ',' || (c.is_ascii() && is_space(c as u8)))
}

/// Scan a number token from the start of `s`.
///
/// Returns the token and the remaining input. The token covers an optional
/// sign, integer digits, an optional fraction and an optional exponent. An
/// `e` directly followed by `m` or `x` is left alone so that `em` and `ex`
/// suffixes survive. Tokens are truncated to [`MAX_TOKEN_LEN`] bytes; the
/// remainder still advances past the whole number.
pub fn scan_number(s: &str) -> (&str, &str) {
    let b = s.as_bytes();
    let mut i = 0;
    if matches!(b.first(), Some(b'-' | b'+')) {
        i += 1;
    }
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    if b.get(i) == Some(&b'.') {
        i += 1;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
    }
    if matches!(b.get(i), Some(b'e' | b'E')) && !matches!(b.get(i + 1), Some(b'm' | b'x')) {
        i += 1;
        if matches!(b.get(i), Some(b'-' | b'+')) {
            i += 1;
        }
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
    }
    (&s[..i.min(MAX_TOKEN_LEN)], &s[i..])
}

/// Convert a number token to `f64` without consulting the locale.
///
/// A token with neither integer nor fraction digits reads as `0.0`.
pub fn atof(s: &str) -> f64 {
    let b = s.as_bytes();
    let mut i = 0;
    let mut sign = 1.0;
    match b.first() {
        Some(b'+') => i += 1,
        Some(b'-') => {
            sign = -1.0;
            i += 1;
        }
        _ => {}
    }

    let int_start = i;
    let mut res = 0.0;
    while i < b.len() && b[i].is_ascii_digit() {
        res = res * 10.0 + f64::from(b[i] - b'0');
        i += 1;
    }
    let has_int = i > int_start;

    let mut has_frac = false;
    if b.get(i) == Some(&b'.') {
        i += 1;
        let frac_start = i;
        let mut frac = 0.0;
        while i < b.len() && b[i].is_ascii_digit() {
            frac = frac * 10.0 + f64::from(b[i] - b'0');
            i += 1;
        }
        if i > frac_start {
            res += frac / pow10(i - frac_start);
            has_frac = true;
        }
    }

    if !has_int && !has_frac {
        return 0.0;
    }

    if matches!(b.get(i), Some(b'e' | b'E')) {
        if let Some(exp) = parse_int(&b[i + 1..]) {
            res *= 10f64.powi(exp);
        }
    }

    res * sign
}

fn pow10(digits: usize) -> f64 {
    let mut x = 1.0;
    for _ in 0..digits {
        x *= 10.0;
    }
    x
}

/// A signed decimal integer, saturating well beyond any finite `f64` exponent.
fn parse_int(b: &[u8]) -> Option<i32> {
    let (neg, digits) = match b.first() {
        Some(b'-') => (true, &b[1..]),
        Some(b'+') => (false, &b[1..]),
        _ => (false, b),
    };
    let n = digits.iter().take_while(|c| c.is_ascii_digit()).count();
    if n == 0 {
        return None;
    }
    let v = digits[..n]
        .iter()
        .fold(0_i32, |acc, &c| (acc * 10 + i32::from(c - b'0')).min(1000));
    Some(if neg { -v } else { v })
}

/// Scan and convert one number, returning it with the remaining input.
pub fn parse_number(s: &str) -> (f64, &str) {
    let (token, rest) = scan_number(s);
    (atof(token), rest)
}

/// Whether `s` starts like a number: an optional sign then a digit or `.`.
pub fn is_coordinate(s: &str) -> bool {
    let b = s.as_bytes();
    let b = match b.first() {
        Some(b'-' | b'+') => &b[1..],
        _ => b,
    };
    matches!(b.first(), Some(c) if c.is_ascii_digit() || *c == b'.')
}

/// One token of path data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathItem<'a> {
    /// A number token, unconverted.
    Number(&'a str),
    /// Any single non-numeric character, usually a command letter.
    Command(char),
}

/// Read the next path data token, skipping whitespace and commas.
///
/// Returns `None` at the end of input.
pub fn next_path_item(s: &str) -> (Option<PathItem<'_>>, &str) {
    let s = skip_separators(s);
    let Some(c) = s.chars().next() else {
        return (None, s);
    };
    if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() {
        let (token, rest) = scan_number(s);
        (Some(PathItem::Number(token)), rest)
    } else {
        (Some(PathItem::Command(c)), &s[c.len_utf8()..])
    }
}

/// Read an arc flag: a single `0` or `1`, which may be packed against the
/// following number as in `a1 1 0 0110 10`.
///
/// Returns `None` when the next token is not a flag; the returned input has
/// still skipped the leading separators.
pub fn next_arc_flag(s: &str) -> (Option<PathItem<'_>>, &str) {
    let s = skip_separators(s);
    match s.as_bytes().first() {
        Some(b'0' | b'1') => (Some(PathItem::Number(&s[..1])), &s[1..]),
        _ => (None, s),
    }
}

/// Split `s` on `sep`, trim each piece, and drop empty pieces.
pub(crate) fn split_trimmed(s: &str, sep: char) -> impl Iterator<Item = &str> {
    s.split(sep).map(trim).filter(|p| !p.is_empty())
}

/// Read a list of numbers separated by whitespace or commas, stopping at
/// the first byte that cannot start a number.
pub(crate) fn number_list(mut s: &str) -> impl Iterator<Item = f64> + '_ {
    core::iter::from_fn(move || {
        s = skip_separators(s);
        if !is_coordinate(s) {
            return None;
        }
        let (v, rest) = parse_number(s);
        s = rest;
        Some(v)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn scan_number_stops_before_em() {
        assert_eq!(scan_number("1.5em"), ("1.5", "em"));
        assert_eq!(scan_number("2ex"), ("2", "ex"));
        assert_eq!(scan_number("1e3px"), ("1e3", "px"));
        assert_eq!(scan_number("-.5,3"), ("-.5", ",3"));
    }

    #[test]
    fn scan_number_truncates() {
        let long = "1".repeat(100);
        let (token, rest) = scan_number(&long);
        assert_eq!(token.len(), MAX_TOKEN_LEN);
        assert!(rest.is_empty(), "whole number must be consumed");
    }

    #[test]
    fn atof_values() {
        assert_near(atof("12"), 12.0);
        assert_near(atof("-0.25"), -0.25);
        assert_near(atof("+.5"), 0.5);
        assert_near(atof("1.5e2"), 150.0);
        assert_near(atof("25e-1"), 2.5);
        assert_near(atof("7."), 7.0);
        assert_eq!(atof(""), 0.0);
        assert_eq!(atof("-"), 0.0);
        assert_eq!(atof("."), 0.0);
        assert_eq!(atof("e5"), 0.0);
    }

    #[test]
    fn units_prefix() {
        assert_eq!(Units::parse("px"), Units::Px);
        assert_eq!(Units::parse("mm)"), Units::Mm);
        assert_eq!(Units::parse("%"), Units::Percent);
        assert_eq!(Units::parse("ex"), Units::Ex);
        assert_eq!(Units::parse("furlong"), Units::User);
        assert_eq!(Units::parse(""), Units::User);
    }

    #[test]
    fn coordinate_parse() {
        assert_eq!(Coordinate::parse("50%"), Coordinate::new(50.0, Units::Percent));
        assert_eq!(Coordinate::parse("3in"), Coordinate::new(3.0, Units::In));
        assert_eq!(Coordinate::parse("x"), Coordinate::new(0.0, Units::User));
    }

    #[test]
    fn unit_conversion() {
        let px = |s: &str| Coordinate::parse(s).to_pixels(96.0, 10.0, 5.0, 200.0);
        assert_near(px("12"), 12.0);
        assert_near(px("12px"), 12.0);
        assert_near(px("1in"), 96.0);
        assert_near(px("72pt"), 96.0);
        assert_near(px("25.4mm"), 96.0);
        assert_near(px("2em"), 20.0);
        assert_near(px("1ex"), 5.2);
        assert_near(px("50%"), 105.0);
    }

    #[test]
    fn coordinate_detection() {
        assert!(is_coordinate("1"));
        assert!(is_coordinate("-.5"));
        assert!(is_coordinate("+2"));
        assert!(!is_coordinate("-"));
        assert!(!is_coordinate("M"));
        assert!(!is_coordinate(""));
    }

    #[test]
    fn path_items() {
        let mut s = "M10,-20L.5 3z";
        let mut items = Vec::new();
        while let (Some(item), rest) = next_path_item(s) {
            items.push(item);
            s = rest;
        }
        assert_eq!(
            items,
            [
                PathItem::Command('M'),
                PathItem::Number("10"),
                PathItem::Number("-20"),
                PathItem::Command('L'),
                PathItem::Number(".5"),
                PathItem::Number("3"),
                PathItem::Command('z'),
            ]
        );
    }

    #[test]
    fn arc_flags_packed() {
        let (flag, rest) = next_arc_flag(" 0110");
        assert_eq!(flag, Some(PathItem::Number("0")));
        assert_eq!(rest, "110");
        let (flag, rest) = next_arc_flag(", 5");
        assert_eq!(flag, None);
        assert_eq!(rest, "5");
    }

    #[test]
    fn numbers_in_list() {
        let v: Vec<f64> = number_list("1, 2 -3.5,4e1 x 9").collect();
        assert_eq!(v, [1.0, 2.0, -3.5, 40.0]);
    }
}

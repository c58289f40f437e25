// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The `transform` attribute grammar.

use arrayvec::ArrayVec;

use crate::lexer::parse_number;
use crate::Affine;

/// Parse a transform list such as `translate(10 20) rotate(45, 5, 5)`.
///
/// Items compose left to right, so the rightmost item is applied to points
/// first. Unknown text between items is skipped. An item with more
/// arguments than its function accepts is ignored, and `matrix` with fewer
/// than six arguments contributes the identity.
pub fn parse_transform(s: &str) -> Affine {
    let mut xform = Affine::IDENTITY;
    let mut rest = s;
    while !rest.is_empty() {
        match parse_item(rest) {
            Some((t, consumed)) => {
                xform *= t;
                rest = &rest[consumed..];
            }
            None => {
                let skip = rest.chars().next().map_or(1, char::len_utf8);
                rest = &rest[skip..];
            }
        }
    }
    xform
}

/// Parse the item at the start of `s`, returning it with the byte length
/// consumed through the closing parenthesis.
fn parse_item(s: &str) -> Option<(Affine, usize)> {
    const FUNCTIONS: [(&str, usize); 6] = [
        ("matrix", 6),
        ("translate", 2),
        ("scale", 2),
        ("rotate", 3),
        ("skewX", 1),
        ("skewY", 1),
    ];
    let &(name, max_args) = FUNCTIONS.iter().find(|(name, _)| s.starts_with(name))?;
    let (args, consumed) = parse_args(s, max_args)?;
    let t = match (name, args.as_slice()) {
        ("matrix", &[a, b, c, d, e, f]) => Affine::new([a, b, c, d, e, f]),
        ("matrix", _) => Affine::IDENTITY,
        ("translate", &[tx]) => Affine::translate((tx, 0.0)),
        ("translate", &[tx, ty]) => Affine::translate((tx, ty)),
        ("scale", &[s]) => Affine::scale(s),
        ("scale", &[sx, sy]) => Affine::scale_non_uniform(sx, sy),
        ("rotate", &[a]) => Affine::rotate(a.to_radians()),
        ("rotate", &[a, cx]) => Affine::rotate_about(a.to_radians(), (cx, 0.0)),
        ("rotate", &[a, cx, cy]) => Affine::rotate_about(a.to_radians(), (cx, cy)),
        ("skewX", &[a]) => Affine::skew_x(a.to_radians()),
        ("skewY", &[a]) => Affine::skew_y(a.to_radians()),
        _ => Affine::IDENTITY,
    };
    Some((t, consumed))
}

/// Collect the numbers between `(` and `)`.
///
/// Returns `None` when either parenthesis is missing or when there are more
/// than `max_args` numbers.
fn parse_args(s: &str, max_args: usize) -> Option<(ArrayVec<f64, 6>, usize)> {
    let open = s.find('(')?;
    let close = open + s[open..].find(')')?;
    let mut args = ArrayVec::new();
    let mut inner = &s[open + 1..close];
    while let Some(c) = inner.chars().next() {
        if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() {
            if args.len() >= max_args {
                return None;
            }
            let (v, rest) = parse_number(inner);
            args.push(v);
            inner = rest;
        } else {
            inner = &inner[c.len_utf8()..];
        }
    }
    Some((args, close + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;
    use core::f64::consts::FRAC_PI_2;

    fn assert_near(p0: Point, p1: Point) {
        assert!((p1 - p0).hypot() < 1e-9, "{p0:?} != {p1:?}");
    }

    #[test]
    fn single_items() {
        let p = Point::new(1.0, 2.0);
        assert_near(parse_transform("translate(10)") * p, Point::new(11.0, 2.0));
        assert_near(parse_transform("translate(10,-5)") * p, Point::new(11.0, -3.0));
        assert_near(parse_transform("scale(3)") * p, Point::new(3.0, 6.0));
        assert_near(parse_transform("scale(3 .5)") * p, Point::new(3.0, 1.0));
        assert_near(parse_transform("rotate(90)") * p, Point::new(-2.0, 1.0));
        assert_near(parse_transform("skewX(45)") * p, Point::new(3.0, 2.0));
        assert_near(parse_transform("skewY(45)") * p, Point::new(1.0, 3.0));
        assert_near(
            parse_transform("matrix(1 0 0 1 5 6)") * p,
            Point::new(6.0, 8.0),
        );
    }

    #[test]
    fn rotate_about_center() {
        let t = parse_transform("rotate(90 10 10)");
        assert_near(t * Point::new(10.0, 10.0), Point::new(10.0, 10.0));
        assert_near(t * Point::new(20.0, 10.0), Point::new(10.0, 20.0));
        let expected = Affine::rotate_about(FRAC_PI_2, (10.0, 10.0));
        assert_near(expected * Point::new(3.0, 4.0), t * Point::new(3.0, 4.0));
    }

    #[test]
    fn composition_order() {
        // The rightmost item applies first.
        let t = parse_transform("translate(10,0) scale(2)");
        assert_near(t * Point::new(1.0, 1.0), Point::new(12.0, 2.0));
        let t = parse_transform("scale(2),translate(10,0)");
        assert_near(t * Point::new(1.0, 1.0), Point::new(22.0, 2.0));
    }

    #[test]
    fn malformed_items() {
        assert_eq!(parse_transform("matrix(1 2 3)"), Affine::IDENTITY);
        assert_eq!(parse_transform("translate(1 2 3)"), Affine::IDENTITY);
        assert_eq!(parse_transform("scale(2"), Affine::IDENTITY);
        assert_eq!(parse_transform("bogus"), Affine::IDENTITY);
        assert_eq!(parse_transform(""), Affine::IDENTITY);
    }
}

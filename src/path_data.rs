// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The path data (`d` attribute) state machine.

use crate::lexer::{atof, is_coordinate, next_arc_flag, next_path_item, PathItem};
use crate::path::PathBuilder;
use crate::{Affine, ArcSegment, EllipticalArc, Path, Point, Vec2};

/// Number of arguments taken by each repetition of a command, or `None`
/// for letters that are not path commands.
fn args_per_command(cmd: char) -> Option<usize> {
    match cmd {
        'V' | 'v' | 'H' | 'h' => Some(1),
        'M' | 'm' | 'L' | 'l' | 'T' | 't' => Some(2),
        'Q' | 'q' | 'S' | 's' => Some(4),
        'C' | 'c' => Some(6),
        'A' | 'a' => Some(7),
        'Z' | 'z' => Some(0),
        _ => None,
    }
}

/// Interpreter state across the tokens of one `d` string.
struct PathInterp<'a> {
    builder: &'a mut PathBuilder,
    transform: Affine,
    /// Current point.
    cur: Point,
    /// Last control point, for the shorthand curve commands.
    ctrl: Point,
    closed: bool,
}

impl PathInterp<'_> {
    fn rel(&self, rel: bool, x: f64, y: f64) -> Point {
        if rel {
            Point::new(self.cur.x + x, self.cur.y + y)
        } else {
            Point::new(x, y)
        }
    }

    fn commit(&mut self) {
        if self.builder.has_points() {
            self.builder.commit(self.closed, self.transform);
        }
    }

    /// Execute one complete repetition of `cmd`.
    fn exec(&mut self, cmd: char, args: &[f64]) {
        let rel = cmd.is_ascii_lowercase();
        match cmd {
            'M' | 'm' => {
                self.cur = self.rel(rel, args[0], args[1]);
                self.builder.move_to(self.cur);
                self.ctrl = self.cur;
            }
            'L' | 'l' => {
                self.cur = self.rel(rel, args[0], args[1]);
                self.builder.line_to(self.cur);
                self.ctrl = self.cur;
            }
            'H' | 'h' => {
                self.cur.x = if rel { self.cur.x + args[0] } else { args[0] };
                self.builder.line_to(self.cur);
                self.ctrl = self.cur;
            }
            'V' | 'v' => {
                self.cur.y = if rel { self.cur.y + args[0] } else { args[0] };
                self.builder.line_to(self.cur);
                self.ctrl = self.cur;
            }
            'C' | 'c' => {
                let c1 = self.rel(rel, args[0], args[1]);
                let c2 = self.rel(rel, args[2], args[3]);
                let p = self.rel(rel, args[4], args[5]);
                self.builder.cubic_to(c1, c2, p);
                self.ctrl = c2;
                self.cur = p;
            }
            'S' | 's' => {
                let c1 = reflect(self.ctrl, self.cur);
                let c2 = self.rel(rel, args[0], args[1]);
                let p = self.rel(rel, args[2], args[3]);
                self.builder.cubic_to(c1, c2, p);
                self.ctrl = c2;
                self.cur = p;
            }
            'Q' | 'q' => {
                let c = self.rel(rel, args[0], args[1]);
                let p = self.rel(rel, args[2], args[3]);
                self.quad_to(c, p);
            }
            'T' | 't' => {
                let c = reflect(self.ctrl, self.cur);
                let p = self.rel(rel, args[0], args[1]);
                self.quad_to(c, p);
            }
            'A' | 'a' => {
                let to = self.rel(rel, args[5], args[6]);
                let arc = EllipticalArc {
                    from: self.cur,
                    to,
                    radii: Vec2::new(args[0], args[1]),
                    x_rotation: args[2],
                    large_arc: args[3].abs() > 1e-6,
                    sweep: args[4].abs() > 1e-6,
                };
                for seg in arc.to_cubics() {
                    match seg {
                        ArcSegment::Line(p) => self.builder.line_to(p),
                        ArcSegment::Cubic(c1, c2, p) => self.builder.cubic_to(c1, c2, p),
                    }
                }
                self.cur = to;
                self.ctrl = to;
            }
            _ => {
                // Numbers after a command that takes none just move the
                // current point.
                if let [.., x, y] = args {
                    self.cur = Point::new(*x, *y);
                    self.ctrl = self.cur;
                }
            }
        }
    }

    /// A quadratic segment, raised to a cubic.
    fn quad_to(&mut self, c: Point, p: Point) {
        let p0 = self.cur;
        let c1 = p0.lerp(c, 2.0 / 3.0);
        let c2 = p.lerp(c, 2.0 / 3.0);
        self.builder.cubic_to(c1, c2, p);
        self.ctrl = c;
        self.cur = p;
    }
}

/// Reflection of `ctrl` through `about`.
fn reflect(ctrl: Point, about: Point) -> Point {
    Point::new(2.0 * about.x - ctrl.x, 2.0 * about.y - ctrl.y)
}

/// Run path data through the interpreter, committing finished subpaths to
/// `builder` with `transform` applied.
///
/// Malformed data is never an error. Commands before the first moveto are
/// ignored, an unknown letter ignores the numbers that follow it, and an
/// incomplete final repetition is dropped.
pub(crate) fn parse_path_data(d: &str, builder: &mut PathBuilder, transform: Affine) {
    builder.reset();
    let mut it = PathInterp {
        builder,
        transform,
        cur: Point::ZERO,
        ctrl: Point::ZERO,
        closed: false,
    };
    let mut cmd: Option<char> = None;
    let mut args = [0.0; 10];
    let mut nargs = 0;
    let mut required = 0;
    let mut started = false;
    let mut s = d;

    loop {
        let mut item = None;
        if matches!(cmd, Some('A' | 'a')) && (nargs == 3 || nargs == 4) {
            let (flag, rest) = next_arc_flag(s);
            item = flag;
            s = rest;
        }
        if item.is_none() {
            let (next, rest) = next_path_item(s);
            item = next;
            s = rest;
        }
        let Some(item) = item else {
            break;
        };

        match item {
            PathItem::Number(token) if !is_coordinate(token) => {
                cmd = None;
                required = 0;
            }
            PathItem::Number(token) => {
                let Some(c) = cmd else {
                    continue;
                };
                if nargs < args.len() {
                    args[nargs] = atof(token);
                    nargs += 1;
                }
                if nargs >= required {
                    it.exec(c, &args[..nargs]);
                    if matches!(c, 'M' | 'm') {
                        // Further pairs after a moveto are linetos.
                        cmd = Some(if c == 'm' { 'l' } else { 'L' });
                        required = 2;
                        started = true;
                    }
                    nargs = 0;
                }
            }
            PathItem::Command(c) => {
                cmd = Some(c);
                if matches!(c, 'M' | 'm') {
                    it.commit();
                    it.builder.reset();
                    it.closed = false;
                    nargs = 0;
                } else if !started {
                    cmd = None;
                }
                if matches!(cmd, Some('Z' | 'z')) {
                    if let Some(start) = it.builder.start() {
                        it.cur = start;
                        it.ctrl = start;
                        it.closed = true;
                        it.commit();
                    }
                    it.builder.reset();
                    it.builder.move_to(it.cur);
                    it.closed = false;
                    nargs = 0;
                }
                match cmd.and_then(args_per_command) {
                    Some(n) => required = n,
                    None => {
                        cmd = None;
                        required = 0;
                    }
                }
            }
        }
    }
    it.commit();
}

/// Convert path data to paths with `transform` applied.
pub(crate) fn path_data_to_paths(d: &str, transform: Affine) -> Vec<Path> {
    let mut builder = PathBuilder::new();
    parse_path_data(d, &mut builder, transform);
    builder.take_paths()
}

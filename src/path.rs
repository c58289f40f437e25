// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Accumulating subpaths.

use crate::{Affine, Path, Point};

/// Points of the subpath being built, and the paths committed so far.
///
/// Every segment is stored as a cubic, so after the start point the buffer
/// grows three points at a time.
#[derive(Clone, Debug, Default)]
pub(crate) struct PathBuilder {
    points: Vec<Point>,
    paths: Vec<Path>,
}

impl PathBuilder {
    pub(crate) fn new() -> PathBuilder {
        PathBuilder::default()
    }

    /// Start a subpath at `p`. A repeated move replaces the pending start.
    pub(crate) fn move_to(&mut self, p: Point) {
        match self.points.last_mut() {
            Some(last) => *last = p,
            None => self.points.push(p),
        }
    }

    /// A straight segment, as a cubic with its handles at the thirds.
    pub(crate) fn line_to(&mut self, p: Point) {
        if let Some(&last) = self.points.last() {
            let (dx, dy) = ((p.x - last.x) / 3.0, (p.y - last.y) / 3.0);
            self.points.push(Point::new(last.x + dx, last.y + dy));
            self.points.push(Point::new(p.x - dx, p.y - dy));
            self.points.push(p);
        }
    }

    pub(crate) fn cubic_to(&mut self, c1: Point, c2: Point, p: Point) {
        if !self.points.is_empty() {
            self.points.extend([c1, c2, p]);
        }
    }

    /// The start of the pending subpath.
    pub(crate) fn start(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub(crate) fn has_points(&self) -> bool {
        !self.points.is_empty()
    }

    /// Discard the pending subpath.
    pub(crate) fn reset(&mut self) {
        self.points.clear();
    }

    /// Turn the pending points into a [`Path`] in document space.
    ///
    /// A closed subpath gets a final segment back to its start. Subpaths
    /// with fewer than four points are dropped. The pending points are left
    /// in place; callers reset them.
    pub(crate) fn commit(&mut self, closed: bool, transform: Affine) {
        if self.points.len() < 4 {
            return;
        }
        if closed {
            let start = self.points[0];
            self.line_to(start);
        }
        let points = self.points.iter().map(|&p| transform * p).collect();
        if let Some(path) = Path::from_points(points, closed) {
            self.paths.push(path);
        }
    }

    /// The committed paths, in document order.
    pub(crate) fn paths(&self) -> &[Path] {
        &self.paths
    }

    /// Take the committed paths, leaving the builder empty.
    pub(crate) fn take_paths(&mut self) -> Vec<Path> {
        self.points.clear();
        core::mem::take(&mut self.paths)
    }
}

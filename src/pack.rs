// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The opcode stream handed to the draw engine.

use crate::{PackError, Path, Point};

/// Instruction tags, with the values the draw engine expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// End of the stream.
    End = 0x00,
    /// Close the current subpath.
    Close = 0x01,
    /// Start a subpath; followed by two coordinates.
    Move = 0x02,
    /// A cubic segment; followed by six coordinates.
    Cubic = 0x08,
}

/// One cell of a [`PathBuffer`]: an opcode or a coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cell {
    /// An instruction tag.
    Op(Opcode),
    /// An operand.
    Coord(f32),
}

/// A decoded instruction from a [`PathBuffer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Instruction {
    /// Start a subpath at the point.
    Move(Point),
    /// A cubic segment through two control points to an end point.
    Cubic(Point, Point, Point),
    /// Close the current subpath.
    Close,
    /// End of the stream.
    End,
}

/// A fixed-capacity buffer of path instructions.
///
/// The capacity is counted in cells, each the size of one float on the
/// engine side. The buffer never holds more cells than its capacity.
#[derive(Clone, Debug)]
pub struct PathBuffer {
    cells: Vec<Cell>,
    capacity: usize,
}

impl PathBuffer {
    /// An empty buffer holding at most `capacity` cells.
    pub fn new(capacity: usize) -> PathBuffer {
        PathBuffer {
            cells: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// The maximum number of cells.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of cells written by the last [`pack`](Self::pack).
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Is the buffer empty?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The packed cells.
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// The size of the packed stream in bytes, one float per cell.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.cells.len() * core::mem::size_of::<f32>()
    }

    /// Drop the packed contents, keeping the capacity.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Replace the contents with the given paths.
    ///
    /// Every coordinate is multiplied by `scale`. Each path becomes a move,
    /// one cubic per group of three remaining points, and a close if the
    /// path is closed. An end instruction follows the last path unless
    /// `stroke_only` is set, in which case the engine derives the stroke
    /// outline from the open stream.
    ///
    /// Before each path the buffer checks that `(7 * n + 10) / 3` cells
    /// remain, `n` being the path's point count. If not, the buffer is
    /// cleared and the error reports the shortfall.
    pub fn pack(&mut self, paths: &[Path], scale: f64, stroke_only: bool) -> Result<(), PackError> {
        self.cells.clear();
        for path in paths {
            let required = packed_len(path.points().len());
            let remaining = self.capacity - self.cells.len();
            if remaining < required {
                self.cells.clear();
                return Err(PackError {
                    required,
                    remaining,
                });
            }
            let pts = path.points();
            self.cells.push(Cell::Op(Opcode::Move));
            self.push_point(pts[0], scale);
            for c in pts[1..].chunks_exact(3) {
                self.cells.push(Cell::Op(Opcode::Cubic));
                for &p in c {
                    self.push_point(p, scale);
                }
            }
            if path.is_closed() {
                self.cells.push(Cell::Op(Opcode::Close));
            }
        }
        if !stroke_only {
            if self.cells.len() == self.capacity {
                self.cells.clear();
                return Err(PackError {
                    required: 1,
                    remaining: 0,
                });
            }
            self.cells.push(Cell::Op(Opcode::End));
        }
        Ok(())
    }

    /// Decode the packed cells back into instructions.
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            cells: &self.cells,
            ix: 0,
        }
    }

    fn push_point(&mut self, p: Point, scale: f64) {
        self.cells.push(Cell::Coord((p.x * scale) as f32));
        self.cells.push(Cell::Coord((p.y * scale) as f32));
    }
}

/// The conservative number of cells a path of `n` points may take.
#[inline]
pub fn packed_len(n: usize) -> usize {
    (7 * n + 10) / 3
}

/// Iterator over the instructions of a [`PathBuffer`].
///
/// Stops at the first malformed cell.
#[derive(Clone, Debug)]
pub struct Instructions<'a> {
    cells: &'a [Cell],
    ix: usize,
}

impl Instructions<'_> {
    fn point(&mut self) -> Option<Point> {
        match self.cells.get(self.ix..self.ix + 2)? {
            [Cell::Coord(x), Cell::Coord(y)] => {
                self.ix += 2;
                Some(Point::new(f64::from(*x), f64::from(*y)))
            }
            _ => None,
        }
    }
}

impl Iterator for Instructions<'_> {
    type Item = Instruction;

    fn next(&mut self) -> Option<Instruction> {
        let Cell::Op(op) = *self.cells.get(self.ix)? else {
            return None;
        };
        self.ix += 1;
        Some(match op {
            Opcode::End => Instruction::End,
            Opcode::Close => Instruction::Close,
            Opcode::Move => Instruction::Move(self.point()?),
            Opcode::Cubic => Instruction::Cubic(self.point()?, self.point()?, self.point()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(p0: Point, p1: Point) {
        assert!((p1 - p0).hypot() < 1e-5, "{p0:?} != {p1:?}");
    }

    fn square(x: f64, closed: bool) -> Path {
        let corners = [(x, 0.0), (x + 10.0, 0.0), (x + 10.0, 10.0), (x, 10.0)];
        let mut pts = vec![Point::new(x, 0.0)];
        for i in 0..corners.len() - 1 {
            let a = Point::from(corners[i]);
            let b = Point::from(corners[i + 1]);
            pts.extend([a.lerp(b, 1.0 / 3.0), a.lerp(b, 2.0 / 3.0), b]);
        }
        Path::from_points(pts, closed).unwrap()
    }

    #[test]
    fn packs_move_cubics_close_end() {
        let mut buf = PathBuffer::new(64);
        buf.pack(&[square(0.0, true)], 2.0, false).unwrap();
        let ops: Vec<_> = buf.instructions().collect();
        assert_eq!(ops.len(), 6);
        assert_eq!(ops[0], Instruction::Move(Point::new(0.0, 0.0)));
        let Instruction::Cubic(p1, p2, p3) = ops[1] else {
            panic!("expected a cubic, got {:?}", ops[1]);
        };
        assert_near(p1, Point::new(20.0 / 3.0, 0.0));
        assert_near(p2, Point::new(40.0 / 3.0, 0.0));
        assert_near(p3, Point::new(20.0, 0.0));
        assert_eq!(ops[4], Instruction::Close);
        assert_eq!(ops[5], Instruction::End);
        // 3 + 3 * 7 + close + end
        assert_eq!(buf.len(), 26);
        assert_eq!(buf.byte_len(), 104);
    }

    #[test]
    fn stroke_only_omits_end() {
        let mut buf = PathBuffer::new(64);
        buf.pack(&[square(0.0, false)], 1.0, true).unwrap();
        let last = buf.instructions().last();
        assert!(matches!(last, Some(Instruction::Cubic(..))));
        assert_eq!(buf.len(), 24);
    }

    #[test]
    fn multiple_paths() {
        let mut buf = PathBuffer::new(128);
        buf.pack(&[square(0.0, true), square(20.0, false)], 1.0, false)
            .unwrap();
        let moves = buf
            .instructions()
            .filter(|i| matches!(i, Instruction::Move(_)))
            .count();
        assert_eq!(moves, 2);
        assert_eq!(buf.instructions().last(), Some(Instruction::End));
    }

    #[test]
    fn capacity_exceeded() {
        let mut pts = vec![Point::ZERO];
        for i in 0..300_u16 {
            let x = f64::from(i);
            pts.extend([Point::new(x, 1.0), Point::new(x, 2.0), Point::new(x + 1.0, 0.0)]);
        }
        let n = pts.len();
        let path = Path::from_points(pts, false).unwrap();
        let mut buf = PathBuffer::new(packed_len(n) - 1);
        let err = buf.pack(&[path.clone()], 1.0, false).unwrap_err();
        assert_eq!(err.required, packed_len(n));
        assert_eq!(err.remaining, packed_len(n) - 1);
        assert!(buf.is_empty());

        // Exactly the conservative bound always fits, end included.
        let mut buf = PathBuffer::new(packed_len(n));
        buf.pack(&[path], 1.0, false).unwrap();
        assert!(buf.len() <= buf.capacity());
    }

    #[test]
    fn second_path_overflows() {
        let mut buf = PathBuffer::new(packed_len(10) + 5);
        let err = buf
            .pack(&[square(0.0, true), square(20.0, true)], 1.0, false)
            .unwrap_err();
        assert_eq!(err.remaining, packed_len(10) + 5 - 25);
        assert!(buf.is_empty());
    }

    #[test]
    fn bound_is_conservative() {
        for segs in 1..50 {
            let n = 1 + 3 * segs;
            // move + coords, cubics, close, end
            let actual = 3 + 7 * segs + 1 + 1;
            assert!(packed_len(n) >= actual, "{n} points");
        }
    }
}

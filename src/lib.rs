// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! SVG documents for hardware vector rasterizers.
//!
//! The vgsvg library turns a subset of SVG into a flat list of [`Shape`]s
//! whose geometry is made only of cubic Bézier segments, and draws those
//! shapes through a caller-supplied [`VectorDrawEngine`]. It was written for
//! embedded targets where the rasterizer consumes a packed stream of
//! Move/Cubic/Close/End instructions and everything else (parsing, styling,
//! gradients, patterns and clipping) has to happen on the CPU beforehand.
//!
//! Parsing is forgiving. Malformed input never fails: unknown elements are
//! skipped, bad numbers read as zero, and dangling references paint nothing.
//! Only rendering reports errors, see [`RenderError`].
//!
//! # Examples
//!
//! Parse a document and look at the result:
//! ```
//! use vgsvg::{parse, Color, Paint, ParseOptions};
//!
//! let image = parse(
//!     r##"<svg width="100" height="50">
//!         <rect x="10" y="10" width="30" height="30" fill="#ff0000"/>
//!         <circle cx="70" cy="25" r="10" fill="none" stroke="blue"/>
//!     </svg>"##,
//!     &ParseOptions::default(),
//! );
//! assert_eq!((image.width, image.height), (100.0, 50.0));
//! assert_eq!(image.shapes.len(), 2);
//! assert_eq!(image.shapes[0].fill, Paint::Color(Color::from_rgba8(255, 0, 0, 255)));
//! assert!(image.shapes[1].fill.is_none());
//! ```
//!
//! Pack a shape into the opcode stream an engine consumes:
//! ```
//! use vgsvg::{parse, Instruction, ParseOptions, PathBuffer};
//!
//! let image = parse(
//!     r#"<svg width="10" height="10"><path d="M0 0 L10 0 L10 10 Z"/></svg>"#,
//!     &ParseOptions::default(),
//! );
//! let mut buf = PathBuffer::new(256);
//! buf.pack(&image.shapes[0].paths, 1.0, false).unwrap();
//! let ops: Vec<_> = buf.instructions().collect();
//! assert!(matches!(ops[0], Instruction::Move(_)));
//! assert_eq!(ops.last(), Some(&Instruction::End));
//! ```
//!
//! # Features
//!
//! - `serde`: Implement `serde::Deserialize` and `serde::Serialize` on the
//!   geometry and option types.
//! - `schemars`: Add best-effort support for using those types in JSON schemas
//!   using [schemars][].
//!
//! [schemars]: https://docs.rs/schemars

// LINEBENDER LINT SET - lib.rs - v1
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![allow(
    clippy::unreadable_literal,
    clippy::many_single_char_names,
    clippy::excessive_precision,
    clippy::bool_to_int_with_if
)]
// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
#![allow(
    unreachable_pub,
    trivial_numeric_casts,
    clippy::use_self,
    clippy::return_self_not_must_use,
    clippy::cast_possible_truncation,
    clippy::wildcard_imports,
    clippy::shadow_unrelated,
    clippy::missing_assert_message,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::exhaustive_enums,
    clippy::match_same_arms,
    clippy::partial_pub_fields,
    clippy::unseparated_literal_suffix,
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason
)]

mod affine;
mod arc;
mod attr;
mod color;
mod css;
mod cubicbez;
mod defs;
mod engine;
mod error;
pub mod lexer;
mod options;
mod pack;
mod paint;
mod parser;
mod path;
mod path_data;
mod point;
mod rect;
mod render;
mod resolve;
mod shape;
mod style;
mod transform;
mod vec2;
mod xml;

pub use crate::affine::*;
pub use crate::arc::*;
pub use crate::color::*;
pub use crate::cubicbez::*;
pub use crate::engine::*;
pub use crate::error::*;
pub use crate::lexer::Units;
pub use crate::options::*;
pub use crate::pack::*;
pub use crate::paint::*;
pub use crate::point::*;
pub use crate::rect::*;
pub use crate::render::*;
pub use crate::shape::*;
pub use crate::transform::*;
pub use crate::vec2::*;

/// Parse an SVG document into a resolved [`Image`].
///
/// Every `url(#id)` reference is resolved, the view box is fitted into the
/// viewport, and coordinates are converted to the unit named in `options`.
/// Clip paths no shape uses are dropped.
///
/// This never fails. Anything that cannot be understood is skipped, so the
/// result of garbage input is an empty image.
pub fn parse(input: &str, options: &ParseOptions) -> Image {
    resolve::resolve(parser::parse_document(input, options), options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_empty() {
        let image = parse("not an svg <<>>", &ParseOptions::default());
        assert!(image.shapes.is_empty());
        assert!(image.clip_paths.is_empty());
    }

    #[test]
    fn parse_then_pack() {
        let image = parse(
            r#"<svg width="20" height="20"><circle cx="10" cy="10" r="5"/></svg>"#,
            &ParseOptions::default(),
        );
        assert_eq!(image.shapes.len(), 1);
        let mut buf = PathBuffer::new(256);
        buf.pack(&image.shapes[0].paths, 1.0, false).unwrap();
        let cubics = buf
            .instructions()
            .filter(|i| matches!(i, Instruction::Cubic(..)))
            .count();
        // Four arcs plus the degenerate segment that closes the outline.
        assert_eq!(cubics, 5);
    }

    #[test]
    fn media_rules_reach_parsed_shapes() {
        let image = parse(
            r#"<svg width="50" height="50"><style>
                .wide{fill:red} @media (min-width: 120px) { .wide{} }
            </style><rect class="wide" width="10" height="10"/><rect width="5" height="5"/></svg>"#,
            &ParseOptions::default(),
        );
        let media = image.shapes[0].media.unwrap();
        assert_eq!(media.min_width, 120.0);
        assert!(media.excludes(100.0, 100.0));
        assert!(!media.excludes(200.0, 100.0));
        assert!(image.shapes[1].media.is_none());
    }
}

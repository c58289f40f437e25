// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parse and render settings.

use crate::lexer::Units;
use crate::Affine;

/// Settings for [`parse`](crate::parse).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseOptions {
    /// The unit the output coordinates are expressed in.
    pub units: Units,
    /// Resolution used to convert physical units to pixels.
    pub dpi: f64,
}

impl ParseOptions {
    /// Options for the given unit name (`"px"`, `"mm"`, ...) and resolution.
    ///
    /// An unknown unit name means user units.
    pub fn from_unit_str(units: &str, dpi: f64) -> ParseOptions {
        ParseOptions {
            units: Units::parse(units),
            dpi,
        }
    }
}

impl Default for ParseOptions {
    fn default() -> ParseOptions {
        ParseOptions {
            units: Units::Px,
            dpi: 96.0,
        }
    }
}

/// Settings for a [`Renderer`](crate::Renderer).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderConfig {
    /// Uniform scale applied to every coordinate.
    pub scale: f64,
    /// Extra transform applied to the whole render pass.
    pub transform: Affine,
    /// Capacity of the path buffer, in cells.
    pub path_capacity: usize,
    /// Capacity of the buffer used for pattern tile content, in cells.
    pub pattern_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> RenderConfig {
        RenderConfig {
            scale: 1.0,
            transform: Affine::IDENTITY,
            path_capacity: 8192,
            pattern_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_names() {
        assert_eq!(ParseOptions::from_unit_str("mm", 72.0).units, Units::Mm);
        assert_eq!(ParseOptions::from_unit_str("furlong", 72.0).units, Units::User);
        assert_eq!(ParseOptions::default().dpi, 96.0);
    }
}

// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render failures.
//!
//! Parsing never fails; it degrades. Only rendering reports errors.

use thiserror::Error;

/// A path did not fit in the remaining capacity of a [`PathBuffer`].
///
/// [`PathBuffer`]: crate::PathBuffer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("path buffer capacity exceeded: {required} cells needed, {remaining} remaining")]
pub struct PackError {
    /// Conservative cell count for the path that did not fit.
    pub required: usize,
    /// Cells left in the buffer when packing stopped.
    pub remaining: usize,
}

/// A draw engine call reported a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("draw engine failure (code {0})")]
pub struct EngineError(pub i32);

/// Why a render pass was aborted.
///
/// Shapes drawn before the failure stay on the target.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RenderError {
    /// A shape's geometry did not fit in the path buffer.
    #[error(transparent)]
    Pack(#[from] PackError),
    /// The draw engine rejected a call.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The inline image decoder rejected an embedded payload.
    #[error("failed to decode embedded {format} image")]
    ImageDecode {
        /// The declared format of the payload.
        format: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let e = RenderError::from(PackError {
            required: 12,
            remaining: 3,
        });
        assert_eq!(
            e.to_string(),
            "path buffer capacity exceeded: 12 cells needed, 3 remaining"
        );
        assert_eq!(
            RenderError::from(EngineError(-4)).to_string(),
            "draw engine failure (code -4)"
        );
    }
}

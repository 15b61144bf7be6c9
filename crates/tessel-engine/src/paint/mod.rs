//! Paint model: colors and blend modes.
//!
//! Colors are linear, premultiplied alpha. Blend modes map onto fixed-function
//! GPU blend state.

mod blend;
mod color;

pub use blend::BlendMode;
pub use color::Color;

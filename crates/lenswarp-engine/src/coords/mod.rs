//! Coordinate and size types shared by the distortion generators.
//!
//! Three 2D spaces are in play (see [`crate::distortion::CoordinateMapper`]):
//! - texture space, `[0, 1]²`, origin at the first texel
//! - screen space, `[-1, 1]²`, centered on the eye viewport
//! - rift space, centered on the lens axis with the vertical axis rescaled
//!   by the eye aspect ratio

mod resolution;
mod vec2;

pub use resolution::Resolution;
pub use vec2::Vec2;

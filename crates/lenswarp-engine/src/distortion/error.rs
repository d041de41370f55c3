use thiserror::Error;

use crate::coords::Resolution;

/// Configuration errors reported while building distortion data.
///
/// All of these are detected up front, either when a [`DistortionConfig`] is
/// constructed or when a generator validates its requested resolution. Nothing
/// in the generation passes themselves can fail.
///
/// [`DistortionConfig`]: super::DistortionConfig
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistortionError {
    #[error("{name} is not finite ({value})")]
    NonFinite { name: &'static str, value: f64 },

    #[error("radial coefficients K are all zero")]
    ZeroCoefficients,

    #[error("K0 must be positive, got {0}")]
    NonPositiveK0(f64),

    #[error("eye aspect must be positive, got {0}")]
    NonPositiveAspect(f64),

    #[error("radial scale vanishes or changes sign at r = {radius:.5}")]
    VanishingScale { radius: f64 },

    #[error("distorted radius decreases at r = {radius:.5}; K is not monotonic over the lens")]
    NonMonotonic { radius: f64 },

    #[error("lookup texture resolution {0} has a zero dimension")]
    EmptyLookup(Resolution),

    #[error("mesh grid {0} must be at least 2x2")]
    GridTooSmall(Resolution),

    #[error("mesh grid {0} does not fit 32-bit indices")]
    GridTooLarge(Resolution),

    #[error("source image holds {actual} bytes, expected {expected} for RGBA8")]
    SourceImageSize { expected: usize, actual: usize },

    #[error("HMD profile field `{name}` must be positive, got {value}")]
    InvalidProfile { name: &'static str, value: f64 },
}

//! Evaluation of the radial and chromatic distortion model.

use super::{Channel, DistortionConfig};

/// Horner evaluation of `k0 + r²·(k1 + r²·(k2 + r²·k3))`.
#[inline]
pub(crate) fn radial_polynomial(k: &[f64; 4], r_sq: f64) -> f64 {
    k[0] + r_sq * (k[1] + r_sq * (k[2] + r_sq * k[3]))
}

impl DistortionConfig {
    /// Radial scale factor at squared rift-space radius `r_sq`.
    ///
    /// Multiplying a rift-space position by this factor yields the position
    /// in the undistorted source image that must appear there.
    #[inline]
    pub fn scale(&self, r_sq: f64) -> f64 {
        radial_polynomial(&self.k(), r_sq)
    }

    /// Scale factor for one color channel, relative to [`Self::scale`].
    ///
    /// Equals `scale(r_sq) * (c0 + c1 * r_sq)` with the channel's chroma
    /// coefficients, so `(1, 0)` reproduces the achromatic scale.
    #[inline]
    pub fn chroma_scale(&self, channel: Channel, r_sq: f64) -> f64 {
        self.scale(r_sq) * self.chroma_factor(channel, r_sq)
    }

    /// The chroma term alone, `c0 + c1 * r_sq`.
    #[inline]
    pub fn chroma_factor(&self, channel: Channel, r_sq: f64) -> f64 {
        let [c0, c1] = self.chroma().channel(channel);
        c0 + c1 * r_sq
    }

    /// Forward radial mapping `r * scale(r²)`.
    #[inline]
    pub fn distort_radius(&self, r: f64) -> f64 {
        r * self.scale(r * r)
    }

    /// Largest rift-space radius reachable from the corners of either eye's
    /// screen space. This is the domain the model must be well behaved on.
    pub fn max_radius(&self) -> f64 {
        let x = 1.0 + self.lens_offset().abs();
        let y = 1.0 / self.eye_aspect();
        (x * x + y * y).sqrt()
    }
}

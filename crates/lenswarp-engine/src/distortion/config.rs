use serde::Serialize;

use super::DistortionError;

/// Samples used when checking the polynomial over the lens domain.
const MONOTONIC_SAMPLES: u32 = 512;

/// Color channel with its own chromatic correction.
///
/// Green has none: it uses the base radial scale.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Blue,
}

/// Whether generators emit per-channel coordinates in addition to the
/// achromatic ones.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ChromaMode {
    #[default]
    Achromatic,
    Chromatic,
}

impl ChromaMode {
    #[inline]
    pub fn is_chromatic(self) -> bool {
        self == ChromaMode::Chromatic
    }
}

/// Linear chromatic-aberration corrections, `c0 + c1 * r²`, applied on top of
/// the achromatic radial scale.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ChromaK {
    pub red: [f64; 2],
    pub blue: [f64; 2],
}

impl ChromaK {
    /// No chromatic correction: every channel follows the base scale.
    pub const NONE: ChromaK = ChromaK { red: [1.0, 0.0], blue: [1.0, 0.0] };

    #[inline]
    pub fn channel(&self, channel: Channel) -> [f64; 2] {
        match channel {
            Channel::Red => self.red,
            Channel::Blue => self.blue,
        }
    }
}

impl Default for ChromaK {
    fn default() -> Self {
        Self::NONE
    }
}

/// Validated optical description of one HMD.
///
/// Built once per device profile and never mutated. Evaluation functions live
/// in `model.rs`; coordinate conversions in [`super::CoordinateMapper`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistortionConfig {
    k: [f64; 4],
    chroma: ChromaK,
    lens_offset: f64,
    eye_aspect: f64,
}

impl DistortionConfig {
    /// Validates and builds a configuration.
    ///
    /// # Errors
    ///
    /// Fails if any value is non-finite, `K` is all zero or `K0 <= 0`,
    /// `eye_aspect <= 0`, or the radial mapping `r * scale(r²)` is not
    /// strictly positive and non-decreasing across the visible lens radius.
    pub fn new(
        k: [f64; 4],
        chroma: ChromaK,
        lens_offset: f64,
        eye_aspect: f64,
    ) -> Result<Self, DistortionError> {
        const K_NAMES: [&str; 4] = ["K0", "K1", "K2", "K3"];
        for (name, &value) in K_NAMES.iter().zip(k.iter()) {
            ensure_finite(name, value)?;
        }
        ensure_finite("red chroma c0", chroma.red[0])?;
        ensure_finite("red chroma c1", chroma.red[1])?;
        ensure_finite("blue chroma c0", chroma.blue[0])?;
        ensure_finite("blue chroma c1", chroma.blue[1])?;
        ensure_finite("lens offset", lens_offset)?;
        ensure_finite("eye aspect", eye_aspect)?;

        if k.iter().all(|&c| c == 0.0) {
            return Err(DistortionError::ZeroCoefficients);
        }
        if k[0] <= 0.0 {
            return Err(DistortionError::NonPositiveK0(k[0]));
        }
        if eye_aspect <= 0.0 {
            return Err(DistortionError::NonPositiveAspect(eye_aspect));
        }

        let config = Self { k, chroma, lens_offset, eye_aspect };
        config.check_monotonic()?;
        Ok(config)
    }

    /// Pass-through profile: `K = [1, 0, 0, 0]`, no chroma, centered lens,
    /// square eye. Use this when no device profile is available.
    pub fn identity() -> Self {
        Self {
            k: [1.0, 0.0, 0.0, 0.0],
            chroma: ChromaK::NONE,
            lens_offset: 0.0,
            eye_aspect: 1.0,
        }
    }

    #[inline]
    pub fn k(&self) -> [f64; 4] {
        self.k
    }

    #[inline]
    pub fn chroma(&self) -> ChromaK {
        self.chroma
    }

    /// Unsigned lens-axis offset in screen units. See [`super::Eye::lens_offset_sign`].
    #[inline]
    pub fn lens_offset(&self) -> f64 {
        self.lens_offset
    }

    #[inline]
    pub fn eye_aspect(&self) -> f64 {
        self.eye_aspect
    }

    /// Walks `[0, max_radius]` and rejects polynomials whose scale vanishes
    /// or whose distorted radius folds back. Either would leave the bisection
    /// without a unique root.
    fn check_monotonic(&self) -> Result<(), DistortionError> {
        let r_max = self.max_radius();
        let mut prev = 0.0;
        for i in 0..=MONOTONIC_SAMPLES {
            let r = r_max * f64::from(i) / f64::from(MONOTONIC_SAMPLES);
            let scale = self.scale(r * r);
            if !(scale > 0.0) {
                return Err(DistortionError::VanishingScale { radius: r });
            }
            let distorted = r * scale;
            if distorted < prev {
                return Err(DistortionError::NonMonotonic { radius: r });
            }
            prev = distorted;
        }
        Ok(())
    }
}

fn ensure_finite(name: &'static str, value: f64) -> Result<(), DistortionError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DistortionError::NonFinite { name, value })
    }
}

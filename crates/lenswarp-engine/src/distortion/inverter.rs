use crate::coords::Vec2;

use super::{DistortionConfig, Eye};

/// Bisection tolerances for [`RadiusInverter`].
///
/// `epsilon` is an absolute tolerance on the distorted radius in rift units.
/// One pixel of a 1280 px wide HMD panel spans about 3e-3 rift units per eye,
/// so the default leaves several orders of magnitude of headroom while still
/// converging in well under 40 halvings. `max_iterations` bounds the loop for
/// pathological coefficient sets.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InverterSettings {
    pub epsilon: f64,
    pub max_iterations: u32,
}

impl Default for InverterSettings {
    fn default() -> Self {
        Self {
            epsilon: 1e-7,
            max_iterations: 64,
        }
    }
}

/// Outcome of one radius inversion.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Inversion {
    /// `1 / scale(source_radius²)`; multiply a rift position by this to find
    /// where it must be displayed.
    pub multiplier: f64,
    /// Undistorted radius whose forward mapping hits the target.
    pub source_radius: f64,
    pub iterations: u32,
    /// `false` if the iteration cap was hit before reaching `epsilon`.
    pub converged: bool,
}

/// Inverts the radial distortion by bisection.
///
/// The model maps undistorted radii to distorted ones. Mesh generation needs
/// the opposite direction: for a target radius, find the source radius that
/// the polynomial sends there.
#[derive(Debug, Copy, Clone)]
pub struct RadiusInverter<'a> {
    config: &'a DistortionConfig,
    settings: InverterSettings,
}

impl<'a> RadiusInverter<'a> {
    pub fn new(config: &'a DistortionConfig) -> Self {
        Self::with_settings(config, InverterSettings::default())
    }

    pub fn with_settings(config: &'a DistortionConfig, settings: InverterSettings) -> Self {
        debug_assert!(settings.epsilon > 0.0);
        Self { config, settings }
    }

    #[inline]
    pub fn settings(&self) -> InverterSettings {
        self.settings
    }

    /// Finds `r_source` with `r_source * scale(r_source²) == r_target`.
    ///
    /// Searches `[0, 2 * r_target]`, widening the upper bound first if it does
    /// not bracket the root. On exhausting the iteration budget the current
    /// midpoint is returned with `converged == false`.
    pub fn invert(&self, r_target: f64) -> Inversion {
        let InverterSettings { epsilon, max_iterations } = self.settings;
        let config = self.config;

        let mut min = 0.0;
        let mut max = 2.0 * r_target;
        let mut iterations = 0;

        while config.distort_radius(max) < r_target && iterations < max_iterations {
            min = max;
            max *= 2.0;
            iterations += 1;
        }

        while iterations < max_iterations {
            iterations += 1;
            let r_source = min + (max - min) / 2.0;
            let scale = config.scale(r_source * r_source);
            let r_result = r_source * scale;

            if (r_result - r_target).abs() < epsilon {
                return Inversion {
                    multiplier: 1.0 / scale,
                    source_radius: r_source,
                    iterations,
                    converged: true,
                };
            }

            if r_result < r_target {
                min = r_source;
            } else {
                max = r_source;
            }
        }

        let r_source = min + (max - min) / 2.0;
        if cfg!(debug_assertions) {
            log::warn!(
                "radius inversion did not converge: target {r_target:.6}, best {r_source:.6} after {iterations} iterations (K = {:?})",
                config.k()
            );
        }
        Inversion {
            multiplier: 1.0 / config.scale(r_source * r_source),
            source_radius: r_source,
            iterations,
            converged: false,
        }
    }

    /// The undistortion multiplier for `r_target`.
    #[inline]
    pub fn undistortion_multiplier(&self, r_target: f64) -> f64 {
        self.invert(r_target).multiplier
    }

    /// Screen position at which a vertex must be drawn so that the lens
    /// shows it at `source` once distortion is applied.
    pub fn find_distorted_vertex_position(&self, source: Vec2, eye: Eye) -> Vec2 {
        self.displace(source, eye).position
    }

    /// Displacement of one screen-space point, keeping the intermediate rift
    /// values the mesh generator needs for chroma.
    pub(crate) fn displace(&self, source: Vec2, eye: Eye) -> Displacement {
        let mapper = self.config.mapper(eye);
        let rift = mapper.screen_to_rift(source);
        let inversion = self.invert(rift.length());
        Displacement {
            position: mapper.rift_to_screen(rift * inversion.multiplier),
            rift_source: rift,
            inversion,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct Displacement {
    pub position: Vec2,
    pub rift_source: Vec2,
    pub inversion: Inversion,
}

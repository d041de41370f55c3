use serde::Deserialize;

use super::model::radial_polynomial;
use super::{ChromaK, DistortionConfig, DistortionError};

/// How raw profile coefficients are turned into a [`DistortionConfig`].
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub enum ProfileFit {
    /// Premultiply `K` so the outer screen edge maps onto itself.
    ///
    /// Vendor coefficients typically shrink the image and rely on a separate
    /// post-distortion scale to fill the panel; folding that scale into `K`
    /// keeps the whole correction in one polynomial.
    #[default]
    FitOuterEdge,
    /// Premultiply `K` so a chosen point of the left eye's viewport, in
    /// screen units, maps onto itself. `Point { x: -1.0, y: 0.0 }` is the
    /// outer edge; points closer to the lens axis crop less of the panel but
    /// push more of the eye image out of view.
    Point { x: f64, y: f64 },
    /// Use `K` exactly as given.
    Raw,
}

/// Physical description of an HMD as reported by the device or a profile
/// file. Lengths are in meters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HmdProfile {
    pub h_resolution: u32,
    pub v_resolution: u32,
    pub h_screen_size: f64,
    pub v_screen_size: f64,
    pub eye_to_screen_distance: f64,
    pub lens_separation_distance: f64,
    pub distortion_k: [f64; 4],
    /// Red `c0, c1` followed by blue `c0, c1`.
    pub chroma_ab_correction: [f64; 4],
}

impl HmdProfile {
    /// Oculus Rift DK1 panel and lens values.
    pub fn dk1() -> Self {
        Self {
            h_resolution: 1280,
            v_resolution: 800,
            h_screen_size: 0.14976,
            v_screen_size: 0.09360,
            eye_to_screen_distance: 0.04100,
            lens_separation_distance: 0.06350,
            distortion_k: [1.0, 0.22, 0.24, 0.0],
            chroma_ab_correction: [0.996, -0.004, 1.014, 0.0],
        }
    }

    /// Checks that every physical dimension is positive and finite.
    pub fn validate(&self) -> Result<(), DistortionError> {
        let fields = [
            ("h_resolution", f64::from(self.h_resolution)),
            ("v_resolution", f64::from(self.v_resolution)),
            ("h_screen_size", self.h_screen_size),
            ("v_screen_size", self.v_screen_size),
            ("eye_to_screen_distance", self.eye_to_screen_distance),
            ("lens_separation_distance", self.lens_separation_distance),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(DistortionError::NonFinite { name, value });
            }
            if value <= 0.0 {
                return Err(DistortionError::InvalidProfile { name, value });
            }
        }
        Ok(())
    }

    /// Distance of each lens axis from its eye viewport center, in screen
    /// units. Each eye covers half the panel, so a lens separation equal to
    /// half the panel width gives zero offset.
    pub fn lens_offset(&self) -> f64 {
        1.0 - 2.0 * self.lens_separation_distance / self.h_screen_size
    }

    /// Physical width / height of one eye's half of the panel.
    pub fn eye_aspect(&self) -> f64 {
        (self.h_screen_size / 2.0) / self.v_screen_size
    }

    /// Reciprocal of the raw radial scale at the outer screen edge, which sits
    /// `1 + lens_offset` from the lens axis.
    pub fn fit_scale(&self) -> f64 {
        self.fit_scale_at(-1.0, 0.0)
    }

    /// Reciprocal of the raw radial scale at `(x, y)` in the left eye's screen
    /// space.
    pub fn fit_scale_at(&self, x: f64, y: f64) -> f64 {
        let dx = x - self.lens_offset();
        let dy = y / self.eye_aspect();
        1.0 / radial_polynomial(&self.distortion_k, dx * dx + dy * dy)
    }

    pub fn chroma(&self) -> ChromaK {
        let c = self.chroma_ab_correction;
        ChromaK { red: [c[0], c[1]], blue: [c[2], c[3]] }
    }

    /// Builds a validated [`DistortionConfig`].
    ///
    /// Chroma coefficients are not rescaled by the fit: they act relative to
    /// the base scale, which already carries it.
    pub fn to_config(&self, fit: ProfileFit) -> Result<DistortionConfig, DistortionError> {
        self.validate()?;
        let k = match fit {
            ProfileFit::FitOuterEdge => {
                let s = self.fit_scale();
                self.distortion_k.map(|c| c * s)
            }
            ProfileFit::Point { x, y } => {
                for (name, value) in [("fit point x", x), ("fit point y", y)] {
                    if !value.is_finite() {
                        return Err(DistortionError::NonFinite { name, value });
                    }
                }
                let s = self.fit_scale_at(x, y);
                self.distortion_k.map(|c| c * s)
            }
            ProfileFit::Raw => self.distortion_k,
        };
        log::debug!(
            "profile -> config: K = {k:?}, lens offset {:.5}, eye aspect {:.5}",
            self.lens_offset(),
            self.eye_aspect()
        );
        DistortionConfig::new(k, self.chroma(), self.lens_offset(), self.eye_aspect())
    }
}

impl Default for HmdProfile {
    fn default() -> Self {
        Self::dk1()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn dk1_derived_geometry() {
        let p = HmdProfile::dk1();
        assert_relative_eq!(p.lens_offset(), 1.0 - 2.0 * 0.0635 / 0.14976, epsilon = 1e-12);
        assert_relative_eq!(p.eye_aspect(), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn fitted_k_maps_outer_edge_onto_itself() {
        let p = HmdProfile::dk1();
        let config = p.to_config(ProfileFit::FitOuterEdge).unwrap();
        let edge = 1.0 + p.lens_offset();
        assert_relative_eq!(config.scale(edge * edge), 1.0, epsilon = 1e-12);
        // Matches the well-known pre-scaled DK1 K0.
        assert_relative_eq!(config.k()[0], 0.5832, epsilon = 1e-3);
    }

    #[test]
    fn outer_edge_point_matches_default_fit() {
        let p = HmdProfile::dk1();
        assert_eq!(
            p.to_config(ProfileFit::Point { x: -1.0, y: 0.0 }).unwrap(),
            p.to_config(ProfileFit::FitOuterEdge).unwrap()
        );
    }

    #[test]
    fn inner_fit_point_maps_onto_itself() {
        let p = HmdProfile::dk1();
        let config = p.to_config(ProfileFit::Point { x: 0.6, y: 0.0 }).unwrap();
        let r = 0.6 - p.lens_offset();
        assert_relative_eq!(config.scale(r * r), 1.0, epsilon = 1e-12);

        // A point nearer the lens axis needs less shrinking, so the edge now
        // samples beyond the eye image.
        let edge = 1.0 + p.lens_offset();
        assert!(config.scale(edge * edge) > 1.0);
        let outer = p.to_config(ProfileFit::FitOuterEdge).unwrap();
        assert!(config.k()[0] > outer.k()[0]);
    }

    #[test]
    fn fit_point_y_is_aspect_corrected() {
        let p = HmdProfile::dk1();
        let config = p.to_config(ProfileFit::Point { x: 0.0, y: 0.8 }).unwrap();
        let dx = -p.lens_offset();
        let dy = 0.8 / p.eye_aspect();
        assert_relative_eq!(config.scale(dx * dx + dy * dy), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_non_finite_fit_point() {
        let p = HmdProfile::dk1();
        assert!(matches!(
            p.to_config(ProfileFit::Point { x: f64::NAN, y: 0.0 }),
            Err(DistortionError::NonFinite { name: "fit point x", .. })
        ));
    }

    #[test]
    fn raw_fit_keeps_coefficients() {
        let p = HmdProfile::dk1();
        let config = p.to_config(ProfileFit::Raw).unwrap();
        assert_eq!(config.k(), p.distortion_k);
        assert_eq!(config.chroma().red, [0.996, -0.004]);
        assert_eq!(config.chroma().blue, [1.014, 0.0]);
    }

    #[test]
    fn rejects_non_positive_dimensions() {
        let mut p = HmdProfile::dk1();
        p.v_screen_size = 0.0;
        assert_eq!(
            p.to_config(ProfileFit::Raw).unwrap_err(),
            DistortionError::InvalidProfile { name: "v_screen_size", value: 0.0 }
        );

        let mut p = HmdProfile::dk1();
        p.h_resolution = 0;
        assert!(matches!(
            p.validate(),
            Err(DistortionError::InvalidProfile { name: "h_resolution", .. })
        ));
    }

    #[test]
    fn deserializes_from_json() {
        let json = r#"{
            "h_resolution": 1920,
            "v_resolution": 1080,
            "h_screen_size": 0.12576,
            "v_screen_size": 0.07074,
            "eye_to_screen_distance": 0.04,
            "lens_separation_distance": 0.0635,
            "distortion_k": [1.0, 0.22, 0.24, 0.0],
            "chroma_ab_correction": [0.996, -0.004, 1.014, 0.0]
        }"#;
        let p: HmdProfile = serde_json::from_str(json).unwrap();
        assert_eq!(p.h_resolution, 1920);
        assert!(p.to_config(ProfileFit::FitOuterEdge).is_ok());
    }
}

use crate::coords::Vec2;

use super::{DistortionConfig, Eye};

/// Converts points between texture, screen and rift space for one eye.
///
/// - texture: `[0, 1]²`
/// - screen: `[-1, 1]²`, `texture * 2 - 1`
/// - rift: screen shifted by the signed lens offset on x, with y divided by
///   the eye aspect so the radial model is isotropic
///
/// All conversions are exact inverses of each other.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CoordinateMapper {
    offset: f64,
    eye_aspect: f64,
}

impl CoordinateMapper {
    pub fn new(config: &DistortionConfig, eye: Eye) -> Self {
        Self {
            offset: eye.lens_offset_sign() * config.lens_offset(),
            eye_aspect: config.eye_aspect(),
        }
    }

    /// Lens offset with the sign for this mapper's eye applied.
    #[inline]
    pub fn lens_offset_signed(&self) -> f64 {
        self.offset
    }

    #[inline]
    pub fn texture_to_screen(uv: Vec2) -> Vec2 {
        uv * 2.0 - 1.0
    }

    #[inline]
    pub fn screen_to_texture(p: Vec2) -> Vec2 {
        (p + 1.0) / 2.0
    }

    #[inline]
    pub fn screen_to_rift(&self, p: Vec2) -> Vec2 {
        Vec2::new(p.x + self.offset, p.y / self.eye_aspect)
    }

    #[inline]
    pub fn rift_to_screen(&self, p: Vec2) -> Vec2 {
        Vec2::new(p.x - self.offset, p.y * self.eye_aspect)
    }

    #[inline]
    pub fn texture_to_rift(&self, uv: Vec2) -> Vec2 {
        self.screen_to_rift(Self::texture_to_screen(uv))
    }

    #[inline]
    pub fn rift_to_texture(&self, p: Vec2) -> Vec2 {
        Self::screen_to_texture(self.rift_to_screen(p))
    }
}

impl DistortionConfig {
    /// Coordinate mapper for `eye`.
    #[inline]
    pub fn mapper(&self, eye: Eye) -> CoordinateMapper {
        CoordinateMapper::new(self, eye)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::distortion::ChromaK;

    fn config() -> DistortionConfig {
        DistortionConfig::new([1.0, 0.22, 0.24, 0.0], ChromaK::NONE, 0.15, 0.8).unwrap()
    }

    #[test]
    fn texture_and_screen_corners() {
        assert_eq!(CoordinateMapper::texture_to_screen(Vec2::zero()), Vec2::new(-1.0, -1.0));
        assert_eq!(CoordinateMapper::texture_to_screen(Vec2::splat(1.0)), Vec2::splat(1.0));
        assert_eq!(CoordinateMapper::texture_to_screen(Vec2::splat(0.5)), Vec2::zero());
        assert_eq!(CoordinateMapper::screen_to_texture(Vec2::new(-1.0, 1.0)), Vec2::new(0.0, 1.0));
    }

    #[test]
    fn offset_sign_follows_eye() {
        let c = config();
        assert_eq!(c.mapper(Eye::Left).lens_offset_signed(), -0.15);
        assert_eq!(c.mapper(Eye::Right).lens_offset_signed(), 0.15);
    }

    #[test]
    fn screen_to_rift_shifts_and_rescales() {
        let m = config().mapper(Eye::Left);
        let rift = m.screen_to_rift(Vec2::new(0.5, 0.4));
        assert_relative_eq!(rift.x, 0.35, epsilon = 1e-12);
        assert_relative_eq!(rift.y, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn rift_round_trip_is_exact() {
        let c = config();
        for eye in Eye::BOTH {
            let m = c.mapper(eye);
            for &(x, y) in &[(0.0, 0.0), (0.13, 0.92), (1.0, 0.0), (0.7, 0.25)] {
                let uv = Vec2::new(x, y);
                let back = m.rift_to_texture(m.texture_to_rift(uv));
                assert_relative_eq!(back.x, uv.x, epsilon = 1e-12);
                assert_relative_eq!(back.y, uv.y, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn eyes_mirror_in_rift_space() {
        let c = config();
        let left = c.mapper(Eye::Left);
        let right = c.mapper(Eye::Right);
        let p = Vec2::new(0.3, -0.6);
        let mirrored = Vec2::new(-p.x, p.y);
        let a = left.screen_to_rift(p);
        let b = right.screen_to_rift(mirrored);
        assert_relative_eq!(a.x, -b.x, epsilon = 1e-12);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-12);
    }
}

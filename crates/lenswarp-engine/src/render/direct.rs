use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::distortion::{ChromaMode, DistortionConfig, Eye};

use super::RenderCtx;

/// Uniform block read by the direct distortion shader. Field order and
/// padding match `DirectUniform` in `shaders/direct_warp.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct DirectUniform {
    pub k: [f32; 4],
    /// Red `c0, c1` followed by blue `c0, c1`.
    pub chroma: [f32; 4],
    /// Lens offset with the eye's sign already applied.
    pub lens_offset: f32,
    pub eye_aspect: f32,
    /// Nonzero selects the per-channel path.
    pub chromatic: u32,
    _pad: u32,
}

impl DirectUniform {
    pub fn new(config: &DistortionConfig, eye: Eye, mode: ChromaMode) -> Self {
        let chroma = config.chroma();
        Self {
            k: config.k().map(|c| c as f32),
            chroma: [chroma.red[0], chroma.red[1], chroma.blue[0], chroma.blue[1]]
                .map(|c| c as f32),
            lens_offset: config.mapper(eye).lens_offset_signed() as f32,
            eye_aspect: config.eye_aspect() as f32,
            chromatic: u32::from(mode.is_chromatic()),
            _pad: 0,
        }
    }
}

/// Distortion parameters for one eye, uploaded for
/// [`super::WarpRenderer::draw_direct`].
///
/// The direct pass evaluates the polynomial per fragment, so it needs no
/// precomputed table or mesh; only this small uniform buffer.
pub struct GpuDirectParams {
    pub eye: Eye,
    pub mode: ChromaMode,
    uniform: DirectUniform,
    buffer: wgpu::Buffer,
}

impl GpuDirectParams {
    pub fn upload(
        ctx: &RenderCtx<'_>,
        config: &DistortionConfig,
        eye: Eye,
        mode: ChromaMode,
    ) -> Self {
        let uniform = DirectUniform::new(config, eye, mode);
        let buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lenswarp direct params"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        Self { eye, mode, uniform, buffer }
    }

    /// Replaces the parameters in place, e.g. after the user edits a profile.
    pub fn update(&mut self, ctx: &RenderCtx<'_>, config: &DistortionConfig) {
        self.uniform = DirectUniform::new(config, self.eye, self.mode);
        ctx.queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&self.uniform));
    }

    #[inline]
    pub fn uniform(&self) -> &DirectUniform {
        &self.uniform
    }

    #[inline]
    pub(super) fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::distortion::{HmdProfile, ProfileFit};

    #[test]
    fn uniform_is_std140_sized() {
        assert_eq!(std::mem::size_of::<DirectUniform>(), 48);
    }

    #[test]
    fn uniform_carries_signed_offset_per_eye() {
        let config = HmdProfile::dk1().to_config(ProfileFit::FitOuterEdge).unwrap();
        let left = DirectUniform::new(&config, Eye::Left, ChromaMode::Chromatic);
        let right = DirectUniform::new(&config, Eye::Right, ChromaMode::Achromatic);

        assert!(left.lens_offset < 0.0);
        assert_eq!(left.lens_offset, -right.lens_offset);
        assert_eq!(left.k, right.k);
        assert_eq!(left.k[0], config.k()[0] as f32);
        for (got, want) in left.chroma.iter().zip([0.996, -0.004, 1.014, 0.0]) {
            assert_relative_eq!(*got, want, epsilon = 1e-6);
        }
        assert_relative_eq!(left.eye_aspect, 0.8, epsilon = 1e-6);
        assert_eq!((left.chromatic, right.chromatic), (1, 0));
    }
}

use std::time::Instant;

use rayon::prelude::*;

use crate::coords::{Resolution, Vec2};
use crate::distortion::{
    Channel, ChromaMode, CoordinateMapper, DistortionConfig, DistortionError, Eye,
};

use super::LookupTexture;

/// Builds [`LookupTexture`]s from a distortion config.
///
/// For every output texel the table stores where in the undistorted eye
/// image a post-process shader should sample. No inversion is needed: the
/// forward polynomial already maps displayed positions to source positions.
#[derive(Debug, Copy, Clone)]
pub struct LookupTextureGenerator<'a> {
    config: &'a DistortionConfig,
}

impl<'a> LookupTextureGenerator<'a> {
    pub fn new(config: &'a DistortionConfig) -> Self {
        Self { config }
    }

    /// Generates the table for `eye` at `resolution`.
    ///
    /// Rows are computed in parallel on the rayon pool.
    ///
    /// # Errors
    ///
    /// [`DistortionError::EmptyLookup`] if either dimension is zero.
    pub fn generate(
        &self,
        resolution: Resolution,
        eye: Eye,
        mode: ChromaMode,
    ) -> Result<LookupTexture, DistortionError> {
        if resolution.is_empty() {
            return Err(DistortionError::EmptyLookup(resolution));
        }

        let started = Instant::now();
        let mapper = self.config.mapper(eye);
        let width = resolution.width as usize;
        let len = resolution.area() as usize;

        let mut texels = vec![[0.0f32; 2]; len];
        let chroma = match mode {
            ChromaMode::Achromatic => {
                texels.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
                    for (x, texel) in row.iter_mut().enumerate() {
                        let uv = texel_center(x, y, resolution);
                        *texel = self.achromatic(&mapper, uv).to_f32();
                    }
                });
                None
            }
            ChromaMode::Chromatic => {
                let mut chroma = vec![[0.0f32; 4]; len];
                texels
                    .par_chunks_mut(width)
                    .zip(chroma.par_chunks_mut(width))
                    .enumerate()
                    .for_each(|(y, (row, chroma_row))| {
                        for (x, (texel, chroma_texel)) in
                            row.iter_mut().zip(chroma_row.iter_mut()).enumerate()
                        {
                            let uv = texel_center(x, y, resolution);
                            *texel = self.achromatic(&mapper, uv).to_f32();
                            let (red, blue) = self.chromatic(&mapper, uv);
                            let [ru, rv] = red.to_f32();
                            let [bu, bv] = blue.to_f32();
                            *chroma_texel = [ru, rv, bu, bv];
                        }
                    });
                Some(chroma)
            }
        };

        log::debug!(
            "generated {eye} lookup texture {resolution} ({mode:?}) in {:.2?}",
            started.elapsed()
        );
        Ok(LookupTexture::new(resolution, eye, texels, chroma))
    }

    /// Source texture coordinate for output texture coordinate `uv`.
    pub fn lookup_value(&self, uv: Vec2, eye: Eye) -> Vec2 {
        self.achromatic(&self.config.mapper(eye), uv)
    }

    /// Red and blue source texture coordinates for output coordinate `uv`.
    pub fn chroma_lookup_value(&self, uv: Vec2, eye: Eye) -> (Vec2, Vec2) {
        self.chromatic(&self.config.mapper(eye), uv)
    }

    fn achromatic(&self, mapper: &CoordinateMapper, uv: Vec2) -> Vec2 {
        let rift = mapper.texture_to_rift(uv);
        let scale = self.config.scale(rift.length_squared());
        mapper.rift_to_texture(rift * scale)
    }

    fn chromatic(&self, mapper: &CoordinateMapper, uv: Vec2) -> (Vec2, Vec2) {
        let rift = mapper.texture_to_rift(uv);
        let r_sq = rift.length_squared();
        let red = rift * self.config.chroma_scale(Channel::Red, r_sq);
        let blue = rift * self.config.chroma_scale(Channel::Blue, r_sq);
        (mapper.rift_to_texture(red), mapper.rift_to_texture(blue))
    }
}

#[inline]
fn texel_center(x: usize, y: usize, resolution: Resolution) -> Vec2 {
    Vec2::new(
        (x as f64 + 0.5) / f64::from(resolution.width),
        (y as f64 + 0.5) / f64::from(resolution.height),
    )
}

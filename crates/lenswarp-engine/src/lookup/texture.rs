use crate::coords::{Resolution, Vec2};
use crate::distortion::{ChromaMode, Eye};

/// Precomputed distortion lookup for one eye.
///
/// Row-major, `resolution.width` texels per row, first row at texture
/// `v = 0`. Each achromatic texel is the source texture coordinate to sample
/// for that output texel. In chromatic mode a second plane holds
/// `[red.u, red.v, blue.u, blue.v]`; green always uses the achromatic plane.
///
/// Values are not clamped to `[0, 1]`; the consumer picks the addressing
/// policy for coordinates that fall outside the source image.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTexture {
    resolution: Resolution,
    eye: Eye,
    texels: Vec<[f32; 2]>,
    chroma: Option<Vec<[f32; 4]>>,
}

impl LookupTexture {
    pub(super) fn new(
        resolution: Resolution,
        eye: Eye,
        texels: Vec<[f32; 2]>,
        chroma: Option<Vec<[f32; 4]>>,
    ) -> Self {
        debug_assert_eq!(texels.len() as u64, resolution.area());
        debug_assert!(chroma.as_ref().is_none_or(|c| c.len() == texels.len()));
        Self { resolution, eye, texels, chroma }
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    #[inline]
    pub fn eye(&self) -> Eye {
        self.eye
    }

    #[inline]
    pub fn mode(&self) -> ChromaMode {
        if self.chroma.is_some() { ChromaMode::Chromatic } else { ChromaMode::Achromatic }
    }

    /// Achromatic plane (RG).
    #[inline]
    pub fn texels(&self) -> &[[f32; 2]] {
        &self.texels
    }

    /// Chromatic plane (RGBA: red uv, blue uv), if generated.
    #[inline]
    pub fn chroma_texels(&self) -> Option<&[[f32; 4]]> {
        self.chroma.as_deref()
    }

    #[inline]
    pub fn texel(&self, x: u32, y: u32) -> [f32; 2] {
        self.texels[self.offset(x, y)]
    }

    #[inline]
    pub fn chroma_texel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        let offset = self.offset(x, y);
        self.chroma.as_ref().map(|c| c[offset])
    }

    /// Bilinearly samples the achromatic plane at texture coordinate `uv`.
    ///
    /// Texel centers sit at `(i + 0.5) / n`; coordinates beyond the outer
    /// centers clamp to the edge texels, like `ClampToEdge` with linear
    /// filtering on the GPU.
    pub fn sample(&self, uv: Vec2) -> Vec2 {
        let [u, v] = bilinear(&self.texels, self.resolution, uv);
        Vec2::new(u, v)
    }

    /// Bilinearly samples the chromatic plane, returning `(red, blue)`.
    pub fn sample_chroma(&self, uv: Vec2) -> Option<(Vec2, Vec2)> {
        let chroma = self.chroma.as_deref()?;
        let [ru, rv, bu, bv] = bilinear(chroma, self.resolution, uv);
        Some((Vec2::new(ru, rv), Vec2::new(bu, bv)))
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.resolution.width && y < self.resolution.height);
        y as usize * self.resolution.width as usize + x as usize
    }
}

fn bilinear<const N: usize>(data: &[[f32; N]], resolution: Resolution, uv: Vec2) -> [f64; N] {
    let w = resolution.width as usize;
    let h = resolution.height as usize;

    let fx = (uv.x * w as f64 - 0.5).clamp(0.0, (w - 1) as f64);
    let fy = (uv.y * h as f64 - 0.5).clamp(0.0, (h - 1) as f64);
    let x0 = fx.floor() as usize;
    let y0 = fy.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = fx - x0 as f64;
    let ty = fy - y0 as f64;

    let at = |x: usize, y: usize, c: usize| f64::from(data[y * w + x][c]);

    let mut out = [0.0; N];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = lerp(at(x0, y0, c), at(x1, y0, c), tx);
        let bottom = lerp(at(x0, y1, c), at(x1, y1, c), tx);
        *slot = lerp(top, bottom, ty);
    }
    out
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

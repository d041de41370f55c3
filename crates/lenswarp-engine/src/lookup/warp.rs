use rayon::prelude::*;

use crate::coords::{Resolution, Vec2};
use crate::distortion::DistortionError;

use super::LookupTexture;

const BLACK: [u8; 4] = [0, 0, 0, 255];

/// CPU reference for the lookup post-process pass.
///
/// Produces a `dst` sized RGBA8 image where each pixel samples `src` at the
/// coordinate the lookup table gives for that pixel. Coordinates outside
/// `[0, 1]²` produce opaque black. In chromatic mode red and blue come from
/// their own coordinates; green and alpha use the achromatic one.
///
/// Rows are processed in parallel.
pub fn warp_rgba(
    lookup: &LookupTexture,
    src: &[u8],
    src_size: Resolution,
    dst_size: Resolution,
) -> Result<Vec<u8>, DistortionError> {
    let expected = src_size.area() as usize * 4;
    if src.len() != expected {
        return Err(DistortionError::SourceImageSize { expected, actual: src.len() });
    }

    let mut dst = vec![0u8; dst_size.area() as usize * 4];
    if dst.is_empty() {
        return Ok(dst);
    }

    let stride = dst_size.width as usize * 4;
    dst.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            let uv = Vec2::new(
                (x as f64 + 0.5) / f64::from(dst_size.width),
                (y as f64 + 0.5) / f64::from(dst_size.height),
            );
            let green = lookup.sample(uv);
            let base = sample_rgba(src, src_size, green);
            let out = match lookup.sample_chroma(uv) {
                Some((red, blue)) => [
                    sample_rgba(src, src_size, red)[0],
                    base[1],
                    sample_rgba(src, src_size, blue)[2],
                    base[3],
                ],
                None => base,
            };
            pixel.copy_from_slice(&out);
        }
    });
    Ok(dst)
}

/// Bilinear RGBA8 fetch with black outside the image.
fn sample_rgba(src: &[u8], size: Resolution, uv: Vec2) -> [u8; 4] {
    if size.is_empty() || !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
        return BLACK;
    }

    let w = size.width as usize;
    let h = size.height as usize;
    let fx = (uv.x * w as f64 - 0.5).clamp(0.0, (w - 1) as f64);
    let fy = (uv.y * h as f64 - 0.5).clamp(0.0, (h - 1) as f64);
    let x0 = fx.floor() as usize;
    let y0 = fy.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = fx - x0 as f64;
    let ty = fy - y0 as f64;

    let at = |x: usize, y: usize, c: usize| f64::from(src[(y * w + x) * 4 + c]);

    let mut out = [0u8; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = at(x0, y0, c) + (at(x1, y0, c) - at(x0, y0, c)) * tx;
        let bottom = at(x0, y1, c) + (at(x1, y1, c) - at(x0, y1, c)) * tx;
        *slot = (top + (bottom - top) * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distortion::{ChromaK, ChromaMode, DistortionConfig, Eye};
    use crate::lookup::LookupTextureGenerator;

    fn gradient(size: Resolution) -> Vec<u8> {
        let mut out = Vec::with_capacity(size.area() as usize * 4);
        for y in 0..size.height {
            for x in 0..size.width {
                out.extend_from_slice(&[(x * 16) as u8, (y * 16) as u8, 128, 255]);
            }
        }
        out
    }

    #[test]
    fn identity_lookup_reproduces_source() {
        let config = DistortionConfig::identity();
        let size = Resolution::square(8);
        let lookup = LookupTextureGenerator::new(&config)
            .generate(size, Eye::Left, ChromaMode::Achromatic)
            .unwrap();
        let src = gradient(size);
        let out = warp_rgba(&lookup, &src, size, size).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn rejects_mismatched_source_length() {
        let config = DistortionConfig::identity();
        let lookup = LookupTextureGenerator::new(&config)
            .generate(Resolution::square(2), Eye::Left, ChromaMode::Achromatic)
            .unwrap();
        let err = warp_rgba(&lookup, &[0u8; 10], Resolution::square(2), Resolution::square(2))
            .unwrap_err();
        assert_eq!(err, DistortionError::SourceImageSize { expected: 16, actual: 10 });
    }

    #[test]
    fn strong_pincushion_blackens_corners() {
        // K0 = 1.5 pushes every sample 50% farther from the lens axis, so the
        // corners read outside the source.
        let config = DistortionConfig::new([1.5, 0.0, 0.0, 0.0], ChromaK::NONE, 0.0, 1.0).unwrap();
        let size = Resolution::square(16);
        let lookup = LookupTextureGenerator::new(&config)
            .generate(size, Eye::Right, ChromaMode::Chromatic)
            .unwrap();
        let src = vec![200u8; size.area() as usize * 4];
        let out = warp_rgba(&lookup, &src, size, size).unwrap();
        assert_eq!(&out[0..4], &BLACK);
        let center = ((8 * 16) + 8) * 4;
        assert_eq!(&out[center..center + 4], &[200, 200, 200, 200]);
    }
}

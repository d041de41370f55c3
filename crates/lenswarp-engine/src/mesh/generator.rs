use std::time::Instant;

use rayon::prelude::*;

use crate::coords::{Resolution, Vec2};
use crate::distortion::{
    Channel, ChromaMode, CoordinateMapper, DistortionConfig, DistortionError, Eye,
    InverterSettings, RadiusInverter,
};

use super::mesh::strip_indices;
use super::{ChromaTexCoords, DistortionMesh, MeshVertex};

/// Builds [`DistortionMesh`]es.
///
/// Each grid vertex keeps its regular texture coordinate but is moved to the
/// screen position the lens will display as that coordinate, so rasterizing
/// the mesh with the eye buffer bound applies the same correction as the
/// lookup pass.
#[derive(Debug, Copy, Clone)]
pub struct DistortionMeshGenerator<'a> {
    config: &'a DistortionConfig,
    inverter: RadiusInverter<'a>,
}

impl<'a> DistortionMeshGenerator<'a> {
    pub fn new(config: &'a DistortionConfig) -> Self {
        Self::with_settings(config, InverterSettings::default())
    }

    pub fn with_settings(config: &'a DistortionConfig, settings: InverterSettings) -> Self {
        Self { config, inverter: RadiusInverter::with_settings(config, settings) }
    }

    /// Generates the mesh for `eye` over a `grid` of vertices.
    ///
    /// # Errors
    ///
    /// [`DistortionError::GridTooSmall`] if either dimension is below 2, and
    /// [`DistortionError::GridTooLarge`] if vertex indices would reach the
    /// restart sentinel.
    pub fn generate(
        &self,
        grid: Resolution,
        eye: Eye,
        mode: ChromaMode,
    ) -> Result<DistortionMesh, DistortionError> {
        if grid.width < 2 || grid.height < 2 {
            return Err(DistortionError::GridTooSmall(grid));
        }
        if grid.area() > u64::from(u32::MAX) {
            return Err(DistortionError::GridTooLarge(grid));
        }

        let started = Instant::now();
        let mapper = self.config.mapper(eye);
        let width = grid.width as usize;
        let len = grid.area() as usize;
        let step = Vec2::new(
            1.0 / f64::from(grid.width - 1),
            1.0 / f64::from(grid.height - 1),
        );

        let mut vertices = vec![MeshVertex { position: [0.0; 2], tex_coord: [0.0; 2] }; len];
        let mut chroma = mode
            .is_chromatic()
            .then(|| vec![ChromaTexCoords { red: [0.0; 2], blue: [0.0; 2] }; len]);

        match chroma.as_mut() {
            None => vertices.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
                for (x, vertex) in row.iter_mut().enumerate() {
                    let tex = Vec2::new(x as f64 * step.x, y as f64 * step.y);
                    *vertex = self.vertex(eye, tex);
                }
            }),
            Some(chroma) => vertices
                .par_chunks_mut(width)
                .zip(chroma.par_chunks_mut(width))
                .enumerate()
                .for_each(|(y, (row, chroma_row))| {
                    for (x, (vertex, coords)) in
                        row.iter_mut().zip(chroma_row.iter_mut()).enumerate()
                    {
                        let tex = Vec2::new(x as f64 * step.x, y as f64 * step.y);
                        let (v, c) = self.chroma_vertex(&mapper, eye, tex);
                        *vertex = v;
                        *coords = c;
                    }
                }),
        }

        let indices = strip_indices(grid);
        log::debug!(
            "generated {eye} distortion mesh {grid} ({mode:?}, {} indices) in {:.2?}",
            indices.len(),
            started.elapsed()
        );
        Ok(DistortionMesh::new(grid, eye, vertices, chroma, indices))
    }

    fn vertex(&self, eye: Eye, tex: Vec2) -> MeshVertex {
        let screen = CoordinateMapper::texture_to_screen(tex);
        MeshVertex {
            position: self.inverter.find_distorted_vertex_position(screen, eye).to_f32(),
            tex_coord: tex.to_f32(),
        }
    }

    /// Vertex plus the red/blue coordinates the lookup table would produce at
    /// the displaced position. Because the displaced rift position scales back
    /// onto the source exactly, only the chroma factor remains to apply.
    fn chroma_vertex(
        &self,
        mapper: &CoordinateMapper,
        eye: Eye,
        tex: Vec2,
    ) -> (MeshVertex, ChromaTexCoords) {
        let screen = CoordinateMapper::texture_to_screen(tex);
        let d = self.inverter.displace(screen, eye);
        let r_sq = (d.rift_source * d.inversion.multiplier).length_squared();
        let red = d.rift_source * self.config.chroma_factor(Channel::Red, r_sq);
        let blue = d.rift_source * self.config.chroma_factor(Channel::Blue, r_sq);
        (
            MeshVertex { position: d.position.to_f32(), tex_coord: tex.to_f32() },
            ChromaTexCoords {
                red: mapper.rift_to_texture(red).to_f32(),
                blue: mapper.rift_to_texture(blue).to_f32(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::distortion::{ChromaK, HmdProfile, ProfileFit};
    use crate::lookup::LookupTextureGenerator;
    use crate::mesh::RESTART_INDEX;

    fn dk1() -> DistortionConfig {
        HmdProfile::dk1().to_config(ProfileFit::FitOuterEdge).unwrap()
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn rejects_degenerate_grids() {
        let config = DistortionConfig::identity();
        let generator = DistortionMeshGenerator::new(&config);
        for grid in [Resolution::new(1, 8), Resolution::new(8, 1), Resolution::new(0, 0)] {
            assert_eq!(
                generator.generate(grid, Eye::Left, ChromaMode::Achromatic).unwrap_err(),
                DistortionError::GridTooSmall(grid)
            );
        }
    }

    #[test]
    fn rejects_grids_beyond_index_range() {
        let config = DistortionConfig::identity();
        let grid = Resolution::new(65536, 65536);
        let err = DistortionMeshGenerator::new(&config)
            .generate(grid, Eye::Left, ChromaMode::Achromatic)
            .unwrap_err();
        assert_eq!(err, DistortionError::GridTooLarge(grid));
    }

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn texture_coordinates_span_unit_square() {
        let config = dk1();
        let mesh = DistortionMeshGenerator::new(&config)
            .generate(Resolution::new(5, 3), Eye::Left, ChromaMode::Achromatic)
            .unwrap();
        assert_eq!(mesh.vertices().len(), 15);
        assert_eq!(mesh.vertex(0, 0).tex_coord, [0.0, 0.0]);
        assert_eq!(mesh.vertex(4, 2).tex_coord, [1.0, 1.0]);
        assert_eq!(mesh.vertex(2, 1).tex_coord, [0.5, 0.5]);
        assert_eq!(mesh.indices().len(), 2 * (2 * 5 + 1));
        assert_eq!(*mesh.indices().last().unwrap(), RESTART_INDEX);
        assert!(mesh.chroma().is_none());
    }

    // ── properties ────────────────────────────────────────────────────────

    #[test]
    fn identity_profile_yields_regular_grid() {
        let config = DistortionConfig::identity();
        let grid = Resolution::new(9, 7);
        let mesh = DistortionMeshGenerator::new(&config)
            .generate(grid, Eye::Right, ChromaMode::Chromatic)
            .unwrap();
        for v in mesh.vertices() {
            let nominal = CoordinateMapper::texture_to_screen(Vec2::from_f32(v.tex_coord));
            assert_relative_eq!(f64::from(v.position[0]), nominal.x, epsilon = 1e-6);
            assert_relative_eq!(f64::from(v.position[1]), nominal.y, epsilon = 1e-6);
        }
        for (v, c) in mesh.vertices().iter().zip(mesh.chroma().unwrap()) {
            assert_relative_eq!(c.red[0], v.tex_coord[0], epsilon = 1e-6);
            assert_relative_eq!(c.blue[1], v.tex_coord[1], epsilon = 1e-6);
        }
        assert!(mesh.max_displacement() < 1e-6);
    }

    #[test]
    fn eyes_are_horizontal_mirrors() {
        let config = dk1();
        let generator = DistortionMeshGenerator::new(&config);
        let grid = Resolution::square(11);
        let left = generator.generate(grid, Eye::Left, ChromaMode::Achromatic).unwrap();
        let right = generator.generate(grid, Eye::Right, ChromaMode::Achromatic).unwrap();
        for y in 0..grid.height {
            for x in 0..grid.width {
                let l = left.vertex(x, y).position;
                let r = right.vertex(grid.width - 1 - x, y).position;
                assert!((l[0] + r[0]).abs() < 1e-5);
                assert!((l[1] - r[1]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn mesh_agrees_with_lookup_texture() {
        let config = dk1();
        let grid = Resolution::square(17);
        let mesh = DistortionMeshGenerator::new(&config)
            .generate(grid, Eye::Left, ChromaMode::Chromatic)
            .unwrap();
        let lookup = LookupTextureGenerator::new(&config)
            .generate(Resolution::square(512), Eye::Left, ChromaMode::Chromatic)
            .unwrap();

        for (v, c) in mesh.vertices().iter().zip(mesh.chroma().unwrap()) {
            let displayed =
                CoordinateMapper::screen_to_texture(Vec2::from_f32(v.position));
            // Skip vertices pushed outside the displayed area; the table clamps there.
            if !(0.01..=0.99).contains(&displayed.x) || !(0.01..=0.99).contains(&displayed.y) {
                continue;
            }
            let sampled = lookup.sample(displayed);
            assert!((sampled.x - f64::from(v.tex_coord[0])).abs() < 2e-3);
            assert!((sampled.y - f64::from(v.tex_coord[1])).abs() < 2e-3);

            let (red, blue) = lookup.sample_chroma(displayed).unwrap();
            assert!((red.x - f64::from(c.red[0])).abs() < 2e-3);
            assert!((blue.y - f64::from(c.blue[1])).abs() < 2e-3);
        }
    }

    #[test]
    fn exact_lookup_of_displaced_vertex_returns_tex_coord() {
        let config =
            DistortionConfig::new([1.0, 0.22, 0.24, 0.0], ChromaK::NONE, 0.1, 1.0).unwrap();
        let lookup = LookupTextureGenerator::new(&config);
        let inverter = RadiusInverter::new(&config);
        for &(u, v) in &[(0.2, 0.3), (0.5, 0.5), (0.9, 0.1)] {
            let tex = Vec2::new(u, v);
            let screen = CoordinateMapper::texture_to_screen(tex);
            let displaced = inverter.find_distorted_vertex_position(screen, Eye::Right);
            let back =
                lookup.lookup_value(CoordinateMapper::screen_to_texture(displaced), Eye::Right);
            assert!((back.x - u).abs() < 1e-6);
            assert!((back.y - v).abs() < 1e-6);
        }
    }
}

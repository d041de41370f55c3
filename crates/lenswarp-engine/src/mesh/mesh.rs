use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use crate::coords::{Resolution, Vec2};
use crate::distortion::{ChromaMode, CoordinateMapper, Eye};

/// Index that ends one triangle strip and starts the next.
pub const RESTART_INDEX: u32 = u32::MAX;

/// One mesh vertex: where to draw it and which eye-buffer texel it shows.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    /// Pre-displaced screen position, `[-1, 1]²`.
    pub position: [f32; 2],
    /// Undistorted texture coordinate, `[0, 1]²`.
    pub tex_coord: [f32; 2],
}

/// Per-channel texture coordinates for chromatic meshes. Green uses
/// [`MeshVertex::tex_coord`].
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ChromaTexCoords {
    pub red: [f32; 2],
    pub blue: [f32; 2],
}

/// Pre-distorted grid for one eye.
///
/// Vertices are row-major over `grid`. Indices form one triangle strip per
/// pair of adjacent rows, each followed by [`RESTART_INDEX`].
#[derive(Debug, Clone, PartialEq)]
pub struct DistortionMesh {
    grid: Resolution,
    eye: Eye,
    vertices: Vec<MeshVertex>,
    chroma: Option<Vec<ChromaTexCoords>>,
    indices: Vec<u32>,
}

impl DistortionMesh {
    pub(super) fn new(
        grid: Resolution,
        eye: Eye,
        vertices: Vec<MeshVertex>,
        chroma: Option<Vec<ChromaTexCoords>>,
        indices: Vec<u32>,
    ) -> Self {
        debug_assert_eq!(vertices.len() as u64, grid.area());
        Self { grid, eye, vertices, chroma, indices }
    }

    #[inline]
    pub fn grid(&self) -> Resolution {
        self.grid
    }

    #[inline]
    pub fn eye(&self) -> Eye {
        self.eye
    }

    #[inline]
    pub fn mode(&self) -> ChromaMode {
        if self.chroma.is_some() { ChromaMode::Chromatic } else { ChromaMode::Achromatic }
    }

    #[inline]
    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    #[inline]
    pub fn chroma(&self) -> Option<&[ChromaTexCoords]> {
        self.chroma.as_deref()
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn vertex(&self, x: u32, y: u32) -> MeshVertex {
        debug_assert!(x < self.grid.width && y < self.grid.height);
        self.vertices[y as usize * self.grid.width as usize + x as usize]
    }

    /// Largest distance between a vertex's displaced position and the
    /// undisplaced grid position its texture coordinate names.
    pub fn max_displacement(&self) -> f64 {
        self.vertices
            .iter()
            .map(|v| {
                let nominal = CoordinateMapper::texture_to_screen(Vec2::from_f32(v.tex_coord));
                (Vec2::from_f32(v.position) - nominal).length()
            })
            .fold(0.0, f64::max)
    }
}

/// Strip indices for a row-major `grid`: for each row pair, alternate the
/// lower and upper row's vertex, then restart.
pub(super) fn strip_indices(grid: Resolution) -> Vec<u32> {
    let Resolution { width, height } = grid;
    let strips = height.saturating_sub(1) as usize;
    let mut indices = Vec::with_capacity(strips * (2 * width as usize + 1));
    for y in 0..height.saturating_sub(1) {
        let row = y * width;
        let next_row = row + width;
        for x in 0..width {
            indices.push(next_row + x);
            indices.push(row + x);
        }
        indices.push(RESTART_INDEX);
    }
    indices
}

/// Index ranges of each strip in [`strip_indices`] output, excluding the
/// trailing [`RESTART_INDEX`].
///
/// Drawing these ranges one at a time gives the same triangles as a single
/// draw with primitive restart, without relying on the backend to recognize
/// the sentinel.
pub fn strip_ranges(grid: Resolution) -> impl Iterator<Item = Range<u32>> {
    let strip_len = 2 * grid.width;
    let stride = strip_len + 1;
    (0..grid.height.saturating_sub(1)).map(move |s| {
        let start = s * stride;
        start..start + strip_len
    })
}

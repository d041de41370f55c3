//! Pre-distorted vertex meshes.
//!
//! The mesh path moves the distortion work from the fragment shader into the
//! vertex positions: a regular grid over the eye buffer is displaced by the
//! inverse of the lens model, and the GPU interpolates texture coordinates
//! between vertices.

mod generator;
#[allow(clippy::module_inception)]
mod mesh;

pub use generator::DistortionMeshGenerator;
pub use mesh::{strip_ranges, ChromaTexCoords, DistortionMesh, MeshVertex, RESTART_INDEX};

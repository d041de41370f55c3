//! Lenswarp engine crate.
//!
//! Corrects the radial (pincushion/barrel) distortion of head-mounted display
//! lenses. Two interchangeable outputs are produced from one
//! [`distortion::DistortionConfig`]:
//! - [`lookup::LookupTexture`]: per-texel source coordinates for a fullscreen
//!   post-process pass
//! - [`mesh::DistortionMesh`]: a pre-distorted grid rendered with ordinary
//!   texture sampling
//!
//! Both optionally carry chromatic aberration correction. [`render`] uploads
//! them and draws eye images through them with wgpu, and also offers a direct
//! pass that evaluates the polynomial per fragment.

pub mod device;
pub mod logging;

pub mod coords;
pub mod distortion;
pub mod lookup;
pub mod mesh;
pub mod render;

//! Lookup-texture distortion: a per-texel table of source coordinates that a
//! fullscreen post-process pass reads the rendered eye buffer through.

mod generator;
mod texture;
mod warp;

pub use generator::LookupTextureGenerator;
pub use texture::LookupTexture;
pub use warp::warp_rgba;

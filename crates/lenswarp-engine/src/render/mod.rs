//! GPU side of the distortion passes.
//!
//! [`GpuLookupTexture`] and [`GpuDistortionMesh`] upload generated data and
//! [`GpuDirectParams`] uploads the raw coefficients. [`WarpRenderer`] draws an
//! [`EyeImage`] through any of them into one eye viewport of a color target.
//!
//! Convention:
//! - screen space `[-1, 1]²` has +Y down the eye image; the vertex shaders
//!   flip it into clip space
//! - samples outside the eye image read as opaque black

mod ctx;
mod direct;
mod readback;
mod resources;
mod warp;

pub use ctx::{EyeViewport, RenderCtx, RenderTarget};
pub use direct::{DirectUniform, GpuDirectParams};
pub use readback::read_rgba8;
pub use resources::{
    create_color_target, EyeImage, GpuDistortionMesh, GpuLookupTexture, CHROMA_LOOKUP_FORMAT,
    EYE_IMAGE_FORMAT, LOOKUP_FORMAT,
};
pub use warp::WarpRenderer;

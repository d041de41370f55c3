//! GPU device management.
//!
//! This module creates the wgpu Instance/Adapter/Device/Queue used to upload
//! lookup textures and distortion meshes. Surfaces and presentation belong
//! to the host application.

mod gpu;
mod init;

pub use gpu::Gpu;
pub use init::GpuInit;

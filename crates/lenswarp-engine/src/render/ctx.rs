use crate::coords::Resolution;
use crate::device::Gpu;
use crate::distortion::Eye;

/// Renderer-facing context (device/queue + color target format).
pub struct RenderCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub target_format: wgpu::TextureFormat,
}

impl<'a> RenderCtx<'a> {
    #[inline]
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            queue,
            target_format,
        }
    }

    #[inline]
    pub fn from_gpu(gpu: &'a Gpu, target_format: wgpu::TextureFormat) -> Self {
        Self::new(gpu.device(), gpu.queue(), target_format)
    }
}

/// Target for drawing (encoder + color view).
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(encoder: &'a mut wgpu::CommandEncoder, color_view: &'a wgpu::TextureView) -> Self {
        Self { encoder, color_view }
    }
}

/// Region of the color target one eye is drawn into, in physical pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EyeViewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl EyeViewport {
    /// The whole target.
    pub fn full(target: Resolution) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: target.width as f32,
            height: target.height as f32,
        }
    }

    /// Left or right half of a side-by-side stereo target. With an odd
    /// width the right eye gets the extra column.
    pub fn side_by_side(target: Resolution, eye: Eye) -> Self {
        let half = target.width / 2;
        let (x, width) = match eye {
            Eye::Left => (0, half),
            Eye::Right => (half, target.width - half),
        };
        Self {
            x: x as f32,
            y: 0.0,
            width: width as f32,
            height: target.height as f32,
        }
    }
}

use anyhow::{ensure, Result};
use wgpu::util::DeviceExt;

use crate::coords::Resolution;
use crate::distortion::{ChromaMode, Eye};
use crate::lookup::LookupTexture;
use crate::mesh::{ChromaTexCoords, DistortionMesh, MeshVertex};

use super::RenderCtx;

/// Format of the achromatic lookup plane.
pub const LOOKUP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg32Float;
/// Format of the chromatic lookup plane (red uv, blue uv).
pub const CHROMA_LOOKUP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Format of eye images uploaded through [`EyeImage::upload_rgba8`].
pub const EYE_IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// ── vertex layouts ────────────────────────────────────────────────────────

impl MeshVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Float32x2  // tex_coord
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

impl ChromaTexCoords {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        2 => Float32x2, // red
        3 => Float32x2  // blue
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ChromaTexCoords>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

// ── lookup texture ────────────────────────────────────────────────────────

/// A [`LookupTexture`] resident on the GPU.
///
/// Float32 formats are not filterable without an optional feature, so the
/// lookup shader fetches texels with `textureLoad` and interpolates itself.
/// Achromatic tables get a 1x1 placeholder chroma texture so both modes share
/// one bind group layout.
pub struct GpuLookupTexture {
    pub resolution: Resolution,
    pub eye: Eye,
    pub mode: ChromaMode,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    chroma_texture: wgpu::Texture,
    chroma_view: wgpu::TextureView,
}

impl GpuLookupTexture {
    pub fn upload(ctx: &RenderCtx<'_>, lookup: &LookupTexture) -> Self {
        let resolution = lookup.resolution();
        let texture = create_texture_with(
            ctx,
            "lenswarp lookup texture",
            resolution,
            LOOKUP_FORMAT,
            bytemuck::cast_slice(lookup.texels()),
        );

        let chroma_texture = match lookup.chroma_texels() {
            Some(texels) => create_texture_with(
                ctx,
                "lenswarp chroma lookup texture",
                resolution,
                CHROMA_LOOKUP_FORMAT,
                bytemuck::cast_slice(texels),
            ),
            None => create_texture_with(
                ctx,
                "lenswarp chroma lookup placeholder",
                Resolution::square(1),
                CHROMA_LOOKUP_FORMAT,
                bytemuck::cast_slice(&[[0.0f32; 4]]),
            ),
        };

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let chroma_view = chroma_texture.create_view(&wgpu::TextureViewDescriptor::default());

        log::debug!(
            "uploaded {} lookup texture {resolution} ({:?})",
            lookup.eye(),
            lookup.mode()
        );

        Self {
            resolution,
            eye: lookup.eye(),
            mode: lookup.mode(),
            texture,
            view,
            chroma_texture,
            chroma_view,
        }
    }

    #[inline]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    #[inline]
    pub fn chroma_texture(&self) -> &wgpu::Texture {
        &self.chroma_texture
    }

    #[inline]
    pub(super) fn views(&self) -> (&wgpu::TextureView, &wgpu::TextureView) {
        (&self.view, &self.chroma_view)
    }
}

// ── distortion mesh ───────────────────────────────────────────────────────

/// A [`DistortionMesh`] resident on the GPU. The index buffer keeps the
/// restart sentinels; [`super::WarpRenderer::draw_mesh`] draws around them.
pub struct GpuDistortionMesh {
    pub grid: Resolution,
    pub eye: Eye,
    vertex_buffer: wgpu::Buffer,
    chroma_buffer: Option<wgpu::Buffer>,
    index_buffer: wgpu::Buffer,
}

impl GpuDistortionMesh {
    pub fn upload(ctx: &RenderCtx<'_>, mesh: &DistortionMesh) -> Self {
        let vertex_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lenswarp mesh vbo"),
            contents: bytemuck::cast_slice(mesh.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let chroma_buffer = mesh.chroma().map(|chroma| {
            ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("lenswarp mesh chroma vbo"),
                contents: bytemuck::cast_slice(chroma),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        let index_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lenswarp mesh ibo"),
            contents: bytemuck::cast_slice(mesh.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            grid: mesh.grid(),
            eye: mesh.eye(),
            vertex_buffer,
            chroma_buffer,
            index_buffer,
        }
    }

    #[inline]
    pub fn mode(&self) -> ChromaMode {
        if self.chroma_buffer.is_some() { ChromaMode::Chromatic } else { ChromaMode::Achromatic }
    }

    #[inline]
    pub(super) fn buffers(&self) -> (&wgpu::Buffer, Option<&wgpu::Buffer>, &wgpu::Buffer) {
        (&self.vertex_buffer, self.chroma_buffer.as_ref(), &self.index_buffer)
    }
}

// ── eye images ────────────────────────────────────────────────────────────

/// Undistorted eye image the warp passes sample from.
pub struct EyeImage {
    pub size: Resolution,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl EyeImage {
    /// Wraps an existing texture view, e.g. the application's eye render target.
    pub fn from_texture(texture: wgpu::Texture, size: Resolution) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { size, texture, view }
    }

    /// Uploads tightly packed RGBA8 pixels.
    pub fn upload_rgba8(ctx: &RenderCtx<'_>, pixels: &[u8], size: Resolution) -> Result<Self> {
        ensure!(!size.is_empty(), "eye image {size} is empty");
        ensure!(
            pixels.len() as u64 == size.area() * 4,
            "eye image {size} expects {} bytes, got {}",
            size.area() * 4,
            pixels.len()
        );
        let texture = create_texture_with(ctx, "lenswarp eye image", size, EYE_IMAGE_FORMAT, pixels);
        Ok(Self::from_texture(texture, size))
    }

    #[inline]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    #[inline]
    pub(super) fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Creates an offscreen color target that can be copied back to the CPU.
pub fn create_color_target(
    ctx: &RenderCtx<'_>,
    size: Resolution,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("lenswarp color target"),
        size: extent(size),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: ctx.target_format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

#[inline]
pub(super) fn extent(size: Resolution) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width,
        height: size.height,
        depth_or_array_layers: 1,
    }
}

fn create_texture_with(
    ctx: &RenderCtx<'_>,
    label: &str,
    size: Resolution,
    format: wgpu::TextureFormat,
    data: &[u8],
) -> wgpu::Texture {
    ctx.device.create_texture_with_data(
        ctx.queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        data,
    )
}

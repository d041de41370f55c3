use crate::distortion::ChromaMode;
use crate::mesh::{strip_ranges, ChromaTexCoords, MeshVertex};

use super::direct::{DirectUniform, GpuDirectParams};
use super::resources::{EyeImage, GpuDistortionMesh, GpuLookupTexture};
use super::{EyeViewport, RenderCtx, RenderTarget};

/// Draws an eye image through a distortion mesh, a lookup texture, or the
/// direct per-fragment polynomial.
///
/// Pipelines are built lazily for the target format and rebuilt if it
/// changes. Each draw opens its own render pass restricted to the eye
/// viewport; call [`WarpRenderer::clear`] first to reset the target.
#[derive(Default)]
pub struct WarpRenderer {
    pipeline_format: Option<wgpu::TextureFormat>,
    pipelines: Option<Pipelines>,
    sampler: Option<wgpu::Sampler>,
}

struct Pipelines {
    eye_bgl: wgpu::BindGroupLayout,
    lookup_bgl: wgpu::BindGroupLayout,
    direct_bgl: wgpu::BindGroupLayout,
    mesh: wgpu::RenderPipeline,
    mesh_chroma: wgpu::RenderPipeline,
    lookup: wgpu::RenderPipeline,
    lookup_chroma: wgpu::RenderPipeline,
    direct: wgpu::RenderPipeline,
}

impl WarpRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the whole target to opaque black.
    pub fn clear(&self, target: &mut RenderTarget<'_>) {
        let _ = begin_pass(target, "lenswarp clear pass", wgpu::LoadOp::Clear(wgpu::Color::BLACK));
    }

    /// Renders `eye` through a pre-distorted mesh into `viewport`.
    ///
    /// Each strip is drawn separately so the restart sentinel in the index
    /// buffer is never fetched as a vertex.
    pub fn draw_mesh(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        eye: &EyeImage,
        mesh: &GpuDistortionMesh,
        viewport: EyeViewport,
    ) {
        self.ensure_pipelines(ctx);
        let Some(eye_group) = self.eye_bind_group(ctx, eye) else { return };
        let Some(pipelines) = self.pipelines.as_ref() else { return };

        let (vbo, chroma_vbo, ibo) = mesh.buffers();
        let pipeline = match mesh.mode() {
            ChromaMode::Achromatic => &pipelines.mesh,
            ChromaMode::Chromatic => &pipelines.mesh_chroma,
        };

        let mut rpass = begin_pass(target, "lenswarp mesh pass", wgpu::LoadOp::Load);
        set_viewport(&mut rpass, viewport);
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &eye_group, &[]);
        rpass.set_vertex_buffer(0, vbo.slice(..));
        if let Some(chroma_vbo) = chroma_vbo {
            rpass.set_vertex_buffer(1, chroma_vbo.slice(..));
        }
        rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint32);
        for strip in strip_ranges(mesh.grid) {
            rpass.draw_indexed(strip, 0, 0..1);
        }
    }

    /// Renders `eye` through a lookup texture into `viewport`.
    pub fn draw_lookup(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        eye: &EyeImage,
        lookup: &GpuLookupTexture,
        viewport: EyeViewport,
    ) {
        self.ensure_pipelines(ctx);
        let Some(eye_group) = self.eye_bind_group(ctx, eye) else { return };
        let Some(pipelines) = self.pipelines.as_ref() else { return };

        let (lookup_view, chroma_view) = lookup.views();
        let lookup_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lenswarp lookup bind group"),
            layout: &pipelines.lookup_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(lookup_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(chroma_view),
                },
            ],
        });
        let pipeline = match lookup.mode {
            ChromaMode::Achromatic => &pipelines.lookup,
            ChromaMode::Chromatic => &pipelines.lookup_chroma,
        };

        let mut rpass = begin_pass(target, "lenswarp lookup pass", wgpu::LoadOp::Load);
        set_viewport(&mut rpass, viewport);
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &eye_group, &[]);
        rpass.set_bind_group(1, &lookup_group, &[]);
        rpass.draw(0..3, 0..1);
    }

    /// Renders `eye` into `viewport`, evaluating the distortion polynomial
    /// for every fragment.
    pub fn draw_direct(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        eye: &EyeImage,
        params: &GpuDirectParams,
        viewport: EyeViewport,
    ) {
        self.ensure_pipelines(ctx);
        let Some(eye_group) = self.eye_bind_group(ctx, eye) else { return };
        let Some(pipelines) = self.pipelines.as_ref() else { return };

        let params_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lenswarp direct bind group"),
            layout: &pipelines.direct_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params.buffer().as_entire_binding(),
            }],
        });

        let mut rpass = begin_pass(target, "lenswarp direct pass", wgpu::LoadOp::Load);
        set_viewport(&mut rpass, viewport);
        rpass.set_pipeline(&pipelines.direct);
        rpass.set_bind_group(0, &eye_group, &[]);
        rpass.set_bind_group(1, &params_group, &[]);
        rpass.draw(0..3, 0..1);
    }

    fn eye_bind_group(&mut self, ctx: &RenderCtx<'_>, eye: &EyeImage) -> Option<wgpu::BindGroup> {
        let sampler = self.sampler.get_or_insert_with(|| {
            ctx.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("lenswarp eye sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            })
        });
        let pipelines = self.pipelines.as_ref()?;
        Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lenswarp eye bind group"),
            layout: &pipelines.eye_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(eye.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        }))
    }

    fn ensure_pipelines(&mut self, ctx: &RenderCtx<'_>) {
        if self.pipeline_format == Some(ctx.target_format) && self.pipelines.is_some() {
            return;
        }

        let device = ctx.device;
        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lenswarp mesh shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh_warp.wgsl").into()),
        });
        let lookup_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lenswarp lookup shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/lookup_warp.wgsl").into()),
        });
        let direct_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lenswarp direct shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/direct_warp.wgsl").into()),
        });

        let eye_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lenswarp eye bgl"),
            entries: &[
                texture_entry(0, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let lookup_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lenswarp lookup bgl"),
            entries: &[texture_entry(0, false), texture_entry(1, false)],
        });
        let direct_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lenswarp direct bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<DirectUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lenswarp mesh pipeline layout"),
            bind_group_layouts: &[&eye_bgl],
            immediate_size: 0,
        });
        let lookup_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lenswarp lookup pipeline layout"),
            bind_group_layouts: &[&eye_bgl, &lookup_bgl],
            immediate_size: 0,
        });
        let direct_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lenswarp direct pipeline layout"),
            bind_group_layouts: &[&eye_bgl, &direct_bgl],
            immediate_size: 0,
        });

        let format = ctx.target_format;
        let strip = wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: Some(wgpu::IndexFormat::Uint32),
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        };
        let triangles = wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            ..strip
        };

        let pipelines = Pipelines {
            mesh: build_pipeline(
                device,
                format,
                PipelineDesc {
                    label: "lenswarp mesh pipeline",
                    layout: &mesh_layout,
                    shader: &mesh_shader,
                    vs: "vs_main",
                    fs: "fs_main",
                    buffers: &[MeshVertex::layout()],
                    primitive: strip,
                },
            ),
            mesh_chroma: build_pipeline(
                device,
                format,
                PipelineDesc {
                    label: "lenswarp chroma mesh pipeline",
                    layout: &mesh_layout,
                    shader: &mesh_shader,
                    vs: "vs_chroma",
                    fs: "fs_chroma",
                    buffers: &[MeshVertex::layout(), ChromaTexCoords::layout()],
                    primitive: strip,
                },
            ),
            lookup: build_pipeline(
                device,
                format,
                PipelineDesc {
                    label: "lenswarp lookup pipeline",
                    layout: &lookup_layout,
                    shader: &lookup_shader,
                    vs: "vs_fullscreen",
                    fs: "fs_lookup",
                    buffers: &[],
                    primitive: triangles,
                },
            ),
            lookup_chroma: build_pipeline(
                device,
                format,
                PipelineDesc {
                    label: "lenswarp chroma lookup pipeline",
                    layout: &lookup_layout,
                    shader: &lookup_shader,
                    vs: "vs_fullscreen",
                    fs: "fs_lookup_chroma",
                    buffers: &[],
                    primitive: triangles,
                },
            ),
            direct: build_pipeline(
                device,
                format,
                PipelineDesc {
                    label: "lenswarp direct pipeline",
                    layout: &direct_layout,
                    shader: &direct_shader,
                    vs: "vs_fullscreen",
                    fs: "fs_direct",
                    buffers: &[],
                    primitive: triangles,
                },
            ),
            eye_bgl,
            lookup_bgl,
            direct_bgl,
        };

        log::debug!("built warp pipelines for {format:?}");
        self.pipeline_format = Some(format);
        self.pipelines = Some(pipelines);
    }
}

struct PipelineDesc<'a> {
    label: &'a str,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    vs: &'a str,
    fs: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    primitive: wgpu::PrimitiveState,
}

fn build_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    desc: PipelineDesc<'_>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(desc.layout),
        vertex: wgpu::VertexState {
            module: desc.shader,
            entry_point: Some(desc.vs),
            compilation_options: Default::default(),
            buffers: desc.buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.shader,
            entry_point: Some(desc.fs),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: desc.primitive,
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

fn texture_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn begin_pass<'e>(
    target: &'e mut RenderTarget<'_>,
    label: &str,
    load: wgpu::LoadOp<wgpu::Color>,
) -> wgpu::RenderPass<'e> {
    target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target.color_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}

#[inline]
fn set_viewport(rpass: &mut wgpu::RenderPass<'_>, v: EyeViewport) {
    rpass.set_viewport(v.x, v.y, v.width, v.height, 0.0, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Resolution;
    use crate::device::{Gpu, GpuInit};
    use crate::distortion::{DistortionConfig, Eye, HmdProfile, ProfileFit};
    use crate::lookup::LookupTextureGenerator;
    use crate::mesh::DistortionMeshGenerator;
    use crate::render::{create_color_target, read_rgba8};

    fn gpu() -> Option<Gpu> {
        match Gpu::headless(GpuInit {
            allow_fallback_adapter: true,
            ..GpuInit::default()
        }) {
            Ok(gpu) => Some(gpu),
            Err(err) => {
                eprintln!("skipping GPU test: {err:#}");
                None
            }
        }
    }

    fn render(
        gpu: &Gpu,
        ctx: &RenderCtx<'_>,
        renderer: &mut WarpRenderer,
        size: Resolution,
        draw: impl FnOnce(&mut WarpRenderer, &mut RenderTarget<'_>, EyeViewport),
    ) -> Vec<u8> {
        let (texture, view) = create_color_target(ctx, size);
        gpu.submit_with("test encoder", |encoder| {
            let mut target = RenderTarget::new(encoder, &view);
            renderer.clear(&mut target);
            draw(renderer, &mut target, EyeViewport::full(size));
        });
        read_rgba8(gpu, &texture, size).unwrap()
    }

    /// Smooth ramp: red follows x, green follows y.
    fn gradient(size: Resolution) -> Vec<u8> {
        let sx = 255 / (size.width - 1).max(1);
        let sy = 255 / (size.height - 1).max(1);
        (0..size.height)
            .flat_map(|y| (0..size.width).map(move |x| (x, y)))
            .flat_map(|(x, y)| [(x * sx) as u8, (y * sy) as u8, 128, 255])
            .collect()
    }

    fn mean_rgb_diff(a: &[u8], b: &[u8]) -> f64 {
        let (sum, n) = a.chunks_exact(4).zip(b.chunks_exact(4)).fold((0u64, 0u64), |acc, (p, q)| {
            let d: u64 = (0..3).map(|c| u64::from(p[c].abs_diff(q[c]))).sum();
            (acc.0 + d, acc.1 + 3)
        });
        sum as f64 / n as f64
    }

    fn count_far_pixels(a: &[u8], b: &[u8], threshold: u8) -> usize {
        a.chunks_exact(4)
            .zip(b.chunks_exact(4))
            .filter(|(p, q)| (0..3).any(|c| p[c].abs_diff(q[c]) > threshold))
            .count()
    }

    // ── identity ──────────────────────────────────────────────────────────

    #[test]
    fn identity_warp_reproduces_eye_image() {
        let Some(gpu) = gpu() else { return };
        let ctx = RenderCtx::from_gpu(&gpu, wgpu::TextureFormat::Rgba8Unorm);
        let size = Resolution::square(16);
        let config = DistortionConfig::identity();

        let pixels: Vec<u8> = (0..size.area())
            .flat_map(|i| [(i * 16 % 256) as u8, (i % 256) as u8, 64, 255])
            .collect();
        let eye = EyeImage::upload_rgba8(&ctx, &pixels, size).unwrap();
        let lookup = LookupTextureGenerator::new(&config)
            .generate(size, Eye::Left, ChromaMode::Chromatic)
            .unwrap();
        let mesh = DistortionMeshGenerator::new(&config)
            .generate(Resolution::square(5), Eye::Left, ChromaMode::Achromatic)
            .unwrap();
        let lookup = GpuLookupTexture::upload(&ctx, &lookup);
        let mesh = GpuDistortionMesh::upload(&ctx, &mesh);
        let direct = GpuDirectParams::upload(&ctx, &config, Eye::Left, ChromaMode::Chromatic);

        let mut renderer = WarpRenderer::new();
        for pass in ["lookup", "mesh", "direct"] {
            let out = render(&gpu, &ctx, &mut renderer, size, |r, target, viewport| match pass {
                "lookup" => r.draw_lookup(&ctx, target, &eye, &lookup, viewport),
                "mesh" => r.draw_mesh(&ctx, target, &eye, &mesh, viewport),
                _ => r.draw_direct(&ctx, target, &eye, &direct, viewport),
            });
            for (a, b) in out.iter().zip(&pixels) {
                assert!(a.abs_diff(*b) <= 2, "{pass} pass: {a} vs {b}");
            }
        }
    }

    // ── distorted ─────────────────────────────────────────────────────────

    #[test]
    fn distorted_mesh_matches_lookup_pass() {
        let Some(gpu) = gpu() else { return };
        let ctx = RenderCtx::from_gpu(&gpu, wgpu::TextureFormat::Rgba8Unorm);
        let size = Resolution::square(32);
        let config = HmdProfile::dk1().to_config(ProfileFit::FitOuterEdge).unwrap();

        let pixels = gradient(size);
        let eye = EyeImage::upload_rgba8(&ctx, &pixels, size).unwrap();
        let lookup = LookupTextureGenerator::new(&config)
            .generate(size, Eye::Left, ChromaMode::Achromatic)
            .unwrap();
        let mesh = DistortionMeshGenerator::new(&config)
            .generate(Resolution::square(33), Eye::Left, ChromaMode::Achromatic)
            .unwrap();
        let lookup = GpuLookupTexture::upload(&ctx, &lookup);
        let mesh = GpuDistortionMesh::upload(&ctx, &mesh);

        let mut renderer = WarpRenderer::new();
        let via_lookup = render(&gpu, &ctx, &mut renderer, size, |r, target, viewport| {
            r.draw_lookup(&ctx, target, &eye, &lookup, viewport)
        });
        let via_mesh = render(&gpu, &ctx, &mut renderer, size, |r, target, viewport| {
            r.draw_mesh(&ctx, target, &eye, &mesh, viewport)
        });

        // Only pixels straddling the displayed image's edge may disagree.
        let diff = mean_rgb_diff(&via_mesh, &via_lookup);
        assert!(diff < 4.0, "mean difference {diff}");
        let far = count_far_pixels(&via_mesh, &via_lookup, 48);
        assert!(far <= 32, "{far} pixels differ strongly");

        // Upper-right quadrant, where strips end next to the top row.
        let quadrant = |img: &[u8]| -> Vec<u8> {
            (0..16u32)
                .flat_map(|y| (16..32u32).map(move |x| (x, y)))
                .flat_map(|(x, y)| {
                    let i = ((y * 32 + x) * 4) as usize;
                    img[i..i + 4].to_vec()
                })
                .collect()
        };
        let diff = mean_rgb_diff(&quadrant(&via_mesh), &quadrant(&via_lookup));
        assert!(diff < 4.0, "upper-right mean difference {diff}");
    }

    #[test]
    fn direct_pass_matches_lookup_pass() {
        let Some(gpu) = gpu() else { return };
        let ctx = RenderCtx::from_gpu(&gpu, wgpu::TextureFormat::Rgba8Unorm);
        let size = Resolution::square(32);
        let config = HmdProfile::dk1().to_config(ProfileFit::FitOuterEdge).unwrap();

        let pixels = gradient(size);
        let eye = EyeImage::upload_rgba8(&ctx, &pixels, size).unwrap();
        let mut renderer = WarpRenderer::new();

        for eye_side in Eye::BOTH {
            let lookup = LookupTextureGenerator::new(&config)
                .generate(size, eye_side, ChromaMode::Chromatic)
                .unwrap();
            let lookup = GpuLookupTexture::upload(&ctx, &lookup);
            let direct = GpuDirectParams::upload(&ctx, &config, eye_side, ChromaMode::Chromatic);

            let via_lookup = render(&gpu, &ctx, &mut renderer, size, |r, target, viewport| {
                r.draw_lookup(&ctx, target, &eye, &lookup, viewport)
            });
            let via_direct = render(&gpu, &ctx, &mut renderer, size, |r, target, viewport| {
                r.draw_direct(&ctx, target, &eye, &direct, viewport)
            });

            let diff = mean_rgb_diff(&via_direct, &via_lookup);
            assert!(diff < 2.0, "{eye_side}: mean difference {diff}");
            // Distortion actually moved something.
            assert!(mean_rgb_diff(&via_direct, &pixels) > 4.0);
        }
    }

    #[test]
    fn updated_direct_params_take_effect() {
        let Some(gpu) = gpu() else { return };
        let ctx = RenderCtx::from_gpu(&gpu, wgpu::TextureFormat::Rgba8Unorm);
        let size = Resolution::square(16);
        let dk1 = HmdProfile::dk1().to_config(ProfileFit::FitOuterEdge).unwrap();

        let pixels = gradient(size);
        let eye = EyeImage::upload_rgba8(&ctx, &pixels, size).unwrap();
        let mut direct = GpuDirectParams::upload(&ctx, &dk1, Eye::Right, ChromaMode::Achromatic);
        direct.update(&ctx, &DistortionConfig::identity());
        assert_eq!(direct.uniform().k, [1.0, 0.0, 0.0, 0.0]);

        let mut renderer = WarpRenderer::new();
        let out = render(&gpu, &ctx, &mut renderer, size, |r, target, viewport| {
            r.draw_direct(&ctx, target, &eye, &direct, viewport)
        });
        assert!(mean_rgb_diff(&out, &pixels) < 1.0);
    }
}

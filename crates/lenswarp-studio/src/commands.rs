use std::path::Path;

use anyhow::{Context, Result};
use lenswarp_engine::coords::Resolution;
use lenswarp_engine::device::{Gpu, GpuInit};
use lenswarp_engine::distortion::{ChromaMode, DistortionConfig, Eye, HmdProfile, ProfileFit};
use lenswarp_engine::lookup::{warp_rgba, LookupTexture, LookupTextureGenerator};
use lenswarp_engine::mesh::{DistortionMesh, DistortionMeshGenerator};
use lenswarp_engine::render::{
    create_color_target, read_rgba8, EyeImage, EyeViewport, GpuDirectParams, GpuDistortionMesh,
    GpuLookupTexture, RenderCtx, RenderTarget, WarpRenderer, EYE_IMAGE_FORMAT,
};

/// Loads a profile from JSON, or the DK1 defaults, and derives its config.
pub fn load_config(path: Option<&Path>, fit: ProfileFit) -> Result<DistortionConfig> {
    let profile = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read profile {}", path.display()))?;
            serde_json::from_str::<HmdProfile>(&text)
                .with_context(|| format!("failed to parse profile {}", path.display()))?
        }
        None => HmdProfile::dk1(),
    };
    let config = profile.to_config(fit).context("invalid HMD profile")?;
    log::info!(
        "K = {:?}, lens offset {:.4}, eye aspect {:.4}",
        config.k(),
        config.lens_offset(),
        config.eye_aspect()
    );
    Ok(config)
}

// ── lookup ────────────────────────────────────────────────────────────────

pub fn lookup(
    config: &DistortionConfig,
    size: Resolution,
    eye: Eye,
    mode: ChromaMode,
    png: Option<&Path>,
) -> Result<()> {
    let table = LookupTextureGenerator::new(config).generate(size, eye, mode)?;
    let stats = LookupStats::of(&table);
    println!("lookup {size} {eye} {mode:?}");
    println!("  u range      {:.5} .. {:.5}", stats.min[0], stats.max[0]);
    println!("  v range      {:.5} .. {:.5}", stats.min[1], stats.max[1]);
    println!("  in bounds    {:.2}%", stats.in_bounds * 100.0);

    if let Some(path) = png {
        let pixels: Vec<u8> = table
            .texels()
            .iter()
            .flat_map(|&[u, v]| [unorm8(u), unorm8(v), 0, 255])
            .collect();
        save_png(path, size, pixels)?;
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
struct LookupStats {
    min: [f32; 2],
    max: [f32; 2],
    /// Fraction of texels whose source coordinate lies inside the eye image.
    in_bounds: f64,
}

impl LookupStats {
    fn of(table: &LookupTexture) -> Self {
        let mut min = [f32::INFINITY; 2];
        let mut max = [f32::NEG_INFINITY; 2];
        let mut inside = 0usize;
        for &[u, v] in table.texels() {
            min = [min[0].min(u), min[1].min(v)];
            max = [max[0].max(u), max[1].max(v)];
            if (0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v) {
                inside += 1;
            }
        }
        Self {
            min,
            max,
            in_bounds: inside as f64 / table.texels().len() as f64,
        }
    }
}

// ── mesh ──────────────────────────────────────────────────────────────────

pub fn mesh(
    config: &DistortionConfig,
    grid: Resolution,
    eye: Eye,
    mode: ChromaMode,
    json: Option<&Path>,
) -> Result<()> {
    let mesh = DistortionMeshGenerator::new(config).generate(grid, eye, mode)?;
    println!("mesh {grid} {eye} {mode:?}");
    println!("  vertices         {}", mesh.vertices().len());
    println!("  indices          {}", mesh.indices().len());
    println!("  max displacement {:.5}", mesh.max_displacement());

    if let Some(path) = json {
        let text = serde_json::to_string_pretty(&mesh_json(config, &mesh))?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("mesh written to {}", path.display());
    }
    Ok(())
}

/// Mesh plus the config it was generated from, so a dump is reproducible.
fn mesh_json(config: &DistortionConfig, mesh: &DistortionMesh) -> serde_json::Value {
    let vertices: Vec<_> = mesh
        .vertices()
        .iter()
        .map(|v| serde_json::json!({ "position": v.position, "tex_coord": v.tex_coord }))
        .collect();
    let chroma = mesh.chroma().map(|c| {
        c.iter()
            .map(|c| serde_json::json!({ "red": c.red, "blue": c.blue }))
            .collect::<Vec<_>>()
    });
    serde_json::json!({
        "config": config,
        "grid": [mesh.grid().width, mesh.grid().height],
        "eye": mesh.eye(),
        "vertices": vertices,
        "chroma": chroma,
        "indices": mesh.indices(),
    })
}

// ── preview ───────────────────────────────────────────────────────────────

pub fn preview(
    config: &DistortionConfig,
    size: Resolution,
    mode: ChromaMode,
    square: u32,
    out: &Path,
) -> Result<()> {
    let sbs = side_by_side_size(size)?;
    let source = checkerboard(size, square);
    let generator = LookupTextureGenerator::new(config);

    let mut eyes = Vec::with_capacity(2);
    for eye in Eye::BOTH {
        let table = generator.generate(size, eye, mode)?;
        eyes.push(warp_rgba(&table, &source, size, size)?);
    }

    save_png(out, sbs, side_by_side(size, &eyes[0], &eyes[1]))
}

/// Size of a target holding two `eye` images next to each other.
fn side_by_side_size(eye: Resolution) -> Result<Resolution> {
    let width = eye
        .width
        .checked_mul(2)
        .with_context(|| format!("side-by-side target for {eye} eyes is too wide"))?;
    Ok(Resolution::new(width, eye.height))
}

/// RGBA checkerboard with tinted squares so chromatic shifts stay visible.
fn checkerboard(size: Resolution, square: u32) -> Vec<u8> {
    let square = square.max(1);
    let mut out = Vec::with_capacity(size.area() as usize * 4);
    for y in 0..size.height {
        for x in 0..size.width {
            let pixel = if (x / square + y / square) % 2 == 0 {
                [235, 235, 235, 255]
            } else {
                [30, 60, 120, 255]
            };
            out.extend_from_slice(&pixel);
        }
    }
    out
}

fn side_by_side(eye_size: Resolution, left: &[u8], right: &[u8]) -> Vec<u8> {
    let row = eye_size.width as usize * 4;
    left.chunks_exact(row)
        .zip(right.chunks_exact(row))
        .flat_map(|(l, r)| l.iter().chain(r).copied())
        .collect()
}

// ── gpu-check ─────────────────────────────────────────────────────────────

pub struct GpuCheck<'a> {
    pub size: Resolution,
    pub grid: Resolution,
    pub mode: ChromaMode,
    pub fallback: bool,
    pub png: Option<&'a Path>,
}

pub fn gpu_check(config: &DistortionConfig, opts: GpuCheck<'_>) -> Result<()> {
    let GpuCheck { size, grid, mode, fallback, png } = opts;
    let target_size = side_by_side_size(size)?;
    let gpu = Gpu::headless(GpuInit {
        allow_fallback_adapter: fallback,
        ..GpuInit::default()
    })?;
    let info = gpu.adapter_info();
    println!("adapter {} ({:?})", info.name, info.backend);

    let ctx = RenderCtx::from_gpu(&gpu, EYE_IMAGE_FORMAT);
    let source = checkerboard(size, 20);
    let eye_image = EyeImage::upload_rgba8(&ctx, &source, size)?;

    let lookup_gen = LookupTextureGenerator::new(config);
    let mesh_gen = DistortionMeshGenerator::new(config);
    let mut cpu_eyes = Vec::with_capacity(2);
    let mut resources = Vec::with_capacity(2);
    for eye in Eye::BOTH {
        let table = lookup_gen.generate(size, eye, mode)?;
        cpu_eyes.push(warp_rgba(&table, &source, size, size)?);
        let mesh = mesh_gen.generate(grid, eye, mode)?;
        resources.push(EyeResources {
            eye,
            lookup: GpuLookupTexture::upload(&ctx, &table),
            mesh: GpuDistortionMesh::upload(&ctx, &mesh),
            direct: GpuDirectParams::upload(&ctx, config, eye, mode),
        });
    }
    let cpu = side_by_side(size, &cpu_eyes[0], &cpu_eyes[1]);

    let mut renderer = WarpRenderer::new();
    let mut outputs = Vec::with_capacity(3);
    for pass in [Pass::Lookup, Pass::Mesh, Pass::Direct] {
        let (texture, view) = create_color_target(&ctx, target_size);
        gpu.submit_with("lenswarp gpu-check encoder", |encoder| {
            let mut target = RenderTarget::new(encoder, &view);
            renderer.clear(&mut target);
            for res in &resources {
                let viewport = EyeViewport::side_by_side(target_size, res.eye);
                match pass {
                    Pass::Lookup => {
                        renderer.draw_lookup(&ctx, &mut target, &eye_image, &res.lookup, viewport)
                    }
                    Pass::Mesh => {
                        renderer.draw_mesh(&ctx, &mut target, &eye_image, &res.mesh, viewport)
                    }
                    Pass::Direct => {
                        renderer.draw_direct(&ctx, &mut target, &eye_image, &res.direct, viewport)
                    }
                }
            }
        });
        outputs.push(read_rgba8(&gpu, &texture, target_size)?);
    }

    println!("mean |gpu lookup - cpu| {:.3}", mean_abs_diff(&outputs[0], &cpu));
    println!("mean |gpu mesh - cpu|   {:.3}", mean_abs_diff(&outputs[1], &cpu));
    println!("mean |gpu direct - cpu| {:.3}", mean_abs_diff(&outputs[2], &cpu));
    println!("mean |mesh - lookup|    {:.3}", mean_abs_diff(&outputs[1], &outputs[0]));

    if let Some(path) = png {
        save_png(path, target_size, outputs.swap_remove(1))?;
    }
    Ok(())
}

#[derive(Debug, Copy, Clone)]
enum Pass {
    Lookup,
    Mesh,
    Direct,
}

struct EyeResources {
    eye: Eye,
    lookup: GpuLookupTexture,
    mesh: GpuDistortionMesh,
    direct: GpuDirectParams,
}

fn mean_abs_diff(a: &[u8], b: &[u8]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let total: u64 = a.iter().zip(b).map(|(x, y)| u64::from(x.abs_diff(*y))).sum();
    total as f64 / a.len() as f64
}

// ── helpers ───────────────────────────────────────────────────────────────

#[inline]
fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn save_png(path: &Path, size: Resolution, pixels: Vec<u8>) -> Result<()> {
    let image = image::RgbaImage::from_raw(size.width, size.height, pixels)
        .context("pixel buffer does not match image size")?;
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

use anyhow::{ensure, Context, Result};

use crate::coords::Resolution;
use crate::device::Gpu;

use super::resources::extent;

/// Copies a 4-byte-per-texel texture back to the CPU, tightly packed.
///
/// Blocks until the GPU has finished all submitted work.
pub fn read_rgba8(gpu: &Gpu, texture: &wgpu::Texture, size: Resolution) -> Result<Vec<u8>> {
    ensure!(!size.is_empty(), "cannot read back empty texture {size}");

    let row_bytes = size.width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_row = row_bytes.div_ceil(align) * align;

    let buffer = gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("lenswarp readback buffer"),
        size: u64::from(padded_row) * u64::from(size.height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    gpu.submit_with("lenswarp readback encoder", |encoder| {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(size.height),
                },
            },
            extent(size),
        );
    });

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    gpu.device()
        .poll(wgpu::PollType::wait_indefinitely())
        .context("failed waiting for readback")?;
    rx.recv()
        .context("readback callback dropped")?
        .context("failed to map readback buffer")?;

    let mapped = slice.get_mapped_range();
    let mut out = Vec::with_capacity(size.area() as usize * 4);
    for row in mapped.chunks_exact(padded_row as usize) {
        out.extend_from_slice(&row[..row_bytes as usize]);
    }
    drop(mapped);
    buffer.unmap();
    Ok(out)
}

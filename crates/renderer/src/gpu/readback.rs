use std::sync::mpsc;

use crate::types::{frame_len, RendererError, BYTES_PER_PIXEL};

/// Mappable copy of the render target.
pub(crate) struct Readback {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_row: u32,
}

impl Readback {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let padded_row = padded_row_bytes(width);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame readback buffer"),
            size: u64::from(padded_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            width,
            height,
            padded_row,
        }
    }

    pub fn encode_copy(&self, encoder: &mut wgpu::CommandEncoder, texture: &wgpu::Texture) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Maps the buffer, waits for the GPU and copies the unpadded rows into `dst`.
    pub fn read_into(&self, device: &wgpu::Device, dst: &mut [u8]) -> Result<(), RendererError> {
        let expected = frame_len(self.width, self.height);
        if dst.len() < expected {
            return Err(RendererError::SizeMismatch {
                expected,
                actual: dst.len(),
            });
        }

        let slice = self.buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).ok();
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| RendererError::Readback(format!("device poll failed: {err}")))?;

        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(RendererError::Readback(err.to_string())),
            Err(_) => {
                return Err(RendererError::Readback(
                    "map_async callback was dropped".into(),
                ))
            }
        }

        {
            let mapped = slice.get_mapped_range();
            unpad_rows(
                &mapped,
                &mut dst[..expected],
                self.padded_row as usize,
                self.width as usize * BYTES_PER_PIXEL,
            );
        }
        self.buffer.unmap();
        Ok(())
    }

    pub fn destroy(&self) {
        self.buffer.destroy();
    }
}

/// Row stride wgpu accepts for a texture-to-buffer copy of `width` pixels.
pub(crate) fn padded_row_bytes(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL as u32;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

fn unpad_rows(src: &[u8], dst: &mut [u8], padded_row: usize, row: usize) {
    for (dst_row, src_row) in dst.chunks_exact_mut(row).zip(src.chunks(padded_row)) {
        dst_row.copy_from_slice(&src_row[..row]);
    }
}

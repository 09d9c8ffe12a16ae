use std::path::Path;

use crate::types::{FrameUniforms, GraphicsBackend, RendererError};

use super::context::GpuContext;
use super::pipeline::{PipelineLayouts, ShaderProgram, TARGET_FORMAT};
use super::readback::Readback;
use super::uniforms::FrameParams;

/// Renders into an off-screen texture and reads frames back to the CPU.
///
/// Fields are declared in reverse acquisition order so an implicit drop
/// releases them the same way [`GraphicsBackend::shutdown`] does.
pub struct HeadlessRenderer {
    readback: Readback,
    target_view: wgpu::TextureView,
    target: wgpu::Texture,
    uniform_bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    layouts: PipelineLayouts,
    context: GpuContext,
    released: bool,
}

impl HeadlessRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self, RendererError> {
        let context = GpuContext::new(width, height)?;
        let layouts = PipelineLayouts::new(&context)?;

        let device = &context.device;
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniform buffer"),
            size: std::mem::size_of::<FrameParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame uniform bind group"),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let readback = Readback::new(device, width, height);

        tracing::info!(
            adapter = %context.adapter_name,
            width,
            height,
            "headless renderer ready"
        );

        Ok(Self {
            readback,
            target_view,
            target,
            uniform_bind_group,
            uniform_buffer,
            layouts,
            context,
            released: false,
        })
    }
}

impl GraphicsBackend for HeadlessRenderer {
    type Program = ShaderProgram;

    fn build_program(&mut self, fragment: &Path) -> Result<ShaderProgram, RendererError> {
        let program = ShaderProgram::build(&self.context, &self.layouts, fragment)?;
        tracing::debug!(shader = %fragment.display(), "linked shader program");
        Ok(program)
    }

    fn draw(&mut self, program: &ShaderProgram, uniforms: &FrameUniforms) -> Result<(), RendererError> {
        let params = FrameParams::from(uniforms);
        let ((), error) = self.context.scoped(|device| {
            self.context
                .queue
                .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&params));

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
            {
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("render pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &self.target_view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                render_pass.set_pipeline(&program.pipeline);
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
                render_pass.draw(0..3, 0..1);
            }
            self.readback.encode_copy(&mut encoder, &self.target);
            self.context.queue.submit(std::iter::once(encoder.finish()));
        });

        match error {
            Some(err) => Err(RendererError::Device(format!("draw failed: {err}"))),
            None => Ok(()),
        }
    }

    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), RendererError> {
        self.readback.read_into(&self.context.device, dst)
    }

    fn release_program(&mut self, program: ShaderProgram) {
        tracing::debug!(shader = %program.source().display(), "released shader program");
        drop(program);
    }

    fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.context.wait_idle() {
            tracing::warn!(%err, "GPU did not drain before shutdown");
        }
        self.readback.destroy();
        self.target.destroy();
        self.uniform_buffer.destroy();
        tracing::debug!("released GPU resources");
    }
}

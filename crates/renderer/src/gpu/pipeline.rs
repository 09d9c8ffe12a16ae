use std::path::{Path, PathBuf};

use crate::compile::{compile_fragment_shader, compile_vertex_shader};
use crate::types::RendererError;

use super::context::GpuContext;

/// Target format of every program; readers expect RGBA8 bytes.
pub(crate) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// State shared by every program: the uniform layout and the fixed vertex stage.
pub(crate) struct PipelineLayouts {
    pub vertex_module: wgpu::ShaderModule,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub uniform_layout: wgpu::BindGroupLayout,
}

impl PipelineLayouts {
    pub fn new(context: &GpuContext) -> Result<Self, RendererError> {
        let (layouts, error) = context.scoped(|device| {
            let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("uniform layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("shader pipeline layout"),
                bind_group_layouts: &[&uniform_layout],
                push_constant_ranges: &[],
            });
            let vertex_module = compile_vertex_shader(device);
            Self {
                vertex_module,
                pipeline_layout,
                uniform_layout,
            }
        });

        match error {
            Some(err) => Err(RendererError::Device(format!(
                "failed to build the vertex stage: {err}"
            ))),
            None => Ok(layouts),
        }
    }
}

/// A linked program: the fixed vertex stage plus one fragment shader.
pub struct ShaderProgram {
    pub(crate) pipeline: wgpu::RenderPipeline,
    source: PathBuf,
}

impl ShaderProgram {
    /// Reads, wraps and links the fragment shader at `path`.
    pub(crate) fn build(
        context: &GpuContext,
        layouts: &PipelineLayouts,
        path: &Path,
    ) -> Result<Self, RendererError> {
        let shader_code = std::fs::read_to_string(path).map_err(|source| RendererError::ShaderIo {
            path: path.to_path_buf(),
            source,
        })?;

        let (pipeline, error) = context.scoped(|device| {
            let fragment_module = compile_fragment_shader(device, &shader_code);
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("shader pipeline"),
                layout: Some(&layouts.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &layouts.vertex_module,
                    entry_point: Some("main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            })
        });

        if let Some(err) = error {
            return Err(RendererError::Compile {
                path: path.to_path_buf(),
                message: err.to_string(),
            });
        }

        Ok(Self {
            pipeline,
            source: path.to_path_buf(),
        })
    }

    /// Fragment shader this program was linked from.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

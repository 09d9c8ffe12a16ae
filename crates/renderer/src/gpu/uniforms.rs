use bytemuck::{Pod, Zeroable};

use crate::types::FrameUniforms;

/// CPU mirror of the `FrameParams` std140 block in the fragment prologue.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct FrameParams {
    pub resolution: [f32; 2],
    pub mouse: [f32; 2],
    pub time: f32,
    pub colorspace: i32,
    pub _padding: [f32; 2],
}

impl From<&FrameUniforms> for FrameParams {
    fn from(uniforms: &FrameUniforms) -> Self {
        Self {
            resolution: [uniforms.resolution.0 as f32, uniforms.resolution.1 as f32],
            mouse: [uniforms.mouse.0 as f32, uniforms.mouse.1 as f32],
            time: uniforms.time,
            colorspace: uniforms.colorspace.flag(),
            _padding: [0.0; 2],
        }
    }
}

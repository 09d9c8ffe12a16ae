//! Off-screen rendering for the `offscreen` frame producer.
//!
//! The crate has two halves: the backend contract the render loop is written
//! against, and a headless `wgpu` implementation of it.
//!
//! ```text
//!   render loop ──▶ GraphicsBackend::draw(program, FrameUniforms)
//!        │                    │
//!        │                    └─▶ uniform buffer ─▶ full-screen triangle ─▶ Rgba8 texture
//!        │
//!        └────────▶ GraphicsBackend::read_pixels(dst) ◀─ padded readback buffer
//! ```
//!
//! Fragment shaders are glslsandbox-style GLSL (`time`, `mouse`, `resolution`,
//! `gl_FragColor`). They are wrapped at load time so they compile as Vulkan
//! GLSL 450 against a single std140 uniform block.

mod compile;
mod gpu;
mod types;

pub use gpu::{HeadlessRenderer, ShaderProgram};
pub use types::{
    frame_len, Colorspace, FrameUniforms, GraphicsBackend, ParseColorspaceError, RendererError,
    BYTES_PER_PIXEL,
};

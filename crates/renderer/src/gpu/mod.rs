//! Headless `wgpu` implementation of [`GraphicsBackend`](crate::GraphicsBackend).
//!
//! - `context` owns the instance/adapter/device wiring; no surface is ever
//!   created, so the renderer runs without a display server.
//! - `pipeline` compiles wrapped GLSL into render pipelines inside a
//!   validation error scope.
//! - `uniforms` mirrors the injected uniform block.
//! - `readback` copies the target texture into a mappable buffer and strips
//!   the row padding wgpu requires.
//! - `state` glues everything together as [`HeadlessRenderer`].

mod context;
mod pipeline;
mod readback;
mod state;
mod uniforms;

pub use pipeline::ShaderProgram;
pub use state::HeadlessRenderer;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use renderer::{Colorspace, FrameUniforms, GraphicsBackend, RendererError};
use scheduler::FrameStats;
use settings::{ColorspaceSetting, StartupConfig};

use crate::framebuffer::FrameBuffer;
use crate::overlay::Overlay;
use crate::subscribers::{Signaller, SubscriberRegistry};

/// Everything the render loop and the command handlers share.
pub struct RenderState<B: GraphicsBackend> {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub colorspace: Colorspace,
    pub mouse: (i32, i32),
    pub overlay: Overlay,
    pub subscribers: SubscriberRegistry,
    pub stats: FrameStats,
    /// Set by `quit`; the loop exits with this status.
    pub exit: Option<u8>,
    shader_path: PathBuf,
    program: B::Program,
    frame_buffer: FrameBuffer,
    backend: B,
}

pub fn colorspace_from_setting(setting: ColorspaceSetting) -> Colorspace {
    match setting {
        ColorspaceSetting::Rgb => Colorspace::Rgb,
        ColorspaceSetting::Yuv => Colorspace::Yuv,
    }
}

impl<B: GraphicsBackend> RenderState<B> {
    /// Takes ownership of the mapped frame buffer and the backend, then links
    /// the initial program. On failure the backend is shut down before the
    /// error is returned.
    pub fn new(
        config: &StartupConfig,
        frame_buffer: FrameBuffer,
        mut backend: B,
        signaller: Box<dyn Signaller>,
    ) -> Result<Self> {
        let program = match backend.build_program(&config.shader) {
            Ok(program) => program,
            Err(err) => {
                backend.shutdown();
                return Err(err).context("failed to build the initial shader program");
            }
        };
        let colorspace = colorspace_from_setting(config.colorspace);

        Ok(Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            colorspace,
            mouse: (0, 0),
            overlay: Overlay::new(config.message.clone(), colorspace),
            subscribers: SubscriberRegistry::new(signaller),
            stats: FrameStats::new(),
            exit: None,
            shader_path: config.shader.clone(),
            program,
            frame_buffer,
            backend,
        })
    }

    pub fn shader_path(&self) -> &Path {
        &self.shader_path
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.frame_buffer
    }

    pub fn uniforms(&self, time: f32) -> FrameUniforms {
        FrameUniforms {
            resolution: (self.width, self.height),
            time,
            mouse: self.mouse,
            colorspace: self.colorspace,
        }
    }

    /// Builds a program from `path` and swaps it in. The current program
    /// and path are only released once the new one has linked.
    pub fn replace_program(&mut self, path: PathBuf) -> Result<(), RendererError> {
        let program = self.backend.build_program(&path)?;
        let previous = std::mem::replace(&mut self.program, program);
        self.backend.release_program(previous);
        tracing::info!(
            from = %self.shader_path.display(),
            to = %path.display(),
            "shader replaced"
        );
        self.shader_path = path;
        Ok(())
    }

    /// Draws one frame, publishes it to the frame buffer and signals
    /// subscribers.
    pub fn render_frame(&mut self, time: f32) -> Result<()> {
        let uniforms = self.uniforms(time);
        self.backend
            .draw(&self.program, &uniforms)
            .context("failed to draw frame")?;
        self.backend
            .read_pixels(self.frame_buffer.pixels_mut())
            .context("failed to read back frame")?;
        self.subscribers
            .notify_all()
            .context("failed to notify subscribers")?;
        Ok(())
    }

    /// Releases resources in reverse acquisition order: program, device,
    /// then the frame buffer mapping and its descriptor.
    pub fn teardown(self) -> Result<()> {
        let RenderState {
            program,
            mut backend,
            frame_buffer,
            ..
        } = self;
        backend.release_program(program);
        backend.shutdown();
        drop(backend);
        frame_buffer.close()?;
        tracing::info!("render state torn down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{shader_file, test_state};
    use tempfile::TempDir;

    #[test]
    fn initial_state_reflects_config() {
        let dir = TempDir::new().unwrap();
        let (state, log, _) = test_state(&dir);
        assert_eq!(state.fps, 20);
        assert_eq!((state.width, state.height), (720, 576));
        assert_eq!(state.colorspace, Colorspace::Rgb);
        assert_eq!(state.overlay.text(), "");
        assert_eq!(log.entries(), vec![format!("build {}", state.shader_path().display())]);
    }

    #[test]
    fn replace_keeps_old_program_on_failure() {
        let dir = TempDir::new().unwrap();
        let (mut state, log, _) = test_state(&dir);
        let original = state.shader_path().to_path_buf();
        let broken = shader_file(&dir, "broken.frag", "#error nope");

        let err = state.replace_program(broken).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(state.shader_path(), original);
        assert!(!log.entries().iter().any(|entry| entry.starts_with("release")));
    }

    #[test]
    fn replace_releases_previous_program() {
        let dir = TempDir::new().unwrap();
        let (mut state, log, _) = test_state(&dir);
        let original = state.shader_path().to_path_buf();
        let next = shader_file(&dir, "next.frag", "void main() {}");

        state.replace_program(next.clone()).unwrap();
        assert_eq!(state.shader_path(), next);
        assert!(log
            .entries()
            .contains(&format!("release {}", original.display())));
    }

    #[test]
    fn render_frame_fills_frame_buffer() {
        let dir = TempDir::new().unwrap();
        let (mut state, log, _) = test_state(&dir);
        state.mouse = (3, 4);
        state.render_frame(0.5).unwrap();

        assert!(state.frame_buffer().pixels().iter().all(|&b| b == 0x5A));
        let uniforms = log.last_uniforms().unwrap();
        assert_eq!(uniforms.mouse, (3, 4));
        assert_eq!(uniforms.time, 0.5);
    }

    #[test]
    fn teardown_releases_in_reverse_order() {
        let dir = TempDir::new().unwrap();
        let (state, log, _) = test_state(&dir);
        let shader = state.shader_path().display().to_string();
        state.teardown().unwrap();

        let entries = log.entries();
        assert_eq!(
            &entries[entries.len() - 2..],
            &[format!("release {shader}"), "shutdown".to_string()]
        );
    }
}

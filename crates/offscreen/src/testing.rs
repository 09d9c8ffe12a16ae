//! Test doubles for the graphics backend and process signalling.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use renderer::{FrameUniforms, GraphicsBackend, RendererError};
use settings::StartupConfig;
use tempfile::TempDir;

use crate::framebuffer::FrameBuffer;
use crate::state::RenderState;
use crate::subscribers::Signaller;

pub const FILL_BYTE: u8 = 0x5A;

#[derive(Default)]
struct BackendLog {
    entries: Vec<String>,
    last_uniforms: Option<FrameUniforms>,
    frames: usize,
}

/// Shared view of what a [`FakeBackend`] was asked to do.
#[derive(Clone, Default)]
pub struct FakeLog(Rc<RefCell<BackendLog>>);

impl FakeLog {
    /// Lifecycle calls in order; draws are only counted.
    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().entries.clone()
    }

    pub fn last_uniforms(&self) -> Option<FrameUniforms> {
        self.0.borrow().last_uniforms
    }

    pub fn frames(&self) -> usize {
        self.0.borrow().frames
    }
}

/// Programs are the shader paths. Sources containing `#error` fail to build.
pub struct FakeBackend {
    log: FakeLog,
}

impl FakeBackend {
    pub fn new() -> (Self, FakeLog) {
        let log = FakeLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl GraphicsBackend for FakeBackend {
    type Program = PathBuf;

    fn build_program(&mut self, fragment: &Path) -> Result<PathBuf, RendererError> {
        let source = std::fs::read_to_string(fragment).map_err(|source| RendererError::ShaderIo {
            path: fragment.to_path_buf(),
            source,
        })?;
        if source.contains("#error") {
            return Err(RendererError::Compile {
                path: fragment.to_path_buf(),
                message: "0:1: '#error' : nope".into(),
            });
        }
        self.log
            .0
            .borrow_mut()
            .entries
            .push(format!("build {}", fragment.display()));
        Ok(fragment.to_path_buf())
    }

    fn draw(&mut self, _program: &PathBuf, uniforms: &FrameUniforms) -> Result<(), RendererError> {
        let mut log = self.log.0.borrow_mut();
        log.last_uniforms = Some(*uniforms);
        log.frames += 1;
        Ok(())
    }

    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), RendererError> {
        dst.fill(FILL_BYTE);
        Ok(())
    }

    fn release_program(&mut self, program: PathBuf) {
        self.log
            .0
            .borrow_mut()
            .entries
            .push(format!("release {}", program.display()));
    }

    fn shutdown(&mut self) {
        self.log.0.borrow_mut().entries.push("shutdown".into());
    }
}

#[derive(Default)]
struct Signals {
    alive: BTreeSet<libc::pid_t>,
    notified: Vec<libc::pid_t>,
    fail_delivery: bool,
}

/// In-memory process table.
#[derive(Clone, Default)]
pub struct FakeSignaller(Rc<RefCell<Signals>>);

impl FakeSignaller {
    pub fn with_alive(pids: &[libc::pid_t]) -> Self {
        let signaller = Self::default();
        signaller.0.borrow_mut().alive.extend(pids.iter().copied());
        signaller
    }

    pub fn spawn(&self, pid: libc::pid_t) {
        self.0.borrow_mut().alive.insert(pid);
    }

    pub fn kill(&self, pid: libc::pid_t) {
        self.0.borrow_mut().alive.remove(&pid);
    }

    pub fn fail_delivery(&self) {
        self.0.borrow_mut().fail_delivery = true;
    }

    pub fn notified(&self) -> Vec<libc::pid_t> {
        self.0.borrow().notified.clone()
    }
}

impl Signaller for FakeSignaller {
    fn probe(&self, pid: libc::pid_t) -> io::Result<bool> {
        Ok(self.0.borrow().alive.contains(&pid))
    }

    fn notify(&self, pid: libc::pid_t) -> io::Result<()> {
        let mut signals = self.0.borrow_mut();
        if signals.fail_delivery {
            return Err(io::Error::from_raw_os_error(libc::EPERM));
        }
        signals.notified.push(pid);
        Ok(())
    }
}

pub fn shader_file(dir: &TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, source).unwrap();
    path
}

/// A 720x576 state at 20 fps with a valid shader, backed by fakes.
pub fn test_state(dir: &TempDir) -> (RenderState<FakeBackend>, FakeLog, FakeSignaller) {
    let config = StartupConfig {
        output: dir.path().join("frame"),
        shader: shader_file(dir, "plasma.frag", "void main() { gl_FragColor = vec4(1.0); }"),
        ..StartupConfig::default()
    };
    config.validate().unwrap();

    let frame_buffer = FrameBuffer::create(&config.output, config.width, config.height).unwrap();
    let (backend, log) = FakeBackend::new();
    let signaller = FakeSignaller::with_alive(&[std::process::id() as libc::pid_t]);
    let state = RenderState::new(&config, frame_buffer, backend, Box::new(signaller.clone())).unwrap();
    (state, log, signaller)
}

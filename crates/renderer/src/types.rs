use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Every frame is stored as tightly packed RGBA8.
pub const BYTES_PER_PIXEL: usize = 4;

/// Byte length of one `width` x `height` frame without any padding.
pub fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Output encoding applied by the generated fragment epilogue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Colorspace {
    #[default]
    Rgb,
    Yuv,
}

impl Colorspace {
    pub fn as_str(self) -> &'static str {
        match self {
            Colorspace::Rgb => "rgb",
            Colorspace::Yuv => "yuv",
        }
    }

    /// Value of the `_colorspace` uniform.
    pub fn flag(self) -> i32 {
        match self {
            Colorspace::Rgb => 0,
            Colorspace::Yuv => 1,
        }
    }
}

impl fmt::Display for Colorspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown colorspace '{0}' (expected rgb or yuv)")]
pub struct ParseColorspaceError(pub String);

impl FromStr for Colorspace {
    type Err = ParseColorspaceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rgb" => Ok(Colorspace::Rgb),
            "yuv" => Ok(Colorspace::Yuv),
            other => Err(ParseColorspaceError(other.to_string())),
        }
    }
}

/// Per-frame inputs handed to the fragment shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub resolution: (u32, u32),
    /// Seconds since the first frame.
    pub time: f32,
    pub mouse: (i32, i32),
    pub colorspace: Colorspace,
}

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("failed to read shader at {path}: {source}")]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("shader {path} failed to build: {message}")]
    Compile { path: PathBuf, message: String },
    #[error("GPU device error: {0}")]
    Device(String),
    #[error("frame readback failed: {0}")]
    Readback(String),
    #[error("destination holds {actual} bytes but a frame needs {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

impl RendererError {
    /// Whether the caller can keep rendering with its previous program.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RendererError::ShaderIo { .. } | RendererError::Compile { .. }
        )
    }
}

/// What the render loop needs from a graphics implementation.
///
/// Programs are owned by the caller and handed back for release, so a
/// replacement can be built and validated while the old one keeps rendering.
pub trait GraphicsBackend {
    type Program;

    /// Compiles the fixed vertex stage with the fragment source at `fragment`.
    /// Failures leave every existing program untouched.
    fn build_program(&mut self, fragment: &Path) -> Result<Self::Program, RendererError>;

    fn draw(&mut self, program: &Self::Program, uniforms: &FrameUniforms)
        -> Result<(), RendererError>;

    /// Copies the last drawn frame into `dst`, top row first.
    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), RendererError>;

    fn release_program(&mut self, program: Self::Program);

    /// Releases device resources. No other method is called afterwards.
    fn shutdown(&mut self);
}

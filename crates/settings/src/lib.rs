use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_WIDTH: u32 = 720;
pub const DEFAULT_HEIGHT: u32 = 576;
pub const DEFAULT_FPS: u32 = 20;
pub const DEFAULT_OUTPUT: &str = "/tmp/frame";
pub const DEFAULT_SHADER: &str = "shaders/plasma.frag";

/// Largest accepted frame width or height, in pixels.
pub const MAX_DIMENSION: u32 = 4095;
pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 99;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorspaceSetting {
    #[default]
    Rgb,
    Yuv,
}

/// Fully resolved startup parameters for the renderer process.
#[derive(Debug, Clone, PartialEq)]
pub struct StartupConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub output: PathBuf,
    pub shader: PathBuf,
    pub colorspace: ColorspaceSetting,
    pub message: String,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            output: PathBuf::from(DEFAULT_OUTPUT),
            shader: PathBuf::from(DEFAULT_SHADER),
            colorspace: ColorspaceSetting::default(),
            message: String::new(),
        }
    }
}

impl StartupConfig {
    /// Checks every range constraint and that the initial shader is a readable file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_dimension("width", self.width)?;
        check_dimension("height", self.height)?;
        check_fps(i64::from(self.fps))?;

        if self.output.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output path must not be empty".into()));
        }

        let metadata = fs::metadata(&self.shader).map_err(|err| {
            ConfigError::Invalid(format!(
                "shader {} is not readable: {err}",
                self.shader.display()
            ))
        })?;
        if !metadata.is_file() {
            return Err(ConfigError::Invalid(format!(
                "shader {} is not a regular file",
                self.shader.display()
            )));
        }

        Ok(())
    }
}

/// Partial configuration as read from a TOML file; unset keys keep the
/// value of the layer below.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub output: Option<PathBuf>,
    pub shader: Option<PathBuf>,
    pub colorspace: Option<ColorspaceSetting>,
    pub message: Option<String>,
}

impl FileConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Overlays the keys present in this file onto `base`.
    pub fn apply(self, base: StartupConfig) -> StartupConfig {
        StartupConfig {
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
            fps: self.fps.unwrap_or(base.fps),
            output: self.output.unwrap_or(base.output),
            shader: self.shader.unwrap_or(base.shader),
            colorspace: self.colorspace.unwrap_or(base.colorspace),
            message: self.message.unwrap_or(base.message),
        }
    }
}

pub fn check_dimension(name: &str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 || value > MAX_DIMENSION {
        return Err(ConfigError::Invalid(format!(
            "{name} ({value}) out of range [1-{MAX_DIMENSION}]"
        )));
    }
    Ok(value)
}

/// Accepts a signed value so callers can pass unvalidated user input.
pub fn check_fps(value: i64) -> Result<u32, ConfigError> {
    if value < i64::from(MIN_FPS) || value > i64::from(MAX_FPS) {
        return Err(ConfigError::Invalid(format!(
            "framerate ({value}) out of range [{MIN_FPS}-{MAX_FPS}]"
        )));
    }
    Ok(value as u32)
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use settings::{ColorspaceSetting, StartupConfig};

#[derive(Parser, Debug)]
#[command(
    name = "offscreen",
    author,
    version,
    about = "Headless GLSL renderer that publishes frames through a memory-mapped file"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Startup parameters. Each flag overrides the configuration file.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Configuration file (defaults to `<config dir>/offscreen/config.toml` when present).
    #[arg(short = 'c', long, env = "OFFSCREEN_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Frame width in pixels (1-4095).
    #[arg(short = 'w', long, env = "OFFSCREEN_WIDTH", value_name = "PIXELS")]
    pub width: Option<u32>,

    /// Frame height in pixels (1-4095).
    #[arg(short = 'H', long, env = "OFFSCREEN_HEIGHT", value_name = "PIXELS")]
    pub height: Option<u32>,

    /// Initial frame rate (1-99).
    #[arg(short = 'f', long, env = "OFFSCREEN_FPS", value_name = "FPS")]
    pub fps: Option<u32>,

    /// Frame buffer file shared with readers.
    #[arg(short = 'o', long, env = "OFFSCREEN_OUTPUT", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Initial fragment shader.
    #[arg(short = 's', long, env = "OFFSCREEN_SHADER", value_name = "PATH")]
    pub shader: Option<PathBuf>,

    /// Output colorspace: `rgb` or `yuv`.
    #[arg(
        long,
        env = "OFFSCREEN_COLORSPACE",
        value_name = "MODE",
        value_parser = parse_colorspace
    )]
    pub colorspace: Option<ColorspaceSetting>,

    /// Initial overlay text.
    #[arg(long, env = "OFFSCREEN_MESSAGE", value_name = "TEXT")]
    pub message: Option<String>,
}

impl RunArgs {
    /// Overlays the flags that were given onto `base`.
    pub fn apply(&self, base: StartupConfig) -> StartupConfig {
        StartupConfig {
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
            fps: self.fps.unwrap_or(base.fps),
            output: self.output.clone().unwrap_or(base.output),
            shader: self.shader.clone().unwrap_or(base.shader),
            colorspace: self.colorspace.unwrap_or(base.colorspace),
            message: self.message.clone().unwrap_or(base.message),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Save the current contents of a frame buffer file as PNG.
    Grab(GrabArgs),
}

#[derive(Parser, Debug)]
pub struct GrabArgs {
    /// Frame buffer file written by a running renderer.
    #[arg(short = 'i', long, value_name = "PATH")]
    pub input: PathBuf,

    /// PNG file to write.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: PathBuf,

    #[arg(short = 'w', long, value_name = "PIXELS")]
    pub width: u32,

    #[arg(short = 'H', long, value_name = "PIXELS")]
    pub height: u32,

    /// Print our pid and wait up to 10 seconds for a frame notification first.
    #[arg(long)]
    pub wait: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_colorspace(value: &str) -> Result<ColorspaceSetting, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("colorspace must not be empty".to_string());
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "rgb" => Ok(ColorspaceSetting::Rgb),
        "yuv" => Ok(ColorspaceSetting::Yuv),
        other => Err(format!("unknown colorspace '{other}'; expected rgb or yuv")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_base_values() {
        let cli = Cli::try_parse_from([
            "offscreen",
            "--width",
            "320",
            "-f",
            "30",
            "--colorspace",
            "YUV",
            "--message",
            "hello world",
        ])
        .unwrap();
        let config = cli.run.apply(StartupConfig::default());
        assert_eq!(config.width, 320);
        assert_eq!(config.height, settings::DEFAULT_HEIGHT);
        assert_eq!(config.fps, 30);
        assert_eq!(config.colorspace, ColorspaceSetting::Yuv);
        assert_eq!(config.message, "hello world");
    }

    #[test]
    fn grab_requires_dimensions() {
        assert!(Cli::try_parse_from(["offscreen", "grab", "-i", "in", "-o", "out.png"]).is_err());
        let cli = Cli::try_parse_from([
            "offscreen", "grab", "-i", "in", "-o", "out.png", "-w", "4", "-H", "2", "--wait",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Grab(args)) => {
                assert_eq!((args.width, args.height), (4, 2));
                assert!(args.wait);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn colorspace_parser_rejects_unknown_values() {
        assert!(parse_colorspace("").is_err());
        assert!(parse_colorspace("hsv").is_err());
        assert_eq!(parse_colorspace(" rgb ").unwrap(), ColorspaceSetting::Rgb);
    }
}

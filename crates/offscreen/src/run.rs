use std::fs::File;
use std::io;
use std::os::fd::AsFd;
use std::process::ExitCode;

use anyhow::{Context, Result};
use renderer::HeadlessRenderer;
use settings::{FileConfig, StartupConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, RunArgs};
use crate::commands::Dispatcher;
use crate::control::ControlChannel;
use crate::framebuffer::FrameBuffer;
use crate::grab;
use crate::paths::AppPaths;
use crate::render_loop::RenderLoop;
use crate::signals;
use crate::state::RenderState;
use crate::subscribers::ProcessSignaller;

pub fn run(cli: Cli) -> Result<ExitCode> {
    initialise_tracing();

    match cli.command {
        Some(Command::Grab(args)) => {
            grab::run(&args)?;
            Ok(ExitCode::SUCCESS)
        }
        None => run_renderer(&cli.run),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run_renderer(args: &RunArgs) -> Result<ExitCode> {
    let config = resolve_config(args)?;
    config.validate().context("invalid startup parameters")?;
    tracing::info!(
        width = config.width,
        height = config.height,
        fps = config.fps,
        output = %config.output.display(),
        shader = %config.shader.display(),
        "starting offscreen renderer"
    );

    let shutdown =
        signals::install_shutdown_flag().context("failed to install termination handlers")?;
    let frame_buffer = FrameBuffer::create(&config.output, config.width, config.height)?;
    let backend = HeadlessRenderer::new(config.width, config.height)
        .context("failed to initialise the GPU")?;
    let state = RenderState::new(&config, frame_buffer, backend, Box::new(ProcessSignaller))?;

    let control = ControlChannel::new(stdin_descriptor()?);
    let outcome = RenderLoop::new(
        state,
        Dispatcher::standard(),
        control,
        io::stdout().lock(),
        shutdown,
    )
    .run()?;

    Ok(ExitCode::from(outcome.status))
}

/// Defaults, then the configuration file, then flags and their env vars.
fn resolve_config(args: &RunArgs) -> Result<StartupConfig> {
    let mut config = StartupConfig::default();

    let file = match &args.config {
        Some(path) => Some(path.clone()),
        None => match AppPaths::discover() {
            Ok(paths) => {
                tracing::debug!(dir = %paths.config_dir().display(), "user config directory");
                Some(paths.config_file()).filter(|path| path.is_file())
            }
            Err(err) => {
                tracing::debug!(%err, "no user config directory");
                None
            }
        },
    };
    if let Some(path) = file {
        tracing::debug!(path = %path.display(), "loading configuration file");
        config = FileConfig::load(&path)?.apply(config);
    }

    Ok(args.apply(config))
}

/// An unbuffered handle on stdin, so `poll(2)` sees every pending byte.
fn stdin_descriptor() -> Result<File> {
    let fd = io::stdin()
        .as_fd()
        .try_clone_to_owned()
        .context("failed to duplicate stdin")?;
    Ok(File::from(fd))
}

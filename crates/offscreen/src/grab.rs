//! `offscreen grab`: snapshot a frame buffer file as PNG.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbaImage};
use settings::check_dimension;

use crate::cli::GrabArgs;
use crate::framebuffer::MappedFrame;
use crate::signals::FRAME_READY;

/// Longest wait for a frame notification before grabbing anyway.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn run(args: &GrabArgs) -> Result<()> {
    let width = check_dimension("width", args.width)?;
    let height = check_dimension("height", args.height)?;
    let frame = MappedFrame::open(&args.input, width, height)?;
    let (width, height) = frame.dimensions();

    if args.wait {
        if wait_for_frame(WAIT_TIMEOUT)? {
            tracing::info!("frame notification received");
        } else {
            tracing::warn!(
                timeout = ?WAIT_TIMEOUT,
                "no frame notification; grabbing current contents"
            );
        }
    }

    let image = RgbaImage::from_raw(width, height, frame.pixels().to_vec())
        .ok_or_else(|| anyhow!("frame buffer does not hold a {width}x{height} RGBA image"))?;
    image
        .save_with_format(&args.output, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        width,
        height,
        "saved frame"
    );
    Ok(())
}

/// Prints our pid on stdout so it can be registered with `kill add`, then
/// waits for the frame-ready signal. Returns whether it arrived.
fn wait_for_frame(timeout: Duration) -> Result<bool> {
    let received = Arc::new(AtomicBool::new(false));
    let registration = signal_hook::flag::register(FRAME_READY, Arc::clone(&received))
        .context("failed to install the frame-ready handler")?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", std::process::id())?;
    stdout.flush()?;
    drop(stdout);

    let deadline = Instant::now() + timeout;
    while !received.load(Ordering::SeqCst) && Instant::now() < deadline {
        thread::sleep(POLL_INTERVAL);
    }
    signal_hook::low_level::unregister(registration);
    Ok(received.load(Ordering::SeqCst))
}

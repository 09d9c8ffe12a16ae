//! The frame loop: render, publish, then spend whatever is left of the
//! frame period answering commands.
//!
//! ```text
//!   ┌─▶ render_frame ─▶ stats.record ─▶ deadline = now + remaining_budget
//!   │                                          │
//!   │        ┌─────── wait(deadline - now) ◀───┘
//!   │        ├─ Ready       ─▶ dispatch each line, reply, wait again
//!   │        ├─ Interrupted ─▶ re-check shutdown, wait again
//!   └────────┴─ TimedOut
//! ```
//!
//! Everything runs on one thread; the only suspension points are the
//! control-channel wait and the backend's own blocking calls.

use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use renderer::GraphicsBackend;
use scheduler::{next_deadline, FrameClock};

use crate::commands::Dispatcher;
use crate::control::{ControlChannel, Readiness};
use crate::state::RenderState;

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub status: u8,
    pub frames: u64,
}

pub struct RenderLoop<B: GraphicsBackend, R, W> {
    state: RenderState<B>,
    dispatcher: Dispatcher<B>,
    control: ControlChannel<R>,
    responses: W,
    shutdown: Arc<AtomicBool>,
    clock: FrameClock,
}

impl<B, R, W> RenderLoop<B, R, W>
where
    B: GraphicsBackend,
    R: Read + AsRawFd,
    W: Write,
{
    pub fn new(
        state: RenderState<B>,
        dispatcher: Dispatcher<B>,
        control: ControlChannel<R>,
        responses: W,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            state,
            dispatcher,
            control,
            responses,
            shutdown,
            clock: FrameClock::new(),
        }
    }

    /// Runs until `quit`, a termination signal, or a fatal error. The render
    /// state is torn down on every path.
    pub fn run(mut self) -> Result<Outcome> {
        let frame_buffer = self.state.frame_buffer();
        tracing::info!(
            fps = self.state.fps,
            output = %frame_buffer.path().display(),
            bytes = frame_buffer.mapped_bytes(),
            "render loop started"
        );
        tracing::debug!(
            commands = ?self.dispatcher.names().collect::<Vec<_>>(),
            "control channel ready"
        );
        let result = self.drive();
        let frames = self.state.stats.frames();
        let teardown = self.state.teardown();

        match result {
            Ok(status) => {
                teardown?;
                tracing::info!(status, frames, "render loop finished");
                Ok(Outcome { status, frames })
            }
            Err(err) => {
                if let Err(teardown_err) = teardown {
                    tracing::warn!(error = %format!("{teardown_err:#}"), "teardown after failure also failed");
                }
                Err(err)
            }
        }
    }

    fn drive(&mut self) -> Result<u8> {
        loop {
            if let Some(status) = self.exit_status() {
                return Ok(status);
            }

            let started = Instant::now();
            let time = self.clock.advance(started);
            self.state.render_frame(time)?;
            let spent = started.elapsed();
            let spent_ms = u32::try_from(spent.as_millis()).unwrap_or(u32::MAX);
            self.state.stats.record(spent_ms);
            tracing::trace!(frame = self.state.stats.frames(), spent_ms, time, "frame published");

            let deadline = next_deadline(Instant::now(), self.state.fps, spent);
            if let Some(status) = self.pump_commands(deadline)? {
                return Ok(status);
            }
        }
    }

    /// SIGINT/SIGTERM win over a pending `quit` and exit cleanly.
    fn exit_status(&self) -> Option<u8> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Some(0);
        }
        self.state.exit
    }

    fn pump_commands(&mut self, deadline: Instant) -> Result<Option<u8>> {
        loop {
            if let Some(status) = self.exit_status() {
                return Ok(Some(status));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            match self.control.wait(deadline - now)? {
                Readiness::TimedOut => return Ok(None),
                Readiness::Interrupted => continue,
                Readiness::Ready => {
                    for line in self.control.read_lines()? {
                        self.handle_line(&line)?;
                        if let Some(status) = self.exit_status() {
                            return Ok(Some(status));
                        }
                    }
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        tracing::debug!(command = line, "received command");

        let reply = match self.dispatcher.dispatch(&mut self.state, line) {
            Ok(payload) => payload,
            Err(err) if err.is_fatal() => {
                return Err(err).with_context(|| format!("command '{line}' failed"));
            }
            Err(err) => {
                tracing::debug!(command = line, %err, "command rejected");
                format!("error: {err}")
            }
        };

        writeln!(self.responses, "{reply}").context("failed to write command response")?;
        self.responses
            .flush()
            .context("failed to flush command response")?;
        Ok(())
    }
}

//! Process signal plumbing: the shutdown flag, liveness probes and the
//! frame-ready notification sent to subscribers.

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGUSR1};

/// Signal delivered to subscribers after each frame. Receivers must install
/// a handler for it, even a no-op one, or the default action kills them.
pub const FRAME_READY: libc::c_int = SIGUSR1;

/// Returns a flag that flips to `true` on SIGINT or SIGTERM.
pub fn install_shutdown_flag() -> io::Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&flag))?;
    }
    Ok(flag)
}

/// Zero-effect existence check: `Ok(false)` when no such process exists.
pub fn process_exists(pid: libc::pid_t) -> io::Result<bool> {
    // SAFETY: signal 0 performs error checking only.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => Ok(false),
        _ => Err(err),
    }
}

pub fn send_frame_ready(pid: libc::pid_t) -> io::Result<()> {
    // SAFETY: plain kill(2); the pid was validated as positive by the caller.
    if unsafe { libc::kill(pid, FRAME_READY) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

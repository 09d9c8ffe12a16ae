//! Line-oriented control channel on a raw descriptor.
//!
//! Reads go straight to the descriptor after `poll(2)` reports it readable,
//! so nothing sits in a userspace buffer the poll cannot see.

use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Longest accepted command line, newline included.
pub const LINE_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("control channel closed")]
    Closed,
    #[error("command line exceeds {LINE_CAPACITY} bytes")]
    LineTooLong,
    #[error("control channel I/O failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
    /// A signal arrived while waiting.
    Interrupted,
}

pub struct ControlChannel<R> {
    reader: R,
    buffer: Box<[u8; LINE_CAPACITY]>,
    filled: usize,
}

impl<R: Read + AsRawFd> ControlChannel<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Box::new([0; LINE_CAPACITY]),
            filled: 0,
        }
    }

    /// Blocks until input is readable, `timeout` passes, or a signal arrives.
    pub fn wait(&self, timeout: Duration) -> Result<Readiness, ControlError> {
        let mut descriptor = libc::pollfd {
            fd: self.reader.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        // SAFETY: one valid pollfd, and the count says so.
        let ready = unsafe { libc::poll(&mut descriptor, 1, millis) };
        match ready {
            0 => Ok(Readiness::TimedOut),
            n if n > 0 => Ok(Readiness::Ready),
            _ => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    Ok(Readiness::Interrupted)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    /// Performs one read and returns every line it completed.
    ///
    /// A partial line stays buffered for the next call. End of input and a
    /// full buffer without a newline are both errors.
    pub fn read_lines(&mut self) -> Result<Vec<String>, ControlError> {
        let read = match self.reader.read(&mut self.buffer[self.filled..]) {
            Ok(0) => return Err(ControlError::Closed),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        self.filled += read;

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..self.filled].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let raw = &self.buffer[start..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            lines.push(String::from_utf8_lossy(raw).into_owned());
            start = end + 1;
        }

        self.buffer.copy_within(start..self.filled, 0);
        self.filled -= start;
        if self.filled == LINE_CAPACITY {
            return Err(ControlError::LineTooLong);
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    fn channel() -> (ControlChannel<UnixStream>, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        (ControlChannel::new(ours), theirs)
    }

    #[test]
    fn wait_times_out_without_input() {
        let (control, _peer) = channel();
        assert_eq!(
            control.wait(Duration::from_millis(10)).unwrap(),
            Readiness::TimedOut
        );
    }

    #[test]
    fn signal_during_wait_reports_interruption() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let (control, _peer) = channel();
        signal_hook::flag::register(libc::SIGUSR2, Arc::new(AtomicBool::new(false))).unwrap();
        // SAFETY: pthread_self has no preconditions.
        let waiter = unsafe { libc::pthread_self() };
        let interrupter = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            // SAFETY: the waiting thread outlives this one; SIGUSR2 has a handler.
            unsafe { libc::pthread_kill(waiter, libc::SIGUSR2) };
        });

        let readiness = control.wait(Duration::from_secs(5)).unwrap();
        interrupter.join().unwrap();
        assert_eq!(readiness, Readiness::Interrupted);
    }

    #[test]
    fn splits_complete_lines_and_keeps_partial() {
        let (mut control, mut peer) = channel();
        peer.write_all(b"fps 30\r\nmouse 1 2\nsta").unwrap();
        assert_eq!(control.wait(Duration::from_secs(1)).unwrap(), Readiness::Ready);
        assert_eq!(control.read_lines().unwrap(), vec!["fps 30", "mouse 1 2"]);

        peer.write_all(b"ts\n").unwrap();
        assert_eq!(control.read_lines().unwrap(), vec!["stats"]);
    }

    #[test]
    fn closed_peer_is_an_error() {
        let (mut control, peer) = channel();
        drop(peer);
        assert_eq!(control.wait(Duration::from_secs(1)).unwrap(), Readiness::Ready);
        assert!(matches!(control.read_lines(), Err(ControlError::Closed)));
    }

    #[test]
    fn line_may_fill_buffer_exactly() {
        let (mut control, mut peer) = channel();
        let mut line = vec![b'x'; LINE_CAPACITY - 1];
        line.push(b'\n');
        peer.write_all(&line).unwrap();

        let mut lines = Vec::new();
        while lines.is_empty() {
            lines = control.read_lines().unwrap();
        }
        assert_eq!(lines[0].len(), LINE_CAPACITY - 1);
    }

    #[test]
    fn oversized_line_is_fatal() {
        let (mut control, mut peer) = channel();
        peer.write_all(&[b'x'; LINE_CAPACITY + 10]).unwrap();

        let err = loop {
            match control.read_lines() {
                Ok(lines) => assert!(lines.is_empty()),
                Err(err) => break err,
            }
        };
        assert!(matches!(err, ControlError::LineTooLong));
    }
}

use std::io;

use crate::signals;

/// Capacity of the subscriber table.
pub const MAX_SUBSCRIBERS: usize = 4;

/// How the registry reaches other processes.
pub trait Signaller {
    /// `Ok(false)` when the process no longer exists.
    fn probe(&self, pid: libc::pid_t) -> io::Result<bool>;
    fn notify(&self, pid: libc::pid_t) -> io::Result<()>;
}

/// Real processes, via `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessSignaller;

impl Signaller for ProcessSignaller {
    fn probe(&self, pid: libc::pid_t) -> io::Result<bool> {
        signals::process_exists(pid)
    }

    fn notify(&self, pid: libc::pid_t) -> io::Result<()> {
        signals::send_frame_ready(pid)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("pid must be a positive integer, got '{0}'")]
    InvalidPid(String),
    #[error("subscriber table is full ({MAX_SUBSCRIBERS} entries)")]
    Full,
    #[error("pid {0} is already subscribed")]
    Duplicate(libc::pid_t),
    #[error("no process with pid {0}")]
    NoSuchProcess(libc::pid_t),
    #[error("cannot probe pid {pid}: {source}")]
    Probe {
        pid: libc::pid_t,
        #[source]
        source: io::Error,
    },
    #[error("failed to notify pid {pid}: {source}")]
    Delivery {
        pid: libc::pid_t,
        #[source]
        source: io::Error,
    },
}

impl SubscriberError {
    /// Only a failure to reach a registered subscriber ends the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SubscriberError::Delivery { .. })
    }
}

pub fn parse_pid(value: &str) -> Result<libc::pid_t, SubscriberError> {
    match value.parse::<libc::pid_t>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(SubscriberError::InvalidPid(value.to_string())),
    }
}

/// Fixed table of processes to signal after every frame.
pub struct SubscriberRegistry {
    slots: [Option<libc::pid_t>; MAX_SUBSCRIBERS],
    signaller: Box<dyn Signaller>,
}

impl SubscriberRegistry {
    pub fn new(signaller: Box<dyn Signaller>) -> Self {
        Self {
            slots: [None; MAX_SUBSCRIBERS],
            signaller,
        }
    }

    /// Stores `pid` in the first free slot once it is known to be alive.
    pub fn add(&mut self, pid: libc::pid_t) -> Result<(), SubscriberError> {
        if self.contains(pid) {
            return Err(SubscriberError::Duplicate(pid));
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(SubscriberError::Full)?;
        match self.signaller.probe(pid) {
            Ok(true) => {}
            Ok(false) => return Err(SubscriberError::NoSuchProcess(pid)),
            Err(source) => return Err(SubscriberError::Probe { pid, source }),
        }
        self.slots[slot] = Some(pid);
        tracing::debug!(pid, slot, "subscriber added");
        Ok(())
    }

    /// Idempotent: removing an absent pid is not an error.
    pub fn remove(&mut self, pid: libc::pid_t) {
        for slot in self.slots.iter_mut().filter(|slot| **slot == Some(pid)) {
            *slot = None;
            tracing::debug!(pid, "subscriber removed");
        }
    }

    pub fn contains(&self, pid: libc::pid_t) -> bool {
        self.slots.contains(&Some(pid))
    }

    pub fn pids(&self) -> impl Iterator<Item = libc::pid_t> + '_ {
        self.slots.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.pids().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signals every live subscriber and drops the ones that have exited.
    /// Returns how many were notified.
    pub fn notify_all(&mut self) -> Result<usize, SubscriberError> {
        if self.is_empty() {
            return Ok(0);
        }
        let mut notified = 0;
        for slot in self.slots.iter_mut() {
            let Some(pid) = *slot else { continue };
            let alive = self
                .signaller
                .probe(pid)
                .map_err(|source| SubscriberError::Delivery { pid, source })?;
            if !alive {
                tracing::info!(pid, "subscriber exited; dropping it");
                *slot = None;
                continue;
            }
            match self.signaller.notify(pid) {
                Ok(()) => notified += 1,
                Err(err) if err.raw_os_error() == Some(libc::ESRCH) => {
                    tracing::info!(pid, "subscriber exited; dropping it");
                    *slot = None;
                }
                Err(source) => return Err(SubscriberError::Delivery { pid, source }),
            }
        }
        Ok(notified)
    }
}

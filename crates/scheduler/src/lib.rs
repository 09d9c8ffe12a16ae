//! Frame pacing primitives shared by the render loop.
//!
//! Nothing in here touches the GPU or the control channel; the loop feeds
//! measured `Instant`s in and gets deadlines, shader time, and rolling
//! statistics out.

use std::time::{Duration, Instant};

/// Number of per-frame durations kept for the rolling average.
pub const STATS_WINDOW: usize = 16;

/// Command processing always gets at least this much time between frames.
pub const MIN_BUDGET: Duration = Duration::from_millis(1);

/// Nominal period between frames, truncated to whole milliseconds.
pub fn frame_period(fps: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(fps.max(1)))
}

/// Time left in the current period after spending `spent` on a frame.
///
/// Never returns less than [`MIN_BUDGET`], so an overrunning frame still
/// leaves a window for commands and the loop never spins flat out.
pub fn remaining_budget(fps: u32, spent: Duration) -> Duration {
    let period_ms = frame_period(fps).as_millis() as i64;
    let spent_ms = i64::try_from(spent.as_millis()).unwrap_or(i64::MAX);
    let remaining = period_ms.saturating_sub(spent_ms);
    if remaining <= 0 {
        MIN_BUDGET
    } else {
        Duration::from_millis(remaining as u64)
    }
}

/// Deadline for the next frame, measured from the end of the current one.
pub fn next_deadline(tick_end: Instant, fps: u32, spent: Duration) -> Instant {
    tick_end + remaining_budget(fps, spent)
}

/// Accumulates real wall-clock time between successive frames.
///
/// The shader clock advances by what actually elapsed, command handling
/// included, so animation speed stays correct when pacing is irregular.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameClock {
    elapsed: Duration,
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances to `now` and returns the accumulated time in seconds.
    /// The first call starts the clock at zero.
    pub fn advance(&mut self, now: Instant) -> f32 {
        if let Some(last) = self.last {
            self.elapsed += now.saturating_duration_since(last);
        }
        self.last = Some(now);
        self.elapsed.as_secs_f32()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Fixed ring of recent frame durations plus the running frame count.
#[derive(Debug, Clone)]
pub struct FrameStats {
    durations: [u32; STATS_WINDOW],
    frames: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            durations: [0; STATS_WINDOW],
            frames: 0,
        }
    }
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `ms` in slot `frames % STATS_WINDOW` and counts the frame.
    pub fn record(&mut self, ms: u32) {
        let slot = (self.frames % STATS_WINDOW as u64) as usize;
        self.durations[slot] = ms;
        self.frames = self.frames.saturating_add(1);
    }

    /// Integer mean over every slot, including ones never written.
    ///
    /// During the first `STATS_WINDOW` frames the unwritten zero slots pull
    /// the value down; callers are expected to live with that.
    pub fn average(&self) -> u32 {
        let sum: u64 = self.durations.iter().map(|&ms| u64::from(ms)).sum();
        (sum / STATS_WINDOW as u64) as u32
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn samples(&self) -> &[u32; STATS_WINDOW] {
        &self.durations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_truncates_to_milliseconds() {
        assert_eq!(frame_period(20), Duration::from_millis(50));
        assert_eq!(frame_period(30), Duration::from_millis(33));
        assert_eq!(frame_period(99), Duration::from_millis(10));
        assert_eq!(frame_period(1), Duration::from_millis(1000));
    }

    #[test]
    fn budget_subtracts_time_spent() {
        let budget = remaining_budget(20, Duration::from_millis(12));
        assert_eq!(budget, Duration::from_millis(38));
    }

    #[test]
    fn overrunning_frame_clamps_to_minimum() {
        assert_eq!(remaining_budget(20, Duration::from_millis(50)), MIN_BUDGET);
        assert_eq!(remaining_budget(20, Duration::from_millis(400)), MIN_BUDGET);
        assert_eq!(remaining_budget(99, Duration::from_secs(3600)), MIN_BUDGET);
    }

    #[test]
    fn deadline_is_relative_to_tick_end() {
        let end = Instant::now();
        let deadline = next_deadline(end, 10, Duration::from_millis(40));
        assert_eq!(deadline.duration_since(end), Duration::from_millis(60));
    }

    #[test]
    fn clock_accumulates_measured_deltas() {
        let start = Instant::now();
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(start), 0.0);
        clock.advance(start + Duration::from_millis(50));
        let seconds = clock.advance(start + Duration::from_millis(180));
        assert!((seconds - 0.18).abs() < 1e-4);
        assert_eq!(clock.elapsed(), Duration::from_millis(180));
    }

    #[test]
    fn clock_ignores_backwards_instants() {
        let start = Instant::now();
        let mut clock = FrameClock::new();
        clock.advance(start + Duration::from_millis(100));
        clock.advance(start);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn average_spans_full_window() {
        let mut stats = FrameStats::new();
        let values: Vec<u32> = (0..STATS_WINDOW as u32).map(|v| v * 3 + 1).collect();
        for &value in &values {
            stats.record(value);
        }
        let expected = values.iter().sum::<u32>() / STATS_WINDOW as u32;
        assert_eq!(stats.average(), expected);
        assert_eq!(stats.frames(), STATS_WINDOW as u64);
    }

    #[test]
    fn early_average_counts_empty_slots() {
        let mut stats = FrameStats::new();
        stats.record(32);
        stats.record(32);
        assert_eq!(stats.average(), 4);
    }

    #[test]
    fn seventeenth_sample_overwrites_first_slot() {
        let mut stats = FrameStats::new();
        for value in 0..STATS_WINDOW as u32 {
            stats.record(value + 10);
        }
        stats.record(99);
        assert_eq!(stats.samples()[0], 99);
        assert_eq!(stats.samples()[1], 11);
        assert_eq!(stats.frames(), 17);
    }
}

//! Drift-corrected repeating interval driven by the host's refresh signal.
//!
//! The host polls at its own refresh rate (display vsync, a sleep loop, a test clock).
//! Each poll compares `now` against the accumulated deadline:
//!
//! ```text
//! expected = start + interval
//! poll(now): now >= expected -> Fire, expected += interval
//!            otherwise       -> Idle
//! ```
//!
//! The deadline is advanced by exactly one interval per fire and never reset to
//! `now + interval`, so late polls do not shift the phase. Over an elapsed time `E`
//! polled more often than `interval`, the interval fires exactly `floor(E / interval)` times.
//!
//! Cancellation is cooperative: `CancelHandle::cancel()` flips a shared flag that the
//! next `poll()` observes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Outcome of one poll
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Poll {
    /// Deadline reached, run the tick
    Fire,
    /// Not yet due
    Idle,
    /// Cancelled, drop the interval
    Cancelled,
}

/// Shared cooperative stop flag
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Phase-locked repeating task
#[derive(Debug)]
pub struct PreciseInterval {
    interval: Duration,
    expected: Instant,
    cancel: CancelHandle,
    fired: u64,
}

impl PreciseInterval {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            expected: start + interval,
            cancel: CancelHandle::new(),
            fired: 0,
        }
    }

    /// Interval of one tick per `fps` frames per second
    pub fn from_fps(fps: u32, start: Instant) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / fps.max(1) as f64), start)
    }

    pub fn poll(&mut self, now: Instant) -> Poll {
        if self.cancel.is_cancelled() {
            return Poll::Cancelled;
        }
        if now >= self.expected {
            self.expected += self.interval;
            self.fired += 1;
            Poll::Fire
        } else {
            Poll::Idle
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Handle that cancels this interval from elsewhere
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Next deadline
    pub fn expected(&self) -> Instant {
        self.expected
    }

    /// Time until the next deadline, zero when overdue (for sleep-driven hosts)
    pub fn next_delay(&self, now: Instant) -> Duration {
        self.expected.saturating_duration_since(now)
    }

    /// Number of fires so far
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_nanos(33_333_333);

    #[test]
    fn test_fires_on_deadline() {
        let t0 = Instant::now();
        let mut iv = PreciseInterval::new(FRAME, t0);
        assert_eq!(iv.poll(t0), Poll::Idle);
        assert_eq!(iv.poll(t0 + FRAME - Duration::from_nanos(1)), Poll::Idle);
        assert_eq!(iv.poll(t0 + FRAME), Poll::Fire);
        assert_eq!(iv.expected(), t0 + FRAME * 2);
    }

    #[test]
    fn test_late_poll_keeps_phase() {
        let t0 = Instant::now();
        let mut iv = PreciseInterval::new(FRAME, t0);
        // 20ms late: the next deadline stays on the start grid
        assert_eq!(iv.poll(t0 + FRAME + Duration::from_millis(20)), Poll::Fire);
        assert_eq!(iv.expected(), t0 + FRAME * 2);
        assert_eq!(iv.next_delay(t0 + FRAME + Duration::from_millis(20)), FRAME - Duration::from_millis(20));
    }

    #[test]
    fn test_jittered_refresh_has_no_drift() {
        let t0 = Instant::now();
        let mut iv = PreciseInterval::new(FRAME, t0);

        // ~60 Hz refresh with deterministic jitter in [12ms, 20ms)
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut elapsed = Duration::ZERO;
        let mut ticks = 0u64;
        for _ in 0..5_000 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let jitter_us = (seed >> 33) % 8_000;
            elapsed += Duration::from_micros(12_000 + jitter_us);
            if iv.poll(t0 + elapsed) == Poll::Fire {
                ticks += 1;
            }
        }

        let expected = (elapsed.as_nanos() / FRAME.as_nanos()) as u64;
        assert_eq!(ticks, expected);
        assert_eq!(iv.fired(), expected);
    }

    #[test]
    fn test_cancel_is_cooperative() {
        let t0 = Instant::now();
        let mut iv = PreciseInterval::new(FRAME, t0);
        let handle = iv.cancel_handle();
        handle.cancel();
        handle.cancel();
        assert!(iv.is_cancelled());
        assert_eq!(iv.poll(t0 + FRAME * 10), Poll::Cancelled);
        assert_eq!(iv.fired(), 0);
    }
}

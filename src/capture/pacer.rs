//! Frame pacing for the capture hook
//!
//! Decides on every buffer swap whether a new frame is due and stamps the
//! frames it lets through with microseconds since the first check.

use std::time::{Duration, Instant};

use super::switch::CaptureSwitch;

/// Gate that lets frames through at a fixed target rate.
///
/// The reference instant advances by exactly one interval per accepted frame,
/// so jitter does not accumulate. When the caller falls more than two
/// intervals behind ("dragging"), the reference jumps to the current instant
/// instead of letting a backlog of due frames build up.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    /// Instant of the first check, origin of `now()`
    origin: Option<Instant>,
    /// Instant the last accepted frame is accounted to
    reference: Option<Instant>,
    drags: u64,
}

impl FramePacer {
    pub fn new(frame_rate: u32) -> Self {
        Self::with_interval(Duration::from_micros(1_000_000 / frame_rate.max(1) as u64))
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            origin: None,
            reference: None,
            drags: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of times the pacer reset its reference after falling behind
    pub fn drags(&self) -> u64 {
        self.drags
    }

    pub fn is_frame_due(&mut self) -> bool {
        self.is_frame_due_at(Instant::now())
    }

    pub fn is_frame_due_at(&mut self, t: Instant) -> bool {
        let Some(reference) = self.reference else {
            self.origin.get_or_insert(t);
            self.reference = Some(t);
            return false;
        };

        let elapsed = t.saturating_duration_since(reference);
        if elapsed < self.interval {
            return false;
        }

        let dragging = elapsed > self.interval * 2;
        if dragging {
            self.drags += 1;
            self.reference = Some(t);
        } else {
            self.reference = Some(reference + self.interval);
        }
        true
    }

    /// Combined gate for the capture hook: checks pacing only while capture
    /// is switched on.
    pub fn capture_ready(&mut self, switch: &CaptureSwitch) -> bool {
        switch.is_active() && self.is_frame_due()
    }

    /// Microseconds since the first check.
    pub fn now(&mut self) -> i64 {
        self.now_at(Instant::now())
    }

    pub fn now_at(&mut self, t: Instant) -> i64 {
        let origin = *self.origin.get_or_insert(t);
        t.saturating_duration_since(origin).as_micros() as i64
    }
}

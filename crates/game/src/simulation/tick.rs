use std::time::{Duration, Instant};

use crate::config::FRAME_PERIOD_MS;

/// Measures real time between frames. The first frame is assumed to have
/// lasted one nominal period; later frames take whatever elapsed, without
/// drift correction.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    first_frame_ms: u64,
    previous: Option<u64>,
    frames: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(FRAME_PERIOD_MS)
    }
}

impl FrameTimer {
    pub fn new(first_frame_ms: u64) -> Self {
        Self {
            first_frame_ms,
            previous: None,
            frames: 0,
        }
    }

    pub fn frame_duration(&mut self, now_ms: u64) -> u64 {
        let duration = match self.previous {
            None => self.first_frame_ms,
            Some(previous) => now_ms.saturating_sub(previous),
        };
        self.previous = Some(now_ms);
        self.frames += 1;
        duration
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.frames = 0;
    }
}

/// Monotonic milliseconds since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    origin: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    /// Time left until `period` has passed since `frame_start_ms`.
    pub fn remaining(&self, frame_start_ms: u64, period: Duration) -> Duration {
        let spent = Duration::from_millis(self.now_ms().saturating_sub(frame_start_ms));
        period.saturating_sub(spent)
    }
}

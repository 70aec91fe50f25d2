//! Frame Pacing
//!
//! The dispatch loop holds an approximate fixed frame rate by sleeping for
//! whatever is left of the frame budget after the frame body ran. A frame
//! that overran its budget does not sleep at all.

use std::time::{Duration, Instant};

/// Highest frame rate accepted
pub const MAX_FPS: u32 = 240;

/// Sleeps out the remainder of each frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramePacer {
    budget: Duration,
}

impl FramePacer {
    /// Pacer for a frame rate, clamped to `1..=MAX_FPS`
    #[must_use]
    pub fn from_fps(fps: u32) -> Self {
        let fps = fps.clamp(1, MAX_FPS);
        Self {
            budget: Duration::from_secs(1) / fps,
        }
    }

    /// Pacer with an explicit frame budget
    #[must_use]
    pub const fn with_budget(budget: Duration) -> Self {
        Self { budget }
    }

    /// The frame budget
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// How long to sleep after a frame body that took `elapsed`
    ///
    /// `max(0, budget - elapsed)`, never negative.
    #[must_use]
    pub fn sleep_for(&self, elapsed: Duration) -> Duration {
        self.budget.saturating_sub(elapsed)
    }

    /// Sleep out the frame that started at `frame_start`, returning the sleep
    pub fn pace(&self, frame_start: Instant) -> Duration {
        let sleep = self.sleep_for(frame_start.elapsed());
        if !sleep.is_zero() {
            // Frame rate limiting: the loop's only suspension point
            std::thread::sleep(sleep);
        }
        sleep
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::from_fps(30)
    }
}

/// Running frame counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames completed
    pub frames: u64,
    /// Frames whose body took longer than the budget
    pub overruns: u64,
    /// Body time of the last frame
    pub last_elapsed: Duration,
}

impl FrameStats {
    /// Record one frame body
    pub fn record(&mut self, elapsed: Duration, budget: Duration) {
        self.frames += 1;
        self.last_elapsed = elapsed;
        if elapsed > budget {
            self.overruns += 1;
        }
    }
}

//! Session timing and frame pacing.
//!
//! A session (calibration or realtime) is anchored to a monotonic epoch
//! taken when it starts. Live frame sources stamp frames against that
//! epoch; the pacer caps how fast a loop pulls frames.

use std::time::{Duration, Instant};

/// Monotonic session clock with the wall-clock time of its start.
#[derive(Debug, Clone)]
pub struct SessionClock {
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339).
    epoch_wall: String,
}

impl SessionClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Wall-clock time at session start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Caps a frame loop to a target rate by sleeping off the remainder
/// of each frame interval.
#[derive(Debug)]
pub struct FramePacer {
    interval: Option<Duration>,
    last_frame: Option<Instant>,
}

impl FramePacer {
    /// Create a pacer for `fps_target` frames per second. Zero disables pacing.
    pub fn new(fps_target: u32) -> Self {
        let interval = (fps_target > 0).then(|| Duration::from_secs(1) / fps_target);
        Self {
            interval,
            last_frame: None,
        }
    }

    /// How long the caller still has to wait at `now` before the next frame.
    /// The first frame never waits.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => interval.saturating_sub(now.duration_since(last)),
            _ => Duration::ZERO,
        }
    }

    /// Block until the next frame is due, then mark it as started.
    pub fn wait(&mut self) {
        let remaining = self.remaining_at(Instant::now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        self.last_frame = Some(Instant::now());
    }

    /// Target interval, if pacing is enabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

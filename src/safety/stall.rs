//! Stalled-wheel collision detection.

use std::time::{Duration, Instant};

use crate::config::StallConfig;

/// Flags a collision when commanded and measured motion diverge for longer
/// than the configured duration.
///
/// One timer, latched signaling: the detector fires exactly once per stall
/// episode and re-arms only after the divergence clears.
#[derive(Debug)]
pub struct StallDetector {
    stopped_mps: f32,
    stall_duration: Duration,
    diverging_since: Option<Instant>,
    latched: bool,
}

impl StallDetector {
    pub fn new(config: &StallConfig) -> Self {
        Self {
            stopped_mps: config.stopped_mps,
            stall_duration: Duration::from_millis(config.stall_ms),
            diverging_since: None,
            latched: false,
        }
    }

    /// Feed one control-cycle observation; returns true on the cycle the
    /// stall is first confirmed.
    pub fn update(&mut self, commanded_mps: f32, measured_mps: f32, now: Instant) -> bool {
        let diverging = commanded_mps > 0.0 && measured_mps.abs() < self.stopped_mps;

        if !diverging {
            self.diverging_since = None;
            self.latched = false;
            return false;
        }

        let since = *self.diverging_since.get_or_insert(now);
        if !self.latched && now.duration_since(since) >= self.stall_duration {
            self.latched = true;
            log::warn!(
                "StallDetector: collision signaled (commanded {:.2} m/s, measured {:.2} m/s)",
                commanded_mps,
                measured_mps
            );
            return true;
        }
        false
    }
}

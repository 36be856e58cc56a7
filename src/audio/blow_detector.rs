use log::{debug, info};
use std::time::{Duration, Instant};

use super::calibrator::DEFAULT_BLOW_THRESHOLD;
use super::LevelSampler;

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(750);
const FLICKER_FLOOR_MIN: f32 = 10.0;
const FLICKER_FLOOR_RATIO: f32 = 0.15;

/// What the flames should look like after one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlameSignal {
    /// Quiet enough that the flame stands straight
    Rest,
    /// Breath below the threshold; normalized intensity in [0, 1]
    Flicker(f32),
    /// At or above the threshold: leave the visual as it was
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorReading {
    pub loudness: f32,
    pub signal: FlameSignal,
    pub blown_out: bool,
}

/// Decides, one frame at a time, whether the user has blown hard enough.
///
/// Armed when holding begins and disarmed on release. Fires at most once;
/// after firing it releases the sampler and ignores further polls.
pub struct BlowDetector {
    threshold: f32,
    grace_period: Duration,
    armed_at: Option<Instant>,
    fired: bool,
}

impl BlowDetector {
    pub fn new(threshold: f32, grace_period: Duration) -> Self {
        Self {
            threshold,
            grace_period,
            armed_at: None,
            fired: false,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.max(0.0);
    }

    pub fn arm(&mut self, now: Instant) {
        if !self.fired {
            self.armed_at = Some(now);
        }
    }

    pub fn disarm(&mut self) {
        self.armed_at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn in_grace_period(&self, now: Instant) -> bool {
        match self.armed_at {
            Some(armed_at) => now.saturating_duration_since(armed_at) < self.grace_period,
            None => false,
        }
    }

    pub fn flicker_floor(&self) -> f32 {
        FLICKER_FLOOR_MIN.max(self.threshold * FLICKER_FLOOR_RATIO)
    }

    pub fn classify(&self, loudness: f32) -> FlameSignal {
        let floor = self.flicker_floor();
        if loudness > floor && loudness < self.threshold {
            let intensity = (loudness - floor) / (self.threshold - floor);
            FlameSignal::Flicker(intensity.clamp(0.0, 1.0))
        } else if loudness <= floor {
            FlameSignal::Rest
        } else {
            FlameSignal::Unchanged
        }
    }

    /// Take one reading. Returns `None` when not armed or already fired.
    pub fn poll<S: LevelSampler + ?Sized>(&mut self, sampler: &mut S, now: Instant) -> Option<DetectorReading> {
        if self.fired || self.armed_at.is_none() {
            return None;
        }

        let loudness = sampler.sample();
        let signal = self.classify(loudness);
        let blown_out = loudness >= self.threshold && !self.in_grace_period(now);

        if blown_out {
            self.fired = true;
            self.armed_at = None;
            info!("Blow detected: loudness {:.1} >= threshold {:.1}", loudness, self.threshold);
            if let Err(e) = sampler.release() {
                debug!("Ignoring microphone teardown error: {}", e);
            }
        }

        Some(DetectorReading {
            loudness,
            signal,
            blown_out,
        })
    }
}

impl Default for BlowDetector {
    fn default() -> Self {
        Self::new(DEFAULT_BLOW_THRESHOLD, DEFAULT_GRACE_PERIOD)
    }
}

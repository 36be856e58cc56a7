use log::info;

use super::LevelSampler;

pub const DEFAULT_BLOW_THRESHOLD: f32 = 80.0;
pub const MIN_BLOW_THRESHOLD: f32 = 50.0;
pub const MAX_BLOW_THRESHOLD: f32 = 150.0;
const AMBIENT_MULTIPLIER: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Idle,
    Sampling,
    Finalized,
}

/// Learns how loud the room is while the candles are being lit, and turns
/// that into a blow threshold.
pub struct Calibrator {
    phase: CalibrationPhase,
    samples: Vec<f32>,
    threshold: f32,
}

impl Calibrator {
    pub fn new() -> Self {
        Self {
            phase: CalibrationPhase::Idle,
            samples: Vec::new(),
            threshold: DEFAULT_BLOW_THRESHOLD,
        }
    }

    pub fn start(&mut self) {
        self.samples.clear();
        self.phase = CalibrationPhase::Sampling;
    }

    /// One frame of ambient sampling. Ignored outside the sampling phase.
    pub fn tick<S: LevelSampler + ?Sized>(&mut self, sampler: &mut S) {
        if self.phase != CalibrationPhase::Sampling {
            return;
        }
        self.samples.push(sampler.sample());
    }

    pub fn finalize(&mut self) -> f32 {
        self.phase = CalibrationPhase::Finalized;
        self.threshold = threshold_from_ambient(&self.samples);
        info!(
            "Calibrated blow threshold {:.1} from {} ambient samples",
            self.threshold,
            self.samples.len()
        );
        self.samples = Vec::new();
        self.threshold
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Ambient mean times four, clamped; the default when nothing was heard.
pub fn threshold_from_ambient(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return DEFAULT_BLOW_THRESHOLD;
    }
    let mean = samples.iter().sum::<f32>() / samples.len() as f32;
    (mean * AMBIENT_MULTIPLIER).clamp(MIN_BLOW_THRESHOLD, MAX_BLOW_THRESHOLD)
}

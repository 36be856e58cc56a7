use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

pub const DEFAULT_FFT_SIZE: usize = 512;

// Byte mapping range, matching the usual browser analyser defaults
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;
const SMOOTHING_TIME_CONSTANT: f32 = 0.8;

/// Turns time-domain audio into byte frequency magnitudes (0–255).
///
/// Each call windows the most recent `fft_size` samples with a Blackman
/// window, smooths the magnitudes against the previous frame and maps the
/// result from decibels onto a byte. The bin buffer is reused between calls.
pub struct ByteFrequencyAnalyzer {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    bins: Vec<u8>,
}

impl ByteFrequencyAnalyzer {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let bin_count = fft_size / 2;

        Self {
            fft_size,
            fft,
            window: Self::blackman_window(fft_size),
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; bin_count],
            bins: vec![0; bin_count],
        }
    }

    fn blackman_window(size: usize) -> Vec<f32> {
        let alpha = 0.16;
        let a0 = 0.5 * (1.0 - alpha);
        let a1 = 0.5;
        let a2 = 0.5 * alpha;

        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
                a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
            })
            .collect()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Analyze the latest audio and return the refreshed bin buffer.
    ///
    /// Shorter input is treated as if preceded by silence.
    pub fn analyze(&mut self, time_domain: &[f32]) -> &[u8] {
        let len = self.fft_size.min(time_domain.len());
        let recent = &time_domain[time_domain.len() - len..];
        let pad = self.fft_size - len;

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            *slot = if i < pad {
                Complex::new(0.0, 0.0)
            } else {
                Complex::new(recent[i - pad] * self.window[i], 0.0)
            };
        }

        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        for (k, (smoothed, byte)) in self.smoothed.iter_mut().zip(self.bins.iter_mut()).enumerate() {
            let magnitude = self.scratch[k].norm() * scale;
            *smoothed = SMOOTHING_TIME_CONSTANT * *smoothed + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;

            *byte = if *smoothed > 0.0 {
                let db = 20.0 * smoothed.log10();
                (255.0 * (db - MIN_DECIBELS) / range).clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }

        &self.bins
    }

    /// Mean of the lower half of the bins, where breath noise lives.
    pub fn lower_half_mean(bins: &[u8]) -> f32 {
        let half = bins.len() / 2;
        if half == 0 {
            return 0.0;
        }
        let sum: u32 = bins[..half].iter().map(|&b| b as u32).sum();
        sum as f32 / half as f32
    }

    pub fn loudness(&mut self, time_domain: &[f32]) -> f32 {
        let bins = self.analyze(time_domain);
        Self::lower_half_mean(bins)
    }
}

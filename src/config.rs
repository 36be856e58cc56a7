use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Everything the experience needs to know before the first frame.
///
/// Loaded from an optional JSON file; any field left out falls back to its
/// default, so `{}` is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceConfig {
    /// Text revealed once both candles are out
    pub reveal_message: String,

    /// Offer a replay button some time after the reveal
    pub show_replay_button: bool,

    /// Input device name; `None` uses the host default
    pub input_device: Option<String>,

    /// Ambient cue looped while the candles are lit
    pub loop_cue: Option<PathBuf>,

    /// One-shot cue played on blow-out
    pub blow_cue: Option<PathBuf>,

    /// Orbs released by the reveal
    pub orb_count: usize,

    /// Analysis window in samples (the bin buffer holds half of this)
    pub fft_size: usize,

    pub timing: TimingConfig,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            reveal_message: "Happy Birthday".to_string(),
            show_replay_button: false,
            input_device: None,
            loop_cue: None,
            blow_cue: None,
            orb_count: 60,
            fft_size: 512,
            timing: TimingConfig::default(),
        }
    }
}

/// Upper bound for any configured delay: one hour.
pub const MAX_DELAY_MS: u64 = 60 * 60 * 1000;

/// Scripted beat offsets and interaction delays, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub right_candle_ms: u64,
    pub left_candle_ms: u64,
    pub loop_cue_ms: u64,
    pub ready_ms: u64,
    pub grace_period_ms: u64,
    pub shrink_delay_ms: u64,
    pub replay_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            right_candle_ms: 1400,
            left_candle_ms: 1900,
            loop_cue_ms: 1900,
            ready_ms: 3000,
            grace_period_ms: 750,
            shrink_delay_ms: 400,
            replay_delay_ms: 15000,
        }
    }
}

impl TimingConfig {
    pub fn right_candle(&self) -> Duration {
        Duration::from_millis(self.right_candle_ms)
    }

    pub fn left_candle(&self) -> Duration {
        Duration::from_millis(self.left_candle_ms)
    }

    pub fn loop_cue(&self) -> Duration {
        Duration::from_millis(self.loop_cue_ms)
    }

    /// Also the end of the calibration window.
    pub fn ready(&self) -> Duration {
        Duration::from_millis(self.ready_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn shrink_delay(&self) -> Duration {
        Duration::from_millis(self.shrink_delay_ms)
    }

    pub fn replay_delay(&self) -> Duration {
        Duration::from_millis(self.replay_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("right_candle_ms", self.right_candle_ms),
            ("left_candle_ms", self.left_candle_ms),
            ("loop_cue_ms", self.loop_cue_ms),
            ("ready_ms", self.ready_ms),
            ("grace_period_ms", self.grace_period_ms),
            ("shrink_delay_ms", self.shrink_delay_ms),
            ("replay_delay_ms", self.replay_delay_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(ConfigError::InvalidTiming(format!(
                    "{} ({}) exceeds the {} ms limit",
                    name, value, MAX_DELAY_MS
                )));
            }
        }
        if self.ready_ms == 0 {
            return Err(ConfigError::InvalidTiming("ready_ms must be positive".to_string()));
        }
        for (name, value) in [
            ("right_candle_ms", self.right_candle_ms),
            ("left_candle_ms", self.left_candle_ms),
            ("loop_cue_ms", self.loop_cue_ms),
        ] {
            if value > self.ready_ms {
                return Err(ConfigError::InvalidTiming(format!(
                    "{} ({}) must not come after ready_ms ({})",
                    name, value, self.ready_ms
                )));
            }
        }
        Ok(())
    }
}

impl ExperienceConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ExperienceConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fft_size < 32 || !self.fft_size.is_power_of_two() {
            return Err(ConfigError::InvalidTiming(format!(
                "fft_size must be a power of two of at least 32, got {}",
                self.fft_size
            )));
        }
        self.timing.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: ExperienceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.orb_count, 60);
        assert_eq!(config.fft_size, 512);
        assert_eq!(config.timing.ready(), Duration::from_millis(3000));
        assert_eq!(config.timing.grace_period(), Duration::from_millis(750));
        assert!(!config.show_replay_button);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_timing_override() {
        let config: ExperienceConfig =
            serde_json::from_str(r#"{"reveal_message": "Hi", "timing": {"ready_ms": 4000}}"#).unwrap();
        assert_eq!(config.reveal_message, "Hi");
        assert_eq!(config.timing.ready_ms, 4000);
        assert_eq!(config.timing.left_candle_ms, 1900);
    }

    #[test]
    fn test_lit_beat_after_ready_is_rejected() {
        let mut config = ExperienceConfig::default();
        config.timing.left_candle_ms = 3500;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTiming(_))));
    }

    #[test]
    fn test_huge_delay_is_rejected() {
        let config: ExperienceConfig =
            serde_json::from_str(r#"{"timing": {"replay_delay_ms": 18446744073709551615}}"#).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTiming(_))));

        let mut config = ExperienceConfig::default();
        config.timing.replay_delay_ms = MAX_DELAY_MS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_odd_fft_size_is_rejected() {
        let config = ExperienceConfig {
            fft_size: 500,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

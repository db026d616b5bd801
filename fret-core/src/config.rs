//! # Configuration Module
//!
//! Everything a session needs, fixed at construction. Loaded from a JSON file
//! with every field optional; missing fields take the defaults below.
//!
//! ```json
//! {
//!   "buffer_size": 2048,
//!   "tolerance": 0.03,
//!   "empty_frames": "suppress",
//!   "queue_depth": 32,
//!   "sample_rate": 48000,
//!   "detector": { "min_frequency": 70.0, "max_frequency": 1200.0 },
//!   "seed": 7
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{ConfigError, Result};
use crate::frame::{DEFAULT_BUFFER_SIZE, EmptyFramePolicy};
use crate::fretboard::{Fretboard, FretboardConfig};
use crate::game::DEFAULT_TOLERANCE;

/// Settings for the local pitch detector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Lowest fundamental reported, in Hz.
    pub min_frequency: f32,
    /// Highest fundamental reported, in Hz.
    pub max_frequency: f32,
    /// Number of past spectral flux values kept.
    pub flux_history: usize,
    /// How many of the most recent flux values form the onset threshold.
    pub threshold_window: usize,
    pub threshold_multiplier: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_frequency: 70.0,
            max_frequency: 1200.0,
            flux_history: 70,
            threshold_window: 11,
            threshold_multiplier: 10.65,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_frequency > 0.0 && self.min_frequency < self.max_frequency)
            || !self.max_frequency.is_finite()
        {
            return Err(ConfigError::InvalidFrequencyRange {
                min: self.min_frequency,
                max: self.max_frequency,
            });
        }
        if self.threshold_window == 0 || self.threshold_window > self.flux_history {
            return Err(ConfigError::InvalidThresholdWindow {
                window: self.threshold_window,
                history: self.flux_history,
            });
        }
        Ok(())
    }
}

/// Top-level game configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Samples per frame.
    pub buffer_size: usize,
    /// Half-width of the hit window as a ratio of the target frequency.
    pub tolerance: f32,
    pub empty_frames: EmptyFramePolicy,
    /// Frames that may wait between the audio callback and the detector.
    pub queue_depth: usize,
    /// Requested capture rate in Hz; the device may pick the nearest one.
    pub sample_rate: u32,
    pub detector: DetectorConfig,
    /// Custom target table. Standard tuning when absent.
    pub fretboard: Option<FretboardConfig>,
    /// Fixed RNG seed for reproducible target sequences.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            tolerance: DEFAULT_TOLERANCE,
            empty_frames: EmptyFramePolicy::default(),
            queue_depth: 32,
            sample_rate: 48000,
            detector: DetectorConfig::default(),
            fretboard: None,
            seed: None,
        }
    }
}

impl GameConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let config = Self::from_json(&data)?;
        info!("[CONFIG] Loaded {}", path.display());
        Ok(config)
    }

    /// Parses and validates a JSON config document.
    pub fn from_json(data: &str) -> Result<Self> {
        let config: GameConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies every construction-time check.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        self.detector.validate()?;
        self.build_fretboard().map(|_| ())
    }

    /// The configured table, or standard tuning.
    pub fn build_fretboard(&self) -> Result<Fretboard> {
        match &self.fretboard {
            Some(table) => Fretboard::from_config(table),
            None => Ok(Fretboard::standard()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = GameConfig::from_json("{}").unwrap();
        assert_eq!(config.buffer_size, 2048);
        assert_eq!(config.tolerance, 0.03);
        assert_eq!(config.empty_frames, EmptyFramePolicy::Suppress);
        assert_eq!(config.detector, DetectorConfig::default());
        assert_eq!(config.build_fretboard().unwrap(), Fretboard::standard());
    }

    #[test]
    fn fields_override_defaults() {
        let config = GameConfig::from_json(
            r#"{"buffer_size": 1024, "empty_frames": "forward", "seed": 9,
                "detector": {"max_frequency": 900.0}}"#,
        )
        .unwrap();
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.empty_frames, EmptyFramePolicy::Forward);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.detector.max_frequency, 900.0);
        assert_eq!(config.detector.min_frequency, 70.0);
    }

    #[test]
    fn misconfiguration_is_fatal() {
        assert!(matches!(
            GameConfig::from_json(r#"{"buffer_size": 0}"#),
            Err(ConfigError::ZeroCapacity)
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{"tolerance": 1.5}"#),
            Err(ConfigError::InvalidTolerance(_))
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{"queue_depth": 0}"#),
            Err(ConfigError::ZeroQueueDepth)
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{"detector": {"min_frequency": 2000.0}}"#),
            Err(ConfigError::InvalidFrequencyRange { .. })
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{"fretboard": {"strings": []}}"#),
            Err(ConfigError::StringCount { found: 0, .. })
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{"buffer_size": "big"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            GameConfig::load("/definitely/not/here.json"),
            Err(ConfigError::Io(_))
        ));
    }
}

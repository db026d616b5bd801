//! Construction-time errors.
//!
//! Everything that can be misconfigured is checked when a component is built,
//! so the real-time path never has to report failures.

use thiserror::Error;

/// Errors raised while building a component from its configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Frame capacity must be greater than zero")]
    ZeroCapacity,

    #[error("Tolerance ratio {0} must lie strictly between 0 and 1")]
    InvalidTolerance(f32),

    #[error("Fretboard must have {expected} strings, found {found}")]
    StringCount { expected: usize, found: usize },

    #[error("String '{name}' must have {expected} frets, found {found}")]
    FretCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid frequency {frequency} Hz at string {string}, fret {fret}")]
    InvalidFrequency {
        string: usize,
        fret: usize,
        frequency: f32,
    },

    #[error("Sample rate must be greater than zero")]
    ZeroSampleRate,

    #[error("Detector window of {0} samples is too small")]
    WindowTooSmall(usize),

    #[error("Invalid detector frequency range: {min} Hz to {max} Hz")]
    InvalidFrequencyRange { min: f32, max: f32 },

    #[error("Detector threshold window {window} must be between 1 and flux history {history}")]
    InvalidThresholdWindow { window: usize, history: usize },

    #[error("Frame queue depth must be greater than zero")]
    ZeroQueueDepth,

    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, ConfigError>;

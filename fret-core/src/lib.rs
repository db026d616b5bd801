// fret-core/src/lib.rs

//! The core logic for the fretboard ear-training game.
//! This crate slices live microphone audio into fixed-size frames, streams
//! them to a pitch-detection service, and scores the detected pitches against
//! a target note. It is completely headless and contains no UI code.

pub mod audio;
pub mod channel;
pub mod config;
pub mod detector;
pub mod error;
pub mod fft;
pub mod frame;
pub mod fretboard;
pub mod game;
pub mod session;

pub use channel::{DetectionChannel, DetectionResult, FrameSink};
pub use config::GameConfig;
pub use error::ConfigError;
pub use frame::{AudioFrame, FrameBuffer, FrameEmitter};
pub use fretboard::{Fretboard, Target};
pub use game::{Judgment, MatchEngine, Outcome, SessionSummary};

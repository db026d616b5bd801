//! One audio session: microphone capture feeding a local detection service.
//!
//! A fresh session is built on every start command and torn down on stop, so
//! detection results from an old session can never reach a new one.

use anyhow::Result;
use crossbeam_channel::Receiver;
use tracing::info;

use crate::audio::{CaptureSession, CaptureStats, InputDevice};
use crate::channel::{DetectionChannel, DetectionResult};
use crate::config::GameConfig;
use crate::detector::{DetectorStats, LocalDetectionService, PitchDetector};
use crate::frame::{FrameBuffer, FrameEmitter};

/// Totals of a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub capture: CaptureStats,
    pub detector: DetectorStats,
}

pub struct AudioSession {
    capture: CaptureSession,
    service: LocalDetectionService,
}

impl AudioSession {
    /// Opens the microphone and starts streaming frames to a new detector.
    pub fn start(config: &GameConfig) -> Result<Self> {
        let input = InputDevice::open_default(config.sample_rate)?;
        let detector = PitchDetector::new(
            config.buffer_size,
            input.sample_rate(),
            config.detector.clone(),
        )?;
        let service = LocalDetectionService::spawn(detector, config.queue_depth)?;

        let buffer = FrameBuffer::new(config.buffer_size, config.empty_frames)?;
        let emitter = FrameEmitter::new(buffer, service.sink());
        let capture = CaptureSession::start(input, emitter)?;

        info!(
            "[SESSION] Streaming {}-sample frames at {} Hz",
            config.buffer_size,
            capture.sample_rate()
        );
        Ok(Self { capture, service })
    }

    pub fn events(&self) -> &Receiver<DetectionResult> {
        self.service.events()
    }

    /// Stops capture (flushing the last partial frame), then the detector.
    pub fn stop(self) -> SessionReport {
        let capture = self.capture.stop();
        let detector = self.service.shutdown();
        SessionReport { capture, detector }
    }
}

//! # Pitch Detection Module
//!
//! A local stand-in for the remote pitch-detection service. Frames arrive
//! over a bounded crossbeam queue, are analysed on a dedicated worker thread,
//! and detection results flow back on an unbounded queue.
//!
//! ## Algorithm
//! - Onset detection by spectral flux against an adaptive threshold
//! - Fundamental search in the real cepstrum, limited to a frequency range
//! - The first analysed frame only primes the onset history
//!
//! Frames without an onset produce no result at all. An onset whose
//! fundamental falls outside the range produces [`DetectionResult::NoSignal`].

use std::collections::VecDeque;
use std::thread::{self, JoinHandle};

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::channel::{DetectionChannel, DetectionResult, QueueSink};
use crate::config::DetectorConfig;
use crate::error::ConfigError;
use crate::fft::Transforms;
use crate::frame::AudioFrame;

/// Onset-gated cepstral pitch detector for fixed-size frames.
#[derive(Debug)]
pub struct PitchDetector {
    sample_rate: u32,
    config: DetectorConfig,
    transforms: Transforms,
    last_spectrum: Vec<f32>,
    flux_history: VecDeque<f32>,
    last_pruned_flux: f32,
    primed: bool,
}

impl PitchDetector {
    /// # Errors
    /// * [`ConfigError::ZeroSampleRate`] if `sample_rate` is 0
    /// * [`ConfigError::WindowTooSmall`] if the window cannot hold one period
    ///   of the lowest reportable frequency
    /// * Any error from [`DetectorConfig::validate`]
    pub fn new(
        window_size: usize,
        sample_rate: u32,
        config: DetectorConfig,
    ) -> std::result::Result<Self, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        config.validate()?;
        let longest_period = (sample_rate as f32 / config.min_frequency) as usize;
        if window_size <= longest_period {
            return Err(ConfigError::WindowTooSmall(window_size));
        }

        Ok(Self {
            sample_rate,
            transforms: Transforms::new(window_size),
            last_spectrum: vec![0.0; window_size],
            flux_history: std::iter::repeat(0.0).take(config.flux_history).collect(),
            last_pruned_flux: 0.0,
            primed: false,
            config,
        })
    }

    pub fn window_size(&self) -> usize {
        self.transforms.window_size()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Analyses one frame.
    ///
    /// Returns `None` for frames of the wrong length, the priming frame and
    /// frames without an onset.
    pub fn process(&mut self, frame: &[f32]) -> Option<DetectionResult> {
        if frame.len() != self.window_size() {
            debug!(
                "[DETECTOR] Skipping {}-sample frame (window is {})",
                frame.len(),
                self.window_size()
            );
            return None;
        }

        let spectrum = self.transforms.autopower_spectrum(frame);
        let onset = self.detect_onset(&spectrum);
        self.last_spectrum = spectrum;

        if !self.primed {
            self.primed = true;
            return None;
        }

        if onset {
            let result = DetectionResult::from_hz(self.find_fundamental(frame));
            debug!("[DETECTOR] Onset detected: {:?}", result);
            Some(result)
        } else {
            None
        }
    }

    /// Spectral flux against the previous frame, pruned by an adaptive
    /// threshold. An onset is a rise in pruned flux.
    fn detect_onset(&mut self, spectrum: &[f32]) -> bool {
        let flux: f32 = spectrum
            .iter()
            .zip(&self.last_spectrum)
            .map(|(now, before)| (now - before).max(0.0))
            .sum();

        if self.flux_history.len() == self.config.flux_history {
            self.flux_history.pop_front();
        }
        self.flux_history.push_back(flux);

        let recent = self.config.threshold_window;
        let mean = self.flux_history.iter().rev().take(recent).sum::<f32>() / recent as f32;
        let threshold = mean * self.config.threshold_multiplier;

        let pruned = if threshold <= flux { flux - threshold } else { 0.0 };
        let onset = pruned > self.last_pruned_flux;
        self.last_pruned_flux = pruned;
        onset
    }

    /// Searches the cepstrum for the strongest period between the
    /// configured frequency limits.
    fn find_fundamental(&self, frame: &[f32]) -> Option<f32> {
        let cepstrum = self.transforms.cepstrum(frame);
        let rate = self.sample_rate as f32;
        let start = (rate / self.config.max_frequency) as usize;
        let end = ((rate / self.config.min_frequency) as usize).min(cepstrum.len());
        if start == 0 || start >= end {
            return None;
        }

        let (offset, _) = cepstrum[start..end]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        let frequency = rate / (start + offset) as f32;

        if frequency < self.config.min_frequency || frequency > self.config.max_frequency {
            return None;
        }
        Some(frequency)
    }
}

/// Counters reported when the worker shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorStats {
    pub frames: u64,
    pub results: u64,
}

/// Runs a [`PitchDetector`] on its own thread behind a [`DetectionChannel`].
#[derive(Debug)]
pub struct LocalDetectionService {
    frame_tx: Sender<AudioFrame>,
    events: Receiver<DetectionResult>,
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<DetectorStats>>,
}

impl LocalDetectionService {
    /// Spawns the worker thread.
    ///
    /// `queue_depth` bounds how many frames may wait for analysis; further
    /// frames are dropped by the sending side.
    pub fn spawn(mut detector: PitchDetector, queue_depth: usize) -> Result<Self> {
        if queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth.into());
        }
        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<AudioFrame>(queue_depth);
        let (event_tx, events) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        let thread_handle = thread::Builder::new()
            .name("fret-detector".into())
            .spawn(move || {
                info!(
                    "[DETECTOR] Worker started ({} samples at {} Hz)",
                    detector.window_size(),
                    detector.sample_rate()
                );
                let mut stats = DetectorStats::default();
                loop {
                    crossbeam_channel::select! {
                        recv(frame_rx) -> msg => match msg {
                            Ok(frame) => {
                                stats.frames += 1;
                                if let Some(result) = detector.process(frame.samples()) {
                                    stats.results += 1;
                                    if event_tx.send(result).is_err() {
                                        debug!("[DETECTOR] Result receiver gone");
                                        break;
                                    }
                                }
                            }
                            Err(_) => {
                                debug!("[DETECTOR] Frame channel closed");
                                break;
                            }
                        },
                        recv(shutdown_rx) -> _ => {
                            debug!("[DETECTOR] Received shutdown signal");
                            break;
                        },
                    }
                }
                info!(
                    "[DETECTOR] Worker finished after {} frames, {} results",
                    stats.frames, stats.results
                );
                stats
            })?;

        Ok(Self {
            frame_tx,
            events,
            shutdown_tx,
            thread_handle: Some(thread_handle),
        })
    }

    /// Stops the worker and waits for it.
    pub fn shutdown(mut self) -> DetectorStats {
        self.stop_worker()
    }

    fn stop_worker(&mut self) -> DetectorStats {
        let _ = self.shutdown_tx.try_send(());
        match self.thread_handle.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                warn!("[DETECTOR] Worker panicked");
                DetectorStats::default()
            }
            None => DetectorStats::default(),
        }
    }
}

impl DetectionChannel for LocalDetectionService {
    type Sink = QueueSink;

    fn sink(&self) -> QueueSink {
        QueueSink::new(self.frame_tx.clone())
    }

    fn events(&self) -> &Receiver<DetectionResult> {
        &self.events
    }
}

impl Drop for LocalDetectionService {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const RATE: u32 = 48000;
    const WINDOW: usize = 2048;

    /// Eight harmonics with 1/k amplitudes, phase-continuous across frames.
    fn tone(freq: f32, frame_index: usize) -> Vec<f32> {
        (0..WINDOW)
            .map(|i| {
                let t = (frame_index * WINDOW + i) as f32 / RATE as f32;
                (1..=8)
                    .map(|k| 0.5 / k as f32 * (2.0 * std::f32::consts::PI * freq * k as f32 * t).sin())
                    .sum::<f32>()
            })
            .collect()
    }

    fn detector() -> PitchDetector {
        PitchDetector::new(WINDOW, RATE, DetectorConfig::default()).unwrap()
    }

    #[test]
    fn construction_checks() {
        assert!(matches!(
            PitchDetector::new(WINDOW, 0, DetectorConfig::default()),
            Err(ConfigError::ZeroSampleRate)
        ));
        assert!(matches!(
            PitchDetector::new(256, RATE, DetectorConfig::default()),
            Err(ConfigError::WindowTooSmall(256))
        ));
    }

    #[test]
    fn silence_never_reports() {
        let mut detector = detector();
        for _ in 0..5 {
            assert_eq!(detector.process(&[0.0; WINDOW]), None);
        }
    }

    #[test]
    fn wrong_length_frames_are_skipped() {
        let mut detector = detector();
        assert_eq!(detector.process(&[0.0; 100]), None);
        assert!(!detector.primed);
    }

    #[test]
    fn first_frame_only_primes() {
        let mut detector = detector();
        assert_eq!(detector.process(&tone(196.0, 0)), None);
    }

    #[test]
    fn onset_reports_the_fundamental_once() {
        let mut detector = detector();
        assert_eq!(detector.process(&[0.0; WINDOW]), None);

        let result = detector.process(&tone(196.0, 1)).expect("onset expected");
        let DetectionResult::Confident(freq) = result else {
            panic!("expected a pitch, got {:?}", result);
        };
        assert_relative_eq!(freq, 196.0, max_relative = 0.01);

        // A sustained note is not a new onset.
        assert_eq!(detector.process(&tone(196.0, 2)), None);
    }

    #[test]
    fn service_round_trip() {
        let service = LocalDetectionService::spawn(detector(), 8).unwrap();
        let mut sink = service.sink();
        crate::channel::FrameSink::send(&mut sink, AudioFrame::new(vec![0.0; WINDOW]));
        crate::channel::FrameSink::send(&mut sink, AudioFrame::new(tone(110.0, 1)));

        let result = service
            .events()
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        assert_relative_eq!(result.frequency().unwrap(), 110.0, max_relative = 0.01);

        let stats = service.shutdown();
        assert_eq!(stats, DetectorStats { frames: 2, results: 1 });
    }
}

//! # Audio Capture Module
//!
//! Real-time microphone capture using CPAL (Cross-Platform Audio Library).
//! The input callback runs the [`FrameEmitter`] step and nothing else: no
//! logging, no blocking I/O, and no allocation outside of frame flushes.
//!
//! ## Features
//! - Default input device selection
//! - Mono f32 stream closest to the requested sample rate
//! - End-of-session flush of the trailing partial frame

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, warn};

use crate::channel::QueueSink;
use crate::frame::FrameEmitter;

/// Totals for one capture session, reported when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_sent: u64,
    pub frames_dropped: u64,
}

/// The default input device with a chosen stream configuration.
///
/// Opened before the detector is built so both agree on the sample rate.
pub struct InputDevice {
    device: cpal::Device,
    config: cpal::StreamConfig,
}

impl InputDevice {
    /// Selects the default input device.
    ///
    /// The device picks the supported mono f32 rate closest to
    /// `requested_rate`; the actual rate is available from
    /// [`InputDevice::sample_rate`].
    pub fn open_default(requested_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        info!("[CAPTURE] Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, requested_rate)
            .ok_or_else(|| anyhow!("No suitable mono f32 input format found"))?;

        let rate = requested_rate.clamp(
            supported_config.min_sample_rate().0,
            supported_config.max_sample_rate().0,
        );
        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(rate))
            .into();

        info!("[CAPTURE] Selected sample rate: {} Hz", rate);
        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }
}

/// A running input stream feeding one frame emitter.
pub struct CaptureSession {
    stream: cpal::Stream,
    emitter: Arc<Mutex<FrameEmitter<QueueSink>>>,
    sample_rate: u32,
}

impl CaptureSession {
    /// Builds and plays the input stream.
    pub fn start(input: InputDevice, emitter: FrameEmitter<QueueSink>) -> Result<Self> {
        let emitter = Arc::new(Mutex::new(emitter));
        let callback_emitter = Arc::clone(&emitter);
        let err_fn = |err| error!("[CAPTURE] An error occurred on the audio stream: {}", err);

        let stream = input.device.build_input_stream(
            &input.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Uncontended: stop() only locks once the stream is gone.
                if let Ok(mut emitter) = callback_emitter.lock() {
                    emitter.process(data);
                }
            },
            err_fn,
            None,
        )?;

        stream.play()?;

        Ok(Self {
            stream,
            emitter,
            sample_rate: input.sample_rate(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Stops the stream and flushes whatever the buffer still holds.
    pub fn stop(self) -> CaptureStats {
        if let Err(e) = self.stream.pause() {
            warn!("[CAPTURE] Error pausing stream: {}", e);
        }
        drop(self.stream);

        let mut emitter = match self.emitter.lock() {
            Ok(emitter) => emitter,
            Err(poisoned) => poisoned.into_inner(),
        };
        emitter.finish();

        let stats = CaptureStats {
            frames_sent: emitter.sink().sent(),
            frames_dropped: emitter.sink().dropped(),
        };
        if stats.frames_dropped > 0 {
            warn!(
                "[CAPTURE] {} of {} frames were dropped by a full detection queue",
                stats.frames_dropped,
                stats.frames_sent + stats.frames_dropped
            );
        }
        info!("[CAPTURE] Stream stopped after {} frames", stats.frames_sent);
        stats
    }
}

/// Finds the best supported input configuration for the target sample rate.
///
/// Only mono 32-bit float configurations qualify; among those, the one whose
/// rate range lies closest to `target_rate` wins.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let (min, max) = (c.min_sample_rate().0, c.max_sample_rate().0);
            if (min..=max).contains(&target_rate) {
                0
            } else {
                min.abs_diff(target_rate).min(max.abs_diff(target_rate))
            }
        })
}

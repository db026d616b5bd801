//! # Detection Channel Module
//!
//! Boundary between the framing pipeline and the pitch-detection service.
//! Outbound frames are fire-and-forget; inbound detection results arrive on a
//! crossbeam receiver in the order the service produced them.
//!
//! The wire mechanics (socket, handshake, reconnects) belong to whoever
//! implements [`DetectionChannel`]. This module only fixes the message shapes
//! and the non-blocking hand-off used by the audio callback.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::Serialize;

use crate::frame::AudioFrame;

/// Outbound side of a detection channel.
///
/// `send` is called from the audio callback and must never block.
pub trait FrameSink {
    fn send(&mut self, frame: AudioFrame);
}

/// Collects frames in memory. Handy for tests and offline framing.
impl FrameSink for Vec<AudioFrame> {
    fn send(&mut self, frame: AudioFrame) {
        self.push(frame);
    }
}

/// A duplex channel to a pitch-detection service.
pub trait DetectionChannel {
    type Sink: FrameSink + Send + 'static;

    /// A fresh outbound handle for one frame emitter.
    fn sink(&self) -> Self::Sink;

    /// Inbound detection results, in send order.
    fn events(&self) -> &Receiver<DetectionResult>;
}

/// One frequency estimate from the detection service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionResult {
    /// A pitch was found, in Hz.
    Confident(f32),
    /// The service heard something but could not name a pitch.
    NoSignal,
}

impl DetectionResult {
    /// Maps a raw payload to a result. Missing, zero, negative and
    /// non-finite values all mean "no confident pitch".
    pub fn from_hz(hz: Option<f32>) -> Self {
        match hz {
            Some(f) if f.is_finite() && f > 0.0 => DetectionResult::Confident(f),
            _ => DetectionResult::NoSignal,
        }
    }

    /// Parses an inbound payload: a bare JSON number or `null`.
    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        let hz: Option<f32> = serde_json::from_str(payload)?;
        Ok(Self::from_hz(hz))
    }

    pub fn frequency(&self) -> Option<f32> {
        match self {
            DetectionResult::Confident(f) => Some(*f),
            DetectionResult::NoSignal => None,
        }
    }
}

/// Wire shape of an outbound frame: `{"eventType":"data","audioBuffer":[...]}`.
///
/// Sample rate and channel count are agreed once at session setup and are not
/// repeated per frame.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMessage<'a> {
    pub event_type: &'static str,
    pub audio_buffer: &'a [f32],
}

impl<'a> FrameMessage<'a> {
    pub const DATA: &'static str = "data";

    pub fn new(frame: &'a AudioFrame) -> Self {
        Self {
            event_type: Self::DATA,
            audio_buffer: frame.samples(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Non-blocking hand-off into a bounded crossbeam queue.
///
/// A full or disconnected queue loses the frame. Losses are counted, never
/// reported from the callback itself.
#[derive(Debug)]
pub struct QueueSink {
    sender: Sender<AudioFrame>,
    sent: u64,
    dropped: u64,
}

impl QueueSink {
    pub fn new(sender: Sender<AudioFrame>) -> Self {
        Self {
            sender,
            sent: 0,
            dropped: 0,
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl FrameSink for QueueSink {
    fn send(&mut self, frame: AudioFrame) {
        match self.sender.try_send(frame) {
            Ok(()) => self.sent += 1,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => self.dropped += 1,
        }
    }
}

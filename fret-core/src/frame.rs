//! # Audio Framing Module
//!
//! Slices the microphone signal into fixed-size frames for the detection
//! service. Both types here run inside the audio callback: storage is
//! allocated once at construction and the only allocation afterwards is the
//! copy handed out at each flush.
//!
//! ## Flush rules
//! - A full buffer is only flushed when more data arrives (or at session end),
//!   so a chunk that exactly fills the remaining room never triggers an early
//!   frame.
//! - A chunk larger than the remaining room is split across the flush boundary
//!   by the same flush-on-full path.
//! - Flushing an empty buffer follows the configured [`EmptyFramePolicy`].

use serde::Deserialize;

use crate::channel::FrameSink;
use crate::error::{ConfigError, Result};

/// Default number of samples per frame.
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// One block of samples handed to the transport boundary.
///
/// Frames are immutable once built. Every frame of a session is exactly the
/// buffer capacity long except possibly the last one.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// What to do when a flush finds nothing to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyFramePolicy {
    /// Emit nothing and just reset.
    #[default]
    Suppress,
    /// Emit a zero-length frame.
    Forward,
}

/// Fixed-capacity sample accumulator that owns flush timing.
#[derive(Debug)]
pub struct FrameBuffer {
    storage: Box<[f32]>,
    write_offset: usize,
    empty_frames: EmptyFramePolicy,
}

impl FrameBuffer {
    /// Creates a buffer holding `capacity` samples.
    ///
    /// # Errors
    /// * [`ConfigError::ZeroCapacity`] if `capacity` is 0
    pub fn new(capacity: usize, empty_frames: EmptyFramePolicy) -> Result<Self> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            storage: vec![0.0; capacity].into_boxed_slice(),
            write_offset: 0,
            empty_frames,
        })
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of valid samples currently held.
    pub fn len(&self) -> usize {
        self.write_offset
    }

    pub fn is_full(&self) -> bool {
        self.write_offset == self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.write_offset == 0
    }

    /// Copies `chunk` into the buffer, flushing to `sink` whenever the buffer
    /// is full and more samples are waiting.
    ///
    /// An empty chunk only performs the flush-if-full check.
    pub fn append<S: FrameSink + ?Sized>(&mut self, chunk: &[f32], sink: &mut S) {
        if self.is_full() {
            self.flush(sink);
        }

        let mut rest = chunk;
        while !rest.is_empty() {
            if self.is_full() {
                self.flush(sink);
            }
            let room = self.storage.len() - self.write_offset;
            let take = room.min(rest.len());
            self.storage[self.write_offset..self.write_offset + take]
                .copy_from_slice(&rest[..take]);
            self.write_offset += take;
            rest = &rest[take..];
        }
    }

    /// Emits the valid prefix as one frame and resets the write offset.
    ///
    /// Returns `true` if a frame was handed to `sink`.
    pub fn flush<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        if self.is_empty() && self.empty_frames == EmptyFramePolicy::Suppress {
            return false;
        }
        let frame = AudioFrame::new(self.storage[..self.write_offset].to_vec());
        self.write_offset = 0;
        sink.send(frame);
        true
    }
}

/// Runs the framing step once per real-time input chunk.
///
/// Owns one [`FrameBuffer`] and the outbound side of the detection channel.
/// A new emitter is built for every audio session.
#[derive(Debug)]
pub struct FrameEmitter<S: FrameSink> {
    buffer: FrameBuffer,
    sink: S,
}

impl<S: FrameSink> FrameEmitter<S> {
    pub fn new(buffer: FrameBuffer, sink: S) -> Self {
        Self { buffer, sink }
    }

    /// Per-callback step.
    ///
    /// 1. A buffer left full by the previous callback is flushed first.
    /// 2. The chunk is appended, splitting across a flush boundary if needed.
    pub fn process(&mut self, input: &[f32]) {
        if self.buffer.is_full() {
            self.buffer.flush(&mut self.sink);
        }
        self.buffer.append(input, &mut self.sink);
    }

    /// End-of-session flush of whatever the buffer still holds.
    ///
    /// Must be called by whoever owns the session lifecycle; the callback
    /// alone never flushes a trailing partial frame.
    pub fn finish(&mut self) -> bool {
        self.buffer.flush(&mut self.sink)
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

//! # Fast Fourier Transform (FFT) Module
//!
//! Spectral transforms used by the local pitch detector, planned once per
//! analysis window size with RustFFT.
//!
//! ## Features
//! - Hann-windowed, zero-padded autopower spectrum for onset detection
//! - Real cepstrum for fundamental frequency search

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Floor applied to magnitudes before taking the log, so silent bins stay finite.
const LOG_FLOOR: f32 = 1e-10;

/// Builds a symmetric Hann window of `n` points.
///
/// The Hann window tapers the frame to zero at both edges to reduce
/// spectral leakage.
pub fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Pre-planned transforms for one window size.
pub struct Transforms {
    window_size: usize,
    hann: Vec<f32>,
    padded_forward: Arc<dyn Fft<f32>>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for Transforms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transforms")
            .field("window_size", &self.window_size)
            .finish_non_exhaustive()
    }
}

impl Transforms {
    pub fn new(window_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            window_size,
            hann: hann_window(window_size),
            padded_forward: planner.plan_fft_forward(window_size * 2),
            forward: planner.plan_fft_forward(window_size),
            inverse: planner.plan_fft_inverse(window_size),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Autopower spectrum of one frame.
    ///
    /// 1. Hann window
    /// 2. Zero-pad to twice the window length
    /// 3. Forward FFT scaled by the window length
    /// 4. Squared magnitude of the first `window_size` bins
    ///
    /// # Panics
    /// * If `samples` is not exactly `window_size` long
    pub fn autopower_spectrum(&self, samples: &[f32]) -> Vec<f32> {
        assert_eq!(samples.len(), self.window_size, "frame must match the window size");

        let mut buffer: Vec<Complex<f32>> = samples
            .iter()
            .zip(&self.hann)
            .map(|(&s, &w)| Complex { re: s * w, im: 0.0 })
            .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }).take(self.window_size))
            .collect();
        self.padded_forward.process(&mut buffer);

        let scale = (self.window_size * self.window_size) as f32;
        buffer
            .iter()
            .take(self.window_size)
            .map(|c| c.norm_sqr() / scale)
            .collect()
    }

    /// Real cepstrum of one frame: inverse FFT of the log magnitude spectrum.
    ///
    /// Harmonic-rich tones show a peak at the quefrency (in samples) of their
    /// fundamental period.
    ///
    /// # Panics
    /// * If `samples` is not exactly `window_size` long
    pub fn cepstrum(&self, samples: &[f32]) -> Vec<f32> {
        assert_eq!(samples.len(), self.window_size, "frame must match the window size");

        let mut buffer: Vec<Complex<f32>> = samples
            .iter()
            .map(|&s| Complex { re: s, im: 0.0 })
            .collect();
        self.forward.process(&mut buffer);

        for bin in buffer.iter_mut() {
            *bin = Complex {
                re: bin.norm().max(LOG_FLOOR).ln(),
                im: 0.0,
            };
        }
        self.inverse.process(&mut buffer);

        // RustFFT leaves the inverse unnormalized.
        let scale = self.window_size as f32;
        buffer.iter().map(|c| c.re / scale).collect()
    }
}

//! Spectral analyzer
//!
//! Keeps the most recent `fft_size` mono samples in a ring and computes byte
//! magnitudes on demand: Blackman window, forward FFT, magnitude / N,
//! exponential smoothing across snapshots, then decibels mapped linearly from
//! `[MIN_DECIBELS, MAX_DECIBELS]` onto `0..=255`.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Magnitude mapped to byte 0
pub const MIN_DECIBELS: f32 = -100.0;
/// Magnitude mapped to byte 255
pub const MAX_DECIBELS: f32 = -30.0;
/// Smallest accepted analysis window
pub const MIN_FFT_SIZE: usize = 32;
/// Largest accepted analysis window
pub const MAX_FFT_SIZE: usize = 32768;
/// Weight of the previous snapshot in the smoothed magnitude
pub const SMOOTHING: f32 = 0.8;

pub struct SpectrumAnalyzer {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Ring of the latest input samples
    ring: Vec<f32>,
    write_pos: usize,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// `fft_size` is clamped to `MIN_FFT_SIZE..=MAX_FFT_SIZE` and rounded up
    /// to a power of two
    pub fn new(fft_size: usize) -> Self {
        let fft_size = fft_size
            .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
            .next_power_of_two();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Blackman window
        let n = fft_size as f32;
        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / n;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        Self {
            fft_size,
            fft,
            window,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Append mono samples (older samples fall out of the window)
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &s in samples {
            self.ring[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Forget buffered input and smoothing history
    pub fn reset(&mut self) {
        self.ring.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
        self.write_pos = 0;
    }

    /// Compute a snapshot into `out` (extra bins are left untouched)
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        // Oldest sample first
        for i in 0..self.fft_size {
            let sample = self.ring[(self.write_pos + i) % self.fft_size];
            self.scratch[i] = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let norm = 1.0 / self.fft_size as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;

        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() * norm;
            *smoothed = SMOOTHING * *smoothed + (1.0 - SMOOTHING) * magnitude;

            if let Some(byte) = out.get_mut(k) {
                let db = if *smoothed > 0.0 {
                    20.0 * smoothed.log10()
                } else {
                    f32::NEG_INFINITY
                };
                let scaled = 255.0 * (db - MIN_DECIBELS) / range;
                *byte = scaled.clamp(0.0, 255.0) as u8;
            }
        }
    }
}

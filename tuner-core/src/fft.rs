//! # Fast Fourier Transform (FFT) Module
//!
//! Turns a time-domain window into the byte magnitude spectrum
//! consumed by the harmonic sampler.
//!
//! The output follows the usual analyser-node conventions:
//! - Blackman window over the whole buffer
//! - Magnitudes normalised by the FFT size
//! - Exponential smoothing across successive calls
//! - Decibels mapped linearly from `[min_decibels, max_decibels]` to `[0, 255]`

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::config::AnalyserConfig;
use crate::error::{TunerError, TunerResult};

/// Stateful byte spectrum analyser for a fixed buffer size.
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    config: AnalyserConfig,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl std::fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("buffer_size", &self.window.len())
            .field("config", &self.config)
            .finish()
    }
}

impl SpectrumAnalyser {
    /// Plans an FFT of `buffer_size` points.
    pub fn new(buffer_size: usize, config: AnalyserConfig) -> TunerResult<Self> {
        if buffer_size < 2 {
            return Err(TunerError::EmptyBuffer);
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(buffer_size);

        Ok(Self {
            fft,
            config,
            window: blackman_window(buffer_size),
            scratch: vec![Complex::default(); buffer_size],
            smoothed: vec![0.0; buffer_size / 2],
        })
    }

    pub fn buffer_size(&self) -> usize {
        self.window.len()
    }

    /// Number of buckets produced, half the buffer size.
    pub fn bucket_count(&self) -> usize {
        self.smoothed.len()
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
    }

    /// Analyses `samples` and writes one byte per bucket into `out`.
    ///
    /// # Errors
    /// * `BufferLengthMismatch` - `samples` is not `buffer_size()` long
    /// * `SpectrumLengthMismatch` - `out` is not `bucket_count()` long
    pub fn analyse(&mut self, samples: &[f32], out: &mut [u8]) -> TunerResult<()> {
        if samples.len() != self.buffer_size() {
            return Err(TunerError::BufferLengthMismatch {
                expected: self.buffer_size(),
                actual: samples.len(),
            });
        }
        if out.len() != self.bucket_count() {
            return Err(TunerError::SpectrumLengthMismatch {
                expected: self.bucket_count(),
                actual: out.len(),
            });
        }

        for ((slot, &sample), &w) in self.scratch.iter_mut().zip(samples).zip(&self.window) {
            *slot = Complex { re: sample * w, im: 0.0 };
        }
        self.fft.process(&mut self.scratch);

        let n = self.buffer_size() as f32;
        let tau = self.config.smoothing_time_constant;
        let db_range = self.config.max_decibels - self.config.min_decibels;

        let bins = self.smoothed.iter_mut().zip(&self.scratch).zip(out.iter_mut());
        for ((smoothed, bin), byte) in bins {
            let magnitude = bin.norm() / n;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;

            let db = 20.0 * smoothed.log10();
            let scaled = 255.0 * (db - self.config.min_decibels) / db_range;
            // -inf dB (silence) and NaN both clamp to 0.
            *byte = if scaled.is_nan() { 0 } else { scaled.clamp(0.0, 255.0) as u8 };
        }
        Ok(())
    }
}

/// Blackman window (alpha = 0.16) over `n` points.
fn blackman_window(n: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let two_pi = 2.0 * std::f32::consts::PI;
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            A0 - A1 * (two_pi * x).cos() + A2 * (2.0 * two_pi * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(sample_rate: u32, freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32;
                amplitude * phase.sin()
            })
            .collect()
    }

    fn argmax(bytes: &[u8]) -> usize {
        bytes
            .iter()
            .enumerate()
            .max_by_key(|(_, m)| **m)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    #[test]
    fn silence_maps_to_zero() {
        let mut analyser = SpectrumAnalyser::new(1024, AnalyserConfig::default()).unwrap();
        let mut out = vec![1u8; 512];
        analyser.analyse(&[0.0; 1024], &mut out).unwrap();
        assert!(out.iter().all(|&m| m == 0));
    }

    #[test]
    fn tone_peaks_in_its_bucket() {
        let mut analyser = SpectrumAnalyser::new(4096, AnalyserConfig::default()).unwrap();
        let mut out = vec![0u8; 2048];
        let samples = sine(44_100, 1000.0, 0.5, 4096);
        // Let the smoothing settle.
        for _ in 0..20 {
            analyser.analyse(&samples, &mut out).unwrap();
        }
        let expected_bucket = (1000.0 / (22_050.0 / 2048.0)) as usize;
        let peak = argmax(&out);
        assert!(peak.abs_diff(expected_bucket) <= 1, "peak at {peak}, expected {expected_bucket}");
        assert!(out[peak] > 200);
    }

    #[test]
    fn smoothing_remembers_previous_frames() {
        let mut analyser = SpectrumAnalyser::new(1024, AnalyserConfig::default()).unwrap();
        let mut out = vec![0u8; 512];
        let samples = sine(44_100, 2000.0, 0.5, 1024);
        analyser.analyse(&samples, &mut out).unwrap();
        let peak = argmax(&out);

        analyser.analyse(&[0.0; 1024], &mut out).unwrap();
        assert!(out[peak] > 0, "smoothing should keep energy after one silent frame");

        analyser.reset();
        analyser.analyse(&[0.0; 1024], &mut out).unwrap();
        assert_eq!(out[peak], 0);
    }

    #[test]
    fn rejects_wrong_lengths() {
        let mut analyser = SpectrumAnalyser::new(256, AnalyserConfig::default()).unwrap();
        let mut out = vec![0u8; 128];
        assert!(matches!(
            analyser.analyse(&[0.0; 100], &mut out),
            Err(TunerError::BufferLengthMismatch { expected: 256, actual: 100 })
        ));
        let mut short = vec![0u8; 64];
        assert!(matches!(
            analyser.analyse(&[0.0; 256], &mut short),
            Err(TunerError::SpectrumLengthMismatch { expected: 128, actual: 64 })
        ));
    }
}

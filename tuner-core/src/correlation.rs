//! # Correlation Module
//!
//! Normalised square difference function (NSDF) over a bounded lag range,
//! after McLeod & Wyvill, "A Smarter Way to Find Pitch".
//!
//! For every lag τ inside the search window:
//!
//! ```text
//! r'(τ) = Σ x[j]·x[j+τ]
//! m'(τ) = Σ x[j]² + x[j+τ]²
//! n'(τ) = 2·r'(τ) / m'(τ)
//! ```
//!
//! `n'(τ)` lies in [-1, 1]; values near 1 mean strong periodicity at lag τ.
//! Lags outside the window are written as 0 so that the peak extractor can
//! never pick a period outside the playable note range.
//!
//! The direct form is O(N·(max_lag - min_lag)). At 4096 samples and 44.1 kHz
//! that is a few million multiply-adds per pass, well inside a 100 ms cadence.

use crate::config::{MAX_NOTE_FREQUENCY, MIN_NOTE_FREQUENCY};
use crate::error::{TunerError, TunerResult};

/// Inclusive range of lags, in samples, that may hold a fundamental period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LagWindow {
    /// `ceil(sample_rate / max_frequency)`
    pub min_lag: usize,
    /// `floor(sample_rate / min_frequency)`
    pub max_lag: usize,
}

impl LagWindow {
    pub fn new(sample_rate: u32, min_frequency: f32, max_frequency: f32) -> Self {
        let sample_rate = sample_rate as f64;
        Self {
            min_lag: (sample_rate / max_frequency as f64).ceil() as usize,
            max_lag: (sample_rate / min_frequency as f64).floor() as usize,
        }
    }

    /// Window for the default 25 Hz .. 8 kHz note range.
    pub fn for_sample_rate(sample_rate: u32) -> Self {
        Self::new(sample_rate, MIN_NOTE_FREQUENCY, MAX_NOTE_FREQUENCY)
    }

    pub fn contains(&self, lag: usize) -> bool {
        lag >= self.min_lag && lag <= self.max_lag
    }
}

/// Computes the NSDF of `samples` over the default lag window.
///
/// Returns one value per lag, `samples.len()` values in total.
///
/// # Errors
/// * `EmptyBuffer` - `samples` is empty
/// * `InvalidSampleRate` - `sample_rate` is zero
pub fn correlate(samples: &[f32], sample_rate: u32) -> TunerResult<Vec<f32>> {
    if sample_rate == 0 {
        return Err(TunerError::InvalidSampleRate(sample_rate));
    }
    let mut n_dash = vec![0.0; samples.len()];
    correlate_into(samples, LagWindow::for_sample_rate(sample_rate), &mut n_dash)?;
    Ok(n_dash)
}

/// Computes the NSDF of `samples` into a caller-owned buffer.
///
/// `n_dash` must be as long as `samples`. Every slot is overwritten, so the
/// buffer can be reused across passes without clearing.
pub fn correlate_into(samples: &[f32], window: LagWindow, n_dash: &mut [f32]) -> TunerResult<()> {
    if samples.is_empty() {
        return Err(TunerError::EmptyBuffer);
    }
    if n_dash.len() != samples.len() {
        return Err(TunerError::BufferLengthMismatch {
            expected: samples.len(),
            actual: n_dash.len(),
        });
    }

    for (tau, slot) in n_dash.iter_mut().enumerate() {
        *slot = if window.contains(tau) {
            nsdf_at(samples, tau)
        } else {
            0.0
        };
    }
    Ok(())
}

/// NSDF value at a single lag. Zero energy yields 0 rather than NaN.
fn nsdf_at(samples: &[f32], tau: usize) -> f32 {
    let head = &samples[..samples.len().saturating_sub(tau)];
    let tail = samples.get(tau..).unwrap_or(&[]);

    let mut r_dash = 0.0f64;
    let mut m_dash = 0.0f64;
    for (&a, &b) in head.iter().zip(tail) {
        let (a, b) = (a as f64, b as f64);
        r_dash += a * b;
        m_dash += a * a + b * b;
    }

    if m_dash > 0.0 {
        (2.0 * r_dash / m_dash) as f32
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(sample_rate: u32, freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn window_bounds_follow_note_range() {
        let window = LagWindow::for_sample_rate(48_000);
        assert_eq!(window.min_lag, 6);
        assert_eq!(window.max_lag, 1920);
        assert!(!window.contains(5));
        assert!(window.contains(6));
        assert!(window.contains(1920));
        assert!(!window.contains(1921));
    }

    #[test]
    fn output_has_buffer_length_and_zero_outside_window() {
        let samples = sine(44_100, 440.0, 4096);
        let n_dash = correlate(&samples, 44_100).unwrap();
        assert_eq!(n_dash.len(), samples.len());

        let window = LagWindow::for_sample_rate(44_100);
        for (tau, &value) in n_dash.iter().enumerate() {
            if !window.contains(tau) {
                assert_eq!(value, 0.0, "lag {tau} outside the window must be zero");
            }
        }
    }

    #[test]
    fn sine_correlates_strongly_at_its_period() {
        // 441 Hz at 44.1 kHz has a period of exactly 100 samples.
        let samples = sine(44_100, 441.0, 4096);
        let n_dash = correlate(&samples, 44_100).unwrap();
        assert_abs_diff_eq!(n_dash[100], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(n_dash[50], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn values_stay_in_unit_range() {
        let samples: Vec<f32> = (0..2048)
            .map(|i| ((i * 7919) % 200) as f32 / 100.0 - 1.0)
            .collect();
        let n_dash = correlate(&samples, 44_100).unwrap();
        assert!(n_dash.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn silence_yields_zeros_not_nan() {
        let n_dash = correlate(&[0.0; 4096], 44_100).unwrap();
        assert!(n_dash.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn repeated_calls_are_bit_identical() {
        let samples = sine(48_000, 329.63, 4096);
        let first = correlate(&samples, 48_000).unwrap();
        let second = correlate(&samples, 48_000).unwrap();
        let first_bits: Vec<u32> = first.iter().map(|v| v.to_bits()).collect();
        let second_bits: Vec<u32> = second.iter().map(|v| v.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(correlate(&[], 44_100), Err(TunerError::EmptyBuffer)));
        assert!(matches!(correlate(&[0.5; 16], 0), Err(TunerError::InvalidSampleRate(0))));

        let mut short = [0.0; 8];
        let result = correlate_into(&[0.5; 16], LagWindow::for_sample_rate(44_100), &mut short);
        assert!(matches!(
            result,
            Err(TunerError::BufferLengthMismatch { expected: 16, actual: 8 })
        ));
    }
}

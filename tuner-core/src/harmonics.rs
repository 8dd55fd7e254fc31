//! # Harmonics Module
//!
//! Reads the relative strength of the first twelve harmonics of a known
//! fundamental from a byte magnitude spectrum.
//!
//! The spectrum covers 0 Hz to Nyquist in equal buckets, so harmonic `k`
//! lands near bucket `k * floor(f0 / bucket_width)`. The coarse bucket grid
//! rarely lines up with the exact partial, so each reading averages the
//! buckets within a small radius around the target.

use crate::config::HARMONIC_WINDOW;
use crate::error::{TunerError, TunerResult};

/// Number of harmonics reported, the fundamental included.
pub const HARMONIC_COUNT: usize = 12;

/// Strength of harmonics 1..=12, each in [0, 100].
pub type HarmonicVector = [f32; HARMONIC_COUNT];

/// Width of one spectrum bucket in Hz.
pub fn bucket_width(sample_rate: u32, spectrum_len: usize) -> f32 {
    (sample_rate as f32 / 2.0) / spectrum_len as f32
}

/// Samples harmonic strengths with the default ±5 bucket window.
pub fn sample_harmonics(
    fundamental_frequency: f32,
    spectrum: &[u8],
    sample_rate: u32,
) -> TunerResult<HarmonicVector> {
    sample_harmonics_with_window(fundamental_frequency, spectrum, sample_rate, HARMONIC_WINDOW)
}

/// Samples harmonic strengths, averaging `window` buckets either side.
///
/// Harmonics whose bucket falls past the end of the spectrum read 0.
///
/// # Errors
/// * `EmptyBuffer` - `spectrum` is empty
/// * `InvalidSampleRate` - `sample_rate` is zero
/// * `InvalidFrequency` - `fundamental_frequency` is not finite and positive
pub fn sample_harmonics_with_window(
    fundamental_frequency: f32,
    spectrum: &[u8],
    sample_rate: u32,
    window: usize,
) -> TunerResult<HarmonicVector> {
    if spectrum.is_empty() {
        return Err(TunerError::EmptyBuffer);
    }
    if sample_rate == 0 {
        return Err(TunerError::InvalidSampleRate(sample_rate));
    }
    if !(fundamental_frequency.is_finite() && fundamental_frequency > 0.0) {
        return Err(TunerError::InvalidFrequency(fundamental_frequency));
    }

    let width = bucket_width(sample_rate, spectrum.len());
    // Saturates for fundamentals far above Nyquist.
    let base_index = (fundamental_frequency / width).floor() as usize;

    let mut harmonics = [0.0; HARMONIC_COUNT];
    for (k, strength) in harmonics.iter_mut().enumerate() {
        let Some(target) = base_index.checked_mul(k + 1).filter(|&t| t < spectrum.len()) else {
            continue;
        };

        let start = target.saturating_sub(window);
        let end = target.saturating_add(window).min(spectrum.len() - 1);
        let buckets = &spectrum[start..=end];
        let sum: u32 = buckets.iter().map(|&m| m as u32).sum();
        let average = sum as f32 / buckets.len() as f32;

        *strength = 100.0 * average / 255.0;
    }
    Ok(harmonics)
}

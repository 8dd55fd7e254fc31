//! # Pitch Detection Module
//!
//! One detection pass: correlation, key-maximum extraction, note mapping
//! and harmonic sampling over a single window of audio.
//!
//! A pass keeps no state from the previous one. The only thing the
//! detector owns across passes is the correlation scratch buffer.

use serde::Serialize;

use crate::config::TunerConfig;
use crate::correlation::{LagWindow, correlate_into};
use crate::error::{TunerError, TunerResult};
use crate::harmonics::{HarmonicVector, sample_harmonics_with_window};
use crate::peaks::{Peak, find_peaks};
use crate::tuning::{Note, note_from_frequency};

/// Result of one detection pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// The detected note, absent when no usable peak was found.
    pub note: Option<Note>,
    /// Harmonic strengths of the detected note, absent with the note.
    pub harmonics: Option<HarmonicVector>,
    /// Key maxima of the correlation curve, in ascending lag order.
    #[serde(skip)]
    pub key_maxima: Vec<Peak>,
}

impl Detection {
    /// A pass that found no pitch.
    pub fn silent() -> Self {
        Self {
            note: None,
            harmonics: None,
            key_maxima: Vec::new(),
        }
    }

    /// Harmonic strengths as a slice, empty when no note was detected.
    pub fn harmonics(&self) -> &[f32] {
        self.harmonics.as_ref().map(|h| h.as_slice()).unwrap_or_default()
    }
}

/// Single-pass pitch detector for a fixed sample rate and buffer size.
#[derive(Debug, Clone)]
pub struct PitchDetector {
    sample_rate: u32,
    window: LagWindow,
    config: TunerConfig,
    n_dash: Vec<f32>,
}

impl PitchDetector {
    /// Builds a detector; fails on a zero sample rate or invalid config.
    pub fn new(sample_rate: u32, config: &TunerConfig) -> TunerResult<Self> {
        if sample_rate == 0 {
            return Err(TunerError::InvalidSampleRate(sample_rate));
        }
        config.validate()?;

        Ok(Self {
            sample_rate,
            window: config.lag_window(sample_rate),
            config: config.clone(),
            n_dash: vec![0.0; config.buffer_size],
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> usize {
        self.n_dash.len()
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Correlation curve of the last analysed buffer.
    pub fn correlation(&self) -> &[f32] {
        &self.n_dash
    }

    /// Runs a full pass over a time-domain window and its spectrum.
    ///
    /// # Errors
    /// * `BufferLengthMismatch` - `samples` does not match `buffer_size()`
    /// * `SpectrumLengthMismatch` - `spectrum` is not half of `buffer_size()`
    pub fn detect(&mut self, samples: &[f32], spectrum: &[u8]) -> TunerResult<Detection> {
        let expected_spectrum = self.buffer_size() / 2;
        if spectrum.len() != expected_spectrum {
            return Err(TunerError::SpectrumLengthMismatch {
                expected: expected_spectrum,
                actual: spectrum.len(),
            });
        }

        let (frequency, key_maxima) = self.find_period(samples)?;
        let note = frequency.and_then(|f| note_from_frequency(f, self.config.reference_pitch));

        let harmonics = match &note {
            Some(note) => Some(sample_harmonics_with_window(
                note.frequency,
                spectrum,
                self.sample_rate,
                self.config.harmonic_window,
            )?),
            None => None,
        };

        if let Some(note) = &note {
            log::debug!(
                "detected {} at {:.2} Hz ({:+.1} cents, {} key maxima)",
                note,
                note.frequency,
                note.cents(),
                key_maxima.len()
            );
        }

        Ok(Detection {
            note,
            harmonics,
            key_maxima,
        })
    }

    /// Estimates the fundamental frequency of a time-domain window.
    ///
    /// Returns `Ok(None)` for silence or when no key maximum survives.
    pub fn estimate_frequency(&mut self, samples: &[f32]) -> TunerResult<Option<f32>> {
        self.find_period(samples).map(|(frequency, _)| frequency)
    }

    fn find_period(&mut self, samples: &[f32]) -> TunerResult<(Option<f32>, Vec<Peak>)> {
        if samples.is_empty() {
            return Err(TunerError::EmptyBuffer);
        }
        if samples.len() != self.buffer_size() {
            return Err(TunerError::BufferLengthMismatch {
                expected: self.buffer_size(),
                actual: samples.len(),
            });
        }

        let rms = (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt();
        if rms < self.config.min_rms {
            log::trace!("rms {rms:.5} below noise floor, skipping pass");
            return Ok((None, Vec::new()));
        }

        correlate_into(samples, self.window, &mut self.n_dash)?;

        let key_maxima: Vec<Peak> = find_peaks(&self.n_dash, self.config.key_maximum_cut_off)
            .into_iter()
            .filter(|peak| peak.position >= 0.0)
            .collect();

        let frequency = key_maxima
            .first()
            .filter(|peak| peak.position.is_finite() && peak.position > 0.0)
            .map(|peak| self.sample_rate as f32 / peak.position)
            .filter(|f| f.is_finite());

        Ok((frequency, key_maxima))
    }
}

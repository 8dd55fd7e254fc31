//! # Configuration Module
//!
//! Every tunable constant of the engine lives in [`TunerConfig`]. The
//! defaults suit a chromatic instrument tuner: a 4096-sample window, a lag
//! search covering 25 Hz to 8 kHz, an 80 % key-maximum cut-off and a
//! 100 ms detection cadence.
//!
//! Configurations are plain serde values, so a host can keep them in a
//! JSON file next to its other settings. Missing fields take defaults.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::correlation::LagWindow;
use crate::error::{TunerError, TunerResult};

/// Lowest fundamental the lag search is allowed to report, in Hz.
pub const MIN_NOTE_FREQUENCY: f32 = 25.0;
/// Highest fundamental the lag search is allowed to report, in Hz.
pub const MAX_NOTE_FREQUENCY: f32 = 8_000.0;
/// Fraction of the global correlation maximum a peak must exceed.
pub const KEY_MAXIMUM_CUT_OFF: f32 = 0.8;
/// Fixed delay between two detection passes.
pub const NOTE_UPDATE_PERIOD_MS: u64 = 100;
/// Time-domain window length in samples.
pub const BUFFER_SIZE: usize = 4096;
/// RMS below which a buffer counts as silence (about -60 dBFS).
pub const DEFAULT_MIN_RMS: f32 = 0.001;
/// Bucket radius averaged around each harmonic.
pub const HARMONIC_WINDOW: usize = 5;
/// Frequency of A4 in Hz.
pub const REFERENCE_PITCH: f32 = 440.0;

/// Settings of the byte spectrum analyser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    /// Magnitude (dB) mapped to byte 0.
    pub min_decibels: f32,
    /// Magnitude (dB) mapped to byte 255.
    pub max_decibels: f32,
    /// Weight of the previous frame in the exponential smoothing, in [0, 1).
    pub smoothing_time_constant: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            min_decibels: -100.0,
            max_decibels: -10.0,
            smoothing_time_constant: 0.75,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub min_note_frequency: f32,
    pub max_note_frequency: f32,
    pub key_maximum_cut_off: f32,
    pub update_period_ms: u64,
    pub buffer_size: usize,
    /// Noise floor on buffer RMS. Zero disables the gate.
    pub min_rms: f32,
    pub harmonic_window: usize,
    pub reference_pitch: f32,
    pub analyser: AnalyserConfig,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            min_note_frequency: MIN_NOTE_FREQUENCY,
            max_note_frequency: MAX_NOTE_FREQUENCY,
            key_maximum_cut_off: KEY_MAXIMUM_CUT_OFF,
            update_period_ms: NOTE_UPDATE_PERIOD_MS,
            buffer_size: BUFFER_SIZE,
            min_rms: DEFAULT_MIN_RMS,
            harmonic_window: HARMONIC_WINDOW,
            reference_pitch: REFERENCE_PITCH,
            analyser: AnalyserConfig::default(),
        }
    }
}

impl TunerConfig {
    /// Checks every field and reports the first one that is out of range.
    pub fn validate(&self) -> TunerResult<()> {
        let invalid = |msg: String| -> TunerResult<()> { Err(TunerError::InvalidConfig(msg)) };

        if !(self.min_note_frequency.is_finite() && self.min_note_frequency > 0.0) {
            return invalid(format!(
                "min_note_frequency must be positive, got {}",
                self.min_note_frequency
            ));
        }
        if !(self.max_note_frequency.is_finite() && self.max_note_frequency > 0.0) {
            return invalid(format!(
                "max_note_frequency must be positive, got {}",
                self.max_note_frequency
            ));
        }
        if self.min_note_frequency >= self.max_note_frequency {
            return invalid(format!(
                "min_note_frequency ({}) must be below max_note_frequency ({})",
                self.min_note_frequency, self.max_note_frequency
            ));
        }
        if !(self.key_maximum_cut_off > 0.0 && self.key_maximum_cut_off <= 1.0) {
            return invalid(format!(
                "key_maximum_cut_off must be in (0, 1], got {}",
                self.key_maximum_cut_off
            ));
        }
        if self.update_period_ms == 0 {
            return invalid("update_period_ms must be non-zero".to_string());
        }
        if !self.buffer_size.is_power_of_two() || self.buffer_size < 4 {
            return invalid(format!(
                "buffer_size must be a power of two >= 4, got {}",
                self.buffer_size
            ));
        }
        if !(self.min_rms.is_finite() && self.min_rms >= 0.0) {
            return invalid(format!("min_rms must be non-negative, got {}", self.min_rms));
        }
        if !(self.reference_pitch.is_finite() && self.reference_pitch > 0.0) {
            return invalid(format!(
                "reference_pitch must be positive, got {}",
                self.reference_pitch
            ));
        }

        let analyser = &self.analyser;
        if !(analyser.min_decibels.is_finite() && analyser.max_decibels.is_finite())
            || analyser.min_decibels >= analyser.max_decibels
        {
            return invalid(format!(
                "analyser decibel range is empty: {}..{}",
                analyser.min_decibels, analyser.max_decibels
            ));
        }
        if !(0.0..1.0).contains(&analyser.smoothing_time_constant) {
            return invalid(format!(
                "analyser smoothing_time_constant must be in [0, 1), got {}",
                analyser.smoothing_time_constant
            ));
        }
        Ok(())
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> TunerResult<Self> {
        let config: TunerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_json_str(&json)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// The lag range searched for a period at `sample_rate`.
    pub fn lag_window(&self, sample_rate: u32) -> LagWindow {
        LagWindow::new(sample_rate, self.min_note_frequency, self.max_note_frequency)
    }

    pub fn update_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.update_period_ms)
    }
}

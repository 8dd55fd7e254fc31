//! # Error Module
//!
//! Errors reported by the pitch-estimation engine.
//!
//! The engine is pure computation, so the taxonomy is small. "No pitch
//! detected" is not an error: it is an absent `Note`. Everything here is
//! an integration bug on the caller's side (wrong buffer sizes, a bad
//! sample rate, an invalid configuration) or a lost detection worker.

use thiserror::Error;

/// Convenience alias for results returned by `tuner-core`.
pub type TunerResult<T> = Result<T, TunerError>;

/// Error types reported by the tuner engine.
#[derive(Error, Debug)]
pub enum TunerError {
    /// A sample buffer of length zero was supplied.
    #[error("sample buffer is empty")]
    EmptyBuffer,

    /// The sample rate was zero.
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// A fundamental frequency was not a finite, positive number.
    #[error("invalid fundamental frequency: {0} Hz")]
    InvalidFrequency(f32),

    /// A sample buffer did not have the length the detector was built for.
    #[error("sample buffer length mismatch: expected {expected}, got {actual}")]
    BufferLengthMismatch { expected: usize, actual: usize },

    /// A spectrum snapshot did not have half the sample buffer's length.
    #[error("spectrum length mismatch: expected {expected}, got {actual}")]
    SpectrumLengthMismatch { expected: usize, actual: usize },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration document could not be parsed.
    #[error("configuration parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// The session no longer owns its audio source.
    #[error("audio source is unavailable")]
    SourceUnavailable,

    /// The detection worker thread panicked.
    #[error("detection worker panicked")]
    WorkerPanicked,
}

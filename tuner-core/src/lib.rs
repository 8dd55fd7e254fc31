// tuner-core/src/lib.rs

//! The core logic for the instrument tuner.
//! This crate is responsible for pitch estimation, note mapping
//! and harmonic analysis of monophonic audio. It is completely headless
//! and contains no audio device or GUI code.
//!
//! ## Pipeline
//! A detection pass pulls a time-domain window and a byte spectrum from an
//! [`AudioSource`], then runs:
//! 1. [`correlation`]: normalised square difference over the note lag range
//! 2. [`peaks`]: key maxima of the correlation curve
//! 3. [`tuning`]: first key maximum → frequency → note and tuning error
//! 4. [`harmonics`]: relative strength of harmonics 1 to 12
//!
//! [`TunerSession`] repeats the pass on a fixed cadence and feeds a sink.

pub mod audio;
pub mod config;
pub mod correlation;
pub mod detector;
pub mod error;
pub mod fft;
pub mod harmonics;
pub mod peaks;
pub mod session;
pub mod tuning;

pub use audio::{AudioSource, ChannelSource, SignalSource};
pub use config::{AnalyserConfig, TunerConfig};
pub use correlation::{LagWindow, correlate};
pub use detector::{Detection, PitchDetector};
pub use error::{TunerError, TunerResult};
pub use harmonics::{HARMONIC_COUNT, HarmonicVector, sample_harmonics};
pub use peaks::{Peak, find_peaks};
pub use session::{ResultSink, TunerSession};
pub use tuning::{Note, Tuning, estimate_frequency_to_note};

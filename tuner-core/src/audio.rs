//! # Audio Source Module
//!
//! The engine never touches an audio device. It pulls the most recent
//! time-domain window and the matching byte spectrum from an
//! [`AudioSource`] once per detection pass.
//!
//! ## Provided sources
//! - [`ChannelSource`]: a capture callback pushes sample chunks through a
//!   crossbeam channel; the source keeps the newest window.
//! - [`SignalSource`]: a fixed in-memory signal read as a looping window,
//!   for offline runs and tests.

use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::config::AnalyserConfig;
use crate::error::{TunerError, TunerResult};
use crate::fft::SpectrumAnalyser;

/// Supplier of audio windows for the detection cycle.
///
/// The sample rate and buffer size must stay fixed for the lifetime of a
/// session. `fill_spectrum` writes `buffer_size() / 2` buckets.
pub trait AudioSource: Send {
    fn sample_rate(&self) -> u32;

    fn buffer_size(&self) -> usize;

    /// Copies the most recent time-domain window into `buffer`.
    fn fill_time_domain(&mut self, buffer: &mut [f32]) -> TunerResult<()>;

    /// Writes the magnitude spectrum of the most recent window into `spectrum`.
    fn fill_spectrum(&mut self, spectrum: &mut [u8]) -> TunerResult<()>;
}

fn check_len(expected: usize, actual: usize) -> TunerResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(TunerError::BufferLengthMismatch { expected, actual })
    }
}

/// Source fed by a capture callback through a channel.
///
/// Each fill drains whatever chunks arrived since the previous pass and
/// keeps the newest `buffer_size` samples. Until enough audio has arrived
/// the window is zero-padded at the start.
#[derive(Debug)]
pub struct ChannelSource {
    sample_rate: u32,
    receiver: Receiver<Vec<f32>>,
    history: VecDeque<f32>,
    window: Vec<f32>,
    analyser: SpectrumAnalyser,
    disconnected: bool,
}

impl ChannelSource {
    /// Creates the source and the sender a capture callback should push into.
    pub fn new(
        sample_rate: u32,
        buffer_size: usize,
        analyser: AnalyserConfig,
    ) -> TunerResult<(Self, Sender<Vec<f32>>)> {
        if sample_rate == 0 {
            return Err(TunerError::InvalidSampleRate(sample_rate));
        }
        let (sender, receiver) = crossbeam_channel::unbounded();
        let source = Self {
            sample_rate,
            receiver,
            history: VecDeque::with_capacity(buffer_size * 2),
            window: vec![0.0; buffer_size],
            analyser: SpectrumAnalyser::new(buffer_size, analyser)?,
            disconnected: false,
        };
        Ok((source, sender))
    }

    /// Pulls pending chunks and rebuilds the window.
    fn refresh(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(chunk) => self.history.extend(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        log::warn!("capture channel closed, holding the last window");
                        self.disconnected = true;
                    }
                    break;
                }
            }
        }

        let size = self.window.len();
        if self.history.len() > size {
            self.history.drain(..self.history.len() - size);
        }

        let padding = size - self.history.len();
        self.window[..padding].fill(0.0);
        for (slot, &sample) in self.window[padding..].iter_mut().zip(&self.history) {
            *slot = sample;
        }
    }
}

impl AudioSource for ChannelSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_size(&self) -> usize {
        self.window.len()
    }

    fn fill_time_domain(&mut self, buffer: &mut [f32]) -> TunerResult<()> {
        check_len(self.window.len(), buffer.len())?;
        self.refresh();
        buffer.copy_from_slice(&self.window);
        Ok(())
    }

    fn fill_spectrum(&mut self, spectrum: &mut [u8]) -> TunerResult<()> {
        self.analyser.analyse(&self.window, spectrum)
    }
}

/// Source reading a fixed signal as a looping window.
///
/// Every `fill_time_domain` moves the window forward by `hop` samples, so
/// successive passes see successive stretches of the signal.
#[derive(Debug)]
pub struct SignalSource {
    sample_rate: u32,
    signal: Vec<f32>,
    position: usize,
    hop: usize,
    window: Vec<f32>,
    analyser: SpectrumAnalyser,
}

impl SignalSource {
    pub fn new(
        sample_rate: u32,
        signal: Vec<f32>,
        buffer_size: usize,
        analyser: AnalyserConfig,
    ) -> TunerResult<Self> {
        if sample_rate == 0 {
            return Err(TunerError::InvalidSampleRate(sample_rate));
        }
        if signal.is_empty() {
            return Err(TunerError::EmptyBuffer);
        }
        Ok(Self {
            sample_rate,
            signal,
            position: 0,
            hop: buffer_size,
            window: vec![0.0; buffer_size],
            analyser: SpectrumAnalyser::new(buffer_size, analyser)?,
        })
    }

    /// Sets how far the window advances per pass.
    pub fn with_hop(mut self, hop: usize) -> Self {
        self.hop = hop;
        self
    }

    /// Current read position in the signal, in samples.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl AudioSource for SignalSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_size(&self) -> usize {
        self.window.len()
    }

    fn fill_time_domain(&mut self, buffer: &mut [f32]) -> TunerResult<()> {
        check_len(self.window.len(), buffer.len())?;
        let len = self.signal.len();
        for (i, slot) in self.window.iter_mut().enumerate() {
            *slot = self.signal[(self.position + i) % len];
        }
        self.position = (self.position + self.hop) % len;
        buffer.copy_from_slice(&self.window);
        Ok(())
    }

    fn fill_spectrum(&mut self, spectrum: &mut [u8]) -> TunerResult<()> {
        self.analyser.analyse(&self.window, spectrum)
    }
}

/// Synthesises `len` samples of a tone with the given partial amplitudes.
///
/// `partials[0]` is the fundamental's amplitude, `partials[1]` the second
/// harmonic's, and so on.
pub fn harmonic_tone(sample_rate: u32, frequency: f32, partials: &[f32], len: usize) -> Vec<f32> {
    let step = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    (0..len)
        .map(|i| {
            partials
                .iter()
                .enumerate()
                .map(|(k, &amp)| amp as f64 * (step * (k + 1) as f64 * i as f64).sin())
                .sum::<f64>() as f32
        })
        .collect()
}

/// Synthesises `len` samples of a pure sine.
pub fn sine_wave(sample_rate: u32, frequency: f32, amplitude: f32, len: usize) -> Vec<f32> {
    harmonic_tone(sample_rate, frequency, &[amplitude], len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_source_keeps_the_newest_window() {
        let (mut source, sender) =
            ChannelSource::new(44_100, 8, AnalyserConfig::default()).unwrap();
        sender.send(vec![1.0, 2.0, 3.0]).unwrap();

        let mut buffer = [9.0; 8];
        source.fill_time_domain(&mut buffer).unwrap();
        assert_eq!(buffer, [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);

        sender.send((4..=10).map(|v| v as f32).collect()).unwrap();
        source.fill_time_domain(&mut buffer).unwrap();
        assert_eq!(buffer, [3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn channel_source_survives_a_closed_sender() {
        let (mut source, sender) =
            ChannelSource::new(44_100, 4, AnalyserConfig::default()).unwrap();
        sender.send(vec![0.5; 4]).unwrap();
        drop(sender);

        let mut buffer = [0.0; 4];
        source.fill_time_domain(&mut buffer).unwrap();
        source.fill_time_domain(&mut buffer).unwrap();
        assert_eq!(buffer, [0.5; 4]);

        let mut spectrum = [0u8; 2];
        source.fill_spectrum(&mut spectrum).unwrap();
    }

    #[test]
    fn signal_source_loops_and_advances() {
        let signal: Vec<f32> = (0..6).map(|v| v as f32).collect();
        let mut source = SignalSource::new(8_000, signal, 4, AnalyserConfig::default())
            .unwrap()
            .with_hop(3);

        let mut buffer = [0.0; 4];
        source.fill_time_domain(&mut buffer).unwrap();
        assert_eq!(buffer, [0.0, 1.0, 2.0, 3.0]);
        source.fill_time_domain(&mut buffer).unwrap();
        assert_eq!(buffer, [3.0, 4.0, 5.0, 0.0]);
        assert_eq!(source.position(), 0);
    }

    #[test]
    fn sources_reject_wrong_buffer_lengths() {
        let mut source =
            SignalSource::new(8_000, vec![0.1; 32], 16, AnalyserConfig::default()).unwrap();
        let mut wrong = [0.0; 8];
        assert!(matches!(
            source.fill_time_domain(&mut wrong),
            Err(TunerError::BufferLengthMismatch { expected: 16, actual: 8 })
        ));
        let mut spectrum = [0u8; 4];
        assert!(matches!(
            source.fill_spectrum(&mut spectrum),
            Err(TunerError::SpectrumLengthMismatch { expected: 8, actual: 4 })
        ));
    }

    #[test]
    fn empty_signal_is_rejected() {
        assert!(matches!(
            SignalSource::new(8_000, Vec::new(), 16, AnalyserConfig::default()),
            Err(TunerError::EmptyBuffer)
        ));
    }

    #[test]
    fn harmonic_tone_sums_partials() {
        let tone = harmonic_tone(8_000, 1_000.0, &[1.0, 0.5], 8);
        // At i = 2 the fundamental is at 90° and the second harmonic at 180°.
        assert!((tone[2] - 1.0).abs() < 1e-5);
        assert!(sine_wave(8_000, 1_000.0, 1.0, 4).iter().all(|v| v.abs() <= 1.0));
    }
}

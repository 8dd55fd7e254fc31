//! # Detection Session Module
//!
//! Runs detection passes on a fixed cadence and hands every result to a
//! caller-supplied sink.
//!
//! ## Architecture
//! - **Caller thread**: owns the [`TunerSession`] value and calls `start`/`stop`
//! - **Detection thread**: one worker per running session, owns the audio
//!   source while running and gives it back when joined
//! - **Cadence**: fixed delay; the worker waits `update_period_ms` after a
//!   pass finishes, so a slow pass pushes later ones back instead of
//!   overlapping them
//! - **Cancellation**: the wait is a `recv_timeout` on a shutdown channel,
//!   so `stop` wakes the worker immediately
//!
//! A session is Idle or Running. Starting a running session stops the
//! current worker first, so there is never more than one worker alive.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::audio::AudioSource;
use crate::config::TunerConfig;
use crate::detector::{Detection, PitchDetector};
use crate::error::{TunerError, TunerResult};

/// Receiver of detection results.
///
/// Called inline on the detection thread once per pass, so it must return
/// quickly.
pub trait ResultSink: Send + 'static {
    fn on_detection(&mut self, detection: &Detection);
}

impl<F> ResultSink for F
where
    F: FnMut(&Detection) + Send + 'static,
{
    fn on_detection(&mut self, detection: &Detection) {
        self(detection)
    }
}

/// Handle to a running detection thread.
#[derive(Debug)]
struct Worker<S> {
    shutdown_tx: Sender<()>,
    thread_handle: JoinHandle<(S, TunerResult<()>)>,
}

/// An explicit tuner session over one audio source.
#[derive(Debug)]
pub struct TunerSession<S: AudioSource + 'static> {
    config: TunerConfig,
    source: Option<S>,
    worker: Option<Worker<S>>,
}

impl<S: AudioSource + 'static> TunerSession<S> {
    /// Creates an idle session.
    ///
    /// # Errors
    /// * `InvalidConfig` - the configuration does not validate
    /// * `InvalidSampleRate` - the source reports a zero sample rate
    /// * `BufferLengthMismatch` - the source's window differs from `config.buffer_size`
    pub fn new(source: S, config: TunerConfig) -> TunerResult<Self> {
        config.validate()?;
        if source.sample_rate() == 0 {
            return Err(TunerError::InvalidSampleRate(0));
        }
        if source.buffer_size() != config.buffer_size {
            return Err(TunerError::BufferLengthMismatch {
                expected: config.buffer_size,
                actual: source.buffer_size(),
            });
        }
        Ok(Self {
            config,
            source: Some(source),
            worker: None,
        })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Whether a detection thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.thread_handle.is_finished())
    }

    /// Starts the detection cycle, restarting it if it is already running.
    ///
    /// The first pass runs immediately; later passes follow at the
    /// configured fixed delay.
    pub fn start(&mut self, sink: impl ResultSink) -> TunerResult<()> {
        if self.worker.is_some() {
            if let Err(e) = self.stop() {
                log::warn!("previous detection run ended with an error: {e}");
            }
        }

        let source = self.source.take().ok_or(TunerError::SourceUnavailable)?;
        let detector = match PitchDetector::new(source.sample_rate(), &self.config) {
            Ok(detector) => detector,
            Err(e) => {
                self.source = Some(source);
                return Err(e);
            }
        };

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let period = self.config.update_period();
        log::info!(
            "starting detection at {} Hz, {} samples every {:?}",
            source.sample_rate(),
            detector.buffer_size(),
            period
        );

        let thread_handle =
            thread::spawn(move || run_cycle(source, detector, sink, shutdown_rx, period));
        self.worker = Some(Worker {
            shutdown_tx,
            thread_handle,
        });
        Ok(())
    }

    /// Starts the cycle and returns its results as a bounded channel.
    ///
    /// When the consumer falls more than `capacity` results behind, new
    /// results are dropped. The channel disconnects once the session stops.
    pub fn start_channel(&mut self, capacity: usize) -> TunerResult<Receiver<Detection>> {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        self.start(move |detection: &Detection| {
            if tx.try_send(detection.clone()).is_err() {
                log::trace!("result channel full or closed, dropping detection");
            }
        })?;
        Ok(rx)
    }

    /// Stops the cycle and waits for the detection thread to exit.
    ///
    /// Stopping an idle session does nothing. If the last run ended because
    /// a pass failed, that error is returned here.
    pub fn stop(&mut self) -> TunerResult<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        // The worker may already have exited on an error; then nobody listens.
        let _ = worker.shutdown_tx.try_send(());

        match worker.thread_handle.join() {
            Ok((source, outcome)) => {
                self.source = Some(source);
                log::info!("detection stopped");
                outcome
            }
            Err(_) => {
                log::error!("detection thread panicked, audio source lost");
                Err(TunerError::WorkerPanicked)
            }
        }
    }

    /// Stops the session and returns its audio source.
    pub fn into_source(mut self) -> TunerResult<S> {
        self.stop()?;
        self.source.take().ok_or(TunerError::SourceUnavailable)
    }
}

impl<S: AudioSource + 'static> Drop for TunerSession<S> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("error while dropping tuner session: {e}");
        }
    }
}

/// Body of the detection thread. Returns the source for reuse.
fn run_cycle<S: AudioSource>(
    mut source: S,
    mut detector: PitchDetector,
    mut sink: impl ResultSink,
    shutdown_rx: Receiver<()>,
    period: Duration,
) -> (S, TunerResult<()>) {
    let mut samples = vec![0.0f32; detector.buffer_size()];
    let mut spectrum = vec![0u8; detector.buffer_size() / 2];

    let outcome = loop {
        match run_pass(&mut source, &mut detector, &mut samples, &mut spectrum) {
            Ok(detection) => sink.on_detection(&detection),
            Err(e) => {
                log::error!("detection pass failed: {e}");
                break Err(e);
            }
        }

        match shutdown_rx.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break Ok(()),
        }
    };

    (source, outcome)
}

/// One pass: pull both buffers from the source, then detect.
fn run_pass<S: AudioSource>(
    source: &mut S,
    detector: &mut PitchDetector,
    samples: &mut [f32],
    spectrum: &mut [u8],
) -> TunerResult<Detection> {
    source.fill_time_domain(samples)?;
    source.fill_spectrum(spectrum)?;
    detector.detect(samples, spectrum)
}

//! # Tuner CLI - Headless Tuner Host
//!
//! Runs the tuner engine over a WAV file (or a synthesised tone) at
//! real-time pace and prints one line per detection pass.
//!
//! ## Architecture
//! - **Main Thread**: owns the tuner session and prints results
//! - **Feeder Thread**: pushes audio chunks into the session's channel
//!   source at playback speed, the way a capture callback would
//! - **Detection Thread**: spawned by the session, one pass per period
//!
//! ## Usage
//! ```text
//! tuner-cli <input.wav> [--config tuner.json]
//! tuner-cli --tone <hz> [--seconds <s>] [--config tuner.json]
//! ```

mod display;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::Sender;
use tuner_core::audio::harmonic_tone;
use tuner_core::{ChannelSource, TunerConfig, TunerSession};

/// Samples per chunk pushed by the feeder thread.
const CHUNK_SIZE: usize = 512;
/// Sample rate used for synthesised tones.
const TONE_SAMPLE_RATE: u32 = 44_100;

/// Where the audio comes from.
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Wav(PathBuf),
    Tone { frequency: f32, seconds: f32 },
}

#[derive(Debug, Clone, PartialEq)]
struct Options {
    input: Input,
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    let options = parse_args(std::env::args().skip(1))?;
    let config = match &options.config {
        Some(path) => TunerConfig::load(path)?,
        None => TunerConfig::default(),
    };
    log::info!("[MAIN] Using configuration: {:?}", config);

    let (sample_rate, samples) = match &options.input {
        Input::Wav(path) => read_wav(path)?,
        Input::Tone { frequency, seconds } => {
            let len = (TONE_SAMPLE_RATE as f32 * seconds) as usize;
            let tone = harmonic_tone(TONE_SAMPLE_RATE, *frequency, &[0.5, 0.25, 0.12, 0.06], len);
            (TONE_SAMPLE_RATE, tone)
        }
    };

    run(sample_rate, samples, config)
}

/// Feeds `samples` through a tuner session and prints every detection.
fn run(sample_rate: u32, samples: Vec<f32>, config: TunerConfig) -> Result<()> {
    let (source, sender) =
        ChannelSource::new(sample_rate, config.buffer_size, config.analyser.clone())?;
    let mut session = TunerSession::new(source, config)?;
    let results = session.start_channel(16)?;

    let feeder = thread::spawn(move || feed(sender, samples, sample_rate));

    // The feeder drops its sender when done; poll until then.
    while !feeder.is_finished() {
        if let Ok(detection) = results.recv_timeout(Duration::from_millis(250)) {
            println!("{}", display::format_detection(&detection));
        }
    }

    feeder
        .join()
        .map_err(|_| anyhow!("feeder thread panicked"))?;
    session.stop().context("detection session failed")?;

    for detection in results.try_iter() {
        println!("{}", display::format_detection(&detection));
    }
    Ok(())
}

/// Pushes `samples` in chunks at real-time pace, like a capture callback.
fn feed(sender: Sender<Vec<f32>>, samples: Vec<f32>, sample_rate: u32) {
    let chunk_duration = Duration::from_secs_f64(CHUNK_SIZE as f64 / sample_rate as f64);
    for chunk in samples.chunks(CHUNK_SIZE) {
        if sender.send(chunk.to_vec()).is_err() {
            log::warn!("[FEEDER] Session closed its source, stopping playback");
            return;
        }
        thread::sleep(chunk_duration);
    }
    log::info!("[FEEDER] Finished feeding {} samples", samples.len());
}

/// Reads a WAV file and mixes it down to mono `f32` in [-1, 1].
fn read_wav(path: &Path) -> Result<(u32, Vec<f32>)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    log::info!(
        "[MAIN] {}: {} Hz, {} channel(s), {} bit {:?}",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("failed to decode float samples")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("failed to decode integer samples")?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok((spec.sample_rate, mono))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Options> {
    let mut args = args.into_iter();
    let mut wav = None;
    let mut tone = None;
    let mut seconds = 3.0f32;
    let mut config = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--tone" => {
                let value = args.next().ok_or_else(|| anyhow!("--tone needs a frequency"))?;
                let frequency = value
                    .parse::<f32>()
                    .with_context(|| format!("bad frequency '{value}'"))?;
                tone = Some(frequency);
            }
            "--seconds" => {
                let value = args.next().ok_or_else(|| anyhow!("--seconds needs a value"))?;
                seconds = value.parse().with_context(|| format!("bad duration '{value}'"))?;
            }
            "--config" => {
                let value = args.next().ok_or_else(|| anyhow!("--config needs a path"))?;
                config = Some(PathBuf::from(value));
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            path => wav = Some(PathBuf::from(path)),
        }
    }

    let input = match (wav, tone) {
        (Some(path), None) => Input::Wav(path),
        (None, Some(frequency)) if frequency > 0.0 && seconds > 0.0 => {
            Input::Tone { frequency, seconds }
        }
        (None, Some(_)) => bail!("tone frequency and duration must be positive"),
        (Some(_), Some(_)) => bail!("give either a WAV file or --tone, not both"),
        (None, None) => bail!(
            "usage: tuner-cli <input.wav> | --tone <hz> [--seconds <s>] [--config <file>]"
        ),
    };
    Ok(Options { input, config })
}

//! Text rendering of detection results.

use tuner_core::Detection;
use tuner_core::tuning::Tuning;

/// Fraction of a semitone within which a note counts as in tune.
const IN_TUNE_TOLERANCE: f32 = 0.05;

/// Formats one detection as a single line.
///
/// An absent note prints as `-`, mirroring an idle tuner display.
pub fn format_detection(detection: &Detection) -> String {
    let Some(note) = &detection.note else {
        return "-".to_string();
    };

    let verdict = match note.tuning(IN_TUNE_TOLERANCE) {
        Tuning::Flat => "flat",
        Tuning::InTune => "in tune",
        Tuning::Sharp => "sharp",
        Tuning::Unknown => "?",
    };

    // Cents are shown with two decimals.
    let cents = (note.cents() * 100.0).round() / 100.0;
    let harmonics: Vec<String> = detection
        .harmonics()
        .iter()
        .map(|h| format!("{:.0}", h))
        .collect();

    format!(
        "{:<4} {:>8.2} Hz {:>+7.2} cents  {:<7}  [{}]",
        note.to_string(),
        note.frequency,
        cents,
        verdict,
        harmonics.join(" ")
    )
}

//! # Musical Tuning Module
//!
//! Maps a frequency estimate to the nearest equal-tempered note and a
//! signed tuning error.
//!
//! ## Conventions
//! - A4 = MIDI 69 = 440 Hz unless another reference pitch is given
//! - Octaves change at C: MIDI 60 is C4
//! - Note names use a fixed chromatic table, not key-aware spelling
//! - The error is a fraction of the distance to the neighbouring semitone:
//!   positive when sharp, negative when flat, magnitude near 0.5 at a
//!   quarter tone

use std::fmt;

use serde::Serialize;

use crate::config::REFERENCE_PITCH;

/// MIDI number of the reference pitch (A4).
pub const REFERENCE_MIDI: i32 = 69;

/// Chromatic note names indexed by `midi mod 12`, starting at C.
pub const CHROMATIC_NAMES: [&str; 12] = [
    "C", "C♯", "D", "E♭", "E", "F", "F♯", "G", "G♯", "A", "B♭", "B",
];

/// A detected note. Produced fresh for every detection pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    /// Nearest MIDI note number.
    pub midi_number: i32,
    /// Scientific octave number, `floor(midi / 12) - 1`.
    pub octave_number: i32,
    /// Entry of [`CHROMATIC_NAMES`].
    pub note_name: &'static str,
    /// The frequency estimate that produced this note, in Hz.
    pub frequency: f32,
    /// Signed fraction of a semitone. NaN means unknown, never in tune.
    pub error: f32,
}

/// Coarse tuning verdict for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tuning {
    Flat,
    InTune,
    Sharp,
    Unknown,
}

impl Note {
    /// Tuning error in cents.
    pub fn cents(&self) -> f32 {
        self.error * 100.0
    }

    /// Classifies the error against a tolerance given in fractions of a semitone.
    pub fn tuning(&self, tolerance: f32) -> Tuning {
        if self.error.is_nan() {
            Tuning::Unknown
        } else if self.error.abs() <= tolerance {
            Tuning::InTune
        } else if self.error > 0.0 {
            Tuning::Sharp
        } else {
            Tuning::Flat
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.note_name, self.octave_number)
    }
}

/// Equal-tempered frequency of a MIDI note, with A4 at 440 Hz.
pub fn note_to_frequency(midi_number: i32) -> f32 {
    note_to_frequency_with_reference(midi_number, REFERENCE_PITCH) as f32
}

/// Nearest MIDI note to `frequency`, with A4 at 440 Hz.
///
/// Exact quarter-tone midpoints round upwards, counted in semitones from
/// A4: +50 cents goes to the note above, -50 cents stays on the note.
pub fn frequency_to_midi(frequency: f32) -> i32 {
    frequency_to_midi_with_reference(frequency as f64, REFERENCE_PITCH)
}

/// Converts a frequency estimate into a note, with A4 at 440 Hz.
///
/// Absent, non-finite or non-positive input yields no note.
pub fn estimate_frequency_to_note(frequency: Option<f32>) -> Option<Note> {
    frequency.and_then(|f| note_from_frequency(f, REFERENCE_PITCH))
}

/// Converts a frequency into a note against an arbitrary A4 reference.
pub fn note_from_frequency(frequency: f32, reference_pitch: f32) -> Option<Note> {
    if !(frequency.is_finite() && frequency > 0.0) {
        return None;
    }

    let freq = frequency as f64;
    let midi_number = frequency_to_midi_with_reference(freq, reference_pitch);
    let octave_number = midi_number.div_euclid(12) - 1;
    let note_name = CHROMATIC_NAMES[midi_number.rem_euclid(12) as usize];

    let expected = note_to_frequency_with_reference(midi_number, reference_pitch);
    let next = note_to_frequency_with_reference(midi_number + 1, reference_pitch);
    let previous = note_to_frequency_with_reference(midi_number - 1, reference_pitch);

    // Sharp readings are scaled by the gap to the note below, flat readings
    // by the gap to the note above.
    let error = if freq > expected {
        -(freq - expected) / (previous - expected)
    } else {
        (freq - expected) / (next - expected)
    };

    Some(Note {
        midi_number,
        octave_number,
        note_name,
        frequency,
        error: error as f32,
    })
}

fn note_to_frequency_with_reference(midi_number: i32, reference_pitch: f32) -> f64 {
    reference_pitch as f64 * 2f64.powf((midi_number - REFERENCE_MIDI) as f64 / 12.0)
}

fn frequency_to_midi_with_reference(frequency: f64, reference_pitch: f32) -> i32 {
    let semitones = 12.0 * (frequency / reference_pitch as f64).log2();
    round_half_up(semitones) + REFERENCE_MIDI
}

/// Rounds to the nearest integer, ties towards positive infinity.
fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn detuned(base: f32, semitones: f32) -> f32 {
        base * 2f32.powf(semitones / 12.0)
    }

    #[test]
    fn a440_is_in_tune() {
        let note = estimate_frequency_to_note(Some(440.0)).unwrap();
        assert_eq!(note.midi_number, 69);
        assert_eq!(note.octave_number, 4);
        assert_eq!(note.note_name, "A");
        assert!(note.error.abs() < 1e-6);
        assert_eq!(note.tuning(0.05), Tuning::InTune);
        assert_eq!(note.to_string(), "A4");
    }

    #[test]
    fn absent_frequency_gives_absent_note() {
        assert_eq!(estimate_frequency_to_note(None), None);
        assert_eq!(estimate_frequency_to_note(Some(0.0)), None);
        assert_eq!(estimate_frequency_to_note(Some(-3.0)), None);
        assert_eq!(estimate_frequency_to_note(Some(f32::NAN)), None);
        assert_eq!(estimate_frequency_to_note(Some(f32::INFINITY)), None);
    }

    #[test]
    fn quarter_tone_sharp_reads_about_half() {
        let note = estimate_frequency_to_note(Some(detuned(440.0, 0.49))).unwrap();
        assert_eq!(note.midi_number, 69);
        assert_abs_diff_eq!(note.error, 0.5, epsilon = 0.05);
        assert_eq!(note.tuning(0.05), Tuning::Sharp);
    }

    #[test]
    fn exact_quarter_tone_sharp_stays_on_the_note() {
        // 440 * 2^(0.5 / 12) as the nearest f32, just below the midpoint.
        let note = estimate_frequency_to_note(Some(452.89297)).unwrap();
        assert_eq!(note.midi_number, 69);
        assert_eq!(note.note_name, "A");
        // Sharp readings are scaled by the wider gap down to G♯4.
        assert_abs_diff_eq!(note.error, 0.522_082, epsilon = 1e-4);
    }

    #[test]
    fn midpoints_round_towards_the_higher_note() {
        assert_eq!(round_half_up(0.5), 1);
        assert_eq!(round_half_up(-0.5), 0);
        assert_eq!(round_half_up(-1.5), -1);
        assert_eq!(round_half_up(2.4999), 2);
        assert_eq!(round_half_up(-2.5001), -3);
    }

    #[test]
    fn quarter_tone_flat_reads_about_minus_half() {
        let note = estimate_frequency_to_note(Some(detuned(440.0, -0.49))).unwrap();
        assert_eq!(note.midi_number, 69);
        assert_abs_diff_eq!(note.error, -0.5, epsilon = 0.05);
        assert_eq!(note.tuning(0.05), Tuning::Flat);
    }

    #[test]
    fn error_is_monotonic_within_a_note() {
        let mut previous_error = f32::NEG_INFINITY;
        for step in -49..=49 {
            let freq = detuned(440.0, step as f32 / 100.0);
            let note = estimate_frequency_to_note(Some(freq)).unwrap();
            assert_eq!(note.midi_number, 69);
            assert!(
                note.error >= previous_error,
                "error decreased at {freq} Hz: {} < {previous_error}",
                note.error
            );
            previous_error = note.error;
        }
    }

    #[test]
    fn names_and_octaves_follow_the_chromatic_table() {
        let middle_c = estimate_frequency_to_note(Some(261.63)).unwrap();
        assert_eq!(
            (middle_c.midi_number, middle_c.note_name, middle_c.octave_number),
            (60, "C", 4)
        );

        let b_flat = estimate_frequency_to_note(Some(233.08)).unwrap();
        assert_eq!(b_flat.to_string(), "B♭3");

        let low_e = estimate_frequency_to_note(Some(41.2)).unwrap();
        assert_eq!(low_e.to_string(), "E1");

        let e_flat = estimate_frequency_to_note(Some(622.25)).unwrap();
        assert_eq!(e_flat.note_name, "E♭");
    }

    #[test]
    fn very_low_frequencies_keep_a_valid_name() {
        let note = estimate_frequency_to_note(Some(5.0)).unwrap();
        assert!(note.midi_number < 0);
        assert!(CHROMATIC_NAMES.contains(&note.note_name));
        assert_eq!(note.octave_number, note.midi_number.div_euclid(12) - 1);
    }

    #[test]
    fn conversions_round_trip_on_note_centres() {
        for midi in 21..=108 {
            assert_eq!(frequency_to_midi(note_to_frequency(midi)), midi);
        }
        assert_relative_eq!(note_to_frequency(69), 440.0);
        assert_relative_eq!(note_to_frequency(81), 880.0, max_relative = 1e-6);
    }

    #[test]
    fn reference_pitch_shifts_the_grid() {
        let note = note_from_frequency(442.0, 442.0).unwrap();
        assert_eq!(note.midi_number, 69);
        assert!(note.error.abs() < 1e-6);

        let sharp = note_from_frequency(442.0, 440.0).unwrap();
        assert!(sharp.error > 0.0);
    }

    #[test]
    fn cents_and_unknown_error() {
        let note = Note {
            midi_number: 69,
            octave_number: 4,
            note_name: "A",
            frequency: 440.0,
            error: 0.25,
        };
        assert_abs_diff_eq!(note.cents(), 25.0);

        let unknown = Note { error: f32::NAN, ..note };
        assert_eq!(unknown.tuning(0.05), Tuning::Unknown);
    }
}

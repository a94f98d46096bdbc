//! # Musical Tuning Module
//!
//! Maps a fundamental frequency onto the equal-tempered MIDI grid
//! (A4 = 440 Hz = MIDI 69) and measures the deviation in cents.
//!
//! ## Cents folding
//! Cents are measured against the rounded MIDI note and then folded once:
//! values `<= -50` gain 100 and values `> 50` lose 100, so readings land in
//! `(-50, 50]`. The note number is *not* adjusted by the fold; a reading at
//! exactly -50 cents reports `+50` against the same note.

use once_cell::sync::Lazy;

use crate::NoteReading;

/// MIDI note number of the reference pitch A4.
pub const A4_MIDI: u8 = 69;

/// Reference frequency of A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;

pub const MIDI_MIN: u8 = 0;
pub const MIDI_MAX: u8 = 127;

/// Preferred spelling for the five black-key pitch classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accidentals {
    #[default]
    Sharps,
    Flats,
}

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Names with octave for all 128 MIDI notes, `(sharps, flats)`.
///
/// Octave numbering puts middle C (MIDI 60) in octave 4.
static NOTE_NAMES: Lazy<Vec<(String, String)>> = Lazy::new(|| {
    (0..=MIDI_MAX as usize)
        .map(|midi| {
            let pitch_class = midi % 12;
            let octave = midi as i32 / 12 - 1;
            (
                format!("{}{}", SHARP_NAMES[pitch_class], octave),
                format!("{}{}", FLAT_NAMES[pitch_class], octave),
            )
        })
        .collect()
});

/// Nearest MIDI note to `freq`, clamped to [0, 127].
///
/// Non-positive frequencies map to A4. Halfway cases round away from zero.
pub fn freq_to_midi(freq: f64) -> u8 {
    if freq <= 0.0 || !freq.is_finite() {
        return A4_MIDI;
    }
    let midi = (A4_MIDI as f64 + 12.0 * (freq / A4_FREQUENCY).log2()).round();
    midi.clamp(MIDI_MIN as f64, MIDI_MAX as f64) as u8
}

/// Exact equal-tempered frequency of a MIDI note.
pub fn midi_to_freq(midi: u8) -> f64 {
    A4_FREQUENCY * 2.0_f64.powf((midi as f64 - A4_MIDI as f64) / 12.0)
}

/// Deviation of `freq` from `midi`'s exact frequency, in cents (unfolded).
pub fn cents_delta(freq: f64, midi: u8) -> f64 {
    1200.0 * (freq / midi_to_freq(midi)).log2()
}

/// Folds a cents value once by ±100 into `(-50, 50]`.
pub fn fold_cents(cents: f64) -> f64 {
    let mut cents = cents;
    if cents <= -50.0 {
        cents += 100.0;
    }
    if cents > 50.0 {
        cents -= 100.0;
    }
    cents
}

/// Name of a MIDI note, e.g. `"A4"`, `"C#3"` or `"Bb"`.
///
/// Out-of-range values are clamped to [0, 127].
pub fn note_name(midi: u8, accidentals: Accidentals, with_octave: bool) -> String {
    let midi = midi.min(MIDI_MAX);
    if with_octave {
        let (sharp, flat) = &NOTE_NAMES[midi as usize];
        match accidentals {
            Accidentals::Sharps => sharp.clone(),
            Accidentals::Flats => flat.clone(),
        }
    } else {
        let pitch_class = midi as usize % 12;
        match accidentals {
            Accidentals::Sharps => SHARP_NAMES[pitch_class].to_string(),
            Accidentals::Flats => FLAT_NAMES[pitch_class].to_string(),
        }
    }
}

impl NoteReading {
    /// The reading reported for silence and for "no pitch": A4, 0 cents, 0 Hz.
    pub const IDLE: NoteReading = NoteReading {
        midi: A4_MIDI,
        cents: 0.0,
        frequency_hz: 0.0,
        confidence: 0.0,
    };

    /// Maps a detected frequency onto the nearest note.
    pub fn from_frequency(frequency_hz: f64, confidence: f64) -> Self {
        if frequency_hz <= 0.0 || !frequency_hz.is_finite() {
            return Self::IDLE;
        }
        let midi = freq_to_midi(frequency_hz);
        let cents = fold_cents(cents_delta(frequency_hz, midi));
        Self {
            midi,
            cents,
            frequency_hz,
            confidence,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.frequency_hz == 0.0
    }

    /// Note name with octave, e.g. `"F#2"`.
    pub fn name(&self, accidentals: Accidentals) -> String {
        note_name(self.midi, accidentals, true)
    }
}

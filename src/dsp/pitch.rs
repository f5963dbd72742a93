//! Conversions between MIDI codes, frequencies and note names.
//!
//! Note names are exactly two or three characters: a case-insensitive
//! letter (C D E F G A B, with H as a German alias for B), an optional
//! accidental (`#`, `s`, `♯` raise; `b`, `f`, `♭` lower) and a single octave
//! digit. Examples: `C2`, `A#4`, `h5`, `Eb3`.

use crate::error::PitchParseError;

/// Standard concert pitch of A4 in Hz.
pub const STANDARD_TUNING: f64 = 440.0;
/// MIDI code of A4.
pub const MIDI_A4: i32 = 69;
const MIDI_C0: i32 = 12;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Converts between representations of pitch for a given A4 tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchConverter {
    /// Frequency of A4 in Hz.
    pub tuning: f64,
}

impl Default for PitchConverter {
    fn default() -> Self {
        PitchConverter::new(STANDARD_TUNING)
    }
}

impl PitchConverter {
    pub const DEFAULT: PitchConverter = PitchConverter {
        tuning: STANDARD_TUNING,
    };

    pub fn new(tuning: f64) -> Self {
        PitchConverter { tuning }
    }

    /// `tuning * 2^((code - 69) / 12)`
    pub fn midi_to_frequency(&self, code: i32) -> f64 {
        self.tuning * 2.0_f64.powf((code - MIDI_A4) as f64 / 12.0)
    }

    /// Continuous inverse of [`Self::midi_to_frequency`].
    pub fn frequency_to_midi(&self, frequency: f64) -> f64 {
        12.0 * (frequency / self.tuning).log2() + MIDI_A4 as f64
    }

    pub fn name_to_frequency(&self, name: &str) -> Result<f64, PitchParseError> {
        Ok(self.midi_to_frequency(self.name_to_midi(name)?))
    }

    pub fn name_to_midi(&self, name: &str) -> Result<i32, PitchParseError> {
        let chars: Vec<char> = name.chars().collect();
        let (note, octave_pos) = match chars.len() {
            2 => (parse_note(name, chars[0])?, 1),
            3 => {
                let note = parse_note(name, chars[0])?;
                let shift = match chars[1].to_ascii_lowercase() {
                    '#' | 's' | '♯' => 1,
                    'b' | 'f' | '♭' => -1,
                    found => {
                        return Err(PitchParseError::UnknownAccidental {
                            name: name.to_string(),
                            found,
                            pos: 1,
                        });
                    }
                };
                (note + shift, 2)
            }
            len => {
                return Err(PitchParseError::InvalidLength {
                    name: name.to_string(),
                    len,
                });
            }
        };

        let found = chars[octave_pos];
        let octave = found.to_digit(10).ok_or_else(|| PitchParseError::InvalidOctave {
            name: name.to_string(),
            found,
            pos: octave_pos,
        })? as i32;

        Ok(MIDI_C0 + note + 12 * octave)
    }

    /// Name of the note with the given MIDI code, always spelled with sharps
    /// (e.g. `C#4`). Codes below C0 give a negative octave.
    pub fn midi_to_name(&self, code: i32) -> String {
        let shifted = i64::from(code) - i64::from(MIDI_C0);
        let octave = shifted.div_euclid(12);
        let note = shifted.rem_euclid(12) as usize;
        format!("{}{}", NOTE_NAMES[note], octave)
    }

    pub fn transpose_cents(&self, frequency: f64, cents: i32) -> f64 {
        frequency * 2.0_f64.powf(cents as f64 / 1200.0)
    }

    pub fn transpose_semitones(&self, frequency: f64, semitones: i32) -> f64 {
        frequency * 2.0_f64.powf(semitones as f64 / 12.0)
    }
}

fn parse_note(name: &str, ch: char) -> Result<i32, PitchParseError> {
    match ch.to_ascii_lowercase() {
        'c' => Ok(0),
        'd' => Ok(2),
        'e' => Ok(4),
        'f' => Ok(5),
        'g' => Ok(7),
        'a' => Ok(9),
        'b' | 'h' => Ok(11),
        found => Err(PitchParseError::UnknownNote {
            name: name.to_string(),
            found,
            pos: 0,
        }),
    }
}

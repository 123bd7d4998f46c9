// Pitches and intervals as semitone arithmetic.
//
// A `Pitch` is a MIDI note number in a validated newtype: construction from a
// signed integer rejects anything outside 0..=127, so every other module can
// treat pitches as total-ordered integers without re-checking bounds. There
// is no enharmonic spelling at this layer: F# and Gb are the same pitch.
//
// The `interval` submodule holds the classification helpers that the
// voicing assignor and the conflict detector share: interval classes,
// consonance tests, harsh-clash tests and interval names.

use crate::TheoryError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Pitch class names indexed by pitch class (C = 0), with the usual
/// keyboard spellings.
pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

/// Highest valid MIDI note number.
pub const MAX_MIDI: i32 = 127;

/// A MIDI pitch (0-127). Middle C is 60 (`C4`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pitch(pub(crate) u8);

impl Pitch {
    /// Validate a signed semitone value as a MIDI pitch.
    pub fn new(value: i32) -> Result<Self, TheoryError> {
        if (0..=MAX_MIDI).contains(&value) {
            Ok(Pitch(value as u8))
        } else {
            Err(TheoryError::PitchOutOfRange(value))
        }
    }

    /// Build a pitch from a MIDI byte. Values above 127 are rejected.
    pub fn from_midi(midi: u8) -> Result<Self, TheoryError> {
        Self::new(midi as i32)
    }

    pub fn midi(self) -> u8 {
        self.0
    }

    pub fn value(self) -> i32 {
        self.0 as i32
    }

    /// Pitch class 0-11 (C = 0).
    pub fn pitch_class(self) -> u8 {
        self.0 % 12
    }

    /// Scientific octave number (C4 = 60, so octave = midi / 12 - 1).
    pub fn octave(self) -> i32 {
        self.0 as i32 / 12 - 1
    }

    /// Move by a signed number of semitones. Returns None if the result
    /// leaves the MIDI range.
    pub fn transpose(self, semitones: i32) -> Option<Pitch> {
        Pitch::new(self.value() + semitones).ok()
    }

    /// Absolute semitone distance.
    pub fn distance(self, other: Pitch) -> u32 {
        (self.value() - other.value()).unsigned_abs()
    }

    /// Signed motion from `self` to `other` (positive = upward).
    pub fn motion_to(self, other: Pitch) -> i32 {
        other.value() - self.value()
    }

    /// Compact note name, e.g. "C4", "F#3".
    pub fn name(self) -> String {
        format!(
            "{}{}",
            PITCH_CLASS_NAMES[self.pitch_class() as usize],
            self.octave()
        )
    }

    /// Parse a note name such as "C4", "F#3", "Bb2" or "Cb5".
    pub fn parse(name: &str) -> Result<Pitch, TheoryError> {
        let bad = || TheoryError::BadPitchName(name.to_string());
        let trimmed = name.trim();
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or_else(bad)?;
        let base: i32 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(bad()),
        };
        let rest: String = chars.collect();
        let (accidental, octave_str) = if let Some(r) = rest.strip_prefix('#') {
            (1, r)
        } else if let Some(r) = rest.strip_prefix('b') {
            (-1, r)
        } else {
            (0, rest.as_str())
        };
        let octave: i32 = octave_str.parse().map_err(|_| bad())?;
        let value = octave
            .checked_add(1)
            .and_then(|o| o.checked_mul(12))
            .and_then(|v| v.checked_add(base + accidental))
            .ok_or_else(bad)?;
        Pitch::new(value)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// Serialized as the bare MIDI number; deserialization goes through `new` so
// an out-of-range number in a score file is a parse error, not a panic later.
impl Serialize for Pitch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for Pitch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i32::deserialize(deserializer)?;
        Pitch::new(value).map_err(serde::de::Error::custom)
    }
}

/// Name of a pitch class (0-11). Values are reduced mod 12.
pub fn pitch_class_name(pc: u8) -> &'static str {
    PITCH_CLASS_NAMES[(pc % 12) as usize]
}

/// Interval helpers over pitches and interval classes.
pub mod interval {
    use super::Pitch;

    /// Interval class 0-11: the undirected semitone distance mod 12.
    /// C4→B4 is 11 (major seventh), B3→C4 is 1 (minor second).
    pub fn interval_class(a: Pitch, b: Pitch) -> u8 {
        (a.distance(b) % 12) as u8
    }

    /// Interval class between two pitch classes measured upward from `from`.
    pub fn pc_interval(from: u8, to: u8) -> u8 {
        (to % 12 + 12 - from % 12) % 12
    }

    /// Inversion-equivalent class 0-6.
    pub fn folded(ic: u8) -> u8 {
        let ic = ic % 12;
        if ic > 6 { 12 - ic } else { ic }
    }

    /// `interval_class` folded to 0-6, so a fifth and a fourth compare equal.
    pub fn folded_interval_class(a: Pitch, b: Pitch) -> u8 {
        folded(interval_class(a, b))
    }

    /// Consonances between upper voices: unison/octave, thirds, fourth,
    /// fifth, sixths.
    pub fn is_consonant(ic: u8) -> bool {
        matches!(ic % 12, 0 | 3 | 4 | 5 | 7 | 8 | 9)
    }

    /// Consonance measured against the bass, where the fourth counts as
    /// dissonant.
    pub fn is_consonant_with_bass(ic: u8) -> bool {
        matches!(ic % 12, 0 | 3 | 4 | 7 | 8 | 9)
    }

    /// Minor second, tritone or major seventh.
    pub fn is_harsh_clash(ic: u8) -> bool {
        matches!(ic % 12, 1 | 6 | 11)
    }

    /// True for a half or whole step (1-2 semitones).
    pub fn is_step(a: Pitch, b: Pitch) -> bool {
        matches!(a.distance(b), 1 | 2)
    }

    /// English name of an interval class.
    pub fn interval_name(ic: u8) -> &'static str {
        match ic % 12 {
            0 => "unison",
            1 => "minor second",
            2 => "major second",
            3 => "minor third",
            4 => "major third",
            5 => "perfect fourth",
            6 => "tritone",
            7 => "perfect fifth",
            8 => "minor sixth",
            9 => "major sixth",
            10 => "minor seventh",
            _ => "major seventh",
        }
    }
}

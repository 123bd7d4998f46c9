// Chorale music theory primitives.
//
// Leaf crate shared by the voicing engine and its host editor. Everything
// here is pure data and pure functions over semitone integers; no logging,
// no I/O.
//
// Modules:
// - pitch.rs: validated MIDI `Pitch`, note names, interval classes and
//   consonance/clash tests
// - voice.rs: SATB `VoicePart`, per-voice register bounds, `Voicing`
// - chord.rs: `Chord`, quality interval tables, extension flags,
//   characteristic tones, chord symbols, skeleton extraction
// - meter.rs: rational `Beat` positions, `TimeSignature`, strong/weak beats
// - note.rs: `MelodicNote` values read from the voice-line store

pub mod chord;
pub mod meter;
pub mod note;
pub mod pitch;
pub mod voice;

pub use chord::{Chord, ChordId, ChordQuality, ChordTone, Extension, KeyMode, ToneRole};
pub use meter::{Beat, BeatStrength, TimeSignature, beat};
pub use note::{MelodicNote, NoteId};
pub use pitch::Pitch;
pub use voice::{RegisterBounds, VoicePart, VoiceRange, Voicing, within_range};

use thiserror::Error;

/// Invalid input to a theory primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TheoryError {
    #[error("pitch {0} is outside the MIDI range 0-127")]
    PitchOutOfRange(i32),
    #[error("cannot parse note name `{0}`")]
    BadPitchName(String),
    #[error("pitch class {0} is outside 0-11")]
    InvalidPitchClass(u8),
    #[error("scale degree {0} is outside 1-7")]
    InvalidScaleDegree(u8),
    #[error("invalid time signature {beats_per_bar}/{beat_unit}")]
    InvalidTimeSignature { beats_per_bar: u8, beat_unit: u8 },
    #[error("invalid {part} register: {reason}")]
    InvalidRegister { part: VoicePart, reason: String },
}

// Melodic notes on a voice line.
//
// Notes belong to the voice-line store of the host editor. The engine only
// ever holds copies (for melodic context around an edit) and writes pitches
// back through the store's commit call, so `MelodicNote` is a plain value.

use crate::meter::Beat;
use crate::pitch::Pitch;
use crate::voice::VoicePart;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a note on a voice line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub u32);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MelodicNote {
    pub id: NoteId,
    pub voice: VoicePart,
    pub pitch: Pitch,
    pub start: Beat,
    pub duration: Beat,
}

impl MelodicNote {
    pub fn end(&self) -> Beat {
        self.start + self.duration
    }
}

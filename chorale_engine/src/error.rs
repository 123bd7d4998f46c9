// Error taxonomy for the engine.
//
// Only genuinely exceptional conditions live here. Dissonances and non-chord
// tones are ordinary classification results (see conflict.rs) and never
// travel through this channel.
//
// - `UnvoiceableChord` is fatal for that one chord: callers must surface it
//   rather than skip the chord or drop voices.
// - `InvalidEditInput` rejects an internally inconsistent edit before
//   detection runs; nothing has been mutated when it is returned.
// - `ChordNotSwappable` rejects a chord replacement the timeline cannot
//   take; the store is left as it was.

use chorale_theory::{ChordId, NoteId, TheoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{chord} cannot be voiced: {reason}")]
    UnvoiceableChord { chord: ChordId, reason: String },
    #[error("invalid edit: {0}")]
    InvalidEditInput(String),
    #[error("unknown {0}")]
    UnknownChord(ChordId),
    #[error("unknown {0}")]
    UnknownNote(NoteId),
    #[error("cannot replace {old} with {new}: {reason}")]
    ChordNotSwappable {
        old: ChordId,
        new: ChordId,
        reason: String,
    },
    #[error(transparent)]
    Theory(#[from] TheoryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure loading or validating an `EngineConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] TheoryError),
}

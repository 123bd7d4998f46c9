// Chorale voice-leading engine.
//
// Assigns SATB voicings to chord progressions with minimal voice motion, and
// checks single-note edits against the chord they sound under, handing the
// user a one-shot resolution session when an edit clashes.
//
// Architecture:
// - voicing.rs: tone reduction/doubling and the constrained minimum-motion
//   search for one chord
// - progression.rs: voicing a whole progression, re-voicing a suffix
// - conflict.rs: pure voice–chord conflict classification (severity +
//   diagnostic)
// - session.rs: the edit workflow (`EditSession` → `ConflictSession` →
//   `Resolution`) and the presenter seam for dialogs
// - store.rs: `ChordStore`/`NoteStore` capability traits and the in-memory
//   `MemoryScore`
// - config.rs: `EngineConfig` (register bounds, session threshold) from JSON
// - error.rs: `EngineError`, `ConfigError`
//
// Theory primitives (pitches, chords, meter) live in `chorale_theory`.
// Everything is synchronous and deterministic; stores are passed in, never
// held.

pub mod config;
pub mod conflict;
pub mod error;
pub mod progression;
pub mod session;
pub mod store;
pub mod voicing;

pub use config::EngineConfig;
pub use conflict::{ConflictResult, EditContext, Severity, detect_conflict};
pub use error::{ConfigError, EngineError};
pub use progression::{revoice_from, total_motion, voice_progression};
pub use session::{
    ConflictPresenter, ConflictSession, EditOutcome, EditSession, Resolution, ResolutionOutcome,
    ResolveError,
};
pub use store::{ChordStore, MemoryScore, NoteStore};
pub use voicing::{VoicingAssignment, assign_voicing};

// Edit workflow: detect, then commit or hand the user a resolution session.
//
// A drag of one note runs through two owned values:
//
//   EditSession::begin(store, note)    captures the pitch before the drag
//     .submit(store, proposed, config) detects the conflict
//        -> EditOutcome::Committed     no conflict, or below min_severity
//        -> EditOutcome::Pending(ConflictSession)
//   ConflictSession::resolve(store, Resolution)
//        ChordChanged { new_chord }    swap the chord, commit the proposal
//        KeptAsTension                 commit the proposal as is
//        Cancelled                     commit the captured original pitch
//
// `resolve` consumes the session, so each session produces exactly one
// commit. Abandoning a session (dropping it) commits nothing; a new edit
// supersedes it. If `resolve` cannot proceed (the note vanished, the
// replacement chord is unknown or cannot take the slot, the commit failed)
// the store is left as it was and the session comes back inside
// `ResolveError` for another attempt. A chord change is applied before the
// note is committed and rolled back if the commit fails, so the note never
// lands without its chord.
//
// The cancel path restores the pitch captured at `begin`, not whatever the
// store holds at resolve time, so intervening edits elsewhere cannot leak
// into the revert. Running one session per note at a time is the caller's
// job; nothing here locks.

use crate::config::EngineConfig;
use crate::conflict::{ConflictResult, EditContext, Severity, detect_conflict};
use crate::error::EngineError;
use crate::store::{ChordStore, NoteStore};
use chorale_theory::{Chord, ChordId, MelodicNote, NoteId, Pitch, VoicePart};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// The user's answer to a conflict dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// Replace the sounding chord so the proposed pitch fits.
    ChordChanged { new_chord: ChordId },
    /// Keep the dissonance.
    KeptAsTension,
    /// Put the note back where it was.
    Cancelled,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::ChordChanged { new_chord } => write!(f, "change chord to {new_chord}"),
            Resolution::KeptAsTension => f.write_str("keep as tension"),
            Resolution::Cancelled => f.write_str("cancel"),
        }
    }
}

/// An in-progress drag of one note.
#[derive(Clone, Debug, PartialEq)]
pub struct EditSession {
    note: NoteId,
    original: Pitch,
}

impl EditSession {
    /// Start editing `note`, remembering its current pitch.
    pub fn begin<S: NoteStore + ?Sized>(store: &S, note: NoteId) -> Result<Self, EngineError> {
        let current = store.lookup_note(note).ok_or(EngineError::UnknownNote(note))?;
        info!(%note, pitch = %current.pitch, "edit started");
        Ok(EditSession {
            note,
            original: current.pitch,
        })
    }

    pub fn note(&self) -> NoteId {
        self.note
    }

    pub fn original_pitch(&self) -> Pitch {
        self.original
    }

    /// Assemble the detector input from the stores.
    pub fn context<S: ChordStore + NoteStore + ?Sized>(
        &self,
        store: &S,
        proposed: Pitch,
    ) -> Result<EditContext, EngineError> {
        let note = store
            .lookup_note(self.note)
            .ok_or(EngineError::UnknownNote(self.note))?;
        let chord = store.chord_at(note.start).ok_or_else(|| {
            EngineError::InvalidEditInput(format!("no chord sounds at beat {}", note.start))
        })?;
        let next_chord = store.chord_after(chord.id);
        let (prev_note, next_note) = store.neighbors(self.note);
        let sounding = store.sounding_at(note.start, note.voice);
        Ok(EditContext {
            voice: note.voice,
            proposed,
            at: note.start,
            chord,
            next_chord,
            time_signature: store.time_signature(),
            prev_note,
            next_note,
            sounding,
        })
    }

    /// Detect, then commit directly or open a resolution session.
    pub fn submit<S: ChordStore + NoteStore + ?Sized>(
        self,
        store: &mut S,
        proposed: Pitch,
        config: &EngineConfig,
    ) -> Result<EditOutcome, EngineError> {
        let ctx = self.context(&*store, proposed)?;
        let result = detect_conflict(&ctx)?;

        if result.severity == Severity::None || result.severity < config.min_severity {
            store.commit_note(self.note, proposed)?;
            info!(
                note = %self.note,
                pitch = %proposed,
                severity = %result.severity,
                "edit committed"
            );
            return Ok(EditOutcome::Committed {
                note: self.note,
                pitch: proposed,
                result,
            });
        }

        info!(
            note = %self.note,
            pitch = %proposed,
            severity = %result.severity,
            "conflict needs resolution: {}",
            result.diagnostic.describe()
        );
        Ok(EditOutcome::Pending(ConflictSession {
            note: self.note,
            voice: ctx.voice,
            original: self.original,
            proposed,
            chord: ctx.chord,
            prev_note: ctx.prev_note,
            next_note: ctx.next_note,
            result,
        }))
    }
}

/// What `EditSession::submit` did.
#[derive(Debug)]
pub enum EditOutcome {
    Committed {
        note: NoteId,
        pitch: Pitch,
        result: ConflictResult,
    },
    Pending(ConflictSession),
}

/// A detected conflict awaiting exactly one resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct ConflictSession {
    note: NoteId,
    voice: VoicePart,
    original: Pitch,
    proposed: Pitch,
    /// The chord as it stood when the conflict was detected.
    chord: Chord,
    prev_note: Option<MelodicNote>,
    next_note: Option<MelodicNote>,
    result: ConflictResult,
}

/// What `ConflictSession::resolve` committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub note: NoteId,
    pub committed: Pitch,
    pub resolution: Resolution,
}

/// A resolution that could not be applied. Nothing was mutated; the session
/// is returned for another attempt.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ResolveError {
    pub session: Box<ConflictSession>,
    #[source]
    pub error: EngineError,
}

impl ResolveError {
    pub fn into_session(self) -> ConflictSession {
        *self.session
    }
}

/// Dialog layer: shows a conflict and returns the user's choice.
pub trait ConflictPresenter {
    fn choose(&mut self, session: &ConflictSession) -> Resolution;
}

impl<F> ConflictPresenter for F
where
    F: FnMut(&ConflictSession) -> Resolution,
{
    fn choose(&mut self, session: &ConflictSession) -> Resolution {
        self(session)
    }
}

impl ConflictSession {
    pub fn note(&self) -> NoteId {
        self.note
    }

    pub fn voice(&self) -> VoicePart {
        self.voice
    }

    pub fn original_pitch(&self) -> Pitch {
        self.original
    }

    pub fn proposed_pitch(&self) -> Pitch {
        self.proposed
    }

    /// The chord the conflict was detected against.
    pub fn chord(&self) -> &Chord {
        &self.chord
    }

    /// Melodic context: the notes before and after on the same line.
    pub fn neighbors(&self) -> (Option<&MelodicNote>, Option<&MelodicNote>) {
        (self.prev_note.as_ref(), self.next_note.as_ref())
    }

    pub fn result(&self) -> &ConflictResult {
        &self.result
    }

    pub fn severity(&self) -> Severity {
        self.result.severity
    }

    /// Ask `presenter` for a choice and apply it.
    pub fn present<P, S>(
        self,
        presenter: &mut P,
        store: &mut S,
    ) -> Result<ResolutionOutcome, ResolveError>
    where
        P: ConflictPresenter + ?Sized,
        S: ChordStore + NoteStore + ?Sized,
    {
        let choice = presenter.choose(&self);
        self.resolve(store, choice)
    }

    /// Apply the user's choice. Consumes the session.
    pub fn resolve<S: ChordStore + NoteStore + ?Sized>(
        self,
        store: &mut S,
        resolution: Resolution,
    ) -> Result<ResolutionOutcome, ResolveError> {
        // Check what can be checked before touching the store.
        let note = self.note;
        let old_chord = self.chord.id;
        if store.lookup_note(note).is_none() {
            return Err(self.reject(resolution, EngineError::UnknownNote(note)));
        }
        if let Resolution::ChordChanged { new_chord } = resolution {
            if new_chord == old_chord {
                let error = EngineError::ChordNotSwappable {
                    old: old_chord,
                    new: new_chord,
                    reason: "it is the chord already sounding".to_string(),
                };
                return Err(self.reject(resolution, error));
            }
            if store.lookup_chord(new_chord).is_none() {
                return Err(self.reject(resolution, EngineError::UnknownChord(new_chord)));
            }
            // The store refuses without mutating.
            if let Err(error) = store.notify_chord_change(old_chord, new_chord) {
                return Err(self.reject(resolution, error));
            }
        }

        let committed = match resolution {
            Resolution::ChordChanged { .. } | Resolution::KeptAsTension => self.proposed,
            Resolution::Cancelled => self.original,
        };
        if let Err(error) = store.commit_note(note, committed) {
            if let Resolution::ChordChanged { new_chord } = resolution
                && let Err(undo) = store.notify_chord_change(new_chord, old_chord)
            {
                warn!(%note, %old_chord, %new_chord, error = %undo, "chord change not rolled back");
            }
            return Err(self.reject(resolution, error));
        }
        if resolution == Resolution::Cancelled {
            store.notify_cancelled(self.note);
        }
        info!(note = %self.note, pitch = %committed, %resolution, "conflict resolved");
        Ok(ResolutionOutcome {
            note: self.note,
            committed,
            resolution,
        })
    }

    fn reject(self, resolution: Resolution, error: EngineError) -> ResolveError {
        warn!(note = %self.note, %resolution, %error, "resolution rejected");
        ResolveError {
            session: Box::new(self),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryScore;
    use chorale_theory::{
        Chord, ChordQuality, KeyMode, MelodicNote, TimeSignature, VoicePart, Voicing, beat,
    };

    fn p(v: i32) -> Pitch {
        Pitch::new(v).unwrap()
    }

    /// One bar of C major (voiced C5 / E4 / G3 / C3) then G major, with a
    /// soprano line C5 D5 E5 and an F major chord in the palette.
    fn score() -> MemoryScore {
        let mut c = Chord::new(ChordId(1), 1, ChordQuality::Major, 0, KeyMode::Major, beat(0), beat(4));
        c.voicing = Some(Voicing {
            soprano: p(72),
            alto: p(64),
            tenor: p(55),
            bass: p(48),
        });
        let g = Chord::new(ChordId(2), 5, ChordQuality::Major, 0, KeyMode::Major, beat(4), beat(4));
        let f = Chord::new(ChordId(3), 4, ChordQuality::Major, 0, KeyMode::Major, beat(0), beat(4));
        let note = |id, pitch, start| MelodicNote {
            id: NoteId(id),
            voice: VoicePart::Soprano,
            pitch: p(pitch),
            start: beat(start),
            duration: beat(1),
        };
        MemoryScore {
            time_signature: TimeSignature::COMMON,
            chords: vec![c, g],
            alternatives: vec![f],
            notes: vec![note(1, 72, 0), note(2, 74, 1), note(3, 76, 2)],
            ..MemoryScore::default()
        }
    }

    fn pending(store: &mut MemoryScore, note: u32, proposed: i32) -> ConflictSession {
        let edit = EditSession::begin(&*store, NoteId(note)).unwrap();
        match edit.submit(store, p(proposed), &EngineConfig::default()).unwrap() {
            EditOutcome::Pending(session) => session,
            other => panic!("expected a pending session, got {other:?}"),
        }
    }

    #[test]
    fn test_chord_tone_commits_directly() {
        let mut store = score();
        let edit = EditSession::begin(&store, NoteId(1)).unwrap();
        let outcome = edit.submit(&mut store, p(76), &EngineConfig::default()).unwrap();
        assert!(matches!(outcome, EditOutcome::Committed { .. }));
        assert_eq!(store.lookup_note(NoteId(1)).unwrap().pitch, p(76));
    }

    #[test]
    fn test_pending_session_leaves_store_untouched() {
        let mut store = score();
        let session = pending(&mut store, 1, 78); // F#5 on the downbeat
        assert_eq!(session.severity(), Severity::Error);
        assert_eq!(session.original_pitch(), p(72));
        assert_eq!(store.lookup_note(NoteId(1)).unwrap().pitch, p(72));
    }

    #[test]
    fn test_session_carries_edit_context() {
        let mut store = score();
        let session = pending(&mut store, 1, 78);
        assert_eq!(session.voice(), VoicePart::Soprano);
        assert_eq!(session.chord().id, ChordId(1));
        assert_eq!(session.chord().voicing, store.chords[0].voicing);
        let (prev, next) = session.neighbors();
        assert!(prev.is_none());
        assert_eq!(next.map(|n| n.id), Some(NoteId(2)));
    }

    #[test]
    fn test_unvoiced_chord_clashes_with_sounding_alto() {
        let mut store = score();
        store.chords[0].voicing = None;
        store.notes.push(MelodicNote {
            id: NoteId(10),
            voice: VoicePart::Alto,
            pitch: p(64),
            start: beat(0),
            duration: beat(2),
        });
        store.notes.push(MelodicNote {
            id: NoteId(4),
            voice: VoicePart::Soprano,
            pitch: p(81),
            start: beat(2),
            duration: beat(1),
        });
        store.notes.retain(|n| n.id != NoteId(3));
        // F5 on beat 2, leaping on to A5, over the alto's E4.
        let session = pending(&mut store, 2, 77);
        assert_eq!(session.severity(), Severity::Error);
        assert_eq!(session.result().diagnostic.clash, Some((VoicePart::Alto, 1)));
    }

    #[test]
    fn test_keep_as_tension_commits_proposal() {
        let mut store = score();
        let session = pending(&mut store, 1, 78);
        let out = session.resolve(&mut store, Resolution::KeptAsTension).unwrap();
        assert_eq!(out.committed, p(78));
        assert_eq!(store.lookup_note(NoteId(1)).unwrap().pitch, p(78));
        assert!(store.chord_changes.is_empty());
    }

    #[test]
    fn test_cancel_restores_captured_pitch() {
        let mut store = score();
        let session = pending(&mut store, 1, 78);
        // Something else moves the note while the dialog is open.
        store.commit_note(NoteId(1), p(60)).unwrap();
        let out = session.resolve(&mut store, Resolution::Cancelled).unwrap();
        assert_eq!(out.committed, p(72));
        assert_eq!(store.lookup_note(NoteId(1)).unwrap().pitch, p(72));
        assert_eq!(store.cancelled, vec![NoteId(1)]);
    }

    #[test]
    fn test_chord_change_notifies_and_commits() {
        let mut store = score();
        let session = pending(&mut store, 1, 77); // F5 clashes with E4
        let out = session
            .resolve(&mut store, Resolution::ChordChanged { new_chord: ChordId(3) })
            .unwrap();
        assert_eq!(out.committed, p(77));
        assert_eq!(store.chord_changes, vec![(ChordId(1), ChordId(3))]);
        assert_eq!(store.chord_at(beat(0)).unwrap().id, ChordId(3));
    }

    #[test]
    fn test_unknown_replacement_hands_session_back() {
        let mut store = score();
        let session = pending(&mut store, 1, 78);
        let err = session
            .resolve(&mut store, Resolution::ChordChanged { new_chord: ChordId(42) })
            .unwrap_err();
        assert!(matches!(err.error, EngineError::UnknownChord(ChordId(42))));
        assert_eq!(store.lookup_note(NoteId(1)).unwrap().pitch, p(72));
        assert!(store.chord_changes.is_empty());

        let session = err.into_session();
        let out = session.resolve(&mut store, Resolution::KeptAsTension).unwrap();
        assert_eq!(out.committed, p(78));
    }

    #[test]
    fn test_vanished_note_hands_session_back() {
        let mut store = score();
        let session = pending(&mut store, 1, 78);
        store.notes.retain(|n| n.id != NoteId(1));
        let before = store.clone();
        for resolution in [
            Resolution::KeptAsTension,
            Resolution::Cancelled,
            Resolution::ChordChanged { new_chord: ChordId(3) },
        ] {
            let err = session.clone().resolve(&mut store, resolution).unwrap_err();
            assert!(matches!(err.error, EngineError::UnknownNote(NoteId(1))));
            assert_eq!(err.into_session(), session);
            assert_eq!(store, before);
        }
    }

    #[test]
    fn test_unswappable_replacement_commits_nothing() {
        let mut store = score();
        let before = store.clone();
        let session = pending(&mut store, 1, 78);
        // Chord 2 already sounds later in the timeline; chord 1 is the one
        // in conflict.
        for new_chord in [ChordId(2), ChordId(1)] {
            let err = session
                .clone()
                .resolve(&mut store, Resolution::ChordChanged { new_chord })
                .unwrap_err();
            assert!(
                matches!(err.error, EngineError::ChordNotSwappable { .. }),
                "{}",
                err.error
            );
            assert_eq!(store, before);
        }
    }

    /// Forwards to a `MemoryScore` but refuses every note commit.
    struct ReadOnlyNotes(MemoryScore);

    impl ChordStore for ReadOnlyNotes {
        fn lookup_chord(&self, id: ChordId) -> Option<Chord> {
            self.0.lookup_chord(id)
        }
        fn chord_at(&self, at: chorale_theory::Beat) -> Option<Chord> {
            self.0.chord_at(at)
        }
        fn chord_after(&self, id: ChordId) -> Option<Chord> {
            self.0.chord_after(id)
        }
        fn notify_chord_change(&mut self, old: ChordId, new: ChordId) -> Result<(), EngineError> {
            self.0.notify_chord_change(old, new)
        }
    }

    impl NoteStore for ReadOnlyNotes {
        fn lookup_note(&self, id: NoteId) -> Option<MelodicNote> {
            self.0.lookup_note(id)
        }
        fn neighbors(&self, id: NoteId) -> (Option<MelodicNote>, Option<MelodicNote>) {
            self.0.neighbors(id)
        }
        fn sounding_at(&self, at: chorale_theory::Beat, except: VoicePart) -> Vec<MelodicNote> {
            self.0.sounding_at(at, except)
        }
        fn commit_note(&mut self, _id: NoteId, _pitch: Pitch) -> Result<(), EngineError> {
            Err(EngineError::InvalidEditInput("notes are read-only".to_string()))
        }
    }

    #[test]
    fn test_failed_commit_rolls_back_chord_change() {
        let mut scratch = score();
        let session = pending(&mut scratch, 1, 77);
        let mut store = ReadOnlyNotes(score());
        let err = session
            .resolve(&mut store, Resolution::ChordChanged { new_chord: ChordId(3) })
            .unwrap_err();
        assert!(matches!(err.error, EngineError::InvalidEditInput(_)));
        assert_eq!(store.0.chords, score().chords);
        assert_eq!(store.0.alternatives, score().alternatives);
        assert_eq!(
            store.0.chord_changes,
            vec![(ChordId(1), ChordId(3)), (ChordId(3), ChordId(1))]
        );
        assert_eq!(store.0.lookup_note(NoteId(1)).unwrap().pitch, p(72));
        assert_eq!(err.into_session().proposed_pitch(), p(77));
    }

    #[test]
    fn test_min_severity_error_skips_warning_sessions() {
        let mut store = score();
        let config = EngineConfig {
            min_severity: Severity::Error,
            ..EngineConfig::default()
        };
        // A4 leapt into and out of on a weak beat is only a warning.
        let edit = EditSession::begin(&store, NoteId(2)).unwrap();
        let outcome = edit.submit(&mut store, p(69), &config).unwrap();
        match outcome {
            EditOutcome::Committed { result, .. } => assert_eq!(result.severity, Severity::Warning),
            other => panic!("expected a direct commit, got {other:?}"),
        }
        assert_eq!(store.lookup_note(NoteId(2)).unwrap().pitch, p(69));
    }

    #[test]
    fn test_presenter_drives_resolution() {
        let mut store = score();
        let session = pending(&mut store, 1, 78);
        let mut seen = None;
        let mut presenter = |s: &ConflictSession| {
            seen = Some(s.proposed_pitch());
            Resolution::Cancelled
        };
        let out = session.present(&mut presenter, &mut store).unwrap();
        assert_eq!(out.resolution, Resolution::Cancelled);
        assert_eq!(seen, Some(p(78)));
    }

    #[test]
    fn test_resolution_wire_format() {
        let json = serde_json::to_string(&Resolution::ChordChanged { new_chord: ChordId(3) }).unwrap();
        assert_eq!(json, r#"{"kind":"chord_changed","new_chord":3}"#);
        let back: Resolution = serde_json::from_str(r#"{"kind":"cancelled"}"#).unwrap();
        assert_eq!(back, Resolution::Cancelled);
    }
}

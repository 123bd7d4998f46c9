// End-to-end edit workflow over the demo chorale.
//
// Loads demos/c_major_chorale.json, voices its progression, then drives note
// edits through detection and every resolution path, checking what reaches
// the stores.

use chorale_engine::{
    ChordStore, ConflictSession, EditOutcome, EditSession, EngineConfig, EngineError,
    MemoryScore, NoteStore, Resolution, Severity, revoice_from, voice_progression,
};
use chorale_theory::{
    Beat, Chord, ChordId, MelodicNote, NoteId, Pitch, TimeSignature, VoicePart, beat,
};
use std::io::Write;

const DEMO: &str = include_str!("../../demos/c_major_chorale.json");

fn p(v: i32) -> Pitch {
    Pitch::new(v).unwrap()
}

fn voiced_demo() -> MemoryScore {
    let mut score = MemoryScore::from_json(DEMO).unwrap();
    voice_progression(&mut score.chords, &EngineConfig::default().bounds).unwrap();
    score
}

fn pitch_of(store: &impl NoteStore, id: u32) -> Pitch {
    store.lookup_note(NoteId(id)).unwrap().pitch
}

fn open_conflict(store: &mut MemoryScore, note: u32, proposed: i32) -> ConflictSession {
    let edit = EditSession::begin(&*store, NoteId(note)).unwrap();
    match edit
        .submit(&mut *store, p(proposed), &EngineConfig::default())
        .unwrap()
    {
        EditOutcome::Pending(session) => session,
        EditOutcome::Committed { result, .. } => {
            panic!("expected a conflict, got {:?}", result.diagnostic)
        }
    }
}

#[test]
fn demo_progression_voices_cleanly() {
    let score = voiced_demo();
    let bounds = EngineConfig::default().bounds;
    for chord in &score.chords {
        let voicing = chord.voicing.unwrap();
        assert!(voicing.is_ordered(), "{}: {voicing}", chord.symbol());
        assert!(voicing.within(&bounds), "{}: {voicing}", chord.symbol());
    }
    // The G9 keeps its ninth.
    let g9 = score.chords.iter().find(|c| c.id == ChordId(4)).unwrap();
    let voicing = g9.voicing.unwrap();
    assert!(voicing.iter().any(|(_, pitch)| pitch.pitch_class() == 9));
}

#[test]
fn tritone_over_bass_opens_error_session() {
    let mut score = voiced_demo();
    let session = open_conflict(&mut score, 1, 78);
    assert_eq!(session.severity(), Severity::Error);
    assert_eq!(session.chord().id, ChordId(1));
    assert_eq!(session.chord().symbol(), "C");
    assert_eq!(pitch_of(&score, 1), p(72));
}

#[test]
fn weak_beat_passing_tone_commits_without_session() {
    let mut score = voiced_demo();
    let edit = EditSession::begin(&score, NoteId(2)).unwrap();
    let outcome = edit
        .submit(&mut score, p(74), &EngineConfig::default())
        .unwrap();
    match outcome {
        EditOutcome::Committed { result, .. } => assert!(!result.has_conflict()),
        EditOutcome::Pending(s) => panic!("unexpected conflict: {:?}", s.result()),
    }
}

#[test]
fn keep_as_tension_commits_proposal_and_leaves_chords() {
    let mut score = voiced_demo();
    let chords_before = score.chords.clone();
    let session = open_conflict(&mut score, 1, 78);
    let out = session
        .resolve(&mut score, Resolution::KeptAsTension)
        .unwrap();
    assert_eq!(out.committed, p(78));
    assert_eq!(pitch_of(&score, 1), p(78));
    assert_eq!(score.chords, chords_before);
}

#[test]
fn cancel_restores_pitch_captured_at_begin() {
    let mut score = voiced_demo();
    let session = open_conflict(&mut score, 1, 78);
    // Other edits land while the dialog is open, including on this note.
    score.commit_note(NoteId(1), p(65)).unwrap();
    score.commit_note(NoteId(3), p(79)).unwrap();

    session.resolve(&mut score, Resolution::Cancelled).unwrap();
    assert_eq!(pitch_of(&score, 1), p(72));
    assert_eq!(pitch_of(&score, 3), p(79));
    assert_eq!(score.cancelled, vec![NoteId(1)]);
}

#[test]
fn chord_change_swaps_chord_then_revoices() {
    let mut score = voiced_demo();
    let session = open_conflict(&mut score, 1, 77); // F5 over C major
    session
        .resolve(&mut score, Resolution::ChordChanged { new_chord: ChordId(10) })
        .unwrap();
    assert_eq!(pitch_of(&score, 1), p(77));
    assert_eq!(score.chord_changes, vec![(ChordId(1), ChordId(10))]);

    let index = score.chord_index(ChordId(10)).unwrap();
    assert!(score.chords[index].voicing.is_none());
    revoice_from(&mut score.chords, index, &EngineConfig::default().bounds).unwrap();
    assert!(score.chords.iter().all(|c| c.voicing.is_some()));

    // F5 now sits in F major.
    let edit = EditSession::begin(&score, NoteId(1)).unwrap();
    let outcome = edit
        .submit(&mut score, p(77), &EngineConfig::default())
        .unwrap();
    assert!(matches!(outcome, EditOutcome::Committed { .. }));
}

#[test]
fn unknown_replacement_chord_mutates_nothing() {
    let mut score = voiced_demo();
    let before = score.clone();
    let session = open_conflict(&mut score, 1, 78);
    let err = session
        .resolve(&mut score, Resolution::ChordChanged { new_chord: ChordId(99) })
        .unwrap_err();
    assert!(matches!(err.error, EngineError::UnknownChord(ChordId(99))));
    assert_eq!(score, before);
}

#[test]
fn timeline_chord_as_replacement_commits_nothing() {
    let mut score = voiced_demo();
    let before = score.clone();
    let session = open_conflict(&mut score, 1, 78);
    // Am already sounds at beat 4; it cannot also take the C major slot.
    let err = session
        .resolve(&mut score, Resolution::ChordChanged { new_chord: ChordId(2) })
        .unwrap_err();
    assert!(matches!(err.error, EngineError::ChordNotSwappable { .. }));
    assert_eq!(score, before);
    assert_eq!(score.chord_at(beat(0)).unwrap().id, ChordId(1));

    // The handed-back session can still be kept as tension.
    let out = err
        .into_session()
        .resolve(&mut score, Resolution::KeptAsTension)
        .unwrap();
    assert_eq!(out.committed, p(78));
}

#[test]
fn unvoiced_demo_uses_the_sounding_bass_line() {
    // No voicings at all: the bass line's C3 still makes F#5 a tritone.
    let mut score = MemoryScore::from_json(DEMO).unwrap();
    assert!(score.chords.iter().all(|c| c.voicing.is_none()));
    let session = open_conflict(&mut score, 1, 78);
    assert_eq!(session.severity(), Severity::Error);
    assert_eq!(session.result().diagnostic.interval_above_bass, 6);
}

#[test]
fn dropped_session_commits_nothing() {
    let mut score = voiced_demo();
    let before = score.clone();
    drop(open_conflict(&mut score, 1, 78));
    assert_eq!(score, before);
}

#[test]
fn error_threshold_from_config_file_skips_warnings() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(br#"{"min_severity": "error"}"#).unwrap();
    let config = EngineConfig::load(file.path()).unwrap();

    let mut score = voiced_demo();
    // A4 leapt into on a weak beat and left by leap: a warning.
    let edit = EditSession::begin(&score, NoteId(2)).unwrap();
    match edit.submit(&mut score, p(69), &config).unwrap() {
        EditOutcome::Committed { result, .. } => assert_eq!(result.severity, Severity::Warning),
        EditOutcome::Pending(_) => panic!("warning should not open a session"),
    }
    assert_eq!(pitch_of(&score, 2), p(69));

    // Errors still open one.
    let edit = EditSession::begin(&score, NoteId(1)).unwrap();
    assert!(matches!(
        edit.submit(&mut score, p(78), &config).unwrap(),
        EditOutcome::Pending(_)
    ));
}

#[test]
fn edit_outside_any_chord_is_invalid() {
    let mut score = voiced_demo();
    score.notes.push(MelodicNote {
        id: NoteId(50),
        voice: VoicePart::Alto,
        pitch: p(64),
        start: beat(40),
        duration: beat(1),
    });
    let edit = EditSession::begin(&score, NoteId(50)).unwrap();
    assert!(matches!(
        edit.submit(&mut score, p(65), &EngineConfig::default()),
        Err(EngineError::InvalidEditInput(_))
    ));
    assert!(matches!(
        EditSession::begin(&score, NoteId(404)),
        Err(EngineError::UnknownNote(NoteId(404)))
    ));
}

/// Store wrapper that counts commits, to check each resolution path commits
/// exactly once.
struct CountingStore {
    inner: MemoryScore,
    commits: Vec<(NoteId, Pitch)>,
}

impl ChordStore for CountingStore {
    fn lookup_chord(&self, id: ChordId) -> Option<Chord> {
        self.inner.lookup_chord(id)
    }
    fn chord_at(&self, at: Beat) -> Option<Chord> {
        self.inner.chord_at(at)
    }
    fn chord_after(&self, id: ChordId) -> Option<Chord> {
        self.inner.chord_after(id)
    }
    fn time_signature(&self) -> TimeSignature {
        self.inner.time_signature()
    }
    fn notify_chord_change(&mut self, old: ChordId, new: ChordId) -> Result<(), EngineError> {
        self.inner.notify_chord_change(old, new)
    }
}

impl NoteStore for CountingStore {
    fn lookup_note(&self, id: NoteId) -> Option<MelodicNote> {
        self.inner.lookup_note(id)
    }
    fn neighbors(&self, id: NoteId) -> (Option<MelodicNote>, Option<MelodicNote>) {
        self.inner.neighbors(id)
    }
    fn sounding_at(&self, at: Beat, except: VoicePart) -> Vec<MelodicNote> {
        self.inner.sounding_at(at, except)
    }
    fn commit_note(&mut self, id: NoteId, pitch: Pitch) -> Result<(), EngineError> {
        self.commits.push((id, pitch));
        self.inner.commit_note(id, pitch)
    }
}

#[test]
fn every_resolution_commits_exactly_once() {
    let choices = [
        (Resolution::ChordChanged { new_chord: ChordId(10) }, p(78)),
        (Resolution::KeptAsTension, p(78)),
        (Resolution::Cancelled, p(72)),
    ];
    for (resolution, expected) in choices {
        let mut store = CountingStore {
            inner: voiced_demo(),
            commits: Vec::new(),
        };
        let edit = EditSession::begin(&store, NoteId(1)).unwrap();
        let session = match edit
            .submit(&mut store, p(78), &EngineConfig::default())
            .unwrap()
        {
            EditOutcome::Pending(session) => session,
            EditOutcome::Committed { .. } => panic!("expected a conflict"),
        };
        assert!(store.commits.is_empty());
        let out = session.resolve(&mut store, resolution).unwrap();
        assert_eq!(out.resolution, resolution);
        assert_eq!(store.commits, vec![(NoteId(1), expected)], "{resolution}");
    }
}

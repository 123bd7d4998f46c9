// Repositories the engine reads from and writes through.
//
// The host editor owns the chord timeline and the voice lines. The engine
// never holds them; every entry point takes the stores as explicit
// collaborators. `ChordStore` and `NoteStore` are the capability surface
// (lookup, neighbour queries, commit, change notifications), so a host can
// back them with whatever state model it already has.
//
// `MemoryScore` is the in-memory implementation used by the CLI and tests:
// a serde-loadable score holding the time signature, the chord timeline,
// a palette of alternative chords the user may swap in, and the notes of
// all four voice lines. It also records the notifications it receives so
// tests can assert on them.

use crate::error::EngineError;
use chorale_theory::{Beat, Chord, ChordId, MelodicNote, NoteId, Pitch, TimeSignature, VoicePart};
use serde::{Deserialize, Serialize};

/// Read/notify access to the chord timeline.
pub trait ChordStore {
    fn lookup_chord(&self, id: ChordId) -> Option<Chord>;

    /// The chord sounding at `at`, if any.
    fn chord_at(&self, at: Beat) -> Option<Chord>;

    /// The chord that follows `id` in the timeline.
    fn chord_after(&self, id: ChordId) -> Option<Chord>;

    fn time_signature(&self) -> TimeSignature {
        TimeSignature::COMMON
    }

    /// The user replaced `old` with `new`; apply it to the timeline. On
    /// error the store must be unchanged, and a later `(new, old)` call must
    /// undo a successful change.
    fn notify_chord_change(&mut self, old: ChordId, new: ChordId) -> Result<(), EngineError>;
}

/// Read/commit access to the voice lines.
pub trait NoteStore {
    fn lookup_note(&self, id: NoteId) -> Option<MelodicNote>;

    /// Previous and next notes on the same voice line.
    fn neighbors(&self, id: NoteId) -> (Option<MelodicNote>, Option<MelodicNote>);

    /// Notes on the other voice lines that sound at `at`.
    fn sounding_at(&self, at: Beat, except: VoicePart) -> Vec<MelodicNote>;

    fn commit_note(&mut self, id: NoteId, pitch: Pitch) -> Result<(), EngineError>;

    /// An edit of `id` was cancelled and its pitch restored.
    fn notify_cancelled(&mut self, _id: NoteId) {}
}

/// A whole score held in memory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryScore {
    #[serde(default)]
    pub time_signature: TimeSignature,
    /// Chord timeline, in start order.
    pub chords: Vec<Chord>,
    /// Chords not in the timeline that may replace one.
    #[serde(default)]
    pub alternatives: Vec<Chord>,
    #[serde(default)]
    pub notes: Vec<MelodicNote>,
    /// (old, new) pairs received through `notify_chord_change`.
    #[serde(skip)]
    pub chord_changes: Vec<(ChordId, ChordId)>,
    /// Notes whose edit was cancelled.
    #[serde(skip)]
    pub cancelled: Vec<NoteId>,
}

impl MemoryScore {
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        let mut score: MemoryScore = serde_json::from_str(data)?;
        score.chords.sort_by_key(|c| c.start);
        Ok(score)
    }

    /// Index of `id` in the timeline.
    pub fn chord_index(&self, id: ChordId) -> Option<usize> {
        self.chords.iter().position(|c| c.id == id)
    }
}

impl ChordStore for MemoryScore {
    fn lookup_chord(&self, id: ChordId) -> Option<Chord> {
        self.chords
            .iter()
            .chain(&self.alternatives)
            .find(|c| c.id == id)
            .cloned()
    }

    fn chord_at(&self, at: Beat) -> Option<Chord> {
        self.chords.iter().find(|c| c.covers(at)).cloned()
    }

    fn chord_after(&self, id: ChordId) -> Option<Chord> {
        let current = self.chords.iter().find(|c| c.id == id)?;
        let end = current.end();
        self.chords
            .iter()
            .filter(|c| c.start >= end)
            .min_by_key(|c| c.start)
            .cloned()
    }

    fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    /// The palette chord `new` and the timeline chord `old` trade places.
    /// Spans stay with their slots; voicings travel with their chords, so
    /// the replacement arrives with whatever voicing it had in the palette
    /// (normally none) and the caller re-voices from there.
    fn notify_chord_change(&mut self, old: ChordId, new: ChordId) -> Result<(), EngineError> {
        let refuse = |reason: &str| EngineError::ChordNotSwappable {
            old,
            new,
            reason: reason.to_string(),
        };
        let slot = self
            .chord_index(old)
            .ok_or_else(|| refuse("it is not in the timeline"))?;
        if self.chord_index(new).is_some() {
            return Err(refuse("the replacement already sounds in the timeline"));
        }
        let i = self
            .alternatives
            .iter()
            .position(|c| c.id == new)
            .ok_or_else(|| refuse("the replacement is not in the palette"))?;

        std::mem::swap(&mut self.chords[slot], &mut self.alternatives[i]);
        let (placed, parked) = (&mut self.chords[slot], &mut self.alternatives[i]);
        std::mem::swap(&mut placed.start, &mut parked.start);
        std::mem::swap(&mut placed.duration, &mut parked.duration);
        self.chord_changes.push((old, new));
        Ok(())
    }
}

impl NoteStore for MemoryScore {
    fn lookup_note(&self, id: NoteId) -> Option<MelodicNote> {
        self.notes.iter().find(|n| n.id == id).copied()
    }

    fn neighbors(&self, id: NoteId) -> (Option<MelodicNote>, Option<MelodicNote>) {
        let Some(note) = self.lookup_note(id) else {
            return (None, None);
        };
        let line = || {
            self.notes
                .iter()
                .filter(move |n| n.voice == note.voice && n.id != note.id)
        };
        let prev = line().filter(|n| n.start < note.start).max_by_key(|n| n.start);
        let next = line().filter(|n| n.start > note.start).min_by_key(|n| n.start);
        (prev.copied(), next.copied())
    }

    fn sounding_at(&self, at: Beat, except: VoicePart) -> Vec<MelodicNote> {
        self.notes
            .iter()
            .filter(|n| n.voice != except && n.start <= at && at < n.end())
            .copied()
            .collect()
    }

    fn commit_note(&mut self, id: NoteId, pitch: Pitch) -> Result<(), EngineError> {
        let note = self
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(EngineError::UnknownNote(id))?;
        note.pitch = pitch;
        Ok(())
    }

    fn notify_cancelled(&mut self, id: NoteId) {
        self.cancelled.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorale_theory::{ChordQuality, KeyMode, VoicePart, beat};

    fn score() -> MemoryScore {
        let chord = |id, degree, start| {
            Chord::new(ChordId(id), degree, ChordQuality::Major, 0, KeyMode::Major, beat(start), beat(4))
        };
        let note = |id, voice, pitch, start| MelodicNote {
            id: NoteId(id),
            voice,
            pitch: Pitch::new(pitch).unwrap(),
            start: beat(start),
            duration: beat(1),
        };
        MemoryScore {
            time_signature: TimeSignature::COMMON,
            chords: vec![chord(1, 1, 0), chord(2, 5, 4)],
            alternatives: vec![chord(3, 4, 0)],
            notes: vec![
                note(1, VoicePart::Soprano, 72, 0),
                note(2, VoicePart::Soprano, 74, 1),
                note(3, VoicePart::Soprano, 76, 2),
                note(4, VoicePart::Alto, 64, 1),
            ],
            ..MemoryScore::default()
        }
    }

    #[test]
    fn test_chord_lookups() {
        let s = score();
        assert_eq!(s.chord_at(beat(3)).unwrap().id, ChordId(1));
        assert_eq!(s.chord_at(beat(4)).unwrap().id, ChordId(2));
        assert!(s.chord_at(beat(8)).is_none());
        assert_eq!(s.chord_after(ChordId(1)).unwrap().id, ChordId(2));
        assert!(s.chord_after(ChordId(2)).is_none());
        assert!(s.lookup_chord(ChordId(3)).is_some());
    }

    #[test]
    fn test_neighbors_stay_on_the_voice_line() {
        let s = score();
        let (prev, next) = s.neighbors(NoteId(2));
        assert_eq!(prev.unwrap().id, NoteId(1));
        assert_eq!(next.unwrap().id, NoteId(3));
        let (prev, next) = s.neighbors(NoteId(4));
        assert!(prev.is_none() && next.is_none());
    }

    #[test]
    fn test_commit_unknown_note_fails() {
        let mut s = score();
        s.commit_note(NoteId(2), Pitch::new(73).unwrap()).unwrap();
        assert_eq!(s.lookup_note(NoteId(2)).unwrap().pitch, Pitch::new(73).unwrap());
        assert!(matches!(
            s.commit_note(NoteId(99), Pitch::new(60).unwrap()),
            Err(EngineError::UnknownNote(NoteId(99)))
        ));
    }

    #[test]
    fn test_sounding_at_skips_own_line_and_finished_notes() {
        let s = score();
        let at_one: Vec<_> = s.sounding_at(beat(1), VoicePart::Soprano).iter().map(|n| n.id).collect();
        assert_eq!(at_one, vec![NoteId(4)]);
        assert!(s.sounding_at(beat(2), VoicePart::Soprano).is_empty());
        let for_alto: Vec<_> = s.sounding_at(beat(1), VoicePart::Alto).iter().map(|n| n.id).collect();
        assert_eq!(for_alto, vec![NoteId(2)]);
    }

    #[test]
    fn test_chord_change_swaps_timeline_slot() {
        let mut s = score();
        s.chords[0].voicing = Some(chorale_theory::Voicing::from_low_to_high(
            [48, 55, 64, 72].map(|v| Pitch::new(v).unwrap()),
        ));
        let palette_span = (s.alternatives[0].start, s.alternatives[0].duration);
        let before = s.clone();

        s.notify_chord_change(ChordId(1), ChordId(3)).unwrap();
        let now = s.chord_at(beat(0)).unwrap();
        assert_eq!(now.id, ChordId(3));
        assert_eq!(now.duration, beat(4));
        assert!(now.voicing.is_none());
        assert!(s.alternatives.iter().any(|c| c.id == ChordId(1)));
        assert_eq!(s.chord_changes, vec![(ChordId(1), ChordId(3))]);

        // Swapping back restores the timeline and palette exactly.
        s.notify_chord_change(ChordId(3), ChordId(1)).unwrap();
        assert_eq!(s.chords, before.chords);
        assert_eq!(s.alternatives, before.alternatives);
        assert_eq!((s.alternatives[0].start, s.alternatives[0].duration), palette_span);
    }

    #[test]
    fn test_chord_change_refusals_leave_store_untouched() {
        let mut s = score();
        let before = s.clone();
        for (old, new) in [(1, 2), (1, 1), (1, 99), (42, 3)] {
            let err = s.notify_chord_change(ChordId(old), ChordId(new)).unwrap_err();
            assert!(matches!(err, EngineError::ChordNotSwappable { .. }), "{err}");
            assert_eq!(s, before);
        }
    }

    #[test]
    fn test_score_loads_from_json() {
        let json = serde_json::to_string(&score()).unwrap();
        let loaded = MemoryScore::from_json(&json).unwrap();
        assert_eq!(loaded.chords.len(), 2);
        assert_eq!(loaded.notes.len(), 4);
    }
}

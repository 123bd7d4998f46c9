// Voice–chord conflict detection.
//
// Classifies a proposed pitch for one voice against the chord sounding at
// that beat. The result is a severity plus a diagnostic describing why; a
// dissonance is never an error here. `detect_conflict` is pure: the same
// `EditContext` always yields the same `ConflictResult`, and the session's
// minimum-severity threshold is applied later by the caller, never here.
//
// Classification, in order:
// 1. The pitch class is one of the chord's required tones (extensions
//    included) → no conflict.
// 2. Weak beat, approached by step from the previous note (when there is
//    one) and left by step to a chord tone in the next note → no conflict.
//    The melodic figure is reported as passing, neighbour, or incomplete
//    neighbour (no previous note).
// 3. Strong beat and dissonant against the bass (seconds, fourth, tritone,
//    sevenths above the bass), or a minor second / tritone / major seventh
//    against any other sounding voice, with no stepwise resolution in the
//    next note → Error.
// 4. Anything else → Warning.
//
// The other voices are what the voice lines actually sing at the edit beat;
// a voice with no note there falls back to its pitch in the chord's voicing.
// "The bass" is the sounding bass found that way, or the chord root when
// there is none or the edited voice is the bass itself. The resolution target is the next chord when the next note starts at or after
// the end of the current chord, otherwise the current chord.

use crate::error::EngineError;
use chorale_theory::pitch::interval::{
    interval_class, interval_name, is_consonant_with_bass, is_harsh_clash, is_step, pc_interval,
};
use chorale_theory::pitch::pitch_class_name;
use chorale_theory::{
    Beat, BeatStrength, Chord, ChordId, MelodicNote, Pitch, TimeSignature, VoicePart,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// How risky a non-chord-tone placement is. Ordered: `None < Warning < Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::None => "none",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Melodic figure that excuses a weak-beat non-chord tone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonChordPattern {
    /// Stepped into and out of in the same direction.
    Passing,
    /// Stepped into and back out in the opposite direction.
    Neighbor,
    /// No previous note; only the stepwise departure is known.
    IncompleteNeighbor,
}

/// Everything the detector needs about one proposed edit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditContext {
    pub voice: VoicePart,
    pub proposed: Pitch,
    /// Start beat of the edited note.
    pub at: Beat,
    /// The chord sounding at `at`.
    pub chord: Chord,
    /// The chord after `chord`, if any.
    pub next_chord: Option<Chord>,
    pub time_signature: TimeSignature,
    /// Previous note in the same voice.
    pub prev_note: Option<MelodicNote>,
    /// Next note in the same voice.
    pub next_note: Option<MelodicNote>,
    /// Notes of the other voice lines sounding at `at`.
    #[serde(default)]
    pub sounding: Vec<MelodicNote>,
}

impl EditContext {
    /// Reject contexts that are internally inconsistent.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.chord.covers(self.at) {
            return Err(EngineError::InvalidEditInput(format!(
                "beat {} lies outside {} ({}..{})",
                self.at,
                self.chord.id,
                self.chord.start,
                self.chord.end()
            )));
        }
        self.time_signature
            .validate()
            .map_err(|e| EngineError::InvalidEditInput(e.to_string()))?;
        for (label, note) in [("previous", &self.prev_note), ("next", &self.next_note)] {
            if let Some(note) = note
                && note.voice != self.voice
            {
                return Err(EngineError::InvalidEditInput(format!(
                    "{label} note {} belongs to the {} line, not the {}",
                    note.id, note.voice, self.voice
                )));
            }
        }
        if let Some(prev) = &self.prev_note
            && prev.start >= self.at
        {
            return Err(EngineError::InvalidEditInput(format!(
                "previous note {} does not start before beat {}",
                prev.id, self.at
            )));
        }
        if let Some(next) = &self.next_note
            && next.start <= self.at
        {
            return Err(EngineError::InvalidEditInput(format!(
                "next note {} does not start after beat {}",
                next.id, self.at
            )));
        }
        for note in &self.sounding {
            if note.voice == self.voice || note.start > self.at || note.end() <= self.at {
                return Err(EngineError::InvalidEditInput(format!(
                    "{} ({} line) is not another voice sounding at beat {}",
                    note.id, note.voice, self.at
                )));
            }
        }
        Ok(())
    }

    /// What each other voice sounds at the edit: its note on the voice
    /// line, else its pitch in the chord's voicing. Voices with neither are
    /// left out.
    pub fn other_voices(&self) -> Vec<(VoicePart, Pitch)> {
        VoicePart::ALL
            .into_iter()
            .filter(|part| *part != self.voice)
            .filter_map(|part| {
                self.sounding
                    .iter()
                    .find(|n| n.voice == part)
                    .map(|n| n.pitch)
                    .or_else(|| self.chord.voicing.map(|v| v.get(part)))
                    .map(|pitch| (part, pitch))
            })
            .collect()
    }

    /// The chord the next note is measured against.
    fn resolution_chord(&self) -> &Chord {
        match (&self.next_note, &self.next_chord) {
            (Some(next), Some(chord)) if next.start >= self.chord.end() => chord,
            _ => &self.chord,
        }
    }
}

/// Why a pitch was classified the way it was.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConflictDiagnostic {
    pub chord: ChordId,
    pub chord_symbol: String,
    pub voice: VoicePart,
    pub proposed: Pitch,
    pub chord_tone: bool,
    pub beat_strength: BeatStrength,
    /// Interval class above the bass (or root).
    pub interval_above_bass: u8,
    /// First other voice forming a harsh clash, with the interval class.
    pub clash: Option<(VoicePart, u8)>,
    /// Next note steps to a tone of the resolution chord.
    pub resolves_by_step: bool,
    pub pattern: Option<NonChordPattern>,
}

impl ConflictDiagnostic {
    /// One-line human description for a dialog or log.
    pub fn describe(&self) -> String {
        let name = pitch_class_name(self.proposed.pitch_class());
        if self.chord_tone {
            return format!("{name} is a tone of {}", self.chord_symbol);
        }
        if let Some(pattern) = self.pattern
            && self.beat_strength == BeatStrength::Weak
        {
            let figure = match pattern {
                NonChordPattern::Passing => "passing tone",
                NonChordPattern::Neighbor => "neighbour tone",
                NonChordPattern::IncompleteNeighbor => "incomplete neighbour",
            };
            return format!("{name} in the {} is a weak-beat {figure}", self.voice);
        }
        let mut text = format!(
            "{name} in the {} is not in {} ({} above the bass",
            self.voice,
            self.chord_symbol,
            interval_name(self.interval_above_bass)
        );
        if self.beat_strength == BeatStrength::Strong {
            text.push_str(", strong beat");
        }
        text.push(')');
        if let Some((part, ic)) = self.clash {
            text.push_str(&format!("; {} against the {part}", interval_name(ic)));
        }
        if !self.resolves_by_step {
            text.push_str("; no stepwise resolution");
        }
        text
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConflictResult {
    pub severity: Severity,
    pub diagnostic: ConflictDiagnostic,
}

impl ConflictResult {
    pub fn has_conflict(&self) -> bool {
        self.severity > Severity::None
    }
}

/// Classify the proposed pitch. Only input validation can fail.
pub fn detect_conflict(ctx: &EditContext) -> Result<ConflictResult, EngineError> {
    ctx.validate()?;
    let invalid_chord = |chord: &Chord, e: chorale_theory::TheoryError| {
        EngineError::InvalidEditInput(format!("{}: {e}", chord.id))
    };

    let chord = &ctx.chord;
    let pc = ctx.proposed.pitch_class();
    let chord_pcs = chord.pitch_classes().map_err(|e| invalid_chord(chord, e))?;
    let root = chord.root_pc().map_err(|e| invalid_chord(chord, e))?;
    let target = ctx.resolution_chord();
    let target_pcs = target.pitch_classes().map_err(|e| invalid_chord(target, e))?;

    let chord_tone = chord_pcs.contains(&pc);
    let beat_strength = ctx.time_signature.strength(ctx.at);

    let others = ctx.other_voices();
    let bass_pc = others
        .iter()
        .find(|(part, _)| *part == VoicePart::Bass)
        .map_or(root, |(_, pitch)| pitch.pitch_class());
    let interval_above_bass = pc_interval(bass_pc, pc);

    let clash = others
        .iter()
        .map(|&(part, pitch)| (part, interval_class(ctx.proposed, pitch)))
        .find(|(_, ic)| is_harsh_clash(*ic));

    let resolves_by_step = ctx.next_note.as_ref().is_some_and(|next| {
        is_step(ctx.proposed, next.pitch) && target_pcs.contains(&next.pitch.pitch_class())
    });

    let pattern = if resolves_by_step {
        let next = ctx.next_note.as_ref().map(|n| n.pitch);
        match (ctx.prev_note.as_ref().map(|n| n.pitch), next) {
            (None, Some(_)) => Some(NonChordPattern::IncompleteNeighbor),
            (Some(prev), Some(next)) if is_step(prev, ctx.proposed) => {
                let into = prev.motion_to(ctx.proposed).signum();
                let out = ctx.proposed.motion_to(next).signum();
                if into == out {
                    Some(NonChordPattern::Passing)
                } else {
                    Some(NonChordPattern::Neighbor)
                }
            }
            _ => None,
        }
    } else {
        None
    };

    let severity = if chord_tone {
        Severity::None
    } else if beat_strength == BeatStrength::Weak && pattern.is_some() {
        Severity::None
    } else if ((beat_strength == BeatStrength::Strong
        && !is_consonant_with_bass(interval_above_bass))
        || clash.is_some())
        && !resolves_by_step
    {
        Severity::Error
    } else {
        Severity::Warning
    };

    let diagnostic = ConflictDiagnostic {
        chord: chord.id,
        chord_symbol: chord.symbol(),
        voice: ctx.voice,
        proposed: ctx.proposed,
        chord_tone,
        beat_strength,
        interval_above_bass,
        clash,
        resolves_by_step,
        pattern: if chord_tone { None } else { pattern },
    };
    debug!(
        voice = %ctx.voice,
        pitch = %ctx.proposed,
        %severity,
        "classified edit: {}",
        diagnostic.describe()
    );
    Ok(ConflictResult {
        severity,
        diagnostic,
    })
}

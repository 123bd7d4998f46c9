// Voicing assignor: four concrete pitches for one chord.
//
// Given a chord and (optionally) the voicing of the chord before it, pick a
// soprano/alto/tenor/bass assignment that:
// - uses only the chord's tones, reduced or doubled to exactly four;
// - keeps every voice inside its register band;
// - never crosses voices (bass <= tenor <= alto <= soprano; unisons only
//   when the chord has fewer than four distinct tones);
// - moves the voices as little as possible from the previous voicing.
//
// Reduction to four tones (chords with five or more): drop plain extensions
// (highest first), then non-characteristic alterations (highest first), then
// the fifth, then the third. The root, the seventh and the characteristic
// tone always stay. Chords with fewer than four tones double the root, then
// the fifth, then the third, never an altered or characteristic tone.
//
// The search itself is exhaustive over the small space of register-legal
// pitches: each voice has at most a handful of candidates, so enumerating
// bass → tenor → alto → soprano with ordering pruning is cheap and makes the
// minimality property checkable by brute force. The cost key is total
// displacement, then bass motion, alto, tenor, soprano, then the lowest
// pitches, so the result is fully deterministic.
//
// With no previous voicing the register anchors stand in for it and the
// upper three voices are kept in close position (soprano within an octave
// of the tenor) whenever the chord allows it.

use crate::error::EngineError;
use chorale_theory::{
    Chord, ChordId, ChordTone, Pitch, RegisterBounds, ToneRole, VoicePart, Voicing,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Result of voicing one chord.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoicingAssignment {
    pub chord: ChordId,
    pub voicing: Voicing,
    /// The four tones actually sung, bass first (doublings repeat a tone).
    pub voiced_tones: Vec<ChordTone>,
    /// Tones of the full chord left out to fit four voices.
    pub dropped: Vec<ChordTone>,
    /// Total semitone motion from the previous voicing, if there was one.
    pub motion: Option<u32>,
}

/// The chord's tone set fitted to exactly four voices.
#[derive(Clone, Debug, PartialEq)]
pub struct FittedTones {
    /// Four entries; a doubled tone appears twice.
    pub tones: Vec<ChordTone>,
    pub dropped: Vec<ChordTone>,
    /// Number of distinct pitch classes among `tones`.
    pub distinct: usize,
}

/// Reduce or double a chord's full tone set to four voices.
pub fn fit_to_four(chord: ChordId, full: &[ChordTone]) -> Result<FittedTones, EngineError> {
    if full.is_empty() {
        return Err(EngineError::UnvoiceableChord {
            chord,
            reason: "empty pitch-class set".into(),
        });
    }

    let mut kept: Vec<ChordTone> = full.to_vec();
    let mut dropped: Vec<ChordTone> = Vec::new();

    while kept.len() > 4 {
        let Some(victim) = drop_candidate(&kept) else {
            return Err(EngineError::UnvoiceableChord {
                chord,
                reason: format!("{} tones cannot be reduced to four", kept.len()),
            });
        };
        dropped.push(kept.remove(victim));
    }

    let distinct = kept.len();
    if kept.len() < 4 {
        let doublable: Vec<ChordTone> = [ToneRole::Root, ToneRole::Fifth, ToneRole::Third]
            .iter()
            .filter_map(|&role| {
                kept.iter()
                    .find(|t| t.role == role && !t.characteristic && !t.altered)
                    .copied()
            })
            .collect();
        if doublable.is_empty() {
            return Err(EngineError::UnvoiceableChord {
                chord,
                reason: "no tone may be doubled".into(),
            });
        }
        for tone in doublable.iter().cycle() {
            if kept.len() == 4 {
                break;
            }
            kept.push(*tone);
        }
    }

    Ok(FittedTones {
        tones: kept,
        dropped,
        distinct,
    })
}

/// Index of the next tone to drop, or None if only protected tones remain.
fn drop_candidate(kept: &[ChordTone]) -> Option<usize> {
    let droppable = |role: ToneRole| {
        kept.iter()
            .enumerate()
            .filter(move |(_, t)| t.role == role && !t.characteristic)
            .max_by_key(|(_, t)| t.interval)
            .map(|(i, _)| i)
    };
    droppable(ToneRole::Extension)
        .or_else(|| droppable(ToneRole::Alteration))
        .or_else(|| droppable(ToneRole::Fifth))
        .or_else(|| droppable(ToneRole::Third))
        .or_else(|| droppable(ToneRole::Suspension))
}

/// Assign a voicing to `chord`, leading from `previous` when given.
pub fn assign_voicing(
    chord: &Chord,
    previous: Option<&Voicing>,
    bounds: &RegisterBounds,
) -> Result<VoicingAssignment, EngineError> {
    let full = chord.tones().map_err(|e| {
        warn!(chord = %chord.id, error = %e, "chord has no valid tone set");
        EngineError::UnvoiceableChord {
            chord: chord.id,
            reason: e.to_string(),
        }
    })?;
    let fitted = fit_to_four(chord.id, &full)?;

    let mut target = [0u8; 12];
    for tone in &fitted.tones {
        target[tone.pitch_class as usize] += 1;
    }

    let candidates: Vec<Vec<Pitch>> = VoicePart::LOW_TO_HIGH
        .iter()
        .map(|&part| bounds.range(part).pitches_where(|pc| target[pc as usize] > 0))
        .collect();
    if let Some(i) = candidates.iter().position(|c| c.is_empty()) {
        let part = VoicePart::LOW_TO_HIGH[i];
        warn!(chord = %chord.id, %part, "no register-legal candidate");
        return Err(EngineError::UnvoiceableChord {
            chord: chord.id,
            reason: format!("no chord tone lies in the {part} register"),
        });
    }

    let reference = previous.copied().unwrap_or_else(|| anchor_voicing(bounds));
    let search = Search {
        candidates: &candidates,
        target,
        allow_unison: fitted.distinct < 4,
        reference,
    };
    let found = if previous.is_none() {
        search.best(true).or_else(|| search.best(false))
    } else {
        search.best(false)
    };
    let Some(pitches) = found else {
        warn!(chord = %chord.id, "no voicing satisfies ordering and range");
        return Err(EngineError::UnvoiceableChord {
            chord: chord.id,
            reason: "no ordered voicing fits the registers".into(),
        });
    };

    let voicing = Voicing::from_low_to_high(pitches);
    let voiced_tones = pitches
        .iter()
        .filter_map(|p| {
            fitted
                .tones
                .iter()
                .find(|t| t.pitch_class == p.pitch_class())
                .copied()
        })
        .collect();
    let motion = previous.map(|prev| voicing.motion_from(prev));
    debug!(
        chord = %chord.id,
        symbol = %chord.symbol(),
        %voicing,
        ?motion,
        dropped = fitted.dropped.len(),
        "voiced chord"
    );

    Ok(VoicingAssignment {
        chord: chord.id,
        voicing,
        voiced_tones,
        dropped: fitted.dropped,
        motion,
    })
}

/// The register anchors as a voicing, used when there is no previous chord.
pub fn anchor_voicing(bounds: &RegisterBounds) -> Voicing {
    Voicing {
        soprano: bounds.soprano.anchor,
        alto: bounds.alto.anchor,
        tenor: bounds.tenor.anchor,
        bass: bounds.bass.anchor,
    }
}

/// Ordering key: total motion, then bass, alto, tenor, soprano motion,
/// then the pitches themselves bass first.
type CostKey = (u32, u32, u32, u32, u32, [Pitch; 4]);

struct Search<'a> {
    /// Candidates per voice, bass first.
    candidates: &'a [Vec<Pitch>],
    /// Required count of each pitch class.
    target: [u8; 12],
    allow_unison: bool,
    reference: Voicing,
}

impl Search<'_> {
    fn ordered(&self, lower: Pitch, upper: Pitch) -> bool {
        lower < upper || (self.allow_unison && lower == upper)
    }

    fn cost(&self, pitches: [Pitch; 4]) -> CostKey {
        let [b, t, a, s] = pitches;
        let r = &self.reference;
        let db = b.distance(r.bass);
        let dt = t.distance(r.tenor);
        let da = a.distance(r.alto);
        let ds = s.distance(r.soprano);
        (db + dt + da + ds, db, da, dt, ds, pitches)
    }

    fn matches_target(&self, pitches: &[Pitch; 4]) -> bool {
        let mut counts = [0u8; 12];
        for p in pitches {
            counts[p.pitch_class() as usize] += 1;
        }
        counts == self.target
    }

    /// Cheapest legal assignment, optionally restricted to close position.
    fn best(&self, close: bool) -> Option<[Pitch; 4]> {
        let mut best: Option<CostKey> = None;
        for &b in &self.candidates[0] {
            for &t in self.candidates[1].iter().filter(|&&t| self.ordered(b, t)) {
                for &a in self.candidates[2].iter().filter(|&&a| self.ordered(t, a)) {
                    for &s in self.candidates[3].iter().filter(|&&s| self.ordered(a, s)) {
                        if close && s.distance(t) > 12 {
                            continue;
                        }
                        let pitches = [b, t, a, s];
                        if !self.matches_target(&pitches) {
                            continue;
                        }
                        let key = self.cost(pitches);
                        if best.as_ref().is_none_or(|current| key < *current) {
                            best = Some(key);
                        }
                    }
                }
            }
        }
        best.map(|key| key.5)
    }
}

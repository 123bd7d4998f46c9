// Voicing a whole progression.
//
// Chords are voiced left to right, each one leading from the voicing just
// assigned to its predecessor. Results are computed in full before any
// chord is written, so an unvoiceable chord anywhere leaves the slice
// unchanged.

use crate::error::EngineError;
use crate::voicing::{VoicingAssignment, assign_voicing};
use chorale_theory::{Chord, RegisterBounds, Voicing};
use tracing::{info, warn};

/// Voice every chord in timeline order, storing each voicing on its chord.
pub fn voice_progression(
    chords: &mut [Chord],
    bounds: &RegisterBounds,
) -> Result<Vec<VoicingAssignment>, EngineError> {
    let assignments = voice_chain(chords, None, bounds)?;
    apply(chords, &assignments);
    info!(
        chords = chords.len(),
        motion = total_motion(chords),
        "voiced progression"
    );
    Ok(assignments)
}

/// Re-voice `chords[index..]`, leading from the voicing of `chords[index - 1]`.
/// Used after a chord replacement so the rest of the line follows it. The
/// predecessor must already be voiced; index 0 starts from the anchors.
pub fn revoice_from(
    chords: &mut [Chord],
    index: usize,
    bounds: &RegisterBounds,
) -> Result<Vec<VoicingAssignment>, EngineError> {
    if index >= chords.len() {
        return Err(EngineError::InvalidEditInput(format!(
            "chord index {index} is past the end of a {}-chord progression",
            chords.len()
        )));
    }
    let previous = match index.checked_sub(1) {
        None => None,
        Some(i) => match chords[i].voicing {
            Some(voicing) => Some(voicing),
            None => {
                warn!(chord = %chords[i].id, "revoice requested after an unvoiced chord");
                return Err(EngineError::InvalidEditInput(format!(
                    "{} is unvoiced; voice the progression before re-voicing from index {index}",
                    chords[i].id
                )));
            }
        },
    };
    let assignments = voice_chain(&chords[index..], previous, bounds)?;
    apply(&mut chords[index..], &assignments);
    Ok(assignments)
}

/// Sum of voice motion between consecutive voiced chords.
pub fn total_motion(chords: &[Chord]) -> u32 {
    chords
        .windows(2)
        .filter_map(|pair| match (&pair[0].voicing, &pair[1].voicing) {
            (Some(a), Some(b)) => Some(b.motion_from(a)),
            _ => None,
        })
        .sum()
}

fn voice_chain(
    chords: &[Chord],
    mut previous: Option<Voicing>,
    bounds: &RegisterBounds,
) -> Result<Vec<VoicingAssignment>, EngineError> {
    let mut out = Vec::with_capacity(chords.len());
    for chord in chords {
        let assignment = assign_voicing(chord, previous.as_ref(), bounds)?;
        previous = Some(assignment.voicing);
        out.push(assignment);
    }
    Ok(out)
}

fn apply(chords: &mut [Chord], assignments: &[VoicingAssignment]) {
    for (chord, assignment) in chords.iter_mut().zip(assignments) {
        chord.voicing = Some(assignment.voicing);
    }
}

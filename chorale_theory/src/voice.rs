// SATB voice parts and their comfortable registers.
//
// `VoicePart` keeps the SATB index order used across the workspace
// (Soprano = 0 .. Bass = 3). Register bounds are data rather than constants
// baked into the enum: `RegisterBounds` holds an inclusive range and a
// register anchor per voice, with `Default` providing the house ranges. The
// engine config embeds a `RegisterBounds` so a host can narrow or widen them
// without touching code.
//
// The anchor is the pitch a voice gravitates towards when there is no
// previous chord to lead from (the first chord of a progression).

use crate::TheoryError;
use crate::pitch::Pitch;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A voice part in a four-voice arrangement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoicePart {
    Soprano = 0,
    Alto = 1,
    Tenor = 2,
    Bass = 3,
}

impl VoicePart {
    /// SATB order, highest voice first.
    pub const ALL: [VoicePart; 4] = [
        VoicePart::Soprano,
        VoicePart::Alto,
        VoicePart::Tenor,
        VoicePart::Bass,
    ];

    /// Bass first. This is the order in which voices are assigned.
    pub const LOW_TO_HIGH: [VoicePart; 4] = [
        VoicePart::Bass,
        VoicePart::Tenor,
        VoicePart::Alto,
        VoicePart::Soprano,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The voice directly below this one, if any.
    pub fn below(self) -> Option<VoicePart> {
        match self {
            VoicePart::Soprano => Some(VoicePart::Alto),
            VoicePart::Alto => Some(VoicePart::Tenor),
            VoicePart::Tenor => Some(VoicePart::Bass),
            VoicePart::Bass => None,
        }
    }

    /// The voice directly above this one, if any.
    pub fn above(self) -> Option<VoicePart> {
        match self {
            VoicePart::Soprano => None,
            VoicePart::Alto => Some(VoicePart::Soprano),
            VoicePart::Tenor => Some(VoicePart::Alto),
            VoicePart::Bass => Some(VoicePart::Tenor),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VoicePart::Soprano => "soprano",
            VoicePart::Alto => "alto",
            VoicePart::Tenor => "tenor",
            VoicePart::Bass => "bass",
        }
    }
}

impl fmt::Display for VoicePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive register band for one voice, plus its anchor pitch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRange {
    pub low: Pitch,
    pub high: Pitch,
    pub anchor: Pitch,
}

impl VoiceRange {
    pub fn contains(&self, pitch: Pitch) -> bool {
        pitch >= self.low && pitch <= self.high
    }

    /// Every pitch in the band whose class is accepted by `keep`, ascending.
    pub fn pitches_where(&self, mut keep: impl FnMut(u8) -> bool) -> Vec<Pitch> {
        (self.low.midi()..=self.high.midi())
            .filter(|&m| keep(m % 12))
            .filter_map(|m| Pitch::from_midi(m).ok())
            .collect()
    }
}

/// Register bands for all four voices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBounds {
    pub soprano: VoiceRange,
    pub alto: VoiceRange,
    pub tenor: VoiceRange,
    pub bass: VoiceRange,
}

impl Default for RegisterBounds {
    fn default() -> Self {
        let range = |low: u8, high: u8, anchor: u8| VoiceRange {
            low: Pitch(low),
            high: Pitch(high),
            anchor: Pitch(anchor),
        };
        RegisterBounds {
            soprano: range(60, 79, 67), // C4–G5, anchor G4
            alto: range(55, 74, 62),    // G3–D5, anchor D4
            tenor: range(48, 67, 55),   // C3–G4, anchor G3
            bass: range(40, 62, 48),    // E2–D4, anchor C3
        }
    }
}

impl RegisterBounds {
    pub fn range(&self, part: VoicePart) -> &VoiceRange {
        match part {
            VoicePart::Soprano => &self.soprano,
            VoicePart::Alto => &self.alto,
            VoicePart::Tenor => &self.tenor,
            VoicePart::Bass => &self.bass,
        }
    }

    /// Check the bands are usable: low <= anchor <= high and every band
    /// spans at least an octave, so each pitch class has an occurrence.
    pub fn validate(&self) -> Result<(), TheoryError> {
        for part in VoicePart::ALL {
            let r = self.range(part);
            if r.low > r.high {
                return Err(TheoryError::InvalidRegister {
                    part,
                    reason: format!("low {} is above high {}", r.low, r.high),
                });
            }
            if r.high.distance(r.low) < 11 {
                return Err(TheoryError::InvalidRegister {
                    part,
                    reason: format!("{}..{} spans less than an octave", r.low, r.high),
                });
            }
            if !r.contains(r.anchor) {
                return Err(TheoryError::InvalidRegister {
                    part,
                    reason: format!("anchor {} lies outside {}..{}", r.anchor, r.low, r.high),
                });
            }
        }
        Ok(())
    }
}

/// A concrete pitch for each of the four voices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voicing {
    pub soprano: Pitch,
    pub alto: Pitch,
    pub tenor: Pitch,
    pub bass: Pitch,
}

impl Voicing {
    /// Build from pitches listed bass first, matching `VoicePart::LOW_TO_HIGH`.
    pub fn from_low_to_high([bass, tenor, alto, soprano]: [Pitch; 4]) -> Self {
        Voicing {
            soprano,
            alto,
            tenor,
            bass,
        }
    }

    pub fn get(&self, part: VoicePart) -> Pitch {
        match part {
            VoicePart::Soprano => self.soprano,
            VoicePart::Alto => self.alto,
            VoicePart::Tenor => self.tenor,
            VoicePart::Bass => self.bass,
        }
    }

    pub fn set(&mut self, part: VoicePart, pitch: Pitch) {
        match part {
            VoicePart::Soprano => self.soprano = pitch,
            VoicePart::Alto => self.alto = pitch,
            VoicePart::Tenor => self.tenor = pitch,
            VoicePart::Bass => self.bass = pitch,
        }
    }

    /// (part, pitch) pairs in SATB order.
    pub fn iter(&self) -> impl Iterator<Item = (VoicePart, Pitch)> + '_ {
        VoicePart::ALL.into_iter().map(move |part| (part, self.get(part)))
    }

    /// bass <= tenor <= alto <= soprano.
    pub fn is_ordered(&self) -> bool {
        self.bass <= self.tenor && self.tenor <= self.alto && self.alto <= self.soprano
    }

    /// Every voice inside its band.
    pub fn within(&self, bounds: &RegisterBounds) -> bool {
        self.iter().all(|(part, pitch)| within_range(pitch, part, bounds))
    }

    /// Total absolute semitone displacement from `other`, summed over voices.
    pub fn motion_from(&self, other: &Voicing) -> u32 {
        VoicePart::ALL
            .iter()
            .map(|&part| self.get(part).distance(other.get(part)))
            .sum()
    }
}

impl fmt::Display for Voicing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S {} / A {} / T {} / B {}",
            self.soprano, self.alto, self.tenor, self.bass
        )
    }
}

/// Whether `pitch` lies in the configured band for `part`.
pub fn within_range(pitch: Pitch, part: VoicePart, bounds: &RegisterBounds) -> bool {
    bounds.range(part).contains(pitch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bounds_are_valid() {
        let bounds = RegisterBounds::default();
        bounds.validate().unwrap();
        assert!(within_range(Pitch::new(40).unwrap(), VoicePart::Bass, &bounds));
        assert!(!within_range(Pitch::new(39).unwrap(), VoicePart::Bass, &bounds));
        assert!(!within_range(Pitch::new(80).unwrap(), VoicePart::Soprano, &bounds));
    }

    #[test]
    fn test_narrow_band_rejected() {
        let mut bounds = RegisterBounds::default();
        bounds.tenor.high = Pitch::new(55).unwrap();
        assert!(bounds.validate().is_err());
    }

    #[test]
    fn test_anchor_outside_band_rejected() {
        let mut bounds = RegisterBounds::default();
        bounds.soprano.anchor = Pitch::new(50).unwrap();
        assert!(bounds.validate().is_err());
    }

    #[test]
    fn test_neighbours() {
        assert_eq!(VoicePart::Soprano.below(), Some(VoicePart::Alto));
        assert_eq!(VoicePart::Bass.below(), None);
        assert_eq!(VoicePart::Bass.above(), Some(VoicePart::Tenor));
        assert_eq!(VoicePart::LOW_TO_HIGH[0], VoicePart::Bass);
    }

    #[test]
    fn test_voicing_accessors_and_motion() {
        let p = |v| Pitch::new(v).unwrap();
        let a = Voicing::from_low_to_high([p(48), p(55), p(64), p(72)]);
        assert_eq!(a.get(VoicePart::Bass), p(48));
        assert_eq!(a.get(VoicePart::Soprano), p(72));
        assert!(a.is_ordered());
        assert!(a.within(&RegisterBounds::default()));

        let mut b = a;
        b.set(VoicePart::Alto, p(65));
        b.set(VoicePart::Bass, p(43));
        assert_eq!(b.motion_from(&a), 6);

        b.set(VoicePart::Tenor, p(70));
        assert!(!b.is_ordered());
    }

    #[test]
    fn test_pitches_where_filters_by_class() {
        let bounds = RegisterBounds::default();
        let cs = bounds.bass.pitches_where(|pc| pc == 0);
        assert_eq!(cs, vec![Pitch::new(48).unwrap(), Pitch::new(60).unwrap()]);
    }
}

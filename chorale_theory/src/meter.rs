// Beat positions and strong/weak beat classification.
//
// Beats are rational (`Ratio<i32>`) so triplets and dotted subdivisions are
// exact. A beat value counts units of the time signature's beat unit from
// the start of the piece: in 4/4, beat 5 is the second quarter of bar 2; in
// 6/8, beat 3 is the second dotted-quarter pulse of bar 1.
//
// The time signature is only used to answer "is this a strong beat?":
// - the downbeat of every bar is strong;
// - compound meters (x/8 with x a multiple of 3, x > 3) are strong on every
//   third eighth;
// - even simple meters with four or more beats are also strong on the
//   midpoint of the bar (beat 3 of 4/4);
// - everything else, including any off-beat position, is weak.

use crate::TheoryError;
use num_rational::Ratio;
use serde::{Deserialize, Serialize};

/// A rational beat position or duration.
pub type Beat = Ratio<i32>;

/// Shorthand for a whole-number beat.
pub fn beat(whole: i32) -> Beat {
    Ratio::from_integer(whole)
}

/// Opaque beat grid descriptor: `beats_per_bar` over `beat_unit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats_per_bar: u8,
    pub beat_unit: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature::COMMON
    }
}

/// Whether a beat position carries metric accent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatStrength {
    Strong,
    Weak,
}

impl TimeSignature {
    pub const COMMON: TimeSignature = TimeSignature {
        beats_per_bar: 4,
        beat_unit: 4,
    };

    pub fn new(beats_per_bar: u8, beat_unit: u8) -> Result<Self, TheoryError> {
        let ts = TimeSignature {
            beats_per_bar,
            beat_unit,
        };
        ts.validate()?;
        Ok(ts)
    }

    /// Beats per bar must be positive; the beat unit a power of two up to 64.
    pub fn validate(&self) -> Result<(), TheoryError> {
        if self.beats_per_bar == 0
            || self.beat_unit == 0
            || !self.beat_unit.is_power_of_two()
            || self.beat_unit > 64
        {
            return Err(TheoryError::InvalidTimeSignature {
                beats_per_bar: self.beats_per_bar,
                beat_unit: self.beat_unit,
            });
        }
        Ok(())
    }

    fn is_compound(&self) -> bool {
        self.beat_unit == 8 && self.beats_per_bar > 3 && self.beats_per_bar % 3 == 0
    }

    /// Position within the bar, in beats (0 <= pos < beats_per_bar).
    pub fn position_in_bar(&self, at: Beat) -> Beat {
        let bar = beat(self.beats_per_bar as i32);
        let pos = at % bar;
        if pos < beat(0) { pos + bar } else { pos }
    }

    pub fn strength(&self, at: Beat) -> BeatStrength {
        let pos = self.position_in_bar(at);
        if !pos.is_integer() {
            return BeatStrength::Weak;
        }
        let pos = pos.to_integer();
        let bpb = self.beats_per_bar as i32;
        let strong = pos == 0
            || (self.is_compound() && pos % 3 == 0)
            || (!self.is_compound() && bpb >= 4 && bpb % 2 == 0 && pos == bpb / 2);
        if strong {
            BeatStrength::Strong
        } else {
            BeatStrength::Weak
        }
    }

    pub fn is_strong(&self, at: Beat) -> bool {
        self.strength(at) == BeatStrength::Strong
    }
}

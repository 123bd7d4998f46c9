// Chord model and the static quality/extension interval tables.
//
// A `Chord` is what the progression timeline hands the engine: a scale
// degree in a key and mode, a quality, a map of extension flags, a beat span,
// and (once assigned) a voicing. From that description `Chord::tones()`
// derives the required pitch-class set, tagging every tone with its role so
// the voicing assignor can decide what to drop or double.
//
// Quality tables are fixed data: each `ChordQuality` lists its intervals
// above the root. Extension flags then modify the set:
// - `sus2`/`sus4` replace the third with a suspension;
// - `b5`/`#5` replace the fifth (marked altered);
// - `b9`, `#9`, `#11`, `b13` replace their natural counterparts;
// - `add6`, `add9`, `add11`, `add13` append added tones;
// - `dom7`/`7`, `maj7`, `min7`, `dim7` put a seventh on a quality that has
//   none, which is how analyzed chords arrive (a `major` base quality plus
//   a `dom7` flag for a dominant seventh).
// Pitch classes that coincide collapse to the first tone that claimed them.
//
// The *characteristic* tone is the one that names the chord (the flat nine
// of a C7(b9), the thirteenth of a G13). It is never dropped and never
// doubled. Priority: upper alteration > the quality's top extension > added
// tone > suspension > altered fifth. Plain triads and sevenths have none.
//
// Also here: chord symbols (`G9`, `Dm7`, `C7(b9,#11)`) and skeleton
// extraction, which strips a chord to its basic triad.

use crate::TheoryError;
use crate::meter::Beat;
use crate::pitch::pitch_class_name;
use crate::voice::Voicing;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a chord in the progression timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChordId(pub u32);

impl fmt::Display for ChordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chord#{}", self.0)
    }
}

/// Tonal mode of the key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    Major,
    Minor,
}

impl KeyMode {
    /// Semitone offsets of scale degrees 1-7 above the tonic.
    pub fn scale_steps(self) -> [u8; 7] {
        match self {
            KeyMode::Major => [0, 2, 4, 5, 7, 9, 11],
            KeyMode::Minor => [0, 2, 3, 5, 7, 8, 10],
        }
    }
}

/// Broad grouping of chord qualities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFamily {
    Triad,
    Seventh,
    Extended,
    AlteredDominant,
}

/// Function of a tone within its chord.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneRole {
    Root,
    Third,
    Suspension,
    Fifth,
    Seventh,
    Extension,
    Alteration,
}

/// The chord qualities the engine can voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    #[serde(alias = "maj")]
    Major,
    #[serde(alias = "min")]
    Minor,
    #[serde(alias = "dim")]
    Diminished,
    #[serde(alias = "aug")]
    Augmented,
    Power,
    #[serde(alias = "maj7")]
    MajorSeventh,
    #[serde(alias = "dom7", alias = "7")]
    DominantSeventh,
    #[serde(alias = "min7")]
    MinorSeventh,
    #[serde(alias = "m7b5")]
    HalfDiminishedSeventh,
    #[serde(alias = "dim7")]
    DiminishedSeventh,
    #[serde(alias = "minmaj7")]
    MinorMajorSeventh,
    #[serde(alias = "aug7")]
    AugmentedSeventh,
    #[serde(alias = "maj9")]
    MajorNinth,
    #[serde(alias = "9")]
    DominantNinth,
    #[serde(alias = "min9")]
    MinorNinth,
    #[serde(alias = "11")]
    DominantEleventh,
    #[serde(alias = "min11")]
    MinorEleventh,
    #[serde(alias = "maj11")]
    MajorEleventh,
    #[serde(alias = "maj13")]
    MajorThirteenth,
    #[serde(alias = "13")]
    DominantThirteenth,
    #[serde(alias = "min13")]
    MinorThirteenth,
    #[serde(alias = "7alt", alias = "alt")]
    AlteredDominant,
}

use ToneRole::{Extension as Ext, Fifth, Root, Seventh, Third};

impl ChordQuality {
    pub const ALL: [ChordQuality; 22] = [
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::Diminished,
        ChordQuality::Augmented,
        ChordQuality::Power,
        ChordQuality::MajorSeventh,
        ChordQuality::DominantSeventh,
        ChordQuality::MinorSeventh,
        ChordQuality::HalfDiminishedSeventh,
        ChordQuality::DiminishedSeventh,
        ChordQuality::MinorMajorSeventh,
        ChordQuality::AugmentedSeventh,
        ChordQuality::MajorNinth,
        ChordQuality::DominantNinth,
        ChordQuality::MinorNinth,
        ChordQuality::DominantEleventh,
        ChordQuality::MinorEleventh,
        ChordQuality::MajorEleventh,
        ChordQuality::MajorThirteenth,
        ChordQuality::DominantThirteenth,
        ChordQuality::MinorThirteenth,
        ChordQuality::AlteredDominant,
    ];

    /// Interval table: semitones above the root with each tone's role.
    /// Extensions use compound intervals (14 = ninth, 17 = eleventh,
    /// 21 = thirteenth).
    pub fn intervals(self) -> &'static [(u8, ToneRole)] {
        match self {
            ChordQuality::Major => &[(0, Root), (4, Third), (7, Fifth)],
            ChordQuality::Minor => &[(0, Root), (3, Third), (7, Fifth)],
            ChordQuality::Diminished => &[(0, Root), (3, Third), (6, Fifth)],
            ChordQuality::Augmented => &[(0, Root), (4, Third), (8, Fifth)],
            ChordQuality::Power => &[(0, Root), (7, Fifth)],
            ChordQuality::MajorSeventh => &[(0, Root), (4, Third), (7, Fifth), (11, Seventh)],
            ChordQuality::DominantSeventh | ChordQuality::AlteredDominant => {
                &[(0, Root), (4, Third), (7, Fifth), (10, Seventh)]
            }
            ChordQuality::MinorSeventh => &[(0, Root), (3, Third), (7, Fifth), (10, Seventh)],
            ChordQuality::HalfDiminishedSeventh => {
                &[(0, Root), (3, Third), (6, Fifth), (10, Seventh)]
            }
            ChordQuality::DiminishedSeventh => &[(0, Root), (3, Third), (6, Fifth), (9, Seventh)],
            ChordQuality::MinorMajorSeventh => {
                &[(0, Root), (3, Third), (7, Fifth), (11, Seventh)]
            }
            ChordQuality::AugmentedSeventh => &[(0, Root), (4, Third), (8, Fifth), (10, Seventh)],
            ChordQuality::MajorNinth => {
                &[(0, Root), (4, Third), (7, Fifth), (11, Seventh), (14, Ext)]
            }
            ChordQuality::DominantNinth => {
                &[(0, Root), (4, Third), (7, Fifth), (10, Seventh), (14, Ext)]
            }
            ChordQuality::MinorNinth => {
                &[(0, Root), (3, Third), (7, Fifth), (10, Seventh), (14, Ext)]
            }
            ChordQuality::DominantEleventh => &[
                (0, Root),
                (4, Third),
                (7, Fifth),
                (10, Seventh),
                (14, Ext),
                (17, Ext),
            ],
            ChordQuality::MinorEleventh => &[
                (0, Root),
                (3, Third),
                (7, Fifth),
                (10, Seventh),
                (14, Ext),
                (17, Ext),
            ],
            ChordQuality::MajorEleventh => &[
                (0, Root),
                (4, Third),
                (7, Fifth),
                (11, Seventh),
                (14, Ext),
                (17, Ext),
            ],
            // Thirteenths leave out the eleventh, which clashes with the third.
            ChordQuality::MajorThirteenth => &[
                (0, Root),
                (4, Third),
                (7, Fifth),
                (11, Seventh),
                (14, Ext),
                (21, Ext),
            ],
            ChordQuality::DominantThirteenth => &[
                (0, Root),
                (4, Third),
                (7, Fifth),
                (10, Seventh),
                (14, Ext),
                (21, Ext),
            ],
            ChordQuality::MinorThirteenth => &[
                (0, Root),
                (3, Third),
                (7, Fifth),
                (10, Seventh),
                (14, Ext),
                (21, Ext),
            ],
        }
    }

    pub fn family(self) -> QualityFamily {
        match self {
            ChordQuality::Major
            | ChordQuality::Minor
            | ChordQuality::Diminished
            | ChordQuality::Augmented
            | ChordQuality::Power => QualityFamily::Triad,
            ChordQuality::MajorSeventh
            | ChordQuality::DominantSeventh
            | ChordQuality::MinorSeventh
            | ChordQuality::HalfDiminishedSeventh
            | ChordQuality::DiminishedSeventh
            | ChordQuality::MinorMajorSeventh
            | ChordQuality::AugmentedSeventh => QualityFamily::Seventh,
            ChordQuality::AlteredDominant => QualityFamily::AlteredDominant,
            _ => QualityFamily::Extended,
        }
    }

    /// The basic triad underneath this quality.
    pub fn skeleton(self) -> ChordQuality {
        match self {
            ChordQuality::Minor
            | ChordQuality::MinorSeventh
            | ChordQuality::MinorMajorSeventh
            | ChordQuality::MinorNinth
            | ChordQuality::MinorEleventh
            | ChordQuality::MinorThirteenth => ChordQuality::Minor,
            ChordQuality::Diminished
            | ChordQuality::HalfDiminishedSeventh
            | ChordQuality::DiminishedSeventh => ChordQuality::Diminished,
            ChordQuality::Augmented | ChordQuality::AugmentedSeventh => ChordQuality::Augmented,
            ChordQuality::Power => ChordQuality::Power,
            _ => ChordQuality::Major,
        }
    }

    /// Chord-symbol suffix.
    pub fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "+",
            ChordQuality::Power => "5",
            ChordQuality::MajorSeventh => "maj7",
            ChordQuality::DominantSeventh | ChordQuality::AlteredDominant => "7",
            ChordQuality::MinorSeventh => "m7",
            ChordQuality::HalfDiminishedSeventh => "m7b5",
            ChordQuality::DiminishedSeventh => "dim7",
            ChordQuality::MinorMajorSeventh => "mM7",
            ChordQuality::AugmentedSeventh => "+7",
            ChordQuality::MajorNinth => "maj9",
            ChordQuality::DominantNinth => "9",
            ChordQuality::MinorNinth => "m9",
            ChordQuality::DominantEleventh => "11",
            ChordQuality::MinorEleventh => "m11",
            ChordQuality::MajorEleventh => "maj11",
            ChordQuality::MajorThirteenth => "maj13",
            ChordQuality::DominantThirteenth => "13",
            ChordQuality::MinorThirteenth => "m13",
        }
    }

    /// Diminished-family chords on degree 7 of a minor key sit on the raised
    /// leading tone rather than the subtonic.
    fn wants_leading_tone(self) -> bool {
        matches!(
            self,
            ChordQuality::Diminished
                | ChordQuality::HalfDiminishedSeventh
                | ChordQuality::DiminishedSeventh
        )
    }
}

/// Alteration and addition flags, keyed by their wire names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Extension {
    #[serde(rename = "add6")]
    Add6,
    #[serde(rename = "add9")]
    Add9,
    #[serde(rename = "add11")]
    Add11,
    #[serde(rename = "add13")]
    Add13,
    #[serde(rename = "sus2")]
    Sus2,
    #[serde(rename = "sus4")]
    Sus4,
    #[serde(rename = "b5")]
    FlatFive,
    #[serde(rename = "#5")]
    SharpFive,
    #[serde(rename = "b9")]
    FlatNine,
    #[serde(rename = "#9")]
    SharpNine,
    #[serde(rename = "#11")]
    SharpEleven,
    #[serde(rename = "b13")]
    FlatThirteen,
    #[serde(rename = "dom7", alias = "7")]
    DominantSeventh,
    #[serde(rename = "maj7")]
    MajorSeventh,
    #[serde(rename = "min7")]
    MinorSeventh,
    #[serde(rename = "dim7")]
    DiminishedSeventh,
}

impl Extension {
    /// Upper alterations, in characteristic-tone priority order, with the
    /// natural extension each one replaces.
    const UPPER_ALTERATIONS: [(Extension, u8, u8); 4] = [
        (Extension::FlatNine, 13, 14),
        (Extension::SharpNine, 15, 14),
        (Extension::SharpEleven, 18, 17),
        (Extension::FlatThirteen, 20, 21),
    ];

    /// Added tones, highest first.
    const ADDED: [(Extension, u8); 4] = [
        (Extension::Add13, 21),
        (Extension::Add11, 17),
        (Extension::Add9, 14),
        (Extension::Add6, 9),
    ];

    /// Seventh flags and the interval each adds, in precedence order.
    const SEVENTHS: [(Extension, u8); 4] = [
        (Extension::MajorSeventh, 11),
        (Extension::DominantSeventh, 10),
        (Extension::MinorSeventh, 10),
        (Extension::DiminishedSeventh, 9),
    ];

    pub fn label(self) -> &'static str {
        match self {
            Extension::Add6 => "add6",
            Extension::Add9 => "add9",
            Extension::Add11 => "add11",
            Extension::Add13 => "add13",
            Extension::Sus2 => "sus2",
            Extension::Sus4 => "sus4",
            Extension::FlatFive => "b5",
            Extension::SharpFive => "#5",
            Extension::FlatNine => "b9",
            Extension::SharpNine => "#9",
            Extension::SharpEleven => "#11",
            Extension::FlatThirteen => "b13",
            Extension::DominantSeventh => "dom7",
            Extension::MajorSeventh => "maj7",
            Extension::MinorSeventh => "min7",
            Extension::DiminishedSeventh => "dim7",
        }
    }
}

/// One required tone of a chord.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChordTone {
    pub pitch_class: u8,
    /// Semitones above the root (compound for extensions).
    pub interval: u8,
    pub role: ToneRole,
    /// The tone that names the chord; never dropped or doubled.
    pub characteristic: bool,
    /// Chromatically altered relative to the quality table.
    pub altered: bool,
}

/// A chord in the progression timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub id: ChordId,
    /// Scale degree 1-7.
    pub scale_degree: u8,
    /// Chromatic shift of the root in semitones (-1 for bII, bVII, ...).
    #[serde(default)]
    pub root_alteration: i8,
    pub quality: ChordQuality,
    #[serde(default)]
    pub extensions: BTreeMap<Extension, bool>,
    /// Tonic pitch class, 0-11.
    pub key: u8,
    pub mode: KeyMode,
    pub start: Beat,
    pub duration: Beat,
    #[serde(default)]
    pub voicing: Option<Voicing>,
}

impl Chord {
    /// A chord with no extensions and no voicing yet.
    pub fn new(
        id: ChordId,
        scale_degree: u8,
        quality: ChordQuality,
        key: u8,
        mode: KeyMode,
        start: Beat,
        duration: Beat,
    ) -> Self {
        Chord {
            id,
            scale_degree,
            root_alteration: 0,
            quality,
            extensions: BTreeMap::new(),
            key,
            mode,
            start,
            duration,
            voicing: None,
        }
    }

    /// Builder-style: set an extension flag.
    pub fn with_extension(mut self, ext: Extension) -> Self {
        self.extensions.insert(ext, true);
        self
    }

    pub fn has(&self, ext: Extension) -> bool {
        self.extensions.get(&ext).copied().unwrap_or(false)
    }

    /// A seventh flagged on a quality that lacks one: the flag and the
    /// interval it adds.
    fn flagged_seventh(&self) -> Option<(Extension, u8)> {
        let has_own = self
            .quality
            .intervals()
            .iter()
            .any(|(_, role)| *role == ToneRole::Seventh);
        if has_own {
            return None;
        }
        Extension::SEVENTHS.into_iter().find(|(ext, _)| self.has(*ext))
    }

    pub fn end(&self) -> Beat {
        self.start + self.duration
    }

    /// Whether `at` falls in [start, start + duration).
    pub fn covers(&self, at: Beat) -> bool {
        at >= self.start && at < self.end()
    }

    /// Root pitch class from key, mode, scale degree and chromatic shift.
    pub fn root_pc(&self) -> Result<u8, TheoryError> {
        if self.key > 11 {
            return Err(TheoryError::InvalidPitchClass(self.key));
        }
        if !(1..=7).contains(&self.scale_degree) {
            return Err(TheoryError::InvalidScaleDegree(self.scale_degree));
        }
        let mut step = self.mode.scale_steps()[(self.scale_degree - 1) as usize] as i32;
        if self.mode == KeyMode::Minor
            && self.scale_degree == 7
            && self.quality.wants_leading_tone()
        {
            step += 1;
        }
        Ok((self.key as i32 + step + self.root_alteration as i32).rem_euclid(12) as u8)
    }

    /// The full required tone set, root first, with roles and the
    /// characteristic tone marked.
    pub fn tones(&self) -> Result<Vec<ChordTone>, TheoryError> {
        let root = self.root_pc()?;
        // (interval, role, altered)
        let mut table: Vec<(u8, ToneRole, bool)> = self
            .quality
            .intervals()
            .iter()
            .map(|&(iv, role)| (iv, role, false))
            .collect();
        if let Some((_, iv)) = self.flagged_seventh() {
            table.push((iv, ToneRole::Seventh, false));
        }

        // Suspensions replace the third.
        let sus = if self.has(Extension::Sus4) {
            Some(5)
        } else if self.has(Extension::Sus2) {
            Some(2)
        } else {
            None
        };
        if let Some(iv) = sus {
            for entry in table.iter_mut().filter(|e| e.1 == ToneRole::Third) {
                *entry = (iv, ToneRole::Suspension, false);
            }
        }

        // Altered fifths replace the fifth.
        let altered_fifth = if self.has(Extension::FlatFive) {
            Some(6)
        } else if self.has(Extension::SharpFive) {
            Some(8)
        } else {
            None
        };
        if let Some(iv) = altered_fifth {
            for entry in table.iter_mut().filter(|e| e.1 == ToneRole::Fifth) {
                *entry = (iv, ToneRole::Fifth, true);
            }
        }

        // Upper alterations replace their natural extension.
        let mut upper: Vec<u8> = Vec::new();
        for (ext, iv, natural) in Extension::UPPER_ALTERATIONS {
            if self.has(ext) {
                table.retain(|e| !(e.0 == natural && e.1 == ToneRole::Extension));
                table.push((iv, ToneRole::Alteration, true));
                upper.push(iv);
            }
        }
        if self.quality == ChordQuality::AlteredDominant && upper.is_empty() {
            table.push((13, ToneRole::Alteration, true));
            upper.push(13);
        }

        let mut added: Vec<u8> = Vec::new();
        for (ext, iv) in Extension::ADDED {
            if self.has(ext) && !table.iter().any(|e| e.0 % 12 == iv % 12) {
                table.push((iv, ToneRole::Extension, false));
                added.push(iv);
            }
        }

        let characteristic: Option<u8> = upper
            .first()
            .copied()
            .or_else(|| {
                // The quality's own top extension.
                self.quality
                    .intervals()
                    .iter()
                    .filter(|(_, role)| *role == ToneRole::Extension)
                    .map(|&(iv, _)| iv)
                    .filter(|iv| table.iter().any(|e| e.0 == *iv))
                    .max()
            })
            .or_else(|| added.first().copied())
            .or(sus)
            .or(altered_fifth);

        let mut tones: Vec<ChordTone> = Vec::with_capacity(table.len());
        for (iv, role, altered) in table {
            let pc = (root + iv) % 12;
            if tones.iter().any(|t| t.pitch_class == pc) {
                continue;
            }
            tones.push(ChordTone {
                pitch_class: pc,
                interval: iv,
                role,
                characteristic: characteristic == Some(iv),
                altered,
            });
        }
        Ok(tones)
    }

    /// Distinct required pitch classes.
    pub fn pitch_classes(&self) -> Result<Vec<u8>, TheoryError> {
        Ok(self.tones()?.iter().map(|t| t.pitch_class).collect())
    }

    /// Chord symbol, e.g. `G9`, `F#m7b5`, `C7(b9,#11)`, `Dsus4`.
    pub fn symbol(&self) -> String {
        let root = match self.root_pc() {
            Ok(pc) => pitch_class_name(pc),
            Err(_) => "?",
        };
        let mut symbol = format!("{}{}", root, self.quality.suffix());
        match self.flagged_seventh() {
            Some((Extension::MajorSeventh, _)) if self.quality == ChordQuality::Minor => {
                symbol.push_str("M7")
            }
            Some((Extension::MajorSeventh, _)) => symbol.push_str("maj7"),
            Some(_) => symbol.push('7'),
            None => {}
        }
        if self.has(Extension::Sus4) {
            symbol.push_str("sus4");
        } else if self.has(Extension::Sus2) {
            symbol.push_str("sus2");
        }
        for (ext, _) in Extension::ADDED.iter().rev() {
            if self.has(*ext) {
                symbol.push_str(ext.label());
            }
        }
        let mut alterations: Vec<&str> = Vec::new();
        for ext in [Extension::FlatFive, Extension::SharpFive] {
            if self.has(ext) {
                alterations.push(ext.label());
            }
        }
        for (ext, _, _) in Extension::UPPER_ALTERATIONS {
            if self.has(ext) {
                alterations.push(ext.label());
            }
        }
        if self.quality == ChordQuality::AlteredDominant && alterations.is_empty() {
            alterations.push(Extension::FlatNine.label());
        }
        if !alterations.is_empty() {
            symbol.push('(');
            symbol.push_str(&alterations.join(","));
            symbol.push(')');
        }
        symbol
    }

    /// The same chord reduced to its basic triad with no extensions and no
    /// voicing.
    pub fn skeleton(&self) -> Chord {
        Chord {
            quality: self.quality.skeleton(),
            extensions: BTreeMap::new(),
            voicing: None,
            ..self.clone()
        }
    }
}

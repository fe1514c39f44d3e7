//! Per-track acoustic feature records.
//!
//! A [`FeatureRecord`] is produced once per track by a feature provider (see
//! [`loader`]) and consumed read-only by the scoring code. Every optional
//! group is `None` when the provider had no data for it, which is distinct
//! from a measured zero.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Weights for combining the four spectral energy bands (low → high).
pub const ENERGY_BAND_WEIGHTS: [f64; 4] = [0.1, 0.2, 0.4, 0.3];

/// Pitch-class names used for display, 0 = C.
const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

/// Parse a key name into a pitch class (0 = C .. 11 = B).
///
/// Accepts `C`, `C#`, `Db`, `c_sharp`, `d_flat`, `Bb`, `b` (the note B), etc.
/// Returns `None` for anything that isn't a note name.
pub fn pitch_class(name: &str) -> Option<u8> {
    let name = name.trim().to_lowercase();
    let mut chars = name.chars();
    let base = match chars.next()? {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    };
    let accidental: i32 = match chars.as_str() {
        "" => 0,
        "#" | "_sharp" | "sharp" => 1,
        "b" | "_flat" | "flat" => -1,
        _ => return None,
    };
    Some((base + accidental).rem_euclid(12) as u8)
}

/// Display name for a pitch class.
pub fn note_name(pitch_class: u8) -> &'static str {
    NOTE_NAMES[(pitch_class % 12) as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Major,
    Minor,
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
        }
    }
}

impl FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "major" | "maj" => Ok(Self::Major),
            "minor" | "min" => Ok(Self::Minor),
            other => Err(format!("unknown scale: {other}")),
        }
    }
}

/// Estimated key of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyEstimate {
    /// Tonic pitch class, 0 = C.
    pub tonic: u8,
    pub scale: Scale,
    /// Detector confidence in [0, 1].
    pub strength: f64,
}

impl KeyEstimate {
    pub fn new(tonic: u8, scale: Scale, strength: f64) -> Self {
        Self {
            tonic: tonic % 12,
            scale,
            strength: clamp_probability(strength),
        }
    }

    /// Build from a note name such as `"F#"`; `None` if the name doesn't parse.
    pub fn from_name(name: &str, scale: Scale, strength: f64) -> Option<Self> {
        pitch_class(name).map(|pc| Self::new(pc, scale, strength))
    }
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", note_name(self.tonic), self.scale)
    }
}

/// Mean spectral energy per band.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyBands {
    pub low: f64,
    pub mid_low: f64,
    pub mid_high: f64,
    pub high: f64,
}

impl EnergyBands {
    /// Weighted combination of the bands. Raw AcousticBrainz values land
    /// around 1e-3, so this is *not* a 0-1 score.
    pub fn score(&self) -> f64 {
        let [w_low, w_mid_low, w_mid_high, w_high] = ENERGY_BAND_WEIGHTS;
        w_low * self.low + w_mid_low * self.mid_low + w_mid_high * self.mid_high + w_high * self.high
    }
}

/// Single-Gaussian mel-cepstral model: mean vector plus covariance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CepstralModel {
    pub mean: Vec<f64>,
    /// Row-major square matrix matching `mean`; absent when the provider
    /// only exported means.
    pub covariance: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodAxis {
    Happy,
    Sad,
    Aggressive,
    Relaxed,
    Party,
    Acoustic,
}

impl MoodAxis {
    pub const ALL: [MoodAxis; 6] = [
        Self::Happy,
        Self::Sad,
        Self::Aggressive,
        Self::Relaxed,
        Self::Party,
        Self::Acoustic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Aggressive => "aggressive",
            Self::Relaxed => "relaxed",
            Self::Party => "party",
            Self::Acoustic => "acoustic",
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Happy => 0,
            Self::Sad => 1,
            Self::Aggressive => 2,
            Self::Relaxed => 3,
            Self::Party => 4,
            Self::Acoustic => 5,
        }
    }
}

impl fmt::Display for MoodAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MoodAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|axis| axis.name() == s)
            .ok_or_else(|| format!("unknown mood: {s}"))
    }
}

/// Independent per-axis probabilities that a track expresses each mood.
/// Axes the classifier didn't report stay at 0 (inactive).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MoodProbabilities {
    values: [f64; 6],
}

impl MoodProbabilities {
    pub fn from_pairs(pairs: &[(MoodAxis, f64)]) -> Self {
        let mut moods = Self::default();
        for &(axis, p) in pairs {
            moods.set(axis, p);
        }
        moods
    }

    pub fn get(&self, axis: MoodAxis) -> f64 {
        self.values[axis.index()]
    }

    pub fn set(&mut self, axis: MoodAxis, probability: f64) {
        self.values[axis.index()] = clamp_probability(probability);
    }

    pub fn iter(&self) -> impl Iterator<Item = (MoodAxis, f64)> + '_ {
        MoodAxis::ALL.into_iter().map(|axis| (axis, self.get(axis)))
    }

    /// Most probable axis, if any axis is above zero. Ties keep the first axis.
    pub fn dominant(&self) -> Option<MoodAxis> {
        self.iter()
            .filter(|&(_, p)| p > 0.0)
            .fold(None, |best: Option<(MoodAxis, f64)>, (axis, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((axis, p)),
            })
            .map(|(axis, _)| axis)
    }
}

/// Rosamerica genre taxonomy (closed, mutually exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Genre {
    #[serde(rename = "cla")]
    Classical,
    #[serde(rename = "dan")]
    Dance,
    #[serde(rename = "hip")]
    HipHop,
    #[serde(rename = "jaz")]
    Jazz,
    #[serde(rename = "pop")]
    Pop,
    #[serde(rename = "rhy")]
    RhythmAndBlues,
    #[serde(rename = "roc")]
    Rock,
    #[serde(rename = "spe")]
    Speech,
}

impl Genre {
    pub const ALL: [Genre; 8] = [
        Self::Classical,
        Self::Dance,
        Self::HipHop,
        Self::Jazz,
        Self::Pop,
        Self::RhythmAndBlues,
        Self::Rock,
        Self::Speech,
    ];

    /// Three-letter classifier code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Classical => "cla",
            Self::Dance => "dan",
            Self::HipHop => "hip",
            Self::Jazz => "jaz",
            Self::Pop => "pop",
            Self::RhythmAndBlues => "rhy",
            Self::Rock => "roc",
            Self::Speech => "spe",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_lowercase();
        Self::ALL.into_iter().find(|g| g.code() == code)
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|g| g == self).unwrap_or(0)
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Categorical genre distribution over [`Genre::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GenreDistribution {
    probs: [f64; 8],
}

impl GenreDistribution {
    pub fn from_pairs(pairs: &[(Genre, f64)]) -> Self {
        let mut probs = [0.0; 8];
        for &(genre, p) in pairs {
            probs[genre.index()] = clamp_probability(p);
        }
        Self { probs }
    }

    /// All mass on one genre.
    pub fn one_hot(genre: Genre) -> Self {
        Self::from_pairs(&[(genre, 1.0)])
    }

    pub fn get(&self, genre: Genre) -> f64 {
        self.probs[genre.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Genre, f64)> + '_ {
        Genre::ALL.into_iter().map(|g| (g, self.get(g)))
    }

    pub fn dominant(&self) -> Option<Genre> {
        self.iter()
            .filter(|&(_, p)| p > 0.0)
            .fold(None, |best: Option<(Genre, f64)>, (g, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((g, p)),
            })
            .map(|(g, _)| g)
    }
}

/// Everything the scorer knows about one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Provider identifier (MusicBrainz recording id for AcousticBrainz data).
    pub id: String,
    pub title: Option<String>,
    pub artist: Option<String>,

    /// Beats per minute. The only feature the engine requires.
    pub bpm: Option<f64>,
    pub key: Option<KeyEstimate>,
    pub energy: Option<EnergyBands>,
    /// Average loudness on the provider's normalized 0-1 scale.
    pub loudness: Option<f64>,
    pub dynamic_complexity: Option<f64>,
    pub timbre: Option<CepstralModel>,
    pub mood: Option<MoodProbabilities>,
    pub genre: Option<GenreDistribution>,
}

impl FeatureRecord {
    /// A record with only an identifier and tempo; every other group absent.
    pub fn new(id: impl Into<String>, bpm: f64) -> Self {
        Self {
            id: id.into(),
            title: None,
            artist: None,
            bpm: Some(bpm),
            key: None,
            energy: None,
            loudness: None,
            dynamic_complexity: None,
            timbre: None,
            mood: None,
            genre: None,
        }
    }

    /// Tempo if present and usable (finite, > 0).
    pub fn tempo(&self) -> Option<f64> {
        self.bpm.filter(|b| b.is_finite() && *b > 0.0)
    }

    pub fn energy_score(&self) -> Option<f64> {
        self.energy.map(|bands| bands.score())
    }

    /// "Artist - Title" when tagged, otherwise the identifier.
    pub fn label(&self) -> String {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => format!("{artist} - {title}"),
            (None, Some(title)) => title.clone(),
            _ => self.id.clone(),
        }
    }
}

/// Clamp into [0, 1]; NaN becomes 0.
pub(crate) fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

//! User preferences and how they reshape component scores.
//!
//! Preferences come in two strengths:
//! - **soft**: target/avoid moods nudge the mood component up or down,
//!   staying inside [0, 1];
//! - **hard**: tempo bounds. A breach is reported as a violation but never
//!   changes the probability; the caller decides what a violation means.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::compatibility::Score;
use crate::engine::{Component, Violation};
use crate::features::{FeatureRecord, MoodAxis, MoodProbabilities};

/// Maximum mood boost when the destination fully expresses every target mood.
pub const TARGET_MOOD_BONUS: f64 = 0.2;

/// Maximum mood cut when the destination fully expresses an avoided mood.
pub const AVOID_MOOD_PENALTY: f64 = 0.3;

/// Relative importance of each component. Need not sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentWeights {
    pub key: f64,
    pub tempo: f64,
    pub energy: f64,
    pub loudness: f64,
    pub mood: f64,
    pub timbre: f64,
    pub genre: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            key: 0.15,
            tempo: 0.20,
            energy: 0.15,
            loudness: 0.05,
            mood: 0.15,
            timbre: 0.20,
            genre: 0.10,
        }
    }
}

impl ComponentWeights {
    pub fn get(&self, component: Component) -> f64 {
        match component {
            Component::Key => self.key,
            Component::Tempo => self.tempo,
            Component::Energy => self.energy,
            Component::Loudness => self.loudness,
            Component::Mood => self.mood,
            Component::Timbre => self.timbre,
            Component::Genre => self.genre,
        }
    }

    pub fn set(&mut self, component: Component, weight: f64) {
        let slot = match component {
            Component::Key => &mut self.key,
            Component::Tempo => &mut self.tempo,
            Component::Energy => &mut self.energy,
            Component::Loudness => &mut self.loudness,
            Component::Mood => &mut self.mood,
            Component::Timbre => &mut self.timbre,
            Component::Genre => &mut self.genre,
        };
        *slot = weight;
    }

    /// Weights in [`Component::ALL`] order, divided by their sum.
    /// Negative or non-finite weights count as 0; if nothing is left, every
    /// component gets an equal share.
    pub fn normalized(&self) -> [f64; 7] {
        let raw: [f64; 7] = Component::ALL.map(|c| {
            let w = self.get(c);
            if w.is_finite() && w > 0.0 { w } else { 0.0 }
        });
        let total: f64 = raw.iter().sum();
        if total <= 0.0 {
            return [1.0 / 7.0; 7];
        }
        raw.map(|w| w / total)
    }
}

/// Caller-owned scoring preferences. The engine only reads them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub weights: ComponentWeights,
    pub min_bpm: Option<f64>,
    pub max_bpm: Option<f64>,
    pub target_moods: BTreeSet<MoodAxis>,
    pub avoid_moods: BTreeSet<MoodAxis>,
}

impl UserPreferences {
    pub fn from_toml_str(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load a standalone preferences file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let prefs = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        log::info!("Loaded preferences from {}", path.display());
        Ok(prefs)
    }
}

/// Applies one preference snapshot to raw component scores.
pub struct PreferenceModulator<'a> {
    prefs: &'a UserPreferences,
    weights: [f64; 7],
}

impl<'a> PreferenceModulator<'a> {
    pub fn new(prefs: &'a UserPreferences) -> Self {
        Self {
            prefs,
            weights: prefs.weights.normalized(),
        }
    }

    /// Soft mood shaping toward the destination track's moods.
    ///
    /// Only a measured mood score is shaped; the neutral fallback stays
    /// neutral so missing data never looks like a preference match.
    pub fn shape_mood(&self, mood: Score, destination: Option<&MoodProbabilities>) -> Score {
        let (Score::Measured { probability, .. }, Some(dest)) = (mood, destination) else {
            return mood;
        };

        let bonus = if self.prefs.target_moods.is_empty() {
            0.0
        } else {
            let total: f64 = self.prefs.target_moods.iter().map(|&m| dest.get(m)).sum();
            TARGET_MOOD_BONUS * total / self.prefs.target_moods.len() as f64
        };
        let penalty = self
            .prefs
            .avoid_moods
            .iter()
            .map(|&m| dest.get(m))
            .fold(0.0_f64, f64::max)
            * AVOID_MOOD_PENALTY;

        mood.with_probability(probability + bonus - penalty)
    }

    /// Hard tempo bounds, checked on both tracks in order.
    pub fn tempo_violations(&self, tracks: [&FeatureRecord; 2]) -> Vec<Violation> {
        let mut violations = Vec::new();
        for track in tracks {
            let Some(bpm) = track.tempo() else { continue };
            if let Some(min) = self.prefs.min_bpm {
                if bpm < min {
                    violations.push(Violation::TempoBelowMinimum {
                        track: track.id.clone(),
                        bpm,
                        min,
                    });
                }
            }
            if let Some(max) = self.prefs.max_bpm {
                if bpm > max {
                    violations.push(Violation::TempoAboveMaximum {
                        track: track.id.clone(),
                        bpm,
                        max,
                    });
                }
            }
        }
        violations
    }

    /// Preference-weighted arithmetic mean of the measured components.
    ///
    /// Neutral fallbacks carry no evidence, so their weight is spread over
    /// the measured components. With nothing measured (or only zero-weight
    /// components measured) every component counts at its normal weight.
    pub fn combine(&self, scores: &[Score; 7]) -> f64 {
        let measured_weight: f64 = self
            .weights
            .iter()
            .zip(scores)
            .filter(|(_, s)| !s.is_neutral())
            .map(|(w, _)| w)
            .sum();

        let mean = if measured_weight > 0.0 {
            self.weights
                .iter()
                .zip(scores)
                .filter(|(_, s)| !s.is_neutral())
                .map(|(w, s)| w * s.probability())
                .sum::<f64>()
                / measured_weight
        } else {
            self.weights
                .iter()
                .zip(scores)
                .map(|(w, s)| w * s.probability())
                .sum::<f64>()
        };
        mean.clamp(0.0, 1.0)
    }
}

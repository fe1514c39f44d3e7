//! Pairwise transition scoring.
//!
//! [`CompatibilityEngine::get_compatibility`] scores a transition from one
//! track into the next: seven component probabilities, preference shaping,
//! then a preference-weighted arithmetic mean over the components both tracks
//! had data for. A mean rather than a product means a single weak dimension
//! lowers the score without vetoing it.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::{genre_compatibility, mood_compatibility};
use crate::compatibility::{
    Score, circle_of_fifths_distance, energy_compatibility, is_double_time, key_compatibility,
    loudness_compatibility, tempo_compatibility, timbre_compatibility,
};
use crate::features::FeatureRecord;
use crate::playlist::{PlaylistValidation, PlaylistValidator};
use crate::preferences::{PreferenceModulator, UserPreferences};

/// A transition is compatible when its probability is strictly above this.
pub const COMPATIBILITY_THRESHOLD: f64 = 0.3;

/// A component strictly below this is reported as a violation.
pub const COMPONENT_VIOLATION_THRESHOLD: f64 = 0.35;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompatibilityError {
    #[error("Missing required feature `{feature}` on both {from} and {to}")]
    MissingRequiredFeature {
        feature: &'static str,
        from: String,
        to: String,
    },
    #[error("Playlist needs at least 2 tracks, got {len}")]
    InvalidPlaylist { len: usize },
}

pub type Result<T> = std::result::Result<T, CompatibilityError>;

/// The seven scored dimensions, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Key,
    Tempo,
    Energy,
    Loudness,
    Mood,
    Timbre,
    Genre,
}

impl Component {
    pub const ALL: [Component; 7] = [
        Self::Key,
        Self::Tempo,
        Self::Energy,
        Self::Loudness,
        Self::Mood,
        Self::Timbre,
        Self::Genre,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Tempo => "tempo",
            Self::Energy => "energy",
            Self::Loudness => "loudness",
            Self::Mood => "mood",
            Self::Timbre => "timbre",
            Self::Genre => "genre",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something about a transition worth flagging. Violations never change the
/// probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A component scored below [`COMPONENT_VIOLATION_THRESHOLD`].
    LowComponent { component: Component, probability: f64 },
    TempoBelowMinimum { track: String, bpm: f64, min: f64 },
    TempoAboveMaximum { track: String, bpm: f64, max: f64 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowComponent { component, probability } => {
                write!(f, "{component} incompatible (P={:.0}%)", probability * 100.0)
            }
            Self::TempoBelowMinimum { track, bpm, min } => {
                write!(f, "tempo {bpm:.0} BPM below minimum {min:.0} ({track})")
            }
            Self::TempoAboveMaximum { track, bpm, max } => {
                write!(f, "tempo {bpm:.0} BPM above maximum {max:.0} ({track})")
            }
        }
    }
}

/// Score of one transition. Built once per call, never modified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionResult {
    pub probability: f64,
    /// `1 − probability`: the edge cost for a path search.
    pub penalty: f64,
    pub is_compatible: bool,

    pub key_compatibility: f64,
    pub tempo_compatibility: f64,
    pub energy_compatibility: f64,
    pub loudness_compatibility: f64,
    pub mood_compatibility: f64,
    pub timbre_compatibility: f64,
    pub genre_compatibility: f64,

    pub violations: Vec<Violation>,
    /// Components that fell back to their neutral value for lack of data.
    pub degraded: Vec<Component>,
    pub explanation: String,
}

impl TransitionResult {
    pub fn component(&self, component: Component) -> f64 {
        match component {
            Component::Key => self.key_compatibility,
            Component::Tempo => self.tempo_compatibility,
            Component::Energy => self.energy_compatibility,
            Component::Loudness => self.loudness_compatibility,
            Component::Mood => self.mood_compatibility,
            Component::Timbre => self.timbre_compatibility,
            Component::Genre => self.genre_compatibility,
        }
    }

    pub fn components(&self) -> [(Component, f64); 7] {
        Component::ALL.map(|c| (c, self.component(c)))
    }
}

/// Stateless scorer holding a snapshot of the caller's preferences.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityEngine {
    preferences: UserPreferences,
}

impl CompatibilityEngine {
    pub fn new(preferences: UserPreferences) -> Self {
        Self { preferences }
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    /// Replace the preferences; only later calls see the change.
    pub fn set_preferences(&mut self, preferences: UserPreferences) {
        self.preferences = preferences;
    }

    /// Score the transition `from` → `to`.
    ///
    /// Fails only when neither track has a tempo. Every other gap falls back
    /// to that component's neutral value and is listed in `degraded`; the
    /// combined probability is the weighted mean of the remaining components.
    pub fn get_compatibility(
        &self,
        from: &FeatureRecord,
        to: &FeatureRecord,
    ) -> Result<TransitionResult> {
        if from.tempo().is_none() && to.tempo().is_none() {
            return Err(CompatibilityError::MissingRequiredFeature {
                feature: "tempo",
                from: from.id.clone(),
                to: to.id.clone(),
            });
        }

        let modulator = PreferenceModulator::new(&self.preferences);

        let mood = mood_compatibility(from.mood.as_ref(), to.mood.as_ref());
        let scores: [Score; 7] = [
            key_compatibility(from.key.as_ref(), to.key.as_ref()),
            tempo_compatibility(from.tempo(), to.tempo()),
            energy_compatibility(from.energy.as_ref(), to.energy.as_ref()),
            loudness_compatibility(from.loudness, to.loudness),
            modulator.shape_mood(mood, to.mood.as_ref()),
            timbre_compatibility(from.timbre.as_ref(), to.timbre.as_ref()),
            genre_compatibility(from.genre.as_ref(), to.genre.as_ref()),
        ];
        let probabilities = scores.map(|s| s.probability());
        let probability = modulator.combine(&scores);

        let mut violations: Vec<Violation> = Component::ALL
            .iter()
            .zip(&probabilities)
            .filter(|&(_, &p)| p < COMPONENT_VIOLATION_THRESHOLD)
            .map(|(&component, &probability)| Violation::LowComponent { component, probability })
            .collect();
        violations.extend(modulator.tempo_violations([from, to]));

        let degraded: Vec<Component> = Component::ALL
            .iter()
            .zip(&scores)
            .filter(|(_, s)| s.is_neutral())
            .map(|(&c, _)| c)
            .collect();

        log::debug!(
            "{} -> {}: P={:.3} [key {:.2}, tempo {:.2}, energy {:.2}, loudness {:.2}, mood {:.2}, timbre {:.2}, genre {:.2}]",
            from.id,
            to.id,
            probability,
            probabilities[0],
            probabilities[1],
            probabilities[2],
            probabilities[3],
            probabilities[4],
            probabilities[5],
            probabilities[6],
        );
        if !degraded.is_empty() {
            log::debug!("{} -> {}: neutral fallback for {:?}", from.id, to.id, degraded);
        }

        Ok(TransitionResult {
            probability,
            penalty: 1.0 - probability,
            is_compatible: probability > COMPATIBILITY_THRESHOLD,
            key_compatibility: probabilities[0],
            tempo_compatibility: probabilities[1],
            energy_compatibility: probabilities[2],
            loudness_compatibility: probabilities[3],
            mood_compatibility: probabilities[4],
            timbre_compatibility: probabilities[5],
            genre_compatibility: probabilities[6],
            violations,
            degraded,
            explanation: explain(from, to, &scores),
        })
    }

    /// Edge cost `1 − probability`, always in [0, 1].
    pub fn get_penalty(&self, from: &FeatureRecord, to: &FeatureRecord) -> Result<f64> {
        Ok(self.get_compatibility(from, to)?.penalty)
    }

    /// Score `from` against every candidate in parallel. Results keep the
    /// candidates' order.
    pub fn score_candidates(
        &self,
        from: &FeatureRecord,
        candidates: &[FeatureRecord],
    ) -> Vec<Result<TransitionResult>> {
        candidates
            .par_iter()
            .map(|to| self.get_compatibility(from, to))
            .collect()
    }

    /// Validate a playlist with the default per-transition floor.
    pub fn validate_playlist(&self, tracks: &[FeatureRecord]) -> Result<PlaylistValidation> {
        PlaylistValidator::new(self).validate(tracks)
    }
}

fn percent(p: f64) -> String {
    format!("{:.0}%", p * 100.0)
}

fn or_unknown<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

/// One line per component with the raw delta behind each probability.
fn explain(from: &FeatureRecord, to: &FeatureRecord, scores: &[Score; 7]) -> String {
    let [key, tempo, energy, loudness, mood, timbre, genre] = scores;
    let mut lines = Vec::with_capacity(7);

    // Key
    let key_detail = match (key.delta(), from.key, to.key) {
        (Some(delta), Some(a), Some(b)) => format!(
            "fifths={}, r={:.2}",
            circle_of_fifths_distance(a.tonic, b.tonic),
            1.0 - delta
        ),
        _ => "neutral".to_string(),
    };
    lines.push(format!(
        "Key: {} -> {} ({}, P={})",
        or_unknown(from.key),
        or_unknown(to.key),
        key_detail,
        percent(key.probability())
    ));

    // Tempo
    let tempo_detail = match (tempo.delta(), from.tempo(), to.tempo()) {
        (Some(delta), Some(a), Some(b)) => {
            let note = if is_double_time(a, b) { " [double-time]" } else { "" };
            format!("delta={delta:.1}{note}")
        }
        _ => "neutral".to_string(),
    };
    lines.push(format!(
        "Tempo: {} -> {} BPM ({}, P={})",
        or_unknown(from.tempo().map(|b| format!("{b:.0}"))),
        or_unknown(to.tempo().map(|b| format!("{b:.0}"))),
        tempo_detail,
        percent(tempo.probability())
    ));

    // Energy
    lines.push(format!(
        "Energy: {} -> {} ({}, P={})",
        or_unknown(from.energy_score().map(|e| format!("{e:.4}"))),
        or_unknown(to.energy_score().map(|e| format!("{e:.4}"))),
        energy.delta().map_or_else(|| "neutral".to_string(), |d| format!("delta={d:.4}")),
        percent(energy.probability())
    ));

    // Loudness
    lines.push(format!(
        "Loudness: {} -> {} ({}, P={})",
        or_unknown(from.loudness.map(|l| format!("{l:.2}"))),
        or_unknown(to.loudness.map(|l| format!("{l:.2}"))),
        loudness.delta().map_or_else(|| "neutral".to_string(), |d| format!("delta={d:.2}")),
        percent(loudness.probability())
    ));

    // Mood
    lines.push(format!(
        "Mood: {} -> {} ({}, P={})",
        or_unknown(from.mood.and_then(|m| m.dominant())),
        or_unknown(to.mood.and_then(|m| m.dominant())),
        mood.delta().map_or_else(|| "neutral".to_string(), |d| format!("delta={d:.2}")),
        percent(mood.probability())
    ));

    // Timbre
    lines.push(format!(
        "Timbre: ({}, P={})",
        timbre.delta().map_or_else(|| "neutral".to_string(), |d| format!("D_B={d:.3}")),
        percent(timbre.probability())
    ));

    // Genre
    lines.push(format!(
        "Genre: {} -> {} ({}, P={})",
        or_unknown(from.genre.and_then(|g| g.dominant())),
        or_unknown(to.genre.and_then(|g| g.dominant())),
        genre.delta().map_or_else(|| "neutral".to_string(), |d| format!("delta={d:.2}")),
        percent(genre.probability())
    ));

    lines.join("\n")
}

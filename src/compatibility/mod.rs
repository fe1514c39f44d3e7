//! Per-dimension transition probabilities from continuous features.
//!
//! Each function compares one feature group of two tracks and returns a
//! [`Score`]: either a measured probability in [0, 1] together with the raw
//! distance it was computed from, or a fixed neutral value when one side
//! lacks the data. None of these functions fail.

pub mod key;
pub mod tempo;
pub mod timbre;

use crate::features::EnergyBands;

pub use key::{circle_of_fifths_distance, key_compatibility};
pub use tempo::{effective_tempo_delta, is_double_time, tempo_compatibility};
pub use timbre::{bhattacharyya_distance, timbre_compatibility};

/// Gaussian width for the weighted energy-band score. Raw band means are
/// ~1e-3, so this sits just above a typical within-genre spread.
pub const ENERGY_SIGMA: f64 = 0.003;

/// Gaussian width for average loudness (0-1 scale). Within-genre deltas of
/// ~0.05 score ~95%; pop (0.77) vs classical (0.10) scores ~2%.
pub const LOUDNESS_SIGMA: f64 = 0.15;

pub const NEUTRAL_ENERGY: f64 = 0.5;
pub const NEUTRAL_LOUDNESS: f64 = 0.7;

/// Outcome of comparing one feature group between two tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    /// Both tracks carried the data. `delta` is the raw distance that was
    /// mapped to `probability` (units depend on the component).
    Measured { probability: f64, delta: f64 },
    /// At least one track lacked the data; fixed neutral probability.
    Neutral(f64),
}

impl Score {
    pub fn probability(&self) -> f64 {
        match *self {
            Self::Measured { probability, .. } => probability,
            Self::Neutral(p) => p,
        }
    }

    pub fn delta(&self) -> Option<f64> {
        match *self {
            Self::Measured { delta, .. } => Some(delta),
            Self::Neutral(_) => None,
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, Self::Neutral(_))
    }

    /// Same evidence, different probability (clamped to [0, 1]).
    pub(crate) fn with_probability(self, probability: f64) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        match self {
            Self::Measured { delta, .. } => Self::Measured { probability, delta },
            Self::Neutral(_) => Self::Neutral(probability),
        }
    }
}

/// `exp(-Δ² / 2σ²)`: 1 at Δ = 0, ~0.61 at one σ, ~0.14 at two.
pub fn gaussian_similarity(delta: f64, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return if delta == 0.0 { 1.0 } else { 0.0 };
    }
    (-(delta * delta) / (2.0 * sigma * sigma)).exp()
}

/// Spectral energy compatibility from the weighted band scores. A band score
/// that isn't finite counts as missing.
pub fn energy_compatibility(a: Option<&EnergyBands>, b: Option<&EnergyBands>) -> Score {
    let usable = |bands: Option<&EnergyBands>| bands.map(|b| b.score()).filter(|s| s.is_finite());
    match (usable(a), usable(b)) {
        (Some(a), Some(b)) => {
            let delta = (a - b).abs();
            Score::Measured {
                probability: gaussian_similarity(delta, ENERGY_SIGMA),
                delta,
            }
        }
        _ => Score::Neutral(NEUTRAL_ENERGY),
    }
}

/// Loudness compatibility from normalized average loudness.
pub fn loudness_compatibility(a: Option<f64>, b: Option<f64>) -> Score {
    match (a.filter(|v| v.is_finite()), b.filter(|v| v.is_finite())) {
        (Some(a), Some(b)) => {
            let delta = (a - b).abs();
            Score::Measured {
                probability: gaussian_similarity(delta, LOUDNESS_SIGMA),
                delta,
            }
        }
        _ => Score::Neutral(NEUTRAL_LOUDNESS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bands(mid_high: f64) -> EnergyBands {
        EnergyBands { low: 0.002, mid_low: 0.002, mid_high, high: 0.001 }
    }

    #[test]
    fn test_gaussian_similarity_shape() {
        assert_eq!(gaussian_similarity(0.0, 1.0), 1.0);
        assert!((gaussian_similarity(1.0, 1.0) - (-0.5f64).exp()).abs() < 1e-12);
        assert!(gaussian_similarity(2.0, 1.0) < gaussian_similarity(1.0, 1.0));
        assert_eq!(gaussian_similarity(0.0, 0.0), 1.0);
        assert_eq!(gaussian_similarity(0.1, 0.0), 0.0);
    }

    #[test]
    fn test_energy_identical_is_one() {
        let a = bands(0.004);
        let score = energy_compatibility(Some(&a), Some(&a));
        assert_eq!(score, Score::Measured { probability: 1.0, delta: 0.0 });
    }

    #[test]
    fn test_energy_calibrated_to_small_scale() {
        // mid_high differs by 0.0075 → weighted delta 0.003 = one sigma
        let score = energy_compatibility(Some(&bands(0.002)), Some(&bands(0.0095)));
        assert!((score.delta().unwrap() - 0.003).abs() < 1e-12);
        assert!((score.probability() - (-0.5f64).exp()).abs() < 1e-9);

        // A 0.01 weighted jump is far outside the typical range
        let far = energy_compatibility(Some(&bands(0.0)), Some(&bands(0.025)));
        assert!(far.probability() < 0.01);
    }

    #[test]
    fn test_energy_missing_is_neutral() {
        let a = bands(0.004);
        assert_eq!(energy_compatibility(Some(&a), None), Score::Neutral(NEUTRAL_ENERGY));
        assert_eq!(energy_compatibility(None, None), Score::Neutral(NEUTRAL_ENERGY));
    }

    #[test]
    fn test_energy_non_finite_is_neutral() {
        let good = bands(0.004);
        let nan = EnergyBands { low: f64::NAN, ..good };
        let inf = EnergyBands { high: f64::INFINITY, ..good };
        assert_eq!(energy_compatibility(Some(&nan), Some(&nan)), Score::Neutral(NEUTRAL_ENERGY));
        assert_eq!(energy_compatibility(Some(&good), Some(&inf)), Score::Neutral(NEUTRAL_ENERGY));
    }

    #[test]
    fn test_loudness() {
        let same = loudness_compatibility(Some(0.6), Some(0.6));
        assert_eq!(same.probability(), 1.0);

        let close = loudness_compatibility(Some(0.80), Some(0.75));
        assert!(close.probability() > 0.94);

        let pop_vs_classical = loudness_compatibility(Some(0.77), Some(0.10));
        assert!(pop_vs_classical.probability() < 0.05);

        let missing = loudness_compatibility(Some(0.5), None);
        assert!(missing.is_neutral());
        assert_eq!(missing.probability(), NEUTRAL_LOUDNESS);
        assert!(loudness_compatibility(Some(f64::NAN), Some(0.5)).is_neutral());
    }

    #[test]
    fn test_with_probability_clamps_and_keeps_evidence() {
        let s = Score::Measured { probability: 0.4, delta: 2.0 }.with_probability(1.3);
        assert_eq!(s, Score::Measured { probability: 1.0, delta: 2.0 });
        let n = Score::Neutral(0.5).with_probability(-0.2);
        assert_eq!(n, Score::Neutral(0.0));
    }
}

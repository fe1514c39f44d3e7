//! Tempo compatibility with double/half-time equivalence.
//!
//! Drake & Botte (1993): the just-noticeable difference for tempo is about
//! 4% of the reference tempo. The Gaussian width is three JNDs, so a one-JND
//! change still scores ~95%.

use super::{Score, gaussian_similarity};

/// JND as a fraction of the reference BPM.
pub const TEMPO_JND_FRACTION: f64 = 0.04;

/// Gaussian width in JNDs.
pub const TEMPO_SIGMA_JNDS: f64 = 3.0;

/// Used only when exactly one track has a tempo.
pub const NEUTRAL_TEMPO: f64 = 0.5;

/// Slack for calling a pair double/half-time in explanations.
pub const DOUBLE_TIME_TOLERANCE_BPM: f64 = 5.0;

/// `min(|a − b|, |a − 2b|, |a − b/2|)` in BPM.
pub fn effective_tempo_delta(bpm1: f64, bpm2: f64) -> f64 {
    let direct = (bpm1 - bpm2).abs();
    let double = (bpm1 - 2.0 * bpm2).abs();
    let half = (bpm1 - 0.5 * bpm2).abs();
    direct.min(double).min(half)
}

/// Probability for two known tempi. The outgoing track (`bpm1`) is the
/// reference, so σ = 3 × 4% × bpm1.
pub fn tempo_probability(bpm1: f64, bpm2: f64) -> f64 {
    let sigma = TEMPO_SIGMA_JNDS * TEMPO_JND_FRACTION * bpm1;
    gaussian_similarity(effective_tempo_delta(bpm1, bpm2), sigma)
}

/// Tempo compatibility. Tempi must be finite and positive to count as known;
/// if only one is known the score is neutral. `delta` is the effective BPM
/// delta.
pub fn tempo_compatibility(bpm1: Option<f64>, bpm2: Option<f64>) -> Score {
    let usable = |b: Option<f64>| b.filter(|v| v.is_finite() && *v > 0.0);
    match (usable(bpm1), usable(bpm2)) {
        (Some(a), Some(b)) => Score::Measured {
            probability: tempo_probability(a, b),
            delta: effective_tempo_delta(a, b),
        },
        _ => Score::Neutral(NEUTRAL_TEMPO),
    }
}

/// Whether two tempi sit in a 2:1 or 1:2 ratio, within
/// [`DOUBLE_TIME_TOLERANCE_BPM`].
pub fn is_double_time(bpm1: f64, bpm2: f64) -> bool {
    if bpm1 <= 0.0 || bpm2 <= 0.0 {
        return false;
    }
    (bpm1 - 2.0 * bpm2).abs() < DOUBLE_TIME_TOLERANCE_BPM
        || (2.0 * bpm1 - bpm2).abs() < DOUBLE_TIME_TOLERANCE_BPM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_tempo_is_one() {
        assert_eq!(tempo_probability(120.0, 120.0), 1.0);
    }

    #[test]
    fn test_one_jnd_scores_high() {
        // 4% of 100 BPM = 4 BPM = one JND = σ/3
        let p = tempo_probability(100.0, 104.0);
        assert!((p - (-1.0f64 / 18.0).exp()).abs() < 1e-12);
        assert!(p > 0.94);
    }

    #[test]
    fn test_double_and_half_time_equivalent() {
        assert_eq!(effective_tempo_delta(90.0, 180.0), 0.0);
        assert_eq!(effective_tempo_delta(180.0, 90.0), 0.0);
        assert!(tempo_probability(90.0, 180.0) >= 0.7);
        assert!(tempo_probability(180.0, 90.0) >= 0.7);
        assert!(tempo_probability(90.0, 178.0) > 0.95);
    }

    #[test]
    fn test_monotonic_in_effective_delta() {
        let mut last = f64::INFINITY;
        let mut last_delta = -1.0;
        for step in 0..60 {
            let bpm2 = 120.0 + step as f64;
            let delta = effective_tempo_delta(120.0, bpm2);
            let p = tempo_probability(120.0, bpm2);
            if delta > last_delta {
                assert!(p <= last, "p rose from {last} to {p} at delta {delta}");
            }
            last = p;
            last_delta = delta;
        }
    }

    #[test]
    fn test_large_jump_scores_low() {
        // 100 → 150: direct 50, half-time 25 → 25 BPM effective, σ = 12
        assert_eq!(effective_tempo_delta(100.0, 150.0), 25.0);
        assert!(tempo_probability(100.0, 150.0) < 0.2);
    }

    #[test]
    fn test_missing_tempo_is_neutral() {
        assert_eq!(tempo_compatibility(Some(120.0), None), Score::Neutral(NEUTRAL_TEMPO));
        assert_eq!(tempo_compatibility(Some(0.0), Some(120.0)), Score::Neutral(NEUTRAL_TEMPO));
        let measured = tempo_compatibility(Some(120.0), Some(126.0));
        assert_eq!(measured.delta(), Some(6.0));
    }

    #[test]
    fn test_is_double_time() {
        assert!(is_double_time(90.0, 180.0));
        assert!(is_double_time(180.0, 92.0));
        assert!(!is_double_time(120.0, 125.0));
        assert!(!is_double_time(0.0, 120.0));
    }
}

//! Whole-playlist validation: score every adjacent pair and reduce.

use serde::Serialize;

use crate::engine::{
    COMPATIBILITY_THRESHOLD, CompatibilityEngine, CompatibilityError, Result, TransitionResult,
};
use crate::features::FeatureRecord;

/// Any single transition below this makes the playlist invalid, however good
/// the average is.
pub const DEFAULT_TRANSITION_FLOOR: f64 = 0.15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistValidation {
    /// Arithmetic mean of the transition probabilities.
    pub overall_probability: f64,
    pub overall_penalty: f64,
    pub is_valid: bool,
    /// One result per adjacent pair, in playlist order.
    pub transitions: Vec<TransitionResult>,
    /// `(index, probability)` of the lowest-scoring transition; index `i` is
    /// the move from track `i` to track `i + 1`.
    pub weakest_transition: (usize, f64),
    pub total_violations: usize,
}

pub struct PlaylistValidator<'a> {
    engine: &'a CompatibilityEngine,
    transition_floor: f64,
}

impl<'a> PlaylistValidator<'a> {
    pub fn new(engine: &'a CompatibilityEngine) -> Self {
        Self {
            engine,
            transition_floor: DEFAULT_TRANSITION_FLOOR,
        }
    }

    /// Per-transition floor, clamped to [0, 1]; 0 (or a non-finite value)
    /// disables it.
    pub fn with_transition_floor(mut self, floor: f64) -> Self {
        self.transition_floor = if floor.is_finite() { floor.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    /// Score the N−1 transitions of an N-track playlist.
    ///
    /// Valid when the mean transition probability is above
    /// [`COMPATIBILITY_THRESHOLD`] and no single transition falls below the
    /// floor.
    pub fn validate(&self, tracks: &[FeatureRecord]) -> Result<PlaylistValidation> {
        if tracks.len() < 2 {
            return Err(CompatibilityError::InvalidPlaylist { len: tracks.len() });
        }

        let transitions = tracks
            .windows(2)
            .map(|pair| self.engine.get_compatibility(&pair[0], &pair[1]))
            .collect::<Result<Vec<_>>>()?;

        let overall_probability =
            transitions.iter().map(|t| t.probability).sum::<f64>() / transitions.len() as f64;

        // Strict `<` keeps the first of equal minima
        let mut weakest = (0, transitions[0].probability);
        for (i, t) in transitions.iter().enumerate().skip(1) {
            if t.probability < weakest.1 {
                weakest = (i, t.probability);
            }
        }

        let total_violations = transitions.iter().map(|t| t.violations.len()).sum();
        let is_valid = overall_probability > COMPATIBILITY_THRESHOLD
            && weakest.1 >= self.transition_floor;

        log::info!(
            "Playlist of {} tracks: mean P={:.3}, weakest #{} (P={:.3}), {} violations, {}",
            tracks.len(),
            overall_probability,
            weakest.0,
            weakest.1,
            total_violations,
            if is_valid { "valid" } else { "invalid" }
        );

        Ok(PlaylistValidation {
            overall_probability,
            overall_penalty: 1.0 - overall_probability,
            is_valid,
            transitions,
            weakest_transition: weakest,
            total_violations,
        })
    }
}

/// Validate with the default transition floor.
pub fn validate_playlist(
    engine: &CompatibilityEngine,
    tracks: &[FeatureRecord],
) -> Result<PlaylistValidation> {
    PlaylistValidator::new(engine).validate(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{make_opposite_track, make_track};

    #[test]
    fn test_too_short_playlist_fails() {
        let engine = CompatibilityEngine::default();
        assert_eq!(
            validate_playlist(&engine, &[]).unwrap_err(),
            CompatibilityError::InvalidPlaylist { len: 0 }
        );
        let one = [make_track("a", 120.0, 0)];
        assert_eq!(
            engine.validate_playlist(&one).unwrap_err(),
            CompatibilityError::InvalidPlaylist { len: 1 }
        );
    }

    #[test]
    fn test_overall_is_mean_of_transitions() {
        let engine = CompatibilityEngine::default();
        let tracks = vec![
            make_track("a", 120.0, 0),
            make_track("b", 124.0, 7),
            make_track("c", 118.0, 2),
            make_track("d", 60.0, 9),
        ];
        let v = validate_playlist(&engine, &tracks).unwrap();
        assert_eq!(v.transitions.len(), 3);

        let mean = v.transitions.iter().map(|t| t.probability).sum::<f64>() / 3.0;
        assert!((v.overall_probability - mean).abs() < 1e-12);
        assert!((v.overall_penalty - (1.0 - mean)).abs() < 1e-12);

        let direct = engine.get_compatibility(&tracks[1], &tracks[2]).unwrap();
        assert_eq!(v.transitions[1], direct);
    }

    #[test]
    fn test_bad_middle_transition_is_weakest() {
        let engine = CompatibilityEngine::default();
        let tracks = vec![
            make_track("a", 100.0, 0),
            make_track("b", 100.0, 0),
            make_opposite_track("c"),
        ];
        let v = validate_playlist(&engine, &tracks).unwrap();
        assert_eq!(v.weakest_transition.0, 1);
        assert_eq!(v.weakest_transition.1, v.transitions[1].probability);
        assert!(!v.transitions[1].violations.is_empty());
        assert_eq!(
            v.total_violations,
            v.transitions[0].violations.len() + v.transitions[1].violations.len()
        );
        assert!(!v.is_valid);
    }

    #[test]
    fn test_weakest_tie_takes_first() {
        let engine = CompatibilityEngine::default();
        let t = make_track("a", 120.0, 0);
        let v = validate_playlist(&engine, &[t.clone(), t.clone(), t]).unwrap();
        assert_eq!(v.weakest_transition.0, 0);
    }

    #[test]
    fn test_floor_catches_masked_transition() {
        let engine = CompatibilityEngine::default();
        let good = make_track("good", 100.0, 0);
        let bad = make_opposite_track("bad");
        let mut tracks = vec![good.clone(); 8];
        tracks.push(bad);

        let lenient = PlaylistValidator::new(&engine)
            .with_transition_floor(0.0)
            .validate(&tracks)
            .unwrap();
        assert!(lenient.overall_probability > COMPATIBILITY_THRESHOLD);
        assert!(lenient.is_valid);
        assert!(lenient.weakest_transition.1 < DEFAULT_TRANSITION_FLOOR);

        let strict = PlaylistValidator::new(&engine).validate(&tracks).unwrap();
        assert_eq!(strict.overall_probability, lenient.overall_probability);
        assert!(!strict.is_valid);
    }

    #[test]
    fn test_non_finite_floor_disables_it() {
        let engine = CompatibilityEngine::default();
        let t = make_track("a", 120.0, 0);
        let tracks = [t.clone(), t];
        for floor in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let v = PlaylistValidator::new(&engine)
                .with_transition_floor(floor)
                .validate(&tracks)
                .unwrap();
            assert!(v.is_valid, "floor {floor} rejected an identical pair");
        }

        // Out-of-range floors are clamped: 2.0 acts as 1.0
        let v = PlaylistValidator::new(&engine)
            .with_transition_floor(2.0)
            .validate(&tracks)
            .unwrap();
        assert!(!v.is_valid);
    }
}

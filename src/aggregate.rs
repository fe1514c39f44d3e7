//! Closed-form aggregation of classifier evidence for mood and genre.
//!
//! Both tracks' classifier outputs are treated as independent evidence, so
//! the compatibility of two tracks is an exact probability under that model:
//! noisy-OR over the mood axes, and the chance of a matching draw for genre.

use crate::compatibility::Score;
use crate::features::{GenreDistribution, MoodProbabilities};

pub const NEUTRAL_MOOD: f64 = 0.5;
pub const NEUTRAL_GENRE: f64 = 0.5;

/// Probability that at least one mood axis is active on both tracks:
/// `1 − Π (1 − P(axis, a) · P(axis, b))`. `delta` is `1 − P`.
pub fn mood_compatibility(a: Option<&MoodProbabilities>, b: Option<&MoodProbabilities>) -> Score {
    let (Some(a), Some(b)) = (a, b) else {
        return Score::Neutral(NEUTRAL_MOOD);
    };

    let none_shared: f64 = a
        .iter()
        .zip(b.iter())
        .map(|((_, pa), (_, pb))| 1.0 - pa * pb)
        .product();
    let probability = (1.0 - none_shared).clamp(0.0, 1.0);

    Score::Measured { probability, delta: 1.0 - probability }
}

/// Probability that both tracks draw the same genre: `Σ_g P(g, a) · P(g, b)`.
/// `delta` is `1 − P`.
pub fn genre_compatibility(a: Option<&GenreDistribution>, b: Option<&GenreDistribution>) -> Score {
    let (Some(a), Some(b)) = (a, b) else {
        return Score::Neutral(NEUTRAL_GENRE);
    };

    let probability = a
        .iter()
        .zip(b.iter())
        .map(|((_, pa), (_, pb))| pa * pb)
        .sum::<f64>()
        .clamp(0.0, 1.0);

    Score::Measured { probability, delta: 1.0 - probability }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Genre, MoodAxis};

    #[test]
    fn test_single_shared_axis_is_product() {
        let a = MoodProbabilities::from_pairs(&[(MoodAxis::Relaxed, 0.8)]);
        let b = MoodProbabilities::from_pairs(&[(MoodAxis::Relaxed, 0.6)]);
        let p = mood_compatibility(Some(&a), Some(&b)).probability();
        assert!((p - 0.48).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_moods_score_zero() {
        let a = MoodProbabilities::from_pairs(&[(MoodAxis::Happy, 0.9)]);
        let b = MoodProbabilities::from_pairs(&[(MoodAxis::Sad, 0.9)]);
        assert_eq!(mood_compatibility(Some(&a), Some(&b)).probability(), 0.0);
    }

    #[test]
    fn test_noisy_or_combines_axes() {
        let a = MoodProbabilities::from_pairs(&[(MoodAxis::Happy, 0.5), (MoodAxis::Party, 0.5)]);
        // 1 − (1 − 0.25)(1 − 0.25)
        let p = mood_compatibility(Some(&a), Some(&a)).probability();
        assert!((p - 0.4375).abs() < 1e-12);
    }

    #[test]
    fn test_missing_mood_is_exactly_neutral() {
        let a = MoodProbabilities::from_pairs(&[(MoodAxis::Happy, 1.0), (MoodAxis::Party, 1.0)]);
        assert_eq!(mood_compatibility(Some(&a), None), Score::Neutral(0.5));
        assert_eq!(mood_compatibility(None, Some(&a)), Score::Neutral(0.5));
        assert_eq!(mood_compatibility(None, None).probability(), 0.5);
    }

    #[test]
    fn test_genre_one_hot() {
        let pop = GenreDistribution::one_hot(Genre::Pop);
        let jazz = GenreDistribution::one_hot(Genre::Jazz);
        assert_eq!(genre_compatibility(Some(&pop), Some(&pop)).probability(), 1.0);
        assert_eq!(genre_compatibility(Some(&pop), Some(&jazz)).probability(), 0.0);
    }

    #[test]
    fn test_genre_dot_product() {
        let a = GenreDistribution::from_pairs(&[(Genre::Rock, 0.6), (Genre::Pop, 0.4)]);
        let b = GenreDistribution::from_pairs(&[(Genre::Rock, 0.5), (Genre::Dance, 0.5)]);
        let p = genre_compatibility(Some(&a), Some(&b)).probability();
        assert!((p - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_missing_genre_is_neutral() {
        let a = GenreDistribution::one_hot(Genre::Classical);
        assert_eq!(genre_compatibility(Some(&a), None), Score::Neutral(NEUTRAL_GENRE));
    }
}

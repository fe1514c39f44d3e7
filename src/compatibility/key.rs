//! Harmonic (key) compatibility via Krumhansl-Kessler profile correlation.
//!
//! Krumhansl, C. L. (1990). *Cognitive Foundations of Musical Pitch*.
//! Inter-key similarity is the Pearson correlation between the probe-tone
//! profiles of the two keys, mapped from [-1, 1] to [0, 1] and then pulled
//! toward 0.5 as the key detector's confidence drops.

use super::Score;
use crate::features::{KeyEstimate, Scale};

/// Probe-tone ratings for a major key with tonic C (index 0 = C).
pub const KRUMHANSL_MAJOR: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Probe-tone ratings for a minor key with tonic C.
pub const KRUMHANSL_MINOR: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

pub const NEUTRAL_KEY: f64 = 0.5;

/// Profile template rotated so that index 0 is C.
pub fn key_profile(tonic: u8, scale: Scale) -> [f64; 12] {
    let base = match scale {
        Scale::Major => &KRUMHANSL_MAJOR,
        Scale::Minor => &KRUMHANSL_MINOR,
    };
    let tonic = (tonic % 12) as usize;
    std::array::from_fn(|pc| base[(pc + 12 - tonic) % 12])
}

/// Pearson correlation; 0 when either side has no variance.
fn pearson(a: &[f64; 12], b: &[f64; 12]) -> f64 {
    let mean_a = a.iter().sum::<f64>() / 12.0;
    let mean_b = b.iter().sum::<f64>() / 12.0;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom < 1e-12 { 0.0 } else { (cov / denom).clamp(-1.0, 1.0) }
}

/// Correlation between the profiles of two keys, in [-1, 1].
pub fn key_correlation(a: &KeyEstimate, b: &KeyEstimate) -> f64 {
    pearson(&key_profile(a.tonic, a.scale), &key_profile(b.tonic, b.scale))
}

/// Key compatibility with confidence attenuation.
///
/// `P = 0.5 + c × ((r + 1)/2 − 0.5)` where `c = √(s₁·s₂)` is the geometric
/// mean of the two key strengths. At full confidence this is the raw
/// correlation mapping; at zero confidence it is exactly 0.5. `delta` is the
/// correlation distance `1 − r`.
pub fn key_compatibility(a: Option<&KeyEstimate>, b: Option<&KeyEstimate>) -> Score {
    let (Some(a), Some(b)) = (a, b) else {
        return Score::Neutral(NEUTRAL_KEY);
    };

    let r = key_correlation(a, b);
    let raw = (r + 1.0) / 2.0;
    let confidence = (a.strength.clamp(0.0, 1.0) * b.strength.clamp(0.0, 1.0)).sqrt();

    Score::Measured {
        probability: (0.5 + confidence * (raw - 0.5)).clamp(0.0, 1.0),
        delta: 1.0 - r,
    }
}

/// Steps between two tonics on the circle of fifths (0 = same, 6 = tritone).
pub fn circle_of_fifths_distance(a: u8, b: u8) -> u8 {
    // Multiplying by 7 semitones maps chromatic order onto the circle
    let pos_a = (a as u16 * 7) % 12;
    let pos_b = (b as u16 * 7) % 12;
    let d = (pos_a + 12 - pos_b) % 12;
    d.min(12 - d) as u8
}

//! Timbre compatibility between single-Gaussian mel-cepstral models.
//!
//! Each track is modeled as N(μ, Σ) over cepstral coefficients c1..c12
//! (Aucouturier & Pachet, 2002). c0 is dropped because it tracks overall
//! energy and would double-count loudness (Berenzweig et al., 2004).
//!
//! ```text
//! D_B = ⅛ (μ₁−μ₂)ᵀ Σ⁻¹ (μ₁−μ₂) + ½ ln( |Σ| / √(|Σ₁||Σ₂|) ),   Σ = (Σ₁+Σ₂)/2
//! P   = exp(−D_B)
//! ```

use nalgebra::{DMatrix, DVector, Dyn, linalg::Cholesky};

use super::Score;
use crate::features::CepstralModel;

/// Score when either model is missing, lacks covariance, or is singular.
pub const NEUTRAL_TIMBRE: f64 = 0.6;

/// Coefficients considered, c0 included (it's dropped afterwards).
const MAX_COEFFS: usize = 13;

/// A Cholesky pivot this small relative to the largest variance counts as
/// singular.
const SINGULAR_PIVOT_RATIO: f64 = 1e-12;

/// Covariance submatrix for c1..c(n-1), or `None` if the shape is wrong or
/// any entry is non-finite.
fn covariance_block(model: &CepstralModel, n: usize) -> Option<DMatrix<f64>> {
    let cov = model.covariance.as_ref()?;
    if cov.len() < n || cov.iter().take(n).any(|row| row.len() < n) {
        return None;
    }
    let block = DMatrix::from_fn(n - 1, n - 1, |i, j| cov[i + 1][j + 1]);
    if block.iter().all(|v| v.is_finite()) { Some(block) } else { None }
}

/// Cholesky factor plus log-determinant, or `None` for a matrix that isn't
/// (numerically) positive definite.
fn factor(m: DMatrix<f64>) -> Option<(Cholesky<f64, Dyn>, f64)> {
    let scale = m.diagonal().iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale <= 0.0 {
        return None;
    }
    let chol = Cholesky::new(m)?;
    let l = chol.l();
    let pivots = l.diagonal();
    if pivots.iter().any(|d| d * d <= SINGULAR_PIVOT_RATIO * scale) {
        return None;
    }
    let log_det = 2.0 * pivots.iter().map(|d| d.ln()).sum::<f64>();
    Some((chol, log_det))
}

/// Bhattacharyya distance between two cepstral models, or `None` when it is
/// undefined (no covariance, fewer than two coefficients, singular matrices).
pub fn bhattacharyya_distance(a: &CepstralModel, b: &CepstralModel) -> Option<f64> {
    let n = MAX_COEFFS.min(a.mean.len()).min(b.mean.len());
    if n <= 1 {
        return None;
    }

    let s1 = covariance_block(a, n)?;
    let s2 = covariance_block(b, n)?;
    let s_avg = (&s1 + &s2) * 0.5;

    let diff = DVector::from_fn(n - 1, |i, _| a.mean[i + 1] - b.mean[i + 1]);
    if diff.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let (chol_avg, log_det_avg) = factor(s_avg)?;
    let (_, log_det_1) = factor(s1)?;
    let (_, log_det_2) = factor(s2)?;

    let mahalanobis = diff.dot(&chol_avg.solve(&diff));
    let mean_term = mahalanobis / 8.0;
    let shape_term = 0.5 * (log_det_avg - 0.5 * (log_det_1 + log_det_2));

    Some((mean_term + shape_term).max(0.0))
}

/// Timbre compatibility `exp(−D_B)`; neutral when the distance is undefined.
/// `delta` is the Bhattacharyya distance.
pub fn timbre_compatibility(a: Option<&CepstralModel>, b: Option<&CepstralModel>) -> Score {
    let distance = match (a, b) {
        (Some(a), Some(b)) => bhattacharyya_distance(a, b),
        _ => None,
    };
    match distance {
        Some(d) => Score::Measured { probability: (-d).exp(), delta: d },
        None => Score::Neutral(NEUTRAL_TIMBRE),
    }
}

//! Categorical sampler over a fixed label ordering.

use rand::Rng;
use tracing::trace;

use crate::error::{Result, TrendchainError};

/// Draw one label from a discrete distribution.
///
/// A uniform `u` in `[0, 1)` is walked down the probability vector in label
/// order; the first label that brings `u` to `<= 0` wins. Labels with zero
/// mass are skipped even when `u` is already `0.0`, so a category with no
/// observed transitions is never drawn by the walk.
///
/// When the walk runs off the end, because the probabilities sum to slightly
/// less than one after rounding, the draw falls back to a uniform choice over
/// `labels`. The fallback is practically unreachable for normalized input but
/// keeps the sampler total. An all-zero vector always takes the fallback.
pub fn sample_category<T, R>(labels: &[T], probabilities: &[f64], rng: &mut R) -> Result<T>
where
    T: Copy,
    R: Rng + ?Sized,
{
    if labels.is_empty() {
        return Err(TrendchainError::InvalidConfiguration(
            "cannot sample from an empty label set".into(),
        ));
    }
    if labels.len() != probabilities.len() {
        return Err(TrendchainError::InvalidConfiguration(format!(
            "{} labels but {} probabilities",
            labels.len(),
            probabilities.len()
        )));
    }
    if let Some(p) = probabilities.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(TrendchainError::InvalidConfiguration(format!(
            "probabilities must be finite and non-negative, got {p}"
        )));
    }

    let mut u: f64 = rng.gen();
    for (&label, &p) in labels.iter().zip(probabilities) {
        u -= p;
        if u <= 0.0 && p > 0.0 {
            return Ok(label);
        }
    }

    trace!(
        sum = probabilities.iter().sum::<f64>(),
        "probability walk exhausted, falling back to uniform draw"
    );
    Ok(labels[rng.gen_range(0..labels.len())])
}

//! Reference statistics: the (mean, standard deviation) pair every
//! categorization and resolution call is measured against.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrendchainError};

/// Mean and population standard deviation of a movement sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl ReferenceStats {
    pub fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    /// Compute statistics over `movements`.
    ///
    /// Uses the population variance (divides by `n`). Fails on an empty sample
    /// or on any non-finite value.
    pub fn from_movements(movements: &[f64]) -> Result<Self> {
        if movements.is_empty() {
            return Err(TrendchainError::HistoryTooShort {
                required: 1,
                actual: 0,
            });
        }
        if let Some(pos) = movements.iter().position(|m| !m.is_finite()) {
            return Err(TrendchainError::InvalidInput(format!(
                "movement at index {pos} is not finite"
            )));
        }

        let n = movements.len() as f64;
        let mean = movements.iter().sum::<f64>() / n;
        let variance = movements.iter().map(|&m| (m - mean).powi(2)).sum::<f64>() / n;

        Ok(Self {
            mean,
            std_dev: variance.sqrt(),
        })
    }

    /// Check that the pair can parameterize categorization and sampling.
    pub fn validate(&self) -> Result<()> {
        if !self.mean.is_finite() {
            return Err(TrendchainError::InvalidConfiguration(format!(
                "reference mean must be finite, got {}",
                self.mean
            )));
        }
        if !self.std_dev.is_finite() || self.std_dev < 0.0 {
            return Err(TrendchainError::InvalidConfiguration(format!(
                "reference std_dev must be finite and >= 0, got {}",
                self.std_dev
            )));
        }
        Ok(())
    }
}

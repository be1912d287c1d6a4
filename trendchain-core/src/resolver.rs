//! Value resolver: turns a sampled category back into a concrete movement.
//!
//! Gaussian draws `N(mean, std_dev)` are scanned in order and the first one
//! that categorizes to the target is returned. If a whole batch goes by
//! without a match, the resolver returns [`SENTINEL`] rather than failing. For
//! well-formed statistics this needs a target with almost no density under the
//! reference Gaussian, so callers treat repeated sentinels as a data-quality
//! signal instead of an error.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::category::{categorize, Category, CategoryMode};
use crate::error::{Result, TrendchainError};
use crate::stats::ReferenceStats;

/// Draws per resolution attempt.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Movement returned when no draw matches the target category.
pub const SENTINEL: f64 = 0.0;

/// Rejection sampler bridging a category draw and a continuous movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueResolver {
    batch_size: usize,
}

impl ValueResolver {
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(TrendchainError::InvalidConfiguration(
                "resolver batch size must be > 0".into(),
            ));
        }
        Ok(Self { batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// First Gaussian draw in the batch that lands in `target`, if any.
    ///
    /// Returns `None` when the batch is exhausted or when `stats` cannot
    /// parameterize a Gaussian (negative or non-finite spread).
    pub fn try_resolve<R: Rng + ?Sized>(
        &self,
        target: Category,
        stats: &ReferenceStats,
        mode: CategoryMode,
        rng: &mut R,
    ) -> Option<f64> {
        let normal = Normal::new(stats.mean, stats.std_dev).ok()?;
        (0..self.batch_size)
            .map(|_| normal.sample(&mut *rng))
            .find(|&draw| categorize(draw, stats, mode) == target)
    }

    /// Like [`ValueResolver::try_resolve`], substituting [`SENTINEL`] for a
    /// failed search.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        target: Category,
        stats: &ReferenceStats,
        mode: CategoryMode,
        rng: &mut R,
    ) -> f64 {
        match self.try_resolve(target, stats, mode, rng) {
            Some(value) => value,
            None => {
                debug!(
                    category = %target,
                    mean = stats.mean,
                    std_dev = stats.std_dev,
                    batch = self.batch_size,
                    "no draw matched target category, using sentinel"
                );
                SENTINEL
            }
        }
    }
}

impl Default for ValueResolver {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

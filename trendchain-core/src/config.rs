//! Serializable simulation configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrendchainError};
use crate::resolver::DEFAULT_BATCH_SIZE;
use crate::stats::ReferenceStats;
use crate::transition::ConditioningOrder;

/// Content-addressable identifier for a simulation configuration.
pub type RunId = String;

/// Parameters of one momentum simulation run.
///
/// Deserializes from a TOML `[simulation]` table; missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Movements generated per trial.
    pub n_steps: usize,

    /// Independent trajectories to generate.
    pub n_trials: usize,

    /// Conditioning order of the transition table (1 or 2).
    pub order: ConditioningOrder,

    /// Master seed of the per-trial RNG hierarchy.
    pub seed: u64,

    /// Gaussian draws per value resolution.
    pub resolver_batch: usize,

    /// Run trials on the rayon pool.
    pub parallel: bool,

    /// Statistics for conditioning and resolution. When absent, the
    /// statistics of the historical sample are used.
    pub reference: Option<ReferenceStats>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_steps: 20,
            n_trials: 100,
            order: ConditioningOrder::One,
            seed: 42,
            resolver_batch: DEFAULT_BATCH_SIZE,
            parallel: true,
            reference: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_steps == 0 {
            return Err(TrendchainError::InvalidConfiguration(
                "n_steps must be > 0".into(),
            ));
        }
        if self.n_trials == 0 {
            return Err(TrendchainError::InvalidConfiguration(
                "n_trials must be > 0".into(),
            ));
        }
        if self.resolver_batch == 0 {
            return Err(TrendchainError::InvalidConfiguration(
                "resolver_batch must be > 0".into(),
            ));
        }
        if let Some(reference) = &self.reference {
            reference.validate()?;
        }
        Ok(())
    }

    /// Deterministic hash of every field that affects simulated output.
    ///
    /// `parallel` is excluded: sequential and parallel runs of the same
    /// configuration produce identical trajectories.
    pub fn run_id(&self) -> RunId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.n_steps as u64).to_le_bytes());
        hasher.update(&(self.n_trials as u64).to_le_bytes());
        hasher.update(&(self.order.depth() as u64).to_le_bytes());
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(&(self.resolver_batch as u64).to_le_bytes());
        match &self.reference {
            Some(r) => {
                hasher.update(&[1]);
                hasher.update(&r.mean.to_bits().to_le_bytes());
                hasher.update(&r.std_dev.to_bits().to_le_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

//! Deterministic RNG hierarchy.
//!
//! A master seed generates deterministic sub-seeds for each `(stream, index)`
//! pair. Sub-seeds are derived via BLAKE3 hashing, independently of thread
//! scheduling order, so simulated trials are identical regardless of how rayon
//! distributes them.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Stream label for per-trial generators.
pub const TRIAL_STREAM: &str = "trial";

/// Deterministic RNG hierarchy.
///
/// The master seed is expanded into per-(stream, index) sub-seeds using
/// BLAKE3. Because derivation is hash-based (not order-dependent), the same
/// master seed produces identical sub-seeds whatever order trials run in.
#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Derive a deterministic sub-seed for a specific (stream, index).
    pub fn sub_seed(&self, stream: &str, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(stream.as_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Create a seeded StdRng from a sub-seed.
    pub fn rng_for(&self, stream: &str, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(stream, index))
    }

    /// Generator owned by simulated trial `trial`.
    pub fn trial_rng(&self, trial: usize) -> StdRng {
        self.rng_for(TRIAL_STREAM, trial as u64)
    }
}

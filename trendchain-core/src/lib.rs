//! Trendchain Core: empirical Markov model of discretized price movements.
//!
//! This crate contains the simulation engine:
//! - Movement categories (4 or 8 buckets measured in standard deviations)
//! - Trend keys over consecutive categories
//! - Transition tables conditioned on the previous one or two categories
//! - Categorical sampling and rejection-sampled value resolution
//! - Momentum simulation of independent, reproducibly seeded trials
//! - Price/movement conversion and chart summaries

pub mod category;
pub mod config;
pub mod error;
pub mod prices;
pub mod resolver;
pub mod rng;
pub mod sampler;
pub mod simulator;
pub mod stats;
pub mod summary;
pub mod transition;
pub mod trend;

pub use category::{categorize, categorize_movements, count_category, Category, CategoryMode};
pub use config::{RunId, SimulationConfig};
pub use error::{Result, TrendchainError};
pub use prices::{compound_movements, price_movements};
pub use resolver::{ValueResolver, DEFAULT_BATCH_SIZE, SENTINEL};
pub use rng::RngHierarchy;
pub use sampler::sample_category;
pub use simulator::{
    simulate_momentum, MomentumModel, MomentumSimulator, SimulationResult, Trajectory, TrialSteps,
};
pub use stats::ReferenceStats;
pub use summary::{CategoryCounts, ConditionalProfile};
pub use transition::{ConditioningOrder, TransitionRow, TransitionTable};
pub use trend::{count_trends, trend_keys, TrendKey};

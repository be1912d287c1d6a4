//! Momentum simulator: conditional Markov resampling of movement paths.
//!
//! Fits a transition table to the history, then generates independent trials
//! step by step:
//!
//! 1. Categorize the last `order` movements (real ones for the first steps,
//!    simulated ones after that).
//! 2. Look up the transition row for that prefix and sample a target category.
//! 3. Resolve the category to a concrete movement by rejection sampling.
//!
//! Each trial is integrated into a price path with an absorbing floor at zero.
//! All setup failures abort the run before any trial starts; a resolver miss
//! is recorded as a sentinel movement and the trial carries on.

use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::category::{categorize, categorize_movements, Category, CategoryMode};
use crate::config::{RunId, SimulationConfig};
use crate::error::{Result, TrendchainError};
use crate::prices::compound_movements;
use crate::resolver::{ValueResolver, SENTINEL};
use crate::rng::RngHierarchy;
use crate::sampler::sample_category;
use crate::stats::ReferenceStats;
use crate::transition::{ConditioningOrder, TransitionTable};

// ─── Model ───────────────────────────────────────────────────────────

/// Everything a trial needs, fitted once and shared read-only across trials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumModel {
    /// Statistics for conditioning and value resolution.
    pub reference: ReferenceStats,
    pub table: TransitionTable,
}

impl MomentumModel {
    /// Fit a model of the given order to a movement history.
    ///
    /// The table is built from the history categorized against its own
    /// statistics. `reference` replaces those statistics for conditioning and
    /// resolution when given.
    pub fn fit(
        history: &[f64],
        order: ConditioningOrder,
        reference: Option<ReferenceStats>,
    ) -> Result<Self> {
        if history.len() < order.window() {
            return Err(TrendchainError::HistoryTooShort {
                required: order.window(),
                actual: history.len(),
            });
        }

        let (categories, batch_stats) = categorize_movements(history, CategoryMode::Four)?;
        let table = TransitionTable::from_categories(&categories, order)?;

        let reference = match reference {
            Some(r) => {
                r.validate()?;
                r
            }
            None => batch_stats,
        };

        debug!(
            history = history.len(),
            order = order.depth(),
            mean = reference.mean,
            std_dev = reference.std_dev,
            "fitted momentum model"
        );

        Ok(Self { reference, table })
    }

    pub fn order(&self) -> ConditioningOrder {
        self.table.order()
    }

    /// Sample the next movement given the most recent `order` movements.
    ///
    /// Returns `Ok(None)` when the resolver exhausted its batch without a
    /// match.
    pub fn next_step<R: Rng + ?Sized>(
        &self,
        recent: &[f64],
        resolver: &ValueResolver,
        rng: &mut R,
    ) -> Result<Option<f64>> {
        let depth = self.order().depth();
        if recent.len() != depth {
            return Err(TrendchainError::InvalidConfiguration(format!(
                "order {depth} needs {depth} recent movements, got {}",
                recent.len()
            )));
        }

        let mut prefix = [Category::SmallGain; 2];
        for (slot, &movement) in prefix.iter_mut().zip(recent) {
            *slot = categorize(movement, &self.reference, CategoryMode::Four);
        }

        let probabilities = self.table.probabilities(&prefix[..depth])?;
        let target = sample_category(TransitionTable::labels(), probabilities, rng)?;
        Ok(resolver.try_resolve(target, &self.reference, CategoryMode::Four, rng))
    }

    /// Generate one trial of `n_steps` movements seeded by the tail of
    /// `history`.
    pub fn run_trial<R: Rng + ?Sized>(
        &self,
        history: &[f64],
        n_steps: usize,
        resolver: &ValueResolver,
        rng: &mut R,
    ) -> Result<TrialSteps> {
        let depth = self.order().depth();
        if history.len() < depth {
            return Err(TrendchainError::HistoryTooShort {
                required: depth,
                actual: history.len(),
            });
        }

        let mut path = Vec::with_capacity(depth + n_steps);
        path.extend_from_slice(&history[history.len() - depth..]);
        let mut sentinel_steps = 0;

        for _ in 0..n_steps {
            let recent = &path[path.len() - depth..];
            let movement = match self.next_step(recent, resolver, rng)? {
                Some(value) => value,
                None => {
                    sentinel_steps += 1;
                    SENTINEL
                }
            };
            path.push(movement);
        }

        Ok(TrialSteps {
            movements: path.split_off(depth),
            sentinel_steps,
        })
    }
}

/// Raw output of one trial before price integration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSteps {
    pub movements: Vec<f64>,
    /// Steps where the resolver fell back to the sentinel movement.
    pub sentinel_steps: usize,
}

// ─── Result types ────────────────────────────────────────────────────

/// One simulated path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub trial: usize,
    /// `n_steps` simulated movements.
    pub movements: Vec<f64>,
    /// `n_steps + 1` prices, starting with the starting value.
    pub prices: Vec<f64>,
    pub sentinel_steps: usize,
}

impl Trajectory {
    pub fn final_price(&self) -> f64 {
        self.prices.last().copied().unwrap_or(0.0)
    }

    /// True once the path has hit the zero floor.
    pub fn is_absorbed(&self) -> bool {
        self.prices.iter().any(|&p| p <= 0.0)
    }
}

/// Complete result of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub run_id: RunId,
    pub starting_value: f64,
    pub model: MomentumModel,
    pub trajectories: Vec<Trajectory>,
}

impl SimulationResult {
    pub fn sentinel_steps(&self) -> usize {
        self.trajectories.iter().map(|t| t.sentinel_steps).sum()
    }

    pub fn final_prices(&self) -> Vec<f64> {
        self.trajectories.iter().map(Trajectory::final_price).collect()
    }
}

// ─── Simulator ───────────────────────────────────────────────────────

/// Runs conditioned momentum simulations for a fixed configuration.
#[derive(Debug, Clone)]
pub struct MomentumSimulator {
    config: SimulationConfig,
    resolver: ValueResolver,
    rngs: RngHierarchy,
}

impl MomentumSimulator {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let resolver = ValueResolver::new(config.resolver_batch)?;
        let rngs = RngHierarchy::new(config.seed);
        Ok(Self {
            config,
            resolver,
            rngs,
        })
    }

    /// Fit the model for `history` without running any trials.
    pub fn fit(&self, history: &[f64]) -> Result<MomentumModel> {
        MomentumModel::fit(history, self.config.order, self.config.reference)
    }

    /// Generate `n_trials` trajectories of `n_steps` movements each.
    ///
    /// Trial `i` draws from its own generator derived from `(seed, i)`, so the
    /// output is the same whether trials run in parallel or sequentially.
    pub fn simulate(&self, history: &[f64], starting_value: f64) -> Result<SimulationResult> {
        if !starting_value.is_finite() || starting_value <= 0.0 {
            return Err(TrendchainError::InvalidConfiguration(format!(
                "starting value must be finite and positive, got {starting_value}"
            )));
        }

        let model = self.fit(history)?;
        let run_trial = |trial: usize| -> Result<Trajectory> {
            let mut rng = self.rngs.trial_rng(trial);
            let steps = model.run_trial(history, self.config.n_steps, &self.resolver, &mut rng)?;
            let prices = compound_movements(&steps.movements, starting_value);
            Ok(Trajectory {
                trial,
                movements: steps.movements,
                prices,
                sentinel_steps: steps.sentinel_steps,
            })
        };

        let trajectories = if self.config.parallel {
            (0..self.config.n_trials)
                .into_par_iter()
                .map(run_trial)
                .collect::<Result<Vec<_>>>()?
        } else {
            (0..self.config.n_trials)
                .map(run_trial)
                .collect::<Result<Vec<_>>>()?
        };

        let result = SimulationResult {
            run_id: self.config.run_id(),
            starting_value,
            model,
            trajectories,
        };

        info!(
            run_id = %result.run_id,
            trials = self.config.n_trials,
            steps = self.config.n_steps,
            order = self.config.order.depth(),
            sentinel_steps = result.sentinel_steps(),
            "simulation complete"
        );

        Ok(result)
    }
}

/// Run a simulation with `config` in one call.
pub fn simulate_momentum(
    history: &[f64],
    starting_value: f64,
    config: SimulationConfig,
) -> Result<SimulationResult> {
    MomentumSimulator::new(config)?.simulate(history, starting_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const HISTORY: [f64; 10] = [1.0, -2.0, 0.5, -0.3, 2.0, -1.0, 0.8, -0.6, 1.5, -0.9];

    fn config(order: ConditioningOrder) -> SimulationConfig {
        SimulationConfig {
            n_steps: 5,
            n_trials: 3,
            order,
            ..Default::default()
        }
    }

    #[test]
    fn fits_order_one_model() {
        let model = MomentumModel::fit(&HISTORY, ConditioningOrder::One, None).unwrap();
        assert!((model.reference.mean - 0.1).abs() < 1e-12);
        assert!((model.reference.std_dev - 1.43_f64.sqrt()).abs() < 1e-12);
        // sg bd sg sd bg sd sg sd bg sd: bd is always followed by sg
        assert_eq!(
            model.table.probabilities(&[Category::BigDrop]).unwrap(),
            &[0.0, 0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn reference_override_is_used() {
        let reference = ReferenceStats::new(0.0, 2.0);
        let model = MomentumModel::fit(&HISTORY, ConditioningOrder::One, Some(reference)).unwrap();
        assert_eq!(model.reference, reference);
    }

    #[test]
    fn trial_has_requested_length() {
        let model = MomentumModel::fit(&HISTORY, ConditioningOrder::One, None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let steps = model
            .run_trial(&HISTORY, 12, &ValueResolver::default(), &mut rng)
            .unwrap();
        assert_eq!(steps.movements.len(), 12);
        assert!(steps.movements.iter().all(|m| m.is_finite()));
    }

    #[test]
    fn deterministic_cycle_is_reproduced() {
        // bd sg sd bg repeated: every prefix has exactly one successor
        let mut history = [-3.0, 0.3, -0.4, 3.0].repeat(3);
        history.push(-3.0);
        let model = MomentumModel::fit(&history, ConditioningOrder::One, None).unwrap();
        assert_eq!(model.table.probabilities(&[Category::BigDrop]).unwrap()[2], 1.0);

        let mut rng = StdRng::seed_from_u64(3);
        let steps = model
            .run_trial(&history, 8, &ValueResolver::default(), &mut rng)
            .unwrap();
        let cats: Vec<Category> = steps
            .movements
            .iter()
            .map(|&m| categorize(m, &model.reference, CategoryMode::Four))
            .collect();
        assert_eq!(
            cats,
            [
                Category::SmallGain,
                Category::SmallDrop,
                Category::BigGain,
                Category::BigDrop,
            ]
            .repeat(2)
        );
    }

    #[test]
    fn order_two_follows_the_pair_chain() {
        // B(4, 2) De Bruijn cycle: each ordered pair occurs once per cycle and
        // is always followed by the same label.
        const CYCLE: [usize; 16] = [0, 0, 1, 0, 2, 0, 3, 1, 1, 2, 1, 3, 2, 2, 3, 3];
        const VALUES: [f64; 4] = [-3.0, -0.4, 0.3, 3.0];
        let history: Vec<f64> = CYCLE.iter().cycle().take(48).map(|&i| VALUES[i]).collect();

        let model = MomentumModel::fit(&history, ConditioningOrder::Two, None).unwrap();
        for row in model.table.rows() {
            assert_eq!(row.probabilities.iter().filter(|&&p| p == 1.0).count(), 1);
        }

        // The chain starts from the last two real movements (bg, bg) and
        // then conditions on its own output.
        let mut rng = StdRng::seed_from_u64(5);
        let steps = model
            .run_trial(&history, 20, &ValueResolver::default(), &mut rng)
            .unwrap();
        let cats: Vec<Category> = steps
            .movements
            .iter()
            .map(|&m| categorize(m, &model.reference, CategoryMode::Four))
            .collect();
        let expected: Vec<Category> = CYCLE
            .iter()
            .cycle()
            .take(20)
            .map(|&i| Category::FOUR[i])
            .collect();
        assert_eq!(cats, expected);
    }

    #[test]
    fn category_seen_only_on_the_last_day_still_simulates() {
        // bd sg sd sg bd sg sd sg bd sg sd bg: the only big gain ends the history
        let history = [-2.0, 0.1, -0.5, 0.3, -2.0, 0.2, -0.4, 0.1, -2.1, 0.3, -0.3, 4.0];
        let cfg = SimulationConfig {
            n_steps: 20,
            n_trials: 4,
            ..config(ConditioningOrder::One)
        };
        let result = simulate_momentum(&history, 100.0, cfg).unwrap();

        let table = &result.model.table;
        assert_eq!(table.transition_count(&[Category::BigGain]).unwrap(), 0);
        assert_eq!(table.probabilities(&[Category::BigGain]).unwrap(), &[0.0; 4]);
        for t in &result.trajectories {
            assert_eq!(t.movements.len(), 20);
            assert_eq!(t.prices.len(), 21);
        }
    }

    #[test]
    fn next_step_checks_window() {
        let model = MomentumModel::fit(&HISTORY, ConditioningOrder::One, None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(model
            .next_step(&[0.1, 0.2], &ValueResolver::default(), &mut rng)
            .is_err());
    }

    #[test]
    fn end_to_end_order_one() {
        let result = simulate_momentum(&HISTORY, 100.0, config(ConditioningOrder::One)).unwrap();
        assert_eq!(result.trajectories.len(), 3);
        for (i, t) in result.trajectories.iter().enumerate() {
            assert_eq!(t.trial, i);
            assert_eq!(t.movements.len(), 5);
            assert_eq!(t.prices.len(), 6);
            assert_eq!(t.prices[0], 100.0);
            assert!(t.prices.iter().all(|p| p.is_finite() && *p >= 0.0));
        }
    }

    #[test]
    fn order_two_needs_every_pair() {
        let err = simulate_momentum(&HISTORY, 100.0, config(ConditioningOrder::Two)).unwrap_err();
        assert!(err.is_insufficient_history());
    }

    #[test]
    fn short_history_is_rejected() {
        let err = simulate_momentum(&[1.0], 100.0, config(ConditioningOrder::One)).unwrap_err();
        assert_eq!(
            err,
            TrendchainError::HistoryTooShort {
                required: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn bad_starting_value_is_rejected() {
        for start in [0.0, -1.0, f64::NAN] {
            let err =
                simulate_momentum(&HISTORY, start, config(ConditioningOrder::One)).unwrap_err();
            assert!(matches!(err, TrendchainError::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn parallel_matches_sequential() {
        let parallel = SimulationConfig {
            n_trials: 16,
            ..config(ConditioningOrder::One)
        };
        let sequential = SimulationConfig {
            parallel: false,
            ..parallel.clone()
        };
        let a = simulate_momentum(&HISTORY, 50.0, parallel).unwrap();
        let b = simulate_momentum(&HISTORY, 50.0, sequential).unwrap();
        assert_eq!(a.trajectories, b.trajectories);
        assert_eq!(a.run_id, b.run_id);
    }

    #[test]
    fn seeds_change_paths() {
        let a = simulate_momentum(&HISTORY, 100.0, config(ConditioningOrder::One)).unwrap();
        let b = simulate_momentum(
            &HISTORY,
            100.0,
            SimulationConfig {
                seed: 7,
                ..config(ConditioningOrder::One)
            },
        )
        .unwrap();
        assert_ne!(a.trajectories, b.trajectories);
    }

    #[test]
    fn sentinel_steps_are_counted_not_fatal() {
        // A one-draw batch misses often; trials still complete.
        let cfg = SimulationConfig {
            resolver_batch: 1,
            n_steps: 50,
            ..config(ConditioningOrder::One)
        };
        let result = simulate_momentum(&HISTORY, 100.0, cfg).unwrap();
        assert!(result.sentinel_steps() > 0);
        for t in &result.trajectories {
            let zeros = t.movements.iter().filter(|&&m| m == SENTINEL).count();
            assert!(zeros >= t.sentinel_steps);
            assert_eq!(t.movements.len(), 50);
        }
    }
}

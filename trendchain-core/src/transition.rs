//! Transition table builder.
//!
//! Estimates `P(next | previous 1 category)` or `P(next | previous 2
//! categories)` from observed trend keys. Tables only exist over the
//! 4-category labels, and every row is built eagerly so that no trial can
//! reach a missing row:
//!
//! - order 1 fails with `InsufficientHistory` when a category never occurs in
//!   the history. A category that only occurs on the last day has no observed
//!   successor; its row is all zeros and the sampler draws uniformly from it.
//! - order 2 fails with `InsufficientHistory` when a pair is never followed
//!   by anything.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::category::{Category, CategoryMode};
use crate::error::{Result, TrendchainError};
use crate::trend::{trend_keys, TrendKey};

const LABELS: [Category; 4] = Category::FOUR;

/// How many previous categories a transition is conditioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum ConditioningOrder {
    One,
    Two,
}

impl ConditioningOrder {
    /// Length of the conditioning prefix.
    pub fn depth(self) -> usize {
        match self {
            ConditioningOrder::One => 1,
            ConditioningOrder::Two => 2,
        }
    }

    /// Width of the trend keys the table is built from.
    pub fn window(self) -> usize {
        self.depth() + 1
    }

    fn row_count(self) -> usize {
        LABELS.len().pow(self.depth() as u32)
    }
}

impl TryFrom<usize> for ConditioningOrder {
    type Error = TrendchainError;

    fn try_from(n: usize) -> Result<Self> {
        match n {
            1 => Ok(ConditioningOrder::One),
            2 => Ok(ConditioningOrder::Two),
            other => Err(TrendchainError::InvalidConfiguration(format!(
                "conditioning order must be 1 or 2, got {other}"
            ))),
        }
    }
}

impl From<ConditioningOrder> for usize {
    fn from(order: ConditioningOrder) -> usize {
        order.depth()
    }
}

/// Distribution of the next category after one conditioning prefix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionRow {
    pub prefix: TrendKey,
    /// Probabilities in `[big-drop, small-drop, small-gain, big-gain]` order.
    pub probabilities: [f64; 4],
    /// Number of observed transitions leaving `prefix`.
    pub transitions: usize,
}

/// Immutable table of conditional next-category distributions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionTable {
    order: ConditioningOrder,
    rows: Vec<TransitionRow>,
}

impl TransitionTable {
    /// Fixed label order of every probability vector.
    pub fn labels() -> &'static [Category; 4] {
        &LABELS
    }

    /// Build a table from trend keys of width `order + 1` and the base
    /// category sequence they were cut from.
    ///
    /// Row `p` holds `count(p_c) / sum_c count(p_c)` for each label `c`.
    /// Every order-1 prefix must occur in `base_categories`; every order-2
    /// prefix must have at least one observed transition.
    pub fn build(
        keys: &[TrendKey],
        base_categories: &[Category],
        order: ConditioningOrder,
    ) -> Result<Self> {
        if let Some(c) = base_categories
            .iter()
            .find(|&&c| !CategoryMode::Four.contains(c))
        {
            return Err(TrendchainError::InvalidConfiguration(format!(
                "transition tables support 4 categories only, found '{c}'"
            )));
        }

        let mut counts = vec![[0usize; 4]; order.row_count()];
        for key in keys {
            if key.len() != order.window() {
                return Err(TrendchainError::InvalidConfiguration(format!(
                    "trend key '{key}' has width {}, order {} needs {}",
                    key.len(),
                    order.depth(),
                    order.window()
                )));
            }
            let row = row_index(key.prefix())?;
            let col = label_index(key.last().unwrap_or(Category::SmallGain))?;
            counts[row][col] += 1;
        }

        let mut rows = Vec::with_capacity(counts.len());
        for (index, row_counts) in counts.iter().enumerate() {
            let prefix = TrendKey::new(&prefix_at(index, order));
            let total: usize = row_counts.iter().sum();
            if total == 0 {
                let observed = base_categories
                    .windows(order.depth())
                    .filter(|w| *w == prefix.categories())
                    .count();
                if order == ConditioningOrder::Two || observed == 0 {
                    return Err(TrendchainError::InsufficientHistory {
                        prefix: prefix.to_string(),
                        observed,
                    });
                }
                debug!(prefix = %prefix, "prefix only ends the history, row left empty");
                rows.push(TransitionRow {
                    prefix,
                    probabilities: [0.0; 4],
                    transitions: 0,
                });
                continue;
            }

            let mut probabilities = [0.0; 4];
            for (p, &n) in probabilities.iter_mut().zip(row_counts) {
                *p = n as f64 / total as f64;
            }
            rows.push(TransitionRow {
                prefix,
                probabilities,
                transitions: total,
            });
        }

        debug!(
            order = order.depth(),
            rows = rows.len(),
            keys = keys.len(),
            "built transition table"
        );

        Ok(Self { order, rows })
    }

    /// Cut trend keys from `base_categories` and build the table in one step.
    pub fn from_categories(base_categories: &[Category], order: ConditioningOrder) -> Result<Self> {
        let keys = trend_keys(base_categories, order.window())?;
        Self::build(&keys, base_categories, order)
    }

    pub fn order(&self) -> ConditioningOrder {
        self.order
    }

    /// All rows, prefixes in label order (`bd`, `sd`, `sg`, `bg` for order 1;
    /// `bd_bd`, `bd_sd`, ... for order 2).
    pub fn rows(&self) -> &[TransitionRow] {
        &self.rows
    }

    /// Row conditioned on `prefix`, which must hold exactly `order` labels.
    pub fn row(&self, prefix: &[Category]) -> Result<&TransitionRow> {
        if prefix.len() != self.order.depth() {
            return Err(TrendchainError::InvalidConfiguration(format!(
                "prefix of length {} does not match order {}",
                prefix.len(),
                self.order.depth()
            )));
        }
        Ok(&self.rows[row_index(prefix)?])
    }

    /// Probability vector conditioned on `prefix`.
    pub fn probabilities(&self, prefix: &[Category]) -> Result<&[f64; 4]> {
        self.row(prefix).map(|row| &row.probabilities)
    }

    /// Observed transitions leaving `prefix`.
    pub fn transition_count(&self, prefix: &[Category]) -> Result<usize> {
        self.row(prefix).map(|row| row.transitions)
    }
}

fn label_index(category: Category) -> Result<usize> {
    CategoryMode::Four.index_of(category).ok_or_else(|| {
        TrendchainError::InvalidConfiguration(format!(
            "transition tables support 4 categories only, found '{category}'"
        ))
    })
}

/// Row position of a prefix: base-4 number over label indices.
fn row_index(prefix: &[Category]) -> Result<usize> {
    prefix
        .iter()
        .try_fold(0, |acc, &c| -> Result<usize> {
            Ok(acc * LABELS.len() + label_index(c)?)
        })
}

fn prefix_at(mut index: usize, order: ConditioningOrder) -> Vec<Category> {
    let mut prefix = vec![LABELS[0]; order.depth()];
    for slot in prefix.iter_mut().rev() {
        *slot = LABELS[index % LABELS.len()];
        index /= LABELS.len();
    }
    prefix
}

//! Plain numeric summaries for charting: per-category counts and the
//! next-day distribution after a given category.
//!
//! These are the numbers behind the category bar charts: the baseline
//! frequency of each bucket, and the conditional frequency of each bucket on
//! the day after a chosen one, together with the sample size `n`.

use serde::Serialize;

use crate::category::{count_category, Category, CategoryMode};
use crate::error::{Result, TrendchainError};
use crate::trend::{count_trends, trend_keys, TrendKey};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: usize,
    pub frequency: f64,
}

/// How often each label of a mode occurs in a category sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCounts {
    pub mode: CategoryMode,
    pub total: usize,
    pub entries: Vec<CategoryCount>,
}

impl CategoryCounts {
    pub fn from_categories(categories: &[Category], mode: CategoryMode) -> Self {
        let total = categories.len();
        let entries = mode
            .labels()
            .iter()
            .map(|&category| {
                let count = count_category(categories, category);
                CategoryCount {
                    category,
                    count,
                    frequency: if total == 0 {
                        0.0
                    } else {
                        count as f64 / total as f64
                    },
                }
            })
            .collect();
        Self {
            mode,
            total,
            entries,
        }
    }

    pub fn count(&self, category: Category) -> usize {
        self.entries
            .iter()
            .find(|e| e.category == category)
            .map_or(0, |e| e.count)
    }

    /// Frequencies in label order.
    pub fn frequencies(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.frequency).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryProbability {
    pub category: Category,
    pub probability: f64,
}

/// Distribution of the category that follows `previous`.
///
/// Divides by the number of times `previous` occurs anywhere in the sequence,
/// so when the sequence ends on `previous` the probabilities sum to slightly
/// less than one. Works for both modes; transition tables are the normalized,
/// 4-category counterpart used for simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionalProfile {
    pub previous: Category,
    /// Occurrences of `previous` (the chart's `n`).
    pub observed: usize,
    pub probabilities: Vec<CategoryProbability>,
}

impl ConditionalProfile {
    pub fn next_day(
        categories: &[Category],
        previous: Category,
        mode: CategoryMode,
    ) -> Result<Self> {
        if !mode.contains(previous) {
            return Err(TrendchainError::InvalidConfiguration(format!(
                "'{previous}' is not a {}-category label",
                mode.count()
            )));
        }

        let observed = count_category(categories, previous);
        if observed == 0 {
            return Err(TrendchainError::InsufficientHistory {
                prefix: previous.to_string(),
                observed,
            });
        }

        let keys = trend_keys(categories, 2)?;
        let probabilities = mode
            .labels()
            .iter()
            .map(|&next| CategoryProbability {
                category: next,
                probability: count_trends(&keys, &TrendKey::new(&[previous, next])) as f64
                    / observed as f64,
            })
            .collect();

        Ok(Self {
            previous,
            observed,
            probabilities,
        })
    }

    pub fn probability(&self, category: Category) -> f64 {
        self.probabilities
            .iter()
            .find(|p| p.category == category)
            .map_or(0.0, |p| p.probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category::{BigDrop, BigGain, MediumGain, SmallDrop, SmallGain};

    #[test]
    fn counts_in_label_order() {
        let cats = [SmallGain, BigDrop, SmallGain, SmallDrop];
        let counts = CategoryCounts::from_categories(&cats, CategoryMode::Four);
        assert_eq!(counts.total, 4);
        assert_eq!(counts.count(SmallGain), 2);
        assert_eq!(counts.count(BigGain), 0);
        assert_eq!(counts.frequencies(), vec![0.25, 0.25, 0.5, 0.0]);
    }

    #[test]
    fn empty_counts_are_zero() {
        let counts = CategoryCounts::from_categories(&[], CategoryMode::Eight);
        assert_eq!(counts.entries.len(), 8);
        assert!(counts.frequencies().iter().all(|&f| f == 0.0));
    }

    #[test]
    fn next_day_profile_uses_occurrence_count() {
        // sg is followed by bd and bg, and also ends the sequence
        let cats = [SmallGain, BigDrop, SmallGain, BigGain, SmallGain];
        let profile = ConditionalProfile::next_day(&cats, SmallGain, CategoryMode::Four).unwrap();
        assert_eq!(profile.observed, 3);
        assert!((profile.probability(BigDrop) - 1.0 / 3.0).abs() < 1e-12);
        assert!((profile.probability(BigGain) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(profile.probability(SmallDrop), 0.0);
    }

    #[test]
    fn eight_mode_profile() {
        let cats = [MediumGain, SmallDrop, MediumGain, SmallDrop];
        let profile = ConditionalProfile::next_day(&cats, MediumGain, CategoryMode::Eight).unwrap();
        assert_eq!(profile.probabilities.len(), 8);
        assert_eq!(profile.probability(SmallDrop), 1.0);
    }

    #[test]
    fn profile_errors() {
        let cats = [BigDrop, SmallDrop];
        assert!(ConditionalProfile::next_day(&cats, BigGain, CategoryMode::Four)
            .unwrap_err()
            .is_insufficient_history());
        assert!(matches!(
            ConditionalProfile::next_day(&cats, MediumGain, CategoryMode::Four),
            Err(TrendchainError::InvalidConfiguration(_))
        ));
    }
}

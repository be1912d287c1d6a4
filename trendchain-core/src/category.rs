//! Movement categories and the categorizer.
//!
//! A movement is placed into an ordinal bucket by its distance from the
//! reference mean in units of standard deviation. Two granularities exist:
//! four buckets (the only one transition tables accept) and eight buckets.
//!
//! The threshold ladders are decision lists evaluated top to bottom. Drops use
//! `<=` on their outer edges and `< mean` on the inner one while gains use
//! `>=` throughout. With a positive spread, a movement exactly at the mean is
//! a small gain.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrendchainError};
use crate::stats::ReferenceStats;

/// Ordinal movement category, ordered by increasing movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    VeryBigDrop,
    BigDrop,
    MediumDrop,
    SmallDrop,
    SmallGain,
    MediumGain,
    BigGain,
    VeryBigGain,
}

impl Category {
    /// Labels of the 4-category mode, in the order probability vectors use.
    pub const FOUR: [Category; 4] = [
        Category::BigDrop,
        Category::SmallDrop,
        Category::SmallGain,
        Category::BigGain,
    ];

    /// Labels of the 8-category mode.
    pub const EIGHT: [Category; 8] = [
        Category::VeryBigDrop,
        Category::BigDrop,
        Category::MediumDrop,
        Category::SmallDrop,
        Category::SmallGain,
        Category::MediumGain,
        Category::BigGain,
        Category::VeryBigGain,
    ];

    /// Short code used in trend keys (`bd`, `sg`, ...).
    pub fn code(self) -> &'static str {
        match self {
            Category::VeryBigDrop => "vbd",
            Category::BigDrop => "bd",
            Category::MediumDrop => "md",
            Category::SmallDrop => "sd",
            Category::SmallGain => "sg",
            Category::MediumGain => "mg",
            Category::BigGain => "bg",
            Category::VeryBigGain => "vbg",
        }
    }

    /// Human-readable name for chart legends.
    pub fn full_name(self) -> &'static str {
        match self {
            Category::VeryBigDrop => "very big drop",
            Category::BigDrop => "big drop",
            Category::MediumDrop => "medium drop",
            Category::SmallDrop => "small drop",
            Category::SmallGain => "small gain",
            Category::MediumGain => "medium gain",
            Category::BigGain => "big gain",
            Category::VeryBigGain => "very big gain",
        }
    }

    pub fn from_code(code: &str) -> Option<Category> {
        Category::EIGHT.into_iter().find(|c| c.code() == code)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Number of buckets used to discretize movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum CategoryMode {
    Four,
    Eight,
}

impl CategoryMode {
    pub fn count(self) -> usize {
        self.labels().len()
    }

    /// Fixed label ordering for this mode.
    pub fn labels(self) -> &'static [Category] {
        match self {
            CategoryMode::Four => &Category::FOUR,
            CategoryMode::Eight => &Category::EIGHT,
        }
    }

    pub fn contains(self, category: Category) -> bool {
        self.index_of(category).is_some()
    }

    /// Position of `category` within [`CategoryMode::labels`].
    pub fn index_of(self, category: Category) -> Option<usize> {
        self.labels().iter().position(|&c| c == category)
    }
}

impl TryFrom<usize> for CategoryMode {
    type Error = TrendchainError;

    fn try_from(n: usize) -> Result<Self> {
        match n {
            4 => Ok(CategoryMode::Four),
            8 => Ok(CategoryMode::Eight),
            other => Err(TrendchainError::InvalidConfiguration(format!(
                "only 4 and 8 categories are supported, got {other}"
            ))),
        }
    }
}

impl From<CategoryMode> for usize {
    fn from(mode: CategoryMode) -> usize {
        mode.count()
    }
}

/// Categorize one movement against explicit reference statistics.
///
/// Total over all inputs: anything that falls through the ladder (including
/// NaN) lands in `SmallGain`.
pub fn categorize(value: f64, stats: &ReferenceStats, mode: CategoryMode) -> Category {
    let mu = stats.mean;
    let sigma = stats.std_dev;

    match mode {
        CategoryMode::Eight => {
            if value <= mu - 2.0 * sigma {
                Category::VeryBigDrop
            } else if value <= mu - sigma {
                Category::BigDrop
            } else if value <= mu - sigma / 2.0 {
                Category::MediumDrop
            } else if value < mu {
                Category::SmallDrop
            } else if value >= mu + 2.0 * sigma {
                Category::VeryBigGain
            } else if value >= mu + sigma {
                Category::BigGain
            } else if value >= mu + sigma / 2.0 {
                Category::MediumGain
            } else {
                Category::SmallGain
            }
        }
        CategoryMode::Four => {
            if value <= mu - sigma {
                Category::BigDrop
            } else if value < mu {
                Category::SmallDrop
            } else if value >= mu + sigma {
                Category::BigGain
            } else {
                Category::SmallGain
            }
        }
    }
}

/// Categorize a batch against statistics computed from the batch itself.
///
/// Returns the categories in input order together with the statistics used.
pub fn categorize_movements(
    movements: &[f64],
    mode: CategoryMode,
) -> Result<(Vec<Category>, ReferenceStats)> {
    let stats = ReferenceStats::from_movements(movements)?;
    let categories = movements
        .iter()
        .map(|&m| categorize(m, &stats, mode))
        .collect();
    Ok((categories, stats))
}

/// Number of occurrences of `target` in `categories`.
pub fn count_category(categories: &[Category], target: Category) -> usize {
    categories.iter().filter(|&&c| c == target).count()
}

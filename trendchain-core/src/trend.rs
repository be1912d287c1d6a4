//! Trend sequencer: overlapping windows of consecutive categories.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::{Result, TrendchainError};

/// Ordered run of consecutive categories, e.g. `bd_sg` or `sd_sd_bg`.
///
/// Displays as short codes joined by `_`. Order matters: `bd_sg != sg_bd`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrendKey(Vec<Category>);

impl TrendKey {
    pub fn new(categories: &[Category]) -> Self {
        Self(categories.to_vec())
    }

    pub fn categories(&self) -> &[Category] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every category but the last: the conditioning part of the key.
    pub fn prefix(&self) -> &[Category] {
        match self.0.split_last() {
            Some((_, head)) => head,
            None => &[],
        }
    }

    pub fn last(&self) -> Option<Category> {
        self.0.last().copied()
    }
}

impl fmt::Display for TrendKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("_")?;
            }
            f.write_str(c.code())?;
        }
        Ok(())
    }
}

/// Build the overlapping windows of width `window` (2 or 3) over `categories`.
///
/// Yields `len - window + 1` keys, or none when the sequence is shorter than
/// the window.
pub fn trend_keys(categories: &[Category], window: usize) -> Result<Vec<TrendKey>> {
    if !(2..=3).contains(&window) {
        return Err(TrendchainError::InvalidConfiguration(format!(
            "trend window must be 2 or 3, got {window}"
        )));
    }
    Ok(categories.windows(window).map(TrendKey::new).collect())
}

/// Number of occurrences of `target` in `keys`.
pub fn count_trends(keys: &[TrendKey], target: &TrendKey) -> usize {
    keys.iter().filter(|k| *k == target).count()
}

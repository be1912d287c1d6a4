//! Error types shared by every stage of the pipeline.

use thiserror::Error;

/// Errors from categorization, table building and simulation setup.
///
/// Resolver degeneracy is not an error: it is absorbed into the trajectory as
/// a sentinel movement (see [`crate::resolver`]).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrendchainError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("insufficient history: no transitions observed after '{prefix}' ({observed} occurrences)")]
    InsufficientHistory { prefix: String, observed: usize },

    #[error("insufficient history: {actual} movements < minimum {required}")]
    HistoryTooShort { required: usize, actual: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl TrendchainError {
    /// True for both history failures: an unobserved conditioning prefix and
    /// a series too short to seed the chain.
    pub fn is_insufficient_history(&self) -> bool {
        matches!(
            self,
            TrendchainError::InsufficientHistory { .. } | TrendchainError::HistoryTooShort { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TrendchainError>;

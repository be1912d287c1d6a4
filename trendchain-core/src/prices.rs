//! Conversions between price series and percentage movements.

use crate::error::{Result, TrendchainError};

/// Percentage movements sampled every `period` prices.
///
/// The first price anchors the series; each price at a multiple of `period`
/// yields `100 * p[t] / p[t - period] - 100`. A series of `n` prices gives
/// `(n - 1) / period` movements. Prices must be finite and positive.
pub fn price_movements(prices: &[f64], period: usize) -> Result<Vec<f64>> {
    if period == 0 {
        return Err(TrendchainError::InvalidConfiguration(
            "movement period must be > 0".into(),
        ));
    }
    if let Some(pos) = prices.iter().position(|p| !p.is_finite() || *p <= 0.0) {
        return Err(TrendchainError::InvalidInput(format!(
            "price at index {pos} must be finite and positive, got {}",
            prices[pos]
        )));
    }

    let Some(&first) = prices.first() else {
        return Ok(Vec::new());
    };

    let mut movements = Vec::with_capacity(prices.len().saturating_sub(1) / period);
    let mut last = first;
    for &price in prices.iter().skip(period).step_by(period) {
        movements.push(100.0 * price / last - 100.0);
        last = price;
    }
    Ok(movements)
}

/// Compound percentage movements onto `start`.
///
/// The path begins with `start` and has `movements.len() + 1` points. Zero is
/// absorbing: once a price reaches `<= 0` every later point is `0`.
pub fn compound_movements(movements: &[f64], start: f64) -> Vec<f64> {
    let mut prices = Vec::with_capacity(movements.len() + 1);
    let mut value = start.max(0.0);
    prices.push(value);

    for &movement in movements {
        if value > 0.0 {
            value += value * movement / 100.0;
            if value <= 0.0 {
                value = 0.0;
            }
        }
        prices.push(value);
    }
    prices
}

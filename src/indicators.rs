//! Trend and momentum indicators.
//!
//! # Conventions
//!
//! - Input slices are `&[f64]` closing prices ordered oldest to newest.
//! - Readings return `None` when the input cannot produce a finite
//!   value (too short, zero denominator, non-finite prices). Callers turn
//!   that into a data error instead of ranking on a made-up number.

/// Latest close divided by the simple moving average of the last `period`
/// closes (latest close included). Above 1.0 means the price trades above
/// its average.
pub fn relative_sma(close: &[f64], period: usize) -> Option<f64> {
    if period == 0 || close.len() < period {
        return None;
    }
    let window = &close[close.len() - period..];
    if window.iter().any(|c| !c.is_finite()) {
        return None;
    }
    let mean = window.iter().sum::<f64>() / period as f64;
    let last = *window.last()?;
    if mean <= 0.0 {
        return None;
    }
    Some(last / mean)
}

/// Momentum as a price ratio: `last / compare`.
///
/// 1.10 means the price rose 10% over the window, 0.95 that it fell 5%.
pub fn price_ratio(last: f64, compare: f64) -> Option<f64> {
    if !last.is_finite() || !compare.is_finite() || compare <= 0.0 {
        return None;
    }
    Some(last / compare)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

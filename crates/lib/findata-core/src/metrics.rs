//! Pure financial metrics over ordered series of values.
//!
//! Every function returns `None` instead of failing when the metric is
//! undefined for its input.

/// Places used for aggregate metrics (CAGR, total return, drawdown).
pub const AGGREGATE_PLACES: i32 = 6;
/// Places used for per-step returns.
pub const RETURN_PLACES: i32 = 8;
/// Places used for monetary averages such as price targets.
pub const PRICE_PLACES: i32 = 2;

/// Compound growth rate `(v1 / v0)^(1 / periods) - 1`.
///
/// Undefined for a non-positive start value, a non-positive period count, a
/// negative end value, or non-finite input.
#[must_use]
pub fn cagr(v0: f64, v1: f64, periods: i64) -> Option<f64> {
    if periods <= 0 || !v0.is_finite() || !v1.is_finite() || v0 <= 0.0 || v1 < 0.0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let exponent = 1.0 / periods as f64;
    finite((v1 / v0).powf(exponent) - 1.0)
}

/// CAGR between the first and last observations of `series`.
#[must_use]
pub fn cagr_series(series: &[f64], periods: i64) -> Option<f64> {
    match series {
        [first, .., last] => cagr(*first, *last, periods),
        _ => None,
    }
}

/// Simple return from `prev` to `curr`; undefined when `prev` is zero.
#[must_use]
pub fn period_return(prev: f64, curr: f64) -> Option<f64> {
    if prev == 0.0 {
        return None;
    }
    finite((curr - prev) / prev)
}

/// Step-wise returns; the first observation has no prior and maps to `None`.
#[must_use]
pub fn period_returns(series: &[f64]) -> Vec<Option<f64>> {
    let mut returns = Vec::with_capacity(series.len());
    if !series.is_empty() {
        returns.push(None);
    }
    returns.extend(
        series
            .windows(2)
            .map(|pair| period_return(pair[0], pair[1])),
    );
    returns
}

/// Return from the first to the last observation.
#[must_use]
pub fn total_return(series: &[f64]) -> Option<f64> {
    match series {
        [first, .., last] => period_return(*first, *last),
        _ => None,
    }
}

/// Deepest decline from a running peak, as a non-positive fraction
/// (`-0.25` is a 25% drawdown). A never-declining series yields `0.0`.
#[must_use]
pub fn max_drawdown(series: &[f64]) -> Option<f64> {
    let (&first, rest) = series.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut peak = first;
    let mut deepest = 0.0_f64;
    for &value in series {
        if value > peak {
            peak = value;
        }
        if peak <= 0.0 {
            return None;
        }
        deepest = deepest.min((value - peak) / peak);
    }
    finite(deepest)
}

/// Rounds half away from zero to `places` decimal places.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10_f64.powi(places);
    (value * scale).round() / scale
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

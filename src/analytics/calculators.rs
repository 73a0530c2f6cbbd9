use crate::analytics::primitives::{pct_change, sample_std_dev};

/// Stateless analytic for period-over-period returns.
pub trait ReturnAnalytic: Send + Sync {
    fn compute(&self, current: f64, previous: f64) -> Option<f64>;
}

/// Simple return expressed in percent.
pub struct PercentReturnAnalytic;

impl ReturnAnalytic for PercentReturnAnalytic {
    fn compute(&self, current: f64, previous: f64) -> Option<f64> {
        pct_change(current, previous)
    }
}

/// Stateless analytic for the dispersion of a return series.
pub trait VolatilityAnalytic: Send + Sync {
    fn compute(&self, returns: &[f64]) -> Option<f64>;
}

pub struct SampleStdDevVolatility;

impl VolatilityAnalytic for SampleStdDevVolatility {
    fn compute(&self, returns: &[f64]) -> Option<f64> {
        sample_std_dev(returns)
    }
}

/// Computes returns over `closes` in the given order.
///
/// The first element is always `None`.
pub fn returns_series(analytic: &dyn ReturnAnalytic, closes: &[f64]) -> Vec<Option<f64>> {
    if closes.is_empty() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len());
    result.push(None);
    for window in closes.windows(2) {
        result.push(analytic.compute(window[1], window[0]));
    }
    result
}

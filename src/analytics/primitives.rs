//! Stateless numeric primitives shared by the metrics engine and the renderers.
//!
//! Missing observations are represented as `None` and are skipped by every
//! aggregate here; they are never treated as zero. Non-finite inputs are
//! treated the same way as missing ones so NaN cannot leak into outputs.

/// Percentage change from `previous` to `current`.
///
/// Returns `None` when `previous` is zero or either value is not finite.
pub fn pct_change(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 || !previous.is_finite() || !current.is_finite() {
        return None;
    }

    let change = (current - previous) / previous * 100.0;
    change.is_finite().then_some(change)
}

/// Collects the present, finite values of an optional series.
pub fn present_values<I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .filter(|value| value.is_finite())
        .collect()
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
///
/// Returns `None` with fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let mean = mean(values)?;
    let sum_squared_diff: f64 = values.iter().map(|&value| (value - mean).powi(2)).sum();
    let std_dev = (sum_squared_diff / (values.len() - 1) as f64).sqrt();
    std_dev.is_finite().then_some(std_dev)
}

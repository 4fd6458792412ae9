//! Derived metrics: stateless transforms of the visible base timeline.
//!
//! Every transform takes `(timestamp, value)` points in ascending time order
//! and returns a new series. Nothing is cached between calls.

use chrono::{DateTime, Utc};

/// One point of a timeline series.
pub type Point = (DateTime<Utc>, f64);

// ---------------------------------------------------------------------------
// Derived metric descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedMetric {
    LinearRegression,
    Cumulative,
    MovingAverage { window: usize },
    Gaussian { degree: usize },
}

impl DerivedMetric {
    /// Display name shown in the metric selector.
    pub fn name(&self) -> String {
        match self {
            DerivedMetric::LinearRegression => "Linear regression".to_string(),
            DerivedMetric::Cumulative => "Cumulative".to_string(),
            DerivedMetric::MovingAverage { window } => {
                format!("Smoothed ({window}-week average)")
            }
            DerivedMetric::Gaussian { degree } => {
                format!("Smoothed ({}-week gaussian)", kernel_width(*degree))
            }
        }
    }

    pub fn apply(&self, series: &[Point]) -> Vec<Point> {
        match *self {
            DerivedMetric::LinearRegression => linear_regression(series),
            DerivedMetric::Cumulative => cumulative(series),
            DerivedMetric::MovingAverage { window } => moving_average(series, window),
            DerivedMetric::Gaussian { degree } => gaussian_smooth(series, degree),
        }
    }
}

/// The built-in derived metrics, regression first.
pub fn builtin_derived_metrics(window: usize, degree: usize) -> Vec<DerivedMetric> {
    vec![
        DerivedMetric::LinearRegression,
        DerivedMetric::Cumulative,
        DerivedMetric::MovingAverage {
            window: window.max(1),
        },
        DerivedMetric::Gaussian {
            degree: degree.max(1),
        },
    ]
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

/// Least-squares line over (epoch milliseconds, value), evaluated at every
/// input timestamp.
///
/// Sums are taken around the means so epoch-sized x values do not cancel.
/// With fewer than two distinct timestamps the fit is the flat mean.
pub fn linear_regression(series: &[Point]) -> Vec<Point> {
    if series.is_empty() {
        return Vec::new();
    }
    let n = series.len() as f64;
    let xs: Vec<f64> = series.iter().map(|(t, _)| t.timestamp_millis() as f64).collect();
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = series.iter().map(|(_, v)| v).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, (_, y)) in xs.iter().zip(series) {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    xs.iter()
        .zip(series)
        .map(|(x, (t, _))| (*t, mean_y + slope * (x - mean_x)))
        .collect()
}

/// Running total in time order.
pub fn cumulative(series: &[Point]) -> Vec<Point> {
    let mut total = 0.0;
    series
        .iter()
        .map(|&(t, v)| {
            total += v;
            (t, total)
        })
        .collect()
}

/// Trailing mean over `window` points.
///
/// The first `window - 1` points have no full window and keep their
/// original value.
pub fn moving_average(series: &[Point], window: usize) -> Vec<Point> {
    let window = window.max(1);
    let mut out = series.to_vec();
    for i in (window - 1)..series.len() {
        let sum: f64 = series[i + 1 - window..=i].iter().map(|(_, v)| v).sum();
        out[i].1 = sum / window as f64;
    }
    out
}

/// Width of the Gaussian kernel for a smoothing degree.
pub fn kernel_width(degree: usize) -> usize {
    (degree.max(1) * 2) - 1
}

/// Normalisable Gaussian weights `exp(-(4·i/win)²)` for
/// `i = -(degree-1) ..= degree-1`.
pub fn gaussian_weights(degree: usize) -> Vec<f64> {
    let degree = degree.max(1);
    let win = kernel_width(degree);
    (0..win)
        .map(|k| {
            let frac = (k as f64 - (degree as f64 - 1.0)) / win as f64;
            (-(4.0 * frac) * (4.0 * frac)).exp()
        })
        .collect()
}

/// Centered Gaussian smoothing.
///
/// Produces `len - win + 1` points (none when the series is shorter than
/// the kernel); output `j` is stamped with input timestamp `j + degree - 1`.
pub fn gaussian_smooth(series: &[Point], degree: usize) -> Vec<Point> {
    let degree = degree.max(1);
    let weights = gaussian_weights(degree);
    let win = weights.len();
    if series.len() < win {
        return Vec::new();
    }
    let total: f64 = weights.iter().sum();

    series
        .windows(win)
        .enumerate()
        .map(|(j, slice)| {
            let smoothed: f64 = slice
                .iter()
                .zip(&weights)
                .map(|((_, v), w)| v * w)
                .sum::<f64>()
                / total;
            (series[j + degree - 1].0, smoothed)
        })
        .collect()
}

//! Cube correlation kernel
//!
//! The spatial summary of the pixel correlation curves: at every lag, the
//! 16th, 50th and 84th percentiles of the pixel correlations.

use std::fmt;

use serde::Serialize;
use strum_macros::EnumIter;

/// Percentile band of the correlation kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, Serialize)]
pub enum Band {
    Lower,
    Center,
    Upper,
}
impl Band {
    /// The band percentile
    pub fn percentile(&self) -> f64 {
        match self {
            Band::Lower => 16f64,
            Band::Center => 50f64,
            Band::Upper => 84f64,
        }
    }
}
impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Lower => write!(f, "lower (16%)"),
            Band::Center => write!(f, "center (50%)"),
            Band::Upper => write!(f, "upper (84%)"),
        }
    }
}

/// Percentile of `values` with linear interpolation between closest ranks
///
/// NaN values are ignored, the percentile of an empty set is NaN.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().cloned().filter(|x| !x.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q / 100f64).clamp(0f64, 1f64) * (sorted.len() - 1) as f64;
    let (i, f) = (rank.floor() as usize, rank.fract());
    match sorted.get(i + 1) {
        Some(next) if f > 0f64 => sorted[i] + f * (next - sorted[i]),
        _ => sorted[i],
    }
}

/// Correlation kernel of a cube
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateKernel {
    pub lower: Vec<f64>,
    pub center: Vec<f64>,
    pub upper: Vec<f64>,
}
impl AggregateKernel {
    /// Aggregates the correlation curves of all the pixels
    ///
    /// Each curve must have `width` lags, shorter curves are padded with NaN.
    pub fn from_curves(curves: &[Vec<f64>], width: usize) -> Self {
        let mut kernel = Self {
            lower: Vec::with_capacity(width),
            center: Vec::with_capacity(width),
            upper: Vec::with_capacity(width),
        };
        for lag in 0..width {
            let values: Vec<f64> = curves
                .iter()
                .map(|curve| curve.get(lag).cloned().unwrap_or(f64::NAN))
                .collect();
            if values.iter().all(|x| x.is_nan()) {
                log::warn!("no valid correlation at lag #{lag}");
            }
            kernel.lower.push(percentile(&values, Band::Lower.percentile()));
            kernel.center.push(percentile(&values, Band::Center.percentile()));
            kernel.upper.push(percentile(&values, Band::Upper.percentile()));
        }
        kernel
    }
    /// Number of lags
    pub fn len(&self) -> usize {
        self.center.len()
    }
    pub fn is_empty(&self) -> bool {
        self.center.is_empty()
    }
    /// Returns the correlation curve of a given band
    pub fn band(&self, band: Band) -> &[f64] {
        match band {
            Band::Lower => &self.lower,
            Band::Center => &self.center,
            Band::Upper => &self.upper,
        }
    }
}

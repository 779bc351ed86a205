//! Kernel calibration
//!
//! Each band of the correlation kernel is compared to the correlation of the
//! reference spectrum convolved by the same kernel. The ratio of the lags at
//! half maximum gives the channel scale factor `k` used to remap the kernel
//! into the LSF.

use std::fmt;

use serde::Serialize;

use crate::{correlation::nan_to_num, kernel::Band, spectrum::ReferenceSpectrum};

/// Correlation level where the crossing lags are compared
pub const HALF_MAXIMUM: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpolationError {
    #[error("the curve never crosses {0}")]
    NoCrossing(f64),
    #[error("the curve crosses {value} {count} times, at lags {lags:?}")]
    AmbiguousCrossing {
        value: f64,
        count: usize,
        lags: Vec<f64>,
    },
}

/// The curve a calibration failure originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Observed,
    Reference,
}
impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Curve::Observed => write!(f, "observed"),
            Curve::Reference => write!(f, "reference"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("half maximum of the {curve} correlation of the {band} band: {values:?}")]
    HalfMaximum {
        band: Band,
        curve: Curve,
        values: Vec<f64>,
        #[source]
        source: InterpolationError,
    },
    #[error("degenerate scale factor {k} for the {band} band")]
    ScaleFactor { band: Band, k: f64 },
}
type Result<T> = std::result::Result<T, CalibrationError>;

/// Lag where `curve` is equal to `value`
///
/// The lag is linearly interpolated between the 2 samples around the
/// crossing. Segments with NaN samples are skipped.
/// The crossing must be unique.
pub fn inverse_interpolate(
    curve: &[f64],
    value: f64,
) -> std::result::Result<f64, InterpolationError> {
    let mut lags: Vec<f64> = Vec::new();
    for (i, w) in curve.windows(2).enumerate() {
        let (a, b) = (w[0], w[1]);
        if a.is_nan() || b.is_nan() || !(a.min(b) <= value && value <= a.max(b)) {
            continue;
        }
        if a == b {
            // flat at `value`: the whole segment matches
            lags.push(i as f64);
            lags.push((i + 1) as f64);
            continue;
        }
        lags.push(i as f64 + (value - a) / (b - a));
    }
    lags.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
    match lags.len() {
        0 => Err(InterpolationError::NoCrossing(value)),
        1 => Ok(lags[0]),
        count => Err(InterpolationError::AmbiguousCrossing { value, count, lags }),
    }
}

/// Linear interpolation of `(xp, fp)` at `x`
///
/// `xp` must be increasing, `x` outside `xp` range gets the first or the last
/// `fp` value.
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return vec![f64::NAN; x.len()];
    }
    let (xp, fp) = (&xp[..n], &fp[..n]);
    x.iter()
        .map(|&x| {
            if x <= xp[0] {
                return fp[0];
            }
            if x >= xp[n - 1] {
                return fp[n - 1];
            }
            let i = xp.partition_point(|&xp| xp <= x) - 1;
            let t = (x - xp[i]) / (xp[i + 1] - xp[i]);
            fp[i] + t * (fp[i + 1] - fp[i])
        })
        .collect()
}

/// Mirrors a one-sided curve around its first sample
///
/// `[c0, c1, c2]` becomes `[c2, c1, c0, c1, c2]`.
pub fn symmetrize(curve: &[f64]) -> Vec<f64> {
    curve
        .iter()
        .rev()
        .chain(curve.iter().skip(1))
        .cloned()
        .collect()
}

/// Remaps `curve` sampled at lags `0..n` onto the lags `0..n` scaled by `k`
pub fn remap(curve: &[f64], k: f64) -> Vec<f64> {
    let lags: Vec<f64> = (0..curve.len()).map(|i| i as f64).collect();
    let scaled_lags: Vec<f64> = lags.iter().map(|x| x * k).collect();
    interp(&lags, &scaled_lags, curve)
}

/// Calibration of one band of the correlation kernel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandCalibration {
    pub band: Band,
    /// correlation of the reference spectrum convolved with the band kernel
    pub reference: Vec<f64>,
    /// half maximum lag of the band kernel
    pub observed_half_maximum: f64,
    /// half maximum lag of the reference correlation
    pub reference_half_maximum: f64,
    /// scale factor
    pub k_factor: f64,
    /// the one-sided band kernel remapped with `k_factor`
    pub shifted: Vec<f64>,
}
impl BandCalibration {
    /// Calibrates the correlation `curve` of a `band` against the reference spectrum
    pub fn new(band: Band, curve: &[f64], spectrum: &ReferenceSpectrum) -> Result<Self> {
        let width = curve.len();
        let kernel = nan_to_num(symmetrize(curve));
        let reference = spectrum.get_correlation(&kernel, width);
        let half_maximum = |values: &[f64], which: Curve| {
            inverse_interpolate(values, HALF_MAXIMUM).map_err(|source| {
                CalibrationError::HalfMaximum {
                    band,
                    curve: which,
                    values: values.to_vec(),
                    source,
                }
            })
        };
        let observed_half_maximum = half_maximum(curve, Curve::Observed)?;
        let reference_half_maximum = half_maximum(reference.as_slice(), Curve::Reference)?;
        let k_factor = observed_half_maximum / reference_half_maximum;
        if !(k_factor.is_finite() && k_factor > 0f64) {
            return Err(CalibrationError::ScaleFactor { band, k: k_factor });
        }
        log::debug!(
            "{band} band: half maximum (observed: {observed_half_maximum:.3}, reference: {reference_half_maximum:.3}) ; k = {k_factor:.4}"
        );
        Ok(Self {
            band,
            shifted: remap(curve, k_factor),
            reference,
            observed_half_maximum,
            reference_half_maximum,
            k_factor,
        })
    }
    /// The band contribution to the LSF
    pub fn lsf(&self) -> Vec<f64> {
        symmetrize(&self.shifted)
    }
}

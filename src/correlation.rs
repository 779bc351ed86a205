//! Spectral autocorrelation
//!
//! Pearson product-moment correlation of a spectrum with itself shifted by
//! `0..width` channels.

/// Pearson product-moment correlation coefficient of `x` and `y`
///
/// Both slices must have the same length.
/// Returns NaN if either slice is empty or has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return f64::NAN;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mean = |v: &[f64]| v.iter().sum::<f64>() / n as f64;
    let (x_mean, y_mean) = (mean(x), mean(y));
    let (sxy, sxx, syy) = x.iter().zip(y).fold(
        (0f64, 0f64, 0f64),
        |(sxy, sxx, syy), (&x, &y)| {
            let (dx, dy) = (x - x_mean, y - y_mean);
            (sxy + dx * dy, sxx + dx * dx, syy + dy * dy)
        },
    );
    (sxy / (sxx * syy).sqrt()).clamp(-1f64, 1f64)
}

/// Replaces NaN and infinite samples with 0
pub fn nan_to_num<I>(spectrum: I) -> Vec<f64>
where
    I: IntoIterator<Item = f64>,
{
    spectrum
        .into_iter()
        .map(|x| if x.is_finite() { x } else { 0f64 })
        .collect()
}

/// Autocorrelation of a spectrum at lags `0..width`
///
/// The lag 0 coefficient is 1 by definition, the coefficient at lag `i`
/// correlates the spectrum truncated by `i` samples at the end with the
/// spectrum truncated by `i` samples at the start.
/// Non-finite samples are set to 0 first.
/// A spectrum not longer than the lag or with a constant overlap gives NaN at
/// that lag.
pub fn autocorrelation(spectrum: &[f64], width: usize) -> Vec<f64> {
    autocorrelation_of(nan_to_num(spectrum.iter().cloned()), width)
}

pub(crate) fn autocorrelation_of(spectrum: Vec<f64>, width: usize) -> Vec<f64> {
    let n = spectrum.len();
    (0..width)
        .map(|lag| match lag {
            0 => 1f64,
            lag if lag >= n => f64::NAN,
            lag => pearson(&spectrum[..n - lag], &spectrum[lag..]),
        })
        .collect()
}

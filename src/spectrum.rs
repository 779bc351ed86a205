//! Reference spectrum model
//!
//! A synthetic, uncorrelated, flux drawn from a normal distribution. Once
//! convolved with a kernel, its autocorrelation gives the correlation a
//! spectrum would have if it had been blurred by that kernel.

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal, NormalError};

use crate::correlation::autocorrelation_of;

/// Default number of channels of the reference spectrum
pub const TOTAL_CHANNELS: usize = 27_583;

#[derive(Debug, thiserror::Error)]
pub enum SpectrumError {
    #[error("invalid normal distribution (mu: {mu}, sigma: {sigma})")]
    Normal {
        mu: f64,
        sigma: f64,
        #[source]
        source: NormalError,
    },
    #[error("the reference spectrum has no channels")]
    Empty,
}
type Result<T> = std::result::Result<T, SpectrumError>;

/// Synthetic spectrum
#[derive(Debug, Clone)]
pub struct ReferenceSpectrum {
    flux: Vec<f64>,
}
impl ReferenceSpectrum {
    /// Draws `total_channels` flux samples from `Normal(mu, sigma)`
    pub fn new<R: Rng>(total_channels: usize, mu: f64, sigma: f64, rng: &mut R) -> Result<Self> {
        if total_channels == 0 {
            return Err(SpectrumError::Empty);
        }
        let invalid = |source| SpectrumError::Normal { mu, sigma, source };
        if !(sigma.is_finite() && sigma > 0f64) {
            return Err(invalid(NormalError::BadVariance));
        }
        let normal = Normal::new(mu, sigma).map_err(invalid)?;
        Ok(Self {
            flux: normal.sample_iter(rng).take(total_channels).collect(),
        })
    }
    /// Standard normal spectrum seeded with `seed`
    pub fn seeded(total_channels: usize, seed: u64) -> Result<Self> {
        Self::new(
            total_channels,
            0f64,
            1f64,
            &mut StdRng::seed_from_u64(seed),
        )
    }
    /// Number of channels
    pub fn len(&self) -> usize {
        self.flux.len()
    }
    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }
    /// The synthetic flux
    pub fn flux(&self) -> &[f64] {
        &self.flux
    }
    /// Convolves the flux with `kernel`
    ///
    /// The output has the length of the longest of the flux and the kernel,
    /// it is centered with respect to the full convolution.
    pub fn convolve(&self, kernel: &[f64]) -> Vec<f64> {
        let (long, short) = if self.flux.len() >= kernel.len() {
            (self.flux.as_slice(), kernel)
        } else {
            (kernel, self.flux.as_slice())
        };
        if short.is_empty() {
            return vec![];
        }
        let n = long.len();
        let m = short.len();
        let start = (m - 1) / 2;
        (start..start + n)
            .map(|k| {
                // full[k] = sum_j long[k - j] * short[j], 0 <= k - j < n
                let j_min = (k + 1).saturating_sub(n);
                let j_max = k.min(m - 1);
                (j_min..=j_max).map(|j| long[k - j] * short[j]).sum()
            })
            .collect()
    }
    /// Autocorrelation at lags `0..n_channels` of the flux convolved with `kernel`
    pub fn get_correlation(&self, kernel: &[f64], n_channels: usize) -> Vec<f64> {
        autocorrelation_of(self.convolve(kernel), n_channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_distribution() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            ReferenceSpectrum::new(100, 0., -1., &mut rng),
            Err(SpectrumError::Normal { .. })
        ));
        for sigma in [0., f64::NAN, f64::INFINITY] {
            assert!(matches!(
                ReferenceSpectrum::new(100, 0., sigma, &mut rng),
                Err(SpectrumError::Normal {
                    source: NormalError::BadVariance,
                    ..
                })
            ));
        }
        assert!(matches!(
            ReferenceSpectrum::new(0, 0., 1., &mut rng),
            Err(SpectrumError::Empty)
        ));
    }

    #[test]
    fn same_convolution() {
        let spectrum = ReferenceSpectrum {
            flux: vec![1., 2., 3., 4., 5.],
        };
        // numpy.convolve([1,2,3,4,5], [1,1,1], 'same')
        assert_eq!(spectrum.convolve(&[1., 1., 1.]), vec![3., 6., 9., 12., 9.]);
        // numpy.convolve([1,2,3,4,5], [1,0,0,0], 'same')
        assert_eq!(spectrum.convolve(&[1., 0., 0., 0.]), vec![2., 3., 4., 5., 0.]);
        assert_eq!(spectrum.convolve(&[2.]), vec![2., 4., 6., 8., 10.]);
        // numpy.convolve([1,2,3,4,5], [1,2,3,4,5,6,7], 'same')
        assert_eq!(
            spectrum.convolve(&[1., 2., 3., 4., 5., 6., 7.]),
            vec![10., 20., 35., 50., 65., 72., 70.]
        );
    }

    #[test]
    fn impulse_correlation_decays() -> std::result::Result<(), Box<dyn std::error::Error>> {
        for seed in 0..4 {
            let spectrum = ReferenceSpectrum::seeded(20_000, seed)?;
            let corr = spectrum.get_correlation(&[0., 0., 1., 0., 0.], 8);
            assert_eq!(corr.len(), 8);
            assert_eq!(corr[0], 1f64);
            assert!(
                corr[1..].iter().all(|c| c.abs() < 0.05),
                "seed {seed}: {corr:?}"
            );
        }
        Ok(())
    }

    #[test]
    fn boxcar_correlation() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let spectrum = ReferenceSpectrum::seeded(TOTAL_CHANNELS, 11)?;
        let corr = spectrum.get_correlation(&[1., 1., 1.], 5);
        let expected = [1., 2. / 3., 1. / 3., 0., 0.];
        corr.iter()
            .zip(expected)
            .for_each(|(c, e)| assert!((c - e).abs() < 0.05, "{corr:?}"));
        Ok(())
    }

    #[test]
    fn reproducible() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let a = ReferenceSpectrum::seeded(1_000, 5)?;
        let b = ReferenceSpectrum::seeded(1_000, 5)?;
        assert_eq!(a.flux(), b.flux());
        Ok(())
    }
}

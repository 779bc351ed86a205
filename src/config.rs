use crate::spectrum::TOTAL_CHANNELS;

/// LSF estimation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub(crate) used_channels: usize,
    pub(crate) extension: usize,
    pub(crate) total_channels: usize,
    pub(crate) mu: f64,
    pub(crate) sigma: f64,
    pub(crate) seed: Option<u64>,
    pub(crate) progress: bool,
    pub(crate) precision: usize,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            used_channels: 8,
            extension: 0,
            total_channels: TOTAL_CHANNELS,
            mu: 0f64,
            sigma: 1f64,
            seed: None,
            progress: false,
            precision: 3,
        }
    }
}
impl Config {
    /// Number of correlation lags, the LSF has `2 * used_channels - 1` channels
    pub fn used_channels(self, used_channels: usize) -> Self {
        Self {
            used_channels,
            ..self
        }
    }
    /// Index of the array in a multi-array file
    pub fn extension(self, extension: usize) -> Self {
        Self { extension, ..self }
    }
    /// Number of channels of the reference spectrum
    pub fn total_channels(self, total_channels: usize) -> Self {
        Self {
            total_channels,
            ..self
        }
    }
    /// Mean and standard deviation of the reference spectrum flux
    pub fn normal(self, mu: f64, sigma: f64) -> Self {
        Self { mu, sigma, ..self }
    }
    /// Seed of the reference spectrum random generator
    pub fn seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }
    /// Displays a progress bar while correlating the pixels
    pub fn progress(self) -> Self {
        Self {
            progress: true,
            ..self
        }
    }
    /// Number of decimals in the LSF table
    pub fn precision(self, precision: usize) -> Self {
        Self { precision, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let config = Config::default()
            .used_channels(4)
            .extension(1)
            .normal(1., 2.)
            .seed(7);
        assert_eq!(config.used_channels, 4);
        assert_eq!(config.extension, 1);
        assert_eq!((config.mu, config.sigma), (1., 2.));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.total_channels, 27_583);
        assert!(!config.progress);
    }
}

//! Spectral data cube
//!
//! The cube goes through 3 states:
//! [Uninitialized](State::Uninitialized) → [KernelComputed](State::KernelComputed)
//! → [Calibrated](State::Calibrated).
//! The correlation kernel is only available once computed and the LSF once
//! the kernel has been calibrated.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Instant,
};

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use ndarray::{Array, ArrayD, ArrayViewD, Axis, Dimension};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use strum::IntoEnumIterator;

use crate::{
    calibration::{BandCalibration, CalibrationError},
    config::Config,
    correlation::{autocorrelation_of, nan_to_num},
    kernel::{AggregateKernel, Band},
    profile::{LsfProfile, ProfileError},
    spectrum::{ReferenceSpectrum, SpectrumError},
};

/// Cube estimation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Uninitialized,
    KernelComputed,
    Calibrated,
}
impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Uninitialized => write!(f, "uninitialized"),
            State::KernelComputed => write!(f, "kernel computed"),
            State::Calibrated => write!(f, "calibrated"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CubeError {
    #[error("a cube must have at least 3 dimensions, found shape {0:?}")]
    Dimensions(Vec<usize>),
    #[error("a cube must have a single spectral axis, found leading axes {0:?}")]
    SpectralAxis(Vec<usize>),
    #[error("at least 1 channel must be used")]
    UsedChannels,
    #[error("the cube must be {required} but it is {current}")]
    NotReady { required: State, current: State },
    #[error("failed to create the reference spectrum")]
    Spectrum(#[from] SpectrumError),
    #[error("failed to calibrate the cube kernel")]
    Calibration(#[from] CalibrationError),
    #[error("failed to build the LSF")]
    Profile(#[from] ProfileError),
}
type Result<T> = std::result::Result<T, CubeError>;

/// Calibrated kernel and the resulting LSF
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    bands: Vec<BandCalibration>,
    lsf: LsfProfile,
}
impl Calibration {
    /// Calibrates all the bands of the kernel with the same reference spectrum
    pub fn new(kernel: &AggregateKernel, spectrum: &ReferenceSpectrum) -> Result<Self> {
        let [lower, center, upper] = [Band::Lower, Band::Center, Band::Upper]
            .map(|band| BandCalibration::new(band, kernel.band(band), spectrum));
        let (lower, center, upper) = (lower?, center?, upper?);
        let lsf = LsfProfile::from_bands(center.lsf(), &lower.lsf(), &upper.lsf())?;
        let bands = vec![lower, center, upper];
        Ok(Self { bands, lsf })
    }
    /// Calibration of a given band
    pub fn band(&self, band: Band) -> Option<&BandCalibration> {
        self.bands.iter().find(|b| b.band == band)
    }
    /// Scale factor of a given band
    pub fn k_factor(&self, band: Band) -> Option<f64> {
        self.band(band).map(|b| b.k_factor)
    }
    pub fn lsf(&self) -> &LsfProfile {
        &self.lsf
    }
}

enum Stage {
    Uninitialized,
    KernelComputed(AggregateKernel),
    Calibrated(AggregateKernel, Calibration),
}

/// Spectral data cube
///
/// The 2 last axes are the spatial axes (y,x), the spectrum is along the only
/// leading axis which length is greater than 1.
pub struct Cube {
    data: ArrayD<f64>,
    spectral_axis: usize,
    config: Config,
    stage: Stage,
}
impl Cube {
    /// Creates a new cube from an array of at least 3 dimensions
    pub fn new<D: Dimension>(data: Array<f64, D>, config: Config) -> Result<Self> {
        let data = data.into_dyn();
        let shape = data.shape().to_vec();
        if shape.len() < 3 {
            return Err(CubeError::Dimensions(shape));
        }
        if config.used_channels == 0 {
            return Err(CubeError::UsedChannels);
        }
        let leading = &shape[..shape.len() - 2];
        let spectral_axes: Vec<usize> = leading
            .iter()
            .enumerate()
            .filter(|(_, n)| **n > 1)
            .map(|(i, _)| i)
            .collect();
        let spectral_axis = match spectral_axes.as_slice() {
            &[axis] => axis,
            _ => return Err(CubeError::SpectralAxis(leading.to_vec())),
        };
        if shape[spectral_axis] <= config.used_channels {
            log::warn!(
                "{} channels is too short for {} correlation lags",
                shape[spectral_axis],
                config.used_channels
            );
        }
        Ok(Self {
            data,
            spectral_axis,
            config,
            stage: Stage::Uninitialized,
        })
    }
    /// The cube shape
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
    /// Index of the spectral axis
    pub fn spectral_axis(&self) -> usize {
        self.spectral_axis
    }
    /// Number of spectral channels
    pub fn n_channel(&self) -> usize {
        self.data.shape()[self.spectral_axis]
    }
    /// Number of pixels along the (y,x) axes
    pub fn spatial_shape(&self) -> (usize, usize) {
        let n = self.data.ndim();
        (self.data.shape()[n - 2], self.data.shape()[n - 1])
    }
    pub fn state(&self) -> State {
        match self.stage {
            Stage::Uninitialized => State::Uninitialized,
            Stage::KernelComputed(_) => State::KernelComputed,
            Stage::Calibrated(..) => State::Calibrated,
        }
    }
    fn not_ready(&self, required: State) -> CubeError {
        CubeError::NotReady {
            required,
            current: self.state(),
        }
    }
    /// The spectrum at pixel (y,x)
    pub fn spectrum(&self, y: usize, x: usize) -> Vec<f64> {
        pixel(self.data.view(), y, x).iter().cloned().collect()
    }
    /// Estimates the LSF
    ///
    /// Computes the correlation kernel and calibrates it
    pub fn get_lsf(&mut self) -> Result<&LsfProfile> {
        self.compute_kernel()?;
        self.calibrate()
    }
    /// Computes the correlation kernel
    ///
    /// The spectrum of each pixel is correlated in parallel, the kernel bands
    /// are the 16%, 50% and 84% percentiles of the correlations.
    pub fn compute_kernel(&mut self) -> Result<&AggregateKernel> {
        let (ny, nx) = self.spatial_shape();
        let n_pixel = ny * nx;
        let width = self.config.used_channels;
        log::info!("Correlating {} pixels over {} channels...", n_pixel, width);
        let now = Instant::now();
        let pb = if self.config.progress {
            let pb = ProgressBar::new(n_pixel as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} pixels [{eta}]") {
                pb.set_style(style);
            }
            pb
        } else {
            ProgressBar::hidden()
        };
        let data = self.data.view();
        let curves: Vec<Vec<f64>> = (0..n_pixel)
            .into_par_iter()
            .progress_with(pb)
            .map(|i| {
                let spectrum = nan_to_num(pixel(data.view(), i / nx, i % nx).iter().cloned());
                autocorrelation_of(spectrum, width)
            })
            .collect();
        let kernel = AggregateKernel::from_curves(&curves, width);
        log::info!("... kernel computed in {}ms", now.elapsed().as_millis());
        self.stage = Stage::KernelComputed(kernel);
        self.kernel()
    }
    /// Calibrates the correlation kernel and derives the LSF
    pub fn calibrate(&mut self) -> Result<&LsfProfile> {
        let kernel = self.kernel()?.clone();
        let now = Instant::now();
        let spectrum = self.reference_spectrum()?;
        let calibration = Calibration::new(&kernel, &spectrum)?;
        log::info!(
            "... kernel calibrated in {}ms (k = {:.4})",
            now.elapsed().as_millis(),
            calibration.k_factor(Band::Center).unwrap_or(f64::NAN)
        );
        self.stage = Stage::Calibrated(kernel, calibration);
        self.lsf()
    }
    fn reference_spectrum(&self) -> Result<ReferenceSpectrum> {
        let Config {
            total_channels,
            mu,
            sigma,
            seed,
            ..
        } = self.config;
        let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Ok(ReferenceSpectrum::new(total_channels, mu, sigma, &mut rng)?)
    }
    /// The correlation kernel
    pub fn kernel(&self) -> Result<&AggregateKernel> {
        match &self.stage {
            Stage::KernelComputed(kernel) | Stage::Calibrated(kernel, _) => Ok(kernel),
            Stage::Uninitialized => Err(self.not_ready(State::KernelComputed)),
        }
    }
    /// The kernel calibration
    pub fn calibration(&self) -> Result<&Calibration> {
        match &self.stage {
            Stage::Calibrated(_, calibration) => Ok(calibration),
            _ => Err(self.not_ready(State::Calibrated)),
        }
    }
    /// The LSF
    pub fn lsf(&self) -> Result<&LsfProfile> {
        self.calibration().map(|c| c.lsf())
    }
    /// The scale factor of the median kernel
    pub fn k_factor(&self) -> Result<f64> {
        self.calibration()
            .map(|c| c.k_factor(Band::Center).unwrap_or(f64::NAN))
    }
    /// Saves the LSF into "`base`_LSF.dat"
    pub fn save_lsf<P: AsRef<Path>>(&self, base: P) -> Result<PathBuf> {
        Ok(self.lsf()?.to_dat(base, self.config.precision)?)
    }
    /// Prints the kernel, the scale factors and the LSF
    pub fn summary(&self) {
        println!("CUBE SUMMARY:");
        println!(" - shape: {:?}", self.shape());
        println!(
            " - spectral axis: #{} ({} channels)",
            self.spectral_axis,
            self.n_channel()
        );
        println!(" - state: {}", self.state());
        if let Ok(kernel) = self.kernel() {
            println!(" - correlation kernel:");
            println!(
                "    {:>4}: {:>8} {:>8} {:>8}",
                "LAG", "16%", "50%", "84%"
            );
            for (lag, ((l, c), u)) in kernel
                .lower
                .iter()
                .zip(&kernel.center)
                .zip(&kernel.upper)
                .enumerate()
            {
                println!("    {:>4}: {:>8.3} {:>8.3} {:>8.3}", lag, l, c, u);
            }
        }
        if let Ok(calibration) = self.calibration() {
            println!(" - scale factors:");
            for band in Band::iter() {
                if let Some(k) = calibration.k_factor(band) {
                    println!("    {:16}: {:>8.4}", band.to_string(), k);
                }
            }
            println!(" - LSF:");
            println!(
                "    {:>4}: {:>8} {:>8} {:>8}",
                "CH", "LSF", "-ERR", "+ERR"
            );
            for (ch, c, l, u) in calibration.lsf().rows() {
                println!("    {:>4}: {:>8.3} {:>8.3} {:>8.3}", ch, c, l, u);
            }
        }
    }
}

/// The leading axes of the cube at pixel (y,x)
fn pixel(data: ArrayViewD<'_, f64>, y: usize, x: usize) -> ArrayViewD<'_, f64> {
    let n = data.ndim();
    data.index_axis_move(Axis(n - 1), x)
        .index_axis_move(Axis(n - 2), y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};
    use std::error::Error;

    const TRACE: [f64; 16] = [
        0.3, -1.2, 0.8, 0.1, -0.5, 1.4, -0.9, 0.2, 0.6, -1.1, 0.4, -0.2, 1.0, -0.7, 0.05, -0.3,
    ];

    fn noise_cube() -> Array3<f64> {
        Array3::from_shape_fn((16, 4, 4), |(k, _, _)| TRACE[k])
    }

    #[test]
    fn cube_shape() {
        assert!(matches!(
            Cube::new(ndarray::Array2::<f64>::zeros((4, 4)), Config::default()),
            Err(CubeError::Dimensions(_))
        ));
        assert!(matches!(
            Cube::new(Array4::<f64>::zeros((2, 16, 4, 4)), Config::default()),
            Err(CubeError::SpectralAxis(_))
        ));
        assert!(matches!(
            Cube::new(Array4::<f64>::zeros((1, 1, 4, 4)), Config::default()),
            Err(CubeError::SpectralAxis(_))
        ));
        assert!(matches!(
            Cube::new(noise_cube(), Config::default().used_channels(0)),
            Err(CubeError::UsedChannels)
        ));
        let cube = Cube::new(Array4::<f64>::zeros((1, 16, 4, 3)), Config::default()).unwrap();
        assert_eq!(cube.spectral_axis(), 1);
        assert_eq!(cube.n_channel(), 16);
        assert_eq!(cube.spatial_shape(), (4, 3));
        let cube = Cube::new(Array4::<f64>::zeros((16, 1, 4, 3)), Config::default()).unwrap();
        assert_eq!(cube.spectral_axis(), 0);
    }

    #[test]
    fn pixel_spectrum() -> std::result::Result<(), Box<dyn Error>> {
        let data =
            Array4::from_shape_fn((1, 16, 2, 3), |(_, k, y, x)| (k * 100 + y * 10 + x) as f64);
        let cube = Cube::new(data, Config::default())?;
        let spectrum = cube.spectrum(1, 2);
        assert_eq!(spectrum.len(), 16);
        assert_eq!(spectrum[0], 12.);
        assert_eq!(spectrum[15], 1512.);
        Ok(())
    }

    #[test]
    fn not_ready() -> std::result::Result<(), Box<dyn Error>> {
        let mut cube = Cube::new(noise_cube(), Config::default().used_channels(4))?;
        assert_eq!(cube.state(), State::Uninitialized);
        assert!(matches!(
            cube.kernel(),
            Err(CubeError::NotReady {
                required: State::KernelComputed,
                current: State::Uninitialized
            })
        ));
        assert!(matches!(
            cube.lsf(),
            Err(CubeError::NotReady {
                required: State::Calibrated,
                ..
            })
        ));
        assert!(matches!(
            cube.calibrate(),
            Err(CubeError::NotReady {
                required: State::KernelComputed,
                ..
            })
        ));
        assert!(matches!(
            cube.save_lsf(std::env::temp_dir().join("not-ready")),
            Err(CubeError::NotReady { .. })
        ));
        cube.compute_kernel()?;
        assert_eq!(cube.state(), State::KernelComputed);
        assert!(matches!(
            cube.k_factor(),
            Err(CubeError::NotReady {
                required: State::Calibrated,
                current: State::KernelComputed
            })
        ));
        Ok(())
    }

    #[test]
    fn pure_noise_cube() -> std::result::Result<(), Box<dyn Error>> {
        let mut cube = Cube::new(noise_cube(), Config::default().used_channels(4).seed(0))?;
        let lsf = cube.get_lsf()?;
        assert_eq!(lsf.len(), 7);
        assert_eq!(lsf.channels(), &[-3, -2, -1, 0, 1, 2, 3]);
        assert_eq!(lsf.lower_error().len(), 7);
        assert_eq!(lsf.upper_error().len(), 7);
        let peak = lsf
            .center()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| lsf.channels()[i]);
        assert_eq!(peak, Some(0));
        assert!(lsf
            .lower_error()
            .iter()
            .chain(lsf.upper_error())
            .all(|e| *e >= 0.));
        assert!(lsf.center().iter().eq(lsf.center().iter().rev()));
        assert_eq!(cube.state(), State::Calibrated);
        assert!((cube.k_factor()? - 1.04).abs() < 0.05);
        Ok(())
    }

    #[test]
    fn calibration_bands() -> std::result::Result<(), Box<dyn Error>> {
        let mut cube = Cube::new(noise_cube(), Config::default().used_channels(4).seed(2))?;
        cube.get_lsf()?;
        let calibration = cube.calibration()?;
        for band in Band::iter() {
            let band_calibration = calibration.band(band).ok_or("missing band")?;
            assert_eq!(band_calibration.band, band);
            assert_eq!(band_calibration.lsf().len(), 7);
        }
        let center = calibration.band(Band::Center).ok_or("missing band")?;
        assert_eq!(calibration.lsf().center(), center.lsf().as_slice());
        Ok(())
    }

    #[test]
    fn idempotent() -> std::result::Result<(), Box<dyn Error>> {
        let config = Config::default().used_channels(4).seed(3);
        let mut cube = Cube::new(noise_cube(), config.clone())?;
        let first = cube.get_lsf()?.clone();
        let second = cube.get_lsf()?.clone();
        assert_eq!(first, second);
        let mut other = Cube::new(noise_cube(), config)?;
        assert_eq!(&first, other.get_lsf()?);
        Ok(())
    }

    #[test]
    fn singleton_leading_axis() -> std::result::Result<(), Box<dyn Error>> {
        let config = Config::default().used_channels(4).seed(1);
        let mut cube = Cube::new(noise_cube(), config.clone())?;
        let data = noise_cube().insert_axis(Axis(0));
        let mut cube_4d = Cube::new(data, config)?;
        assert_eq!(cube.compute_kernel()?, cube_4d.compute_kernel()?);
        Ok(())
    }

    #[test]
    fn non_finite_pixels() -> std::result::Result<(), Box<dyn Error>> {
        let mut data = noise_cube();
        data[[3, 0, 0]] = f64::NAN;
        data.slice_mut(ndarray::s![.., 1, 1]).fill(f64::NAN);
        let mut cube = Cube::new(data, Config::default().used_channels(4).seed(1))?;
        let kernel = cube.compute_kernel()?;
        assert!(kernel.center.iter().all(|c| c.is_finite()));
        assert_eq!(kernel.lower[0], 1.);
        Ok(())
    }

    #[test]
    fn nan_lags_cube() -> std::result::Result<(), Box<dyn Error>> {
        // 3 channels: lag 2 has a single sample and lag 3 none
        let data = Array3::from_shape_fn((3, 2, 2), |(k, y, x)| {
            let step = (1 + y * 2 + x) as f64;
            if k == 1 {
                step
            } else {
                0.
            }
        });
        let mut cube = Cube::new(data, Config::default().used_channels(4).seed(0))?;
        let kernel = cube.compute_kernel()?;
        assert!(kernel.center[2..].iter().all(|c| c.is_nan()));
        assert!((kernel.center[1] + 1.).abs() < 1e-12);
        let lsf = cube.calibrate()?;
        assert_eq!(lsf.len(), 7);
        assert_eq!(lsf.center()[3], 1.);
        assert_eq!(cube.state(), State::Calibrated);
        let k = cube.k_factor()?;
        assert!(k > 0.7 && k < 0.95, "k = {k}");
        Ok(())
    }

    #[test]
    fn constant_cube_fails_calibration() -> std::result::Result<(), Box<dyn Error>> {
        let mut cube = Cube::new(
            Array3::<f64>::ones((16, 2, 2)),
            Config::default().used_channels(4).seed(1),
        )?;
        let kernel = cube.compute_kernel()?;
        assert!(kernel.center[1..].iter().all(|c| c.is_nan()));
        let err = cube.calibrate().unwrap_err();
        assert!(matches!(
            err,
            CubeError::Calibration(CalibrationError::HalfMaximum {
                band: Band::Lower,
                ..
            })
        ));
        assert_eq!(cube.state(), State::KernelComputed);
        Ok(())
    }

    #[test]
    fn save() -> std::result::Result<(), Box<dyn Error>> {
        let mut cube = Cube::new(noise_cube(), Config::default().used_channels(4).seed(0))?;
        cube.get_lsf()?;
        let base = std::env::temp_dir().join(format!("lsf-cube-{}", std::process::id()));
        let path = cube.save_lsf(&base)?;
        let lsf = LsfProfile::from_dat(&path)?;
        std::fs::remove_file(&path)?;
        assert_eq!(lsf.len(), 7);
        assert_eq!(lsf.center()[3], 1.);
        Ok(())
    }
}

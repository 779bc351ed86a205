use crate::{
    calibration::CalibrationError, cube::CubeError, loader::LoaderError, profile::ProfileError,
    spectrum::SpectrumError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `cube` module")]
    Cube(#[from] CubeError),
    #[error("Error in the `loader` module")]
    Loader(#[from] LoaderError),
    #[error("Error in the `calibration` module")]
    Calibration(#[from] CalibrationError),
    #[error("Error in the `spectrum` module")]
    Spectrum(#[from] SpectrumError),
    #[error("Error in the `profile` module")]
    Profile(#[from] ProfileError),
}

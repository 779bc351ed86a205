//! Cube loader
//!
//! Loads a data cube from a NumPy `.npy` file or from one of the arrays of a
//! `.npz` archive.

use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
    time::Instant,
};

use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use npyz::{npz::NpzArchive, DType, NpyFile, Order, TypeChar};

use crate::{
    config::Config,
    cube::{Cube, CubeError},
};

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("failed to read the cube file {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("cube file {0:?} is neither a .npy nor a .npz file")]
    Format(PathBuf),
    #[error("extension #{extension} not found in {path:?} (arrays: {names:?})")]
    Extension {
        extension: usize,
        path: PathBuf,
        names: Vec<String>,
    },
    #[error("array {name:?} not found in {path:?}")]
    ArrayName { name: String, path: PathBuf },
    #[error("unsupported data type {0}, expected 32 or 64 bits floats")]
    DType(String),
    #[error("array data do not match the array shape")]
    Shape(#[from] ndarray::ShapeError),
    #[error("invalid cube")]
    Cube(#[from] CubeError),
}
type Result<T> = std::result::Result<T, LoaderError>;

/// Cube loader builder
#[derive(Debug, Clone)]
pub struct CubeLoader {
    path: PathBuf,
    array_name: Option<String>,
    config: Config,
}
impl Default for CubeLoader {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cube.npy"),
            array_name: None,
            config: Config::default(),
        }
    }
}
impl CubeLoader {
    /// Path to the cube file
    pub fn path<P: AsRef<Path>>(self, path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..self
        }
    }
    /// Selects the `.npz` archive array by name instead of by extension index
    pub fn array_name<S: Into<String>>(self, name: S) -> Self {
        Self {
            array_name: Some(name.into()),
            ..self
        }
    }
    /// Estimation parameters
    pub fn config(self, config: Config) -> Self {
        Self { config, ..self }
    }
    /// Index of the array in the `.npz` archive
    pub fn extension(self, extension: usize) -> Self {
        Self {
            config: self.config.extension(extension),
            ..self
        }
    }
    /// Reads the cube data
    pub fn load_array(&self) -> Result<ArrayD<f64>> {
        log::info!("Loading {:?}...", self.path);
        let now = Instant::now();
        let io_err = |e: io::Error| LoaderError::Io(e, self.path.clone());
        let data = match self.path.extension().and_then(|e| e.to_str()) {
            Some("npy") => {
                let extension = self.config.extension;
                if extension > 0 {
                    return Err(LoaderError::Extension {
                        extension,
                        path: self.path.clone(),
                        names: vec![],
                    });
                }
                let file = File::open(&self.path).map_err(io_err)?;
                let npy = NpyFile::new(BufReader::new(file)).map_err(io_err)?;
                into_array(npy).map_err(|e| e.with_path(&self.path))?
            }
            Some("npz") => {
                let mut npz = NpzArchive::open(&self.path).map_err(io_err)?;
                let name = match &self.array_name {
                    Some(name) => name.clone(),
                    None => {
                        let names = sorted_names(npz.array_names());
                        names.get(self.config.extension).cloned().ok_or_else(|| {
                            LoaderError::Extension {
                                extension: self.config.extension,
                                path: self.path.clone(),
                                names: names.clone(),
                            }
                        })?
                    }
                };
                let npy = npz
                    .by_name(&name)
                    .map_err(io_err)?
                    .ok_or_else(|| LoaderError::ArrayName {
                        name: name.clone(),
                        path: self.path.clone(),
                    })?;
                into_array(npy).map_err(|e| e.with_path(&self.path))?
            }
            _ => return Err(LoaderError::Format(self.path.clone())),
        };
        log::info!(
            "... loaded {:?} in {}ms",
            data.shape(),
            now.elapsed().as_millis()
        );
        Ok(data)
    }
    /// Loads the cube
    pub fn load(self) -> Result<Cube> {
        let data = self.load_array()?;
        Ok(Cube::new(data, self.config)?)
    }
}

impl LoaderError {
    fn with_path(self, path: &Path) -> Self {
        match self {
            LoaderError::Io(e, _) => LoaderError::Io(e, path.to_path_buf()),
            err => err,
        }
    }
}

/// Sorts the archive array names, trailing numbers compared as numbers
///
/// `np.savez` names its positional arrays `arr_0`, `arr_1`, ..., `arr_10`
fn sorted_names<'a, I: Iterator<Item = &'a str>>(names: I) -> Vec<String> {
    let mut names: Vec<String> = names.map(|name| name.to_string()).collect();
    names.sort_by_cached_key(|name| {
        let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
        let index = name[stem.len()..].parse::<u64>().ok();
        (stem.to_string(), index, name.clone())
    });
    names
}

/// Converts a NumPy array into a `f64` array
fn into_array<R: Read>(npy: NpyFile<R>) -> Result<ArrayD<f64>> {
    let shape: Vec<usize> = npy.shape().iter().map(|&n| n as usize).collect();
    let order = npy.order();
    let is_float = |ts: &npyz::TypeStr, size: u64| {
        matches!(ts.type_char(), TypeChar::Float) && ts.size_field() as u64 == size
    };
    let data: Vec<f64> = match npy.dtype() {
        DType::Plain(ts) if is_float(&ts, 8) => npy
            .into_vec::<f64>()
            .map_err(|e| LoaderError::Io(e, PathBuf::new()))?,
        DType::Plain(ts) if is_float(&ts, 4) => npy
            .into_vec::<f32>()
            .map_err(|e| LoaderError::Io(e, PathBuf::new()))?
            .into_iter()
            .map(f64::from)
            .collect(),
        dtype => return Err(LoaderError::DType(format!("{:?}", dtype))),
    };
    let array = match order {
        Order::C => ArrayD::from_shape_vec(IxDyn(&shape), data)?,
        Order::Fortran => ArrayD::from_shape_vec(IxDyn(&shape).f(), data)?,
    };
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use npyz::{npz::NpzWriter, WriterBuilder};
    use std::{env, error::Error, fs};

    fn write_npy(
        path: &Path,
        shape: &[u64],
        data: &[f64],
    ) -> std::result::Result<(), Box<dyn Error>> {
        let file = File::create(path)?;
        let mut writer = npyz::WriteOptions::new()
            .default_dtype()
            .shape(shape)
            .writer(file)
            .begin_nd()?;
        writer.extend(data.iter().cloned())?;
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn load_npy() -> std::result::Result<(), Box<dyn Error>> {
        let path = env::temp_dir().join(format!("lsf-loader-{}.npy", std::process::id()));
        let data: Vec<f64> = (0..16 * 2 * 3).map(|i| i as f64).collect();
        write_npy(&path, &[16, 2, 3], &data)?;
        let cube = CubeLoader::default()
            .path(&path)
            .config(Config::default().used_channels(4))
            .load()?;
        fs::remove_file(&path)?;
        assert_eq!(cube.shape(), &[16, 2, 3]);
        assert_eq!(cube.spectral_axis(), 0);
        let spectrum = cube.spectrum(1, 2);
        assert_eq!(spectrum[0], 5.);
        assert_eq!(spectrum[1], 11.);
        Ok(())
    }

    fn write_npz(
        path: &Path,
        arrays: &[(&str, &[u64], &[f64])],
    ) -> std::result::Result<(), Box<dyn Error>> {
        let mut npz = NpzWriter::create(path)?;
        for (name, shape, data) in arrays {
            let mut writer = npz
                .array(name, Default::default())?
                .default_dtype()
                .shape(shape)
                .begin_nd()?;
            writer.extend(data.iter().cloned())?;
            writer.finish()?;
        }
        Ok(())
    }

    #[test]
    fn load_npz() -> std::result::Result<(), Box<dyn Error>> {
        let path = env::temp_dir().join(format!("lsf-loader-{}.npz", std::process::id()));
        let first: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let second: Vec<f64> = (0..6 * 2 * 2).map(|i| -(i as f64)).collect();
        write_npz(
            &path,
            &[
                ("arr_0", &[8u64, 1, 1][..], first.as_slice()),
                ("arr_1", &[6u64, 2, 2][..], second.as_slice()),
            ],
        )?;
        let config = Config::default().used_channels(2);

        let cube = CubeLoader::default()
            .path(&path)
            .config(config.clone())
            .extension(1)
            .load();
        let by_name = CubeLoader::default()
            .path(&path)
            .config(config.clone())
            .array_name("arr_0")
            .load();
        let out_of_range = CubeLoader::default().path(&path).extension(2).load();
        let unknown = CubeLoader::default()
            .path(&path)
            .array_name("flux")
            .load();
        fs::remove_file(&path)?;

        let cube = cube?;
        assert_eq!(cube.shape(), &[6, 2, 2]);
        assert_eq!(cube.spectrum(0, 1), vec![-1., -5., -9., -13., -17., -21.]);
        let cube = by_name?;
        assert_eq!(cube.shape(), &[8, 1, 1]);
        assert_eq!(cube.spectrum(0, 0), first);
        match out_of_range {
            Err(LoaderError::Extension {
                extension, names, ..
            }) => {
                assert_eq!(extension, 2);
                assert_eq!(names, vec!["arr_0".to_string(), "arr_1".to_string()]);
            }
            other => panic!("expected an extension error, found {:?}", other.err()),
        }
        assert!(matches!(unknown, Err(LoaderError::ArrayName { .. })));
        Ok(())
    }

    #[test]
    fn array_name_order() {
        let names = ["arr_10", "arr_2", "arr_0", "arr_1"];
        assert_eq!(
            sorted_names(names.iter().cloned()),
            vec!["arr_0", "arr_1", "arr_2", "arr_10"]
        );
    }

    #[test]
    fn npy_extension() -> std::result::Result<(), Box<dyn Error>> {
        let path = env::temp_dir().join(format!("lsf-loader-ext-{}.npy", std::process::id()));
        write_npy(&path, &[4, 1, 1], &[1., 2., 3., 4.])?;
        let result = CubeLoader::default().path(&path).extension(1).load();
        fs::remove_file(&path)?;
        assert!(matches!(result, Err(LoaderError::Extension { extension: 1, .. })));
        Ok(())
    }

    #[test]
    fn unknown_format() {
        assert!(matches!(
            CubeLoader::default().path("cube.fits").load(),
            Err(LoaderError::Format(_))
        ));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            CubeLoader::default().path("/nonexistent/cube.npy").load(),
            Err(LoaderError::Io(..))
        ));
    }
}

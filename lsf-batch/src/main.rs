//! Batch LSF estimation
//!
//! Estimates the LSF of all the cubes matching a glob pattern and writes the
//! LSF tables next to the cubes.

use std::path::{Path, PathBuf};

use glob::glob;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use lsf_extractor::{Config, CubeLoader};
use rayon::prelude::*;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "lsf-batch", about = "Line Spread Function estimation of a set of cubes")]
struct Opt {
    /// Cube files glob pattern, e.g. "data/*.npy"
    pattern: String,
    /// Number of correlated channels
    #[structopt(short, long, default_value = "8")]
    used_channels: usize,
    /// Index of the cube array in .npz archives
    #[structopt(short, long, default_value = "0")]
    extension: usize,
    /// Seed of the reference spectrum random generator
    #[structopt(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let data_paths: Vec<PathBuf> = glob(&opt.pattern)?.collect::<Result<_, _>>()?;
    let n_cube = data_paths.len();
    println!("Found {} cubes", n_cube);

    let mut config = Config::default()
        .used_channels(opt.used_channels)
        .extension(opt.extension);
    if let Some(seed) = opt.seed {
        config = config.seed(seed);
    }

    let pb = ProgressBar::new(n_cube as u64);
    pb.set_style(ProgressStyle::with_template(
        "{bar:40} {pos}/{len} cubes [{elapsed_precise}]",
    )?);
    let n_failed = data_paths
        .par_iter()
        .progress_with(pb)
        .map(|path| (path, estimate(path, config.clone())))
        .filter(|(path, result)| match result {
            Ok(lsf_path) => {
                log::info!("{:?} -> {:?}", path, lsf_path);
                false
            }
            Err(e) => {
                log::error!("{:?}: {:?}", path, e);
                true
            }
        })
        .count();

    println!(
        "LSF estimated for {}/{} cubes",
        n_cube - n_failed,
        n_cube
    );
    Ok(())
}

/// Estimates the LSF of the cube at `path` and saves it next to the cube
fn estimate(path: &Path, config: Config) -> anyhow::Result<PathBuf> {
    let mut cube = CubeLoader::default().path(path).config(config).load()?;
    cube.get_lsf()?;
    Ok(cube.save_lsf(path.with_extension(""))?)
}

use std::path::{Path, PathBuf};

use lsf_extractor::{Config, CubeLoader};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "lsf-extractor", about = "Line Spread Function estimation from a data cube")]
struct Opt {
    /// Path to the cube file (.npy or .npz)
    path: PathBuf,
    /// Number of correlated channels, the LSF has 2 x `used_channels` - 1 channels
    #[structopt(short, long, default_value = "8")]
    used_channels: usize,
    /// Index of the cube array in a .npz archive
    #[structopt(short, long, default_value = "0")]
    extension: usize,
    /// Name of the cube array in a .npz archive
    #[structopt(long)]
    array: Option<String>,
    /// Number of channels of the reference spectrum
    #[structopt(long, default_value = "27583")]
    total_channels: usize,
    /// Mean of the reference spectrum flux
    #[structopt(long, default_value = "0")]
    mu: f64,
    /// Standard deviation of the reference spectrum flux
    #[structopt(long, default_value = "1")]
    sigma: f64,
    /// Seed of the reference spectrum random generator
    #[structopt(long)]
    seed: Option<u64>,
    /// Number of decimals in the LSF table
    #[structopt(long, default_value = "3")]
    precision: usize,
    /// Base path of the LSF table, "_LSF.dat" is appended (default: the cube path without extension)
    #[structopt(short, long)]
    output: Option<PathBuf>,
    /// Save the LSF to a pickle file as well
    #[structopt(long)]
    pickle: bool,
    /// Display the cube summary
    #[structopt(short, long)]
    summary: bool,
    /// Hide the progress bar
    #[structopt(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut config = Config::default()
        .used_channels(opt.used_channels)
        .extension(opt.extension)
        .total_channels(opt.total_channels)
        .normal(opt.mu, opt.sigma)
        .precision(opt.precision);
    if let Some(seed) = opt.seed {
        config = config.seed(seed);
    }
    if !opt.quiet {
        config = config.progress();
    }

    let mut loader = CubeLoader::default().path(&opt.path).config(config);
    if let Some(name) = opt.array {
        loader = loader.array_name(name);
    }
    let mut cube = loader.load()?;
    cube.get_lsf()?;

    if opt.summary {
        cube.summary();
    }

    let base = opt
        .output
        .unwrap_or_else(|| opt.path.with_extension(""));
    let path = cube.save_lsf(&base)?;
    println!("LSF saved to {:?}", path);
    if opt.pickle {
        let path = pickle_path(&base);
        cube.lsf()?.to_pickle(&path)?;
        println!("LSF saved to {:?}", path);
    }

    Ok(())
}

fn pickle_path(base: &Path) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push("_LSF.pkl");
    PathBuf::from(path)
}

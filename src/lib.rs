/*!
# LSF Extractor

Estimation of the Line Spread Function (LSF) of an imaging spectrograph from
a spectral data cube.

The instrumental blurring correlates neighboring spectral channels. The
correlation of every pixel spectrum with itself is computed over a few
channels and summarized over the field of view into a correlation kernel
(16%, 50% and 84% percentiles).
Each kernel band is then calibrated against a synthetic spectrum convolved
with the same kernel, the ratio of the half maximum lags giving the channel
scale factor `k`. The kernel remapped with `k` and mirrored around the lag 0
is the LSF.

## Usage

```rust,no_run
use lsf_extractor::{Config, CubeLoader};

let mut cube = CubeLoader::default()
    .path("cube.npy")
    .config(Config::default().used_channels(8).seed(7))
    .load()?;
let lsf = cube.get_lsf()?;
println!("LSF: {:?}", lsf.center());
cube.save_lsf("cube")?;
# Ok::<(), lsf_extractor::Error>(())
```
*/

pub mod calibration;
mod config;
pub mod correlation;
pub mod cube;
mod error;
pub mod kernel;
pub mod loader;
pub mod profile;
pub mod spectrum;

pub use config::Config;
pub use cube::{Cube, CubeError, State};
pub use error::Error;
pub use kernel::{AggregateKernel, Band};
pub use loader::CubeLoader;
pub use profile::LsfProfile;
pub use spectrum::ReferenceSpectrum;

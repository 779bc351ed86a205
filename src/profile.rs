//! Line Spread Function profile
//!
//! The LSF is given at the channel offsets `-(W-1)..=W-1` together with the
//! distances of the 16% and 84% bands to the median.

use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;

/// Header of the LSF table columns
pub const COLUMNS: [&str; 4] = ["Channels", "LSF_50", "LSF_16_err", "LSF_84_err"];

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to access LSF table {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("failed to read or write LSF table")]
    Csv(#[from] csv::Error),
    #[error("failed to pickle the LSF")]
    Pickle(#[from] serde_pickle::Error),
    #[error("invalid LSF table row #{row}: {reason}")]
    Row { row: usize, reason: String },
    #[error("inconsistent LSF lengths (center: {center}, lower: {lower}, upper: {upper})")]
    Length {
        center: usize,
        lower: usize,
        upper: usize,
    },
}
type Result<T> = std::result::Result<T, ProfileError>;

/// The Line Spread Function
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LsfProfile {
    channels: Vec<i64>,
    center: Vec<f64>,
    lower_error: Vec<f64>,
    upper_error: Vec<f64>,
}
impl LsfProfile {
    /// Builds the LSF from the median band and the 16% and 84% bands
    ///
    /// The errors are the distances of the lower and upper bands to the median.
    pub fn from_bands(center: Vec<f64>, lower: &[f64], upper: &[f64]) -> Result<Self> {
        if center.len() != lower.len() || center.len() != upper.len() || center.len() % 2 == 0 {
            return Err(ProfileError::Length {
                center: center.len(),
                lower: lower.len(),
                upper: upper.len(),
            });
        }
        let distance = |band: &[f64]| -> Vec<f64> {
            center
                .iter()
                .zip(band)
                .map(|(c, b)| (c - b).powi(2).sqrt())
                .collect()
        };
        let lower_error = distance(lower);
        let upper_error = distance(upper);
        let half_width = (center.len() / 2) as i64;
        Ok(Self {
            channels: (-half_width..=half_width).collect(),
            center,
            lower_error,
            upper_error,
        })
    }
    /// Channel offsets
    pub fn channels(&self) -> &[i64] {
        &self.channels
    }
    /// LSF median profile
    pub fn center(&self) -> &[f64] {
        &self.center
    }
    /// Distance of the 16% band to the median
    pub fn lower_error(&self) -> &[f64] {
        &self.lower_error
    }
    /// Distance of the 84% band to the median
    pub fn upper_error(&self) -> &[f64] {
        &self.upper_error
    }
    pub fn len(&self) -> usize {
        self.channels.len()
    }
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
    /// Iterator over the (channel, center, lower error, upper error) rows
    pub fn rows(&self) -> impl Iterator<Item = (i64, f64, f64, f64)> + '_ {
        self.channels
            .iter()
            .zip(&self.center)
            .zip(&self.lower_error)
            .zip(&self.upper_error)
            .map(|(((&ch, &c), &l), &u)| (ch, c, l, u))
    }
    /// Writes the LSF table with `precision` decimals
    pub fn write_dat<W: Write>(&self, writer: W, precision: usize) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b' ')
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(writer);
        wtr.write_record(
            std::iter::once(format!("# {}", COLUMNS[0]))
                .chain(COLUMNS[1..].iter().map(|c| c.to_string())),
        )?;
        for (ch, c, l, u) in self.rows() {
            wtr.write_record(&[
                ch.to_string(),
                format!("{c:.precision$}"),
                format!("{l:.precision$}"),
                format!("{u:.precision$}"),
            ])?;
        }
        wtr.flush()
            .map_err(|e| ProfileError::Csv(csv::Error::from(e)))?;
        Ok(())
    }
    /// Saves the LSF table into "`base`_LSF.dat"
    pub fn to_dat<P: AsRef<Path>>(&self, base: P, precision: usize) -> Result<PathBuf> {
        let path = dat_path(base);
        let file = File::create(&path).map_err(|e| ProfileError::Io(e, path.clone()))?;
        self.write_dat(file, precision)?;
        log::info!("LSF saved to {:?}", path);
        Ok(path)
    }
    /// Loads a LSF table
    pub fn from_dat<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ProfileError::Io(e, path.to_path_buf()))?;
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b' ')
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(file);
        let mut this = Self {
            channels: vec![],
            center: vec![],
            lower_error: vec![],
            upper_error: vec![],
        };
        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
            if fields.len() != 4 {
                return Err(ProfileError::Row {
                    row,
                    reason: format!("expected 4 columns, found {}", fields.len()),
                });
            }
            let parse = |f: &str| {
                f.parse::<f64>().map_err(|e| ProfileError::Row {
                    row,
                    reason: e.to_string(),
                })
            };
            this.channels
                .push(fields[0].parse::<i64>().map_err(|e| ProfileError::Row {
                    row,
                    reason: e.to_string(),
                })?);
            this.center.push(parse(fields[1])?);
            this.lower_error.push(parse(fields[2])?);
            this.upper_error.push(parse(fields[3])?);
        }
        Ok(this)
    }
    /// Saves the LSF into a pickle file
    pub fn to_pickle<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path).map_err(|e| ProfileError::Io(e, path.to_path_buf()))?;
        serde_pickle::to_writer(&mut file, self, Default::default())?;
        Ok(())
    }
}

/// Appends the "_LSF.dat" suffix to `base`
pub fn dat_path<P: AsRef<Path>>(base: P) -> PathBuf {
    let mut path = base.as_ref().as_os_str().to_owned();
    path.push("_LSF.dat");
    PathBuf::from(path)
}

use std::{collections::HashMap, path::PathBuf, str::FromStr};

use anyhow::Result;
use log::info;
use pyo3::prelude::*;

use ::taxsam::{
    io::Compression, process_sam_file, Layout, PairRow, ProcessOpts, ProgressBarObserver,
    ProgressObserver,
};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Checks for pending Python signals (e.g. Ctrl-C) while a file is processed.
struct SignalCheck<'py> {
    py: Python<'py>,
    count: u64,
}

impl ProgressObserver for SignalCheck<'_> {
    fn on_pair(&mut self, _row: &PairRow) -> Result<()> {
        self.count += 1;
        if self.count % 100000 == 0 {
            self.py.check_signals()?;
        }
        Ok(())
    }
}

/// Convert a Bowtie2 SAM file into a TSV annotated with taxonomic ids.
///
/// Every pair of mate alignments is checked for concordance (same read name,
/// same genome, pair status "CP", matching fragment length and mate positions,
/// proper-pair flags) and written as one row. Absent optional fields are
/// written as ".". Any inconsistency aborts the conversion.
///
/// Parameters
/// ----------
/// sam: Path
///     File path to the SAM file, optionally compressed with gzip, zstd or bzip2.
/// genome_taxid_map: Path
///     File path to a JSON file mapping each genome id to a list whose first
///     element is the taxid.
/// output: Path
///     File path to the output TSV file.
/// paired: bool
///     Whether the SAM file contains paired read alignments. Only paired
///     input is currently supported.
/// compression: Literal['gzip', 'zstd', 'bzip2'] | None
///     Compression algorithm to use. If None, the compression algorithm will be inferred from the file extension.
/// compression_level: int | None
///     Compression level to use.
/// num_threads: int
///     The number of threads used for zstd compression.
/// progress: bool
///     Whether to display a progress spinner.
///
/// Returns
/// -------
/// dict
///    A dictionary containing statistics about the processed file.
#[pyfunction]
#[pyo3(
    signature = (
        sam, genome_taxid_map, output, *,
        paired=true, compression=None, compression_level=None, num_threads=4, progress=false,
    ),
    text_signature = "(sam, genome_taxid_map, output, *,
        paired=True, compression=None, compression_level=None, num_threads=4, progress=False)",
)]
fn process_sam(
    py: Python<'_>,
    sam: PathBuf,
    genome_taxid_map: PathBuf,
    output: PathBuf,
    paired: bool,
    compression: Option<&str>,
    compression_level: Option<u32>,
    num_threads: u32,
    progress: bool,
) -> Result<HashMap<String, f64>> {
    let opts = ProcessOpts {
        layout: if paired { Layout::Paired } else { Layout::Single },
        compression: compression
            .map(Compression::from_str)
            .transpose()
            .map_err(anyhow::Error::msg)?,
        compression_level,
        num_threads,
        ..ProcessOpts::default()
    };
    let progress_bar = if progress { Some(ProgressBarObserver::new()?) } else { None };
    let observer = (SignalCheck { py, count: 0 }, progress_bar);

    info!("Starting process.");
    let metrics = process_sam_file(sam, genome_taxid_map, output, &opts, observer)?;
    Ok(metrics.into())
}

/// A Python module implemented in Rust.
#[pymodule]
fn taxsam(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .try_init();

    m.add_function(wrap_pyfunction!(process_sam, m)?)?;
    Ok(())
}

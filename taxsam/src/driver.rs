use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::error::Error;
use crate::io::{open_file_for_read, open_file_for_write, Compression};
use crate::pair::{reconcile_lines, PairRow, PAIR_ROW_HEADER};
use crate::qc::{Metrics, PairQC};
use crate::taxonomy::GenomeTaxonMap;

enum State {
    SeekAlignment,
    HaveFirst(String),
    Emit(String, String),
    Done,
}

/// Reads a SAM stream two alignment lines at a time, skipping header and
/// blank lines. Mates must be adjacent in the stream.
pub struct SamPairs<R> {
    reader: R,
    state: State,
    buf: String,
    alignments: u64,
    header_lines: u64,
    blank_lines: u64,
}

impl<R: BufRead> SamPairs<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: State::SeekAlignment,
            buf: String::new(),
            alignments: 0,
            header_lines: 0,
            blank_lines: 0,
        }
    }

    pub fn alignments(&self) -> u64 {
        self.alignments
    }

    pub fn header_lines(&self) -> u64 {
        self.header_lines
    }

    pub fn blank_lines(&self) -> u64 {
        self.blank_lines
    }

    fn next_alignment(&mut self) -> Result<Option<String>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            let line = self.buf.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                self.blank_lines += 1;
            } else if line.starts_with('@') {
                self.header_lines += 1;
            } else {
                self.alignments += 1;
                return Ok(Some(line.to_string()));
            }
        }
    }
}

impl<R: BufRead> Iterator for SamPairs<R> {
    type Item = Result<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::SeekAlignment => match self.next_alignment() {
                    Ok(Some(first)) => self.state = State::HaveFirst(first),
                    Ok(None) => return None,
                    Err(e) => return Some(Err(e)),
                },
                State::HaveFirst(first) => match self.next_alignment() {
                    Ok(Some(second)) => self.state = State::Emit(first, second),
                    Ok(None) => return Some(Err(Error::UnpairedInput(first).into())),
                    Err(e) => return Some(Err(e)),
                },
                State::Emit(fwd, rev) => {
                    self.state = State::SeekAlignment;
                    return Some(Ok((fwd, rev)));
                }
                State::Done => return None,
            }
        }
    }
}

/// Destination of reconciled rows.
pub trait RowSink {
    fn write_row(&mut self, row: &PairRow) -> Result<()>;
}

impl RowSink for Vec<PairRow> {
    fn write_row(&mut self, row: &PairRow) -> Result<()> {
        self.push(row.clone());
        Ok(())
    }
}

/// Tab-separated output with a single header line.
pub struct TsvWriter<W: Write> {
    inner: W,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(mut inner: W) -> Result<Self> {
        writeln!(inner, "{}", PAIR_ROW_HEADER.join("\t"))?;
        Ok(Self { inner })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> RowSink for TsvWriter<W> {
    fn write_row(&mut self, row: &PairRow) -> Result<()> {
        writeln!(self.inner, "{}", row)?;
        Ok(())
    }
}

/// Receives progress events from a run. Returning an error from `on_pair`
/// aborts the run.
pub trait ProgressObserver {
    fn on_pair(&mut self, _row: &PairRow) -> Result<()> {
        Ok(())
    }

    fn on_finish(&mut self, _metrics: &Metrics) {}
}

impl ProgressObserver for () {}

impl<O: ProgressObserver + ?Sized> ProgressObserver for &mut O {
    fn on_pair(&mut self, row: &PairRow) -> Result<()> {
        (**self).on_pair(row)
    }

    fn on_finish(&mut self, metrics: &Metrics) {
        (**self).on_finish(metrics)
    }
}

impl<O: ProgressObserver> ProgressObserver for Option<O> {
    fn on_pair(&mut self, row: &PairRow) -> Result<()> {
        match self {
            Some(observer) => observer.on_pair(row),
            None => Ok(()),
        }
    }

    fn on_finish(&mut self, metrics: &Metrics) {
        if let Some(observer) = self {
            observer.on_finish(metrics);
        }
    }
}

impl<A: ProgressObserver, B: ProgressObserver> ProgressObserver for (A, B) {
    fn on_pair(&mut self, row: &PairRow) -> Result<()> {
        self.0.on_pair(row)?;
        self.1.on_pair(row)
    }

    fn on_finish(&mut self, metrics: &Metrics) {
        self.0.on_finish(metrics);
        self.1.on_finish(metrics);
    }
}

/// Logs the number of processed pairs every `interval` pairs.
pub struct LogProgress {
    interval: u64,
    count: u64,
    start: Instant,
}

impl LogProgress {
    pub fn new(interval: u64) -> Self {
        Self { interval, count: 0, start: Instant::now() }
    }
}

impl ProgressObserver for LogProgress {
    fn on_pair(&mut self, _row: &PairRow) -> Result<()> {
        self.count += 1;
        if self.interval > 0 && self.count % self.interval == 0 {
            let secs = self.start.elapsed().as_secs_f64();
            info!("Processed {} read pairs ({:.0} pairs/s)", self.count, self.count as f64 / secs.max(1e-9));
        }
        Ok(())
    }

    fn on_finish(&mut self, _metrics: &Metrics) {
        info!("Processed {} read pairs in {:.2?}", self.count, self.start.elapsed());
    }
}

/// Terminal spinner counting processed read pairs.
pub struct ProgressBarObserver(ProgressBar);

impl ProgressBarObserver {
    pub fn new() -> Result<Self> {
        let style = ProgressStyle::with_template(
            "[{elapsed}] {spinner} {human_pos} read pairs ({per_sec})"
        )?;
        let progress_bar = ProgressBar::new_spinner().with_style(style);
        progress_bar.enable_steady_tick(Duration::from_millis(200));
        Ok(Self(progress_bar))
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_pair(&mut self, _row: &PairRow) -> Result<()> {
        self.0.inc(1);
        Ok(())
    }

    fn on_finish(&mut self, _metrics: &Metrics) {
        self.0.finish();
    }
}

/// Streams a paired SAM file into reconciled rows.
pub struct PairedSamProcessor<'a> {
    taxa: &'a GenomeTaxonMap,
    qc: PairQC,
}

impl<'a> PairedSamProcessor<'a> {
    pub fn new(taxa: &'a GenomeTaxonMap) -> Self {
        Self { taxa, qc: PairQC::default() }
    }

    /// Reconcile every pair of `reader` and forward the rows to `sink` as they
    /// are produced. Stops at the first invalid pair.
    pub fn process<R, S, O>(&mut self, reader: R, sink: &mut S, mut observer: O) -> Result<()>
    where
        R: BufRead,
        S: RowSink + ?Sized,
        O: ProgressObserver,
    {
        let start = Instant::now();
        let mut pairs = SamPairs::new(reader);
        for pair in pairs.by_ref() {
            let (fwd, rev) = pair?;
            let row = reconcile_lines(&fwd, &rev, self.taxa)?;
            sink.write_row(&row)?;
            self.qc.update(&row);
            observer.on_pair(&row)?;
        }
        self.qc.alignments += pairs.alignments();
        self.qc.header_lines += pairs.header_lines();
        self.qc.blank_lines += pairs.blank_lines();
        self.qc.set_elapsed(start.elapsed());
        debug!(
            "Read {} alignments, skipped {} header and {} blank lines",
            pairs.alignments(), pairs.header_lines(), pairs.blank_lines(),
        );
        observer.on_finish(&self.get_report());
        Ok(())
    }

    pub fn qc(&self) -> &PairQC {
        &self.qc
    }

    pub fn get_report(&self) -> Metrics {
        let mut metrics = Metrics::default();
        self.qc.report(&mut metrics);
        metrics
    }
}

/// Read layout of the input SAM file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    #[default]
    Paired,
    Single,
}

#[derive(Debug, Clone)]
pub struct ProcessOpts {
    pub layout: Layout,
    pub compression: Option<Compression>, // Inferred from the output path if None.
    pub compression_level: Option<u32>,
    pub num_threads: u32,
    pub log_interval: u64,
}

impl Default for ProcessOpts {
    fn default() -> Self {
        Self {
            layout: Layout::Paired,
            compression: None,
            compression_level: None,
            num_threads: 4,
            log_interval: 1000000,
        }
    }
}

/// Convert a SAM file into a taxid-annotated TSV, one row per read pair.
pub fn process_sam_file<P1, P2, P3, O>(
    sam: P1,
    genome_taxid_map: P2,
    output: P3,
    opts: &ProcessOpts,
    observer: O,
) -> Result<Metrics>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
    P3: AsRef<Path>,
    O: ProgressObserver,
{
    let start = Instant::now();
    let (sam, mapping, output) = (sam.as_ref(), genome_taxid_map.as_ref(), output.as_ref());
    info!("SAM file path: {}", sam.display());
    info!("Mapping file path: {}", mapping.display());
    info!("Output path: {}", output.display());
    info!("Processing file as paired: {}", opts.layout == Layout::Paired);
    if opts.layout == Layout::Single {
        bail!("processing of unpaired SAM files is not supported");
    }

    info!("Importing genome-to-taxid map...");
    let taxa = GenomeTaxonMap::from_path(mapping)?;
    if taxa.is_empty() {
        warn!("Genome-to-taxid map is empty, every alignment will fail to resolve");
    } else {
        info!("Imported {} genome ids", taxa.len());
    }

    let reader = BufReader::new(open_file_for_read(sam)?);
    let compression = opts.compression.or_else(|| output.to_path_buf().try_into().ok());
    debug!("Using compression: {:?} with level: {:?}", compression, opts.compression_level);
    let mut writer = TsvWriter::new(open_file_for_write(
        output,
        compression,
        opts.compression_level,
        opts.num_threads,
    )?)?;

    info!("Processing SAM file...");
    let mut processor = PairedSamProcessor::new(&taxa);
    processor
        .process(reader, &mut writer, (LogProgress::new(opts.log_interval), observer))
        .with_context(|| format!("failed to process SAM file: {}", sam.display()))?;
    writer.flush()?;
    info!("File processed. Total time elapsed: {:.2?}", start.elapsed());
    Ok(processor.get_report())
}

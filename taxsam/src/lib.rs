//! Convert paired-end SAM alignments into a flat, taxid-annotated table.
//!
//! Each pair of adjacent mate records is decoded, checked for concordance and
//! joined into one [`PairRow`]. Any inconsistency in the aligner output stops
//! the run.

pub mod driver;
pub mod error;
pub mod flags;
pub mod io;
pub mod pair;
pub mod qc;
pub mod record;
pub mod taxonomy;

pub use driver::{
    process_sam_file, Layout, LogProgress, PairedSamProcessor, ProcessOpts, ProgressBarObserver,
    ProgressObserver, RowSink, SamPairs, TsvWriter,
};
pub use error::{Error, Result};
pub use flags::{decode_flags, AlignmentFlags};
pub use pair::{reconcile, reconcile_lines, PairRow, PairViolation, PAIR_ROW_HEADER};
pub use record::{parse_record, AlignmentRecord, PairedEnd, RecordLayout, SingleEnd};
pub use taxonomy::{GenomeTaxonMap, Taxid};

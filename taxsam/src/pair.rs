use std::fmt;

use crate::error::{Error, Result};
use crate::record::{parse_record, AlignmentRecord, PairedEnd};
use crate::taxonomy::{GenomeTaxonMap, Taxid};

/// Pair status written by the aligner for concordant mates.
pub const CONCORDANT_PAIR: &str = "CP";

/// Column names of the output table, in output order.
pub const PAIR_ROW_HEADER: [&str; 20] = [
    "query_name",
    "genome_id",
    "taxid",
    "fragment_length",
    "best_alignment_score_fwd",
    "best_alignment_score_rev",
    "next_alignment_score_fwd",
    "next_alignment_score_rev",
    "edit_distance_fwd",
    "edit_distance_rev",
    "ref_start_fwd",
    "ref_start_rev",
    "map_qual_fwd",
    "map_qual_rev",
    "cigar_fwd",
    "cigar_rev",
    "query_len_fwd",
    "query_len_rev",
    "query_seq_fwd",
    "query_seq_rev",
];

/// Written in place of an absent optional value.
pub const MISSING_VALUE: &str = ".";

/// One reconciled read pair. `fwd` and `rev` refer to the order in which the
/// two alignments appeared in the input, not to their strands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRow {
    pub query_name: String,
    pub genome_id: String,
    pub taxid: Taxid,
    pub fragment_length: u64,
    pub best_alignment_score: (Option<String>, Option<String>),
    pub next_alignment_score: (Option<String>, Option<String>),
    pub edit_distance: (Option<String>, Option<String>),
    pub ref_start: (i64, i64),
    pub map_qual: (u8, u8),
    pub cigar: (String, String),
    pub query_len: (usize, usize),
    pub query_seq: (String, String),
}

impl fmt::Display for PairRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt(x: &Option<String>) -> &str {
            x.as_deref().unwrap_or(MISSING_VALUE)
        }
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.query_name, self.genome_id, self.taxid, self.fragment_length,
        )?;
        for (a, b) in [
            &self.best_alignment_score,
            &self.next_alignment_score,
            &self.edit_distance,
        ] {
            write!(f, "\t{}\t{}", opt(a), opt(b))?;
        }
        write!(
            f,
            "\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.ref_start.0,
            self.ref_start.1,
            self.map_qual.0,
            self.map_qual.1,
            self.cigar.0,
            self.cigar.1,
            self.query_len.0,
            self.query_len.1,
            self.query_seq.0,
            self.query_seq.1,
        )
    }
}

/// The mate-pair invariant that a pair of alignments broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairViolation {
    QueryName(String, String),
    GenomeId(String, String),
    PairStatus(Option<String>, Option<String>),
    /// Mate columns were not decoded for one of the records.
    MissingMate,
    FragmentLength(u64, u64),
    MatePosition { ref_start: i64, mate_ref_start: i64 },
    NotInPair,
    NotProperPair,
}

impl fmt::Display for PairViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairViolation::QueryName(a, b) => write!(f, "query names differ ({} vs {})", a, b),
            PairViolation::GenomeId(a, b) => write!(f, "genome ids differ ({} vs {})", a, b),
            PairViolation::PairStatus(a, b) => write!(
                f,
                "pair status is not {} ({} vs {})",
                CONCORDANT_PAIR,
                a.as_deref().unwrap_or(MISSING_VALUE),
                b.as_deref().unwrap_or(MISSING_VALUE),
            ),
            PairViolation::MissingMate => write!(f, "mate fields are missing"),
            PairViolation::FragmentLength(a, b) => write!(f, "fragment lengths differ ({} vs {})", a, b),
            PairViolation::MatePosition { ref_start, mate_ref_start } => write!(
                f,
                "reference start {} does not match the mate's reported start {}",
                ref_start, mate_ref_start
            ),
            PairViolation::NotInPair => write!(f, "alignment is not flagged as paired"),
            PairViolation::NotProperPair => write!(f, "alignment is not flagged as properly paired"),
        }
    }
}

fn is_concordant(rec: &AlignmentRecord) -> bool {
    rec.optional.pair_status.as_deref() == Some(CONCORDANT_PAIR)
}

/// Check that two alignments are concordant mates of one fragment.
pub fn check_pair(fwd: &AlignmentRecord, rev: &AlignmentRecord) -> std::result::Result<(), PairViolation> {
    if fwd.query_name != rev.query_name {
        return Err(PairViolation::QueryName(fwd.query_name.clone(), rev.query_name.clone()));
    }
    if fwd.genome_id != rev.genome_id {
        return Err(PairViolation::GenomeId(fwd.genome_id.clone(), rev.genome_id.clone()));
    }
    if !(is_concordant(fwd) && is_concordant(rev)) {
        return Err(PairViolation::PairStatus(
            fwd.optional.pair_status.clone(),
            rev.optional.pair_status.clone(),
        ));
    }
    let (Some(fwd_mate), Some(rev_mate)) = (&fwd.mate, &rev.mate) else {
        return Err(PairViolation::MissingMate);
    };
    if fwd_mate.fragment_length != rev_mate.fragment_length {
        return Err(PairViolation::FragmentLength(fwd_mate.fragment_length, rev_mate.fragment_length));
    }
    for (rec, mate) in [(fwd, rev_mate), (rev, fwd_mate)] {
        if rec.ref_start != mate.ref_start {
            return Err(PairViolation::MatePosition {
                ref_start: rec.ref_start,
                mate_ref_start: mate.ref_start,
            });
        }
    }
    if !(fwd.flags.in_pair && rev.flags.in_pair) {
        return Err(PairViolation::NotInPair);
    }
    if !(fwd.flags.proper_paired_alignment && rev.flags.proper_paired_alignment) {
        return Err(PairViolation::NotProperPair);
    }
    Ok(())
}

/// Validate two mate records and join them into one output row.
pub fn reconcile(fwd: &AlignmentRecord, rev: &AlignmentRecord) -> std::result::Result<PairRow, PairViolation> {
    check_pair(fwd, rev)?;
    let fragment_length = fwd.mate.as_ref().map_or(0, |m| m.fragment_length);
    Ok(PairRow {
        query_name: fwd.query_name.clone(),
        genome_id: fwd.genome_id.clone(),
        taxid: fwd.taxid,
        fragment_length,
        best_alignment_score: (
            fwd.optional.alignment_score.clone(),
            rev.optional.alignment_score.clone(),
        ),
        next_alignment_score: (
            fwd.optional.next_best_alignment.clone(),
            rev.optional.next_best_alignment.clone(),
        ),
        edit_distance: (
            fwd.optional.edit_distance.clone(),
            rev.optional.edit_distance.clone(),
        ),
        ref_start: (fwd.ref_start, rev.ref_start),
        map_qual: (fwd.map_qual, rev.map_qual),
        cigar: (fwd.cigar.clone(), rev.cigar.clone()),
        query_len: (fwd.query_len, rev.query_len),
        query_seq: (fwd.query_seq.clone(), rev.query_seq.clone()),
    })
}

/// Parse two raw alignment lines as mates and reconcile them. A violated
/// invariant is reported together with both lines.
pub fn reconcile_lines(fwd_line: &str, rev_line: &str, taxa: &GenomeTaxonMap) -> Result<PairRow> {
    let fwd = parse_record::<PairedEnd>(fwd_line, taxa)?;
    let rev = parse_record::<PairedEnd>(rev_line, taxa)?;
    reconcile(&fwd, &rev).map_err(|violation| Error::Consistency {
        violation,
        fwd: fwd_line.trim_end_matches(['\n', '\r']).to_string(),
        rev: rev_line.trim_end_matches(['\n', '\r']).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SingleEnd;

    const FWD: &str = "read1\t99\tgenomeA\t101\t40\t10M\tgenomeA\t201\t150\tACGT\tAS:i:-5\tXS:i:-9\tNM:i:1\tYS:i:-3\tYT:Z:CP";
    const REV: &str = "read1\t147\tgenomeA\t201\t38\t4M\tgenomeA\t101\t-150\tTGCAA\tAS:i:-3\tYS:i:-5\tYT:Z:CP";

    fn taxa() -> GenomeTaxonMap {
        [("genomeA".to_string(), 9606), ("genomeB".to_string(), 562)]
            .into_iter()
            .collect()
    }

    fn violation(fwd: &str, rev: &str) -> PairViolation {
        match reconcile_lines(fwd, rev, &taxa()) {
            Err(Error::Consistency { violation, fwd: a, rev: b }) => {
                assert_eq!(a, fwd);
                assert_eq!(b, rev);
                violation
            }
            other => panic!("expected a consistency error, got {:?}", other),
        }
    }

    #[test]
    fn test_reconcile() {
        let row = reconcile_lines(FWD, REV, &taxa()).unwrap();
        assert_eq!(
            row,
            PairRow {
                query_name: "read1".into(),
                genome_id: "genomeA".into(),
                taxid: 9606,
                fragment_length: 150,
                best_alignment_score: (Some("-5".into()), Some("-3".into())),
                next_alignment_score: (Some("-9".into()), None),
                edit_distance: (Some("1".into()), None),
                ref_start: (100, 200),
                map_qual: (40, 38),
                cigar: ("10M".into(), "4M".into()),
                query_len: (4, 5),
                query_seq: ("ACGT".into(), "TGCAA".into()),
            }
        );
        assert_eq!(
            row.to_string(),
            "read1\tgenomeA\t9606\t150\t-5\t-3\t-9\t.\t1\t.\t100\t200\t40\t38\t10M\t4M\t4\t5\tACGT\tTGCAA"
        );
        assert_eq!(row.to_string().split('\t').count(), PAIR_ROW_HEADER.len());
    }

    #[test]
    fn test_order_is_caller_order() {
        let row = reconcile_lines(REV, FWD, &taxa()).unwrap();
        assert_eq!(row.ref_start, (200, 100));
        assert_eq!(row.query_seq, ("TGCAA".to_string(), "ACGT".to_string()));
    }

    #[test]
    fn test_query_name_mismatch() {
        let rev = REV.replacen("read1", "read2", 1);
        assert_eq!(violation(FWD, &rev), PairViolation::QueryName("read1".into(), "read2".into()));
    }

    #[test]
    fn test_genome_mismatch() {
        let rev = REV.replace("genomeA", "genomeB");
        assert!(matches!(violation(FWD, &rev), PairViolation::GenomeId(..)));
    }

    #[test]
    fn test_pair_status() {
        let rev = REV.replace("YT:Z:CP", "YT:Z:DP");
        assert_eq!(
            violation(FWD, &rev),
            PairViolation::PairStatus(Some("CP".into()), Some("DP".into()))
        );
        let rev = REV.replace("\tYT:Z:CP", "");
        assert_eq!(violation(FWD, &rev), PairViolation::PairStatus(Some("CP".into()), None));
    }

    #[test]
    fn test_fragment_length_mismatch() {
        let rev = REV.replace("-150", "-151");
        assert_eq!(violation(FWD, &rev), PairViolation::FragmentLength(150, 151));
    }

    #[test]
    fn test_mate_position_mismatch() {
        let rev = REV.replace("\t101\t", "\t102\t");
        assert_eq!(
            violation(FWD, &rev),
            PairViolation::MatePosition { ref_start: 100, mate_ref_start: 101 }
        );
    }

    #[test]
    fn test_flags() {
        // 99 - 1: mate flags without the paired bit
        let fwd = FWD.replacen("\t99\t", "\t98\t", 1);
        assert_eq!(violation(&fwd, REV), PairViolation::NotInPair);
        // 147 - 2: paired but not properly paired
        let rev = REV.replacen("\t147\t", "\t145\t", 1);
        assert_eq!(violation(FWD, &rev), PairViolation::NotProperPair);
    }

    #[test]
    fn test_missing_mate() {
        let mut fwd = parse_record::<PairedEnd>(FWD, &taxa()).unwrap();
        let rev = parse_record::<PairedEnd>(REV, &taxa()).unwrap();
        fwd.mate = parse_record::<SingleEnd>(FWD, &taxa()).unwrap().mate;
        assert_eq!(reconcile(&fwd, &rev), Err(PairViolation::MissingMate));
    }
}

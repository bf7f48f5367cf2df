mod optional;

pub use optional::{extract, extract_optional_fields, OptionalFields, OptionalTag};

use crate::error::{Error, Result};
use crate::flags::{decode_flags, AlignmentFlags};
use crate::taxonomy::{GenomeTaxonMap, Taxid};

/// Mate information reported on paired alignments (RNEXT, PNEXT, TLEN).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MateInfo {
    pub genome_id: String,
    pub ref_start: i64, // 0-based
    pub fragment_length: u64,
}

/// One decoded alignment line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub query_name: String,
    pub flags: AlignmentFlags,
    pub genome_id: String,
    pub taxid: Taxid,
    pub ref_start: i64, // 0-based
    pub map_qual: u8,
    pub cigar: String,
    pub query_seq: String,
    pub query_len: usize,
    pub mate: Option<MateInfo>,
    pub optional: OptionalFields,
}

/// How the columns of an alignment line are interpreted. Chosen once per run.
pub trait RecordLayout {
    /// Optional-field tags extracted for this layout.
    const OPTIONAL_TAGS: &'static [OptionalTag];

    fn mate_info(fields: &[&str], line: &str) -> Result<Option<MateInfo>>;
}

/// Paired-end layout: mate columns and pair-level tags are decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairedEnd;

/// Single-end layout: mate columns are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleEnd;

impl RecordLayout for PairedEnd {
    const OPTIONAL_TAGS: &'static [OptionalTag] = &[
        OptionalTag::AlignmentScore,
        OptionalTag::NextBestAlignment,
        OptionalTag::EditDistance,
        OptionalTag::MateAlignmentScore,
        OptionalTag::PairStatus,
    ];

    fn mate_info(fields: &[&str], line: &str) -> Result<Option<MateInfo>> {
        let genome_id = column(fields, 6, "RNEXT", line)?.to_string();
        let ref_start = zero_based(column(fields, 7, "PNEXT", line)?, "PNEXT")?;
        let tlen: i64 = parse_num(column(fields, 8, "TLEN", line)?, "TLEN")?;
        Ok(Some(MateInfo {
            genome_id,
            ref_start,
            fragment_length: tlen.unsigned_abs(),
        }))
    }
}

impl RecordLayout for SingleEnd {
    const OPTIONAL_TAGS: &'static [OptionalTag] = &[
        OptionalTag::AlignmentScore,
        OptionalTag::NextBestAlignment,
        OptionalTag::EditDistance,
    ];

    fn mate_info(_fields: &[&str], _line: &str) -> Result<Option<MateInfo>> {
        Ok(None)
    }
}

fn column<'a>(fields: &[&'a str], i: usize, name: &'static str, line: &str) -> Result<&'a str> {
    fields.get(i).copied().ok_or_else(|| Error::MissingField {
        field: name,
        line: line.to_string(),
    })
}

fn parse_num<N: lexical::FromLexical>(s: &str, field: &'static str) -> Result<N> {
    lexical::parse(s).map_err(|_| Error::InvalidField {
        field,
        value: s.to_string(),
    })
}

/// SAM positions are 1-based.
fn zero_based(s: &str, field: &'static str) -> Result<i64> {
    parse_num::<i64>(s, field).map(|x| x - 1)
}

/// Parse one tab-delimited alignment line and resolve its taxid. Surrounding
/// whitespace, including a trailing tab, is stripped before splitting.
///
/// Column layout: QNAME, FLAG, RNAME, POS, MAPQ, CIGAR, RNEXT, PNEXT, TLEN, SEQ,
/// followed by optional fields from column 10 on. Mate columns are only decoded
/// by layouts that ask for them.
pub fn parse_record<L: RecordLayout>(line: &str, taxa: &GenomeTaxonMap) -> Result<AlignmentRecord> {
    let line = line.trim();
    let fields: Vec<&str> = line.split('\t').collect();

    let query_name = column(&fields, 0, "QNAME", line)?.to_string();
    let flags = decode_flags(parse_num(column(&fields, 1, "FLAG", line)?, "FLAG")?);
    let genome_id = column(&fields, 2, "RNAME", line)?.to_string();
    let taxid = taxa.taxid(&genome_id)?;
    let ref_start = zero_based(column(&fields, 3, "POS", line)?, "POS")?;
    let map_qual = parse_num(column(&fields, 4, "MAPQ", line)?, "MAPQ")?;
    let cigar = column(&fields, 5, "CIGAR", line)?.to_string();
    let mate = L::mate_info(&fields, line)?;
    let query_seq = column(&fields, 9, "SEQ", line)?.to_string();
    let query_len = query_seq.chars().count();
    let optional = extract_optional_fields(&fields[10.min(fields.len())..], L::OPTIONAL_TAGS)?;

    Ok(AlignmentRecord {
        query_name,
        flags,
        genome_id,
        taxid,
        ref_start,
        map_qual,
        cigar,
        query_seq,
        query_len,
        mate,
        optional,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxa() -> GenomeTaxonMap {
        [("genomeA".to_string(), 9606)].into_iter().collect()
    }

    const FWD: &str = "read1\t99\tgenomeA\t101\t40\t10M\tgenomeA\t201\t150\tACGT\tAS:i:-5\tYS:i:-3\tYT:Z:CP";
    const REV: &str = "read1\t147\tgenomeA\t201\t40\t10M\tgenomeA\t101\t-150\tTGCA\tAS:i:-3\tYS:i:-5\tYT:Z:CP\n";

    #[test]
    fn test_parse_paired() {
        let rec = parse_record::<PairedEnd>(FWD, &taxa()).unwrap();
        assert_eq!(rec.query_name, "read1");
        assert_eq!(rec.flags, decode_flags(99));
        assert_eq!(rec.genome_id, "genomeA");
        assert_eq!(rec.taxid, 9606);
        assert_eq!(rec.ref_start, 100);
        assert_eq!(rec.map_qual, 40);
        assert_eq!(rec.cigar, "10M");
        assert_eq!(rec.query_seq, "ACGT");
        assert_eq!(rec.query_len, 4);
        assert_eq!(
            rec.mate,
            Some(MateInfo { genome_id: "genomeA".into(), ref_start: 200, fragment_length: 150 })
        );
        assert_eq!(rec.optional.alignment_score.as_deref(), Some("-5"));
        assert_eq!(rec.optional.next_best_alignment, None);
        assert_eq!(rec.optional.edit_distance, None);
        assert_eq!(rec.optional.mate_alignment_score.as_deref(), Some("-3"));
        assert_eq!(rec.optional.pair_status.as_deref(), Some("CP"));

        let rec = parse_record::<PairedEnd>(REV, &taxa()).unwrap();
        assert_eq!(rec.ref_start, 200);
        assert_eq!(rec.mate.unwrap().fragment_length, 150);
        assert_eq!(rec.optional.pair_status.as_deref(), Some("CP"));
    }

    #[test]
    fn test_parse_single() {
        let rec = parse_record::<SingleEnd>(FWD, &taxa()).unwrap();
        assert_eq!(rec.mate, None);
        assert_eq!(rec.optional.alignment_score.as_deref(), Some("-5"));
        assert_eq!(rec.optional.mate_alignment_score, None);
        assert_eq!(rec.optional.pair_status, None);
    }

    #[test]
    fn test_zero_based_positions() {
        for pos in [1i64, 2, 101, 1_000_000] {
            let line = format!("r\t0\tgenomeA\t{}\t0\t*\t*\t{}\t0\tA", pos, pos);
            let rec = parse_record::<PairedEnd>(&line, &taxa()).unwrap();
            assert_eq!(rec.ref_start, pos - 1);
            assert_eq!(rec.mate.unwrap().ref_start, pos - 1);
        }
    }

    #[test]
    fn test_lookup_failure() {
        let line = FWD.replace("genomeA", "genomeB");
        match parse_record::<PairedEnd>(&line, &taxa()) {
            Err(Error::Lookup(id)) => assert_eq!(id, "genomeB"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_columns() {
        assert!(matches!(
            parse_record::<PairedEnd>("read1\t99\tgenomeA\t101", &taxa()),
            Err(Error::MissingField { field: "MAPQ", .. })
        ));
        assert!(matches!(
            parse_record::<PairedEnd>(&FWD.replace("\t101\t", "\tx101\t"), &taxa()),
            Err(Error::InvalidField { field: "POS", .. })
        ));
        // single-end records do not need the mate columns to be valid
        let line = "r\t0\tgenomeA\t5\t0\t*\t*\tnot-a-number\t0\tACG";
        assert!(parse_record::<SingleEnd>(line, &taxa()).is_ok());
    }

    #[test]
    fn test_surrounding_whitespace() {
        let line = format!("{} \t\r\n", FWD);
        let rec = parse_record::<PairedEnd>(&line, &taxa()).unwrap();
        assert_eq!(rec.optional.pair_status.as_deref(), Some("CP"));
        assert_eq!(rec, parse_record::<PairedEnd>(FWD, &taxa()).unwrap());

        // SEQ as the last column
        let line = "r\t0\tgenomeA\t5\t0\t4M\t*\t0\t0\tACGT \n";
        let rec = parse_record::<PairedEnd>(line, &taxa()).unwrap();
        assert_eq!(rec.query_seq, "ACGT");
        assert_eq!(rec.query_len, 4);
        assert_eq!(rec.optional, OptionalFields::default());
    }

    #[test]
    fn test_flag_and_mapq_ranges() {
        let line = |flag: &str, mapq: &str| format!("r\t{}\tgenomeA\t5\t{}\t*\t*\t0\t0\tA", flag, mapq);
        let rec = parse_record::<PairedEnd>(&line("65535", "255"), &taxa()).unwrap();
        assert_eq!(rec.flags, decode_flags(255));
        assert_eq!(rec.map_qual, 255);
        assert!(matches!(
            parse_record::<PairedEnd>(&line("65536", "0"), &taxa()),
            Err(Error::InvalidField { field: "FLAG", .. })
        ));
        assert!(matches!(
            parse_record::<PairedEnd>(&line("-1", "0"), &taxa()),
            Err(Error::InvalidField { field: "FLAG", .. })
        ));
        assert!(matches!(
            parse_record::<PairedEnd>(&line("0", "256"), &taxa()),
            Err(Error::InvalidField { field: "MAPQ", .. })
        ));
    }
}

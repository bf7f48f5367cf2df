use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::ops::Index;
use std::time::Duration;

use crate::pair::PairRow;
use crate::taxonomy::Taxid;

/// Named run statistics, kept in key order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Metrics(BTreeMap<&'static str, f64>);

impl Metrics {
    pub fn set(&mut self, key: &'static str, value: f64) {
        self.0.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

impl Index<&str> for Metrics {
    type Output = f64;

    fn index(&self, key: &str) -> &f64 {
        self.0
            .get(key)
            .unwrap_or_else(|| panic!("no such metric: {}", key))
    }
}

impl From<Metrics> for HashMap<String, f64> {
    fn from(metrics: Metrics) -> Self {
        metrics.iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.iter().try_for_each(|(key, value)| writeln!(f, "{}\t{}", key, value))
    }
}

/// Counters collected while streaming a paired SAM file.
#[derive(Debug, Default, Clone)]
pub struct PairQC {
    pub(crate) alignments: u64,   // alignment lines read
    pub(crate) header_lines: u64, // lines starting with '@'
    pub(crate) blank_lines: u64,
    pairs: u64,
    bases_fwd: u64,
    bases_rev: u64,
    fragment_length_sum: u64,
    genomes: HashSet<String>,
    taxa: HashSet<Taxid>,
    elapsed: Duration,
}

impl PairQC {
    pub fn pairs(&self) -> u64 {
        self.pairs
    }

    pub fn update(&mut self, row: &PairRow) {
        self.pairs += 1;
        self.bases_fwd += row.query_len.0 as u64;
        self.bases_rev += row.query_len.1 as u64;
        self.fragment_length_sum += row.fragment_length;
        if !self.genomes.contains(&row.genome_id) {
            self.genomes.insert(row.genome_id.clone());
        }
        self.taxa.insert(row.taxid);
    }

    pub(crate) fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn report(&self, metrics: &mut Metrics) {
        metrics.set("sequenced_reads", self.alignments as f64);
        metrics.set("sequenced_read_pairs", self.pairs as f64);
        metrics.set("header_lines", self.header_lines as f64);
        metrics.set("blank_lines", self.blank_lines as f64);
        if self.pairs > 0 {
            let n = self.pairs as f64;
            metrics.set("mean_fragment_length", self.fragment_length_sum as f64 / n);
            metrics.set("mean_read_length_fwd", self.bases_fwd as f64 / n);
            metrics.set("mean_read_length_rev", self.bases_rev as f64 / n);
        }
        metrics.set("num_genomes", self.genomes.len() as f64);
        metrics.set("num_taxa", self.taxa.len() as f64);
        metrics.set("elapsed_seconds", self.elapsed.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, genome: &str, taxid: Taxid, fragment_length: u64) -> PairRow {
        PairRow {
            query_name: name.into(),
            genome_id: genome.into(),
            taxid,
            fragment_length,
            best_alignment_score: (None, None),
            next_alignment_score: (None, None),
            edit_distance: (None, None),
            ref_start: (0, 10),
            map_qual: (42, 42),
            cigar: ("4M".into(), "2M".into()),
            query_len: (4, 2),
            query_seq: ("ACGT".into(), "AC".into()),
        }
    }

    #[test]
    fn test_report() {
        let mut qc = PairQC::default();
        qc.alignments = 6;
        qc.header_lines = 2;
        qc.update(&row("r1", "genomeA", 9606, 100));
        qc.update(&row("r2", "genomeB", 9606, 200));
        qc.update(&row("r3", "genomeA", 9606, 300));

        let mut metrics = Metrics::default();
        qc.report(&mut metrics);
        assert_eq!(metrics["sequenced_reads"], 6.0);
        assert_eq!(metrics["sequenced_read_pairs"], 3.0);
        assert_eq!(metrics["header_lines"], 2.0);
        assert_eq!(metrics["mean_fragment_length"], 200.0);
        assert_eq!(metrics["mean_read_length_fwd"], 4.0);
        assert_eq!(metrics["mean_read_length_rev"], 2.0);
        assert_eq!(metrics["num_genomes"], 2.0);
        assert_eq!(metrics["num_taxa"], 1.0);
    }

    #[test]
    fn test_empty_report() {
        let mut metrics = Metrics::default();
        PairQC::default().report(&mut metrics);
        assert_eq!(metrics["sequenced_read_pairs"], 0.0);
        assert_eq!(metrics.get("mean_fragment_length"), None);
    }

    #[test]
    fn test_metrics_display_sorted() {
        let mut metrics = Metrics::default();
        metrics.set("num_taxa", 2.0);
        metrics.set("blank_lines", 0.0);
        metrics.set("mean_fragment_length", 150.5);
        assert_eq!(metrics.to_string(), "blank_lines\t0\nmean_fragment_length\t150.5\nnum_taxa\t2\n");

        let map: HashMap<String, f64> = metrics.into();
        assert_eq!(map.len(), 3);
        assert_eq!(map["num_taxa"], 2.0);
    }
}

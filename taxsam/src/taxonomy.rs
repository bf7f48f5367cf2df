use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use log::debug;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::io::open_file_for_read;

pub type Taxid = u64;

/// Read-only mapping from reference genome identifiers to taxonomic ids.
/// Entries are kept as loaded and only validated when a genome is looked up,
/// so a malformed entry no alignment refers to never fails a run.
#[derive(Debug, Default, Clone)]
pub struct GenomeTaxonMap(HashMap<String, Value>);

impl GenomeTaxonMap {
    /// Load a JSON object of the form `{"genome_id": [taxid, ...], ...}`.
    /// The file may be compressed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let reader = open_file_for_read(path.as_ref())?;
        let map = Self::from_reader(reader)
            .with_context(|| format!("cannot load genome-to-taxid map: {}", path.as_ref().display()))?;
        debug!("Loaded {} genome ids", map.len());
        Ok(map)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> anyhow::Result<Self> {
        Ok(Self(serde_json::from_reader(reader)?))
    }

    /// Resolve the taxid of a genome. A miss is an error, never a default.
    /// Only the first element of the entry is used. It may be a number
    /// (fractions are truncated) or a string holding an integer.
    pub fn taxid(&self, genome_id: &str) -> Result<Taxid> {
        let entry = self
            .0
            .get(genome_id)
            .ok_or_else(|| Error::Lookup(genome_id.to_string()))?;
        parse_taxid(entry).map_err(|reason| Error::InvalidTaxid {
            genome: genome_id.to_string(),
            reason,
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Taxid)> for GenomeTaxonMap {
    fn from_iter<T: IntoIterator<Item = (String, Taxid)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(genome, taxid)| (genome, Value::Array(vec![taxid.into()])))
                .collect(),
        )
    }
}

fn parse_taxid(entry: &Value) -> std::result::Result<Taxid, String> {
    let first = match entry {
        Value::Array(values) => values.first().ok_or("empty value")?,
        other => return Err(format!("not a list: {}", other)),
    };
    match first {
        Value::Number(n) => match (n.as_u64(), n.as_f64()) {
            (Some(x), _) => Ok(x),
            (None, Some(x)) if x.is_finite() && x > -1.0 && x.trunc() <= u64::MAX as f64 => {
                Ok(x.trunc() as Taxid)
            }
            _ => Err(format!("not a non-negative integer: {}", n)),
        },
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("not a non-negative integer: {:?}", s)),
        other => Err(format!("unexpected value: {}", other)),
    }
}

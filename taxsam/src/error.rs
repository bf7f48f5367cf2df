use thiserror::Error;

use crate::pair::PairViolation;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while decoding alignments and reconciling mate pairs.
/// Every variant is fatal for a run: the aligner output is considered corrupt.
#[derive(Error, Debug)]
pub enum Error {
    /// The genome identifier of an alignment is absent from the taxon map.
    #[error("genome id '{0}' not found in the genome-to-taxid map")]
    Lookup(String),

    /// More than one optional field carries the requested tag.
    #[error("optional field '{tag}' is ambiguous, {} fields match: {}", .matches.len(), .matches.join(", "))]
    AmbiguousField { tag: String, matches: Vec<String> },

    /// Two alignments that should be mates do not form a concordant pair.
    #[error("inconsistent read pair: {violation}\n{fwd}\n{rev}")]
    Consistency {
        violation: PairViolation,
        fwd: String,
        rev: String,
    },

    /// The stream ended after the first alignment of a pair.
    #[error("unpaired SAM file: no mate found for alignment\n{0}")]
    UnpairedInput(String),

    #[error("missing mandatory field '{field}' in alignment\n{line}")]
    MissingField { field: &'static str, line: String },

    #[error("invalid value '{value}' for field '{field}'")]
    InvalidField { field: &'static str, value: String },

    #[error("malformed optional field '{0}', expected TAG:TYPE:VALUE")]
    MalformedOptionalField(String),

    #[error("invalid taxid entry for genome '{genome}': {reason}")]
    InvalidTaxid { genome: String, reason: String },
}

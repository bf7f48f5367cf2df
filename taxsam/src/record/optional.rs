use crate::error::{Error, Result};

/// Optional-field tags reported by the aligner that end up in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionalTag {
    AlignmentScore,
    NextBestAlignment,
    EditDistance,
    MateAlignmentScore,
    PairStatus,
}

impl OptionalTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionalTag::AlignmentScore => "AS",
            OptionalTag::NextBestAlignment => "XS",
            OptionalTag::EditDistance => "NM",
            OptionalTag::MateAlignmentScore => "YS",
            OptionalTag::PairStatus => "YT",
        }
    }
}

impl std::fmt::Display for OptionalTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values of the optional fields, kept as the raw text after `TAG:TYPE:`.
/// Absent fields stay `None`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OptionalFields {
    pub alignment_score: Option<String>,
    pub next_best_alignment: Option<String>,
    pub edit_distance: Option<String>,
    pub mate_alignment_score: Option<String>,
    pub pair_status: Option<String>,
}

impl OptionalFields {
    pub fn get(&self, tag: OptionalTag) -> Option<&str> {
        match tag {
            OptionalTag::AlignmentScore => self.alignment_score.as_deref(),
            OptionalTag::NextBestAlignment => self.next_best_alignment.as_deref(),
            OptionalTag::EditDistance => self.edit_distance.as_deref(),
            OptionalTag::MateAlignmentScore => self.mate_alignment_score.as_deref(),
            OptionalTag::PairStatus => self.pair_status.as_deref(),
        }
    }

    fn set(&mut self, tag: OptionalTag, value: Option<String>) {
        match tag {
            OptionalTag::AlignmentScore => self.alignment_score = value,
            OptionalTag::NextBestAlignment => self.next_best_alignment = value,
            OptionalTag::EditDistance => self.edit_distance = value,
            OptionalTag::MateAlignmentScore => self.mate_alignment_score = value,
            OptionalTag::PairStatus => self.pair_status = value,
        }
    }
}

/// Split a `TAG:TYPE:VALUE` token on its first two colons. The type must be a
/// single character; the value may itself contain colons.
fn split_field(token: &str) -> Option<(&str, &str, &str)> {
    let mut parts = token.splitn(3, ':');
    let tag = parts.next()?;
    let ty = parts.next()?;
    let value = parts.next()?;
    if ty.chars().count() == 1 {
        Some((tag, ty, value))
    } else {
        None
    }
}

fn field_tag(token: &str) -> &str {
    token.split_once(':').map_or(token, |(tag, _)| tag)
}

/// Look up the value of `tag` among the optional fields of an alignment.
///
/// Returns `default` when no field carries the tag and the raw value when
/// exactly one does. Several fields with the same tag are an error.
pub fn extract<S: AsRef<str>>(fields: &[S], tag: &str, default: Option<&str>) -> Result<Option<String>> {
    let matches: Vec<&str> = fields
        .iter()
        .map(|f| f.as_ref())
        .filter(|f| field_tag(f) == tag)
        .collect();
    match matches.as_slice() {
        [] => Ok(default.map(str::to_string)),
        [field] => {
            let (_, _, value) = split_field(field)
                .ok_or_else(|| Error::MalformedOptionalField(field.to_string()))?;
            Ok(Some(value.to_string()))
        }
        _ => Err(Error::AmbiguousField {
            tag: tag.to_string(),
            matches: matches.iter().map(|x| x.to_string()).collect(),
        }),
    }
}

/// Extract the optional fields named by `tags`; tags not listed stay absent.
pub fn extract_optional_fields<S: AsRef<str>>(fields: &[S], tags: &[OptionalTag]) -> Result<OptionalFields> {
    let mut out = OptionalFields::default();
    for tag in tags {
        out.set(*tag, extract(fields, tag.as_str(), None)?);
    }
    Ok(out)
}

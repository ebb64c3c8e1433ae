use thiserror::Error;
use tracing::debug;

use crate::core::record::SupplementaryAlignment;
use crate::core::types::Strand;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaTagError {
    #[error("SA entry '{0}' does not have 6 comma-separated fields")]
    FieldCount(String),

    #[error("SA entry '{entry}' has an invalid {field}")]
    InvalidField { entry: String, field: &'static str },
}

/// Parse one `SA` entry: `rname,pos,strand,CIGAR,mapQ,NM`
///
/// # Errors
///
/// Returns `SaTagError::FieldCount` if the entry doesn't have exactly six fields, or
/// `SaTagError::InvalidField` if the contig is empty, the position is zero or not a
/// number, the strand isn't `+`/`-`, or the mapping quality or edit distance isn't a
/// number.
pub fn parse_sa_entry(entry: &str) -> Result<SupplementaryAlignment, SaTagError> {
    let fields: Vec<&str> = entry.split(',').collect();
    if fields.len() != 6 {
        return Err(SaTagError::FieldCount(entry.to_string()));
    }

    let invalid = |field: &'static str| SaTagError::InvalidField {
        entry: entry.to_string(),
        field,
    };

    let contig = fields[0];
    if contig.is_empty() || contig == "*" {
        return Err(invalid("contig"));
    }

    let position: u64 = fields[1].parse().map_err(|_| invalid("position"))?;
    if position == 0 {
        return Err(invalid("position"));
    }

    let strand = Strand::parse(fields[2]).ok_or_else(|| invalid("strand"))?;

    let cigar = fields[3];
    if cigar.is_empty() {
        return Err(invalid("CIGAR"));
    }

    let mapping_quality: u8 = fields[4].parse().map_err(|_| invalid("mapping quality"))?;
    let edit_distance: u32 = fields[5].parse().map_err(|_| invalid("edit distance"))?;

    Ok(SupplementaryAlignment {
        contig: contig.to_string(),
        position,
        strand,
        cigar: cigar.to_string(),
        mapping_quality,
        edit_distance,
    })
}

/// Parse a full `SA:Z` value into its entries.
///
/// Malformed entries are skipped; the second element of the result counts them so the
/// caller can report them.
#[must_use]
pub fn parse_sa_tag(value: &str) -> (Vec<SupplementaryAlignment>, usize) {
    let mut alignments = Vec::new();
    let mut malformed = 0;

    for entry in value.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        match parse_sa_entry(entry) {
            Ok(alignment) => alignments.push(alignment),
            Err(e) => {
                debug!(error = %e, "Skipping malformed SA entry");
                malformed += 1;
            }
        }
    }

    (alignments, malformed)
}

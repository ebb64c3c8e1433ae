use std::path::Path;
use thiserror::Error;

use crate::core::types::{RegionError, SliceRegion};
use crate::utils::validation::{check_region_limit, parse_coordinate};

#[derive(Error, Debug)]
pub enum RegionParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid region '{text}': {reason}")]
    InvalidFormat { text: String, reason: String },

    #[error("Invalid region '{text}': {source}")]
    InvalidBounds {
        text: String,
        #[source]
        source: RegionError,
    },

    #[error("BED line {line}: {reason}")]
    InvalidBedLine { line: usize, reason: String },

    #[error("Unknown contig '{0}': not present in the alignment header")]
    UnknownContig(String),

    #[error("Too many regions: {0} exceeds maximum allowed")]
    TooManyRegions(usize),
}

/// A region string as written by the user; the end is absent for whole-contig regions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSpec {
    pub contig: String,
    pub start: u64,
    pub end: Option<u64>,
    text: String,
}

impl RegionSpec {
    /// Resolve to a concrete region, looking up the contig length for whole-contig specs
    ///
    /// # Errors
    ///
    /// Returns `RegionParseError::UnknownContig` when the end must come from a contig
    /// length that `contig_length` doesn't know, or `RegionParseError::InvalidBounds` when
    /// the resolved bounds are invalid.
    pub fn resolve<F>(&self, contig_length: F) -> Result<SliceRegion, RegionParseError>
    where
        F: Fn(&str) -> Option<u64>,
    {
        let end = match self.end {
            Some(end) => end,
            None => contig_length(&self.contig)
                .ok_or_else(|| RegionParseError::UnknownContig(self.contig.clone()))?,
        };
        SliceRegion::new(self.contig.clone(), self.start, end).map_err(|source| {
            RegionParseError::InvalidBounds {
                text: self.text.clone(),
                source,
            }
        })
    }
}

/// Parse a samtools-style region: `contig`, `contig:pos`, or `contig:start-end`.
///
/// Coordinates are 1-based and inclusive; thousands separators (`,` or `_`) are allowed.
/// The last `:` splits contig from coordinates so that contig names containing `:`
/// (e.g. HLA alleles) still parse when coordinates are given.
///
/// # Errors
///
/// Returns `RegionParseError::InvalidFormat` for empty input or unparseable coordinates,
/// or `RegionParseError::InvalidBounds` if start is zero or after end.
pub fn parse_region(text: &str) -> Result<RegionSpec, RegionParseError> {
    let trimmed = text.trim();
    let invalid = |reason: &str| RegionParseError::InvalidFormat {
        text: trimmed.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("empty region"));
    }

    let Some((contig, coords)) = trimmed.rsplit_once(':') else {
        return Ok(RegionSpec {
            contig: trimmed.to_string(),
            start: 1,
            end: None,
            text: trimmed.to_string(),
        });
    };

    if contig.is_empty() {
        return Err(invalid("missing contig name"));
    }

    let (start, end) = match coords.split_once('-') {
        Some((start, end)) => {
            let start = parse_coordinate(start).ok_or_else(|| invalid("invalid start"))?;
            let end = parse_coordinate(end).ok_or_else(|| invalid("invalid end"))?;
            (start, end)
        }
        None => {
            let pos = parse_coordinate(coords).ok_or_else(|| invalid("invalid position"))?;
            (pos, pos)
        }
    };

    SliceRegion::new(contig, start, end).map_err(|source| RegionParseError::InvalidBounds {
        text: trimmed.to_string(),
        source,
    })?;

    Ok(RegionSpec {
        contig: contig.to_string(),
        start,
        end: Some(end),
        text: trimmed.to_string(),
    })
}

/// Parse a BED file into 1-based inclusive regions
///
/// # Errors
///
/// Returns `RegionParseError::Io` if the file cannot be read, or any error from
/// [`parse_bed_text`].
pub fn parse_bed_file(path: &Path) -> Result<Vec<SliceRegion>, RegionParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_bed_text(&content)
}

/// Parse BED text (`contig<TAB>start<TAB>end...`, 0-based half-open).
///
/// Blank lines and `#`, `track`, and `browser` lines are skipped; extra columns are
/// ignored.
///
/// # Errors
///
/// Returns `RegionParseError::InvalidBedLine` for lines with fewer than three columns,
/// non-numeric coordinates, or an empty interval, and `RegionParseError::TooManyRegions`
/// if the region limit is exceeded.
pub fn parse_bed_text(text: &str) -> Result<Vec<SliceRegion>, RegionParseError> {
    let mut regions = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = line.trim_end_matches('\r');

        if line.trim().is_empty()
            || line.starts_with('#')
            || line.starts_with("track")
            || line.starts_with("browser")
        {
            continue;
        }

        let invalid = |reason: String| RegionParseError::InvalidBedLine {
            line: line_number,
            reason,
        };

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            return Err(invalid(format!(
                "expected at least 3 tab-separated columns, found {}",
                fields.len()
            )));
        }

        let start: u64 = fields[1]
            .trim()
            .parse()
            .map_err(|_| invalid(format!("invalid start '{}'", fields[1])))?;
        let end: u64 = fields[2]
            .trim()
            .parse()
            .map_err(|_| invalid(format!("invalid end '{}'", fields[2])))?;

        if end <= start {
            return Err(invalid(format!("empty interval {start}-{end}")));
        }

        if check_region_limit(regions.len()).is_some() {
            return Err(RegionParseError::TooManyRegions(regions.len()));
        }

        // 0-based half-open [start, end) is 1-based closed [start + 1, end]
        let region = SliceRegion::new(fields[0].trim(), start + 1, end)
            .map_err(|e| invalid(e.to_string()))?;
        regions.push(region);
    }

    Ok(regions)
}

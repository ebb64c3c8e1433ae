use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Strand of an alignment relative to the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    #[must_use]
    pub fn from_reverse_flag(is_reverse: bool) -> Self {
        if is_reverse {
            Self::Reverse
        } else {
            Self::Forward
        }
    }

    /// Parse a strand from its SAM text form (`+` or `-`)
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Self::Forward),
            "-" => Some(Self::Reverse),
            _ => None,
        }
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "+"),
            Self::Reverse => write!(f, "-"),
        }
    }
}

/// Location of one physical alignment record.
///
/// Two records match the same signature when contig and 1-based start position are
/// equal; strand is not part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionSignature {
    pub contig: String,
    pub position: u64,
}

impl PositionSignature {
    pub fn new(contig: impl Into<String>, position: u64) -> Self {
        Self {
            contig: contig.into(),
            position,
        }
    }
}

impl std::fmt::Display for PositionSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.contig, self.position)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    #[error("Region start must be >= 1 (coordinates are 1-based)")]
    ZeroStart,

    #[error("Region start {start} is after end {end}")]
    Inverted { start: u64, end: u64 },

    #[error("Region contig name is empty")]
    EmptyContig,
}

/// A 1-based, fully closed interval on one contig to scan for overlapping records
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SliceRegion {
    contig: String,
    start: u64,
    end: u64,
}

impl SliceRegion {
    /// Create a region, checking that `1 <= start <= end`
    ///
    /// # Errors
    ///
    /// Returns `RegionError` if the contig is empty, `start` is zero, or `start > end`.
    pub fn new(contig: impl Into<String>, start: u64, end: u64) -> Result<Self, RegionError> {
        let contig = contig.into();
        if contig.is_empty() {
            return Err(RegionError::EmptyContig);
        }
        if start == 0 {
            return Err(RegionError::ZeroStart);
        }
        if start > end {
            return Err(RegionError::Inverted { start, end });
        }
        Ok(Self { contig, start, end })
    }

    /// The region spanning an entire contig of the given length
    ///
    /// # Errors
    ///
    /// Returns `RegionError` if the contig is empty or has zero length.
    pub fn whole_contig(contig: impl Into<String>, length: u64) -> Result<Self, RegionError> {
        Self::new(contig, 1, length)
    }

    /// A region of `margin` bases either side of a bare position, clamped at 1
    #[must_use]
    pub fn around(signature: &PositionSignature, margin: u64) -> Self {
        let position = signature.position.max(1);
        Self {
            contig: signature.contig.clone(),
            start: position.saturating_sub(margin).max(1),
            end: position.saturating_add(margin),
        }
    }

    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bases covered
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Regions always cover at least one base
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True if the closed span `[start, end]` on `contig` shares at least one base
    #[must_use]
    pub fn overlaps_span(&self, contig: &str, start: u64, end: u64) -> bool {
        self.contig == contig && start <= self.end && end >= self.start
    }

    #[must_use]
    pub fn overlaps(&self, other: &SliceRegion) -> bool {
        self.overlaps_span(&other.contig, other.start, other.end)
    }

    #[must_use]
    pub fn covers(&self, signature: &PositionSignature) -> bool {
        self.contig == signature.contig
            && signature.position >= self.start
            && signature.position <= self.end
    }

    /// True if `other` lies entirely inside this region
    #[must_use]
    pub fn contains(&self, other: &SliceRegion) -> bool {
        self.contig == other.contig && other.start >= self.start && other.end <= self.end
    }
}

impl std::fmt::Display for SliceRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}

use serde::Serialize;

use crate::core::types::{PositionSignature, SliceRegion, Strand};

/// One entry of a record's supplementary-alignment (`SA`) list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplementaryAlignment {
    pub contig: String,

    /// 1-based start of the other alignment
    pub position: u64,

    pub strand: Strand,

    pub cigar: String,

    pub mapping_quality: u8,

    /// Edit distance (NM) of the other alignment
    pub edit_distance: u32,
}

impl SupplementaryAlignment {
    #[must_use]
    pub fn signature(&self) -> PositionSignature {
        PositionSignature::new(self.contig.clone(), self.position)
    }
}

/// The fields that tell two records of one read apart.
///
/// Used to remember which records a region has already delivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordIdentity {
    pub name: String,
    pub contig: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub is_supplementary: bool,
    pub is_secondary: bool,
    pub mate: Option<PositionSignature>,
}

/// The read-only view of an alignment record that the slicing engine works from.
///
/// `payload` carries the source's own record (e.g. a noodles `RecordBuf`) through to the
/// sink untouched.
#[derive(Debug, Clone)]
pub struct AlignmentRecord<P = ()> {
    /// Read (template) name shared by every record of a fragment
    pub name: String,

    pub contig: String,

    /// 1-based alignment start
    pub start: u64,

    /// 1-based inclusive alignment end derived from the CIGAR
    pub end: u64,

    pub strand: Strand,

    pub mapping_quality: u8,

    pub is_paired: bool,

    pub is_supplementary: bool,

    pub is_secondary: bool,

    pub is_unmapped: bool,

    /// Location of the mate, present only when paired and the mate is mapped
    pub mate: Option<PositionSignature>,

    /// Parsed `SA` entries, in tag order
    pub supplementary_alignments: Vec<SupplementaryAlignment>,

    /// `SA` entries (or mate fields) that could not be turned into a signature
    pub malformed_links: usize,

    pub payload: P,
}

impl AlignmentRecord<()> {
    /// A mapped, unpaired, primary record covering `span` reference bases from `start`
    pub fn new(name: impl Into<String>, contig: impl Into<String>, start: u64, span: u64) -> Self {
        let start = start.max(1);
        Self {
            name: name.into(),
            contig: contig.into(),
            start,
            end: start + span.max(1) - 1,
            strand: Strand::Forward,
            mapping_quality: 60,
            is_paired: false,
            is_supplementary: false,
            is_secondary: false,
            is_unmapped: false,
            mate: None,
            supplementary_alignments: Vec::new(),
            malformed_links: 0,
            payload: (),
        }
    }
}

impl<P> AlignmentRecord<P> {
    /// Mark the record as paired with a mapped mate at `contig:position`
    #[must_use]
    pub fn with_mate(mut self, contig: impl Into<String>, position: u64) -> Self {
        self.is_paired = true;
        self.mate = Some(PositionSignature::new(contig, position));
        self
    }

    /// Add an `SA` entry pointing at `contig:position`
    #[must_use]
    pub fn with_supplementary(mut self, contig: impl Into<String>, position: u64) -> Self {
        self.supplementary_alignments.push(SupplementaryAlignment {
            contig: contig.into(),
            position,
            strand: Strand::Forward,
            cigar: String::from("*"),
            mapping_quality: 60,
            edit_distance: 0,
        });
        self
    }

    #[must_use]
    pub fn as_supplementary(mut self) -> Self {
        self.is_supplementary = true;
        self
    }

    #[must_use]
    pub fn with_mapping_quality(mut self, mapping_quality: u8) -> Self {
        self.mapping_quality = mapping_quality;
        self
    }

    /// Replace the payload, keeping every other field
    pub fn with_payload<Q>(self, payload: Q) -> AlignmentRecord<Q> {
        AlignmentRecord {
            name: self.name,
            contig: self.contig,
            start: self.start,
            end: self.end,
            strand: self.strand,
            mapping_quality: self.mapping_quality,
            is_paired: self.is_paired,
            is_supplementary: self.is_supplementary,
            is_secondary: self.is_secondary,
            is_unmapped: self.is_unmapped,
            mate: self.mate,
            supplementary_alignments: self.supplementary_alignments,
            malformed_links: self.malformed_links,
            payload,
        }
    }

    #[must_use]
    pub fn signature(&self) -> PositionSignature {
        PositionSignature::new(self.contig.clone(), self.start)
    }

    #[must_use]
    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity {
            name: self.name.clone(),
            contig: self.contig.clone(),
            start: self.start,
            end: self.end,
            strand: self.strand,
            is_supplementary: self.is_supplementary,
            is_secondary: self.is_secondary,
            mate: self.mate_signature().cloned(),
        }
    }

    /// True if the record's mapped footprint shares at least one base with `region`
    #[must_use]
    pub fn overlaps(&self, region: &SliceRegion) -> bool {
        region.overlaps_span(&self.contig, self.start, self.end)
    }

    /// The mate signature, if this record asserts a mapped mate
    #[must_use]
    pub fn mate_signature(&self) -> Option<&PositionSignature> {
        if self.is_paired {
            self.mate.as_ref()
        } else {
            None
        }
    }
}

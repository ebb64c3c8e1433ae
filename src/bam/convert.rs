//! Conversion from noodles record buffers to engine records.

use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::Header;

use crate::core::record::AlignmentRecord;
use crate::core::types::{PositionSignature, Strand};
use crate::engine::scanner::RegionQueryError;
use crate::parsing::sa_tag::parse_sa_tag;

/// The `SA` (other canonical alignments in a chimeric alignment) tag
const SA_TAG: Tag = Tag::new(b'S', b'A');

/// Mapping quality reported when the record's MAPQ is 255 (unavailable)
const MISSING_MAPQ: u8 = 255;

fn contig_name(header: &Header, id: usize) -> Option<String> {
    header
        .reference_sequences()
        .get_index(id)
        .map(|(name, _)| name.to_string())
}

/// Convert a record read from an alignment file.
///
/// Returns `Ok(None)` for records with no placement (no reference or no start), which
/// can't overlap any region. Mate and `SA` fields that can't be turned into a
/// signature are counted in `malformed_links` and otherwise ignored.
///
/// # Errors
///
/// Returns `RegionQueryError::Record` if the record has no read name or refers to a
/// reference sequence missing from `header`.
pub fn to_alignment_record(
    header: &Header,
    record: RecordBuf,
) -> Result<Option<AlignmentRecord<RecordBuf>>, RegionQueryError> {
    let (Some(reference_id), Some(alignment_start)) =
        (record.reference_sequence_id(), record.alignment_start())
    else {
        return Ok(None);
    };

    let name = record
        .name()
        .map(|name| name.to_string())
        .ok_or_else(|| RegionQueryError::Record(String::from("record has no read name")))?;

    let contig = contig_name(header, reference_id).ok_or_else(|| {
        RegionQueryError::Record(format!(
            "read {name} refers to reference sequence {reference_id}, which is not in the header"
        ))
    })?;

    let flags = record.flags();
    let start = usize::from(alignment_start) as u64;
    let end = if flags.is_unmapped() {
        start
    } else {
        record
            .alignment_end()
            .map_or(start, |end| usize::from(end) as u64)
            .max(start)
    };

    let mut malformed_links = 0;

    let is_paired = flags.is_segmented();
    let mate = if is_paired && !flags.is_mate_unmapped() {
        match (record.mate_reference_sequence_id(), record.mate_alignment_start()) {
            (Some(mate_id), Some(mate_start)) => match contig_name(header, mate_id) {
                Some(mate_contig) => Some(PositionSignature::new(
                    mate_contig,
                    usize::from(mate_start) as u64,
                )),
                None => {
                    malformed_links += 1;
                    None
                }
            },
            _ => {
                malformed_links += 1;
                None
            }
        }
    } else {
        None
    };

    let supplementary_alignments = match record.data().get(&SA_TAG) {
        Some(Value::String(value)) => match std::str::from_utf8(value) {
            Ok(text) => {
                let (entries, malformed) = parse_sa_tag(text);
                malformed_links += malformed;
                entries
            }
            Err(_) => {
                malformed_links += 1;
                Vec::new()
            }
        },
        Some(_) => {
            malformed_links += 1;
            Vec::new()
        }
        None => Vec::new(),
    };

    let mapping_quality = record
        .mapping_quality()
        .map_or(MISSING_MAPQ, |mapq| mapq.get());

    Ok(Some(AlignmentRecord {
        name,
        contig,
        start,
        end,
        strand: Strand::from_reverse_flag(flags.is_reverse_complemented()),
        mapping_quality,
        is_paired,
        is_supplementary: flags.is_supplementary(),
        is_secondary: flags.is_secondary(),
        is_unmapped: flags.is_unmapped(),
        mate,
        supplementary_alignments,
        malformed_links,
        payload: record,
    }))
}

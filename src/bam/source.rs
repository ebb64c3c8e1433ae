use noodles::bam;
use noodles::core::{Position, Region};
use noodles::sam::alignment::RecordBuf;
use noodles::sam::Header;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::bam::convert::to_alignment_record;
use crate::core::record::AlignmentRecord;
use crate::core::types::SliceRegion;
use crate::engine::scanner::{AlignmentSource, RegionQueryError};

/// The alignment file can't be used at all
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open indexed BAM {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read header of {path}: {source}")]
    Header {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A coordinate-sorted, indexed BAM file.
///
/// Each query opens its own reader, so workers never share a file handle.
#[derive(Debug)]
pub struct BamSource {
    path: PathBuf,
    header: Header,
    contig_lengths: HashMap<String, u64>,
}

impl BamSource {
    /// Open `path` and its index (`.bai` or `.csi` alongside it) and read the header.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Open` if the file or its index can't be opened, or
    /// `SourceError::Header` if the header can't be read.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let display = path.display().to_string();
        let mut reader = bam::io::indexed_reader::Builder::default()
            .build_from_path(path)
            .map_err(|source| SourceError::Open {
                path: display.clone(),
                source,
            })?;
        let header = reader.read_header().map_err(|source| SourceError::Header {
            path: display,
            source,
        })?;

        let contig_lengths = header
            .reference_sequences()
            .iter()
            .map(|(name, map)| (name.to_string(), usize::from(map.length()) as u64))
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            header,
            contig_lengths,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn position(value: u64, region: &SliceRegion) -> Result<Position, RegionQueryError> {
    usize::try_from(value)
        .ok()
        .and_then(|value| Position::try_from(value).ok())
        .ok_or_else(|| RegionQueryError::InvalidInterval(region.to_string()))
}

impl AlignmentSource for BamSource {
    type Payload = RecordBuf;

    fn contig_length(&self, contig: &str) -> Option<u64> {
        self.contig_lengths.get(contig).copied()
    }

    fn query(
        &self,
        region: &SliceRegion,
        visit: &mut dyn FnMut(AlignmentRecord<RecordBuf>) -> ControlFlow<()>,
    ) -> Result<(), RegionQueryError> {
        let Some(&length) = self.contig_lengths.get(region.contig()) else {
            return Err(RegionQueryError::UnknownContig(region.contig().to_string()));
        };
        if region.start() > length {
            debug!(region = %region, length, "Region starts past the end of its contig");
            return Ok(());
        }

        let start = position(region.start(), region)?;
        let end = position(region.end().min(length), region)?;
        let interval = Region::new(region.contig(), start..=end);

        let mut reader = bam::io::indexed_reader::Builder::default().build_from_path(&self.path)?;
        // The header has to be consumed before records can be read
        reader.read_header()?;

        let query = reader.query(&self.header, &interval)?;
        for result in query {
            let record = result?;
            let record = RecordBuf::try_from_alignment_record(&self.header, &record)?;
            if let Some(record) = to_alignment_record(&self.header, record)? {
                if visit(record).is_break() {
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noodles::bam::bai;
    use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;
    use noodles::csi::binning_index::Indexer;
    use noodles::sam::alignment::io::Write as _;
    use noodles::sam::alignment::record::cigar::op::{Kind, Op};
    use noodles::sam::alignment::record::Flags;
    use noodles::sam::alignment::record_buf::Cigar;
    use noodles::sam::alignment::Record as _;
    use noodles::sam::header::record::value::map::ReferenceSequence;
    use noodles::sam::header::record::value::Map;
    use std::num::NonZeroUsize;

    fn record(name: &str, start: usize) -> RecordBuf {
        RecordBuf::builder()
            .set_name(bstr::BString::from(name))
            .set_flags(Flags::empty())
            .set_reference_sequence_id(0)
            .set_alignment_start(Position::try_from(start).unwrap())
            .set_cigar(Cigar::from(vec![Op::new(Kind::Match, 100)]))
            .build()
    }

    /// Write coordinate-sorted `records` to `path` and index it alongside as `.bai`
    fn write_indexed_bam(path: &Path, records: &[RecordBuf]) {
        let header = Header::builder()
            .add_reference_sequence(
                "chr1",
                Map::<ReferenceSequence>::new(NonZeroUsize::new(10_000).unwrap()),
            )
            .build();

        let mut writer = bam::io::writer::Builder.build_from_path(path).unwrap();
        writer.write_alignment_header(&header).unwrap();
        for record in records {
            writer.write_alignment_record(&header, record).unwrap();
        }
        writer.try_finish().unwrap();

        let mut reader = bam::io::reader::Builder.build_from_path(path).unwrap();
        let header = reader.read_header().unwrap();
        let mut indexer = Indexer::default();
        let mut record = bam::Record::default();
        let mut start = reader.get_ref().virtual_position();
        while reader.read_record(&mut record).unwrap() != 0 {
            let end = reader.get_ref().virtual_position();
            let context = match (
                record.reference_sequence_id().transpose().unwrap(),
                record.alignment_start().transpose().unwrap(),
                record.alignment_end().transpose().unwrap(),
            ) {
                (Some(id), Some(first), Some(last)) => {
                    Some((id, first, last, !record.flags().is_unmapped()))
                }
                _ => None,
            };
            indexer.add_record(context, Chunk::new(start, end)).unwrap();
            start = end;
        }
        let index: bai::Index = indexer.build(header.reference_sequences().len());

        let mut index_path = path.as_os_str().to_owned();
        index_path.push(".bai");
        bai::write(index_path, &index).unwrap();
    }

    fn query_names(source: &BamSource, region: &SliceRegion) -> Vec<String> {
        let mut names = Vec::new();
        source
            .query(region, &mut |record| {
                names.push(record.name);
                ControlFlow::Continue(())
            })
            .unwrap();
        names
    }

    #[test]
    fn test_query_visits_overlapping_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sorted.bam");
        write_indexed_bam(
            &path,
            &[record("left", 100), record("middle", 1000), record("right", 9800)],
        );

        let source = BamSource::open(&path).unwrap();
        assert_eq!(source.contig_length("chr1"), Some(10_000));

        // middle spans 1000-1099 and reaches into the region from the left
        let region = SliceRegion::new("chr1", 1050, 1200).unwrap();
        assert_eq!(query_names(&source, &region), vec!["middle"]);

        // The end is clamped to the contig length
        let region = SliceRegion::new("chr1", 9000, 50_000).unwrap();
        assert_eq!(query_names(&source, &region), vec!["right"]);

        let past_end = SliceRegion::new("chr1", 20_000, 30_000).unwrap();
        assert!(query_names(&source, &past_end).is_empty());

        let unknown = SliceRegion::new("chrUn", 1, 10).unwrap();
        assert!(matches!(
            source.query(&unknown, &mut |_| ControlFlow::Continue(())),
            Err(RegionQueryError::UnknownContig(_))
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let result = BamSource::open(Path::new("/nonexistent/input.bam"));
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }

    #[test]
    fn test_open_without_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unindexed.bam");
        std::fs::write(&path, b"not a bam").unwrap();

        let result = BamSource::open(&path);
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }
}

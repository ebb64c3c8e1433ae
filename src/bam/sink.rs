use noodles::bam;
use noodles::sam;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::Header;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use crate::core::record::AlignmentRecord;
use crate::engine::scanner::RecordSink;

/// Writes accepted records to a BAM or SAM file in acceptance order.
///
/// The output is not coordinate sorted; sort and index it before using it as an
/// indexed input.
pub struct AlignmentWriterSink {
    header: Header,
    writer: Mutex<Box<dyn AlignmentWrite + Send>>,
}

impl std::fmt::Debug for AlignmentWriterSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignmentWriterSink").finish_non_exhaustive()
    }
}

impl AlignmentWriterSink {
    /// Create `path` and write `header` to it. A `.sam` extension writes SAM text;
    /// anything else writes BAM.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file can't be created or the header can't be written.
    pub fn create(path: &Path, header: Header) -> io::Result<Self> {
        let is_sam = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sam"));

        let mut writer: Box<dyn AlignmentWrite + Send> = if is_sam {
            let file = BufWriter::new(File::create(path)?);
            Box::new(sam::io::Writer::new(file))
        } else {
            Box::new(bam::io::writer::Builder.build_from_path(path)?)
        };
        writer.write_alignment_header(&header)?;

        Ok(Self {
            header,
            writer: Mutex::new(writer),
        })
    }

    /// Flush buffered records and finalize the file (the BGZF EOF block for BAM)
    ///
    /// # Errors
    ///
    /// Returns an IO error if the final write fails.
    pub fn finish(self) -> io::Result<()> {
        let mut writer = self.writer.into_inner();
        writer.finish(&self.header)
    }
}

impl RecordSink<RecordBuf> for AlignmentWriterSink {
    fn accept(&self, record: AlignmentRecord<RecordBuf>) -> io::Result<()> {
        self.writer
            .lock()
            .write_alignment_record(&self.header, &record.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noodles::core::Position;
    use noodles::sam::alignment::record::cigar::op::{Kind, Op};
    use noodles::sam::alignment::record::Flags;
    use noodles::sam::alignment::record_buf::Cigar;
    use noodles::sam::header::record::value::map::ReferenceSequence;
    use noodles::sam::header::record::value::Map;
    use std::num::NonZeroUsize;

    fn header() -> Header {
        Header::builder()
            .add_reference_sequence(
                "chr1",
                Map::<ReferenceSequence>::new(NonZeroUsize::new(10_000).unwrap()),
            )
            .build()
    }

    fn accepted(name: &str, start: usize) -> AlignmentRecord<RecordBuf> {
        let record = RecordBuf::builder()
            .set_name(bstr::BString::from(name))
            .set_flags(Flags::empty())
            .set_reference_sequence_id(0)
            .set_alignment_start(Position::try_from(start).unwrap())
            .set_cigar(Cigar::from(vec![Op::new(Kind::Match, 10)]))
            .build();
        AlignmentRecord::new(name, "chr1", start as u64, 10).with_payload(record)
    }

    #[test]
    fn test_bam_output_keeps_acceptance_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bam");

        let sink = AlignmentWriterSink::create(&path, header()).unwrap();
        sink.accept(accepted("second", 500)).unwrap();
        sink.accept(accepted("first", 100)).unwrap();
        sink.finish().unwrap();

        let mut reader = bam::io::reader::Builder.build_from_path(&path).unwrap();
        let header = reader.read_header().unwrap();
        let names: Vec<String> = reader
            .records()
            .map(|result| {
                let record = result.unwrap();
                let record = RecordBuf::try_from_alignment_record(&header, &record).unwrap();
                record.name().unwrap().to_string()
            })
            .collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[test]
    fn test_sam_output_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sam");

        let sink = AlignmentWriterSink::create(&path, header()).unwrap();
        sink.accept(accepted("read1", 100)).unwrap();
        sink.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("@SQ\tSN:chr1\tLN:10000"));
        assert!(text.lines().any(|line| line.starts_with("read1\t0\tchr1\t100\t")));
    }
}

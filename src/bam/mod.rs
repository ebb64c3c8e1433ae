//! BAM-backed implementations of the engine's source and sink.
//!
//! - [`source::BamSource`]: indexed, coordinate-sorted BAM queried region by region
//! - [`sink::AlignmentWriterSink`]: BAM or SAM output, chosen by file extension
//! - [`convert`]: noodles record buffers to engine records (footprint, mate, `SA` tag)

pub mod convert;
pub mod sink;
pub mod source;

pub use sink::AlignmentWriterSink;
pub use source::{BamSource, SourceError};

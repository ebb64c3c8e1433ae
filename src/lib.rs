//! # frag-slicer
//!
//! A library for slicing alignment files around structural-variant breakpoints.
//!
//! Reads at a breakpoint rarely tell the whole story on their own: a read's mate, or a
//! supplementary alignment of the same read, often maps to a different chromosome. A
//! plain region query returns only the records overlapping the region and leaves those
//! fragments half-present.
//!
//! `frag-slicer` starts from a set of regions and keeps following mate and `SA` links
//! into new regions until every fragment it touched is complete.
//!
//! ## Features
//!
//! - **Link following**: Mates and supplementary alignments are chased across contigs
//! - **Bounded memory**: Only fragments still waiting on a record are held
//! - **Exactly-once output**: A record overlapping several regions is written by the
//!   earliest one that reaches it, and a region that fails partway keeps only what it
//!   already wrote
//! - **Parallel scanning**: Regions are scanned by a pool of workers
//! - **Partial results**: Capacity limits, deadlines, and cancellation produce a
//!   truncated summary listing the fragments left incomplete
//!
//! ## Example
//!
//! ```rust,no_run
//! use frag_slicer::bam::{AlignmentWriterSink, BamSource};
//! use frag_slicer::parsing::region::parse_region;
//! use frag_slicer::{AlignmentSource, SliceConfig, SliceEngine};
//! use std::path::Path;
//!
//! let source = BamSource::open(Path::new("sample.bam")).unwrap();
//! let region = parse_region("chr1:1,000,000-1,001,000")
//!     .unwrap()
//!     .resolve(|contig| source.contig_length(contig))
//!     .unwrap();
//!
//! let sink = AlignmentWriterSink::create(Path::new("slice.bam"), source.header().clone()).unwrap();
//! let summary = SliceEngine::new(&source, &sink, SliceConfig::default())
//!     .run(vec![region])
//!     .unwrap();
//! sink.finish().unwrap();
//!
//! println!("{} records, {}", summary.records_accepted, summary.status);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Positions, regions, records, and configuration
//! - [`engine`]: Frontier, fragment registry, region scanner, and the worker pool
//! - [`bam`]: Indexed BAM source and BAM/SAM output
//! - [`parsing`]: Region strings, BED files, and `SA` tags
//! - [`cli`]: Command-line interface implementation

pub mod bam;
pub mod cli;
pub mod core;
pub mod engine;
pub mod parsing;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::config::SliceConfig;
pub use core::record::{AlignmentRecord, SupplementaryAlignment};
pub use core::types::*;
pub use engine::driver::{CancelFlag, RunStatus, SliceEngine, SliceSummary, TruncationReason};
pub use engine::scanner::{AlignmentSource, RecordSink, VecSink};

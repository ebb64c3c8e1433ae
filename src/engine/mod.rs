//! The breakpoint-linked fragment extraction engine.
//!
//! Starting from a set of regions, the engine collects every record that overlaps them
//! plus every mate and supplementary alignment linked to those records, following the
//! links into regions nobody asked for:
//!
//! - [`frontier::Frontier`] holds the regions to scan and grows as links are discovered
//! - [`scanner::RegionScanner`] queries one region and decides which records to accept
//! - [`registry::FragmentRegistry`] tracks, per read name, which records have been seen
//!   and which are still expected
//! - [`driver::SliceEngine`] runs a pool of workers until the frontier drains
//!
//! Accepted records go to a [`scanner::RecordSink`] as soon as they are accepted.

pub mod driver;
pub mod frontier;
pub mod registry;
pub mod scanner;

pub use driver::{CancelFlag, EngineError, RunStatus, SliceEngine, SliceSummary, TruncationReason};
pub use scanner::{AlignmentSource, RecordSink, RegionQueryError, VecSink};

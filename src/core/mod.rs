//! Core data types for breakpoint-linked slicing.
//!
//! - [`PositionSignature`](types::PositionSignature): where one physical record sits
//!   (contig + 1-based start)
//! - [`SliceRegion`](types::SliceRegion): a 1-based closed interval to scan
//! - [`AlignmentRecord`](record::AlignmentRecord): the engine's view of a record,
//!   carrying the source's own record as a payload
//! - [`SliceConfig`](config::SliceConfig): run configuration
//!
//! ## Coordinates
//!
//! Everything in this crate is 1-based and fully closed, like SAM `POS` and samtools
//! region strings. BED input is converted on parse.

pub mod config;
pub mod record;
pub mod types;

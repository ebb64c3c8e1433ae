//! Parsers for the text inputs of a slicing run.
//!
//! - **Region strings**: samtools-style `contig`, `contig:pos`, `contig:start-end`
//! - **BED files**: 0-based half-open intervals, converted to 1-based closed regions
//! - **SA tags**: the `SA:Z` supplementary-alignment list carried on alignment records
//!
//! ## Example
//!
//! ```rust
//! use frag_slicer::parsing::region::parse_region;
//! use frag_slicer::parsing::sa_tag::parse_sa_tag;
//!
//! let region = parse_region("chr1:1,000-2,000").unwrap().resolve(|_| None).unwrap();
//! assert_eq!(region.len(), 1001);
//!
//! let (entries, malformed) = parse_sa_tag("chr2,5000,+,50M50S,60,0;");
//! assert_eq!(entries.len(), 1);
//! assert_eq!(malformed, 0);
//! ```
//!
//! ## SA entry fields
//!
//! | Field | Description |
//! |-------|-------------|
//! | rname | Contig of the other alignment |
//! | pos   | 1-based start |
//! | strand | `+` or `-` |
//! | CIGAR | CIGAR of the other alignment |
//! | mapQ  | Mapping quality |
//! | NM    | Edit distance |

pub mod region;
pub mod sa_tag;

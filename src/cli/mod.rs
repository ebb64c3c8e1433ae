//! Command-line interface for frag-slicer.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **slice**: Extract every record of the fragments touching a set of regions,
//!   following mates and supplementary alignments wherever they map
//!
//! ## Usage
//!
//! ```text
//! # Slice around a candidate breakpoint
//! frag-slicer slice sample.bam -o breakpoint.bam -r chr1:1,000,000-1,001,000
//!
//! # Many starting regions, four threads, JSON summary on stdout
//! frag-slicer slice sample.bam -o slice.bam --regions-file candidates.bed -t 4 --format json
//!
//! # SAM output with a wider window around discovered positions
//! frag-slicer slice sample.bam -o slice.sam -r chr7:55,000,000 --margin 500
//! ```

use clap::{Parser, Subcommand};

pub mod slice;

#[derive(Parser)]
#[command(name = "frag-slicer")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Slice a BAM down to every record of the fragments touching a set of regions")]
#[command(
    long_about = "frag-slicer extracts the alignment records overlapping a set of regions together with every mate and supplementary alignment of the same fragments.\n\nLinked records are followed into regions that were never requested, chaining across as many loci as the fragments span, so each fragment in the output is complete:\n- Primary alignments overlapping the regions\n- Their mates, wherever they map\n- Every supplementary alignment listed in SA tags"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract complete fragments around a set of regions
    Slice(slice::SliceArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

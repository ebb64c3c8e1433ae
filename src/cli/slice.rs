use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;
use tracing::info;

use crate::bam::{AlignmentWriterSink, BamSource};
use crate::cli::OutputFormat;
use crate::core::config::SliceConfig;
use crate::core::types::SliceRegion;
use crate::engine::driver::{SliceEngine, SliceSummary};
use crate::engine::scanner::AlignmentSource;
use crate::parsing::region::{parse_bed_file, parse_region, RegionSpec};
use crate::utils::validation::{
    check_region_limit, validate_output_path, ValidationError, MAX_INPUT_REGIONS,
};

#[derive(Args)]
pub struct SliceArgs {
    /// Coordinate-sorted, indexed BAM to slice (.bai or .csi alongside it)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output file; a .sam extension writes SAM, anything else BAM
    #[arg(short, long)]
    pub output: PathBuf,

    /// Region to start from (contig, contig:pos, or contig:start-end); repeatable
    #[arg(short, long = "region")]
    pub regions: Vec<String>,

    /// BED file of regions to start from
    #[arg(long)]
    pub regions_file: Option<PathBuf>,

    /// JSON configuration file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Ignore records with mapping quality below this
    #[arg(long)]
    pub min_mapq: Option<u8>,

    /// Maximum number of regions to scan, including discovered ones
    #[arg(long)]
    pub max_regions: Option<usize>,

    /// Bases of padding around a discovered mate or supplementary position
    #[arg(long)]
    pub margin: Option<u64>,

    /// Number of scanning threads
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Accept secondary alignments
    #[arg(long)]
    pub include_secondary: bool,

    /// Stop handing out regions after this many seconds
    #[arg(long)]
    pub max_runtime_secs: Option<u64>,

    /// Also write the run summary as JSON to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

pub fn run(args: SliceArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    validate_output_path(&args.input, &args.output)?;
    let config = build_config(&args)?;

    if args.regions.is_empty() && args.regions_file.is_none() {
        return Err(ValidationError::NoRegions.into());
    }
    let specs = args
        .regions
        .iter()
        .map(|text| parse_region(text))
        .collect::<Result<Vec<_>, _>>()?;

    let source = BamSource::open(&args.input)?;
    let regions = collect_regions(&args, &specs, &source)?;

    if verbose {
        eprintln!(
            "Slicing {} from {} starting region(s) with {} thread(s)",
            args.input.display(),
            regions.len(),
            config.threads
        );
    }

    let sink = AlignmentWriterSink::create(&args.output, source.header().clone())
        .with_context(|| format!("Failed to create output {}", args.output.display()))?;

    let summary = SliceEngine::new(&source, &sink, config)
        .run(regions)
        .context("Slicing failed")?;

    sink.finish()
        .with_context(|| format!("Failed to finish output {}", args.output.display()))?;
    info!(output = %args.output.display(), "Wrote sliced records");

    if let Some(path) = &args.summary {
        write_summary(path, &summary)?;
    }

    match format {
        OutputFormat::Text => print_text_summary(&args, &summary),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Tsv => print_tsv_summary(&summary),
    }

    Ok(())
}

fn build_config(args: &SliceArgs) -> anyhow::Result<SliceConfig> {
    let mut config = match &args.config {
        Some(path) => SliceConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SliceConfig::default(),
    };

    if let Some(min_mapq) = args.min_mapq {
        config.min_mapping_quality = min_mapq;
    }
    if let Some(max_regions) = args.max_regions {
        config.max_frontier_regions = max_regions;
    }
    if let Some(margin) = args.margin {
        config.derived_region_margin = margin;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if args.include_secondary {
        config.include_secondary = true;
    }
    if args.max_runtime_secs.is_some() {
        config.max_runtime_secs = args.max_runtime_secs;
    }

    config.validate()?;
    Ok(config)
}

fn collect_regions(
    args: &SliceArgs,
    specs: &[RegionSpec],
    source: &BamSource,
) -> anyhow::Result<Vec<SliceRegion>> {
    let mut regions = Vec::with_capacity(specs.len());

    for spec in specs {
        if let Some(message) = check_region_limit(regions.len()) {
            bail!(message);
        }
        regions.push(spec.resolve(|contig| source.contig_length(contig))?);
    }

    if let Some(path) = &args.regions_file {
        let from_file = parse_bed_file(path)
            .with_context(|| format!("Failed to read regions from {}", path.display()))?;
        append_regions(&mut regions, from_file, MAX_INPUT_REGIONS)?;
    }

    if regions.is_empty() {
        return Err(ValidationError::NoRegions.into());
    }

    if let Some(unknown) = regions
        .iter()
        .find(|region| source.contig_length(region.contig()).is_none())
    {
        bail!(
            "Region {} is on contig '{}', which is not in the header of {}",
            unknown,
            unknown.contig(),
            args.input.display()
        );
    }

    Ok(regions)
}

/// Add `more` to `regions`, failing if the two lists together exceed `limit`
fn append_regions(
    regions: &mut Vec<SliceRegion>,
    more: Vec<SliceRegion>,
    limit: usize,
) -> anyhow::Result<()> {
    let total = regions.len() + more.len();
    if total > limit {
        bail!("Too many regions: {total} given across --region and --regions-file, maximum is {limit}");
    }
    regions.extend(more);
    Ok(())
}

fn write_summary(path: &Path, summary: &SliceSummary) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write summary {}", path.display()))?;
    Ok(())
}

fn print_text_summary(args: &SliceArgs, summary: &SliceSummary) {
    println!("Slice Summary");
    println!("{}", "=".repeat(60));

    println!("\nInput: {}", args.input.display());
    println!("Output: {}", args.output.display());
    println!("Status: {}", summary.status);

    println!("\nRecords accepted: {}", summary.records_accepted);
    println!("Regions scanned: {}", summary.regions_scanned);
    if summary.regions_unscanned > 0 {
        println!("Regions not scanned: {}", summary.regions_unscanned);
    }
    if summary.regions_rejected_by_cap > 0 {
        println!(
            "Regions rejected at capacity: {}",
            summary.regions_rejected_by_cap
        );
    }
    if summary.malformed_signatures > 0 {
        println!(
            "Malformed mate/supplementary links: {}",
            summary.malformed_signatures
        );
    }

    if !summary.regions_failed.is_empty() {
        println!("\nFailed regions:");
        for failed in &summary.regions_failed {
            println!("  {}: {}", failed.region, failed.error);
        }
    }

    if !summary.incomplete_fragments.is_empty() {
        println!(
            "\nIncomplete fragments ({}):",
            summary.incomplete_fragments.len()
        );
        for name in summary.incomplete_fragments.iter().take(20) {
            println!("  {name}");
        }
        if summary.incomplete_fragments.len() > 20 {
            println!(
                "  ... and {} more",
                summary.incomplete_fragments.len() - 20
            );
        }
    }
}

fn print_tsv_summary(summary: &SliceSummary) {
    println!(
        "status\trecords_accepted\tregions_scanned\tregions_failed\tregions_rejected_by_cap\tmalformed_signatures\tincomplete_fragments"
    );
    println!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}",
        summary.status,
        summary.records_accepted,
        summary.regions_scanned,
        summary.regions_failed.len(),
        summary.regions_rejected_by_cap,
        summary.malformed_signatures,
        summary.incomplete_fragments.len(),
    );
}

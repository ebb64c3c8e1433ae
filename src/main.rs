use clap::Parser;
use tracing_subscriber::EnvFilter;

use frag_slicer::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("frag_slicer=debug,info")
    } else {
        EnvFilter::new("frag_slicer=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Slice(args) => {
            cli::slice::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}

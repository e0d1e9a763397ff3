use anyhow::{Context, Result};
use char_pipeline::{text_pipeline, CharReader, PipelineConfig};
use clap::Parser;
use std::io;
use tracing_subscriber::EnvFilter;

/// Reads text from stdin, folds line breaks into spaces, collapses each `**`
/// into `^`, and prints the result as fixed-width lines.
#[derive(Parser, Debug)]
#[command(name = "char-pipeline")]
#[command(version, about)]
struct Args {
    /// Characters per output line; a trailing partial line is not printed
    #[arg(short, long, default_value_t = char_pipeline::DEFAULT_RECORD_WIDTH)]
    width: usize,

    /// Slots in each buffer between stages
    #[arg(short, long, default_value_t = char_pipeline::DEFAULT_BUFFER_CAPACITY)]
    capacity: usize,

    /// Character whose adjacent pairs are collapsed
    #[arg(long, default_value_t = '*')]
    marker: char,

    /// Replacement for a collapsed pair
    #[arg(long, default_value_t = '^')]
    substitute: char,

    /// Print per-stage metrics to stderr when done
    #[arg(long)]
    report: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = PipelineConfig::default()
        .with_record_width(args.width)
        .with_buffer_capacity(args.capacity)
        .with_marker(args.marker, args.substitute);

    let pipeline = text_pipeline(&config).context("invalid pipeline configuration")?;
    let report = pipeline
        .run(CharReader::new(io::stdin()), config.record_writer(io::stdout()))
        .context("pipeline failed")?;

    if args.report {
        eprint!("{}", report.summary());
    }
    Ok(())
}

//! Compress command - lossless PDF size reduction.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use reflow_core::compress_pdf;

/// Arguments for the compress command.
#[derive(Args)]
pub struct CompressArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Output PDF
    #[arg(required = true)]
    output: PathBuf,
}

pub fn run(args: CompressArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let data = fs::read(&args.input)?;
    let report = compress_pdf(&data)?;
    fs::write(&args.output, &report.bytes)?;

    eprintln!(
        "{} {} -> {} bytes ({:.1}% smaller), written to {}",
        style("✓").green(),
        report.original_size,
        report.compressed_size,
        report.savings_percent(),
        args.output.display()
    );
    Ok(())
}

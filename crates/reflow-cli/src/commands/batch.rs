//! Batch conversion of every PDF matching a glob pattern.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use reflow_core::{convert, Capabilities, ConversionOutput, ReflowConfig, TargetFormat};

use super::convert::ConversionOptions;
use super::load_config;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for input PDFs
    #[arg(required = true)]
    input: String,

    /// Target format for every file
    #[arg(short, long)]
    format: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: PathBuf,

    #[command(flatten)]
    options: ConversionOptions,

    /// Also write summary.csv to the output directory
    #[arg(long)]
    summary: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Outcome for one input file.
struct BatchResult {
    path: PathBuf,
    output: Option<(PathBuf, ConversionOutput)>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub fn run(args: BatchArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let format: TargetFormat = args.format.parse()?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }
    eprintln!("{} Found {} files to convert to {}", style("ℹ").blue(), files.len(), format);

    fs::create_dir_all(&args.output_dir)?;
    let capabilities = Capabilities::probe(&config);

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let file_start = Instant::now();
        let result = convert_file(&path, format, &args, &config, &capabilities);
        let processing_time_ms = file_start.elapsed().as_millis() as u64;

        match result {
            Ok(output) => results.push(BatchResult {
                path,
                output: Some(output),
                error: None,
                processing_time_ms,
            }),
            Err(e) => {
                let message = e.to_string();
                if !args.continue_on_error {
                    progress.abandon();
                    error!("Failed to convert {}: {}", path.display(), message);
                    anyhow::bail!("Conversion failed for {}: {}", path.display(), message);
                }
                warn!("Failed to convert {}: {}", path.display(), message);
                results.push(BatchResult {
                    path,
                    output: None,
                    error: Some(message),
                    processing_time_ms,
                });
            }
        }
        progress.inc(1);
    }
    progress.finish_with_message("Complete");

    if args.summary {
        let summary_path = args.output_dir.join("summary.csv");
        write_summary(&summary_path, &results)?;
        eprintln!("{} Summary written to {}", style("✓").green(), summary_path.display());
    }

    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
    eprintln!();
    eprintln!(
        "{} Converted {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    eprintln!(
        "   {} successful, {} failed",
        style(results.len() - failed.len()).green(),
        style(failed.len()).red()
    );
    if !failed.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed files:").red());
        for result in &failed {
            eprintln!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn convert_file(
    path: &Path,
    format: TargetFormat,
    args: &BatchArgs,
    config: &ReflowConfig,
    capabilities: &Capabilities,
) -> anyhow::Result<(PathBuf, ConversionOutput)> {
    let request = args.options.request(path, format)?;
    let output = convert(&request, config, capabilities)?;

    let destination = args
        .output_dir
        .join(format!("{}.{}", request.stem, output.extension));
    fs::write(&destination, &output.bytes)?;
    if fs::metadata(&destination)?.len() == 0 {
        anyhow::bail!("{} is empty after writing", destination.display());
    }
    debug!("Wrote {}", destination.display());
    Ok((destination, output))
}

fn write_summary(path: &Path, results: &[BatchResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "output",
        "strategy",
        "effective_format",
        "bytes",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result.path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        let time = result.processing_time_ms.to_string();

        match &result.output {
            Some((destination, output)) => wtr.write_record([
                filename,
                "success",
                &destination.display().to_string(),
                &output.strategy,
                &output.effective_format,
                &output.bytes.len().to_string(),
                &time,
                "",
            ])?,
            None => wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                &time,
                result.error.as_deref().unwrap_or(""),
            ])?,
        }
    }

    wtr.flush()?;
    Ok(())
}

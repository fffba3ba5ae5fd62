//! Convert command - one PDF to one target format.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use reflow_core::models::config::SpreadsheetPipeline;
use reflow_core::{convert_to_path, Capabilities, ConversionOutput, ConversionRequest, ImageTarget, TargetFormat};

use super::load_config;

/// Arguments for the convert command.
#[derive(Args)]
pub struct ConvertArgs {
    /// Target format: word, excel, ppt, html, text or image
    #[arg(required = true)]
    format: String,

    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Output file
    #[arg(required = true)]
    output: PathBuf,

    #[command(flatten)]
    options: ConversionOptions,

    /// Also stream the output bytes to stdout
    #[arg(long)]
    stdout: bool,
}

/// Per-conversion options shared by `convert` and `batch`.
#[derive(Args, Clone)]
pub struct ConversionOptions {
    /// Page to export (image output, 1-based); all pages are zipped otherwise
    #[arg(long)]
    page: Option<usize>,

    /// Quality for lossy image formats
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Raster resolution for html, image and slide page-image output
    #[arg(long)]
    dpi: Option<u32>,

    /// Image format for image output (png, jpg, webp, avif, psd, ...)
    #[arg(long, default_value = "png")]
    image_format: String,

    /// Spreadsheet pipeline: direct, derived or simple
    #[arg(long)]
    pipeline: Option<String>,

    /// Word budget per slide
    #[arg(long)]
    words_per_slide: Option<usize>,
}

impl ConversionOptions {
    pub fn request(&self, input: &Path, format: TargetFormat) -> anyhow::Result<ConversionRequest> {
        let mut request =
            ConversionRequest::from_path(input, format)?.with_image_format(self.image_format.parse::<ImageTarget>()?);
        request.page = self.page;
        request.quality = self.quality;
        request.dpi = self.dpi;
        request.words_per_slide = self.words_per_slide;
        if let Some(pipeline) = &self.pipeline {
            request.pipeline = Some(pipeline.parse::<SpreadsheetPipeline>().map_err(anyhow::Error::msg)?);
        }
        Ok(request)
    }
}

pub fn run(args: ConvertArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let format: TargetFormat = args.format.parse()?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let request = args.options.request(&args.input, format)?;
    let capabilities = Capabilities::probe(&config);
    info!("Converting {} to {}", args.input.display(), format);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!("Converting to {}", format));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = convert_to_path(&request, &args.output, &config, &capabilities);
    spinner.finish_and_clear();
    let output = result?;

    report(&output, &request, &capabilities, &args.output, start);

    if args.stdout || !Term::stdout().is_term() {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&output.bytes)?;
        stdout.flush()?;
    }
    Ok(())
}

fn report(
    output: &ConversionOutput,
    request: &ConversionRequest,
    capabilities: &Capabilities,
    path: &Path,
    start: Instant,
) {
    if request.format == TargetFormat::Image && !capabilities.full_renderer {
        eprintln!(
            "{} Built without MuPDF, page text is drawn as placeholder bars",
            style("!").yellow()
        );
    }
    if request.format == TargetFormat::Image && output.effective_format != request.image_format.extension() {
        eprintln!(
            "{} {} unavailable, wrote {} instead",
            style("!").yellow(),
            request.image_format.extension().to_uppercase(),
            output.effective_format.to_uppercase()
        );
    }
    let fallbacks = output.attempts.iter().filter(|a| !a.success).count();
    if fallbacks > 0 {
        eprintln!(
            "{} Used '{}' after {} failed strategies",
            style("ℹ").blue(),
            output.strategy,
            fallbacks
        );
    }
    eprintln!(
        "{} Wrote {} ({} bytes) in {:?}",
        style("✓").green(),
        path.display(),
        output.bytes.len(),
        start.elapsed()
    );
}

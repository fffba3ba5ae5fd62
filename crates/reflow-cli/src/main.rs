//! CLI application for converting PDF documents into editable formats.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, capabilities, compress, config, convert};

/// Convert PDF documents to word, excel, ppt, html, text and image formats
#[derive(Parser)]
#[command(name = "reflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a single PDF
    Convert(convert::ConvertArgs),

    /// Convert every PDF matching a glob pattern
    Batch(batch::BatchArgs),

    /// Show optional libraries and tools available to this build
    Capabilities(capabilities::CapabilitiesArgs),

    /// Losslessly shrink a PDF
    Compress(compress::CompressArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // stdout may carry converted bytes, so diagnostics go to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Convert(args) => convert::run(args, config_path),
        Commands::Batch(args) => batch::run(args, config_path),
        Commands::Capabilities(args) => capabilities::run(args, config_path),
        Commands::Compress(args) => compress::run(args),
        Commands::Config(args) => config::run(args, config_path),
    }
}

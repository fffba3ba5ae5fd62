//! Capabilities command - report optional libraries and tools.

use std::path::Path;

use clap::Args;
use console::style;

use reflow_core::convert::{FormatGroup, ImageTarget};
use reflow_core::Capabilities;

use super::load_config;

/// Arguments for the capabilities command.
#[derive(Args)]
pub struct CapabilitiesArgs {
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: CapabilitiesArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let capabilities = Capabilities::probe(&config);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&capabilities)?);
        return Ok(());
    }

    let mark = |available: bool| {
        if available {
            style("✓").green()
        } else {
            style("✗").red()
        }
    };

    println!("{}", style("Capabilities").bold());
    println!("  {} Structural document engine", mark(capabilities.structural_engine));
    println!("  {} MuPDF page renderer", mark(capabilities.full_renderer));
    println!("  {} AVIF encoder", mark(capabilities.avif));
    println!("  {} HEIF/HEIC encoder", mark(capabilities.heif));
    match &capabilities.image_tool {
        Some(path) => println!("  {} ImageMagick ({})", mark(true), path.display()),
        None => println!("  {} ImageMagick", mark(false)),
    }

    println!();
    println!("{}", style("Image formats").bold());
    for target in ImageTarget::ALL {
        let native = match target.group() {
            FormatGroup::Native => true,
            FormatGroup::Modern => target == ImageTarget::Avif && capabilities.avif,
            FormatGroup::Professional => capabilities.image_tool.is_some(),
        };
        let note = if native { "" } else { " (written as PNG)" };
        println!("  {} {}{}", mark(native), target.extension(), note);
    }

    Ok(())
}

//! Optional libraries and tools available to this process.

use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::models::config::ReflowConfig;
use crate::pdf;

/// What this build and host can do, probed once and passed to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// The structural document engine may run.
    pub structural_engine: bool,
    /// ImageMagick executable for professional image formats.
    pub image_tool: Option<PathBuf>,
    /// AVIF encoder compiled in.
    pub avif: bool,
    /// HEIF/HEIC encoder compiled in.
    pub heif: bool,
    /// Pages are rasterized by MuPDF rather than the built-in compositor.
    pub full_renderer: bool,
}

impl Capabilities {
    /// Probe the build features and the `PATH`.
    pub fn probe(config: &ReflowConfig) -> Self {
        let capabilities = Self {
            structural_engine: config.document.structural_enabled,
            image_tool: find_image_tool(),
            avif: cfg!(feature = "avif"),
            heif: false,
            full_renderer: pdf::has_full_renderer(),
        };
        debug!("Capabilities: {:?}", capabilities);
        capabilities
    }

    /// Nothing optional available.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn with_image_tool(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_tool = Some(path.into());
        self
    }

    pub fn with_structural_engine(mut self, enabled: bool) -> Self {
        self.structural_engine = enabled;
        self
    }
}

/// `magick` (ImageMagick 7) first, then the legacy `convert`.
pub fn find_image_tool() -> Option<PathBuf> {
    which::which("magick").or_else(|_| which::which("convert")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_follows_config() {
        let mut config = ReflowConfig::default();
        config.document.structural_enabled = false;
        let capabilities = Capabilities::probe(&config);
        assert!(!capabilities.structural_engine);
        assert!(!capabilities.heif);
        assert_eq!(capabilities.avif, cfg!(feature = "avif"));
    }

    #[test]
    fn test_builders() {
        let capabilities = Capabilities::minimal()
            .with_image_tool("/usr/bin/magick")
            .with_structural_engine(true);
        assert_eq!(capabilities.image_tool, Some(PathBuf::from("/usr/bin/magick")));
        assert!(capabilities.structural_engine);
    }
}

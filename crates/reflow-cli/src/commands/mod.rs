pub mod batch;
pub mod capabilities;
pub mod compress;
pub mod config;
pub mod convert;

use std::path::Path;

use tracing::debug;

use reflow_core::ReflowConfig;

/// `--config` if given, else the per-user file if it exists, else defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<ReflowConfig> {
    if let Some(path) = explicit {
        return Ok(ReflowConfig::from_file(path)?);
    }
    let path = config::default_config_path();
    if path.exists() {
        debug!("Loading config from {}", path.display());
        Ok(ReflowConfig::from_file(&path)?)
    } else {
        Ok(ReflowConfig::default())
    }
}

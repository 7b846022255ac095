//! CLI command implementations.

pub mod codec;
pub mod convert;
pub mod metrics;
pub mod render;

pub use codec::{decode, encode};
pub use convert::{latex_to_mathml, mathml_to_latex, save_file, to_latex};
pub use metrics::print_metrics;
pub use render::{render_file, RenderOptions};

use anyhow::{Context, Result};
use mathviewer_core::Properties;
use std::io::Read;
use std::path::Path;

/// Load properties from `config_path`, or the defaults when it does not exist.
pub(crate) fn load_properties(config_path: &Path) -> Result<Properties> {
    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No configuration file, using defaults");
        return Ok(Properties::default());
    }
    Properties::from_file(config_path).context("Failed to load configuration")
}

/// Contents of `path`, or of stdin for `-`.
pub(crate) fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return read_stdin();
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub(crate) fn read_stdin() -> Result<String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read stdin")?;
    Ok(input)
}

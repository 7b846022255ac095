//! Image metrics command
use anyhow::{bail, Context, Result};
use mathviewer_core::image::{metrics_from_bytes, metrics_from_svg_string, scale_to_css};
use std::fs;
use std::path::Path;

const PNG_SIGNATURE: &[u8] = b"\x89PNG";

/// Print the metrics of an SVG or PNG formula image as JSON
pub fn print_metrics(file: &Path, css: bool) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let metrics = if bytes.starts_with(PNG_SIGNATURE) {
        metrics_from_bytes(&bytes)
    } else {
        metrics_from_svg_string(&String::from_utf8_lossy(&bytes))
    };
    let Some(metrics) = metrics else {
        bail!("No metrics found in {}", file.display());
    };
    let metrics = if css { scale_to_css(metrics) } else { metrics };

    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

//! Render command implementation
use super::{load_properties, read_input};
use anyhow::{Context, Result};
use mathviewer_core::{Document, HttpServiceProvider, Viewer, ViewerMode};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub viewer: Option<ViewerMode>,
    pub service_root: Option<String>,
    pub query: Option<String>,
    pub output: Option<PathBuf>,
}

/// Render the formulas of an HTML file against the backend
pub async fn render_file(config_path: &Path, input: &Path, opts: RenderOptions) -> Result<()> {
    let mut properties = load_properties(config_path)?;
    if let Some(query) = &opts.query {
        properties.apply_query(query);
    }
    if let Some(viewer) = opts.viewer {
        properties.viewer = viewer;
    }
    if let Some(root) = opts.service_root {
        properties.editor_services_root = root;
    }

    let provider = HttpServiceProvider::from_properties(&properties);
    let properties = properties
        .generate(&provider)
        .await
        .context("Failed to fetch backend configuration")?;
    let provider = Arc::new(HttpServiceProvider::from_properties(&properties));

    let html = read_input(input)?;
    let mut doc = Document::parse(&html).context("Failed to parse HTML")?;
    let viewer = Viewer::new(properties, provider);
    viewer.load(&mut doc).await.context("Failed to render formulas")?;

    let rendered = doc.to_html();
    match &opts.output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Rendered document written");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

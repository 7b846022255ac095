//! LaTeX and MathML conversion commands
use super::{load_properties, read_input};
use anyhow::{Context, Result};
use mathviewer_core::{HttpServiceProvider, LatexCodec, Properties, Viewer};
use std::path::Path;
use std::sync::Arc;

fn provider(properties: &mut Properties, service_root: Option<String>) -> Arc<HttpServiceProvider> {
    if let Some(root) = service_root {
        properties.editor_services_root = root;
    }
    Arc::new(HttpServiceProvider::from_properties(properties))
}

/// Print the annotated MathML of `latex`
pub async fn latex_to_mathml(
    config_path: &Path,
    latex: &str,
    service_root: Option<String>,
) -> Result<()> {
    let mut properties = load_properties(config_path)?;
    let codec = LatexCodec::new(provider(&mut properties, service_root));
    let mathml = codec
        .get_mathml_from_latex(latex, false)
        .await
        .context("Failed to convert LaTeX")?;
    println!("{mathml}");
    Ok(())
}

/// Print the LaTeX of `mathml`
pub async fn mathml_to_latex(
    config_path: &Path,
    mathml: &str,
    service_root: Option<String>,
) -> Result<()> {
    let mut properties = load_properties(config_path)?;
    let codec = LatexCodec::new(provider(&mut properties, service_root));
    let latex = codec
        .get_latex_from_mathml(mathml)
        .await
        .context("Failed to convert MathML")?;
    if latex.is_empty() {
        anyhow::bail!("The backend could not convert the MathML");
    }
    println!("{latex}");
    Ok(())
}

/// Print the editable form of an HTML file. Needs no backend.
pub fn to_latex(config_path: &Path, input: &Path) -> Result<()> {
    let mut properties = load_properties(config_path)?;
    let viewer = Viewer::new(properties.clone(), provider(&mut properties, None));
    let code = read_input(input)?;
    println!("{}", viewer.init_parse(&code));
    Ok(())
}

/// Print the stored form of an HTML file
pub async fn save_file(config_path: &Path, input: &Path, service_root: Option<String>) -> Result<()> {
    let mut properties = load_properties(config_path)?;
    let provider = provider(&mut properties, service_root);
    let viewer = Viewer::new(properties, provider);
    let code = read_input(input)?;
    let saved = viewer
        .end_parse(&code)
        .await
        .context("Failed to convert LaTeX")?;
    println!("{saved}");
    Ok(())
}

//! Rendering formulas in a document.
//!
//! [`Renderer::render_latex`] turns `$$latex$$` text into MathML elements and
//! [`Renderer::render_mathml`] turns MathML elements into formula images.
//! Formulas are processed one at a time in document order.

use mathviewer_types::{ImageFormat, ImageMetrics, ServiceResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::accessibility::Accessibility;
use crate::config::Properties;
use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::extract;
use crate::image;
use crate::mathml;
use crate::service::{self, ServiceProvider};

/// Class of every generated formula image.
pub const FORMULA_CLASS: &str = "Wirisformula";

pub struct Renderer {
    properties: Properties,
    provider: Arc<dyn ServiceProvider>,
    accessibility: Accessibility,
}

impl Renderer {
    pub fn new(properties: Properties, provider: Arc<dyn ServiceProvider>) -> Self {
        Self {
            accessibility: Accessibility::new(provider.clone()),
            properties,
            provider,
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn provider(&self) -> &dyn ServiceProvider {
        self.provider.as_ref()
    }

    pub fn accessibility(&self) -> &Accessibility {
        &self.accessibility
    }

    /// Replace the `$$latex$$` spans under `root` with MathML.
    ///
    /// Only runs in the `image` and `latex` viewer modes.
    pub async fn render_latex(&self, doc: &mut Document, root: NodeId) -> Result<()> {
        if !self.properties.viewer.renders_latex() {
            return Ok(());
        }

        let nodes = extract::find_latex_text_nodes(doc, root);
        debug!(count = nodes.len(), "Rendering LaTeX text nodes");
        for node in nodes {
            extract::replace_latex_in_text_node(doc, node, self.provider.as_ref()).await?;
        }
        Ok(())
    }

    /// Replace the `<math>` elements under `root` with formula images.
    ///
    /// Only runs in the `image` and `mathml` viewer modes. A formula the
    /// backend rejects is logged and left in place; transport failures abort
    /// the pass.
    pub async fn render_mathml(&self, doc: &mut Document, root: NodeId) -> Result<()> {
        if !self.properties.viewer.renders_mathml() {
            return Ok(());
        }

        let elements = doc.get_elements_by_tag_name(root, "math");
        let mut rendered = 0;
        for math in elements {
            // Nested inside a formula that was already replaced.
            if !doc.contains(root, math) {
                continue;
            }
            let Some(parent) = doc.parent(math) else { continue };

            let mml = mathml::html_entities_to_xml_entities(&doc.outer_html(math));
            match self.mathml_to_img(doc, &mml).await {
                Ok(img) => {
                    doc.replace_child(parent, img, math)?;
                    rendered += 1;
                }
                Err(err @ (Error::Status { .. } | Error::MalformedMathml(_))) => {
                    warn!(%err, "Could not render formula");
                }
                Err(err) => return Err(err),
            }
        }
        info!(rendered, "Rendered MathML formulas");
        Ok(())
    }

    /// Formula image for `mml`, created detached in `doc`.
    pub async fn mathml_to_img(&self, doc: &mut Document, mml: &str) -> Result<NodeId> {
        let lang = self.properties.lang.as_str();
        let data = if self.properties.performance {
            service::show_image(self.provider.as_ref(), mml, lang).await?
        } else {
            let url = service::create_image(self.provider.as_ref(), mml, lang)
                .await?
                .replace("pluginsapp", "plugins/app");
            let response = self.provider.fetch_json(&url).await?;
            service::process_json_response("createimage", response)?
        };
        self.set_image_properties(doc, &data, mml).await
    }

    /// Build the `<img>` for a rendered formula.
    pub async fn set_image_properties(
        &self,
        doc: &mut Document,
        data: &ServiceResult,
        mml: &str,
    ) -> Result<NodeId> {
        let img = doc.create_element("img");
        let format = response_format(data, self.properties.image_format);
        let src = image_src(data, format);
        doc.set_attribute(img, "src", src.as_str());
        doc.set_attribute(
            img,
            &self.properties.mathml_attribute,
            mathml::safe_xml_encode(mml),
        );
        doc.set_attribute(img, "class", FORMULA_CLASS);
        doc.set_attribute(img, "role", "math");

        match data.height {
            Some(height) if height > 0.0 => image::apply_metrics(
                doc,
                img,
                ImageMetrics {
                    width: data.width.unwrap_or_default(),
                    height,
                    baseline: data.baseline,
                    dpi: None,
                },
            ),
            _ => image::set_img_size(doc, img, &src, true, format, self.properties.save_mode)?,
        }

        if !mathml::is_corrupt_mathml(mml) {
            let alt = self
                .accessibility
                .mathml_to_accessible(mml, &self.properties.lang)
                .await?;
            doc.set_attribute(img, "alt", alt);
        }
        Ok(img)
    }
}

/// Format of a rendered image. The response `format` wins over the
/// configured one.
fn response_format(data: &ServiceResult, configured: ImageFormat) -> ImageFormat {
    match data.format.as_deref() {
        Some("png") => ImageFormat::Png,
        Some("svg") => ImageFormat::Svg,
        _ => configured,
    }
}

/// Data URI of a rendered image.
fn image_src(data: &ServiceResult, format: ImageFormat) -> String {
    let content = data.content.as_deref().unwrap_or_default();
    match format {
        ImageFormat::Svg => format!(
            "data:image/svg+xml;charset=utf8,{}",
            urlencoding::encode(content)
        ),
        ImageFormat::Png => format!("data:image/png;base64,{content}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{MockProvider, ServiceRequest};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use mathviewer_types::ViewerMode;
    use serde_json::json;

    const SVG: &str = r#"<svg height="20" width="30" wrs:baseline="15"></svg>"#;

    fn backend(request: &ServiceRequest) -> Result<String> {
        let body = match request.name() {
            "showimage" => json!({
                "status": "ok",
                "result": {"content": SVG, "format": "svg", "width": 30, "height": 20, "baseline": 15}
            }),
            "mathml2accessible" => json!({"status": "ok", "result": {"text": "x"}}),
            "latex2mathml" => json!({
                "status": "ok",
                "result": {"text": format!("<math><mi>{}</mi></math>", request.param_value("latex").unwrap_or_default())}
            }),
            other => panic!("unexpected service {other}"),
        };
        Ok(body.to_string())
    }

    fn renderer(viewer: ViewerMode, provider: Arc<MockProvider>) -> Renderer {
        let properties = Properties {
            viewer,
            ..Properties::default()
        };
        Renderer::new(properties, provider)
    }

    #[tokio::test]
    async fn renders_math_elements_as_images() {
        let provider = Arc::new(MockProvider::new(backend));
        let renderer = renderer(ViewerMode::Image, provider.clone());
        let mut doc = Document::parse("<p>Let <math><mi>x</mi></math> be.</p>").unwrap();

        let root = doc.root();
        renderer.render_mathml(&mut doc, root).await.unwrap();

        let img = doc.get_elements_by_tag_name(doc.root(), "img")[0];
        assert!(doc.get_elements_by_tag_name(doc.root(), "math").is_empty());
        assert_eq!(doc.attribute(img, "class"), Some(FORMULA_CLASS));
        assert_eq!(doc.attribute(img, "role"), Some("math"));
        assert_eq!(doc.attribute(img, "data-mathml"), Some("«math»«mi»x«/mi»«/math»"));
        assert_eq!(doc.attribute(img, "width"), Some("30"));
        assert_eq!(doc.attribute(img, "style"), Some("vertical-align: -5px"));
        assert_eq!(doc.attribute(img, "alt"), Some("x"));
        assert!(doc
            .attribute(img, "src")
            .is_some_and(|src| src.starts_with("data:image/svg+xml;charset=utf8,%3Csvg")));
        assert_eq!(provider.count("showimage"), 1);
    }

    #[tokio::test]
    async fn viewer_mode_gates_each_pass() {
        let provider = Arc::new(MockProvider::new(backend));
        let html = "<p>$$a$$ <math><mi>b</mi></math></p>";

        let mut doc = Document::parse(html).unwrap();
        let latex_only = renderer(ViewerMode::Latex, provider.clone());
        let root = doc.root();
        latex_only.render_mathml(&mut doc, root).await.unwrap();
        latex_only.render_latex(&mut doc, root).await.unwrap();
        assert_eq!(doc.to_html(), "<p><math><mi>a</mi></math> <math><mi>b</mi></math></p>");

        let mut doc = Document::parse(html).unwrap();
        let none = renderer(ViewerMode::None, provider.clone());
        let root = doc.root();
        none.render_latex(&mut doc, root).await.unwrap();
        none.render_mathml(&mut doc, root).await.unwrap();
        assert_eq!(doc.to_html(), html);
        assert_eq!(provider.count("latex2mathml"), 1);
        assert_eq!(provider.count("showimage"), 0);
    }

    #[tokio::test]
    async fn rejected_formulas_are_skipped() {
        let provider = Arc::new(MockProvider::new(|request| match request.name() {
            "showimage" if request.param_value("mml").is_some_and(|m| m.contains("bad")) => {
                Ok(json!({"status": "warning"}).to_string())
            }
            _ => backend(request),
        }));
        let renderer = renderer(ViewerMode::Mathml, provider);
        let mut doc =
            Document::parse("<math><mi>bad</mi></math><math><mi>ok</mi></math>").unwrap();

        let root = doc.root();
        renderer.render_mathml(&mut doc, root).await.unwrap();

        assert_eq!(doc.get_elements_by_tag_name(doc.root(), "math").len(), 1);
        assert_eq!(doc.get_elements_by_tag_name(doc.root(), "img").len(), 1);
    }

    #[tokio::test]
    async fn legacy_image_flow_fixes_urls() {
        let provider = Arc::new(
            MockProvider::new(|request| match request.name() {
                "createimage" => Ok("https://example.com/pluginsapp/showimage?formula=1\n".into()),
                _ => backend(request),
            })
            .with_fetch(|_| {
                Ok(json!({"status": "ok", "result": {"content": SVG, "format": "svg"}}).to_string())
            }),
        );
        let mut renderer = renderer(ViewerMode::Image, provider.clone());
        renderer.properties.performance = false;
        let mut doc = Document::parse("<math><mn>1</mn></math>").unwrap();

        let root = doc.root();
        renderer.render_mathml(&mut doc, root).await.unwrap();

        assert_eq!(
            provider.fetched(),
            vec!["https://example.com/plugins/app/showimage?formula=1".to_string()]
        );
        // No size in the response: read from the SVG itself.
        let img = doc.get_elements_by_tag_name(doc.root(), "img")[0];
        assert_eq!(doc.attribute(img, "height"), Some("20"));
        assert_eq!(doc.attribute(img, "style"), Some("vertical-align: -5px"));
    }

    #[tokio::test]
    async fn corrupt_mathml_gets_no_alt() {
        let provider = Arc::new(MockProvider::new(backend));
        let renderer = renderer(ViewerMode::Image, provider.clone());
        let mut doc = Document::new();
        let data = ServiceResult {
            content: Some("iVBORw0KGgo=".into()),
            format: Some("png".into()),
            height: Some(10.0),
            width: Some(12.0),
            ..ServiceResult::default()
        };

        let img = renderer
            .set_image_properties(&mut doc, &data, "<math><mstack></mstack></math>")
            .await
            .unwrap();

        assert_eq!(doc.attribute(img, "alt"), None);
        assert_eq!(doc.attribute(img, "src"), Some("data:image/png;base64,iVBORw0KGgo="));
        assert_eq!(doc.attribute(img, "style"), None);
        assert_eq!(provider.count("mathml2accessible"), 0);
    }

    #[tokio::test]
    async fn response_format_drives_sizing() {
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        png.extend(b"IHDR");
        png.extend(40u32.to_be_bytes());
        png.extend(20u32.to_be_bytes());
        png.extend([8, 6, 0, 0, 0]);
        png.extend([0u8; 4]);
        png.extend(b"baSE");
        png.extend(15u32.to_be_bytes());
        png.extend([0u8; 64]);

        let provider = Arc::new(MockProvider::new(backend));
        let renderer = renderer(ViewerMode::Image, provider);
        assert_eq!(renderer.properties().image_format, ImageFormat::Svg);
        let mut doc = Document::new();
        let data = ServiceResult {
            content: Some(STANDARD.encode(&png)),
            format: Some("png".into()),
            ..ServiceResult::default()
        };

        let img = renderer
            .set_image_properties(&mut doc, &data, "<math><mi>x</mi></math>")
            .await
            .unwrap();

        assert!(doc
            .attribute(img, "src")
            .is_some_and(|src| src.starts_with("data:image/png;base64,")));
        assert_eq!(doc.attribute(img, "width"), Some("40"));
        assert_eq!(doc.attribute(img, "height"), Some("20"));
        assert_eq!(doc.attribute(img, "style"), Some("vertical-align: -5px"));
    }
}

//! Viewer entry points.
//!
//! [`Viewer`] bundles the components configured from one set of
//! [`Properties`]. [`JsPluginViewer`] keeps the method names older embedding
//! code calls.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Properties;
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::extract;
use crate::latex::LatexCodec;
use crate::mathml::{self, DecodeOptions};
use crate::render::Renderer;
use crate::save;
use crate::service::ServiceProvider;

/// Event dispatched on the document once the initial render is done.
pub const VIEWER_LOADED_EVENT: &str = "viewerLoaded";

pub struct Viewer {
    renderer: Renderer,
    latex: LatexCodec,
}

impl Viewer {
    pub fn new(properties: Properties, provider: Arc<dyn ServiceProvider>) -> Self {
        Self {
            latex: LatexCodec::new(provider.clone()),
            renderer: Renderer::new(properties, provider),
        }
    }

    pub fn properties(&self) -> &Properties {
        self.renderer.properties()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn latex(&self) -> &LatexCodec {
        &self.latex
    }

    /// Element selected by the `element` property, or the body when nothing
    /// matches.
    pub fn scope(&self, doc: &Document) -> NodeId {
        doc.query_selector(doc.root(), &self.properties().element)
            .unwrap_or_else(|| doc.body())
    }

    /// Render the configured scope, then dispatch [`VIEWER_LOADED_EVENT`].
    pub async fn load(&self, doc: &mut Document) -> Result<()> {
        let scope = self.scope(doc);
        debug!(selector = %self.properties().element, "Rendering scope");
        self.renderer.render_latex(doc, scope).await?;
        self.renderer.render_mathml(doc, scope).await?;
        doc.dispatch_event(VIEWER_LOADED_EVENT);
        info!("Viewer loaded");
        Ok(())
    }

    pub fn js_plugin_viewer(&self) -> JsPluginViewer<'_> {
        JsPluginViewer { viewer: self }
    }

    /// See [`save::init_parse`].
    pub fn init_parse(&self, code: &str) -> String {
        save::init_parse(code, self.properties(), &self.latex)
    }

    /// See [`save::end_parse`].
    pub async fn end_parse(&self, code: &str) -> Result<String> {
        save::end_parse(code, self.properties(), &self.latex).await
    }
}

/// Legacy rendering API.
pub struct JsPluginViewer<'a> {
    viewer: &'a Viewer,
}

impl JsPluginViewer<'_> {
    pub async fn parse_document(&self, doc: &mut Document) -> Result<()> {
        let body = doc.body();
        self.parse_element(doc, body).await
    }

    /// Render the LaTeX and the MathML under `element`.
    pub async fn parse_element(&self, doc: &mut Document, element: NodeId) -> Result<()> {
        let renderer = &self.viewer.renderer;
        renderer.render_latex(doc, element).await?;
        renderer.render_mathml(doc, element).await
    }

    pub async fn parse_latex_document(&self, doc: &mut Document) -> Result<()> {
        let body = doc.body();
        self.parse_latex_element(doc, body).await
    }

    pub async fn parse_latex_element(&self, doc: &mut Document, element: NodeId) -> Result<()> {
        self.viewer.renderer.render_latex(doc, element).await
    }

    /// Turn safe MathML written in the text under `element` into `<math>`
    /// elements, then render the element.
    pub async fn parse_safe_mathml_element(
        &self,
        doc: &mut Document,
        element: NodeId,
    ) -> Result<()> {
        let options = DecodeOptions {
            blackboard: self.viewer.properties().blackboard,
        };
        let positions = extract::get_mathml_positions_at_element_and_children(doc, element)?;
        debug!(count = positions.len(), "Safe MathML formulas found");

        for position in positions {
            let Some(parent) = doc.parent(position.next_element) else {
                continue;
            };
            let mml = mathml::safe_xml_decode(&position.safe_mml, options);
            for node in doc.parse_fragment(&mml)? {
                doc.insert_before(parent, node, Some(position.next_element))?;
            }
        }
        self.parse_element(doc, element).await
    }
}

//! Conversion between LaTeX and MathML.
//!
//! Conversions go through the backend and are memoized in a [`TextCache`]
//! keyed by LaTeX source. Annotated MathML found in content seeds the cache
//! too, so a later LaTeX-to-MathML conversion of the same source returns the
//! original markup without a round trip.

mod stream;

use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::TextCache;
use crate::charset::{CharacterSet, SAFE_XML};
use crate::error::Result;
use crate::mathml::{self, DecodeOptions, LATEX_ENCODING};
use crate::service::{self, ServiceProvider};

pub use stream::{get_latex_from_text_node, LatexSpan, LatexTags};

pub struct LatexCodec {
    provider: Arc<dyn ServiceProvider>,
    cache: TextCache,
}

impl LatexCodec {
    pub fn new(provider: Arc<dyn ServiceProvider>) -> Self {
        Self {
            provider,
            cache: TextCache::new(),
        }
    }

    pub fn cache(&self) -> &TextCache {
        &self.cache
    }

    /// LaTeX of `mathml`, or an empty string when the backend cannot convert it.
    ///
    /// On success the original MathML, annotated with the LaTeX, is cached
    /// under the LaTeX.
    pub async fn get_latex_from_mathml(&self, mathml: &str) -> Result<String> {
        let stripped = mathml::remove_semantics(mathml);
        let response = service::mathml2latex(self.provider.as_ref(), &stripped).await?;

        if !response.status.is_ok() {
            warn!(status = %response.status, "MathML to LaTeX conversion failed");
            return Ok(String::new());
        }

        let latex = response.result.text.unwrap_or_default();
        let annotated = mathml::add_annotation(
            mathml,
            &mathml::html_entities_encode(&latex),
            LATEX_ENCODING,
        );
        self.cache.populate(latex.clone(), annotated);
        Ok(latex)
    }

    /// MathML of `latex`, annotated with its source.
    ///
    /// When the backend cannot convert it the LaTeX comes back wrapped in
    /// `$$` so that it is displayed as text.
    pub async fn get_mathml_from_latex(
        &self,
        latex: &str,
        include_latex_on_semantics: bool,
    ) -> Result<String> {
        if let Some(mathml) = self.cache.get(latex) {
            debug!(latex, "LaTeX cache hit");
            return Ok(mathml);
        }

        let response =
            service::latex2mathml(self.provider.as_ref(), latex, include_latex_on_semantics)
                .await?;
        if !response.status.is_ok() {
            warn!(latex, status = %response.status, "LaTeX to MathML conversion failed");
            return Ok(format!("$${latex}$$"));
        }

        let mut mathml = response
            .result
            .text
            .unwrap_or_default()
            .replace('\r', "")
            .replace('\n', " ");
        if !mathml.contains("semantics") && !mathml.contains("annotation") {
            mathml = mathml::add_annotation(
                &mathml,
                &mathml::html_entities_encode(latex),
                LATEX_ENCODING,
            );
        }
        self.cache.populate(latex, mathml.clone());
        Ok(mathml)
    }

    /// Replace every LaTeX-annotated `<math>` span of `content`, written in
    /// `charset`, with `$$latex$$`.
    ///
    /// Spans without a LaTeX annotation and spans serialized inside an
    /// attribute value are kept. Each replaced span is cached under its LaTeX.
    pub fn parse_mathml_to_latex(&self, content: &str, charset: &CharacterSet) -> String {
        let math_open = charset.open_tag("math");
        let math_close = charset.close_tag("math");
        let annotation_open = charset.annotation_open(LATEX_ENCODING);
        let annotation_close = charset.close_tag("annotation");

        let mut output = String::with_capacity(content.len());
        let mut end = 0;
        let mut start = content.find(&math_open);

        while let Some(span_start) = start {
            output.push_str(&content[end..span_start]);
            end = match content[span_start..].find(&math_close) {
                Some(i) => span_start + i + math_close.len(),
                // Unterminated: everything but the last character.
                None => content
                    .char_indices()
                    .last()
                    .map_or(content.len(), |(i, _)| i.max(span_start)),
            };
            let span = &content[span_start..end];

            let latex = if mathml::is_mathml_in_attribute(content, span_start) {
                None
            } else {
                span.find(&annotation_open).map(|i| {
                    let from = i + annotation_open.len();
                    let to = span[from..]
                        .find(&annotation_close)
                        .map_or(span.len(), |j| from + j);
                    &span[from..to]
                })
            };

            match latex {
                Some(latex) => {
                    let latex = if charset.is_safe() {
                        mathml::safe_xml_decode(latex, DecodeOptions::default())
                    } else {
                        latex.to_string()
                    };
                    output.push_str("$$");
                    output.push_str(&latex);
                    output.push_str("$$");
                    self.cache.populate(latex, span);
                }
                None => output.push_str(span),
            }

            start = content[end..].find(&math_open).map(|i| end + i);
        }

        output.push_str(&content[end..]);
        output
    }

    /// Both alphabets, safe first, as content may mix them.
    pub fn parse_all_mathml_to_latex(&self, content: &str) -> String {
        let safe = self.parse_mathml_to_latex(content, &SAFE_XML);
        self.parse_mathml_to_latex(&safe, &crate::charset::XML)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::XML;
    use crate::service::MockProvider;
    use serde_json::json;

    fn ok_text(text: &str) -> crate::error::Result<String> {
        Ok(json!({"status": "ok", "result": {"text": text}}).to_string())
    }

    #[tokio::test]
    async fn latex_from_mathml_annotates_and_caches() {
        let provider = Arc::new(MockProvider::new(|request| {
            assert_eq!(request.param_value("mml"), Some("<math><mi>x</mi></math>"));
            ok_text("x<1")
        }));
        let codec = LatexCodec::new(provider);
        let annotated =
            r#"<math><semantics><mi>x</mi><annotation encoding="StarMath">x</annotation></semantics></math>"#;

        assert_eq!(codec.get_latex_from_mathml(annotated).await.unwrap(), "x<1");
        assert_eq!(
            codec.cache().get("x<1").as_deref(),
            Some(
                r#"<math><semantics><mi>x</mi><annotation encoding="StarMath">x</annotation><annotation encoding="LaTeX">x&lt;1</annotation></semantics></math>"#
            )
        );
    }

    #[tokio::test]
    async fn latex_from_mathml_failure_is_empty() {
        let provider = Arc::new(MockProvider::new(|_| {
            Ok(json!({"status": "error"}).to_string())
        }));
        let codec = LatexCodec::new(provider);
        assert_eq!(codec.get_latex_from_mathml("<math/>").await.unwrap(), "");
        assert!(codec.cache().is_empty());
    }

    #[tokio::test]
    async fn mathml_from_latex_hits_backend_once() {
        let provider = Arc::new(MockProvider::new(|request| {
            assert_eq!(request.param_value("latex"), Some("x^2"));
            ok_text("<math>\r\n<msup><mi>x</mi><mn>2</mn></msup>\n</math>")
        }));
        let codec = LatexCodec::new(provider.clone());

        let first = codec.get_mathml_from_latex("x^2", false).await.unwrap();
        let second = codec.get_mathml_from_latex("x^2", false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.count("latex2mathml"), 1);
        assert_eq!(
            first,
            r#"<math><semantics><mrow> <msup><mi>x</mi><mn>2</mn></msup> </mrow><annotation encoding="LaTeX">x^2</annotation></semantics></math>"#
        );
    }

    #[tokio::test]
    async fn mathml_from_latex_keeps_backend_semantics() {
        let provider = Arc::new(MockProvider::new(|request| {
            assert_eq!(request.param_value("saveLatex"), Some(""));
            ok_text(r#"<math><semantics><mi>a</mi><annotation encoding="LaTeX">a</annotation></semantics></math>"#)
        }));
        let codec = LatexCodec::new(provider);
        let mathml = codec.get_mathml_from_latex("a", true).await.unwrap();
        assert_eq!(
            mathml,
            r#"<math><semantics><mi>a</mi><annotation encoding="LaTeX">a</annotation></semantics></math>"#
        );
    }

    #[tokio::test]
    async fn mathml_from_latex_failure_keeps_delimiters() {
        let provider = Arc::new(MockProvider::new(|_| {
            Ok(json!({"status": "warning"}).to_string())
        }));
        let codec = LatexCodec::new(provider);
        assert_eq!(
            codec.get_mathml_from_latex(r"\frac{", false).await.unwrap(),
            r"$$\frac{$$"
        );
        assert!(codec.cache().is_empty());
    }

    #[test]
    fn parses_annotated_mathml_in_both_alphabets() {
        let codec = LatexCodec::new(Arc::new(MockProvider::new(|_| ok_text(""))));
        let xml = r#"<math><semantics><mi>x</mi><annotation encoding="LaTeX">x</annotation></semantics></math>"#;
        let plain = "<math><mi>y</mi></math>";
        let content = format!("<p>a {xml} b {plain}</p>");

        assert_eq!(
            codec.parse_mathml_to_latex(&content, &XML),
            format!("<p>a $$x$$ b {plain}</p>")
        );
        assert_eq!(codec.cache().get("x").as_deref(), Some(xml));

        let safe = mathml::safe_xml_encode(
            r#"<math><semantics><mi>z</mi><annotation encoding="LaTeX">z&lt;1</annotation></semantics></math>"#,
        );
        assert_eq!(
            codec.parse_mathml_to_latex(&format!("[{safe}]"), &SAFE_XML),
            "[$$z&lt;1$$]"
        );
        assert_eq!(codec.cache().get("z&lt;1").as_deref(), Some(safe.as_str()));
    }

    #[test]
    fn unterminated_and_attribute_spans_pass_through() {
        let codec = LatexCodec::new(Arc::new(MockProvider::new(|_| ok_text(""))));

        let unterminated = "text <math><mi>x</mi>";
        assert_eq!(codec.parse_mathml_to_latex(unterminated, &XML), unterminated);

        let in_attribute = r#"<img data-mathml="<math><semantics><mi>x</mi><annotation encoding="LaTeX">x</annotation></semantics></math>">"#;
        assert_eq!(codec.parse_mathml_to_latex(in_attribute, &XML), in_attribute);
        assert!(codec.cache().is_empty());
    }

    #[test]
    fn mixed_alphabets() {
        let codec = LatexCodec::new(Arc::new(MockProvider::new(|_| ok_text(""))));
        let xml = r#"<math><semantics><mi>a</mi><annotation encoding="LaTeX">a</annotation></semantics></math>"#;
        let second = r#"<math><semantics><mi>b</mi><annotation encoding="LaTeX">b</annotation></semantics></math>"#;
        let safe = mathml::safe_xml_encode(second);
        let content = format!("{xml} and {safe}");

        assert_eq!(codec.parse_all_mathml_to_latex(&content), "$$a$$ and $$b$$");
        assert_eq!(codec.cache().get("a").as_deref(), Some(xml));
        assert_eq!(codec.cache().get("b").as_deref(), Some(safe.as_str()));
    }
}

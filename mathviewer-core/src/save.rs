//! Converting stored content to and from its editable form.
//!
//! [`init_parse`] runs when content is loaded for editing: annotated MathML
//! and formula images become `$$latex$$` where possible. [`end_parse`] runs
//! when it is saved: LaTeX becomes MathML again and formula images are
//! persisted the way the save mode asks.

use mathviewer_types::SaveMode;
use tracing::debug;

use crate::config::Properties;
use crate::dom::Document;
use crate::error::Result;
use crate::latex::LatexCodec;
use crate::mathml::{self, DecodeOptions};
use crate::render::FORMULA_CLASS;

/// Byte range of one start tag in a markup string, `<` to `>` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpan {
    pub start: usize,
    pub end: usize,
}

/// Every `<tag ...>` start tag of `code`, in order.
///
/// Tag names match ASCII case-insensitively. `>` inside quoted attribute
/// values does not end the tag; an unterminated tag is ignored.
pub fn find_elements_in_string(code: &str, tag: &str) -> Vec<TagSpan> {
    let bytes = code.as_bytes();
    let mut spans = Vec::new();
    let mut pos = 0;

    while let Some(i) = code[pos..].find('<') {
        let start = pos + i;
        let name_end = start + 1 + tag.len();
        let name_matches = code
            .get(start + 1..name_end)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag));
        let delimited = matches!(
            bytes.get(name_end),
            Some(b'>' | b'/') | Some(b' ' | b'\t' | b'\n' | b'\r')
        );
        if !(name_matches && delimited) {
            pos = start + 1;
            continue;
        }

        let Some(end) = tag_end(code, name_end) else { break };
        spans.push(TagSpan { start, end });
        pos = end;
    }
    spans
}

/// Offset just past the `>` closing a tag whose attributes start at `from`.
fn tag_end(code: &str, from: usize) -> Option<usize> {
    let mut quote = None;
    for (i, c) in code[from..].char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return Some(from + i + 1),
            _ => {}
        }
    }
    None
}

/// Source MathML of a formula image tag, if `tag` is one.
fn formula_mathml(tag: &str, properties: &Properties) -> Option<String> {
    let mut doc = Document::new();
    let img = doc.parse_fragment(tag).ok()?.into_iter().next()?;
    let is_formula = doc
        .attribute(img, "class")
        .is_some_and(|class| class.split_whitespace().any(|c| c == FORMULA_CLASS));
    if !is_formula {
        return None;
    }
    let safe = doc.attribute(img, &properties.mathml_attribute)?;
    Some(mathml::safe_xml_decode(
        safe,
        DecodeOptions {
            blackboard: properties.blackboard,
        },
    ))
}

/// Rewrite each formula image of `code` with `replace`, which receives its
/// MathML. Images for which it returns `None` are kept.
fn replace_formula_images(
    code: &str,
    properties: &Properties,
    mut replace: impl FnMut(&str) -> Option<String>,
) -> String {
    let mut output = String::with_capacity(code.len());
    let mut last = 0;
    for span in find_elements_in_string(code, "img") {
        let tag = &code[span.start..span.end];
        let Some(replacement) = formula_mathml(tag, properties).and_then(|mml| replace(&mml))
        else {
            continue;
        };
        output.push_str(&code[last..span.start]);
        output.push_str(&replacement);
        last = span.end;
    }
    output.push_str(&code[last..]);
    output
}

/// Editable form of stored content.
///
/// With the `latex` parse mode, annotated MathML in either alphabet and
/// formula images carrying a LaTeX annotation become `$$latex$$`.
pub fn init_parse(code: &str, properties: &Properties, latex: &LatexCodec) -> String {
    if !properties.parses_latex() {
        return code.to_string();
    }

    let code = latex.parse_all_mathml_to_latex(code);
    replace_formula_images(&code, properties, |mml| {
        let annotation = mathml::latex_annotation(mml)?;
        let source = mathml::html_entities_decode(annotation);
        latex.cache().populate(source.clone(), mml);
        Some(format!("$${source}$$"))
    })
}

/// Stored form of edited content.
///
/// With the `latex` parse mode every `$$latex$$` span is converted to MathML
/// (an unterminated `$$` is kept). Formula images are then written as MathML
/// for the `xml` save mode, as safe MathML for `safeXml`, and left as images
/// otherwise.
pub async fn end_parse(code: &str, properties: &Properties, latex: &LatexCodec) -> Result<String> {
    let code = if properties.parses_latex() {
        latex_to_mathml(code, latex).await?
    } else {
        code.to_string()
    };

    let code = match properties.save_mode {
        SaveMode::Xml => replace_formula_images(&code, properties, |mml| Some(mml.to_string())),
        SaveMode::SafeXml => {
            replace_formula_images(&code, properties, |mml| Some(mathml::safe_xml_encode(mml)))
        }
        SaveMode::Base64 | SaveMode::Image => code,
    };
    Ok(code)
}

async fn latex_to_mathml(code: &str, latex: &LatexCodec) -> Result<String> {
    const DELIMITER: &str = "$$";

    let mut output = String::with_capacity(code.len());
    let mut pos = 0;
    while let Some(i) = code[pos..].find(DELIMITER) {
        let start = pos + i;
        let body = start + DELIMITER.len();
        let Some(j) = code[body..].find(DELIMITER) else { break };
        let close = body + j;

        output.push_str(&code[pos..start]);
        let source = mathml::html_entities_decode(&code[body..close]);
        let converted = latex.get_mathml_from_latex(&source, true).await?;
        output.push_str(&mathml::remove_annotation(&converted, "application/json"));
        debug!(latex = %source, "Saved LaTeX as MathML");
        pos = close + DELIMITER.len();
    }
    output.push_str(&code[pos..]);
    Ok(output)
}

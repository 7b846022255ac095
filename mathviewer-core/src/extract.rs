//! Locating formulas embedded in document text.
//!
//! Two kinds of formulas live in text nodes: `$$latex$$` spans and MathML
//! serialized with the safe alphabet. Both are found with a read-only pass
//! that snapshots what it matched, and only then is the tree mutated, so no
//! scan ever observes its own edits.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::charset::SAFE_XML;
use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::service::{self, ServiceProvider};

const LATEX_DELIMITER: &str = "$$";

/// Text nodes under `root` holding at least one `$$...$$` span.
pub fn find_latex_text_nodes(doc: &Document, root: NodeId) -> Vec<NodeId> {
    static LATEX_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(\$\$)(.*)(\$\$)").expect("valid latex span regex"));

    doc.text_nodes(root)
        .into_iter()
        .filter(|&node| doc.text(node).is_some_and(|text| LATEX_RE.is_match(text)))
        .collect()
}

/// Byte range of the next `$$...$$` span at or after `from`, delimiters
/// included.
fn next_latex_position(text: &str, from: usize) -> Option<(usize, usize)> {
    let start = from + text.get(from..)?.find(LATEX_DELIMITER)?;
    let body = start + LATEX_DELIMITER.len();
    let close = body + text[body..].find(LATEX_DELIMITER)?;
    Some((start, close + LATEX_DELIMITER.len()))
}

/// Replace every `$$latex$$` span of a text node by the MathML the backend
/// returns for it.
///
/// Spans are converted one at a time in document order. The text around them
/// is kept as new text nodes and the original node is removed. A span the
/// backend refuses to convert stays as literal text.
pub async fn replace_latex_in_text_node(
    doc: &mut Document,
    node: NodeId,
    provider: &dyn ServiceProvider,
) -> Result<()> {
    let Some(text) = doc.text(node).map(str::to_string) else {
        return Ok(());
    };
    let Some(parent) = doc.parent(node) else {
        return Ok(());
    };

    let mut pending = String::new();
    let mut pos = 0;
    while let Some((start, end)) = next_latex_position(&text, pos) {
        pending.push_str(&text[pos..start]);
        let latex = &text[start + LATEX_DELIMITER.len()..end - LATEX_DELIMITER.len()];

        let response = service::latex2mathml(provider, latex, false).await?;
        match service::process_json_response("latex2mathml", response) {
            Ok(result) => {
                flush_text(doc, parent, node, &mut pending)?;
                let mathml = result.text.unwrap_or_default();
                for fragment in doc.parse_fragment(&mathml)? {
                    doc.insert_before(parent, fragment, Some(node))?;
                }
                debug!(latex, "Rendered LaTeX span");
            }
            Err(err @ Error::Status { .. }) => {
                warn!(latex, %err, "Keeping LaTeX span as text");
                pending.push_str(&text[start..end]);
            }
            Err(err) => return Err(err),
        }
        pos = end;
    }

    pending.push_str(&text[pos..]);
    flush_text(doc, parent, node, &mut pending)?;
    doc.remove(node);
    Ok(())
}

fn flush_text(
    doc: &mut Document,
    parent: NodeId,
    before: NodeId,
    pending: &mut String,
) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }
    let text = doc.create_text(std::mem::take(pending));
    doc.insert_before(parent, text, Some(before))
}

// ============================================================================
// Safe MathML
// ============================================================================

/// A safe-encoded `<math>...</math>` found in a text node.
///
/// `start..end` is the byte range of `safe_mml` in the node text at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeMathmlMatch {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
    pub safe_mml: String,
}

/// A safe MathML span cut out of its text node.
///
/// The formula belongs right before `next_element`, the text node holding
/// what followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathmlPosition {
    pub safe_mml: String,
    pub next_element: NodeId,
}

/// Find safe MathML spans in the text nodes under `root` (inclusive).
///
/// A span whose body contains another safe `<math` opener is unterminated;
/// scanning of that node stops there.
pub fn scan_safe_mathml(doc: &Document, root: NodeId) -> Vec<SafeMathmlMatch> {
    let open = SAFE_XML.open_tag("math");
    let close = SAFE_XML.close_tag("math");
    let mut matches = Vec::new();

    for node in doc.text_nodes(root) {
        let Some(text) = doc.text(node) else { continue };
        let mut pos = 0;
        while let Some(i) = text[pos..].find(&open) {
            let start = pos + i;
            let body = start + open.len();
            let Some(j) = text[body..].find(&close) else { break };
            let close_start = body + j;
            if text[body..close_start].contains(&open) {
                break;
            }
            let end = close_start + close.len();
            matches.push(SafeMathmlMatch {
                node,
                start,
                end,
                safe_mml: text[start..end].to_string(),
            });
            pos = end;
        }
    }
    matches
}

/// Cut each match out of its text node, splitting the node at the cut.
///
/// Matches must come from [`scan_safe_mathml`] on the current tree; a match
/// whose text no longer lines up is an error.
pub fn apply_safe_mathml(
    doc: &mut Document,
    matches: Vec<SafeMathmlMatch>,
) -> Result<Vec<MathmlPosition>> {
    let mut positions = Vec::with_capacity(matches.len());
    // (original node, node now holding its tail, byte offset of that tail)
    let mut cursor: Option<(NodeId, NodeId, usize)> = None;

    for m in matches {
        let (current, base) = match cursor {
            Some((node, tail, base)) if node == m.node => (tail, base),
            _ => (m.node, 0),
        };
        let start = m.start.checked_sub(base).ok_or_else(stale)?;
        let end = m.end - base;

        let text = doc.text(current).ok_or_else(stale)?;
        if text.get(start..end) != Some(m.safe_mml.as_str()) {
            return Err(stale());
        }
        let remaining = format!("{}{}", &text[..start], &text[end..]);
        doc.set_text(current, remaining)?;
        let next_element = doc.split_text(current, start)?;

        positions.push(MathmlPosition {
            safe_mml: m.safe_mml,
            next_element,
        });
        cursor = Some((m.node, next_element, m.end));
    }
    Ok(positions)
}

fn stale() -> Error {
    Error::Dom("safe MathML match does not fit the current text".to_string())
}

/// Extract the safe MathML of `node` and everything below it.
pub fn get_mathml_positions_at_node(
    doc: &mut Document,
    node: NodeId,
) -> Result<Vec<MathmlPosition>> {
    let matches = scan_safe_mathml(doc, node);
    apply_safe_mathml(doc, matches)
}

/// Extract the safe MathML of every child of `element`.
pub fn get_mathml_positions_at_element_and_children(
    doc: &mut Document,
    element: NodeId,
) -> Result<Vec<MathmlPosition>> {
    let children = doc.children(element).to_vec();
    let mut positions = Vec::new();
    for child in children {
        positions.extend(get_mathml_positions_at_node(doc, child)?);
    }
    Ok(positions)
}

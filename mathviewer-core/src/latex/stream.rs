//! Delimited LaTeX spans across runs of sibling text nodes.
//!
//! Editing splits text nodes arbitrarily, so a `$$...$$` span (and even a
//! delimiter) can be spread over several adjacent nodes. [`TextStream`] joins
//! the run into one string and maps offsets back to nodes; the scanner then
//! only deals with a flat string.

use crate::dom::{Document, NodeId};

/// Open and close delimiters of an inline LaTeX span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatexTags {
    pub open: String,
    pub close: String,
}

impl Default for LatexTags {
    fn default() -> Self {
        Self {
            open: String::from("$$"),
            close: String::from("$$"),
        }
    }
}

/// A delimited span located in the tree.
///
/// `start_position` is the offset of the open delimiter in `start_node`;
/// `end_position` is the offset just past the close delimiter in `end_node`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatexSpan {
    pub latex: String,
    pub start_node: NodeId,
    pub start_position: usize,
    pub end_node: NodeId,
    pub end_position: usize,
}

/// Contiguous run of sibling text nodes viewed as one string.
#[derive(Debug)]
pub(crate) struct TextStream {
    text: String,
    /// `(node, offset of its first byte in text)`, in sibling order.
    segments: Vec<(NodeId, usize)>,
}

impl TextStream {
    /// The run of text siblings containing `node`.
    pub(crate) fn around(doc: &Document, node: NodeId) -> Option<Self> {
        doc.text(node)?;

        let mut first = node;
        while let Some(previous) = doc.previous_sibling(first).filter(|&n| doc.is_text(n)) {
            first = previous;
        }

        let mut stream = TextStream {
            text: String::new(),
            segments: Vec::new(),
        };
        let mut current = Some(first);
        while let Some(id) = current {
            let Some(text) = doc.text(id) else { break };
            stream.segments.push((id, stream.text.len()));
            stream.text.push_str(text);
            current = doc.next_sibling(id);
        }
        Some(stream)
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.text
    }

    /// Stream offset of `offset` within `node`.
    pub(crate) fn global(&self, node: NodeId, offset: usize) -> Option<usize> {
        let index = self.segments.iter().position(|&(id, _)| id == node)?;
        let start = self.segments[index].1;
        let end = self.segment_end(index);
        Some(start + offset.min(end - start))
    }

    fn segment_end(&self, index: usize) -> usize {
        self.segments
            .get(index + 1)
            .map_or(self.text.len(), |&(_, start)| start)
    }

    /// Node holding the byte at `offset`, with the offset inside it.
    fn locate_char(&self, offset: usize) -> Option<(NodeId, usize)> {
        self.segments
            .iter()
            .enumerate()
            .find(|&(index, &(_, start))| start <= offset && offset < self.segment_end(index))
            .map(|(_, &(id, start))| (id, offset - start))
    }

    /// Node holding the byte just before `offset`, with `offset` relative to it.
    fn locate_end(&self, offset: usize) -> Option<(NodeId, usize)> {
        let (id, local) = self.locate_char(offset.checked_sub(1)?)?;
        Some((id, local + 1))
    }
}

enum ScanState {
    SeekingOpen { from: usize },
    SeekingClose { open: usize },
}

/// Find the span of `tags`-delimited LaTeX containing `caret`.
///
/// The caret is inside a span from the first byte of its open delimiter up
/// to the first byte of its close delimiter, both inclusive. Spans whose
/// close delimiter starts before the caret are skipped; an open delimiter
/// after the caret ends the search.
pub fn get_latex_from_text_node(
    doc: &Document,
    text_node: NodeId,
    caret: usize,
    tags: &LatexTags,
) -> Option<LatexSpan> {
    if tags.open.is_empty() || tags.close.is_empty() {
        return None;
    }
    let stream = TextStream::around(doc, text_node)?;
    let caret = stream.global(text_node, caret)?;
    let text = stream.as_str();

    let mut state = ScanState::SeekingOpen { from: 0 };
    let (open, end) = loop {
        state = match state {
            ScanState::SeekingOpen { from } => {
                let open = from + text.get(from..)?.find(&tags.open)?;
                if open > caret {
                    return None;
                }
                ScanState::SeekingClose { open }
            }
            ScanState::SeekingClose { open } => {
                let from = open + tags.open.len();
                let close = from + text.get(from..)?.find(&tags.close)?;
                let end = close + tags.close.len();
                if close >= caret {
                    break (open, end);
                }
                ScanState::SeekingOpen { from: end }
            }
        };
    };

    let latex = text[open + tags.open.len()..end - tags.close.len()].to_string();
    let (start_node, start_position) = stream.locate_char(open)?;
    let (end_node, end_position) = stream.locate_end(end)?;
    Some(LatexSpan {
        latex,
        start_node,
        start_position,
        end_node,
        end_position,
    })
}

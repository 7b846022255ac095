//! Tree building on top of the `html5ever` tokenizer.
//!
//! The tokenizer handles character references, attribute quoting, comments
//! and raw text. This sink only maintains the stack of open elements, so a
//! fragment comes back exactly as written: no implied `<html>`/`<body>`,
//! stray end tags dropped, open elements closed at end of input.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use tracing::trace;

use super::{Document, NodeId, NodeKind};
use crate::error::{Error, Result};

pub(super) const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub(super) const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

pub(super) fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

pub(super) fn is_raw_text(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// Parse `input` and return the top-level nodes, detached.
pub(super) fn parse_nodes(doc: &mut Document, input: &str) -> Result<Vec<NodeId>> {
    let sink = ArenaSink {
        doc,
        open: Vec::new(),
        roots: Vec::new(),
        error: None,
    };
    let mut tokenizer = Tokenizer::new(sink, TokenizerOpts::default());
    let mut queue = BufferQueue::default();
    queue.push_back(StrTendril::from(input));

    let _ = tokenizer.feed(&mut queue);
    tokenizer.end();

    let sink = &mut tokenizer.sink;
    match sink.error.take() {
        Some(err) => Err(err),
        None => Ok(std::mem::take(&mut sink.roots)),
    }
}

struct ArenaSink<'a> {
    doc: &'a mut Document,
    open: Vec<NodeId>,
    roots: Vec<NodeId>,
    error: Option<Error>,
}

impl ArenaSink<'_> {
    fn attach(&mut self, node: NodeId) -> Result<()> {
        match self.open.last() {
            Some(&parent) => self.doc.append_child(parent, node),
            None => {
                self.roots.push(node);
                Ok(())
            }
        }
    }

    /// Tokens split text at references and stray `<`; adjacent runs merge.
    fn append_text(&mut self, text: &str) -> Result<()> {
        let last = match self.open.last() {
            Some(&parent) => self.doc.children(parent).last().copied(),
            None => self.roots.last().copied(),
        };
        if let Some(last) = last {
            if let NodeKind::Text(existing) = &mut self.doc.node_mut(last).kind {
                existing.push_str(text);
                return Ok(());
            }
        }
        let node = self.doc.create_text(text);
        self.attach(node)
    }

    fn start_tag(&mut self, tag: Tag) -> Result<Option<RawKind>> {
        let name: &str = &tag.name;
        let element = self.doc.create_element(name);
        for attr in &tag.attrs {
            self.doc
                .set_attribute(element, &attr.name.local, attr.value.to_string());
        }
        self.attach(element)?;

        if tag.self_closing || is_void(name) {
            return Ok(None);
        }
        self.open.push(element);
        Ok(match name {
            "script" => Some(RawKind::ScriptData),
            "style" => Some(RawKind::Rawtext),
            _ => None,
        })
    }

    fn end_tag(&mut self, tag: &Tag) {
        let name: &str = &tag.name;
        if let Some(index) = self.open.iter().rposition(|&node| {
            self.doc
                .tag_name(node)
                .is_some_and(|open| open.eq_ignore_ascii_case(name))
        }) {
            self.open.truncate(index);
        }
    }

    fn process(&mut self, token: Token) -> Result<Option<RawKind>> {
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => return self.start_tag(tag),
                TagKind::EndTag => self.end_tag(&tag),
            },
            Token::CharacterTokens(text) => self.append_text(&text)?,
            Token::NullCharacterToken => self.append_text("\0")?,
            Token::CommentToken(text) => {
                let node = self.doc.create_comment(text.to_string());
                self.attach(node)?;
            }
            Token::DoctypeToken(doctype) => {
                let name = doctype.name.as_deref().unwrap_or("html").to_string();
                let node = self.doc.create_doctype(name);
                self.attach(node)?;
            }
            Token::ParseError(message) => trace!(%message, "Tolerated markup error"),
            Token::EOFToken => {}
        }
        Ok(None)
    }
}

impl TokenSink for ArenaSink<'_> {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        if self.error.is_some() {
            return TokenSinkResult::Continue;
        }
        match self.process(token) {
            Ok(Some(kind)) => TokenSinkResult::RawData(kind),
            Ok(None) => TokenSinkResult::Continue,
            Err(err) => {
                self.error = Some(err);
                TokenSinkResult::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(html: &str) -> String {
        Document::parse(html).unwrap().to_html()
    }

    #[test]
    fn keeps_comments_and_doctype() {
        let html = "<!DOCTYPE html><html><body><!-- note --><p>x</p></body></html>";
        assert_eq!(roundtrip(html), html);
    }

    #[test]
    fn closes_unclosed_elements_and_ignores_stray_end_tags() {
        assert_eq!(roundtrip("<div><p>a</span>b"), "<div><p>ab</p></div>");
    }

    #[test]
    fn literal_angle_brackets_stay_text() {
        let doc = Document::parse("<p>a < b and 3<4</p>").unwrap();
        assert_eq!(doc.text_content(doc.root()), "a < b and 3<4");
        assert_eq!(doc.text_nodes(doc.root()).len(), 1);
    }

    #[test]
    fn attribute_forms() {
        let doc = Document::parse(r#"<img alt='it''s' width=20 hidden data-x="a>b"/>"#).unwrap();
        let img = doc.get_elements_by_tag_name(doc.root(), "img")[0];
        assert_eq!(doc.attribute(img, "alt"), Some("it"));
        assert_eq!(doc.attribute(img, "width"), Some("20"));
        assert_eq!(doc.attribute(img, "hidden"), Some(""));
        assert_eq!(doc.attribute(img, "data-x"), Some("a>b"));
    }

    #[test]
    fn raw_text_elements() {
        let html = "<script>if (a < b && c) {}</script><p>x</p>";
        assert_eq!(roundtrip(html), html);
    }

    #[test]
    fn self_closed_math() {
        let doc = Document::parse("<p><math/>after</p>").unwrap();
        let math = doc.get_elements_by_tag_name(doc.root(), "math")[0];
        assert!(doc.children(math).is_empty());
        assert_eq!(doc.to_html(), "<p><math></math>after</p>");
    }

    #[test]
    fn text_starting_with_non_ascii() {
        assert_eq!(roundtrip("<p>é</p>"), "<p>é</p>");
        assert_eq!(roundtrip("«math»«mn»1«/mn»«/math»"), "«math»«mn»1«/mn»«/math»");

        let doc = Document::parse("<p>«math»«mi»x«/mi»«/math» après</p>").unwrap();
        let p = doc.get_elements_by_tag_name(doc.root(), "p")[0];
        assert_eq!(doc.text_content(p), "«math»«mi»x«/mi»«/math» après");
    }

    #[test]
    fn resolves_every_named_reference() {
        let doc = Document::parse("<mo>&DoubleRightArrow;</mo><mo>&NotEqualTilde;</mo>").unwrap();
        assert_eq!(doc.text_content(doc.root()), "\u{21D2}\u{2242}\u{338}");
    }

    #[test]
    fn tolerates_unterminated_markup() {
        assert_eq!(roundtrip("<p>ok</p><img src=\"x"), "<p>ok</p>");
        assert_eq!(roundtrip("<!-- open"), "<!-- open-->");
    }
}

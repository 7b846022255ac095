//! HTML serialization matching what `outerHTML` produces.

use super::parse::{is_raw_text, is_void};
use super::{Document, NodeId, NodeKind};

pub(super) fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Document => {
            for &child in doc.children(id) {
                write_node(doc, child, out);
            }
        }
        NodeKind::Element { name, attributes } => {
            out.push('<');
            out.push_str(name);
            for (key, value) in attributes {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                escape_attribute(value, out);
                out.push('"');
            }
            out.push('>');
            if is_void(name) && doc.children(id).is_empty() {
                return;
            }
            for &child in doc.children(id) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        NodeKind::Text(text) => {
            let raw = doc
                .parent(id)
                .and_then(|parent| doc.tag_name(parent))
                .is_some_and(is_raw_text);
            if raw {
                out.push_str(text);
            } else {
                escape_text(text, out);
            }
        }
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::Doctype(name) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_breaking_space_is_named() {
        let doc = Document::parse("<mo>&#160;</mo>").unwrap();
        assert_eq!(doc.to_html(), "<mo>&nbsp;</mo>");
    }

    #[test]
    fn attribute_keeps_angle_brackets() {
        let mut doc = Document::new();
        let img = doc.create_element("img");
        doc.set_attribute(img, "data-mathml", "«math»<x>");
        insta::assert_snapshot!(doc.outer_html(img), @r#"<img data-mathml="«math»<x>">"#);
    }
}

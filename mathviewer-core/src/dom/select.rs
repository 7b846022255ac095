//! The subset of CSS selectors used to scope rendering.

use super::{Document, NodeId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(input: &str) -> Option<Self> {
        let mut compound = Compound::default();
        let mut rest = input;

        let tag_end = rest.find(['#', '.']).unwrap_or(rest.len());
        let tag = &rest[..tag_end];
        if !tag.is_empty() && tag != "*" {
            if !tag.chars().all(is_name_char) {
                return None;
            }
            compound.tag = Some(tag.to_string());
        }
        rest = &rest[tag_end..];

        while let Some(sigil) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() || !name.chars().all(is_name_char) {
                return None;
            }
            match sigil {
                '#' => compound.id = Some(name.to_string()),
                _ => compound.classes.push(name.to_string()),
            }
            rest = &body[end..];
        }
        Some(compound)
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(local) = doc.local_name(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(local) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if doc.attribute(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        let class = doc.attribute(node, "class").unwrap_or("");
        self.classes
            .iter()
            .all(|wanted| class.split_whitespace().any(|c| c == wanted))
    }
}

/// Comma list of descendant chains of compound selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Vec<Compound>>,
}

impl Selector {
    /// `None` for empty or unsupported selectors.
    pub fn parse(input: &str) -> Option<Self> {
        let alternatives = input
            .split(',')
            .map(|part| {
                let chain: Option<Vec<Compound>> =
                    part.split_whitespace().map(Compound::parse).collect();
                chain.filter(|chain| !chain.is_empty())
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Selector { alternatives })
    }

    /// Whether `node` matches, considering ancestors up to (not including) `scope`.
    pub fn matches(&self, doc: &Document, node: NodeId, scope: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|chain| chain_matches(doc, chain, node, scope))
    }
}

fn chain_matches(doc: &Document, chain: &[Compound], node: NodeId, scope: NodeId) -> bool {
    let Some((last, ancestors)) = chain.split_last() else {
        return false;
    };
    if !last.matches(doc, node) {
        return false;
    }

    let mut remaining = ancestors;
    let mut current = doc.parent(node);
    while let Some((wanted, rest)) = remaining.split_last() {
        loop {
            match current {
                Some(ancestor) if ancestor != scope => {
                    current = doc.parent(ancestor);
                    if wanted.matches(doc, ancestor) {
                        break;
                    }
                }
                _ => return false,
            }
        }
        remaining = rest;
    }
    true
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

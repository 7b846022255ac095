//! In-memory document tree.
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by
//! [`NodeId`]. Removing a node detaches it from its parent; the id stays valid
//! so callers can keep inspecting or re-insert it, as with a live DOM.
//!
//! Slots are never reused: detached nodes and every node created by
//! [`Document::parse_fragment`] occupy the arena until the [`Document`] is
//! dropped. A document lives for one render or save pass, so memory grows
//! with the formulas processed in that pass.

mod parse;
mod select;
mod serialize;

use crate::error::{Error, Result};

pub use select::Selector;

/// Handle to a node of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
    /// `<!DOCTYPE name>`.
    Doctype(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    events: Vec<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            events: Vec::new(),
        }
    }

    /// Parse an HTML document or body fragment.
    pub fn parse(html: &str) -> Result<Self> {
        let mut doc = Document::new();
        let root = doc.root();
        for node in parse::parse_nodes(&mut doc, html)? {
            doc.append_child(root, node)?;
        }
        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The `<body>` element, or the document node when there is none.
    pub fn body(&self) -> NodeId {
        self.get_elements_by_tag_name(self.root(), "body")
            .first()
            .copied()
            .unwrap_or_else(|| self.root())
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn create_element(&mut self, name: impl Into<String>) -> NodeId {
        self.push(NodeKind::Element {
            name: name.into(),
            attributes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub(crate) fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(text.into()))
    }

    pub(crate) fn create_doctype(&mut self, name: impl Into<String>) -> NodeId {
        self.push(NodeKind::Doctype(name.into()))
    }

    /// Number of arena slots, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Text(_))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element { .. })
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Tag name without a namespace prefix (`m:math` -> `math`).
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.tag_name(id)
            .map(|name| name.rsplit_once(':').map_or(name, |(_, local)| local))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) -> Result<()> {
        match &mut self.node_mut(id).kind {
            NodeKind::Text(text) => {
                *text = value.into();
                Ok(())
            }
            _ => Err(Error::Dom("set_text on a non-text node".to_string())),
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match self.kind(id) {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Set an attribute, replacing an existing value in place. No-op on
    /// non-element nodes.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
            let value = value.into();
            match attributes
                .iter_mut()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
            {
                Some((_, existing)) => *existing = value,
                None => attributes.push((name.to_string(), value)),
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
            attributes.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    fn position(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let index = self.children(parent).iter().position(|&c| c == id)?;
        Some((parent, index))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, index) = self.position(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, index) = self.position(id)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// Whether `node` is `ancestor` or lies below it.
    pub fn contains(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.parent(node) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// Detach `id` from its parent. Detached nodes are left untouched.
    pub fn remove(&mut self, id: NodeId) {
        if let Some((parent, index)) = self.position(id) {
            self.node_mut(parent).children.remove(index);
        }
        self.node_mut(id).parent = None;
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `new` into `parent` before `reference`, or at the end when
    /// `reference` is `None`. `new` is first detached from its current parent.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        new: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        if self.contains(new, parent) {
            return Err(Error::Dom("cannot insert a node into itself".to_string()));
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) || reference == new {
                return Err(Error::Dom(
                    "reference node is not a child of the parent".to_string(),
                ));
            }
        }

        self.remove(new);
        let index = match reference {
            Some(reference) => self
                .children(parent)
                .iter()
                .position(|&c| c == reference)
                .unwrap_or(self.children(parent).len()),
            None => self.children(parent).len(),
        };
        self.node_mut(parent).children.insert(index, new);
        self.node_mut(new).parent = Some(parent);
        Ok(())
    }

    /// Put `new` where `old` is and detach `old`.
    pub fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> Result<()> {
        if self.parent(old) != Some(parent) {
            return Err(Error::Dom("replaced node is not a child of the parent".to_string()));
        }
        if new == old {
            return Ok(());
        }
        self.insert_before(parent, new, Some(old))?;
        self.remove(old);
        Ok(())
    }

    /// Truncate a text node at byte `offset` and insert the remainder as a new
    /// text node right after it. Returns the new node.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId> {
        let text = self
            .text(id)
            .ok_or_else(|| Error::Dom("split_text on a non-text node".to_string()))?;
        if offset > text.len() || !text.is_char_boundary(offset) {
            return Err(Error::Dom(format!(
                "split offset {offset} is not a character boundary of a {}-byte text",
                text.len()
            )));
        }

        let tail = text[offset..].to_string();
        let head = text[..offset].to_string();
        self.set_text(id, head)?;
        let new = self.create_text(tail);
        if let Some(parent) = self.parent(id) {
            let reference = self.next_sibling(id);
            self.insert_before(parent, new, reference)?;
        }
        Ok(new)
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Text(text) => text.clone(),
            _ => self
                .descendants(id)
                .into_iter()
                .filter_map(|node| self.text(node))
                .collect(),
        }
    }

    /// `id` and all its descendants in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Snapshot of the text nodes under `root` (inclusive), in document order.
    pub fn text_nodes(&self, root: NodeId) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&node| self.is_text(node))
            .collect()
    }

    /// Elements strictly below `root` whose local name matches `name`
    /// (ASCII case-insensitive; `*` matches every element).
    pub fn get_elements_by_tag_name(&self, root: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .skip(1)
            .filter(|&node| match self.local_name(node) {
                Some(local) => name == "*" || local.eq_ignore_ascii_case(name),
                None => false,
            })
            .collect()
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|&node| self.attribute(node, "id") == Some(id))
    }

    /// First element below `root` matching a CSS selector.
    pub fn query_selector(&self, root: NodeId, selector: &str) -> Option<NodeId> {
        self.query_selector_all(root, selector).into_iter().next()
    }

    /// Elements below `root` matching a CSS selector, in document order.
    ///
    /// Supports type, `#id`, `.class` and `*` compounds, descendant
    /// combinators and comma lists. Anything else matches nothing.
    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> Vec<NodeId> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        self.descendants(root)
            .into_iter()
            .skip(1)
            .filter(|&node| selector.matches(self, node, root))
            .collect()
    }

    /// Parse `markup` into detached top-level nodes owned by this document.
    pub fn parse_fragment(&mut self, markup: &str) -> Result<Vec<NodeId>> {
        parse::parse_nodes(self, markup)
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        serialize::write_node(self, id, &mut out);
        out
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            serialize::write_node(self, child, &mut out);
        }
        out
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.inner_html(self.root())
    }

    /// Record that an event named `name` fired on the document.
    pub fn dispatch_event(&mut self, name: impl Into<String>) {
        self.events.push(name.into());
    }

    /// Events dispatched so far, oldest first.
    pub fn events(&self) -> &[String] {
        &self.events
    }
}

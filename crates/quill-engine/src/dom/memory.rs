use crate::escape::escape_attribute;

use super::{Document, Event, Listener};

/// HTML elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

// ── NodeId ────────────────────────────────────────────────────────────────

/// Index of a node in a [`MemoryDocument`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

// ── NodeKind ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum NodeKind {
    Fragment,
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        listeners: Vec<(String, Listener)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

// ── MemoryDocument ────────────────────────────────────────────────────────

/// Arena-backed document used by tests, the studio, and as the default
/// registry target.
///
/// Nodes are not freed individually. A host that keeps rendering into the
/// same document calls [`clear`](Self::clear) once it drops its handles.
///
/// ```
/// use quill_engine::{Document, MemoryDocument};
///
/// let mut doc = MemoryDocument::new();
/// let div = doc.create_element("div");
/// let text = doc.create_text("hi");
/// doc.append_child(&div, &text);
/// assert_eq!(doc.serialize(&div), "<div>hi</div>");
/// ```
#[derive(Debug, Default)]
pub struct MemoryDocument {
    nodes: Vec<NodeData>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Number of nodes ever created in this document.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node and its listeners. Existing [`NodeId`]s become
    /// invalid.
    pub fn clear(&mut self) {
        log::trace!("clearing document ({} node(s))", self.nodes.len());
        self.nodes.clear();
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Tag name for elements, `None` otherwise.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { attributes, .. } => {
                attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
            }
            _ => None,
        }
    }

    /// Concatenated text of `node` and all of its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(t) => out.push_str(t),
            _ => {
                for &child in &self.nodes[node.0].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// All descendant elements of `root` with the given tag, in document order.
    pub fn find_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk(root, &mut |id| {
            if self.tag(id) == Some(tag) {
                found.push(id);
            }
        });
        found
    }

    fn walk(&self, node: NodeId, visit: &mut dyn FnMut(NodeId)) {
        for &child in &self.nodes[node.0].children {
            visit(child);
            self.walk(child, visit);
        }
    }

    /// Fire `event` on `node`, invoking every matching listener in
    /// registration order. Returns the number of listeners invoked.
    ///
    /// Events do not bubble.
    pub fn dispatch(&self, node: NodeId, event: &Event) -> usize {
        let listeners: Vec<Listener> = match &self.nodes[node.0].kind {
            NodeKind::Element { listeners, .. } => listeners
                .iter()
                .filter(|(name, _)| *name == event.name)
                .map(|(_, l)| l.clone())
                .collect(),
            _ => Vec::new(),
        };
        for listener in &listeners {
            listener.call(event);
        }
        log::trace!("dispatched {:?} to {} listener(s)", event.name, listeners.len());
        listeners.len()
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let data = &self.nodes[node.0];
        match &data.kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Fragment => {
                for &child in &data.children {
                    self.write_node(child, out);
                }
            }
            NodeKind::Element { tag, attributes, .. } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) && data.children.is_empty() {
                    return;
                }
                for &child in &data.children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(old) = self.nodes[child.0].parent.take() {
            self.nodes[old.0].children.retain(|&c| c != child);
        }
    }
}

impl Document for MemoryDocument {
    type Node = NodeId;

    fn create_fragment(&mut self) -> NodeId {
        self.push(NodeKind::Fragment)
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_string(),
            attributes: Vec::new(),
            listeners: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) {
        if matches!(self.nodes[child.0].kind, NodeKind::Fragment) {
            let moved = std::mem::take(&mut self.nodes[child.0].children);
            for grandchild in moved {
                self.nodes[grandchild.0].parent = Some(*parent);
                self.nodes[parent.0].children.push(grandchild);
            }
            return;
        }
        self.detach(*child);
        self.nodes[child.0].parent = Some(*parent);
        self.nodes[parent.0].children.push(*child);
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node.0].kind {
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn add_listener(&mut self, node: &NodeId, event: &str, listener: Listener) {
        if let NodeKind::Element { listeners, .. } = &mut self.nodes[node.0].kind {
            listeners.push((event.to_string(), listener));
        }
    }

    fn serialize(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.write_node(*node, &mut out);
        out
    }
}

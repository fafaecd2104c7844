//! Markup output document (arena-based allocation)
//!
//! Nodes link through ids instead of pointers; `last_child` keeps append
//! O(1). The writer builds this tree and the serializer walks it with an
//! explicit stack.

use std::fmt::Write as _;

/// Node identifier (index into the arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Synthetic document root.
    pub const ROOT: NodeId = NodeId(0);
    /// Absent link.
    pub(crate) const NONE: NodeId = NodeId(u32::MAX);

    fn option(self) -> Option<NodeId> {
        if self == Self::NONE {
            None
        } else {
            Some(self)
        }
    }
}

/// One node of the output document.
#[derive(Debug)]
pub struct MarkupNode {
    pub(crate) parent: NodeId,
    pub(crate) first_child: NodeId,
    pub(crate) last_child: NodeId,
    pub(crate) next_sibling: NodeId,
    pub data: MarkupNodeData,
}

impl MarkupNode {
    fn new(data: MarkupNodeData) -> Self {
        Self {
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            next_sibling: NodeId::NONE,
            data,
        }
    }
}

/// Node payload.
#[derive(Debug)]
pub enum MarkupNodeData {
    /// Document root; never serialized itself.
    Root,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    /// Escaped character content.
    Text(String),
    /// Pre-rendered content written through verbatim.
    Raw(String),
    Comment(String),
    Cdata(String),
    Dtd {
        name: String,
        public_id: Option<String>,
        system_id: Option<String>,
    },
}

/// HTML elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
];

/// Arena-backed markup tree.
#[derive(Debug)]
pub struct MarkupDocument {
    nodes: Vec<MarkupNode>,
}

impl Default for MarkupDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupDocument {
    pub fn new() -> Self {
        Self {
            nodes: vec![MarkupNode::new(MarkupNodeData::Root)],
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&MarkupNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut MarkupNode> {
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|node| node.parent.option())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root node is always present.
        self.nodes.len() <= 1
    }

    /// Create a node and append it under `parent`.
    pub fn append(&mut self, parent: NodeId, data: MarkupNodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(MarkupNode::new(data));
        self.nodes[id.0 as usize].parent = parent;

        let previous_last = self.nodes[parent.0 as usize].last_child;
        if previous_last == NodeId::NONE {
            self.nodes[parent.0 as usize].first_child = id;
        } else {
            self.nodes[previous_last.0 as usize].next_sibling = id;
        }
        self.nodes[parent.0 as usize].last_child = id;
        id
    }

    /// Serialize the document. Iterative: deep component trees must not
    /// overflow the call stack here any more than during rendering.
    pub fn to_markup(&self) -> String {
        enum Step {
            Open(NodeId),
            Close(NodeId),
        }

        let mut out = String::new();
        let mut stack = Vec::new();
        push_children_reversed(self, NodeId::ROOT, &mut stack);

        while let Some(step) = stack.pop() {
            match step {
                Step::Open(id) => {
                    let Some(node) = self.get(id) else { continue };
                    match &node.data {
                        MarkupNodeData::Root => {}
                        MarkupNodeData::Element { name, attributes } => {
                            out.push('<');
                            out.push_str(name);
                            for (attr, value) in attributes {
                                let _ = write!(
                                    out,
                                    " {}=\"{}\"",
                                    attr,
                                    escape_attribute(value)
                                );
                            }
                            out.push('>');
                            if !is_void(name) {
                                stack.push(Step::Close(id));
                                push_children_reversed(self, id, &mut stack);
                            }
                        }
                        MarkupNodeData::Text(text) => {
                            out.push_str(&escape_text(text));
                        }
                        MarkupNodeData::Raw(text) => out.push_str(text),
                        MarkupNodeData::Comment(text) => {
                            let _ = write!(out, "<!-- {text} -->");
                        }
                        MarkupNodeData::Cdata(text) => {
                            let _ = write!(out, "<![CDATA[{text}]]>");
                        }
                        MarkupNodeData::Dtd {
                            name,
                            public_id,
                            system_id,
                        } => {
                            out.push_str("<!DOCTYPE ");
                            out.push_str(name);
                            match (public_id, system_id) {
                                (Some(public), Some(system)) => {
                                    let _ = write!(
                                        out,
                                        " PUBLIC \"{public}\" \"{system}\""
                                    );
                                }
                                (Some(public), None) => {
                                    let _ = write!(out, " PUBLIC \"{public}\"");
                                }
                                (None, Some(system)) => {
                                    let _ = write!(out, " SYSTEM \"{system}\"");
                                }
                                (None, None) => {}
                            }
                            out.push('>');
                        }
                    }
                }
                Step::Close(id) => {
                    if let Some(MarkupNode {
                        data: MarkupNodeData::Element { name, .. },
                        ..
                    }) = self.get(id)
                    {
                        let _ = write!(out, "</{name}>");
                    }
                }
            }
        }
        return out;

        fn push_children_reversed(
            doc: &MarkupDocument,
            parent: NodeId,
            stack: &mut Vec<Step>,
        ) {
            let mut children = Vec::new();
            let mut child = doc.nodes[parent.0 as usize].first_child;
            while child != NodeId::NONE {
                children.push(child);
                child = doc.nodes[child.0 as usize].next_sibling;
            }
            for id in children.into_iter().rev() {
                stack.push(Step::Open(id));
            }
        }
    }
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS
        .iter()
        .any(|void| void.eq_ignore_ascii_case(name))
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_links_siblings() {
        let mut doc = MarkupDocument::new();
        let div = doc.append(
            NodeId::ROOT,
            MarkupNodeData::Element {
                name: "div".to_string(),
                attributes: Vec::new(),
            },
        );
        let a = doc.append(div, MarkupNodeData::Text("a".to_string()));
        let b = doc.append(div, MarkupNodeData::Text("b".to_string()));

        assert_eq!(doc.get(div).unwrap().first_child, a);
        assert_eq!(doc.get(div).unwrap().last_child, b);
        assert_eq!(doc.get(a).unwrap().next_sibling, b);
        assert_eq!(doc.parent(b), Some(div));
    }

    #[test]
    fn test_serialize_nested() {
        let mut doc = MarkupDocument::new();
        let div = doc.append(
            NodeId::ROOT,
            MarkupNodeData::Element {
                name: "div".to_string(),
                attributes: vec![("class".to_string(), "x".to_string())],
            },
        );
        let span = doc.append(
            div,
            MarkupNodeData::Element {
                name: "span".to_string(),
                attributes: Vec::new(),
            },
        );
        doc.append(span, MarkupNodeData::Text("hi".to_string()));

        assert_eq!(doc.to_markup(), r#"<div class="x"><span>hi</span></div>"#);
    }

    #[test]
    fn test_serialize_void_element() {
        let mut doc = MarkupDocument::new();
        doc.append(
            NodeId::ROOT,
            MarkupNodeData::Element {
                name: "br".to_string(),
                attributes: Vec::new(),
            },
        );
        assert_eq!(doc.to_markup(), "<br>");
    }

    #[test]
    fn test_escaping() {
        let mut doc = MarkupDocument::new();
        let div = doc.append(
            NodeId::ROOT,
            MarkupNodeData::Element {
                name: "div".to_string(),
                attributes: vec![("title".to_string(), "a \"b\"".to_string())],
            },
        );
        doc.append(div, MarkupNodeData::Text("1 < 2 & 3".to_string()));
        assert_eq!(
            doc.to_markup(),
            r#"<div title="a &quot;b&quot;">1 &lt; 2 &amp; 3</div>"#
        );
    }

    #[test]
    fn test_deeply_nested_serialization() {
        let mut doc = MarkupDocument::new();
        let mut parent = NodeId::ROOT;
        for _ in 0..5_000 {
            parent = doc.append(
                parent,
                MarkupNodeData::Element {
                    name: "div".to_string(),
                    attributes: Vec::new(),
                },
            );
        }
        let markup = doc.to_markup();
        assert!(markup.starts_with("<div><div>"));
        assert!(markup.ends_with("</div></div>"));
    }
}

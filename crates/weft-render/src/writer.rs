//! Markup writer
//!
//! Stateful sink the render pipeline draws into. Tracks the current open
//! element; the cleanup phase compares that cursor before and after each
//! component render to detect unbalanced markup.

use crate::document::{MarkupDocument, MarkupNodeData, NodeId};
use crate::RenderError;

#[derive(Debug)]
pub struct MarkupWriter {
    document: MarkupDocument,
    current: NodeId,
}

impl Default for MarkupWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupWriter {
    pub fn new() -> Self {
        Self {
            document: MarkupDocument::new(),
            current: NodeId::ROOT,
        }
    }

    /// Open a new element under the current one and make it current.
    pub fn element(&mut self, name: &str, attributes: &[(&str, &str)]) -> NodeId {
        let id = self.document.append(
            self.current,
            MarkupNodeData::Element {
                name: name.to_string(),
                attributes: attributes
                    .iter()
                    .map(|(n, v)| ((*n).to_string(), (*v).to_string()))
                    .collect(),
            },
        );
        self.current = id;
        id
    }

    /// Merge attributes into the current open element. An attribute already
    /// written keeps its first value.
    pub fn attributes(&mut self, attributes: &[(&str, &str)]) -> Result<(), RenderError> {
        if self.current == NodeId::ROOT {
            return Err(RenderError::NoCurrentElement);
        }
        if let Some(node) = self.document.get_mut(self.current) {
            if let MarkupNodeData::Element {
                attributes: existing,
                ..
            } = &mut node.data
            {
                for (name, value) in attributes {
                    if existing.iter().any(|(n, _)| n == name) {
                        continue;
                    }
                    existing.push(((*name).to_string(), (*value).to_string()));
                }
            }
        }
        Ok(())
    }

    /// Close the current element.
    pub fn end(&mut self) -> Result<(), RenderError> {
        if self.current == NodeId::ROOT {
            return Err(RenderError::NoCurrentElement);
        }
        self.current = self.document.parent(self.current).unwrap_or(NodeId::ROOT);
        Ok(())
    }

    /// Write escaped character content.
    pub fn write(&mut self, text: &str) {
        self.document
            .append(self.current, MarkupNodeData::Text(text.to_string()));
    }

    /// Write pre-rendered markup verbatim.
    pub fn write_raw(&mut self, text: &str) {
        self.document
            .append(self.current, MarkupNodeData::Raw(text.to_string()));
    }

    pub fn comment(&mut self, text: &str) {
        self.document
            .append(self.current, MarkupNodeData::Comment(text.to_string()));
    }

    pub fn cdata(&mut self, text: &str) {
        self.document
            .append(self.current, MarkupNodeData::Cdata(text.to_string()));
    }

    pub fn dtd(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {
        self.document.append(
            self.current,
            MarkupNodeData::Dtd {
                name: name.to_string(),
                public_id: public_id.map(str::to_string),
                system_id: system_id.map(str::to_string),
            },
        );
    }

    /// The balance-check cursor: the currently open element, if any.
    pub fn current_element(&self) -> Option<NodeId> {
        if self.current == NodeId::ROOT {
            None
        } else {
            Some(self.current)
        }
    }

    /// Serialize everything written so far.
    pub fn to_markup(&self) -> String {
        self.document.to_markup()
    }
}

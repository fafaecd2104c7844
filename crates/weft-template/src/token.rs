//! Template tokens
//!
//! The tokenizer reduces a template document to this flat, ordered stream.
//! Every `StartElement`/`StartComponent` is matched by exactly one
//! `EndElement`; `Body` closes implicitly.

use std::fmt;
use std::sync::Arc;

/// Source position attached to tokens and errors for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Identity of the resource the token was read from.
    pub resource: Arc<str>,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
}

impl Location {
    pub fn new(resource: Arc<str>, line: usize, column: usize) -> Self {
        Self {
            resource,
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, line {}", self.resource, self.line)
    }
}

/// One token of a parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateToken {
    pub kind: TokenKind,
    pub location: Option<Location>,
}

impl TemplateToken {
    pub fn new(kind: TokenKind, location: Option<Location>) -> Self {
        Self { kind, location }
    }
}

/// Token payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Literal character content.
    Text { content: String },
    /// A `${...}` expansion; the expression is trimmed of interior
    /// whitespace.
    Expansion { expression: String },
    /// Start of an ordinary markup element.
    StartElement { name: String },
    /// Start of a component. Either the element carried a non-blank id/type
    /// (then `element_name` is the markup tag to render), or the element
    /// itself was namespaced (then `component_type` comes from its name).
    StartComponent {
        element_name: Option<String>,
        id: Option<String>,
        component_type: Option<String>,
        mixins: Option<String>,
    },
    /// Attribute of the most recent start token.
    Attribute { name: String, value: String },
    /// Close of the most recent open element or component.
    EndElement,
    /// Body placeholder; content of the element is discarded.
    Body,
    /// Named (or anonymous) block; contents render only via lookup.
    Block { id: Option<String> },
    /// Block-valued parameter of the enclosing component.
    Parameter { name: String },
    /// Markup comment, with the conventional single pad space removed.
    Comment { content: String },
    /// CDATA section, emitted verbatim.
    Cdata { content: String },
    /// Document type declaration; at most one per template.
    Dtd {
        name: String,
        public_id: Option<String>,
        system_id: Option<String>,
    },
}

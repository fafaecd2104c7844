//! weft Render - Markup output and render queue
//!
//! The render side of the engine: an arena-backed output document, the
//! stateful markup writer components draw into, and the LIFO command queue
//! that drives the render-phase state machine without native recursion.

mod commands;
mod document;
mod phase;
mod queue;
mod writer;

pub use commands::{
    CdataCommand, CommentCommand, DtdCommand, EndElementCommand, StartElementCommand,
    TextCommand,
};
pub use document::{MarkupDocument, MarkupNode, MarkupNodeData, NodeId};
pub use phase::{PhaseEvent, PhaseResult, RenderPhase};
pub use queue::{CommandRc, RenderCommand, RenderQueue};
pub use writer::MarkupWriter;

/// Render-time failure.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(
        "unbalanced markup: {element} finished rendering with a different \
         open element than it started with"
    )]
    UnbalancedElements { element: String },

    #[error("no element is currently open")]
    NoCurrentElement,

    #[error(
        "render phase handler produced {value}; only booleans and render \
         commands are accepted here"
    )]
    PhaseContract { value: String },

    #[error("render of {location} failed")]
    Lifecycle {
        location: String,
        #[source]
        source: anyhow::Error,
    },
}

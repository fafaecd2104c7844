//! weft Page - Component page element tree
//!
//! The live structural model of one rendered page: component elements,
//! mixins, blocks, parameter bindings, event bubbling, and the render-phase
//! state machine driving the queue in `weft-render`.

mod binding;
mod block;
mod coerce;
mod component;
mod element;
mod events;
mod page;
mod value;

pub use binding::{Binding, BindingRc, ComputedBinding, LiteralBinding};
pub use block::Block;
pub use coerce::{CoerceError, DefaultCoercer, TypeCoercer, ValueKind};
pub use component::{
    BasicInstantiator, Component, ComponentError, ComponentModel, ComponentRc,
    ComponentResources, EmbeddedModel, Instantiator, ParameterAccess, ParameterModel,
};
pub use element::{
    ComponentPageElement, ElementRc, ElementRenderCommand, ExpansionCommand,
};
pub use events::{
    CommandCollector, ComponentEvent, EventCallback, HandlerResult, EXCEPTION_EVENT,
};
pub use page::{Page, PageLifecycleListener, PageShared};
pub use value::Value;

use weft_render::RenderError;

/// Structural and event-time failures of the page element tree.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("{container} already contains a child element with id '{id}' (ids are case-insensitive)")]
    DuplicateChildId { id: String, container: String },

    #[error("{element} already defines a block with id '{id}' (ids are case-insensitive)")]
    DuplicateBlockId { id: String, element: String },

    #[error("{element} does not define a block with id '{id}'")]
    UnknownBlock { id: String, element: String },

    #[error("parameter name references mixin '{name}', which is not attached to {element}")]
    UnknownMixin { name: String, element: String },

    #[error("no component of {element} declares or accepts parameter '{name}'")]
    UnknownParameter { name: String, element: String },

    #[error("required parameter(s) {parameters} of {element} are not bound")]
    UnboundParameters { element: String, parameters: String },

    #[error("event handler of {location} failed")]
    EventHandler {
        location: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("component lifecycle of {location} failed")]
    Component {
        location: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("expansion '${{{expression}}}' does not match a property of {element}")]
    UnknownProperty { expression: String, element: String },

    #[error(transparent)]
    Render(#[from] RenderError),
}

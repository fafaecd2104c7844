//! weft Engine - Page assembly and rendering façade
//!
//! Wires the tokenizer, element tree, and render queue together: a component
//! registry supplies instantiators and template resources, the loader
//! assembles pages, the shared cache holds parsed templates, and the pool
//! reuses clean page instances across requests.
//!
//! # Example
//! ```rust,ignore
//! use weft_engine::{ComponentRegistry, Config, WeftEngine};
//!
//! let mut registry = ComponentRegistry::new();
//! // ... register component types, templates, and pages ...
//! let engine = WeftEngine::new(registry, Config::default());
//! let html = engine.render_page("Index")?;
//! ```

mod cache;
mod engine;
mod loader;
mod pool;
mod registry;

pub use cache::TemplateCache;
pub use engine::{Config, WeftEngine};
pub use loader::PageLoader;
pub use pool::{CheckedOutPage, PagePool};
pub use registry::ComponentRegistry;

use weft_page::PageError;
use weft_render::RenderError;
use weft_template::ParseError;

/// Anything that can go wrong between a page name and its markup.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no page named '{name}' is registered")]
    UnknownPage { name: String },

    #[error("no component type '{component_type}' is registered")]
    UnknownComponentType { component_type: String },

    #[error("template structure error: {message}")]
    TemplateStructure { message: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

//! Parsed template model

use std::collections::HashSet;
use std::sync::Arc;

use crate::token::TemplateToken;

/// Immutable result of tokenizing one template resource.
///
/// Cached keyed by resource identity + locale and rebuilt when the backing
/// resource changes; the token order is the render order.
#[derive(Debug, Clone)]
pub struct ComponentTemplate {
    resource: Arc<str>,
    tokens: Vec<TemplateToken>,
    component_ids: HashSet<String>,
}

impl ComponentTemplate {
    pub fn new(
        resource: Arc<str>,
        tokens: Vec<TemplateToken>,
        component_ids: HashSet<String>,
    ) -> Self {
        Self {
            resource,
            tokens,
            component_ids,
        }
    }

    /// Identity of the resource this template was parsed from.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Tokens in document order.
    pub fn tokens(&self) -> &[TemplateToken] {
        &self.tokens
    }

    /// Non-blank component ids declared in the template. Duplicates collapse
    /// here; uniqueness is enforced at tree assembly.
    pub fn component_ids(&self) -> &HashSet<String> {
        &self.component_ids
    }

    /// Whether the template declares a component with the exact given id.
    pub fn declares_component(&self, id: &str) -> bool {
        self.component_ids.contains(id)
    }
}

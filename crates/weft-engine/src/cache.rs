//! Template cache
//!
//! The one structure shared across rendering threads: parsed templates
//! keyed by resource identity + locale, with publish/subscribe invalidation
//! so pools and other consumers learn when a resource changed.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use weft_template::ComponentTemplate;

type InvalidationListener = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
pub struct TemplateCache {
    templates: DashMap<(String, String), Arc<ComponentTemplate>>,
    listeners: Mutex<Vec<InvalidationListener>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &str, locale: &str) -> Option<Arc<ComponentTemplate>> {
        self.templates
            .get(&(identity.to_string(), locale.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn store(
        &self,
        identity: &str,
        locale: &str,
        template: ComponentTemplate,
    ) -> Arc<ComponentTemplate> {
        let template = Arc::new(template);
        self.templates.insert(
            (identity.to_string(), locale.to_string()),
            template.clone(),
        );
        template
    }

    /// Drop every locale of the given resource and notify the invalidation
    /// listeners.
    pub fn invalidate(&self, identity: &str) {
        self.templates.retain(|(id, _), _| id != identity);
        tracing::debug!(resource = identity, "template invalidated");
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(identity);
        }
    }

    pub fn add_invalidation_listener(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Box::new(listener));
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

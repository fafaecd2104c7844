//! Component registry
//!
//! The narrowed resource-resolver contract: component type names map to
//! instantiators and (optionally) template resources; page names map to
//! their root component type. Lookups are case-insensitive.

use std::collections::HashMap;
use std::rc::Rc;

use weft_page::Instantiator;
use weft_template::TemplateResource;

#[derive(Default)]
pub struct ComponentRegistry {
    instantiators: HashMap<String, Rc<dyn Instantiator>>,
    templates: HashMap<String, Rc<dyn TemplateResource>>,
    pages: HashMap<String, String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the instantiator for a component type.
    pub fn register_component(
        &mut self,
        component_type: &str,
        instantiator: Rc<dyn Instantiator>,
    ) {
        self.instantiators
            .insert(component_type.to_lowercase(), instantiator);
    }

    /// Register the template resource backing a component type. Types
    /// without a template render only what their class draws.
    pub fn register_template(
        &mut self,
        component_type: &str,
        resource: Rc<dyn TemplateResource>,
    ) {
        self.templates
            .insert(component_type.to_lowercase(), resource);
    }

    /// Register a page under its logical name, naming its root component
    /// type.
    pub fn register_page(&mut self, page_name: &str, component_type: &str) {
        self.pages
            .insert(page_name.to_lowercase(), component_type.to_string());
    }

    pub fn instantiator(&self, component_type: &str) -> Option<Rc<dyn Instantiator>> {
        self.instantiators
            .get(&component_type.to_lowercase())
            .cloned()
    }

    pub fn template(&self, component_type: &str) -> Option<Rc<dyn TemplateResource>> {
        self.templates.get(&component_type.to_lowercase()).cloned()
    }

    pub fn page_component(&self, page_name: &str) -> Option<&str> {
        self.pages
            .get(&page_name.to_lowercase())
            .map(String::as_str)
    }
}

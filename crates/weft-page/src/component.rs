//! Component capability interface
//!
//! User components and mixins implement `Component`; the framework never
//! sees past this interface. Instances are produced by an external
//! `Instantiator` (the enhancement layer's factory), which also exposes the
//! static `ComponentModel`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use weft_render::{MarkupWriter, PhaseEvent, RenderPhase};

use crate::binding::BindingRc;
use crate::events::ComponentEvent;
use crate::value::Value;

pub type ComponentRc = Rc<RefCell<dyn Component>>;

/// Failure inside user component code, carried through the framework
/// wrapped once with location context.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ComponentError(#[from] anyhow::Error);

impl ComponentError {
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self(anyhow::anyhow!("{message}"))
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }
}

/// The closed capability interface every component and mixin implements.
pub trait Component {
    /// Handle a named component event. Returns true when a handler method
    /// recognized the event, whether or not it aborted it.
    fn dispatch_component_event(
        &mut self,
        event: &mut ComponentEvent<'_>,
    ) -> Result<bool, ComponentError> {
        let _ = event;
        Ok(false)
    }

    /// Hook invoked once per render phase.
    fn render_phase(
        &mut self,
        phase: RenderPhase,
        writer: &mut MarkupWriter,
        event: &mut PhaseEvent,
    ) -> Result<(), ComponentError> {
        let _ = (phase, writer, event);
        Ok(())
    }

    /// Lifecycle notification fired when the containing page finishes
    /// loading.
    fn containing_page_did_load(&mut self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Read a named property, the value source for `${...}` expansions.
    fn property(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }
}

/// Formal parameter declaration.
#[derive(Debug, Clone)]
pub struct ParameterModel {
    pub name: String,
    pub required: bool,
}

/// Embedded component declared by the component class rather than its
/// template.
#[derive(Debug, Clone)]
pub struct EmbeddedModel {
    pub id: String,
    pub component_type: String,
}

/// Static model of a component class: what the enhancement layer knows
/// without an instance.
#[derive(Debug, Clone)]
pub struct ComponentModel {
    component_class: String,
    parameters: Vec<ParameterModel>,
    supports_informal_parameters: bool,
    mixin_after: bool,
    embedded: Vec<EmbeddedModel>,
}

impl ComponentModel {
    pub fn new(component_class: impl Into<String>) -> Self {
        Self {
            component_class: component_class.into(),
            parameters: Vec::new(),
            supports_informal_parameters: false,
            mixin_after: false,
            embedded: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, required: bool) -> Self {
        self.parameters.push(ParameterModel {
            name: name.into(),
            required,
        });
        self
    }

    pub fn with_informal_parameters(mut self) -> Self {
        self.supports_informal_parameters = true;
        self
    }

    /// Mark the class as a mixin ordered after its core component.
    pub fn with_mixin_after(mut self) -> Self {
        self.mixin_after = true;
        self
    }

    pub fn with_embedded(
        mut self,
        id: impl Into<String>,
        component_type: impl Into<String>,
    ) -> Self {
        self.embedded.push(EmbeddedModel {
            id: id.into(),
            component_type: component_type.into(),
        });
        self
    }

    pub fn component_class(&self) -> &str {
        &self.component_class
    }

    /// Last segment of the class name; mixins register under this.
    pub fn short_name(&self) -> &str {
        self.component_class
            .rsplit(['/', '.'])
            .next()
            .unwrap_or(&self.component_class)
    }

    pub fn parameters(&self) -> &[ParameterModel] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterModel> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn supports_informal_parameters(&self) -> bool {
        self.supports_informal_parameters
    }

    pub fn mixin_after(&self) -> bool {
        self.mixin_after
    }

    pub fn embedded_type(&self, id: &str) -> Option<&str> {
        self.embedded
            .iter()
            .find(|e| e.id.eq_ignore_ascii_case(id))
            .map(|e| e.component_type.as_str())
    }
}

/// Shared view of one component slot's bound parameters.
#[derive(Clone)]
pub struct ParameterAccess {
    // Keyed by lowercased name; keeps the declared-case name for listings.
    bindings: Rc<RefCell<HashMap<String, (String, BindingRc)>>>,
    formal: Rc<HashSet<String>>,
}

impl ParameterAccess {
    pub(crate) fn new(model: &ComponentModel) -> Self {
        let formal = model
            .parameters()
            .iter()
            .map(|p| p.name.to_lowercase())
            .collect();
        Self {
            bindings: Rc::new(RefCell::new(HashMap::new())),
            formal: Rc::new(formal),
        }
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(&name.to_lowercase())
    }

    /// Read a bound parameter's current value.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.bindings
            .borrow()
            .get(&name.to_lowercase())
            .map(|(_, binding)| binding.get())
    }

    /// Informal (undeclared) parameters, name-sorted for deterministic
    /// attribute output.
    pub fn informal(&self) -> Vec<(String, Value)> {
        let mut result: Vec<(String, Value)> = self
            .bindings
            .borrow()
            .iter()
            .filter(|(key, _)| !self.formal.contains(key.as_str()))
            .map(|(_, (name, binding))| (name.clone(), binding.get()))
            .collect();
        result.sort_by(|(a, _), (b, _)| a.cmp(b));
        result
    }

    pub(crate) fn bind(&self, name: &str, binding: BindingRc) {
        self.bindings
            .borrow_mut()
            .insert(name.to_lowercase(), (name.to_string(), binding));
    }
}

/// Everything a component instance receives from the framework at
/// construction time.
#[derive(Clone)]
pub struct ComponentResources {
    complete_id: String,
    nested_id: String,
    element_name: Option<String>,
    params: ParameterAccess,
}

impl ComponentResources {
    pub(crate) fn new(
        complete_id: String,
        nested_id: String,
        element_name: Option<String>,
        params: ParameterAccess,
    ) -> Self {
        Self {
            complete_id,
            nested_id,
            element_name,
            params,
        }
    }

    pub fn complete_id(&self) -> &str {
        &self.complete_id
    }

    pub fn nested_id(&self) -> &str {
        &self.nested_id
    }

    /// Markup tag of the template element the component was bound to, when
    /// it was declared on a plain element rather than a namespaced one.
    pub fn element_name(&self) -> Option<&str> {
        self.element_name.as_deref()
    }

    pub fn params(&self) -> &ParameterAccess {
        &self.params
    }
}

/// External factory contract: the enhancement layer turns per-element
/// resources into a live component instance.
pub trait Instantiator {
    fn model(&self) -> &Arc<ComponentModel>;

    fn instantiate(&self, resources: ComponentResources) -> ComponentRc;
}

/// Instantiator backed by a plain closure; sufficient wherever no bytecode
/// weaving exists.
pub struct BasicInstantiator<F> {
    model: Arc<ComponentModel>,
    factory: F,
}

impl<F> BasicInstantiator<F>
where
    F: Fn(ComponentResources) -> ComponentRc,
{
    pub fn new(model: ComponentModel, factory: F) -> Self {
        Self {
            model: Arc::new(model),
            factory,
        }
    }
}

impl<F> Instantiator for BasicInstantiator<F>
where
    F: Fn(ComponentResources) -> ComponentRc,
{
    fn model(&self) -> &Arc<ComponentModel> {
        &self.model
    }

    fn instantiate(&self, resources: ComponentResources) -> ComponentRc {
        (self.factory)(resources)
    }
}

//! Component page element
//!
//! One node of the live per-request component tree: ids, children, blocks,
//! the core component, optional mixins, parameter routing, event bubbling,
//! and the render-phase state machine that drives the LIFO queue.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use weft_render::{
    CommandRc, MarkupWriter, NodeId, PhaseEvent, RenderCommand, RenderError, RenderPhase,
    RenderQueue,
};
use weft_template::Location;

use crate::coerce::{TypeCoercer, ValueKind};
use crate::component::{
    ComponentRc, ComponentResources, Instantiator, ParameterAccess,
};
use crate::binding::BindingRc;
use crate::block::Block;
use crate::events::{ComponentEvent, EventCallback, NotifyCallback, EXCEPTION_EVENT};
use crate::page::PageShared;
use crate::value::Value;
use crate::{ComponentError, PageError};

pub type ElementRc = Rc<RefCell<ComponentPageElement>>;

/// One component plus its static model and bound parameters.
pub(crate) struct ComponentSlot {
    pub component: ComponentRc,
    pub model: std::sync::Arc<crate::component::ComponentModel>,
    pub params: ParameterAccess,
}

impl ComponentSlot {
    fn create(
        instantiator: &dyn Instantiator,
        complete_id: &str,
        nested_id: &str,
        element_name: Option<String>,
    ) -> Self {
        let model = instantiator.model().clone();
        let params = ParameterAccess::new(&model);
        let resources = ComponentResources::new(
            complete_id.to_string(),
            nested_id.to_string(),
            element_name,
            params.clone(),
        );
        let component = instantiator.instantiate(resources);
        Self {
            component,
            model,
            params,
        }
    }
}

struct MixinSlot {
    /// Short class name the mixin registered under.
    name: String,
    slot: ComponentSlot,
}

/// Which component a dispatch step targets.
#[derive(Debug, Clone, Copy)]
enum DispatchRef {
    Core,
    Mixin(usize),
}

/// Present only when at least one mixin is attached; the single-component
/// fast path skips this tier entirely.
struct MixinSet {
    slots: Vec<MixinSlot>,
    /// Final dispatch order, fixed when the containing page loads.
    ordered: Option<Vec<DispatchRef>>,
}

impl MixinSet {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            ordered: None,
        }
    }

    fn compute_order(&self) -> Vec<DispatchRef> {
        let mut order = Vec::with_capacity(self.slots.len() + 1);
        for (index, mixin) in self.slots.iter().enumerate() {
            if !mixin.slot.model.mixin_after() {
                order.push(DispatchRef::Mixin(index));
            }
        }
        order.push(DispatchRef::Core);
        for (index, mixin) in self.slots.iter().enumerate() {
            if mixin.slot.model.mixin_after() {
                order.push(DispatchRef::Mixin(index));
            }
        }
        order
    }

    fn finalize(&mut self) {
        self.ordered = Some(self.compute_order());
    }

    fn dispatch_refs(&self) -> Vec<DispatchRef> {
        match &self.ordered {
            Some(order) => order.clone(),
            None => self.compute_order(),
        }
    }

    /// Mixin slot indices sorted by registered name, the resolution order
    /// for undotted parameter names.
    fn name_sorted(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.slots.len()).collect();
        indices.sort_by_key(|&i| self.slots[i].name.to_lowercase());
        indices
    }

    fn find(&self, name: &str) -> Option<&MixinSlot> {
        self.slots
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

pub struct ComponentPageElement {
    page: Rc<PageShared>,
    id: String,
    nested_id: String,
    complete_id: String,
    location: Option<Location>,
    container: Option<Weak<RefCell<ComponentPageElement>>>,
    children: HashMap<String, ElementRc>,
    blocks: HashMap<String, Block>,
    template_elements: Vec<CommandRc>,
    body_elements: Vec<CommandRc>,
    core: ComponentSlot,
    mixins: Option<MixinSet>,
    /// Writer cursor recorded at render entry; cleanup compares against it.
    render_mark: Cell<Option<NodeId>>,
}

impl std::fmt::Debug for ComponentPageElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentPageElement")
            .field("id", &self.id)
            .field("nested_id", &self.nested_id)
            .field("complete_id", &self.complete_id)
            .finish_non_exhaustive()
    }
}

impl ComponentPageElement {
    /// Create the root element of a page.
    pub fn new_root(
        page: Rc<PageShared>,
        instantiator: &dyn Instantiator,
        location: Option<Location>,
    ) -> ElementRc {
        let complete_id = page.name().to_string();
        let core = ComponentSlot::create(instantiator, &complete_id, "", None);
        Rc::new(RefCell::new(Self {
            page,
            id: String::new(),
            nested_id: String::new(),
            complete_id,
            location,
            container: None,
            children: HashMap::new(),
            blocks: HashMap::new(),
            template_elements: Vec::new(),
            body_elements: Vec::new(),
            core,
            mixins: None,
            render_mark: Cell::new(None),
        }))
    }

    /// Create a child element and register it under its container.
    ///
    /// Child ids are unique within a parent, compared case-insensitively.
    pub fn new_child(
        parent: &ElementRc,
        id: &str,
        element_name: Option<String>,
        instantiator: &dyn Instantiator,
        location: Option<Location>,
    ) -> Result<ElementRc, PageError> {
        let key = id.to_lowercase();
        let (page, nested_id, container_id) = {
            let parent_ref = parent.borrow();
            if parent_ref.children.contains_key(&key) {
                return Err(PageError::DuplicateChildId {
                    id: id.to_string(),
                    container: parent_ref.complete_id.clone(),
                });
            }
            let nested_id = if parent_ref.nested_id.is_empty() {
                id.to_string()
            } else {
                format!("{}.{id}", parent_ref.nested_id)
            };
            (
                parent_ref.page.clone(),
                nested_id,
                parent_ref.complete_id.clone(),
            )
        };

        let complete_id = format!("{}:{nested_id}", page.name());
        let core = ComponentSlot::create(instantiator, &complete_id, &nested_id, element_name);
        let child = Rc::new(RefCell::new(Self {
            page,
            id: id.to_string(),
            nested_id,
            complete_id,
            location,
            container: Some(Rc::downgrade(parent)),
            children: HashMap::new(),
            blocks: HashMap::new(),
            template_elements: Vec::new(),
            body_elements: Vec::new(),
            core,
            mixins: None,
            render_mark: Cell::new(None),
        }));
        tracing::trace!(
            container = %container_id,
            child = %child.borrow().complete_id,
            "child element created"
        );
        parent.borrow_mut().children.insert(key, child.clone());
        Ok(child)
    }

    // --- identity ----------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn nested_id(&self) -> &str {
        &self.nested_id
    }

    pub fn complete_id(&self) -> &str {
        &self.complete_id
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn page(&self) -> &Rc<PageShared> {
        &self.page
    }

    pub fn container(&self) -> Option<ElementRc> {
        self.container.as_ref().and_then(Weak::upgrade)
    }

    pub fn child(&self, id: &str) -> Option<ElementRc> {
        self.children.get(&id.to_lowercase()).cloned()
    }

    /// Static model of the core component.
    pub fn component_model(&self) -> &std::sync::Arc<crate::component::ComponentModel> {
        &self.core.model
    }

    /// Element identity with source position, for error messages.
    pub fn location_label(&self) -> String {
        match &self.location {
            Some(location) => format!("{} (at {location})", self.complete_id),
            None => self.complete_id.clone(),
        }
    }

    // --- structure ---------------------------------------------------------

    /// Render commands compiled from this element's own template.
    pub fn set_template_elements(&mut self, elements: Vec<CommandRc>) {
        self.template_elements = elements;
    }

    /// Render commands supplied by the container when this element was
    /// embedded with body content.
    pub fn set_body_elements(&mut self, elements: Vec<CommandRc>) {
        self.body_elements = elements;
    }

    pub fn has_body(&self) -> bool {
        !self.body_elements.is_empty()
    }

    /// Attach a mixin, keyed by the short name of its class. The first
    /// mixin switches the element into multi-component dispatch.
    pub fn add_mixin(&mut self, instantiator: &dyn Instantiator) {
        let short_name = instantiator.model().short_name().to_string();
        let complete_id = format!("{}${}", self.complete_id, short_name.to_lowercase());
        let slot = ComponentSlot::create(instantiator, &complete_id, &self.nested_id, None);
        self.mixins
            .get_or_insert_with(MixinSet::new)
            .slots
            .push(MixinSlot {
                name: short_name,
                slot,
            });
    }

    /// Register a named block. Ids are case-insensitive and unique per
    /// element.
    pub fn add_block(&mut self, id: &str, block: Block) -> Result<(), PageError> {
        let key = id.to_lowercase();
        if self.blocks.contains_key(&key) {
            return Err(PageError::DuplicateBlockId {
                id: id.to_string(),
                element: self.location_label(),
            });
        }
        self.blocks.insert(key, block);
        Ok(())
    }

    pub fn find_block(&self, id: &str) -> Option<Block> {
        self.blocks.get(&id.to_lowercase()).cloned()
    }

    pub fn get_block(&self, id: &str) -> Result<Block, PageError> {
        self.find_block(id).ok_or_else(|| PageError::UnknownBlock {
            id: id.to_string(),
            element: self.location_label(),
        })
    }

    // --- parameter binding --------------------------------------------------

    /// Bind a parameter by name.
    ///
    /// A dotted name routes to the mixin named by the prefix. An undotted
    /// name tries the core component's formal parameters, then each mixin in
    /// name-sorted order, then falls back to the first component (core
    /// first) that supports informal parameters.
    pub fn bind_parameter(&mut self, name: &str, binding: BindingRc) -> Result<(), PageError> {
        if let Some((mixin_name, parameter)) = name.split_once('.') {
            let Some(mixin) = self.mixins.as_ref().and_then(|set| set.find(mixin_name))
            else {
                return Err(PageError::UnknownMixin {
                    name: mixin_name.to_string(),
                    element: self.location_label(),
                });
            };
            mixin.slot.params.bind(parameter, binding);
            return Ok(());
        }

        if self.core.model.parameter(name).is_some() {
            self.core.params.bind(name, binding);
            return Ok(());
        }

        if let Some(set) = &self.mixins {
            for index in set.name_sorted() {
                let mixin = &set.slots[index];
                if mixin.slot.model.parameter(name).is_some() {
                    mixin.slot.params.bind(name, binding);
                    return Ok(());
                }
            }
        }

        // Informal fallback: one component accumulates every unmatched
        // binding.
        if self.core.model.supports_informal_parameters() {
            self.core.params.bind(name, binding);
            return Ok(());
        }
        if let Some(set) = &self.mixins {
            for index in set.name_sorted() {
                let mixin = &set.slots[index];
                if mixin.slot.model.supports_informal_parameters() {
                    mixin.slot.params.bind(name, binding);
                    return Ok(());
                }
            }
        }

        Err(PageError::UnknownParameter {
            name: name.to_string(),
            element: self.location_label(),
        })
    }

    // --- lifecycle ----------------------------------------------------------

    /// Page-load completion: fix the mixin dispatch order, notify every
    /// component, then verify required parameters.
    pub fn containing_page_did_load(&mut self) -> Result<(), PageError> {
        if let Some(set) = &mut self.mixins {
            set.finalize();
        }

        let components = self.dispatch_components();
        let location = self.location_label();
        for component in components {
            component
                .borrow_mut()
                .containing_page_did_load()
                .map_err(|error| PageError::Component {
                    location: location.clone(),
                    source: error.into_inner(),
                })?;
        }

        let mut unbound = Vec::new();
        for parameter in self.core.model.parameters() {
            if parameter.required && !self.core.params.is_bound(&parameter.name) {
                unbound.push(parameter.name.clone());
            }
        }
        if let Some(set) = &self.mixins {
            for mixin in &set.slots {
                for parameter in mixin.slot.model.parameters() {
                    if parameter.required && !mixin.slot.params.is_bound(&parameter.name) {
                        unbound.push(format!("{}.{}", mixin.name, parameter.name));
                    }
                }
            }
        }
        if !unbound.is_empty() {
            return Err(PageError::UnboundParameters {
                element: location,
                parameters: unbound.join(", "),
            });
        }
        Ok(())
    }

    // --- events -------------------------------------------------------------

    /// Component instances in dispatch order.
    fn dispatch_components(&self) -> Vec<ComponentRc> {
        match &self.mixins {
            None => vec![self.core.component.clone()],
            Some(set) => set
                .dispatch_refs()
                .iter()
                .map(|reference| match reference {
                    DispatchRef::Core => self.core.component.clone(),
                    DispatchRef::Mixin(index) => set.slots[*index].slot.component.clone(),
                })
                .collect(),
        }
    }

    /// Dispatch an event to this element's components. With no mixins the
    /// core component is invoked directly; otherwise the ordered component
    /// list is walked, OR-ing results and stopping once the event aborts.
    pub fn dispatch_event(
        &self,
        event: &mut ComponentEvent<'_>,
    ) -> Result<bool, ComponentError> {
        let Some(set) = &self.mixins else {
            let component = self.core.component.clone();
            let result = component.borrow_mut().dispatch_component_event(event);
            return result;
        };

        let mut handled = false;
        for reference in set.dispatch_refs() {
            let component = match reference {
                DispatchRef::Core => self.core.component.clone(),
                DispatchRef::Mixin(index) => set.slots[index].slot.component.clone(),
            };
            handled |= component.borrow_mut().dispatch_component_event(event)?;
            if event.is_aborted() {
                break;
            }
        }
        Ok(handled)
    }

    /// Fire a named event at this element and bubble it up the containment
    /// chain until a handler aborts it or the page root is passed.
    pub fn trigger_event(
        this: &ElementRc,
        event_type: &str,
        context: &[Value],
        callback: Option<&mut dyn EventCallback>,
    ) -> Result<bool, PageError> {
        match callback {
            Some(callback) => Self::bubble(this, event_type, context, callback),
            None => {
                let mut notify = NotifyCallback;
                Self::bubble(this, event_type, context, &mut notify)
            }
        }
    }

    fn bubble(
        origin: &ElementRc,
        event_type: &str,
        context: &[Value],
        callback: &mut dyn EventCallback,
    ) -> Result<bool, PageError> {
        let mut handled = false;
        let mut component_id = origin.borrow().nested_id.clone();
        let mut current = Some(origin.clone());

        while let Some(element) = current {
            let mut event =
                ComponentEvent::new(event_type, component_id.clone(), context, &mut *callback);
            let outcome = {
                let element_ref = element.borrow();
                element_ref.dispatch_event(&mut event)
            };
            let aborted = event.is_aborted();
            drop(event);

            match outcome {
                Ok(result) => {
                    handled |= result;
                    if aborted {
                        return Ok(true);
                    }
                }
                Err(error) => {
                    if event_type.eq_ignore_ascii_case(EXCEPTION_EVENT) {
                        // Failure while already handling a failure; the
                        // caller rethrows the original.
                        let location = element.borrow().location_label();
                        return Err(PageError::EventHandler {
                            location,
                            source: error.into_inner(),
                        });
                    }
                    return Self::rethrow_through_exception_event(&element, error);
                }
            }

            // The next container up sees the event as originating from this
            // element.
            component_id = element.borrow().nested_id.clone();
            current = element.borrow().container();
        }
        Ok(handled)
    }

    /// Wrap a handler failure once with location context, give components a
    /// chance to consume it via a synthetic "exception" event, and rethrow
    /// the wrapped failure if nothing does. A second failure during that
    /// dispatch is logged and the first failure wins.
    fn rethrow_through_exception_event(
        element: &ElementRc,
        error: ComponentError,
    ) -> Result<bool, PageError> {
        let location = element.borrow().location_label();
        let wrapped = PageError::EventHandler {
            location,
            source: error.into_inner(),
        };
        tracing::error!(error = %wrapped, "event handler failed; dispatching exception event");

        let context = [Value::String(wrapped.to_string())];
        let mut notify = NotifyCallback;
        match Self::bubble(element, EXCEPTION_EVENT, &context, &mut notify) {
            Ok(true) => Ok(true),
            Ok(false) => Err(wrapped),
            Err(second) => {
                tracing::error!(
                    error = %second,
                    "exception event handling failed; rethrowing the original failure"
                );
                Err(wrapped)
            }
        }
    }

    // --- rendering ----------------------------------------------------------

    /// Entry point: mark the page dirty, remember the writer cursor for the
    /// balance check, and push the first phase.
    pub fn render(this: &ElementRc, writer: &mut MarkupWriter, queue: &mut RenderQueue) {
        {
            let element = this.borrow();
            element.page.increment_dirty();
            element.render_mark.set(writer.current_element());
            tracing::trace!(element = %element.complete_id, "render queued");
        }
        queue.push(phase_command(this, RenderPhase::SetupRender));
    }

    /// Execute one phase: invoke the hook across the component list, then
    /// push successor phases and child work according to the state machine.
    fn run_phase(
        this: &ElementRc,
        phase: RenderPhase,
        writer: &mut MarkupWriter,
        queue: &mut RenderQueue,
    ) -> Result<(), RenderError> {
        let (components, location) = {
            let element = this.borrow();
            (element.dispatch_components(), element.location_label())
        };

        let mut event = PhaseEvent::new();
        for component in &components {
            component
                .borrow_mut()
                .render_phase(phase, writer, &mut event)
                .map_err(|error| RenderError::Lifecycle {
                    location: location.clone(),
                    source: error.into_inner(),
                })?;
        }
        let proceed = event.continue_rendering();
        let followups = event.take_commands();

        {
            let element = this.borrow();
            match phase {
                RenderPhase::SetupRender => {
                    let next = if proceed {
                        RenderPhase::BeginRender
                    } else {
                        RenderPhase::CleanupRender
                    };
                    queue.push(phase_command(this, next));
                }
                RenderPhase::BeginRender => {
                    let next = if proceed {
                        RenderPhase::BeforeRenderTemplate
                    } else {
                        RenderPhase::AfterRender
                    };
                    queue.push(phase_command(this, next));
                }
                RenderPhase::BeforeRenderTemplate => {
                    queue.push(phase_command(this, RenderPhase::AfterRenderTemplate));
                    if proceed {
                        for command in element.template_elements.iter().rev() {
                            queue.push(command.clone());
                        }
                    }
                }
                RenderPhase::AfterRenderTemplate => {
                    // A veto here loops the template.
                    let next = if proceed {
                        RenderPhase::BeforeRenderBody
                    } else {
                        RenderPhase::BeforeRenderTemplate
                    };
                    queue.push(phase_command(this, next));
                }
                RenderPhase::BeforeRenderBody => {
                    queue.push(phase_command(this, RenderPhase::AfterRenderBody));
                    if proceed {
                        for command in element.body_elements.iter().rev() {
                            queue.push(command.clone());
                        }
                    }
                }
                RenderPhase::AfterRenderBody => {
                    let next = if proceed {
                        RenderPhase::AfterRender
                    } else {
                        RenderPhase::BeforeRenderBody
                    };
                    queue.push(phase_command(this, next));
                }
                RenderPhase::AfterRender => {
                    // A veto restarts the component's own render cycle.
                    let next = if proceed {
                        RenderPhase::CleanupRender
                    } else {
                        RenderPhase::BeginRender
                    };
                    queue.push(phase_command(this, next));
                }
                RenderPhase::CleanupRender => {
                    if writer.current_element() != element.render_mark.get() {
                        return Err(RenderError::UnbalancedElements {
                            element: element.complete_id.clone(),
                        });
                    }
                    element.page.decrement_dirty();
                    tracing::trace!(element = %element.complete_id, "render complete");
                }
            }
        }

        // Follow-up commands run immediately after this phase.
        for command in followups.into_iter().rev() {
            queue.push(command);
        }
        Ok(())
    }
}

fn phase_command(element: &ElementRc, phase: RenderPhase) -> CommandRc {
    Rc::new(PhaseCommand {
        element: element.clone(),
        phase,
    })
}

/// One queued phase of one element.
struct PhaseCommand {
    element: ElementRc,
    phase: RenderPhase,
}

impl RenderCommand for PhaseCommand {
    fn render(
        &self,
        writer: &mut MarkupWriter,
        queue: &mut RenderQueue,
    ) -> Result<(), RenderError> {
        ComponentPageElement::run_phase(&self.element, self.phase, writer, queue)
    }

    fn label(&self) -> String {
        format!("{}:{}", self.phase, self.element.borrow().complete_id())
    }
}

/// Queued render of an embedded child element.
pub struct ElementRenderCommand {
    element: ElementRc,
}

impl ElementRenderCommand {
    pub fn new(element: ElementRc) -> Self {
        Self { element }
    }
}

impl RenderCommand for ElementRenderCommand {
    fn render(
        &self,
        writer: &mut MarkupWriter,
        queue: &mut RenderQueue,
    ) -> Result<(), RenderError> {
        ComponentPageElement::render(&self.element, writer, queue);
        Ok(())
    }

    fn label(&self) -> String {
        self.element.borrow().complete_id().to_string()
    }
}

/// A `${...}` expansion: reads the expression as a property of the owning
/// element's core component and writes it through the type coercer.
pub struct ExpansionCommand {
    element: Weak<RefCell<ComponentPageElement>>,
    expression: String,
    coercer: Rc<dyn TypeCoercer>,
}

impl ExpansionCommand {
    pub fn new(element: &ElementRc, expression: String, coercer: Rc<dyn TypeCoercer>) -> Self {
        Self {
            element: Rc::downgrade(element),
            expression,
            coercer,
        }
    }
}

impl RenderCommand for ExpansionCommand {
    fn render(
        &self,
        writer: &mut MarkupWriter,
        _queue: &mut RenderQueue,
    ) -> Result<(), RenderError> {
        let Some(element) = self.element.upgrade() else {
            return Ok(());
        };
        let (value, location) = {
            let element_ref = element.borrow();
            let value = element_ref.core.component.borrow().property(&self.expression);
            (value, element_ref.location_label())
        };
        let Some(value) = value else {
            return Err(RenderError::Lifecycle {
                location: location.clone(),
                source: anyhow::Error::new(PageError::UnknownProperty {
                    expression: self.expression.clone(),
                    element: location,
                }),
            });
        };
        let text = self
            .coercer
            .coerce(&value, ValueKind::String)
            .map_err(|error| RenderError::Lifecycle {
                location,
                source: anyhow::Error::new(error),
            })?;
        if let Value::String(text) = text {
            writer.write(&text);
        }
        Ok(())
    }

    fn label(&self) -> String {
        format!("${{{}}}", self.expression)
    }
}

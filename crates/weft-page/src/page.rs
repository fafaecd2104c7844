//! Page
//!
//! Root ownership unit for one rendered page instance. The dirty count is
//! the pool-reuse gate: it rises when an element starts rendering and falls
//! only after that element's cleanup phase confirms balanced markup, so a
//! page abandoned mid-render never reports clean.

use std::cell::Cell;
use std::rc::Rc;

use crate::element::ElementRc;
use crate::PageError;

/// State shared between a page and every element in its tree.
#[derive(Debug)]
pub struct PageShared {
    name: String,
    locale: String,
    dirty_count: Cell<u32>,
}

impl PageShared {
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            locale: locale.into(),
            dirty_count: Cell::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn dirty_count(&self) -> u32 {
        self.dirty_count.get()
    }

    pub(crate) fn increment_dirty(&self) {
        self.dirty_count.set(self.dirty_count.get() + 1);
    }

    pub(crate) fn decrement_dirty(&self) {
        let count = self.dirty_count.get();
        if count == 0 {
            tracing::warn!(page = %self.name, "dirty count underflow");
            return;
        }
        self.dirty_count.set(count - 1);
    }
}

/// Observes page lifecycle transitions.
pub trait PageLifecycleListener {
    /// The page finished loading: tree assembled, parameters verified.
    fn did_load(&self) {}

    /// The page was checked out of the pool for a request.
    fn did_attach(&self) {}

    /// The page was returned to the pool.
    fn did_detach(&self) {}
}

/// One page instance: root element, element registry in load order, and
/// lifecycle listeners.
pub struct Page {
    shared: Rc<PageShared>,
    root: Option<ElementRc>,
    elements: Vec<ElementRc>,
    listeners: Vec<Box<dyn PageLifecycleListener>>,
    loaded: bool,
}

impl Page {
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            shared: PageShared::new(name, locale),
            root: None,
            elements: Vec::new(),
            listeners: Vec::new(),
            loaded: false,
        }
    }

    pub fn shared(&self) -> &Rc<PageShared> {
        &self.shared
    }

    pub fn name(&self) -> &str {
        self.shared.name()
    }

    pub fn locale(&self) -> &str {
        self.shared.locale()
    }

    /// Non-zero while any element of this page is mid-render.
    pub fn dirty_count(&self) -> u32 {
        self.shared.dirty_count()
    }

    pub fn set_root(&mut self, root: ElementRc) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<&ElementRc> {
        self.root.as_ref()
    }

    /// Record an element in load order; `loaded` walks this registry.
    pub fn register_element(&mut self, element: ElementRc) {
        self.elements.push(element);
    }

    pub fn add_lifecycle_listener(&mut self, listener: Box<dyn PageLifecycleListener>) {
        self.listeners.push(listener);
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Finish loading: notify every element (which orders mixins, runs the
    /// component lifecycle, and verifies required parameters), then the
    /// registered listeners.
    pub fn loaded(&mut self) -> Result<(), PageError> {
        for element in &self.elements {
            element.borrow_mut().containing_page_did_load()?;
        }
        for listener in &self.listeners {
            listener.did_load();
        }
        self.loaded = true;
        tracing::debug!(page = %self.name(), elements = self.elements.len(), "page loaded");
        Ok(())
    }

    /// Pool checkout notification.
    pub fn attached(&self) {
        for listener in &self.listeners {
            listener.did_attach();
        }
    }

    /// Pool release notification.
    pub fn detached(&self) {
        for listener in &self.listeners {
            listener.did_detach();
        }
    }
}

//! Parameter bindings
//!
//! A binding connects a formal or informal parameter name to a value
//! producer. Literal bindings come from template attributes; computed
//! bindings wrap a closure and re-read on every access.

use std::fmt;
use std::rc::Rc;

use crate::value::Value;

pub type BindingRc = Rc<dyn Binding>;

pub trait Binding {
    /// Current value of the binding.
    fn get(&self) -> Value;

    /// Invariant bindings never change between reads; callers may cache.
    fn is_invariant(&self) -> bool {
        true
    }
}

/// Fixed-value binding.
#[derive(Debug, Clone)]
pub struct LiteralBinding {
    value: Value,
}

impl LiteralBinding {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Binding for LiteralBinding {
    fn get(&self) -> Value {
        self.value.clone()
    }
}

/// Closure-backed binding, re-evaluated on every read.
pub struct ComputedBinding {
    read: Box<dyn Fn() -> Value>,
}

impl ComputedBinding {
    pub fn new(read: impl Fn() -> Value + 'static) -> Self {
        Self {
            read: Box::new(read),
        }
    }
}

impl Binding for ComputedBinding {
    fn get(&self) -> Value {
        (self.read)()
    }

    fn is_invariant(&self) -> bool {
        false
    }
}

impl fmt::Debug for ComputedBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComputedBinding")
    }
}

//! Parameter and event values

use std::fmt;
use std::rc::Rc;

use weft_render::CommandRc;

/// A dynamically typed value flowing through bindings, event contexts, and
/// handler results.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A renderable block or command, used for block-valued parameters.
    Renderable(CommandRc),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Renderable(_) => "renderable",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_renderable(&self) -> Option<&CommandRc> {
        match self {
            Value::Renderable(command) => Some(command),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Renderable(command) => write!(f, "Renderable({})", command.label()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Renderable(a), Value::Renderable(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Classify a dynamic value as a render-phase result: booleans steer the
/// phase chain, renderables queue as follow-up work, anything else is a
/// contract violation surfaced by `PhaseEvent::store`.
impl From<Value> for weft_render::PhaseResult {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(flag) => weft_render::PhaseResult::Continue(flag),
            Value::Renderable(command) => weft_render::PhaseResult::Command(command),
            other => weft_render::PhaseResult::Other(format!("{other:?}")),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

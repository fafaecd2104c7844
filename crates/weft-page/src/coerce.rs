//! Type coercion
//!
//! Narrow collaborator contract for converting between client strings and
//! typed parameter values. Expansions use it to stringify whatever a
//! property read produces.

use std::fmt;

use crate::value::Value;

/// Target of a coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    String,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("cannot coerce {from} to {to}")]
pub struct CoerceError {
    pub from: String,
    pub to: ValueKind,
}

pub trait TypeCoercer {
    fn coerce(&self, value: &Value, target: ValueKind) -> Result<Value, CoerceError>;
}

/// Built-in conversions between the primitive value kinds.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCoercer;

impl TypeCoercer for DefaultCoercer {
    fn coerce(&self, value: &Value, target: ValueKind) -> Result<Value, CoerceError> {
        let fail = || CoerceError {
            from: format!("{value:?}"),
            to: target,
        };
        match target {
            ValueKind::String => match value {
                Value::Null => Ok(Value::String(String::new())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                Value::Int(i) => Ok(Value::String(i.to_string())),
                Value::Float(x) => Ok(Value::String(x.to_string())),
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::Renderable(_) => Err(fail()),
            },
            ValueKind::Bool => match value {
                Value::Null => Ok(Value::Bool(false)),
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::Int(i) => Ok(Value::Bool(*i != 0)),
                Value::String(s) if s.trim().eq_ignore_ascii_case("true") => {
                    Ok(Value::Bool(true))
                }
                Value::String(s) if s.trim().eq_ignore_ascii_case("false") => {
                    Ok(Value::Bool(false))
                }
                _ => Err(fail()),
            },
            ValueKind::Int => match value {
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Float(x) => Ok(Value::Int(*x as i64)),
                Value::String(s) => {
                    s.trim().parse().map(Value::Int).map_err(|_| fail())
                }
                _ => Err(fail()),
            },
            ValueKind::Float => match value {
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Float(x) => Ok(Value::Float(*x)),
                Value::String(s) => {
                    s.trim().parse().map(Value::Float).map_err(|_| fail())
                }
                _ => Err(fail()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stringify() {
        let coercer = DefaultCoercer;
        assert_eq!(
            coercer.coerce(&Value::Int(42), ValueKind::String).unwrap(),
            Value::String("42".to_string())
        );
        assert_eq!(
            coercer.coerce(&Value::Null, ValueKind::String).unwrap(),
            Value::String(String::new())
        );
    }

    #[test]
    fn test_string_to_bool() {
        let coercer = DefaultCoercer;
        assert_eq!(
            coercer
                .coerce(&Value::String(" TRUE ".to_string()), ValueKind::Bool)
                .unwrap(),
            Value::Bool(true)
        );
        assert!(coercer
            .coerce(&Value::String("yes".to_string()), ValueKind::Bool)
            .is_err());
    }

    #[test]
    fn test_string_to_int() {
        let coercer = DefaultCoercer;
        assert_eq!(
            coercer
                .coerce(&Value::String("17".to_string()), ValueKind::Int)
                .unwrap(),
            Value::Int(17)
        );
        assert!(coercer
            .coerce(&Value::String("seventeen".to_string()), ValueKind::Int)
            .is_err());
    }
}

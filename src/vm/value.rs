use std::fmt;

use super::heap::GcRef;

/// A tagged runtime value.
///
/// Values are copied by value on the operand stack. `Obj` holds a handle
/// into the owning [`Heap`](super::heap::Heap); the stack never owns the
/// referenced object — reachability from the GC roots determines lifetime.
#[derive(Clone, Copy)]
pub enum Value {
    Bool(bool),
    Nil,
    Number(f64),
    Obj(GcRef),
}

impl Value {
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    pub fn is_obj(&self) -> bool {
        matches!(self, Value::Obj(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_obj(&self) -> Option<GcRef> {
        match self {
            Value::Obj(r) => Some(*r),
            _ => None,
        }
    }

    /// Get the type name of this value, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Nil => "nil",
            Value::Number(_) => "number",
            Value::Obj(_) => "object",
        }
    }

    /// Structural equality: numbers by IEEE value, bools by value, nil
    /// equals nil, objects by handle identity. Identity comparison is
    /// correct for strings only because they are interned.
    pub fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => a.index == b.index,
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        Value::eq(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Nil => write!(f, "Nil"),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::Obj(r) => write!(f, "Obj({})", r.index),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::Number(n) => write!(f, "{}", n),
            Value::Obj(_) => write!(f, "<object>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_as_number() {
        assert_eq!(Value::Number(42.0).as_number(), Some(42.0));
        assert_eq!(Value::Bool(true).as_number(), None);
        assert_eq!(Value::Nil.as_number(), None);
    }

    #[test]
    fn test_bool_as_bool() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Number(1.0).as_bool(), None);
    }

    #[test]
    fn test_predicates() {
        assert!(Value::Nil.is_nil());
        assert!(Value::Number(0.0).is_number());
        assert!(Value::Bool(false).is_bool());
        assert!(Value::Obj(GcRef { index: 3 }).is_obj());
        assert!(!Value::Nil.is_number());
    }

    #[test]
    fn test_equality() {
        assert!(Value::Number(42.0).eq(&Value::Number(42.0)));
        assert!(Value::Nil.eq(&Value::Nil));
        assert!(Value::Bool(true).eq(&Value::Bool(true)));
        assert!(!Value::Bool(true).eq(&Value::Number(1.0)));
        assert!(!Value::Nil.eq(&Value::Bool(false)));
    }

    #[test]
    fn test_obj_identity_equality() {
        let a = Value::Obj(GcRef { index: 1 });
        let b = Value::Obj(GcRef { index: 1 });
        let c = Value::Obj(GcRef { index: 2 });
        assert!(a.eq(&b));
        assert!(!a.eq(&c));
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Value::Number(1.0).type_name(), "number");
        assert_eq!(Value::Bool(true).type_name(), "bool");
        assert_eq!(Value::Nil.type_name(), "nil");
    }
}

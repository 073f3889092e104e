use std::cell::RefCell;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ds::error::ClaspError;
use crate::guard::CallScope;

/// Signature of a member method. The [`CallScope`] gives the method an
/// internal-context view of its instance, carrying the capability token of
/// the definition level that declared it.
pub type MethodFn = Rc<dyn Fn(&mut CallScope, &[Value]) -> Result<Value, ClaspError>>;

/// A dynamic member value.
///
/// `clone()` is shallow: `List` and `Map` share their backing cell, so a
/// value read out of an instance aliases the instance's storage. Use
/// [`Value::deep_clone`] to detach nested state (done automatically when a
/// definition is instantiated).
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<IndexMap<String, Value>>>),
    Method(MethodFn),
}

impl Value {
    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::List(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    pub fn map<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(Rc::new(RefCell::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    pub fn empty_list() -> Value {
        Value::List(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn empty_map() -> Value {
        Value::Map(Rc::new(RefCell::new(IndexMap::new())))
    }

    pub fn method<F>(f: F) -> Value
    where
        F: Fn(&mut CallScope, &[Value]) -> Result<Value, ClaspError> + 'static,
    {
        Value::Method(Rc::new(f))
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Rc<RefCell<Vec<Value>>>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Rc<RefCell<IndexMap<String, Value>>>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Rebuilds nested lists and maps so the result shares no mutable state
    /// with `self`. Methods stay shared: they are immutable behavior.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::List(l) => Value::List(Rc::new(RefCell::new(
                l.borrow().iter().map(|v| v.deep_clone()).collect(),
            ))),
            Value::Map(m) => Value::Map(Rc::new(RefCell::new(
                m.borrow()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.deep_clone()))
                    .collect(),
            ))),
            other => other.clone(),
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(i) => Value::Int(*i),
            Value::Float(n) => Value::Float(*n),
            Value::Str(s) => Value::Str(s.to_string()),
            Value::List(l) => Value::List(l.clone()),
            Value::Map(m) => Value::Map(m.clone()),
            Value::Method(f) => Value::Method(f.clone()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::List(l) => write!(f, "list({})", l.borrow().len()),
            Value::Map(m) => write!(f, "map({})", m.borrow().len()),
            Value::Method(_) => write!(f, "method"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Value::Null"),
            Value::Bool(b) => write!(f, "Value::Bool({})", b),
            Value::Int(i) => write!(f, "Value::Int({})", i),
            Value::Float(n) => write!(f, "Value::Float({})", n),
            Value::Str(s) => write!(f, "Value::Str({:?})", s),
            Value::List(l) => write!(f, "Value::List(len={})", l.borrow().len()),
            Value::Map(m) => write!(f, "Value::Map(len={})", m.borrow().len()),
            Value::Method(_) => write!(f, "Value::Method(...)"),
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
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

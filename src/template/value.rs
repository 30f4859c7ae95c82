//! Values carried by a template binding context.
//!
//! Bindings map names to [`Value`]s: scalars, dates, ordered sequences and
//! nested maps. Contexts are plain `BTreeMap`s and are **copied** when a
//! `[[for]]` body runs, so loop-variable shadowing never leaks between
//! iterations or into the parent scope.

use crate::date::EntryDate;
use std::collections::BTreeMap;
use std::fmt;

/// Ordered name → value mapping used for template evaluation.
pub type Bindings = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    Date(EntryDate),
    List(Vec<Value>),
    Map(Bindings),
}

impl Value {
    /// Truthiness for `[[if]]`: empty strings, zero, `false`, and empty
    /// sequences/maps are false; dates are always true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Int(n) => *n != 0,
            Value::Bool(b) => *b,
            Value::Date(_) => true,
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Map(map) => {
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                Ok(())
            }
        }
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

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<EntryDate> for Value {
    fn from(d: EntryDate) -> Self {
        Value::Date(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Bindings> for Value {
    fn from(map: Bindings) -> Self {
        Value::Map(map)
    }
}

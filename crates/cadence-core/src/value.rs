//! The tagged value variant stored in [`Params`] nodes.
//!
//! Every value a configuration tree can hold is one of a closed set of
//! variants, so serialization, equality, and copy logic pattern-match
//! instead of relying on open-ended dynamic typing.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::hyperparams::Params;

/// Trait for opaque, non-serializable payloads stored in a tree (for
/// example a shared tensor handle). Copies of the tree share the payload
/// by reference; equality is pointer identity.
pub trait OpaqueValue: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T> OpaqueValue for T
where
    T: Any + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A protocol-buffer-like message payload: one tagged field of one
/// message type, rendered textually as
/// `proto/<module>/<message>/<field>: <value>`.
#[derive(Clone, Debug, PartialEq)]
pub struct ProtoValue {
    pub module: String,
    pub message: String,
    pub field: String,
    pub value: Box<Value>,
}

impl ProtoValue {
    pub fn new(
        module: impl Into<String>,
        message: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            module: module.into(),
            message: message.into(),
            field: field.into(),
            value: Box::new(value.into()),
        }
    }
}

/// A dynamically typed value stored in [`Params`].
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    Params(Box<Params>),
    /// A reference to a class/type, rendered as `type/<module>/<name>`.
    TypeRef { module: String, name: String },
    Proto(ProtoValue),
    Opaque(Arc<dyn OpaqueValue>),
}

impl Value {
    /// Wraps an external, non-serializable value.
    pub fn opaque<T>(value: T) -> Self
    where
        T: OpaqueValue,
    {
        Value::Opaque(Arc::new(value))
    }

    /// Creates a class/type reference value.
    pub fn type_ref(module: impl Into<String>, name: impl Into<String>) -> Self {
        Value::TypeRef {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Returns the nested params node, if this value holds one.
    pub fn as_params(&self) -> Option<&Params> {
        match self {
            Value::Params(p) => Some(p.as_ref()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Params(a), Value::Params(b)) => a == b,
            (
                Value::TypeRef { module: m1, name: n1 },
                Value::TypeRef { module: m2, name: n2 },
            ) => m1 == m2 && n1 == n2,
            (Value::Proto(a), Value::Proto(b)) => a == b,
            // Opaque values compare by identity, not by content.
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::text::render_inline(self))
    }
}

macro_rules! impl_from {
    ($t:ty, $variant:ident) => {
        impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::$variant(value)
            }
        }
    };
}

impl_from!(bool, Bool);
impl_from!(i64, Int);
impl_from!(f64, Float);
impl_from!(String, String);

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Int(value as i64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Params> for Value {
    fn from(value: Params) -> Self {
        Value::Params(Box::new(value))
    }
}

impl From<ProtoValue> for Value {
    fn from(value: ProtoValue) -> Self {
        Value::Proto(value)
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(|v| v.into()).collect())
    }
}

impl<T> From<BTreeMap<String, T>> for Value
where
    T: Into<Value>,
{
    fn from(value: BTreeMap<String, T>) -> Self {
        Value::Dict(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Lazy sequences are materialized into a concrete ordered list at
/// construction time; there is no lazy value variant to preserve.
impl<T> FromIterator<T> for Value
where
    T: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::List(iter.into_iter().map(|v| v.into()).collect())
    }
}

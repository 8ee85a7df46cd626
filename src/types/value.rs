//! Property values of managed objects.
//!
//! Managed objects carry their state as a map of named [`Value`]s. Nested
//! structures are typed [`DataObject`]s, so that property paths such as
//! `runtime.powerState` or `config.hardware.device[4000]` resolve against
//! plain data instead of run-time introspection.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::ManagedObjectReference;

/// Field every keyed array element carries
pub(crate) const KEY_FIELD: &str = "key";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Ref(ManagedObjectReference),
    Array(Vec<Value>),
    Data(DataObject),
}

/// A typed data object (a "struct" value of the protocol).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataObject {
    #[serde(rename = "_typeName", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Value {
    /// Unset values are not reported by property collection.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::String(s) if s.is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ManagedObjectReference> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataObject> {
        match self {
            Value::Data(d) => Some(d),
            _ => None,
        }
    }

    /// Object references held by a reference or reference-array value.
    pub fn references(&self) -> Vec<ManagedObjectReference> {
        match self {
            Value::Ref(r) => vec![r.clone()],
            Value::Array(items) => items.iter().filter_map(|v| v.as_reference().cloned()).collect(),
            _ => Vec::new(),
        }
    }

    /// The `key` field of a keyed array element.
    pub(crate) fn element_key(&self) -> Option<&Value> {
        self.as_data().and_then(|d| d.fields.get(KEY_FIELD))
    }
}

impl DataObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.fields.insert(name.into(), value.into());
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<ManagedObjectReference> for Value {
    fn from(v: ManagedObjectReference) -> Self {
        Value::Ref(v)
    }
}

impl From<Vec<ManagedObjectReference>> for Value {
    fn from(v: Vec<ManagedObjectReference>) -> Self {
        Value::Array(v.into_iter().map(Value::Ref).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<DataObject> for Value {
    fn from(v: DataObject) -> Self {
        Value::Data(v)
    }
}

//! Request and response shapes of the property-collection protocol.
//!
//! Field names serialize exactly as the emulated protocol spells them.

use serde::Deserialize;
use serde::Serialize;

use crate::Fault;
use crate::ManagedObjectReference;
use crate::Value;

/// Which properties to collect for objects of one type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<bool>,
    #[serde(default)]
    pub path_set: Vec<String>,
}

/// A graph-walk step: either a full traversal or a reference to a named one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectionSpec {
    Traversal(TraversalSpec),
    Named { name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<bool>,
    #[serde(default)]
    pub select_set: Vec<SelectionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSpec {
    pub obj: ManagedObjectReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<bool>,
    #[serde(default)]
    pub select_set: Vec<SelectionSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFilterSpec {
    pub prop_set: Vec<PropertySpec>,
    pub object_set: Vec<ObjectSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_missing_objects_in_results: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_objects: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub objects: Vec<ObjectContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicProperty {
    pub name: String,
    pub val: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingProperty {
    pub path: String,
    pub fault: Fault,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectContent {
    pub obj: ManagedObjectReference,
    #[serde(default)]
    pub prop_set: Vec<DynamicProperty>,
    #[serde(default)]
    pub missing_set: Vec<MissingProperty>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyChangeOp {
    Add,
    Remove,
    Assign,
    IndirectRemove,
}

/// One explicit property mutation. `val = None` with `Assign` unsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub name: String,
    pub op: PropertyChangeOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectUpdateKind {
    Modify,
    Enter,
    Leave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectUpdate {
    pub kind: ObjectUpdateKind,
    pub obj: ManagedObjectReference,
    #[serde(default)]
    pub change_set: Vec<PropertyChange>,
    #[serde(default)]
    pub missing_set: Vec<MissingProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFilterUpdate {
    pub filter: ManagedObjectReference,
    #[serde(default)]
    pub object_set: Vec<ObjectUpdate>,
    #[serde(default)]
    pub missing_set: Vec<MissingObject>,
}

/// Root object of a live filter that could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingObject {
    pub obj: ManagedObjectReference,
    pub fault: Fault,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSet {
    pub version: String,
    #[serde(default)]
    pub filter_set: Vec<PropertyFilterUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_object_updates: Option<i32>,
}

impl PropertySpec {
    pub fn new(
        kind: impl Into<String>,
        paths: &[&str],
    ) -> Self {
        Self {
            kind: kind.into(),
            all: None,
            path_set: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn all(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            all: Some(true),
            path_set: Vec::new(),
        }
    }

    pub(crate) fn is_all(&self) -> bool {
        self.all.unwrap_or(false)
    }
}

impl TraversalSpec {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            kind: kind.into(),
            path: path.into(),
            skip: Some(false),
            select_set: Vec::new(),
        }
    }

    pub fn select(
        mut self,
        step: SelectionSpec,
    ) -> Self {
        self.select_set.push(step);
        self
    }
}

impl SelectionSpec {
    pub fn named(name: impl Into<String>) -> Self {
        SelectionSpec::Named { name: name.into() }
    }
}

impl From<TraversalSpec> for SelectionSpec {
    fn from(spec: TraversalSpec) -> Self {
        SelectionSpec::Traversal(spec)
    }
}

impl ObjectSpec {
    pub fn new(obj: ManagedObjectReference) -> Self {
        Self {
            obj,
            skip: None,
            select_set: Vec::new(),
        }
    }

    pub fn skip(mut self) -> Self {
        self.skip = Some(true);
        self
    }

    pub fn select(
        mut self,
        step: impl Into<SelectionSpec>,
    ) -> Self {
        self.select_set.push(step.into());
        self
    }
}

impl PropertyChange {
    pub fn assign(
        name: impl Into<String>,
        val: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            op: PropertyChangeOp::Assign,
            val: Some(val.into()),
        }
    }

    pub fn unset(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: PropertyChangeOp::Assign,
            val: None,
        }
    }

    pub fn add(
        name: impl Into<String>,
        val: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            op: PropertyChangeOp::Add,
            val: Some(val.into()),
        }
    }

    pub fn remove(
        name: impl Into<String>,
        val: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            op: PropertyChangeOp::Remove,
            val: Some(val.into()),
        }
    }
}

impl ObjectContent {
    /// Value of `name` in the returned property set.
    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.prop_set.iter().find(|p| p.name == name).map(|p| &p.val)
    }
}

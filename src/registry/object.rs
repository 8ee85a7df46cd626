use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::RwLock;

use crate::constants::NAME_PROPERTY;
use crate::constants::PARENT_PROPERTY;
use crate::DataObject;
use crate::Fault;
use crate::FaultResult;
use crate::Field;
use crate::ManagedObjectReference;
use crate::PropertyChange;
use crate::PropertyChangeOp;
use crate::Value;

/// Shared handle to a stored object.
pub type ObjectHandle = Arc<RwLock<ManagedObject>>;

/// Lock guarding mutations of one object.
pub type ObjectLock = Arc<Mutex<()>>;

/// A simulated server-side entity: reference plus named properties.
///
/// An object may carry its own mutation lock; otherwise the registry keeps
/// one per reference.
#[derive(Debug, Clone)]
pub struct ManagedObject {
    reference: ManagedObjectReference,
    properties: BTreeMap<String, Value>,
    lock: Option<ObjectLock>,
}

impl ManagedObject {
    /// A new object of `kind` whose reference is allocated on insertion.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            reference: ManagedObjectReference::new(kind, ""),
            properties: BTreeMap::new(),
            lock: None,
        }
    }

    pub fn with_reference(reference: ManagedObjectReference) -> Self {
        Self {
            reference,
            properties: BTreeMap::new(),
            lock: None,
        }
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Gives the object a lock of its own instead of a registry table entry.
    pub fn with_own_lock(mut self) -> Self {
        self.lock = Some(ObjectLock::default());
        self
    }

    pub fn reference(&self) -> &ManagedObjectReference {
        &self.reference
    }

    pub fn kind(&self) -> &str {
        &self.reference.kind
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Direct write used while building an object, before it is shared.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.get(NAME_PROPERTY).and_then(Value::as_str)
    }

    pub fn parent(&self) -> Option<&ManagedObjectReference> {
        self.get(PARENT_PROPERTY).and_then(Value::as_reference)
    }

    /// References held by property `name` (single or array valued).
    pub fn references(
        &self,
        name: &str,
    ) -> Vec<ManagedObjectReference> {
        self.get(name).map(Value::references).unwrap_or_default()
    }

    pub(crate) fn own_lock(&self) -> Option<&ObjectLock> {
        self.lock.as_ref()
    }

    pub(crate) fn set_reference(
        &mut self,
        reference: ManagedObjectReference,
    ) {
        self.reference = reference;
    }

    /// Applies one explicit change to the property map.
    pub(crate) fn apply(
        &mut self,
        change: &PropertyChange,
    ) -> FaultResult<()> {
        let invalid = || Fault::invalid_property(change.name.clone());
        let field = Field::parse(&change.name).ok_or_else(invalid)?;

        let applied = match change.op {
            PropertyChangeOp::Assign => assign(&mut self.properties, &field, change.val.clone()),
            PropertyChangeOp::Add => {
                let val = change.val.clone().ok_or_else(invalid)?;
                match field.key {
                    None => add(&mut self.properties, &field.path, val),
                    Some(_) => None,
                }
            }
            PropertyChangeOp::Remove | PropertyChangeOp::IndirectRemove => {
                remove(&mut self.properties, &field, change.val.as_ref())
            }
        };
        applied.ok_or_else(invalid)
    }
}

/// Walks the dotted `parents` down through data objects.
fn container_mut<'a>(
    props: &'a mut BTreeMap<String, Value>,
    parents: &[&str],
    create: bool,
) -> Option<&'a mut BTreeMap<String, Value>> {
    let mut map = props;
    for seg in parents {
        if create && !map.contains_key(*seg) {
            map.insert(seg.to_string(), Value::Data(DataObject::default()));
        }
        map = match map.get_mut(*seg)? {
            Value::Data(d) => &mut d.fields,
            _ => return None,
        };
    }
    Some(map)
}

fn split_path(path: &str) -> (Vec<&str>, &str) {
    let mut segs: Vec<&str> = path.split('.').collect();
    let last = segs.pop().unwrap_or(path);
    (segs, last)
}

fn set_path(
    props: &mut BTreeMap<String, Value>,
    path: &str,
    val: Option<Value>,
) -> Option<()> {
    let (parents, last) = split_path(path);
    match val {
        Some(v) => {
            container_mut(props, &parents, true)?.insert(last.to_string(), v);
        }
        None => {
            // unsetting below an absent parent is a no-op
            if let Some(map) = container_mut(props, &parents, false) {
                map.remove(last);
            }
        }
    }
    Some(())
}

fn array_mut<'a>(
    props: &'a mut BTreeMap<String, Value>,
    path: &str,
    create: bool,
) -> Option<&'a mut Vec<Value>> {
    let (parents, last) = split_path(path);
    let map = container_mut(props, &parents, create)?;
    if create && !map.contains_key(last) {
        map.insert(last.to_string(), Value::Array(Vec::new()));
    }
    match map.get_mut(last)? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

fn assign(
    props: &mut BTreeMap<String, Value>,
    field: &Field,
    val: Option<Value>,
) -> Option<()> {
    let Some(key) = &field.key else {
        return set_path(props, &field.path, val);
    };

    let create = val.is_some();
    let Some(items) = array_mut(props, &field.path, create) else {
        return (!create).then_some(());
    };
    let pos = items.iter().position(|e| key.selects(e));

    match (&field.item, pos, val) {
        (None, Some(i), Some(v)) => items[i] = v,
        (None, None, Some(v)) => items.push(v),
        (None, Some(i), None) => {
            items.remove(i);
        }
        (None, None, None) => {}
        (Some(item), Some(i), val) => match &mut items[i] {
            Value::Data(d) => set_path(&mut d.fields, item, val)?,
            _ => return None,
        },
        (Some(_), None, _) => return None,
    }
    Some(())
}

fn add(
    props: &mut BTreeMap<String, Value>,
    path: &str,
    val: Value,
) -> Option<()> {
    array_mut(props, path, true)?.push(val);
    Some(())
}

fn remove(
    props: &mut BTreeMap<String, Value>,
    field: &Field,
    val: Option<&Value>,
) -> Option<()> {
    let Some(items) = array_mut(props, &field.path, false) else {
        return Some(());
    };
    match (&field.key, val) {
        (Some(key), _) => items.retain(|e| !key.selects(e)),
        (None, Some(v)) => items.retain(|e| e != v),
        (None, None) => return None,
    }
    Some(())
}

use parking_lot::Mutex;

use crate::Context;
use crate::ManagedObject;
use crate::ManagedObjectReference;
use crate::ObjectUpdateKind;
use crate::PropertyChange;
use crate::RegistryObserver;

/// A registry mutation recorded for the next poll.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueuedUpdate {
    pub kind: ObjectUpdateKind,
    pub obj: ManagedObjectReference,
    pub changes: Vec<PropertyChange>,
}

/// Records every put, update and remove of the registry it observes.
#[derive(Debug, Default)]
pub(crate) struct UpdateQueue {
    updates: Mutex<Vec<QueuedUpdate>>,
}

impl UpdateQueue {
    fn push(
        &self,
        kind: ObjectUpdateKind,
        obj: &ManagedObject,
        changes: &[PropertyChange],
    ) {
        self.updates.lock().push(QueuedUpdate {
            kind,
            obj: obj.reference().clone(),
            changes: changes.to_vec(),
        });
    }

    pub(crate) fn drain(&self) -> Vec<QueuedUpdate> {
        std::mem::take(&mut *self.updates.lock())
    }

    pub(crate) fn len(&self) -> usize {
        self.updates.lock().len()
    }
}

impl RegistryObserver for UpdateQueue {
    fn put_object(
        &self,
        _ctx: &Context,
        obj: &ManagedObject,
    ) {
        self.push(ObjectUpdateKind::Enter, obj, &[]);
    }

    fn update_object(
        &self,
        _ctx: &Context,
        obj: &ManagedObject,
        changes: &[PropertyChange],
    ) {
        self.push(ObjectUpdateKind::Modify, obj, changes);
    }

    fn remove_object(
        &self,
        _ctx: &Context,
        obj: &ManagedObject,
    ) {
        self.push(ObjectUpdateKind::Leave, obj, &[]);
    }
}

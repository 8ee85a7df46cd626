use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::ManagedObject;
use super::ObjectHandle;
use super::ObjectLock;
use super::ObserverId;
use super::RegistryObserver;
use crate::metrics::LIVE_OBJECTS;
use crate::metrics::REGISTRY_NOTIFICATIONS;
use crate::Context;
use crate::FaultResult;
use crate::ManagedObjectReference;
use crate::PropertyChange;
use crate::Schema;

#[derive(Clone)]
struct ObserverEntry {
    id: ObserverId,
    observer: Arc<dyn RegistryObserver>,
}

/// Keyed store of managed objects for one namespace.
///
/// Two lock layers:
/// - `objects` is the coarse structural lock (insert, remove, lookup).
/// - per-object mutation locks, either owned by the object or kept in
///   `locks`, created on first use and dropped once the reference is no
///   longer stored. Observer chains run while the mutated object's lock is
///   held.
///
/// The structural lock is never acquired while an object's `RwLock` is held.
pub struct Registry {
    namespace: String,
    schema: Arc<Schema>,
    objects: RwLock<HashMap<ManagedObjectReference, ObjectHandle>>,
    observers: ArcSwap<Vec<ObserverEntry>>,
    locks: DashMap<ManagedObjectReference, ObjectLock>,
    counter: AtomicU64,
    next_observer: AtomicU64,
}

impl std::fmt::Debug for Registry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("namespace", &self.namespace)
            .field("objects", &self.len())
            .field("observers", &self.observers.load().len())
            .finish()
    }
}

impl Registry {
    pub fn new(
        namespace: impl Into<String>,
        schema: Arc<Schema>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            schema,
            objects: RwLock::new(HashMap::new()),
            observers: ArcSwap::from_pointee(Vec::new()),
            locks: DashMap::new(),
            counter: AtomicU64::new(0),
            next_observer: AtomicU64::new(0),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Allocates the next `<prefix>-<n>` reference for `kind`.
    pub fn new_reference(
        &self,
        kind: &str,
    ) -> ManagedObjectReference {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        ManagedObjectReference::new(kind, format!("{}-{}", value_prefix(kind), n))
    }

    /// Stores `obj`, allocating its reference if unset, and runs every
    /// observer's insertion hook. Re-putting a reference overwrites in place.
    pub fn put(
        &self,
        ctx: &Context,
        mut obj: ManagedObject,
    ) -> ManagedObjectReference {
        if obj.reference().is_unallocated() {
            obj.set_reference(self.new_reference(obj.kind()));
        }
        let reference = obj.reference().clone();
        let own = obj.own_lock().cloned();

        self.locked(ctx, &reference, own, || {
            let snapshot = obj.clone();
            let inserted = {
                let mut objects = self.objects.write();
                match objects.get(&reference) {
                    Some(handle) => {
                        *handle.write() = obj;
                        false
                    }
                    None => {
                        objects.insert(reference.clone(), Arc::new(RwLock::new(obj)));
                        true
                    }
                }
            };
            if inserted {
                LIVE_OBJECTS.with_label_values(&[self.namespace.as_str()]).inc();
            }
            debug!(namespace = %self.namespace, obj = %reference, inserted, "put");

            self.notify("put", |o| o.put_object(ctx, &snapshot));
        });

        reference
    }

    /// Absence is a normal outcome: the object may have been removed
    /// concurrently.
    pub fn get(
        &self,
        reference: &ManagedObjectReference,
    ) -> Option<ObjectHandle> {
        self.objects.read().get(reference).cloned()
    }

    /// Copy of the object's current state.
    pub fn snapshot(
        &self,
        reference: &ManagedObjectReference,
    ) -> Option<ManagedObject> {
        self.get(reference).map(|handle| handle.read().clone())
    }

    pub fn contains(
        &self,
        reference: &ManagedObjectReference,
    ) -> bool {
        self.objects.read().contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies exactly `changes` under the object's lock and notifies
    /// observers with the same list. Updating an absent object is a no-op.
    ///
    /// The list applies as a whole: when any change is rejected the object
    /// is left untouched, no observer runs and the fault is returned.
    pub fn update(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
        changes: &[PropertyChange],
    ) -> FaultResult<()> {
        if !self.contains(reference) {
            trace!(obj = %reference, "update of absent object ignored");
            return Ok(());
        }
        self.locked(ctx, reference, None, || {
            // removed while we waited for the lock
            let Some(handle) = self.get(reference) else {
                trace!(obj = %reference, "object removed before update");
                return Ok(());
            };
            let mut next = handle.read().clone();
            for change in changes {
                if let Err(e) = next.apply(change) {
                    warn!(obj = %reference, change = %change.name, "update rejected: {}", e);
                    return Err(e);
                }
            }
            *handle.write() = next.clone();
            trace!(obj = %reference, changes = changes.len(), "update");

            self.notify("update", |o| o.update_object(ctx, &next, changes));
            Ok(())
        })
    }

    /// Lock-then-update in one call, for callers that do not already hold
    /// the object's lock.
    pub fn atomic_update(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
        changes: &[PropertyChange],
    ) -> FaultResult<()> {
        self.with_lock(ctx, reference, || self.update(ctx, reference, changes))
    }

    /// Notifies removal hooks while the object is still resolvable, then
    /// deletes it. Its lock-table entry goes before the lock is released.
    pub fn remove(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
    ) {
        if !self.contains(reference) {
            trace!(obj = %reference, "remove of absent object ignored");
            return;
        }
        self.locked(ctx, reference, None, || {
            let Some(handle) = self.get(reference) else {
                return;
            };
            let snapshot = handle.read().clone();
            self.notify("remove", |o| o.remove_object(ctx, &snapshot));

            if self.objects.write().remove(reference).is_some() {
                LIVE_OBJECTS.with_label_values(&[self.namespace.as_str()]).dec();
            }
            debug!(namespace = %self.namespace, obj = %reference, "remove");
        });
    }

    pub fn add_observer(
        &self,
        observer: Arc<dyn RegistryObserver>,
    ) -> ObserverId {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed) + 1);
        let entry = ObserverEntry { id, observer };
        self.observers.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(entry.clone());
            next
        });
        debug!(namespace = %self.namespace, %id, "observer registered");
        id
    }

    /// Returns false when `id` was not registered.
    pub fn remove_observer(
        &self,
        id: ObserverId,
    ) -> bool {
        let previous = self
            .observers
            .rcu(|current| current.iter().filter(|e| e.id != id).cloned().collect::<Vec<_>>());
        let removed = previous.iter().any(|e| e.id == id);
        debug!(namespace = %self.namespace, %id, removed, "observer deregistered");
        removed
    }

    pub fn observer_count(&self) -> usize {
        self.observers.load().len()
    }

    /// Runs `f` holding the object's lock: its own lock if it declares one,
    /// else the registry's per-reference lock. A no-op wrapper when `ctx`
    /// already holds that lock.
    pub fn with_lock<R>(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
        f: impl FnOnce() -> R,
    ) -> R {
        self.locked(ctx, reference, None, f)
    }

    /// `pending` is the own lock of an object about to be put.
    ///
    /// A lock taken after it stopped being the reference's current lock
    /// (object removed or replaced while waiting) is released and the
    /// current one is taken instead. A lock-table entry no stored object
    /// relies on is dropped before the lock is released.
    fn locked<R>(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
        pending: Option<ObjectLock>,
        f: impl FnOnce() -> R,
    ) -> R {
        if ctx.holds(reference) {
            return f();
        }
        loop {
            let lock = self.object_lock_or_insert(reference, pending.as_ref());
            let guard = lock.lock();
            let current = self.object_lock(reference, pending.as_ref());
            if !current.is_some_and(|c| Arc::ptr_eq(&c, &lock)) {
                drop(guard);
                trace!(obj = %reference, "stale object lock, retrying");
                continue;
            }

            let out = {
                let _held = ctx.hold(reference);
                f()
            };
            if !self.uses_lock_table(reference) {
                self.locks.remove_if(reference, |_, l| Arc::ptr_eq(l, &lock));
            }
            drop(guard);
            return out;
        }
    }

    /// The stored object's own lock, or `pending` for an object not yet
    /// stored, else the lock-table entry.
    fn object_lock(
        &self,
        reference: &ManagedObjectReference,
        pending: Option<&ObjectLock>,
    ) -> Option<ObjectLock> {
        let own = match self.get(reference) {
            Some(handle) => handle.read().own_lock().cloned(),
            None => pending.cloned(),
        };
        own.or_else(|| self.locks.get(reference).map(|l| l.value().clone()))
    }

    /// Whether a stored object relies on the lock table.
    fn uses_lock_table(
        &self,
        reference: &ManagedObjectReference,
    ) -> bool {
        self.get(reference)
            .map(|h| h.read().own_lock().is_none())
            .unwrap_or(false)
    }

    fn object_lock_or_insert(
        &self,
        reference: &ManagedObjectReference,
        pending: Option<&ObjectLock>,
    ) -> ObjectLock {
        self.object_lock(reference, pending)
            .unwrap_or_else(|| self.locks.entry(reference.clone()).or_default().clone())
    }

    #[cfg(test)]
    pub(crate) fn lock_table_len(&self) -> usize {
        self.locks.len()
    }

    fn notify(
        &self,
        kind: &str,
        f: impl Fn(&dyn RegistryObserver),
    ) {
        let observers = self.observers.load_full();
        if observers.is_empty() {
            return;
        }
        REGISTRY_NOTIFICATIONS
            .with_label_values(&[self.namespace.as_str(), kind])
            .inc_by(observers.len() as u64);
        for entry in observers.iter() {
            f(entry.observer.as_ref());
        }
    }

    /// References of every object whose kind is exactly `kind`, ordered.
    pub fn all(
        &self,
        kind: &str,
    ) -> Vec<ManagedObjectReference> {
        let mut refs: Vec<_> = self.objects.read().keys().filter(|r| r.kind == kind).cloned().collect();
        refs.sort();
        refs
    }

    /// First object (in reference order) of exactly `kind`.
    pub fn any(
        &self,
        kind: &str,
    ) -> Option<ManagedObjectReference> {
        self.all(kind).into_iter().next()
    }
}

fn value_prefix(kind: &str) -> String {
    let prefix = match kind {
        "Datacenter" => "datacenter",
        "Folder" => "group",
        "StoragePod" => "group-p",
        "HostSystem" => "host",
        "VirtualMachine" => "vm",
        "ResourcePool" => "resgroup",
        "VirtualApp" => "resgroup-v",
        "ComputeResource" => "domain-s",
        "ClusterComputeResource" => "domain-c",
        "Datastore" => "datastore",
        "Network" => "network",
        "OpaqueNetwork" => "network-o",
        "DistributedVirtualSwitch" | "VmwareDistributedVirtualSwitch" => "dvs",
        "DistributedVirtualPortgroup" => "dvportgroup",
        "Task" => "task",
        _ => return kind.to_lowercase(),
    };
    prefix.to_string()
}

//! Entity-tree helpers over the registry.
//!
//! Inventory objects link upward through `parent` and downward through
//! type-specific container properties (`childEntity`, `vmFolder`, `host`, ...).

use std::collections::HashSet;
use std::collections::VecDeque;

use super::ManagedObject;
use super::Registry;
use crate::constants::PARENT_PROPERTY;
use crate::Context;
use crate::FaultResult;
use crate::ManagedObjectReference;
use crate::PropertyChange;

/// Container kinds and the properties holding their children.
const CONTAINER_CHILDREN: &[(&str, &[&str])] = &[
    ("Folder", &["childEntity"]),
    ("Datacenter", &["vmFolder", "hostFolder", "datastoreFolder", "networkFolder"]),
    ("ComputeResource", &["host", "resourcePool"]),
    ("ResourcePool", &["resourcePool", "vm"]),
    ("HostSystem", &["vm"]),
];

impl Registry {
    /// Sets `parent` on `obj`, then [`Registry::put`]s it.
    pub fn put_entity(
        &self,
        ctx: &Context,
        parent: &ManagedObjectReference,
        mut obj: ManagedObject,
    ) -> ManagedObjectReference {
        obj.set(PARENT_PROPERTY, parent.clone());
        self.put(ctx, obj)
    }

    /// Appends `reference` to the array property `field` of `obj` unless
    /// already present.
    pub fn add_reference(
        &self,
        ctx: &Context,
        obj: &ManagedObjectReference,
        field: &str,
        reference: &ManagedObjectReference,
    ) -> FaultResult<()> {
        self.with_lock(ctx, obj, || {
            let Some(current) = self.snapshot(obj) else {
                return Ok(());
            };
            if current.references(field).contains(reference) {
                return Ok(());
            }
            self.update(ctx, obj, &[PropertyChange::add(field, reference.clone())])
        })
    }

    /// Drops `reference` from the array property `field` of `obj`.
    pub fn remove_reference(
        &self,
        ctx: &Context,
        obj: &ManagedObjectReference,
        field: &str,
        reference: &ManagedObjectReference,
    ) -> FaultResult<()> {
        self.with_lock(ctx, obj, || {
            let Some(current) = self.snapshot(obj) else {
                return Ok(());
            };
            if !current.references(field).contains(reference) {
                return Ok(());
            }
            self.update(ctx, obj, &[PropertyChange::remove(field, reference.clone())])
        })
    }

    /// First of `candidates` whose `name` property equals `name`.
    pub fn find_by_name(
        &self,
        name: &str,
        candidates: &[ManagedObjectReference],
    ) -> Option<ManagedObjectReference> {
        candidates
            .iter()
            .find(|r| self.snapshot(r).map(|o| o.name() == Some(name)).unwrap_or(false))
            .cloned()
    }

    /// Nearest ancestor of `reference` (following `parent`) of `kind` or a
    /// subtype of it.
    pub fn entity_parent(
        &self,
        reference: &ManagedObjectReference,
        kind: &str,
    ) -> Option<ManagedObjectReference> {
        let mut seen = HashSet::new();
        let mut current = self.snapshot(reference)?.parent().cloned();

        while let Some(parent) = current {
            if !seen.insert(parent.clone()) {
                return None;
            }
            if self.schema().is_a(&parent.kind, kind) {
                return Some(parent);
            }
            current = self.snapshot(&parent)?.parent().cloned();
        }
        None
    }

    pub fn is_container(
        &self,
        kind: &str,
    ) -> bool {
        CONTAINER_CHILDREN.iter().any(|(container, _)| self.schema().is_a(kind, container))
    }

    /// Whether property `field` of a `kind` object lists entity children.
    pub fn is_child_property(
        &self,
        kind: &str,
        field: &str,
    ) -> bool {
        let schema = self.schema();
        CONTAINER_CHILDREN
            .iter()
            .find(|(container, _)| schema.is_a(kind, container))
            .map(|(_, fields)| fields.contains(&field))
            .unwrap_or(false)
    }

    /// Direct children by the container adjacency of the object's type.
    pub fn entity_children(
        &self,
        reference: &ManagedObjectReference,
    ) -> Vec<ManagedObjectReference> {
        let Some(obj) = self.snapshot(reference) else {
            return Vec::new();
        };
        let schema = self.schema();
        CONTAINER_CHILDREN
            .iter()
            .find(|(container, _)| schema.is_a(obj.kind(), container))
            .map(|(_, fields)| fields.iter().flat_map(|f| obj.references(f)).collect())
            .unwrap_or_default()
    }

    /// Breadth-first walk below `root`, excluding `root` itself. Only direct
    /// children unless `recursive`.
    pub fn walk(
        &self,
        root: &ManagedObjectReference,
        recursive: bool,
    ) -> Vec<ManagedObjectReference> {
        let mut seen = HashSet::from([root.clone()]);
        let mut out = Vec::new();
        let mut queue = VecDeque::from([root.clone()]);

        while let Some(next) = queue.pop_front() {
            for child in self.entity_children(&next) {
                if !seen.insert(child.clone()) {
                    continue;
                }
                if recursive {
                    queue.push_back(child.clone());
                }
                out.push(child);
            }
        }
        out
    }

    pub fn is_descendant(
        &self,
        ancestor: &ManagedObjectReference,
        candidate: &ManagedObjectReference,
    ) -> bool {
        self.walk(ancestor, true).contains(candidate)
    }
}

use tracing::trace;
use tracing::warn;

use crate::constants::VIEW_PROPERTY;
use crate::Context;
use crate::ManagedObject;
use crate::ManagedObjectReference;
use crate::PropertyChange;
use crate::Registry;
use crate::RegistryObserver;

/// Kind every view type derives from
const VIEW_KIND: &str = "View";

/// Entities of the selected types below a container.
///
/// Kept current as a registry observer: entities that appear below the
/// container are appended to `view` and removed entities are dropped.
/// Membership is never re-derived when an entity moves elsewhere.
#[derive(Debug)]
pub struct ContainerView {
    reference: ManagedObjectReference,
    container: ManagedObjectReference,
    types: Vec<String>,
    recursive: bool,
}

impl ContainerView {
    pub(crate) fn new(
        reference: ManagedObjectReference,
        container: ManagedObjectReference,
        types: Vec<String>,
        recursive: bool,
    ) -> Self {
        Self {
            reference,
            container,
            types,
            recursive,
        }
    }

    pub fn reference(&self) -> &ManagedObjectReference {
        &self.reference
    }

    pub fn container(&self) -> &ManagedObjectReference {
        &self.container
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub(crate) fn set_reference(
        &mut self,
        reference: ManagedObjectReference,
    ) {
        self.reference = reference;
    }

    /// An empty type list selects every entity.
    fn includes(
        &self,
        registry: &Registry,
        kind: &str,
    ) -> bool {
        self.types.is_empty() || self.types.iter().any(|t| registry.schema().is_a(kind, t))
    }

    /// Current members in walk order.
    pub(crate) fn members(
        &self,
        registry: &Registry,
    ) -> Vec<ManagedObjectReference> {
        registry
            .walk(&self.container, self.recursive)
            .into_iter()
            .filter(|r| self.includes(registry, &r.kind))
            .collect()
    }

    /// Appends members not yet listed in `view`.
    pub(crate) fn refresh(
        &self,
        ctx: &Context,
    ) {
        let registry = ctx.registry();
        registry.with_lock(ctx, &self.reference, || {
            let Some(current) = registry.snapshot(&self.reference) else {
                return;
            };
            let listed = current.references(VIEW_PROPERTY);
            let added: Vec<PropertyChange> = self
                .members(registry)
                .into_iter()
                .filter(|r| !listed.contains(r))
                .map(|r| PropertyChange::add(VIEW_PROPERTY, r))
                .collect();
            if added.is_empty() {
                return;
            }
            trace!(view = %self.reference, added = added.len(), "container view grew");
            if let Err(e) = registry.update(ctx, &self.reference, &added) {
                warn!(view = %self.reference, "container view not refreshed: {}", e);
            }
        });
    }

    fn is_view(
        registry: &Registry,
        obj: &ManagedObject,
    ) -> bool {
        registry.schema().is_a(obj.kind(), VIEW_KIND)
    }
}

impl RegistryObserver for ContainerView {
    fn put_object(
        &self,
        ctx: &Context,
        obj: &ManagedObject,
    ) {
        let registry = ctx.registry();
        if Self::is_view(registry, obj) || !self.includes(registry, obj.kind()) {
            return;
        }
        self.refresh(ctx);
    }

    /// Entities usually become reachable when a container links them.
    fn update_object(
        &self,
        ctx: &Context,
        obj: &ManagedObject,
        changes: &[PropertyChange],
    ) {
        let registry = ctx.registry();
        if Self::is_view(registry, obj) {
            return;
        }
        if changes
            .iter()
            .any(|c| registry.is_child_property(obj.kind(), &c.name))
        {
            self.refresh(ctx);
        }
    }

    /// Only the view's lock is taken, and only for current members, so
    /// removing one view never locks another.
    fn remove_object(
        &self,
        ctx: &Context,
        obj: &ManagedObject,
    ) {
        let registry = ctx.registry();
        if Self::is_view(registry, obj) {
            return;
        }
        let listed = registry
            .snapshot(&self.reference)
            .map(|view| view.references(VIEW_PROPERTY).contains(obj.reference()))
            .unwrap_or(false);
        if !listed {
            return;
        }
        if let Err(e) = registry.remove_reference(ctx, &self.reference, VIEW_PROPERTY, obj.reference()) {
            warn!(view = %self.reference, obj = %obj.reference(), "member not dropped: {}", e);
        }
    }
}

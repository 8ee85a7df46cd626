use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use tracing::warn;

use super::ContainerView;
use crate::constants::MANAGED_ENTITY;
use crate::constants::VIEW_LIST_PROPERTY;
use crate::constants::VIEW_PROPERTY;
use crate::Context;
use crate::Fault;
use crate::FaultResult;
use crate::ManagedObject;
use crate::ManagedObjectReference;
use crate::ObserverId;
use crate::PropertyChange;
use crate::RegistryObserver;
use crate::Value;

#[derive(Debug)]
enum ViewEntry {
    Container {
        view: Arc<ContainerView>,
        observer: ObserverId,
    },
    List,
}

/// Creates and tracks session-scoped views.
///
/// Observes the registry so that a view removed by any path (destroy,
/// session logout) is forgotten and its observer deregistered.
#[derive(Debug)]
pub struct ViewManager {
    reference: ManagedObjectReference,
    views: RwLock<HashMap<ManagedObjectReference, ViewEntry>>,
}

impl ViewManager {
    /// Stores `ViewManager:ViewManager` and starts observing the registry.
    pub fn new(ctx: &Context) -> Arc<Self> {
        let reference = ctx.registry().put(
            ctx,
            ManagedObject::with_reference(ManagedObjectReference::new("ViewManager", "ViewManager"))
                .with_property(VIEW_LIST_PROPERTY, Vec::<ManagedObjectReference>::new()),
        );
        let manager = Arc::new(Self {
            reference,
            views: RwLock::new(HashMap::new()),
        });
        ctx.registry().add_observer(manager.clone());
        manager
    }

    pub fn reference(&self) -> &ManagedObjectReference {
        &self.reference
    }

    pub fn view_count(&self) -> usize {
        self.views.read().len()
    }

    pub fn container_view(
        &self,
        view: &ManagedObjectReference,
    ) -> Option<Arc<ContainerView>> {
        match self.views.read().get(view)? {
            ViewEntry::Container { view, .. } => Some(view.clone()),
            ViewEntry::List => None,
        }
    }

    /// Current `view` property of a view visible to the caller.
    pub fn members(
        &self,
        ctx: &Context,
        view: &ManagedObjectReference,
    ) -> FaultResult<Vec<ManagedObjectReference>> {
        self.visible(ctx, view)?;
        ctx.snapshot(view)
            .map(|o| o.references(VIEW_PROPERTY))
            .ok_or_else(|| Fault::not_found(view))
    }

    /// Entities of `types` (any entity when empty) below `container`, only
    /// its direct children unless `recursive`.
    pub fn create_container_view(
        &self,
        ctx: &Context,
        container: &ManagedObjectReference,
        types: &[String],
        recursive: bool,
    ) -> FaultResult<ManagedObjectReference> {
        let registry = ctx.registry();
        let root = ctx.snapshot(container).ok_or_else(|| Fault::not_found(container))?;
        if !registry.is_container(root.kind()) {
            return Err(Fault::invalid_argument("container"));
        }
        if types.iter().any(|t| !registry.schema().is_a(t, MANAGED_ENTITY)) {
            return Err(Fault::invalid_argument("type"));
        }

        let mut view = ContainerView::new(
            ManagedObjectReference::new("ContainerView", ""),
            container.clone(),
            types.to_vec(),
            recursive,
        );
        let members = view.members(registry);
        let reference = ctx.put_scoped(
            ManagedObject::new("ContainerView")
                .with_property("container", container.clone())
                .with_property("type", types.iter().map(|t| Value::from(t.as_str())).collect::<Vec<_>>())
                .with_property("recursive", recursive)
                .with_property(VIEW_PROPERTY, members),
        );
        view.set_reference(reference.clone());

        let view = Arc::new(view);
        let observer = registry.add_observer(view.clone());
        // catch up with changes made before the observer was registered
        view.refresh(ctx);

        debug!(view = %reference, %container, recursive, "container view created");
        self.register(ctx, &reference, ViewEntry::Container { view, observer })?;
        Ok(reference)
    }

    /// Fails on the first of `objs` that does not resolve.
    pub fn create_list_view(
        &self,
        ctx: &Context,
        objs: &[ManagedObjectReference],
    ) -> FaultResult<ManagedObjectReference> {
        if let Some(missing) = unresolved(ctx, objs).first() {
            return Err(Fault::not_found(missing));
        }
        let reference = ctx.put_scoped(ManagedObject::new("ListView").with_property(VIEW_PROPERTY, dedup(objs, Vec::new())));

        debug!(view = %reference, objects = objs.len(), "list view created");
        self.register(ctx, &reference, ViewEntry::List)?;
        Ok(reference)
    }

    /// Adds then removes members. Unresolvable additions are still listed
    /// and are returned.
    pub fn modify_list_view(
        &self,
        ctx: &Context,
        view: &ManagedObjectReference,
        add: &[ManagedObjectReference],
        remove: &[ManagedObjectReference],
    ) -> FaultResult<Vec<ManagedObjectReference>> {
        self.list_view(ctx, view)?;
        let missing = unresolved(ctx, add);
        if add.is_empty() && remove.is_empty() {
            return Ok(missing);
        }

        ctx.with_lock(view, || {
            let current = ctx.registry().snapshot(view).map(|o| o.references(VIEW_PROPERTY)).unwrap_or_default();
            let mut members = dedup(add, current);
            members.retain(|r| !remove.contains(r));
            publish(ctx, view, members)
        })?;
        Ok(missing)
    }

    /// Replaces every member with `objs`.
    pub fn reset_list_view(
        &self,
        ctx: &Context,
        view: &ManagedObjectReference,
        objs: &[ManagedObjectReference],
    ) -> FaultResult<Vec<ManagedObjectReference>> {
        self.list_view(ctx, view)?;
        let missing = unresolved(ctx, objs);
        ctx.with_lock(view, || publish(ctx, view, dedup(objs, Vec::new())))?;
        Ok(missing)
    }

    pub fn destroy_view(
        &self,
        ctx: &Context,
        view: &ManagedObjectReference,
    ) -> FaultResult<()> {
        self.visible(ctx, view)?;
        // the removal hook forgets the view
        ctx.remove_scoped(view);
        debug!(%view, "view destroyed");
        Ok(())
    }

    fn register(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
        entry: ViewEntry,
    ) -> FaultResult<()> {
        self.views.write().insert(reference.clone(), entry);
        ctx.registry()
            .add_reference(ctx, &self.reference, VIEW_LIST_PROPERTY, reference)
    }

    fn forget(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
    ) {
        let Some(entry) = self.views.write().remove(reference) else {
            return;
        };
        if let ViewEntry::Container { observer, .. } = entry {
            ctx.registry().remove_observer(observer);
        }
        if let Err(e) = ctx
            .registry()
            .remove_reference(ctx, &self.reference, VIEW_LIST_PROPERTY, reference)
        {
            warn!(view = %reference, "viewList not updated: {}", e);
        }
    }

    fn visible(
        &self,
        ctx: &Context,
        view: &ManagedObjectReference,
    ) -> FaultResult<()> {
        if ctx.is_visible(view) && self.views.read().contains_key(view) {
            Ok(())
        } else {
            Err(Fault::not_found(view))
        }
    }

    fn list_view(
        &self,
        ctx: &Context,
        view: &ManagedObjectReference,
    ) -> FaultResult<()> {
        self.visible(ctx, view)?;
        match self.views.read().get(view) {
            Some(ViewEntry::List) => Ok(()),
            _ => Err(Fault::invalid_argument("view")),
        }
    }
}

impl RegistryObserver for ViewManager {
    fn remove_object(
        &self,
        ctx: &Context,
        obj: &ManagedObject,
    ) {
        self.forget(ctx, obj.reference());
    }
}

fn unresolved(
    ctx: &Context,
    refs: &[ManagedObjectReference],
) -> Vec<ManagedObjectReference> {
    refs.iter().filter(|r| ctx.get(r).is_none()).cloned().collect()
}

/// `current` followed by the references of `add` it does not hold yet.
fn dedup(
    add: &[ManagedObjectReference],
    mut current: Vec<ManagedObjectReference>,
) -> Vec<ManagedObjectReference> {
    for reference in add {
        if !current.contains(reference) {
            current.push(reference.clone());
        }
    }
    current
}

fn publish(
    ctx: &Context,
    view: &ManagedObjectReference,
    members: Vec<ManagedObjectReference>,
) -> FaultResult<()> {
    ctx.registry()
        .update(ctx, view, &[PropertyChange::assign(VIEW_PROPERTY, members)])
}

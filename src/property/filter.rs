use std::collections::HashMap;
use std::collections::HashSet;
use std::slice;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::queue::QueuedUpdate;
use super::resolve::descend;
use super::resolve::field_value;
use super::retrieve::collect;
use super::traversal::TraversalPlan;
use crate::metrics::FILTER_CHANGES;
use crate::Context;
use crate::Fault;
use crate::FaultResult;
use crate::Field;
use crate::ManagedObject;
use crate::ManagedObjectReference;
use crate::MissingObject;
use crate::ObjectContent;
use crate::ObjectUpdate;
use crate::ObjectUpdateKind;
use crate::PropertyChange;
use crate::PropertyChangeOp;
use crate::PropertyFilterSpec;
use crate::PropertyFilterUpdate;
use crate::RegistryObserver;
use crate::Schema;

/// A live subscription: a filter spec plus the set of objects it currently
/// matches.
///
/// The match set is recomputed by walking the compiled plan only when it
/// may have changed: on the first poll, after a root with a select set was
/// updated, when a batch contains creations or removals, or when a batch
/// modifies a property the last walk traversed. Otherwise it is reused.
#[derive(Debug)]
pub struct PropertyFilter {
    reference: ManagedObjectReference,
    spec: PropertyFilterSpec,
    partial_updates: bool,
    plan: TraversalPlan,
    dirty: AtomicBool,
    state: Mutex<FilterState>,
}

#[derive(Debug, Default)]
struct FilterState {
    initialized: bool,
    /// Matched objects in walk order
    matched: Vec<ManagedObjectReference>,
    members: HashSet<ManagedObjectReference>,
    sources: HashSet<(ManagedObjectReference, String)>,
    missing: HashSet<ManagedObjectReference>,
}

impl PropertyFilter {
    /// Compiles the spec's traversal plan; an undefined named step is
    /// `InvalidArgument`.
    pub(crate) fn new(
        reference: ManagedObjectReference,
        spec: PropertyFilterSpec,
        partial_updates: bool,
    ) -> FaultResult<Self> {
        let plan = TraversalPlan::compile(slice::from_ref(&spec))?;
        Ok(Self {
            reference,
            spec,
            partial_updates,
            plan,
            dirty: AtomicBool::new(false),
            state: Mutex::new(FilterState::default()),
        })
    }

    pub(crate) fn with_reference(
        mut self,
        reference: ManagedObjectReference,
    ) -> Self {
        self.reference = reference;
        self
    }

    pub fn reference(&self) -> &ManagedObjectReference {
        &self.reference
    }

    pub fn spec(&self) -> &PropertyFilterSpec {
        &self.spec
    }

    pub fn partial_updates(&self) -> bool {
        self.partial_updates
    }

    /// Forgets the match set; the next poll reports every match as Enter.
    pub(crate) fn reset(&self) {
        *self.state.lock() = FilterState::default();
        self.dirty.store(false, Ordering::Release);
    }

    pub(crate) fn needs_walk(&self) -> bool {
        self.dirty.load(Ordering::Acquire) || !self.state.lock().initialized
    }

    /// References currently matched, in walk order.
    pub fn matched(&self) -> Vec<ManagedObjectReference> {
        self.state.lock().matched.clone()
    }

    /// Turns a batch of registry mutations into this filter's updates.
    pub(crate) fn poll(
        &self,
        ctx: &Context,
        batch: &[QueuedUpdate],
    ) -> Option<PropertyFilterUpdate> {
        let mut state = self.state.lock();
        let baseline = !state.initialized;
        let dirty = self.dirty.swap(false, Ordering::AcqRel);

        let mut update = PropertyFilterUpdate {
            filter: self.reference.clone(),
            object_set: Vec::new(),
            missing_set: Vec::new(),
        };
        let mut entered = HashSet::new();

        if baseline || dirty || self.structural(&state, batch) {
            let collected = match collect(ctx, slice::from_ref(&self.spec), &self.plan, true) {
                Ok(collected) => collected,
                Err(e) => {
                    warn!(filter = %self.reference, "walk failed: {}", e);
                    return None;
                }
            };
            trace!(filter = %self.reference, baseline, dirty, objects = collected.objects.len(), "walk");

            let missing: HashSet<_> = collected.missing.iter().cloned().collect();
            for obj in &collected.missing {
                if !state.missing.contains(obj) {
                    update.missing_set.push(MissingObject {
                        obj: obj.clone(),
                        fault: Fault::not_found(obj),
                    });
                }
            }

            let members: HashSet<_> = collected.objects.iter().map(|c| c.obj.clone()).collect();
            for content in collected.objects.iter().filter(|c| !state.members.contains(&c.obj)) {
                entered.insert(content.obj.clone());
                update.object_set.push(enter(content));
            }
            let leaving: Vec<_> = state.matched.iter().filter(|r| !members.contains(*r)).cloned().collect();

            state.matched = collected.objects.into_iter().map(|c| c.obj).collect();
            state.members = members;
            state.sources = collected.sources;
            state.missing = missing;
            state.initialized = true;

            if !baseline {
                update.object_set.extend(self.modifications(ctx, &state, &entered, batch));
            }
            update.object_set.extend(leaving.into_iter().map(|obj| ObjectUpdate {
                kind: ObjectUpdateKind::Leave,
                obj,
                change_set: Vec::new(),
                missing_set: Vec::new(),
            }));
        } else {
            update.object_set = self.modifications(ctx, &state, &entered, batch);
        }
        drop(state);

        if update.object_set.is_empty() && update.missing_set.is_empty() {
            return None;
        }
        self.record(&update);
        Some(update)
    }

    /// Whether the batch can change the match set.
    fn structural(
        &self,
        state: &FilterState,
        batch: &[QueuedUpdate],
    ) -> bool {
        batch.iter().any(|u| match u.kind {
            ObjectUpdateKind::Enter | ObjectUpdateKind::Leave => true,
            ObjectUpdateKind::Modify => u.changes.iter().any(|c| {
                let root = c.name.split(['.', '[']).next().unwrap_or(&c.name);
                state.sources.contains(&(u.obj.clone(), root.to_string()))
            }),
        })
    }

    /// One Modify per matched object, merging every change of the batch
    /// that the filter's property specs select.
    fn modifications(
        &self,
        ctx: &Context,
        state: &FilterState,
        entered: &HashSet<ManagedObjectReference>,
        batch: &[QueuedUpdate],
    ) -> Vec<ObjectUpdate> {
        let schema = ctx.registry().schema();
        let mut updates: Vec<ObjectUpdate> = Vec::new();
        let mut index: HashMap<ManagedObjectReference, usize> = HashMap::new();
        let mut folded: HashMap<ManagedObjectReference, HashSet<String>> = HashMap::new();

        for queued in batch.iter().filter(|u| u.kind == ObjectUpdateKind::Modify) {
            if !state.members.contains(&queued.obj) || entered.contains(&queued.obj) {
                continue;
            }
            // removed since; its Leave follows
            let Some(obj) = ctx.snapshot(&queued.obj) else {
                continue;
            };
            let folded = folded.entry(queued.obj.clone()).or_default();

            for change in &queued.changes {
                let reported = self.report(schema, &obj, change, folded);
                if reported.is_empty() {
                    continue;
                }
                let at = *index.entry(queued.obj.clone()).or_insert_with(|| {
                    updates.push(ObjectUpdate {
                        kind: ObjectUpdateKind::Modify,
                        obj: queued.obj.clone(),
                        change_set: Vec::new(),
                        missing_set: Vec::new(),
                    });
                    updates.len() - 1
                });
                for change in reported {
                    merge(&mut updates[at].change_set, change);
                }
            }
        }
        updates
    }

    /// Changes reported for `change` on `obj`, one per requested path it
    /// touches; empty when no property spec selects it.
    pub(crate) fn report(
        &self,
        schema: &Schema,
        obj: &ManagedObject,
        change: &PropertyChange,
        folded: &mut HashSet<String>,
    ) -> Vec<PropertyChange> {
        let changed = Field::parse(&change.name);
        let mut out = Vec::new();

        for prop in &self.spec.prop_set {
            if !schema.is_a(obj.kind(), &prop.kind) {
                continue;
            }
            if prop.is_all() {
                push_unique(&mut out, change.clone());
                continue;
            }

            for name in &prop.path_set {
                if *name == change.name {
                    push_unique(&mut out, change.clone());
                    continue;
                }

                // "field[key].item" requested, "field[key]" changed
                if let Some(requested) = Field::parse(name) {
                    if let Some(item) = &requested.item {
                        if requested.element().to_string() == change.name {
                            let path: Vec<&str> = item.split('.').collect();
                            let val = change
                                .val
                                .as_ref()
                                .and_then(|v| descend(schema, v, &path).ok().flatten())
                                .cloned();
                            push_unique(
                                &mut out,
                                PropertyChange {
                                    name: name.clone(),
                                    op: change.op,
                                    val,
                                },
                            );
                            continue;
                        }
                    }
                }

                if let Some(field) = changed.as_ref().filter(|f| f.is_indexed()) {
                    // "field[key]" requested, "field[key].item" changed
                    if field.item.is_some() && field.element().to_string() == *name {
                        out.extend(self.fold(schema, obj, name, folded));
                    }
                    continue;
                }

                if is_dotted_child(&change.name, name) {
                    if self.partial_updates {
                        push_unique(&mut out, change.clone());
                    } else {
                        out.extend(self.fold(schema, obj, name, folded));
                    }
                    continue;
                }

                if is_dotted_child(name, &change.name) {
                    push_unique(&mut out, current(schema, obj, name, PropertyChangeOp::Assign));
                }
            }
        }
        out
    }

    /// Current value of `parent`, reported once per object per batch.
    fn fold(
        &self,
        schema: &Schema,
        obj: &ManagedObject,
        parent: &str,
        folded: &mut HashSet<String>,
    ) -> Option<PropertyChange> {
        if !folded.insert(parent.to_string()) {
            return None;
        }
        Some(current(schema, obj, parent, PropertyChangeOp::Assign))
    }

    fn record(
        &self,
        update: &PropertyFilterUpdate,
    ) {
        let mut counts = [0u64; 3];
        for obj in &update.object_set {
            counts[match obj.kind {
                ObjectUpdateKind::Enter => 0,
                ObjectUpdateKind::Modify => 1,
                ObjectUpdateKind::Leave => 2,
            }] += 1;
        }
        for (kind, n) in ["enter", "modify", "leave"].iter().zip(counts) {
            if n > 0 {
                FILTER_CHANGES.with_label_values(&[*kind]).inc_by(n);
            }
        }
        debug!(
            filter = %self.reference,
            enter = counts[0],
            modify = counts[1],
            leave = counts[2],
            missing = update.missing_set.len(),
            "filter update"
        );
    }
}

impl RegistryObserver for PropertyFilter {
    fn update_object(
        &self,
        _ctx: &Context,
        obj: &ManagedObject,
        _changes: &[PropertyChange],
    ) {
        let root = self
            .spec
            .object_set
            .iter()
            .any(|o| o.obj == *obj.reference() && !o.select_set.is_empty());
        if root {
            self.dirty.store(true, Ordering::Release);
        }
    }
}

fn enter(content: &ObjectContent) -> ObjectUpdate {
    ObjectUpdate {
        kind: ObjectUpdateKind::Enter,
        obj: content.obj.clone(),
        change_set: content
            .prop_set
            .iter()
            .map(|p| PropertyChange::assign(p.name.clone(), p.val.clone()))
            .collect(),
        missing_set: content.missing_set.clone(),
    }
}

fn current(
    schema: &Schema,
    obj: &ManagedObject,
    name: &str,
    op: PropertyChangeOp,
) -> PropertyChange {
    let val = Field::parse(name).and_then(|f| field_value(schema, obj, &f).ok().flatten());
    PropertyChange {
        name: name.to_string(),
        op,
        val,
    }
}

/// `child` is `parent` followed by `.` and more.
fn is_dotted_child(
    child: &str,
    parent: &str,
) -> bool {
    child.len() > parent.len() && child.starts_with(parent) && child.as_bytes()[parent.len()] == b'.'
}

fn push_unique(
    changes: &mut Vec<PropertyChange>,
    change: PropertyChange,
) {
    if !changes.contains(&change) {
        changes.push(change);
    }
}

/// Later assignments of the same property replace earlier ones in place.
fn merge(
    changes: &mut Vec<PropertyChange>,
    change: PropertyChange,
) {
    if change.op == PropertyChangeOp::Assign {
        if let Some(existing) = changes.iter_mut().find(|c| c.op == PropertyChangeOp::Assign && c.name == change.name) {
            existing.val = change.val;
            return;
        }
    }
    changes.push(change);
}

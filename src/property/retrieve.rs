//! One-shot property collection and the continuation-token book.

use std::collections::HashSet;

use dashmap::DashMap;
use nanoid::nanoid;
use tracing::debug;
use tracing::trace;

use super::resolve::field_value;
use super::traversal::TraversalPlan;
use super::traversal::Walk;
use crate::constants::READ_PRIVILEGE;
use crate::constants::SELF_PROPERTY;
use crate::Context;
use crate::DynamicProperty;
use crate::Fault;
use crate::FaultResult;
use crate::Field;
use crate::ManagedObject;
use crate::ManagedObjectReference;
use crate::MissingProperty;
use crate::ObjectContent;
use crate::PropertyFilterSpec;
use crate::RetrieveResult;
use crate::Value;

/// Result of evaluating filter specs against the registry.
#[derive(Debug, Default)]
pub(crate) struct Collected {
    pub objects: Vec<ObjectContent>,
    /// Roots that could not be resolved
    pub missing: Vec<ManagedObjectReference>,
    /// (object, property) pairs traversal read references from
    pub sources: HashSet<(ManagedObjectReference, String)>,
}

/// Evaluates `specs`: resolves roots, walks `plan`, then reads the requested
/// properties of every reached object.
///
/// A missing root is `ManagedObjectNotFound` unless `tolerate_missing` or
/// the spec's `reportMissingObjectsInResults` is set, in which case it is
/// listed in [`Collected::missing`] and skipped.
pub(crate) fn collect(
    ctx: &Context,
    specs: &[PropertyFilterSpec],
    plan: &TraversalPlan,
    tolerate_missing: bool,
) -> FaultResult<Collected> {
    let mut collected = Collected::default();
    let mut roots = Vec::new();
    let mut walk = Walk::default();

    let mut entry = 0;
    for spec in specs {
        let report_missing = spec.report_missing_objects_in_results.unwrap_or(false);
        for object in &spec.object_set {
            let index = entry;
            entry += 1;

            let found = ctx.with_lock(&object.obj, || {
                let root = ctx.snapshot(&object.obj)?;
                plan.walk(ctx, index, &root, &mut walk);
                Some(())
            });
            if found.is_none() {
                if !(tolerate_missing || report_missing) {
                    return Err(Fault::not_found(&object.obj));
                }
                trace!(obj = %object.obj, "root object missing");
                collected.missing.push(object.obj.clone());
                continue;
            }
            if object.select_set.is_empty() || !object.skip.unwrap_or(false) {
                roots.push(object.obj.clone());
            }
        }
    }

    let mut seen = HashSet::new();
    for reference in roots.into_iter().chain(walk.refs) {
        if !seen.insert(reference.clone()) {
            continue;
        }
        // removed since it was reached
        let Some(obj) = ctx.with_lock(&reference, || ctx.snapshot(&reference)) else {
            trace!(obj = %reference, "object no longer exists");
            continue;
        };
        if let Some(content) = object_content(ctx, specs, &obj) {
            collected.objects.push(content);
        }
    }
    collected.sources = walk.sources;

    debug!(objects = collected.objects.len(), missing = collected.missing.len(), "collect");
    Ok(collected)
}

/// Properties of `obj` requested by any property spec whose type is the
/// object's type or a supertype of it. `None` when no spec applies.
pub(crate) fn object_content(
    ctx: &Context,
    specs: &[PropertyFilterSpec],
    obj: &ManagedObject,
) -> Option<ObjectContent> {
    let schema = ctx.registry().schema();
    let mut content = ObjectContent {
        obj: obj.reference().clone(),
        prop_set: Vec::new(),
        missing_set: Vec::new(),
    };
    let mut seen = HashSet::new();
    let mut matched = false;

    for prop in specs.iter().flat_map(|s| &s.prop_set) {
        if !schema.is_a(obj.kind(), &prop.kind) {
            continue;
        }
        matched = true;

        if prop.is_all() {
            let declared = schema.fields(obj.kind());
            let extra = obj.properties().keys().map(String::as_str).filter(|k| !declared.contains(k));
            for name in declared.iter().copied().chain(extra) {
                if name == SELF_PROPERTY || !seen.insert(name.to_string()) {
                    continue;
                }
                if let Some(value) = obj.get(name).filter(|v| !v.is_empty()) {
                    add(ctx, &mut content, name, value.clone());
                }
            }
            continue;
        }

        for name in &prop.path_set {
            if !seen.insert(name.clone()) {
                continue;
            }
            let resolved = match Field::parse(name) {
                Some(field) => field_value(schema, obj, &field),
                None => Err(Fault::invalid_property(name.clone())),
            };
            match resolved {
                Err(_) => content.missing_set.push(MissingProperty {
                    path: name.clone(),
                    fault: Fault::invalid_property(name.clone()),
                }),
                Ok(_) if !ctx.is_authenticated() => not_authenticated(&mut content, name),
                Ok(Some(value)) => content.prop_set.push(DynamicProperty {
                    name: name.clone(),
                    val: value,
                }),
                Ok(None) => {}
            }
        }
    }

    matched.then_some(content)
}

fn add(
    ctx: &Context,
    content: &mut ObjectContent,
    name: &str,
    value: Value,
) {
    if ctx.is_authenticated() {
        content.prop_set.push(DynamicProperty {
            name: name.to_string(),
            val: value,
        });
    } else {
        not_authenticated(content, name);
    }
}

fn not_authenticated(
    content: &mut ObjectContent,
    name: &str,
) {
    let fault = Fault::NotAuthenticated {
        object: content.obj.clone(),
        privilege_id: READ_PRIVILEGE.to_string(),
    };
    content.missing_set.push(MissingProperty {
        path: name.to_string(),
        fault,
    });
}

struct RetrievePage {
    max_objects: usize,
    objects: Vec<ObjectContent>,
}

/// Remaining pages of `RetrievePropertiesEx` calls, keyed by token.
#[derive(Default)]
pub(crate) struct RetrieveBook {
    pages: DashMap<String, RetrievePage>,
}

impl RetrieveBook {
    /// First `max_objects` of `objects` (all when `max_objects` is 0), with
    /// a token for the rest.
    pub(crate) fn page(
        &self,
        mut objects: Vec<ObjectContent>,
        max_objects: usize,
    ) -> RetrieveResult {
        if max_objects == 0 || objects.len() <= max_objects {
            return RetrieveResult { token: None, objects };
        }
        let rest = objects.split_off(max_objects);
        let token = nanoid!();
        trace!(%token, remaining = rest.len(), "retrieve page stored");
        self.pages.insert(
            token.clone(),
            RetrievePage {
                max_objects,
                objects: rest,
            },
        );
        RetrieveResult {
            token: Some(token),
            objects,
        }
    }

    pub(crate) fn next(
        &self,
        token: &str,
    ) -> FaultResult<RetrieveResult> {
        let (_, page) = self.take(token)?;
        Ok(self.page(page.objects, page.max_objects))
    }

    pub(crate) fn cancel(
        &self,
        token: &str,
    ) -> FaultResult<()> {
        self.take(token).map(|_| ())
    }

    fn take(
        &self,
        token: &str,
    ) -> FaultResult<(String, RetrievePage)> {
        if token.is_empty() {
            return Err(Fault::invalid_property("token"));
        }
        self.pages.remove(token).ok_or_else(|| Fault::invalid_property("token"))
    }

    pub(crate) fn len(&self) -> usize {
        self.pages.len()
    }
}

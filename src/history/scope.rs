use crate::Context;
use crate::EntityFilter;
use crate::ManagedObjectReference;
use crate::RecursionOption;

/// Whether any of `entities` falls under `filter`. The root folder with
/// `self` recursion covers everything.
pub(crate) fn in_scope(
    ctx: &Context,
    filter: &EntityFilter,
    entities: &[ManagedObjectReference],
) -> bool {
    let registry = ctx.registry();
    let is_root = || {
        ctx.snapshot(&filter.entity)
            .map(|o| o.kind() == "Folder" && o.parent().is_none())
            .unwrap_or(false)
    };
    let itself = || entities.contains(&filter.entity);
    let children = || entities.iter().any(|e| registry.is_descendant(&filter.entity, e));

    match filter.recursion {
        RecursionOption::Itself => is_root() || itself(),
        RecursionOption::Children => children(),
        RecursionOption::All => is_root() || itself() || children(),
    }
}

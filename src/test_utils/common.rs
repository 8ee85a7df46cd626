use std::sync::Arc;

use crate::Context;
use crate::ManagedObjectReference;
use crate::Registry;
use crate::Schema;

pub(crate) fn new_registry() -> Arc<Registry> {
    Arc::new(Registry::new("vim25", Schema::vim()))
}

/// Authenticated context over a fresh registry.
pub(crate) fn internal_ctx() -> Context {
    Context::internal(new_registry())
}

pub(crate) fn moref(
    kind: &str,
    value: &str,
) -> ManagedObjectReference {
    ManagedObjectReference::new(kind, value)
}

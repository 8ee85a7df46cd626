use std::fmt;

#[cfg(test)]
use mockall::automock;

use super::ManagedObject;
use crate::Context;
use crate::PropertyChange;

/// Handle returned by [`crate::Registry::add_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) u64);

/// Cross-cutting effect notified on every structural change of a registry.
///
/// Hooks run on the mutating request's thread, in registration order, while
/// the mutated object's lock is held. `obj` is the object's state right
/// after the change (right before deletion for `remove_object`).
#[cfg_attr(test, automock)]
pub trait RegistryObserver: Send + Sync {
    fn put_object(
        &self,
        _ctx: &Context,
        _obj: &ManagedObject,
    ) {
    }

    fn update_object(
        &self,
        _ctx: &Context,
        _obj: &ManagedObject,
        _changes: &[PropertyChange],
    ) {
    }

    fn remove_object(
        &self,
        _ctx: &Context,
        _obj: &ManagedObject,
    ) {
    }
}

impl fmt::Display for ObserverId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

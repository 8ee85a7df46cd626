use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::Session;
use crate::constants::INTERNAL_USER;
use crate::constants::SESSION_REF_PREFIX;
use crate::ManagedObject;
use crate::ManagedObjectReference;
use crate::ObjectHandle;
use crate::Registry;

/// Per-request state: registry handle, caller identity, the set of object
/// locks this request holds, and its cancellation token.
///
/// A context belongs to one request; use [`Context::fork`] to hand work to
/// another task.
pub struct Context {
    registry: Arc<Registry>,
    session: Option<Arc<Session>>,
    held: Mutex<HashSet<ManagedObjectReference>>,
    cancel: CancellationToken,
}

/// Marks a reference as locked by the owning context until dropped.
pub(crate) struct HeldLock<'a> {
    ctx: &'a Context,
    reference: ManagedObjectReference,
}

impl Context {
    /// Authenticated context of the simulator itself.
    pub fn internal(registry: Arc<Registry>) -> Self {
        Self::with_session(registry, Arc::new(Session::new(INTERNAL_USER)))
    }

    /// Unauthenticated caller; property reads report `NotAuthenticated`.
    pub fn anonymous(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            session: None,
            held: Mutex::new(HashSet::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_session(
        registry: Arc<Registry>,
        session: Arc<Session>,
    ) -> Self {
        Self {
            registry,
            session: Some(session),
            held: Mutex::new(HashSet::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Same identity, no held locks, cancelled together with `self`.
    pub fn fork(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            session: self.session.clone(),
            held: Mutex::new(HashSet::new()),
            cancel: self.cancel.child_token(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.session.as_deref().map(Session::user_name)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancels the request, waking any blocked wait it runs.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Session-scoped objects are only visible to their own session.
    pub fn is_visible(
        &self,
        reference: &ManagedObjectReference,
    ) -> bool {
        if !reference.value.starts_with(SESSION_REF_PREFIX) {
            return true;
        }
        self.session.as_ref().map(|s| s.owns(reference)).unwrap_or(false)
    }

    pub fn get(
        &self,
        reference: &ManagedObjectReference,
    ) -> Option<ObjectHandle> {
        if !self.is_visible(reference) {
            return None;
        }
        self.registry.get(reference)
    }

    pub fn snapshot(
        &self,
        reference: &ManagedObjectReference,
    ) -> Option<ManagedObject> {
        self.get(reference).map(|handle| handle.read().clone())
    }

    /// Stores `obj` scoped to the caller's session, or globally when the
    /// context has none.
    pub fn put_scoped(
        &self,
        obj: ManagedObject,
    ) -> ManagedObjectReference {
        match &self.session {
            Some(session) => session.put(self, obj),
            None => self.registry.put(self, obj),
        }
    }

    pub fn remove_scoped(
        &self,
        reference: &ManagedObjectReference,
    ) {
        match &self.session {
            Some(session) => session.remove(self, reference),
            None => self.registry.remove(self, reference),
        }
    }

    pub fn with_lock<R>(
        &self,
        reference: &ManagedObjectReference,
        f: impl FnOnce() -> R,
    ) -> R {
        self.registry.with_lock(self, reference, f)
    }

    pub(crate) fn holds(
        &self,
        reference: &ManagedObjectReference,
    ) -> bool {
        self.held.lock().contains(reference)
    }

    pub(crate) fn hold(
        &self,
        reference: &ManagedObjectReference,
    ) -> HeldLock<'_> {
        self.held.lock().insert(reference.clone());
        HeldLock {
            ctx: self,
            reference: reference.clone(),
        }
    }
}

impl Drop for HeldLock<'_> {
    fn drop(&mut self) {
        self.ctx.held.lock().remove(&self.reference);
    }
}

impl fmt::Debug for Context {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Context")
            .field("namespace", &self.registry.namespace())
            .field("user", &self.user_name())
            .field("held", &self.held.lock().len())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

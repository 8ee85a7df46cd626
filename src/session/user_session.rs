use nanoid::nanoid;
use parking_lot::Mutex;
use tracing::debug;

use crate::constants::SESSION_REF_PREFIX;
use crate::utils::time::get_now_as_u128;
use crate::Context;
use crate::ManagedObject;
use crate::ManagedObjectReference;

/// An authenticated client identity.
///
/// Objects a session puts (collectors, filters, views) get references of the
/// form `session[<key>]<id>`; they are invisible to other sessions and are
/// removed on logout.
#[derive(Debug)]
pub struct Session {
    key: String,
    user_name: String,
    /// Milliseconds since the Unix epoch
    login_time: u128,
    objects: Mutex<Vec<ManagedObjectReference>>,
}

impl Session {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            key: nanoid!(),
            user_name: user_name.into(),
            login_time: get_now_as_u128(),
            objects: Mutex::new(Vec::new()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn login_time(&self) -> u128 {
        self.login_time
    }

    fn reference_prefix(&self) -> String {
        format!("{}{}]", SESSION_REF_PREFIX, self.key)
    }

    /// Whether `reference` was allocated by this session.
    pub fn owns(
        &self,
        reference: &ManagedObjectReference,
    ) -> bool {
        reference.value.starts_with(&self.reference_prefix())
    }

    /// Stores a session-scoped object in the context's registry.
    pub fn put(
        &self,
        ctx: &Context,
        mut obj: ManagedObject,
    ) -> ManagedObjectReference {
        if obj.reference().is_unallocated() {
            let value = format!("{}{}", self.reference_prefix(), nanoid!());
            obj.set_reference(ManagedObjectReference::new(obj.kind(), value));
        }
        let reference = ctx.registry().put(ctx, obj);
        self.objects.lock().push(reference.clone());
        reference
    }

    pub fn remove(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
    ) {
        ctx.registry().remove(ctx, reference);
        self.objects.lock().retain(|r| r != reference);
    }

    /// References of the objects this session currently owns.
    pub fn objects(&self) -> Vec<ManagedObjectReference> {
        self.objects.lock().clone()
    }

    /// Removes every object the session put, newest first.
    pub fn logout(
        &self,
        ctx: &Context,
    ) {
        let objects = std::mem::take(&mut *self.objects.lock());
        debug!(session = %self.key, user = %self.user_name, objects = objects.len(), "logout");
        for reference in objects.iter().rev() {
            ctx.registry().remove(ctx, reference);
        }
    }
}

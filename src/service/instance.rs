use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::Context;
use crate::EventManager;
use crate::Namespaces;
use crate::PropertyCollector;
use crate::Registry;
use crate::Session;
use crate::SimConfig;
use crate::TaskManager;
use crate::ViewManager;

/// One simulated server core: its namespaces, the service-wide managers of
/// the primary namespace and the logged-in sessions.
#[derive(Debug)]
pub struct ServiceInstance {
    config: SimConfig,
    namespaces: Namespaces,
    registry: Arc<Registry>,
    property_collector: Arc<PropertyCollector>,
    event_manager: Arc<EventManager>,
    task_manager: Arc<TaskManager>,
    view_manager: Arc<ViewManager>,
    sessions: DashMap<String, Arc<Session>>,
}

impl ServiceInstance {
    pub(super) fn new(
        config: SimConfig,
        namespaces: Namespaces,
        registry: Arc<Registry>,
        property_collector: Arc<PropertyCollector>,
        event_manager: Arc<EventManager>,
        task_manager: Arc<TaskManager>,
        view_manager: Arc<ViewManager>,
    ) -> Self {
        Self {
            config,
            namespaces,
            registry,
            property_collector,
            event_manager,
            task_manager,
            view_manager,
            sessions: DashMap::new(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Registry of the primary namespace.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Registry of `namespace`, created empty on first use.
    pub fn namespace(
        &self,
        namespace: &str,
    ) -> Arc<Registry> {
        self.namespaces.get_or_create(namespace)
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn property_collector(&self) -> &Arc<PropertyCollector> {
        &self.property_collector
    }

    pub fn event_manager(&self) -> &Arc<EventManager> {
        &self.event_manager
    }

    pub fn task_manager(&self) -> &Arc<TaskManager> {
        &self.task_manager
    }

    pub fn view_manager(&self) -> &Arc<ViewManager> {
        &self.view_manager
    }

    /// Context of the simulator itself over the primary namespace.
    pub fn internal_context(&self) -> Context {
        Context::internal(self.registry.clone())
    }

    /// Opens a session for `user_name` and returns a context bound to it.
    pub fn login(
        &self,
        user_name: &str,
    ) -> Context {
        let session = Arc::new(Session::new(user_name));
        debug!(session = %session.key(), user = user_name, "login");
        self.sessions.insert(session.key().to_string(), session.clone());
        Context::with_session(self.registry.clone(), session)
    }

    /// Ends the context's session, removing every object it owns. Returns
    /// false when the context has no live session.
    pub fn logout(
        &self,
        ctx: &Context,
    ) -> bool {
        let Some(session) = ctx.session() else {
            return false;
        };
        if self.sessions.remove(session.key()).is_none() {
            return false;
        }
        session.logout(ctx);
        true
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

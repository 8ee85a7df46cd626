//! Builder for a [`ServiceInstance`].
//!
//! Loads the layered configuration, validates it once every override is
//! applied, then creates the primary namespace and the service-wide managers
//! in dependency order: registry, property collector, event manager, task
//! manager, view manager.
//!
//! ```ignore
//! let service = ServiceBuilder::new()?
//!     .with_override_config("config/sim.toml")?
//!     .build()?;
//! let ctx = service.login("alice");
//! ```

use std::sync::Arc;

use tracing::info;

use super::ServiceInstance;
use crate::Context;
use crate::EventManager;
use crate::Namespaces;
use crate::PropertyCollector;
use crate::Result;
use crate::Schema;
use crate::SimConfig;
use crate::TaskManager;
use crate::ViewManager;

#[derive(Debug)]
pub struct ServiceBuilder {
    config: SimConfig,
    schema: Option<Arc<Schema>>,
}

impl ServiceBuilder {
    /// Starts from [`SimConfig::new`]: defaults, `CONFIG_PATH`, `VSIM__*`.
    pub fn new() -> Result<Self> {
        Ok(Self::from_config(SimConfig::new()?))
    }

    pub fn from_config(config: SimConfig) -> Self {
        Self { config, schema: None }
    }

    pub fn with_override_config(
        mut self,
        path: &str,
    ) -> Result<Self> {
        info!("with_override_config from: {}", path);
        self.config = self.config.with_override_config(path)?;
        Ok(self)
    }

    /// Replaces the built-in type table.
    pub fn schema(
        mut self,
        schema: Arc<Schema>,
    ) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn build(self) -> Result<ServiceInstance> {
        let config = self.config.validate()?;
        let schema = self.schema.unwrap_or_else(Schema::vim);

        let namespaces = Namespaces::new(schema);
        let registry = namespaces.get_or_create(&config.registry.namespace);
        let ctx = Context::internal(registry.clone());

        let property_collector = PropertyCollector::new(&ctx, config.property_collector.clone());
        let event_manager = EventManager::new(&ctx, config.history.clone());
        let task_manager = TaskManager::new(&ctx, config.history.clone());
        let view_manager = ViewManager::new(&ctx);

        info!(
            namespace = %config.registry.namespace,
            objects = registry.len(),
            "service instance ready"
        );
        Ok(ServiceInstance::new(
            config,
            namespaces,
            registry,
            property_collector,
            event_manager,
            task_manager,
            view_manager,
        ))
    }
}

//! Simulator configuration.
//!
//! Layered sources, later overriding earlier:
//! - Default values from code
//! - Configuration file named by `CONFIG_PATH`
//! - Environment variables with the `VSIM__` prefix
mod history;
mod property;
mod registry;
pub use history::*;
pub use property::*;
pub use registry::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

const ENV_PREFIX: &str = "VSIM";

/// Settings of one simulated server core.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SimConfig {
    /// Object store settings
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Live update paging and polling
    #[serde(default)]
    pub property_collector: PropertyCollectorConfig,
    /// Task and event history bounds
    #[serde(default)]
    pub history: HistoryConfig,
}

impl SimConfig {
    /// Loads defaults, then `CONFIG_PATH` (if set), then `VSIM__*` variables.
    ///
    /// Does not validate; call [`SimConfig::validate`] once all overrides
    /// are applied.
    ///
    /// ```ignore
    /// std::env::set_var("VSIM__HISTORY__MAX_TASK_COLLECTORS", "1");
    /// let cfg = SimConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Layers the file at `path` and the current environment over `self`.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(self) -> Result<Self> {
        self.registry.validate()?;
        self.property_collector.validate()?;
        self.history.validate()?;
        Ok(self)
    }
}

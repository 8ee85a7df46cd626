use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_NAMESPACE;
use crate::Error;
use crate::Result;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegistryConfig {
    /// Namespace of the primary registry
    ///
    /// Default: "vim25"
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "registry namespace cannot be empty".into(),
            )));
        }
        Ok(())
    }
}

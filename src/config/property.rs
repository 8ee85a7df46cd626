use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_MAX_OBJECT_UPDATES;
use crate::constants::DEFAULT_POLL_INTERVAL_MS;
use crate::Error;
use crate::Result;

/// Live-update policy of property collectors.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PropertyCollectorConfig {
    /// Upper bound on object updates in one `WaitForUpdatesEx` response.
    /// A client's `maxObjectUpdates` can only lower it.
    ///
    /// Default: 100
    #[serde(default = "default_max_object_updates")]
    pub max_object_updates: usize,

    /// How often a blocked wait drains queued registry mutations.
    ///
    /// Range: 1-10000
    /// Default: 20
    #[serde(default = "default_poll_interval_in_ms")]
    pub poll_interval_in_ms: u64,
}

fn default_max_object_updates() -> usize {
    DEFAULT_MAX_OBJECT_UPDATES
}

fn default_poll_interval_in_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for PropertyCollectorConfig {
    fn default() -> Self {
        Self {
            max_object_updates: default_max_object_updates(),
            poll_interval_in_ms: default_poll_interval_in_ms(),
        }
    }
}

impl PropertyCollectorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_in_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_object_updates == 0 {
            return Err(Error::Config(ConfigError::Message(
                "max_object_updates must be greater than 0".into(),
            )));
        }

        if !(1..=10_000).contains(&self.poll_interval_in_ms) {
            return Err(Error::Config(ConfigError::Message(format!(
                "poll_interval_in_ms must be between 1 and 10000, got {}",
                self.poll_interval_in_ms
            ))));
        }

        Ok(())
    }
}

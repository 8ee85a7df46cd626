//! Bounds of the task and event history subsystems.
//!
//! ```toml
//! [history]
//! default_page_size = 10
//! max_page_size = 1000
//! max_task_collectors = 32
//! ```

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_PAGE_SIZE;
use crate::constants::EVENT_HISTORY_FACTOR;
use crate::constants::MAX_EVENT_COLLECTORS;
use crate::constants::MAX_PAGE_SIZE;
use crate::constants::MAX_TASK_COLLECTORS;
use crate::Error;
use crate::Result;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HistoryConfig {
    /// Page size of a collector created without one, or set to 0
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Largest page a collector may hold; larger requests are clamped
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Live event history collectors allowed at once
    #[serde(default = "default_max_event_collectors")]
    pub max_event_collectors: usize,

    /// Live task history collectors allowed at once
    #[serde(default = "default_max_task_collectors")]
    pub max_task_collectors: usize,

    /// The event manager keeps `max_page_size * event_history_factor` events
    #[serde(default = "default_event_history_factor")]
    pub event_history_factor: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_max_page_size() -> usize {
    MAX_PAGE_SIZE
}
fn default_max_event_collectors() -> usize {
    MAX_EVENT_COLLECTORS
}
fn default_max_task_collectors() -> usize {
    MAX_TASK_COLLECTORS
}
fn default_event_history_factor() -> usize {
    EVENT_HISTORY_FACTOR
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_event_collectors: default_max_event_collectors(),
            max_task_collectors: default_max_task_collectors(),
            event_history_factor: default_event_history_factor(),
        }
    }
}

impl HistoryConfig {
    /// Size of the event manager's own log.
    pub fn event_history_size(&self) -> usize {
        self.max_page_size.saturating_mul(self.event_history_factor)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "max_page_size must be greater than 0".into(),
            )));
        }

        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(Error::Config(ConfigError::Message(format!(
                "default_page_size must be between 1 and max_page_size ({}), got {}",
                self.max_page_size, self.default_page_size
            ))));
        }

        if self.max_event_collectors == 0 || self.max_task_collectors == 0 {
            return Err(Error::Config(ConfigError::Message(
                "collector limits must be greater than 0".into(),
            )));
        }

        if self.event_history_factor == 0 {
            return Err(Error::Config(ConfigError::Message(
                "event_history_factor must be greater than 0".into(),
            )));
        }

        Ok(())
    }
}

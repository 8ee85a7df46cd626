//! Filter shapes of the task and event history collectors.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::ManagedObjectReference;

/// Which part of the inventory below an entity a filter covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecursionOption {
    #[serde(rename = "self")]
    Itself,
    Children,
    #[default]
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityFilter {
    pub entity: ManagedObjectReference,
    #[serde(default)]
    pub recursion: RecursionOption,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNameFilter {
    #[serde(default)]
    pub system_user: bool,
    #[serde(default)]
    pub user_list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityFilter>,
    /// Event type names; supertypes match their subtypes
    #[serde(default)]
    pub event_type_id: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<UserNameFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskInfoState {
    Queued,
    Running,
    Success,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityFilter>,
    #[serde(default)]
    pub state: Vec<TaskInfoState>,
}

impl EntityFilter {
    pub fn new(
        entity: ManagedObjectReference,
        recursion: RecursionOption,
    ) -> Self {
        Self { entity, recursion }
    }
}

impl EventFilterSpec {
    pub fn for_entity(
        entity: ManagedObjectReference,
        recursion: RecursionOption,
    ) -> Self {
        Self {
            entity: Some(EntityFilter::new(entity, recursion)),
            ..Default::default()
        }
    }

    pub fn for_types(types: &[&str]) -> Self {
        Self {
            event_type_id: types.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }
}

impl TaskInfoState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskInfoState::Queued => "queued",
            TaskInfoState::Running => "running",
            TaskInfoState::Success => "success",
            TaskInfoState::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(TaskInfoState::Queued),
            "running" => Some(TaskInfoState::Running),
            "success" => Some(TaskInfoState::Success),
            "error" => Some(TaskInfoState::Error),
            _ => None,
        }
    }

    /// No further transitions are allowed.
    pub fn is_done(&self) -> bool {
        matches!(self, TaskInfoState::Success | TaskInfoState::Error)
    }
}

impl fmt::Display for TaskInfoState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

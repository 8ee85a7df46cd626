use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::scope::in_scope;
use super::HistoryKind;
use super::HistoryManager;
use crate::config::HistoryConfig;
use crate::utils::time::timestamp_millis;
use crate::Context;
use crate::DataObject;
use crate::Fault;
use crate::FaultResult;
use crate::ManagedObject;
use crate::ManagedObjectReference;
use crate::PropertyChange;
use crate::RegistryObserver;
use crate::TaskFilterSpec;
use crate::TaskInfoState;
use crate::Value;

const TASK_KIND: &str = "Task";
const RECENT_TASK_PROPERTY: &str = "recentTask";

/// Tasks are recorded by reference; pages show their current `info`.
#[derive(Debug)]
pub struct TaskKind;

impl HistoryKind for TaskKind {
    type Item = ManagedObjectReference;
    type Filter = TaskFilterSpec;

    const COLLECTOR_KIND: &'static str = "TaskHistoryCollector";

    fn matches(
        ctx: &Context,
        filter: &TaskFilterSpec,
        task: &ManagedObjectReference,
    ) -> bool {
        let Some(info) = task_info(ctx, task) else {
            return false;
        };
        if !filter.state.is_empty() {
            let state = info.get("state").and_then(Value::as_str).and_then(TaskInfoState::parse);
            if !state.map(|s| filter.state.contains(&s)).unwrap_or(false) {
                return false;
            }
        }
        match &filter.entity {
            Some(entity) => {
                let target: Vec<_> = info.get("entity").and_then(Value::as_reference).cloned().into_iter().collect();
                in_scope(ctx, entity, &target)
            }
            None => true,
        }
    }

    fn render(
        ctx: &Context,
        task: &ManagedObjectReference,
    ) -> Option<Value> {
        task_info(ctx, task).map(Value::Data)
    }
}

fn task_info(
    ctx: &Context,
    task: &ManagedObjectReference,
) -> Option<DataObject> {
    ctx.registry()
        .snapshot(task)?
        .get("info")
        .and_then(Value::as_data)
        .cloned()
}

/// Task lifecycle plus the task history.
///
/// Registered as a registry observer: every stored `Task` is recorded in
/// the history and in `recentTask`, updates republish the collectors
/// showing it and removal drops it from `recentTask`.
#[derive(Debug)]
pub struct TaskManager {
    reference: ManagedObjectReference,
    history: HistoryManager<TaskKind>,
}

impl TaskManager {
    /// Stores `TaskManager:TaskManager` and starts observing the registry.
    pub fn new(
        ctx: &Context,
        config: HistoryConfig,
    ) -> Arc<Self> {
        let reference = ctx.registry().put(
            ctx,
            ManagedObject::with_reference(ManagedObjectReference::new("TaskManager", "TaskManager"))
                .with_property("maxCollector", config.max_task_collectors as i64),
        );
        let history = HistoryManager::new(config.clone(), config.max_page_size, config.max_task_collectors);
        let manager = Arc::new(Self { reference, history });
        ctx.registry().add_observer(manager.clone());
        manager
    }

    pub fn reference(&self) -> &ManagedObjectReference {
        &self.reference
    }

    pub fn history(&self) -> &HistoryManager<TaskKind> {
        &self.history
    }

    pub fn recent_tasks(
        &self,
        ctx: &Context,
    ) -> Vec<ManagedObjectReference> {
        ctx.registry()
            .snapshot(&self.reference)
            .map(|o| o.references(RECENT_TASK_PROPERTY))
            .unwrap_or_default()
    }

    pub fn create_collector_for_tasks(
        &self,
        ctx: &Context,
        filter: TaskFilterSpec,
    ) -> FaultResult<ManagedObjectReference> {
        self.history.create_collector(ctx, filter, 0)
    }

    /// Stores a queued task running `description_id` against `entity`.
    pub fn create_task(
        &self,
        ctx: &Context,
        entity: &ManagedObjectReference,
        description_id: &str,
    ) -> ManagedObjectReference {
        let registry = ctx.registry();
        let reference = registry.new_reference(TASK_KIND);
        let entity_name = ctx
            .snapshot(entity)
            .and_then(|o| o.name().map(str::to_string))
            .unwrap_or_else(|| entity.value.clone());

        let info = DataObject::new("TaskInfo")
            .with("key", reference.value.clone())
            .with("task", reference.clone())
            .with("descriptionId", description_id)
            .with("entity", entity.clone())
            .with("entityName", entity_name)
            .with("state", TaskInfoState::Queued.as_str())
            .with("cancelled", false)
            .with("cancelable", true)
            .with("queueTime", timestamp_millis())
            .with(
                "reason",
                DataObject::new("TaskReasonUser").with("userName", ctx.user_name().unwrap_or_default()),
            );

        debug!(task = %reference, %entity, description_id, "task created");
        registry.put(ctx, ManagedObject::with_reference(reference).with_property("info", info))
    }

    /// Moves a task to `state`. A finished task is `InvalidState`.
    pub fn set_task_state(
        &self,
        ctx: &Context,
        task: &ManagedObjectReference,
        state: TaskInfoState,
        result: Option<Value>,
        error: Option<Fault>,
    ) -> FaultResult<()> {
        let mut changes = vec![PropertyChange::assign("info.state", state.as_str())];
        match state {
            TaskInfoState::Running => changes.push(PropertyChange::assign("info.startTime", timestamp_millis())),
            TaskInfoState::Success | TaskInfoState::Error => {
                changes.push(PropertyChange::assign("info.completeTime", timestamp_millis()));
                if let Some(error) = error {
                    changes.push(PropertyChange::assign("info.error", fault_value(&error)));
                }
                if let Some(result) = result {
                    changes.push(PropertyChange::assign("info.result", result));
                }
            }
            TaskInfoState::Queued => {}
        }
        self.transition(ctx, task, |_| true, changes)?;
        debug!(%task, %state, "task state");
        Ok(())
    }

    /// Records progress of a running task.
    pub fn update_progress(
        &self,
        ctx: &Context,
        task: &ManagedObjectReference,
        percent_done: i32,
    ) -> FaultResult<()> {
        self.transition(
            ctx,
            task,
            |state| state == TaskInfoState::Running,
            vec![PropertyChange::assign("info.progress", percent_done)],
        )
    }

    /// Fails an unfinished task with `RequestCanceled`.
    pub fn cancel_task(
        &self,
        ctx: &Context,
        task: &ManagedObjectReference,
    ) -> FaultResult<()> {
        self.transition(
            ctx,
            task,
            |_| true,
            vec![
                PropertyChange::assign("info.cancelled", true),
                PropertyChange::assign("info.completeTime", timestamp_millis()),
                PropertyChange::assign("info.state", TaskInfoState::Error.as_str()),
                PropertyChange::assign("info.error", fault_value(&Fault::RequestCanceled)),
            ],
        )
    }

    /// Applies `changes` under the task's lock when the task is unfinished
    /// and its state passes `allowed`.
    fn transition(
        &self,
        ctx: &Context,
        task: &ManagedObjectReference,
        allowed: impl FnOnce(TaskInfoState) -> bool,
        changes: Vec<PropertyChange>,
    ) -> FaultResult<()> {
        let registry = ctx.registry();
        ctx.with_lock(task, || {
            let info = task_info(ctx, task).ok_or_else(|| Fault::not_found(task))?;
            let state = info
                .get("state")
                .and_then(Value::as_str)
                .and_then(TaskInfoState::parse)
                .ok_or(Fault::InvalidState)?;
            if state.is_done() || !allowed(state) {
                return Err(Fault::InvalidState);
            }
            registry.update(ctx, task, &changes)
        })
    }
}

impl RegistryObserver for TaskManager {
    fn put_object(
        &self,
        ctx: &Context,
        obj: &ManagedObject,
    ) {
        if obj.kind() != TASK_KIND {
            return;
        }
        let task = obj.reference().clone();
        self.history.push(ctx, task.clone());
        if let Err(e) = ctx
            .registry()
            .add_reference(ctx, &self.reference, RECENT_TASK_PROPERTY, &task)
        {
            warn!(%task, "recentTask not updated: {}", e);
        }
    }

    fn update_object(
        &self,
        ctx: &Context,
        obj: &ManagedObject,
        _changes: &[PropertyChange],
    ) {
        if obj.kind() == TASK_KIND {
            self.history.refresh(ctx, obj.reference());
        }
    }

    fn remove_object(
        &self,
        ctx: &Context,
        obj: &ManagedObject,
    ) {
        if obj.kind() != TASK_KIND {
            return;
        }
        if let Err(e) = ctx
            .registry()
            .remove_reference(ctx, &self.reference, RECENT_TASK_PROPERTY, obj.reference())
        {
            warn!(task = %obj.reference(), "recentTask not updated: {}", e);
        }
    }
}

/// `LocalizedMethodFault` value of `fault`.
fn fault_value(fault: &Fault) -> Value {
    DataObject::new("LocalizedMethodFault")
        .with("fault", fault.kind())
        .with("localizedMessage", fault.to_string())
        .into()
}

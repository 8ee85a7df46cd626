use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::manager::render;
use super::scope::in_scope;
use super::HistoryKind;
use super::HistoryManager;
use crate::config::HistoryConfig;
use crate::constants::INTERNAL_USER;
use crate::utils::time::timestamp_millis;
use crate::Context;
use crate::DataObject;
use crate::EventFilterSpec;
use crate::FaultResult;
use crate::ManagedObject;
use crate::ManagedObjectReference;
use crate::PropertyChange;
use crate::Schema;
use crate::Value;

/// Entity kind, event field, argument field, argument type.
const ENTITY_ARGUMENTS: &[(&str, &str, &str, &str)] = &[
    ("VirtualMachine", "vm", "vm", "VmEventArgument"),
    ("HostSystem", "host", "host", "HostEventArgument"),
    ("ComputeResource", "computeResource", "computeResource", "ComputeResourceEventArgument"),
    ("Datastore", "ds", "datastore", "DatastoreEventArgument"),
    ("Network", "net", "network", "NetworkEventArgument"),
    ("DistributedVirtualSwitch", "dvs", "dvs", "DvsEventArgument"),
    ("Datacenter", "datacenter", "datacenter", "DatacenterEventArgument"),
];

/// Events are data objects typed by their event class.
#[derive(Debug)]
pub struct EventKind;

impl HistoryKind for EventKind {
    type Item = DataObject;
    type Filter = EventFilterSpec;

    const COLLECTOR_KIND: &'static str = "EventHistoryCollector";

    fn matches(
        ctx: &Context,
        filter: &EventFilterSpec,
        event: &DataObject,
    ) -> bool {
        type_matches(ctx.registry().schema(), filter, event)
            && user_matches(filter, event)
            && filter
                .entity
                .as_ref()
                .map(|entity| in_scope(ctx, entity, &entity_arguments(event)))
                .unwrap_or(true)
    }

    fn render(
        _ctx: &Context,
        event: &DataObject,
    ) -> Option<Value> {
        Some(Value::Data(event.clone()))
    }
}

fn type_matches(
    schema: &Schema,
    filter: &EventFilterSpec,
    event: &DataObject,
) -> bool {
    if filter.event_type_id.is_empty() {
        return true;
    }
    let Some(kind) = event.type_name() else {
        return false;
    };
    filter.event_type_id.iter().any(|id| schema.is_a(kind, id))
}

fn user_matches(
    filter: &EventFilterSpec,
    event: &DataObject,
) -> bool {
    let Some(users) = &filter.user_name else {
        return true;
    };
    let user = event.get("userName").and_then(Value::as_str).unwrap_or_default();
    users.user_list.iter().any(|u| u == user) || (users.system_user && user == INTERNAL_USER)
}

/// Entities an event refers to through its typed argument fields.
pub fn entity_arguments(event: &DataObject) -> Vec<ManagedObjectReference> {
    ENTITY_ARGUMENTS
        .iter()
        .filter_map(|(_, field, inner, _)| match event.get(field)? {
            Value::Ref(reference) => Some(reference.clone()),
            Value::Data(argument) => argument.get(inner)?.as_reference().cloned(),
            _ => None,
        })
        .collect()
}

/// A new event of `event_type` about `entity`, carrying the entity and its
/// datacenter as arguments.
pub fn entity_event(
    ctx: &Context,
    event_type: &str,
    entity: &ManagedObjectReference,
) -> DataObject {
    let mut event = DataObject::new(event_type);
    let registry = ctx.registry();
    let schema = registry.schema();

    let mut arguments = vec![entity.clone()];
    arguments.extend(registry.entity_parent(entity, "Datacenter"));
    for reference in arguments {
        let Some((_, field, inner, kind)) = ENTITY_ARGUMENTS.iter().find(|(k, ..)| schema.is_a(&reference.kind, k))
        else {
            continue;
        };
        let name = ctx
            .snapshot(&reference)
            .and_then(|o| o.name().map(str::to_string))
            .unwrap_or_else(|| reference.value.clone());
        event.set(*field, DataObject::new(*kind).with(*inner, reference.clone()).with("name", name));
    }
    event
}

/// Event log and event history collectors.
#[derive(Debug)]
pub struct EventManager {
    reference: ManagedObjectReference,
    key: AtomicI64,
    history: HistoryManager<EventKind>,
}

impl EventManager {
    /// Stores the service-wide `EventManager:EventManager` object.
    pub fn new(
        ctx: &Context,
        config: HistoryConfig,
    ) -> Arc<Self> {
        let reference = ctx.registry().put(
            ctx,
            ManagedObject::with_reference(ManagedObjectReference::new("EventManager", "EventManager"))
                .with_property("maxCollector", config.max_event_collectors as i64),
        );
        let history = HistoryManager::new(
            config.clone(),
            config.event_history_size(),
            config.max_event_collectors,
        );
        Arc::new(Self {
            reference,
            key: AtomicI64::new(0),
            history,
        })
    }

    pub fn reference(&self) -> &ManagedObjectReference {
        &self.reference
    }

    pub fn history(&self) -> &HistoryManager<EventKind> {
        &self.history
    }

    /// Stamps `event` with a key, chain id, creation time and the caller's
    /// user name, then records it. Returns the stored event.
    pub fn post_event(
        &self,
        ctx: &Context,
        mut event: DataObject,
    ) -> DataObject {
        let key = self.key.fetch_add(1, Ordering::Relaxed) + 1;
        event.set("key", key);
        if event.get("chainId").is_none() {
            event.set("chainId", key);
        }
        event.set("createdTime", timestamp_millis());
        event.set("userName", ctx.user_name().unwrap_or_default());

        debug!(key, kind = event.type_name().unwrap_or_default(), "event posted");
        self.history.push(ctx, event.clone());
        if let Err(e) = ctx
            .registry()
            .update(ctx, &self.reference, &[PropertyChange::assign("latestEvent", event.clone())])
        {
            warn!(key, "latestEvent not published: {}", e);
        }
        event
    }

    pub fn create_collector_for_events(
        &self,
        ctx: &Context,
        filter: EventFilterSpec,
    ) -> FaultResult<ManagedObjectReference> {
        let page_size = filter.max_count.unwrap_or(0);
        self.history.create_collector(ctx, filter, page_size)
    }

    /// Latest page of a throwaway collector over `filter`.
    pub fn query_events(
        &self,
        ctx: &Context,
        filter: EventFilterSpec,
    ) -> FaultResult<Vec<Value>> {
        let page_size = self.history.page_size(filter.max_count.unwrap_or(0))?;
        let _slot = self.history.reserve()?;
        let collector = self.history.build(ctx, filter, page_size);
        match render(ctx, &collector) {
            Value::Array(events) => Ok(events),
            _ => Ok(Vec::new()),
        }
    }
}

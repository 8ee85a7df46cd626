//! Type table of the emulated protocol.
//!
//! Every managed object kind and data object type is registered once with its
//! direct supertype and the fields it declares. Property specs typed for a
//! supertype match any subtype instance through [`Schema::is_a`].

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use lazy_static::lazy_static;

use crate::Error;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    /// Server-side object addressed by reference
    Managed,
    /// Plain value carried inside properties
    Data,
}

#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: String,
    pub base: Option<String>,
    pub category: TypeCategory,
    /// Fields declared by this type only
    pub fields: Vec<String>,
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: Vec<TypeInfo>,
}

/// Immutable type table. Supertype chains are resolved at build time.
#[derive(Debug)]
pub struct Schema {
    types: HashMap<String, TypeInfo>,
    /// kind -> [kind, base, base's base, ...]
    chains: HashMap<String, Vec<String>>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn managed(
        self,
        name: &str,
        base: Option<&str>,
        fields: &[&str],
    ) -> Self {
        self.register(name, base, TypeCategory::Managed, fields)
    }

    pub fn data(
        self,
        name: &str,
        base: Option<&str>,
        fields: &[&str],
    ) -> Self {
        self.register(name, base, TypeCategory::Data, fields)
    }

    fn register(
        mut self,
        name: &str,
        base: Option<&str>,
        category: TypeCategory,
        fields: &[&str],
    ) -> Self {
        self.types.push(TypeInfo {
            name: name.to_string(),
            base: base.map(str::to_string),
            category,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    /// Fails on duplicate names, unknown base types and inheritance cycles.
    pub fn build(self) -> Result<Schema> {
        let mut types = HashMap::with_capacity(self.types.len());
        for info in self.types {
            if types.contains_key(&info.name) {
                return Err(Error::InvalidSchema(format!("duplicate type {}", info.name)));
            }
            types.insert(info.name.clone(), info);
        }

        let mut chains = HashMap::with_capacity(types.len());
        for name in types.keys() {
            let mut chain = vec![name.clone()];
            let mut seen = HashSet::from([name.as_str()]);
            let mut current = &types[name];

            while let Some(base) = &current.base {
                let Some(next) = types.get(base) else {
                    return Err(Error::InvalidSchema(format!(
                        "{} extends unknown type {}",
                        current.name, base
                    )));
                };
                if !seen.insert(next.name.as_str()) {
                    return Err(Error::InvalidSchema(format!("inheritance cycle through {name}")));
                }
                chain.push(next.name.clone());
                current = next;
            }
            chains.insert(name.clone(), chain);
        }

        Ok(Schema { types, chains })
    }
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Shared built-in table of the emulated API's core types.
    pub fn vim() -> Arc<Schema> {
        VIM_SCHEMA.clone()
    }

    pub fn contains(
        &self,
        kind: &str,
    ) -> bool {
        self.types.contains_key(kind)
    }

    pub fn get(
        &self,
        kind: &str,
    ) -> Option<&TypeInfo> {
        self.types.get(kind)
    }

    pub fn is_managed(
        &self,
        kind: &str,
    ) -> bool {
        matches!(self.types.get(kind), Some(t) if t.category == TypeCategory::Managed)
    }

    /// True when `kind` equals `ancestor` or inherits from it.
    pub fn is_a(
        &self,
        kind: &str,
        ancestor: &str,
    ) -> bool {
        if kind == ancestor {
            return true;
        }
        self.chains
            .get(kind)
            .map(|chain| chain.iter().any(|t| t == ancestor))
            .unwrap_or(false)
    }

    /// Supertype chain starting with `kind` itself.
    pub fn ancestors<'a>(
        &'a self,
        kind: &'a str,
    ) -> Vec<&'a str> {
        match self.chains.get(kind) {
            Some(chain) => chain.iter().map(String::as_str).collect(),
            None => vec![kind],
        }
    }

    /// All fields of `kind`, base-type fields first.
    pub fn fields(
        &self,
        kind: &str,
    ) -> Vec<&str> {
        let Some(chain) = self.chains.get(kind) else {
            return Vec::new();
        };
        chain
            .iter()
            .rev()
            .flat_map(|t| self.types[t].fields.iter().map(String::as_str))
            .collect()
    }

    /// Whether `kind` or one of its supertypes declares `field`.
    /// Kinds missing from the table declare nothing.
    pub fn declares(
        &self,
        kind: &str,
        field: &str,
    ) -> bool {
        self.chains
            .get(kind)
            .map(|chain| chain.iter().any(|t| self.types[t].fields.iter().any(|f| f == field)))
            .unwrap_or(false)
    }
}

lazy_static! {
    static ref VIM_SCHEMA: Arc<Schema> = Arc::new(vim_types().build().expect("built-in schema is valid"));
}

fn vim_types() -> SchemaBuilder {
    SchemaBuilder::new()
        // Inventory
        .managed("ExtensibleManagedObject", None, &["value", "availableField"])
        .managed(
            "ManagedEntity",
            Some("ExtensibleManagedObject"),
            &[
                "parent",
                "customValue",
                "overallStatus",
                "configStatus",
                "configIssue",
                "effectiveRole",
                "permission",
                "name",
                "disabledMethod",
                "recentTask",
                "declaredAlarmState",
                "triggeredAlarmState",
                "alarmActionsEnabled",
                "tag",
            ],
        )
        .managed("Folder", Some("ManagedEntity"), &["childType", "childEntity", "namespace"])
        .managed("StoragePod", Some("Folder"), &["summary", "podStorageDrsEntry"])
        .managed(
            "Datacenter",
            Some("ManagedEntity"),
            &[
                "vmFolder",
                "hostFolder",
                "datastoreFolder",
                "networkFolder",
                "datastore",
                "network",
                "configuration",
            ],
        )
        .managed(
            "ComputeResource",
            Some("ManagedEntity"),
            &[
                "resourcePool",
                "host",
                "datastore",
                "network",
                "summary",
                "environmentBrowser",
                "configurationEx",
            ],
        )
        .managed(
            "ClusterComputeResource",
            Some("ComputeResource"),
            &["configuration", "recommendation", "drsRecommendation", "migrationHistory", "actionHistory"],
        )
        .managed(
            "HostSystem",
            Some("ManagedEntity"),
            &[
                "runtime",
                "summary",
                "hardware",
                "capability",
                "config",
                "vm",
                "datastore",
                "network",
                "datastoreBrowser",
                "systemResources",
            ],
        )
        .managed(
            "ResourcePool",
            Some("ManagedEntity"),
            &["summary", "runtime", "owner", "resourcePool", "vm", "config", "childConfiguration"],
        )
        .managed(
            "VirtualApp",
            Some("ResourcePool"),
            &["parentFolder", "datastore", "network", "vAppConfig", "parentVApp", "childLink"],
        )
        .managed(
            "VirtualMachine",
            Some("ManagedEntity"),
            &[
                "capability",
                "config",
                "layout",
                "layoutEx",
                "storage",
                "environmentBrowser",
                "resourcePool",
                "parentVApp",
                "resourceConfig",
                "runtime",
                "guest",
                "summary",
                "datastore",
                "network",
                "snapshot",
                "rootSnapshot",
                "guestHeartbeatStatus",
            ],
        )
        .managed(
            "Datastore",
            Some("ManagedEntity"),
            &["info", "summary", "host", "vm", "browser", "capability", "iormConfiguration"],
        )
        .managed("Network", Some("ManagedEntity"), &["summary", "host", "vm"])
        .managed("DistributedVirtualPortgroup", Some("Network"), &["key", "config", "portKeys"])
        .managed("OpaqueNetwork", Some("Network"), &["capability", "extraConfig"])
        .managed(
            "DistributedVirtualSwitch",
            Some("ManagedEntity"),
            &["uuid", "capability", "summary", "config", "networkResourcePool", "portgroup", "runtime"],
        )
        .managed("VmwareDistributedVirtualSwitch", Some("DistributedVirtualSwitch"), &[])
        // Core services
        .managed("Task", Some("ExtensibleManagedObject"), &["info"])
        .managed("HistoryCollector", None, &["filter"])
        .managed("TaskHistoryCollector", Some("HistoryCollector"), &["latestPage"])
        .managed("EventHistoryCollector", Some("HistoryCollector"), &["latestPage"])
        .managed("PropertyCollector", None, &["filter"])
        .managed("PropertyFilter", None, &["spec", "partialUpdates"])
        .managed("View", None, &[])
        .managed("ManagedObjectView", Some("View"), &["view"])
        .managed("ContainerView", Some("ManagedObjectView"), &["container", "type", "recursive"])
        .managed("ListView", Some("ManagedObjectView"), &[])
        .managed("ViewManager", None, &["viewList"])
        .managed("TaskManager", None, &["recentTask", "description", "maxCollector"])
        .managed("EventManager", None, &["description", "latestEvent", "maxCollector"])
        .managed(
            "SessionManager",
            None,
            &["sessionList", "currentSession", "message", "defaultLocale"],
        )
        .managed("ServiceInstance", None, &["serverClock", "capability", "content"])
        // Data objects
        .data("DynamicData", None, &[])
        .data(
            "Event",
            Some("DynamicData"),
            &[
                "key",
                "chainId",
                "createdTime",
                "userName",
                "datacenter",
                "computeResource",
                "host",
                "vm",
                "ds",
                "net",
                "dvs",
                "fullFormattedMessage",
                "changeTag",
            ],
        )
        .data("GeneralEvent", Some("Event"), &["message"])
        .data("GeneralUserEvent", Some("GeneralEvent"), &["entity"])
        .data("SessionEvent", Some("Event"), &[])
        .data(
            "UserLoginSessionEvent",
            Some("SessionEvent"),
            &["ipAddress", "userAgent", "locale", "sessionId"],
        )
        .data("UserLogoutSessionEvent", Some("SessionEvent"), &["ipAddress", "userAgent", "sessionId"])
        .data("TaskEvent", Some("Event"), &["info"])
        .data("VmEvent", Some("Event"), &["template"])
        .data("VmBeingCreatedEvent", Some("VmEvent"), &["configSpec"])
        .data("VmCreatedEvent", Some("VmEvent"), &[])
        .data("VmStartingEvent", Some("VmEvent"), &[])
        .data("VmPoweredOnEvent", Some("VmEvent"), &[])
        .data("VmStoppingEvent", Some("VmEvent"), &[])
        .data("VmPoweredOffEvent", Some("VmEvent"), &[])
        .data("VmReconfiguredEvent", Some("VmEvent"), &["configSpec", "configChanges"])
        .data("VmRemovedEvent", Some("VmEvent"), &[])
        .data("HostEvent", Some("Event"), &[])
        .data("HostConnectedEvent", Some("HostEvent"), &[])
        .data("HostRemovedEvent", Some("HostEvent"), &[])
        .data(
            "TaskInfo",
            Some("DynamicData"),
            &[
                "key",
                "task",
                "name",
                "descriptionId",
                "entity",
                "entityName",
                "state",
                "cancelled",
                "cancelable",
                "error",
                "result",
                "progress",
                "queueTime",
                "startTime",
                "completeTime",
                "eventChainId",
                "reason",
                "activationId",
            ],
        )
        .data(
            "VirtualMachineRuntimeInfo",
            Some("DynamicData"),
            &["host", "connectionState", "powerState", "bootTime", "maxCpuUsage", "maxMemoryUsage"],
        )
        .data(
            "VirtualMachineConfigInfo",
            Some("DynamicData"),
            &["name", "guestId", "uuid", "instanceUuid", "template", "annotation", "hardware", "extraConfig"],
        )
        .data("VirtualHardware", Some("DynamicData"), &["numCPU", "memoryMB", "device"])
        .data(
            "VirtualDevice",
            Some("DynamicData"),
            &["key", "deviceInfo", "backing", "controllerKey", "unitNumber"],
        )
        .data("VirtualDisk", Some("VirtualDevice"), &["capacityInKB"])
        .data("VirtualEthernetCard", Some("VirtualDevice"), &["macAddress", "addressType"])
        .data("Description", Some("DynamicData"), &["label", "summary"])
        .data("OptionValue", Some("DynamicData"), &["key", "value"])
        .data(
            "HostRuntimeInfo",
            Some("DynamicData"),
            &["connectionState", "powerState", "inMaintenanceMode", "bootTime"],
        )
}


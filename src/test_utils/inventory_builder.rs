use crate::Context;
use crate::DataObject;
use crate::ManagedObject;
use crate::ManagedObjectReference;
use crate::PropertyChange;
use crate::Value;

/// References of a small inventory:
///
/// ```text
/// Folder "Datacenters"
/// └── Datacenter "DC0"
///     ├── vm Folder ─ VirtualMachine "DC0_C0_RP0_VM0"
///     ├── host Folder ─ Cluster "DC0_C0" ─ HostSystem "DC0_C0_H0" ─ vm
///     │                                └── ResourcePool "Resources" ─ vm
///     ├── datastore Folder
///     └── network Folder
/// ```
#[derive(Debug, Clone)]
pub struct Inventory {
    pub root: ManagedObjectReference,
    pub datacenter: ManagedObjectReference,
    pub vm_folder: ManagedObjectReference,
    pub host_folder: ManagedObjectReference,
    pub datastore_folder: ManagedObjectReference,
    pub network_folder: ManagedObjectReference,
    pub cluster: ManagedObjectReference,
    pub host: ManagedObjectReference,
    pub pool: ManagedObjectReference,
    pub vm: ManagedObjectReference,
}

pub struct InventoryBuilder {
    vms: usize,
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self { vms: 1 }
    }

    /// Number of virtual machines placed in the cluster (at least one).
    pub fn vms(
        mut self,
        count: usize,
    ) -> Self {
        self.vms = count.max(1);
        self
    }

    pub fn build(
        self,
        ctx: &Context,
    ) -> Inventory {
        let map = ctx.registry();

        let root = map.put(
            ctx,
            ManagedObject::with_reference(ManagedObjectReference::new("Folder", "group-d1"))
                .with_property("name", "Datacenters")
                .with_property("childType", vec![Value::from("Folder"), Value::from("Datacenter")]),
        );

        let datacenter = map.put_entity(ctx, &root, ManagedObject::new("Datacenter").with_property("name", "DC0"));
        map.add_reference(ctx, &root, "childEntity", &datacenter).unwrap();

        let folder = |name: &str| map.put_entity(ctx, &datacenter, ManagedObject::new("Folder").with_property("name", name));
        let vm_folder = folder("vm");
        let host_folder = folder("host");
        let datastore_folder = folder("datastore");
        let network_folder = folder("network");
        map.update(
            ctx,
            &datacenter,
            &[
                PropertyChange::assign("vmFolder", vm_folder.clone()),
                PropertyChange::assign("hostFolder", host_folder.clone()),
                PropertyChange::assign("datastoreFolder", datastore_folder.clone()),
                PropertyChange::assign("networkFolder", network_folder.clone()),
            ],
        )
        .unwrap();

        let cluster = map.put_entity(
            ctx,
            &host_folder,
            ManagedObject::new("ClusterComputeResource").with_property("name", "DC0_C0"),
        );
        map.add_reference(ctx, &host_folder, "childEntity", &cluster).unwrap();

        let host = map.put_entity(
            ctx,
            &cluster,
            ManagedObject::new("HostSystem")
                .with_property("name", "DC0_C0_H0")
                .with_property(
                    "runtime",
                    DataObject::new("HostRuntimeInfo")
                        .with("connectionState", "connected")
                        .with("inMaintenanceMode", false),
                ),
        );
        map.add_reference(ctx, &cluster, "host", &host).unwrap();

        let pool = map.put_entity(ctx, &cluster, ManagedObject::new("ResourcePool").with_property("name", "Resources"));
        map.update(ctx, &cluster, &[PropertyChange::assign("resourcePool", pool.clone())]).unwrap();

        let mut vms = Vec::new();
        for i in 0..self.vms {
            let vm = map.put_entity(ctx, &vm_folder, virtual_machine(&format!("DC0_C0_RP0_VM{i}"), &host));
            map.add_reference(ctx, &vm_folder, "childEntity", &vm).unwrap();
            map.add_reference(ctx, &host, "vm", &vm).unwrap();
            map.add_reference(ctx, &pool, "vm", &vm).unwrap();
            vms.push(vm);
        }

        Inventory {
            root,
            datacenter,
            vm_folder,
            host_folder,
            datastore_folder,
            network_folder,
            cluster,
            host,
            pool,
            vm: vms.swap_remove(0),
        }
    }
}

fn virtual_machine(
    name: &str,
    host: &ManagedObjectReference,
) -> ManagedObject {
    let disk = DataObject::new("VirtualDisk")
        .with("key", 2000i64)
        .with("capacityInKB", 1_048_576i64)
        .with("deviceInfo", DataObject::new("Description").with("label", "Hard disk 1"));
    let nic = DataObject::new("VirtualEthernetCard")
        .with("key", 4000i64)
        .with("macAddress", "00:0c:29:00:00:01")
        .with("deviceInfo", DataObject::new("Description").with("label", "Network adapter 1"));

    ManagedObject::new("VirtualMachine")
        .with_property("name", name)
        .with_property(
            "runtime",
            DataObject::new("VirtualMachineRuntimeInfo")
                .with("host", host.clone())
                .with("connectionState", "connected")
                .with("powerState", "poweredOff"),
        )
        .with_property(
            "config",
            DataObject::new("VirtualMachineConfigInfo")
                .with("name", name)
                .with("guestId", "otherGuest")
                .with(
                    "hardware",
                    DataObject::new("VirtualHardware")
                        .with("numCPU", 1i64)
                        .with("memoryMB", 32i64)
                        .with("device", vec![Value::from(disk), Value::from(nic)]),
                )
                .with(
                    "extraConfig",
                    vec![Value::from(
                        DataObject::new("OptionValue").with("key", "guestinfo.ip").with("value", "10.0.0.1"),
                    )],
                ),
        )
}

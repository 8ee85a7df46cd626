use vimsim::Context;
use vimsim::ManagedObject;
use vimsim::ManagedObjectReference;
use vimsim::ObjectSpec;
use vimsim::PropertyChange;
use vimsim::PropertyFilterSpec;
use vimsim::PropertySpec;
use vimsim::SelectionSpec;
use vimsim::ServiceBuilder;
use vimsim::ServiceInstance;
use vimsim::SimConfig;
use vimsim::TraversalSpec;

pub fn service() -> ServiceInstance {
    service_with(SimConfig::default())
}

pub fn service_with(config: SimConfig) -> ServiceInstance {
    ServiceBuilder::from_config(config)
        .build()
        .expect("default configuration builds")
}

/// Root folder, one datacenter, a cluster with one host and `vms` virtual
/// machines linked from the vm folder, the host and the cluster's pool.
pub struct Inventory {
    pub root: ManagedObjectReference,
    pub datacenter: ManagedObjectReference,
    pub vm_folder: ManagedObjectReference,
    pub cluster: ManagedObjectReference,
    pub host: ManagedObjectReference,
    pub pool: ManagedObjectReference,
    pub vms: Vec<ManagedObjectReference>,
}

pub fn build_inventory(
    ctx: &Context,
    vms: usize,
) -> Inventory {
    let map = ctx.registry();
    let root = map.put(
        ctx,
        ManagedObject::with_reference(ManagedObjectReference::new("Folder", "group-d1")).with_property("name", "Datacenters"),
    );
    let datacenter = map.put_entity(ctx, &root, ManagedObject::new("Datacenter").with_property("name", "DC0"));
    map.add_reference(ctx, &root, "childEntity", &datacenter).unwrap();

    let vm_folder = map.put_entity(ctx, &datacenter, ManagedObject::new("Folder").with_property("name", "vm"));
    let host_folder = map.put_entity(ctx, &datacenter, ManagedObject::new("Folder").with_property("name", "host"));
    map.update(
        ctx,
        &datacenter,
        &[
            PropertyChange::assign("vmFolder", vm_folder.clone()),
            PropertyChange::assign("hostFolder", host_folder.clone()),
        ],
    )
    .unwrap();

    let cluster = map.put_entity(
        ctx,
        &host_folder,
        ManagedObject::new("ClusterComputeResource").with_property("name", "DC0_C0"),
    );
    map.add_reference(ctx, &host_folder, "childEntity", &cluster).unwrap();
    let host = map.put_entity(ctx, &cluster, ManagedObject::new("HostSystem").with_property("name", "DC0_C0_H0"));
    map.add_reference(ctx, &cluster, "host", &host).unwrap();
    let pool = map.put_entity(ctx, &cluster, ManagedObject::new("ResourcePool").with_property("name", "Resources"));
    map.update(ctx, &cluster, &[PropertyChange::assign("resourcePool", pool.clone())]).unwrap();

    let vms = (0..vms)
        .map(|i| {
            let vm = add_vm(ctx, &vm_folder, &format!("vm{i}"));
            map.add_reference(ctx, &host, "vm", &vm).unwrap();
            map.add_reference(ctx, &pool, "vm", &vm).unwrap();
            vm
        })
        .collect();

    Inventory {
        root,
        datacenter,
        vm_folder,
        cluster,
        host,
        pool,
        vms,
    }
}

pub fn add_vm(
    ctx: &Context,
    folder: &ManagedObjectReference,
    name: &str,
) -> ManagedObjectReference {
    let map = ctx.registry();
    let vm = map.put_entity(
        ctx,
        folder,
        ManagedObject::new("VirtualMachine")
            .with_property("name", name)
            .with_property(
                "runtime",
                vimsim::DataObject::new("VirtualMachineRuntimeInfo").with("powerState", "poweredOff"),
            ),
    );
    map.add_reference(ctx, folder, "childEntity", &vm).unwrap();
    vm
}

/// Reaches every folder, datacenter and virtual machine below a root folder.
pub fn folder_traversal() -> SelectionSpec {
    TraversalSpec::new("visitFolders", "Folder", "childEntity")
        .select(SelectionSpec::named("visitFolders"))
        .select(
            TraversalSpec::new("dcToVm", "Datacenter", "vmFolder")
                .select(SelectionSpec::named("visitFolders"))
                .into(),
        )
        .into()
}

pub fn vm_filter(
    root: &ManagedObjectReference,
    paths: &[&str],
) -> PropertyFilterSpec {
    PropertyFilterSpec {
        prop_set: vec![PropertySpec::new("VirtualMachine", paths)],
        object_set: vec![ObjectSpec::new(root.clone()).select(folder_traversal())],
        report_missing_objects_in_results: None,
    }
}

pub fn object_filter(
    obj: &ManagedObjectReference,
    paths: &[&str],
) -> PropertyFilterSpec {
    PropertyFilterSpec {
        prop_set: vec![PropertySpec::new(obj.kind.clone(), paths)],
        object_set: vec![ObjectSpec::new(obj.clone())],
        report_missing_objects_in_results: None,
    }
}

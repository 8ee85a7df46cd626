use crate::ManagedObjectReference;
use crate::ObjectSpec;
use crate::PropertyFilterSpec;
use crate::PropertySpec;
use crate::SelectionSpec;
use crate::TraversalSpec;

/// Select set reaching every entity below a root folder: folders,
/// datacenters, clusters, hosts, pools and their virtual machines.
pub fn inventory_traversal() -> SelectionSpec {
    TraversalSpec::new("visitFolders", "Folder", "childEntity")
        .select(SelectionSpec::named("visitFolders"))
        .select(
            TraversalSpec::new("dcToVm", "Datacenter", "vmFolder")
                .select(SelectionSpec::named("visitFolders"))
                .into(),
        )
        .select(
            TraversalSpec::new("dcToHost", "Datacenter", "hostFolder")
                .select(SelectionSpec::named("visitFolders"))
                .into(),
        )
        .select(TraversalSpec::new("crToHost", "ComputeResource", "host").into())
        .select(
            TraversalSpec::new("crToRp", "ComputeResource", "resourcePool")
                .select(SelectionSpec::named("rpToVm"))
                .into(),
        )
        .select(TraversalSpec::new("rpToVm", "ResourcePool", "vm").into())
        .into()
}

/// `paths` of every object of `kind` reachable from `root`.
pub fn inventory_filter(
    root: &ManagedObjectReference,
    kind: &str,
    paths: &[&str],
) -> PropertyFilterSpec {
    PropertyFilterSpec {
        prop_set: vec![PropertySpec::new(kind, paths)],
        object_set: vec![ObjectSpec::new(root.clone()).select(inventory_traversal())],
        report_missing_objects_in_results: None,
    }
}

/// `paths` of the single object `obj`.
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

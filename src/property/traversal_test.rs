use super::traversal::TraversalPlan;
use super::traversal::Walk;
use crate::test_utils::inventory_traversal;
use crate::test_utils::internal_ctx;
use crate::test_utils::InventoryBuilder;
use crate::Context;
use crate::Fault;
use crate::ManagedObjectReference;
use crate::ObjectSpec;
use crate::PropertyFilterSpec;
use crate::PropertySpec;
use crate::SelectionSpec;
use crate::TraversalSpec;

fn spec(object: ObjectSpec) -> PropertyFilterSpec {
    PropertyFilterSpec {
        prop_set: vec![PropertySpec::new("ManagedEntity", &["name"])],
        object_set: vec![object],
        report_missing_objects_in_results: None,
    }
}

fn walk(
    ctx: &Context,
    spec: &PropertyFilterSpec,
) -> Walk {
    let plan = TraversalPlan::compile(std::slice::from_ref(spec)).unwrap();
    let root = ctx.snapshot(&spec.object_set[0].obj).unwrap();
    let mut out = Walk::default();
    plan.walk(ctx, 0, &root, &mut out);
    out
}

#[test]
fn test_walk_reaches_whole_inventory_once() {
    let ctx = internal_ctx();
    let inv = InventoryBuilder::new().build(&ctx);

    let out = walk(&ctx, &spec(ObjectSpec::new(inv.root.clone()).select(inventory_traversal())));

    assert_eq!(
        out.refs,
        vec![
            inv.datacenter.clone(),
            inv.vm_folder.clone(),
            inv.vm.clone(),
            inv.host_folder.clone(),
            inv.cluster.clone(),
            inv.host.clone(),
            inv.pool.clone(),
        ]
    );
    assert!(out.sources.contains(&(inv.root.clone(), "childEntity".to_string())));
    assert!(out.sources.contains(&(inv.datacenter.clone(), "vmFolder".to_string())));
    assert!(out.sources.contains(&(inv.pool.clone(), "vm".to_string())));
}

#[test]
fn test_undefined_name_is_invalid_argument() {
    let spec = spec(ObjectSpec::new(ManagedObjectReference::new("Folder", "group-d1")).select(SelectionSpec::named("nope")));

    let err = TraversalPlan::compile(&[spec]).unwrap_err();
    assert_eq!(err, Fault::invalid_argument("undefined TraversalSpec name"));
}

#[test]
fn test_names_resolve_across_object_specs() {
    let ctx = internal_ctx();
    let inv = InventoryBuilder::new().build(&ctx);

    let spec = PropertyFilterSpec {
        prop_set: vec![PropertySpec::new("ManagedEntity", &["name"])],
        object_set: vec![
            ObjectSpec::new(inv.vm_folder.clone()).select(SelectionSpec::named("visitFolders")),
            ObjectSpec::new(inv.root.clone()).select(inventory_traversal()),
        ],
        report_missing_objects_in_results: None,
    };
    let plan = TraversalPlan::compile(std::slice::from_ref(&spec)).unwrap();

    let mut out = Walk::default();
    plan.walk(&ctx, 0, &ctx.snapshot(&inv.vm_folder).unwrap(), &mut out);
    assert_eq!(out.refs, vec![inv.vm.clone()]);
}

#[test]
fn test_first_definition_of_a_name_wins() {
    let ctx = internal_ctx();
    let inv = InventoryBuilder::new().build(&ctx);

    let object = ObjectSpec::new(inv.cluster.clone())
        .select(TraversalSpec::new("step", "ComputeResource", "host"))
        .select(TraversalSpec::new("step", "ComputeResource", "resourcePool"));

    let out = walk(&ctx, &spec(object));
    assert_eq!(out.refs, vec![inv.host.clone()]);
}

#[test]
fn test_skip_hides_step_but_descends() {
    let ctx = internal_ctx();
    let inv = InventoryBuilder::new().build(&ctx);

    let mut to_pool = TraversalSpec::new("crToRp", "ComputeResource", "resourcePool")
        .select(TraversalSpec::new("rpToVm", "ResourcePool", "vm").into());
    to_pool.skip = Some(true);

    let out = walk(&ctx, &spec(ObjectSpec::new(inv.cluster.clone()).select(to_pool)));
    assert_eq!(out.refs, vec![inv.vm.clone()]);
}

#[test]
fn test_step_applies_only_to_matching_kind() {
    let ctx = internal_ctx();
    let inv = InventoryBuilder::new().build(&ctx);

    let object = ObjectSpec::new(inv.root.clone()).select(TraversalSpec::new("dcToVm", "Datacenter", "vmFolder"));
    let out = walk(&ctx, &spec(object));

    assert!(out.refs.is_empty());
    assert!(out.sources.is_empty());
}

#[test]
fn test_dangling_references_are_reported_not_followed() {
    let ctx = internal_ctx();
    let inv = InventoryBuilder::new().build(&ctx);
    let ghost = ManagedObjectReference::new("Folder", "group-404");
    ctx.registry().add_reference(&ctx, &inv.root, "childEntity", &ghost).unwrap();

    let out = walk(&ctx, &spec(ObjectSpec::new(inv.root.clone()).select(inventory_traversal())));
    assert!(out.refs.contains(&ghost));
    assert_eq!(out.refs.len(), 8);
}

use vimsim::ObjectSpec;
use vimsim::ObjectUpdateKind;
use vimsim::PropertyFilterSpec;
use vimsim::PropertySpec;
use vimsim::TraversalSpec;
use vimsim::UpdateSet;

use crate::common::add_vm;
use crate::common::build_inventory;
use crate::common::service;

fn view_filter(view: &vimsim::ManagedObjectReference) -> PropertyFilterSpec {
    PropertyFilterSpec {
        prop_set: vec![PropertySpec::new("VirtualMachine", &["name"])],
        object_set: vec![ObjectSpec::new(view.clone())
            .skip()
            .select(TraversalSpec::new("traverseEntities", "ContainerView", "view"))],
        report_missing_objects_in_results: None,
    }
}

fn kinds(set: &UpdateSet) -> Vec<(ObjectUpdateKind, vimsim::ManagedObjectReference)> {
    set.filter_set
        .iter()
        .flat_map(|f| f.object_set.iter())
        .map(|u| (u.kind, u.obj.clone()))
        .collect()
}

#[test]
fn test_container_view_as_retrieval_root() {
    let service = service();
    let ctx = service.login("alice");
    let inventory = build_inventory(&ctx, 3);
    let view = service
        .view_manager()
        .create_container_view(&ctx, &inventory.root, &["VirtualMachine".to_string()], true)
        .unwrap();

    let objects = service
        .property_collector()
        .retrieve_properties(&ctx, &[view_filter(&view)])
        .unwrap();

    let found: Vec<_> = objects.iter().map(|o| o.obj.clone()).collect();
    assert_eq!(found, inventory.vms);
}

#[tokio::test(start_paused = true)]
async fn test_live_filter_follows_container_view() {
    let service = service();
    let ctx = service.login("alice");
    let inventory = build_inventory(&ctx, 1);
    let view = service
        .view_manager()
        .create_container_view(&ctx, &inventory.root, &["VirtualMachine".to_string()], true)
        .unwrap();
    let pc = service.property_collector().create_property_collector(&ctx);
    pc.create_filter(&ctx, view_filter(&view), false).unwrap();

    let baseline = pc.wait_for_updates(&ctx, "").await.unwrap();
    assert_eq!(kinds(&baseline), vec![(ObjectUpdateKind::Enter, inventory.vms[0].clone())]);

    let vm = add_vm(&ctx, &inventory.vm_folder, "late");
    let set = pc.wait_for_updates(&ctx, &baseline.version).await.unwrap();
    assert_eq!(kinds(&set), vec![(ObjectUpdateKind::Enter, vm.clone())]);

    ctx.registry().remove(&ctx, &vm);
    let set = pc.wait_for_updates(&ctx, &set.version).await.unwrap();
    assert_eq!(kinds(&set), vec![(ObjectUpdateKind::Leave, vm)]);
}

#[test]
fn test_list_view_round_trip() {
    let service = service();
    let ctx = service.login("alice");
    let inventory = build_inventory(&ctx, 2);
    let views = service.view_manager();

    let view = views.create_list_view(&ctx, &[inventory.vms[0].clone()]).unwrap();
    views
        .modify_list_view(&ctx, &view, &[inventory.vms[1].clone()], &[inventory.vms[0].clone()])
        .unwrap();
    assert_eq!(views.members(&ctx, &view).unwrap(), vec![inventory.vms[1].clone()]);

    views.destroy_view(&ctx, &view).unwrap();
    assert!(!service.registry().contains(&view));
}

use std::collections::HashSet;
use std::time::Duration;

use tracing_test::traced_test;
use vimsim::Fault;
use vimsim::ObjectUpdateKind;
use vimsim::PropertyChange;
use vimsim::UpdateSet;
use vimsim::WaitOptions;

use crate::common::build_inventory;
use crate::common::object_filter;
use crate::common::service;
use crate::common::vm_filter;

fn check(max_object_updates: Option<i32>) -> WaitOptions {
    WaitOptions {
        max_wait_seconds: Some(0),
        max_object_updates,
    }
}

fn updates(set: &UpdateSet) -> Vec<&vimsim::ObjectUpdate> {
    set.filter_set.iter().flat_map(|f| f.object_set.iter()).collect()
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_root_name_enter_then_modify() {
    let service = service();
    let ctx = service.login("alice");
    let inventory = build_inventory(&ctx, 1);
    let pc = service.property_collector().create_property_collector(&ctx);
    pc.create_filter(&ctx, object_filter(&inventory.root, &["name"]), false)
        .unwrap();

    let baseline = pc.wait_for_updates(&ctx, "").await.unwrap();
    let enter = updates(&baseline);
    assert_eq!(enter.len(), 1);
    assert_eq!(enter[0].kind, ObjectUpdateKind::Enter);
    assert_eq!(enter[0].obj, inventory.root);
    assert_eq!(enter[0].change_set, vec![PropertyChange::assign("name", "Datacenters")]);

    ctx.registry()
        .update(&ctx, &inventory.root, &[PropertyChange::assign("name", "Renamed")]).unwrap();

    let next = pc.wait_for_updates(&ctx, &baseline.version).await.unwrap();
    let modify = updates(&next);
    assert_eq!(modify.len(), 1);
    assert_eq!(modify[0].kind, ObjectUpdateKind::Modify);
    assert_eq!(modify[0].change_set, vec![PropertyChange::assign("name", "Renamed")]);
}

#[tokio::test(start_paused = true)]
async fn test_only_selected_paths_are_reported() {
    let service = service();
    let ctx = service.login("alice");
    let inventory = build_inventory(&ctx, 1);
    let vm = &inventory.vms[0];
    let pc = service.property_collector().create_property_collector(&ctx);
    pc.create_filter(&ctx, object_filter(vm, &["runtime"]), false).unwrap();
    let baseline = pc.wait_for_updates_ex(&ctx, "", &check(None)).await.unwrap().unwrap();

    // outside the selected paths
    ctx.registry().update(&ctx, vm, &[PropertyChange::assign("name", "other")]).unwrap();
    assert!(pc
        .wait_for_updates_ex(&ctx, &baseline.version, &check(None))
        .await
        .unwrap()
        .is_none());

    // dotted child of a selected path
    ctx.registry()
        .update(&ctx, vm, &[PropertyChange::assign("runtime.powerState", "poweredOn")]).unwrap();
    let set = pc
        .wait_for_updates_ex(&ctx, &baseline.version, &check(None))
        .await
        .unwrap()
        .unwrap();
    let modify = updates(&set);
    assert_eq!(modify.len(), 1);
    assert_eq!(modify[0].kind, ObjectUpdateKind::Modify);
    assert_eq!(&modify[0].obj, vm);
}

#[tokio::test(start_paused = true)]
async fn test_batches_respect_max_object_updates() {
    let service = service();
    let ctx = service.login("alice");
    let inventory = build_inventory(&ctx, 7);
    let pc = service.property_collector().create_property_collector(&ctx);
    pc.create_filter(&ctx, vm_filter(&inventory.root, &["name"]), false)
        .unwrap();

    let mut version = String::new();
    let mut seen = Vec::new();
    while let Some(set) = pc.wait_for_updates_ex(&ctx, &version, &check(Some(3))).await.unwrap() {
        let batch = updates(&set);
        assert!(batch.len() <= 3);
        seen.extend(batch.iter().map(|u| u.obj.clone()));
        version = set.version.clone();
        if set.truncated.is_none() {
            break;
        }
    }

    assert_eq!(seen.len(), 7);
    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(unique.len(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_new_and_removed_objects_enter_and_leave() {
    let service = service();
    let ctx = service.login("alice");
    let inventory = build_inventory(&ctx, 1);
    let pc = service.property_collector().create_property_collector(&ctx);
    pc.create_filter(&ctx, vm_filter(&inventory.root, &["name"]), false)
        .unwrap();
    let baseline = pc.wait_for_updates(&ctx, "").await.unwrap();

    let vm = crate::common::add_vm(&ctx, &inventory.vm_folder, "late");
    let set = pc.wait_for_updates(&ctx, &baseline.version).await.unwrap();
    let enter = updates(&set);
    assert_eq!(enter.len(), 1);
    assert_eq!(enter[0].kind, ObjectUpdateKind::Enter);
    assert_eq!(enter[0].obj, vm);

    ctx.registry()
        .remove_reference(&ctx, &inventory.vm_folder, "childEntity", &vm).unwrap();
    ctx.registry().remove(&ctx, &vm);
    let set = pc.wait_for_updates(&ctx, &set.version).await.unwrap();
    let leave = updates(&set);
    assert_eq!(leave.len(), 1);
    assert_eq!(leave[0].kind, ObjectUpdateKind::Leave);
    assert_eq!(leave[0].obj, vm);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_wait_wakes_on_change_and_cancels() {
    let service = service();
    let ctx = service.login("alice");
    let inventory = build_inventory(&ctx, 1);
    let vm = inventory.vms[0].clone();
    let pc = service.property_collector().create_property_collector(&ctx);
    pc.create_filter(&ctx, object_filter(&vm, &["name"]), false).unwrap();
    let baseline = pc.wait_for_updates(&ctx, "").await.unwrap();

    let waiter = {
        let pc = pc.clone();
        let ctx = ctx.fork();
        let version = baseline.version.clone();
        tokio::spawn(async move { pc.wait_for_updates(&ctx, &version).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    ctx.registry().update(&ctx, &vm, &[PropertyChange::assign("name", "woken")]).unwrap();

    let set = waiter.await.unwrap().unwrap();
    assert_eq!(updates(&set)[0].change_set, vec![PropertyChange::assign("name", "woken")]);

    let waiter = {
        let pc = pc.clone();
        let ctx = ctx.fork();
        let version = set.version.clone();
        tokio::spawn(async move { pc.wait_for_updates(&ctx, &version).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    pc.cancel_wait_for_updates();
    assert_eq!(waiter.await.unwrap().unwrap_err(), Fault::RequestCanceled);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_returns_nothing() {
    let service = service();
    let ctx = service.login("alice");
    let inventory = build_inventory(&ctx, 1);
    let pc = service.property_collector().create_property_collector(&ctx);
    pc.create_filter(&ctx, object_filter(&inventory.vms[0], &["name"]), false)
        .unwrap();
    let baseline = pc.wait_for_updates(&ctx, "").await.unwrap();

    let options = WaitOptions {
        max_wait_seconds: Some(5),
        max_object_updates: None,
    };
    let started = tokio::time::Instant::now();
    assert!(pc
        .wait_for_updates_ex(&ctx, &baseline.version, &options)
        .await
        .unwrap()
        .is_none());
    assert!(started.elapsed() >= Duration::from_secs(5));
}

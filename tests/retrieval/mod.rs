use std::collections::HashSet;

use vimsim::Context;
use vimsim::Fault;
use vimsim::ManagedObject;
use vimsim::RetrieveOptions;
use vimsim::Value;

use crate::common::build_inventory;
use crate::common::object_filter;
use crate::common::service;
use crate::common::vm_filter;

#[test]
fn test_retrieve_single_vm_name() {
    let service = service();
    let ctx = service.login("alice");
    let vm = ctx
        .registry()
        .put(&ctx, ManagedObject::new("VirtualMachine").with_property("name", "vm1"));

    let objects = service
        .property_collector()
        .retrieve_properties(&ctx, &[object_filter(&vm, &["name"])])
        .unwrap();

    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].obj, vm);
    assert_eq!(objects[0].get("name"), Some(&Value::from("vm1")));
    assert_eq!(objects[0].prop_set.len(), 1);
    assert!(objects[0].missing_set.is_empty());
}

#[test]
fn test_lookup_until_removed() {
    let service = service();
    let ctx = service.internal_context();
    let registry = ctx.registry();

    let vm = registry.put(&ctx, ManagedObject::new("VirtualMachine").with_property("name", "vm1"));
    assert_eq!(registry.get(&vm).unwrap().read().reference(), &vm);
    assert_eq!(registry.snapshot(&vm).unwrap().name(), Some("vm1"));

    registry.remove(&ctx, &vm);
    assert!(registry.get(&vm).is_none());
    assert_eq!(
        service
            .property_collector()
            .retrieve_properties(&ctx, &[object_filter(&vm, &["name"])])
            .unwrap_err(),
        Fault::not_found(&vm)
    );
}

#[test]
fn test_paged_retrieval_returns_each_object_once() {
    let service = service();
    let ctx = service.internal_context();
    let inventory = build_inventory(&ctx, 5);
    let pc = service.property_collector();

    let mut page = pc
        .retrieve_properties_ex(&ctx, &[vm_filter(&inventory.root, &["name"])], &RetrieveOptions {
            max_objects: Some(2),
        })
        .unwrap();
    let mut seen = Vec::new();
    loop {
        assert!(page.objects.len() <= 2);
        seen.extend(page.objects.iter().map(|o| o.obj.clone()));
        let Some(token) = page.token.clone() else {
            break;
        };
        page = pc.continue_retrieve_properties_ex(&token).unwrap();
    }

    assert_eq!(seen.len(), 5);
    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(unique.len(), 5);
    assert!(inventory.vms.iter().all(|vm| unique.contains(vm)));
}

#[test]
fn test_spent_token_is_rejected() {
    let service = service();
    let ctx = service.internal_context();
    let inventory = build_inventory(&ctx, 2);
    let pc = service.property_collector();

    let token = pc
        .retrieve_properties_ex(&ctx, &[vm_filter(&inventory.root, &["name"])], &RetrieveOptions {
            max_objects: Some(1),
        })
        .unwrap()
        .token
        .unwrap();
    let last = pc.continue_retrieve_properties_ex(&token).unwrap();
    assert!(last.token.is_none());

    assert_eq!(
        pc.continue_retrieve_properties_ex(&token).unwrap_err(),
        Fault::invalid_property("token")
    );
}

#[test]
fn test_fetch_and_missing_paths() {
    let service = service();
    let ctx = service.internal_context();
    let inventory = build_inventory(&ctx, 1);
    let vm = &inventory.vms[0];
    let pc = service.property_collector();

    assert_eq!(
        pc.fetch(&ctx, vm, "runtime.powerState").unwrap(),
        Some(Value::from("poweredOff"))
    );
    // declared but unset
    assert_eq!(pc.fetch(&ctx, vm, "config").unwrap(), None);

    let objects = pc
        .retrieve_properties(&ctx, &[object_filter(vm, &["name", "noSuchProperty"])])
        .unwrap();
    assert_eq!(objects[0].get("name"), Some(&Value::from("vm0")));
    assert_eq!(objects[0].missing_set.len(), 1);
    assert_eq!(objects[0].missing_set[0].path, "noSuchProperty");
}

#[test]
fn test_anonymous_reads_are_not_authenticated() {
    let service = service();
    let internal = service.internal_context();
    let inventory = build_inventory(&internal, 1);
    let anonymous = Context::anonymous(service.registry().clone());

    let objects = service
        .property_collector()
        .retrieve_properties(&anonymous, &[object_filter(&inventory.vms[0], &["name"])])
        .unwrap();

    assert!(objects[0].prop_set.is_empty());
    assert!(matches!(
        objects[0].missing_set[0].fault,
        Fault::NotAuthenticated { .. }
    ));
}

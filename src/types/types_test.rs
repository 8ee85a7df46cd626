use serde_json::json;

use super::*;
use crate::Fault;

#[test]
fn reference_display_and_parse() {
    let r = ManagedObjectReference::new("VirtualMachine", "vm-42");
    assert_eq!(r.to_string(), "VirtualMachine:vm-42");
    assert_eq!("VirtualMachine:vm-42".parse::<ManagedObjectReference>().unwrap(), r);
    assert_eq!(
        "vm-42".parse::<ManagedObjectReference>(),
        Err(Fault::invalid_argument("obj"))
    );
    assert!(ManagedObjectReference::new("Folder", "").is_unallocated());
}

#[test]
fn reference_uses_protocol_field_names() {
    let r = ManagedObjectReference::new("Folder", "group-d1");
    assert_eq!(serde_json::to_value(&r).unwrap(), json!({"type": "Folder", "value": "group-d1"}));
}

#[test]
fn value_helpers() {
    assert!(Value::from("").is_empty());
    assert!(!Value::from("x").is_empty());
    assert_eq!(Value::from(3i64).as_int(), Some(3));
    assert_eq!(Value::from(true).as_bool(), Some(true));

    let a = ManagedObjectReference::new("HostSystem", "host-1");
    let b = ManagedObjectReference::new("HostSystem", "host-2");
    let arr = Value::from(vec![a.clone(), b.clone()]);
    assert_eq!(arr.references(), vec![a.clone(), b]);
    assert_eq!(Value::from(a.clone()).references(), vec![a]);
    assert!(Value::from(1i64).references().is_empty());
}

#[test]
fn data_object_serializes_type_name() {
    let info = DataObject::new("TaskInfo").with("state", "queued").with("progress", 0i64);
    let v = serde_json::to_value(Value::from(info.clone())).unwrap();
    assert_eq!(v, json!({"_typeName": "TaskInfo", "progress": 0, "state": "queued"}));

    let back: Value = serde_json::from_value(v).unwrap();
    assert_eq!(back.as_data().unwrap().type_name(), Some("TaskInfo"));
    assert_eq!(back.as_data().unwrap().get("state"), Some(&Value::from("queued")));
}

#[test]
fn filter_spec_uses_protocol_field_names() {
    let spec = PropertyFilterSpec {
        prop_set: vec![PropertySpec::new("VirtualMachine", &["name"])],
        object_set: vec![ObjectSpec::new(ManagedObjectReference::new("Folder", "group-d1"))
            .skip()
            .select(TraversalSpec::new("visitFolders", "Folder", "childEntity")
                .select(SelectionSpec::named("visitFolders")))],
        report_missing_objects_in_results: Some(true),
    };
    let v = serde_json::to_value(&spec).unwrap();

    assert_eq!(v["propSet"][0]["type"], "VirtualMachine");
    assert_eq!(v["propSet"][0]["pathSet"][0], "name");
    assert_eq!(v["objectSet"][0]["skip"], true);
    assert_eq!(v["objectSet"][0]["selectSet"][0]["path"], "childEntity");
    assert_eq!(v["objectSet"][0]["selectSet"][0]["selectSet"][0], json!({"name": "visitFolders"}));
    assert_eq!(v["reportMissingObjectsInResults"], true);

    let back: PropertyFilterSpec = serde_json::from_value(v).unwrap();
    assert_eq!(back, spec);
}

#[test]
fn update_set_uses_protocol_field_names() {
    let update = UpdateSet {
        version: "1".into(),
        filter_set: vec![PropertyFilterUpdate {
            filter: ManagedObjectReference::new("PropertyFilter", "session[k]f"),
            object_set: vec![ObjectUpdate {
                kind: ObjectUpdateKind::Enter,
                obj: ManagedObjectReference::new("Folder", "group-d1"),
                change_set: vec![PropertyChange::assign("name", "Datacenters")],
                missing_set: vec![],
            }],
            missing_set: vec![],
        }],
        truncated: Some(false),
    };
    let v = serde_json::to_value(&update).unwrap();

    assert_eq!(v["filterSet"][0]["objectSet"][0]["kind"], "enter");
    assert_eq!(v["filterSet"][0]["objectSet"][0]["changeSet"][0]["op"], "assign");
    assert_eq!(v["filterSet"][0]["objectSet"][0]["changeSet"][0]["val"], "Datacenters");
    assert_eq!(v["truncated"], false);
}

#[test]
fn faults_use_protocol_names() {
    let v = serde_json::to_value(Fault::invalid_argument("maxCount")).unwrap();
    assert_eq!(v, json!({"InvalidArgument": {"invalidProperty": "maxCount"}}));

    let v = serde_json::to_value(Fault::NotAuthenticated {
        object: ManagedObjectReference::new("Folder", "group-d1"),
        privilege_id: "System.Read".into(),
    })
    .unwrap();
    assert_eq!(v["NotAuthenticated"]["privilegeId"], "System.Read");
}

#[test]
fn change_ops_serialize_camel_case() {
    assert_eq!(serde_json::to_value(PropertyChangeOp::IndirectRemove).unwrap(), json!("indirectRemove"));
    let unset = PropertyChange::unset("summary");
    assert_eq!(serde_json::to_value(&unset).unwrap(), json!({"name": "summary", "op": "assign"}));
}

#[test]
fn history_filters_use_protocol_field_names() {
    let vm = ManagedObjectReference::new("VirtualMachine", "vm-1");
    let spec = EventFilterSpec {
        entity: Some(EntityFilter::new(vm, RecursionOption::Itself)),
        event_type_id: vec!["VmEvent".to_string()],
        user_name: None,
        max_count: Some(5),
    };
    assert_eq!(
        serde_json::to_value(&spec).unwrap(),
        json!({
            "entity": {"entity": {"type": "VirtualMachine", "value": "vm-1"}, "recursion": "self"},
            "eventTypeId": ["VmEvent"],
            "maxCount": 5
        })
    );

    let tasks: TaskFilterSpec = serde_json::from_value(json!({"state": ["running", "success"]})).unwrap();
    assert_eq!(tasks.state, vec![TaskInfoState::Running, TaskInfoState::Success]);
    assert!(tasks.entity.is_none());
}

#[test]
fn task_states() {
    for state in [TaskInfoState::Queued, TaskInfoState::Running, TaskInfoState::Success, TaskInfoState::Error] {
        assert_eq!(TaskInfoState::parse(state.as_str()), Some(state));
    }
    assert!(TaskInfoState::Error.is_done());
    assert!(!TaskInfoState::Running.is_done());
    assert_eq!(TaskInfoState::parse("done"), None);
}

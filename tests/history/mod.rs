use vimsim::entity_event;
use vimsim::DataObject;
use vimsim::EventFilterSpec;
use vimsim::Fault;
use vimsim::ObjectUpdateKind;
use vimsim::SimConfig;
use vimsim::TaskFilterSpec;
use vimsim::TaskInfoState;
use vimsim::Value;

use crate::common::build_inventory;
use crate::common::object_filter;
use crate::common::service;
use crate::common::service_with;

fn keys(events: &[Value]) -> Vec<i64> {
    events
        .iter()
        .filter_map(|e| e.as_data()?.get("key")?.as_int())
        .collect()
}

#[test]
fn test_forward_read_survives_rewind() {
    let service = service();
    let ctx = service.login("alice");
    let events = service.event_manager();
    for i in 0..25 {
        events.post_event(&ctx, DataObject::new("GeneralEvent").with("message", format!("event {i}")));
    }
    let collector = events
        .create_collector_for_events(&ctx, EventFilterSpec::default())
        .unwrap();
    let history = events.history();
    history.rewind(&collector).unwrap();

    let read_all = || {
        let mut all = Vec::new();
        loop {
            let page = history.read_next(&ctx, &collector, 7).unwrap();
            if page.is_empty() {
                return all;
            }
            all.extend(keys(&page));
        }
    };

    let first = read_all();
    history.rewind(&collector).unwrap();
    let second = read_all();

    assert_eq!(first.len(), 25);
    assert_eq!(first, second);
    assert_eq!(first, (1..=25).collect::<Vec<i64>>());
}

#[test]
fn test_latest_page_is_idempotent() {
    let service = service();
    let ctx = service.login("alice");
    let events = service.event_manager();
    for _ in 0..15 {
        events.post_event(&ctx, DataObject::new("GeneralEvent"));
    }
    let collector = events
        .create_collector_for_events(&ctx, EventFilterSpec::default())
        .unwrap();

    let once = events.history().latest_page(&ctx, &collector).unwrap();
    let twice = events.history().latest_page(&ctx, &collector).unwrap();

    assert_eq!(once, twice);
    assert_eq!(keys(&once), (6..=15).rev().collect::<Vec<i64>>());
}

#[test]
fn test_non_positive_count_keeps_cursor() {
    let service = service();
    let ctx = service.login("alice");
    let events = service.event_manager();
    for _ in 0..3 {
        events.post_event(&ctx, DataObject::new("GeneralEvent"));
    }
    let collector = events
        .create_collector_for_events(&ctx, EventFilterSpec::default())
        .unwrap();
    let history = events.history();
    history.rewind(&collector).unwrap();
    history.read_next(&ctx, &collector, 1).unwrap();

    for count in [0, -3] {
        assert_eq!(
            history.read_next(&ctx, &collector, count).unwrap_err(),
            Fault::invalid_argument("maxCount")
        );
        assert_eq!(
            history.read_previous(&ctx, &collector, count).unwrap_err(),
            Fault::invalid_argument("maxCount")
        );
    }
    assert_eq!(keys(&history.read_next(&ctx, &collector, 1).unwrap()), vec![2]);
}

#[test]
fn test_task_collector_limit() {
    let mut config = SimConfig::default();
    config.history.max_task_collectors = 1;
    let service = service_with(config);
    let ctx = service.login("alice");
    let tasks = service.task_manager();

    let first = tasks
        .create_collector_for_tasks(&ctx, TaskFilterSpec::default())
        .unwrap();
    assert_eq!(
        tasks
            .create_collector_for_tasks(&ctx, TaskFilterSpec::default())
            .unwrap_err(),
        Fault::InvalidState
    );

    tasks.history().destroy_collector(&ctx, &first).unwrap();
    tasks
        .create_collector_for_tasks(&ctx, TaskFilterSpec::default())
        .unwrap();
}

#[test]
fn test_entity_events_reach_scoped_collectors() {
    let service = service();
    let ctx = service.login("alice");
    let inventory = build_inventory(&ctx, 2);
    let events = service.event_manager();
    let only_first = events
        .create_collector_for_events(
            &ctx,
            EventFilterSpec::for_entity(inventory.vms[0].clone(), vimsim::RecursionOption::Itself),
        )
        .unwrap();

    events.post_event(&ctx, entity_event(&ctx, "VmPoweredOnEvent", &inventory.vms[0]));
    events.post_event(&ctx, entity_event(&ctx, "VmPoweredOnEvent", &inventory.vms[1]));

    let page = events.history().latest_page(&ctx, &only_first).unwrap();
    assert_eq!(keys(&page), vec![1]);
    let all = events
        .query_events(
            &ctx,
            EventFilterSpec::for_entity(inventory.datacenter.clone(), vimsim::RecursionOption::All),
        )
        .unwrap();
    assert_eq!(keys(&all), vec![2, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_task_progress_is_observable_through_latest_page() {
    let service = service();
    let ctx = service.login("alice");
    let inventory = build_inventory(&ctx, 1);
    let tasks = service.task_manager();
    let collector = tasks
        .create_collector_for_tasks(&ctx, TaskFilterSpec::default())
        .unwrap();

    let pc = service.property_collector().create_property_collector(&ctx);
    pc.create_filter(&ctx, object_filter(&collector, &["latestPage"]), false)
        .unwrap();
    let baseline = pc.wait_for_updates(&ctx, "").await.unwrap();

    let task = tasks.create_task(&ctx, &inventory.vms[0], "VirtualMachine.powerOn");
    tasks
        .set_task_state(&ctx, &task, TaskInfoState::Running, None, None)
        .unwrap();

    let set = pc.wait_for_updates(&ctx, &baseline.version).await.unwrap();
    let update = &set.filter_set[0].object_set[0];
    assert_eq!(update.kind, ObjectUpdateKind::Modify);
    assert_eq!(update.obj, collector);
    let page = update.change_set[0].val.as_ref().and_then(Value::as_array).unwrap();
    let state = page[0].as_data().and_then(|info| info.get("state"));
    assert_eq!(state, Some(&Value::from("running")));

    assert_eq!(tasks.recent_tasks(&ctx), vec![task]);
}

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use flow_core::{AggregateKey, EventCategory, EventStore, InMemoryEventStore, InstanceFlowFilter, InstanceStatus,
                NewEvent, PageRequest, StorageStatus, SummaryQueryEngine, TimeRange};

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, h, m, s).unwrap()
}

fn s3() -> AggregateKey {
    AggregateKey::new(2, "I3", "S3")
}

fn scenario_events() -> Vec<NewEvent> {
    vec![NewEvent::new(s3(), 30, EventCategory::InstanceReceived, at(11, 0, 0)),
         NewEvent::new(s3(), 30, EventCategory::InstanceMapped, at(11, 15, 0)).with_instance_id(300),
         NewEvent::new(s3(), 30, EventCategory::InstanceDeleted, at(11, 15, 10)).with_instance_id(300),
         NewEvent::new(s3(), 30, EventCategory::InstanceDispatched, at(11, 15, 20)).with_instance_id(300)
                                                                                  .with_destination_id("D1")]
}

fn engine_with(events: Vec<NewEvent>) -> SummaryQueryEngine<InMemoryEventStore> {
    let store = Arc::new(InMemoryEventStore::new());
    for ev in events {
        store.append(ev).unwrap();
    }
    SummaryQueryEngine::new(store)
}

#[test]
fn concrete_scenario_projects_latest_of_each_track() {
    let engine = engine_with(scenario_events());
    let page = engine.summaries(&InstanceFlowFilter::all(), None, &PageRequest::first(10)).unwrap();
    assert_eq!(page.len(), 1);
    let row = &page.items[0];
    assert_eq!(row.key, s3());
    assert_eq!(row.status, InstanceStatus::Transferred);
    assert_eq!(row.latest_status_event, EventCategory::InstanceDispatched);
    assert_eq!(row.storage_status, StorageStatus::StoredAndDeleted);
    assert_eq!(row.latest_update, at(11, 15, 20));
    assert_eq!(row.latest_instance_id, Some(300));
    assert!(row.destination_ids.contains(&"D1".to_string()));
    assert!(!page.has_more);
}

#[test]
fn latest_wins_regardless_of_insertion_order() {
    let mut events = scenario_events();
    events.reverse();
    let engine = engine_with(events);
    let page = engine.summaries(&InstanceFlowFilter::all(), None, &PageRequest::first(10)).unwrap();
    assert_eq!(page.items[0].status, InstanceStatus::Transferred);
    assert_eq!(page.items[0].latest_update, at(11, 15, 20));
}

#[test]
fn duplicate_delivery_does_not_change_the_summary() {
    let events = scenario_events();
    let once = engine_with(events.clone());
    let mut doubled = events.clone();
    doubled.extend(events);
    let twice = engine_with(doubled);
    let all = InstanceFlowFilter::all();
    let a = once.summaries(&all, None, &PageRequest::first(10)).unwrap();
    let b = twice.summaries(&all, None, &PageRequest::first(10)).unwrap();
    assert_eq!(a.items, b.items);
}

#[test]
fn status_only_key_is_never_stored() {
    let key = AggregateKey::new(1, "I1", "A");
    let engine = engine_with(vec![NewEvent::new(key, 1, EventCategory::InstanceReceived, at(9, 0, 0))]);
    let page = engine.summaries(&InstanceFlowFilter::all(), None, &PageRequest::first(10)).unwrap();
    assert_eq!(page.items[0].storage_status, StorageStatus::NeverStored);

    let never = InstanceFlowFilter::builder().storage_statuses([StorageStatus::NeverStored]).build().unwrap();
    assert_eq!(engine.total_count(&never).unwrap(), 1);
    let stored = InstanceFlowFilter::builder().storage_statuses([StorageStatus::Stored]).build().unwrap();
    assert_eq!(engine.total_count(&stored).unwrap(), 0);
}

#[test]
fn storage_only_key_has_no_summary_row() {
    let key = AggregateKey::new(1, "I1", "A");
    let engine = engine_with(vec![NewEvent::new(key, 1, EventCategory::InstanceRegistered, at(9, 0, 0))]);
    assert!(engine.summaries(&InstanceFlowFilter::all(), None, &PageRequest::first(10)).unwrap().is_empty());
}

#[test]
fn latest_status_predicate_ignores_earlier_matches() {
    let engine = engine_with(scenario_events());
    let mapped = InstanceFlowFilter::builder().latest_status_events([EventCategory::InstanceMapped]).build().unwrap();
    assert_eq!(engine.total_count(&mapped).unwrap(), 0);
    let in_progress = InstanceFlowFilter::builder().statuses([InstanceStatus::InProgress]).build().unwrap();
    assert_eq!(engine.total_count(&in_progress).unwrap(), 0);
    let transferred = InstanceFlowFilter::builder().statuses([InstanceStatus::Transferred]).build().unwrap();
    assert_eq!(engine.total_count(&transferred).unwrap(), 1);
}

#[test]
fn associated_events_match_anywhere_in_history() {
    let engine = engine_with(scenario_events());
    let filter = InstanceFlowFilter::builder().associated_events([EventCategory::InstanceReceived]).build().unwrap();
    assert_eq!(engine.total_count(&filter).unwrap(), 1);
    let none = InstanceFlowFilter::builder().associated_events([EventCategory::InstanceMappingError]).build().unwrap();
    assert_eq!(engine.total_count(&none).unwrap(), 0);
}

#[test]
fn destination_filter_matches_any_known_destination() {
    let engine = engine_with(scenario_events());
    let hit = InstanceFlowFilter::builder().destination_ids(["D0", "D1"]).build().unwrap();
    assert_eq!(engine.total_count(&hit).unwrap(), 1);
    let miss = InstanceFlowFilter::builder().destination_ids(["D2"]).build().unwrap();
    assert_eq!(engine.total_count(&miss).unwrap(), 0);
}

#[test]
fn time_range_applies_to_latest_update() {
    let engine = engine_with(scenario_events());
    let inside = InstanceFlowFilter::builder().latest_update(TimeRange::since(at(11, 15, 20))).build().unwrap();
    assert_eq!(engine.total_count(&inside).unwrap(), 1);
    // el primer evento cae en el rango, pero latest_update no
    let outside = InstanceFlowFilter::builder().latest_update(TimeRange::until(at(11, 10, 0))).build().unwrap();
    assert_eq!(engine.total_count(&outside).unwrap(), 0);
}

#[test]
fn fields_combine_with_and_values_with_or() {
    let mut events = scenario_events();
    events.push(NewEvent::new(AggregateKey::new(5, "I9", "X"), 31, EventCategory::InstanceMappingError, at(12, 0, 0)));
    let engine = engine_with(events);
    let either_app = InstanceFlowFilter::builder().source_application_ids([2, 5]).build().unwrap();
    assert_eq!(engine.total_count(&either_app).unwrap(), 2);
    let app_and_failed = InstanceFlowFilter::builder().source_application_ids([2, 5])
                                                      .statuses([InstanceStatus::Failed])
                                                      .build()
                                                      .unwrap();
    assert_eq!(engine.total_count(&app_and_failed).unwrap(), 1);
    let integration = InstanceFlowFilter::builder().integration_ids([31]).build().unwrap();
    assert_eq!(engine.total_count(&integration).unwrap(), 1);
}

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use flow_core::{AggregateKey, EventCategory, EventStore, InMemoryEventStore, InstanceFlowFilter, PageRequest,
                QueryError, QueryLimits, SortDirection, SortField, SummaryQueryEngine, SummarySort};

/// 23 claves; varias comparten `latest_update` para forzar desempates.
fn populated_engine() -> SummaryQueryEngine<InMemoryEventStore> {
    let store = Arc::new(InMemoryEventStore::new());
    let base = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
    for i in 0..23i64 {
        let key = AggregateKey::new(1 + i % 2, "INT", format!("inst-{i:02}"));
        let ts = base + Duration::minutes(i / 3);
        store.append(flow_core::NewEvent::new(key, 100 + i % 4, EventCategory::InstanceReceived, ts)).unwrap();
    }
    SummaryQueryEngine::with_limits(store, QueryLimits::new(50))
}

fn sorts() -> Vec<Option<SummarySort>> {
    vec![None,
         Some(SummarySort::latest_update_desc()),
         Some(SummarySort::new(SortField::LatestUpdate, SortDirection::Asc)),
         Some(SummarySort::new(SortField::IntegrationId, SortDirection::Desc)),
         Some(SummarySort::new(SortField::AggregateKey, SortDirection::Desc))]
}

#[test]
fn offset_pages_are_disjoint_and_concatenate_to_the_full_result() {
    let engine = populated_engine();
    let all = InstanceFlowFilter::all();
    for sort in sorts() {
        let full = engine.summaries(&all, sort, &PageRequest::first(50)).unwrap();
        assert_eq!(full.len(), 23);
        let mut collected = Vec::new();
        let mut offset = 0;
        loop {
            let page = engine.summaries(&all, sort, &PageRequest::offset(offset, 7)).unwrap();
            offset += page.len();
            collected.extend(page.items.iter().map(|s| s.key.clone()));
            if !page.has_more {
                break;
            }
        }
        let expected: Vec<AggregateKey> = full.items.iter().map(|s| s.key.clone()).collect();
        assert_eq!(collected, expected, "sort {sort:?}");
    }
}

#[test]
fn cursor_pages_match_offset_pages() {
    let engine = populated_engine();
    let all = InstanceFlowFilter::all();
    for sort in sorts() {
        let full = engine.summaries(&all, sort, &PageRequest::first(50)).unwrap();
        let mut collected = Vec::new();
        let mut page = engine.summaries(&all, sort, &PageRequest::first(5)).unwrap();
        loop {
            collected.extend(page.items.iter().map(|s| s.key.clone()));
            match page.next_cursor() {
                Some(cursor) => page = engine.summaries(&all, sort, &PageRequest::after(cursor, 5)).unwrap(),
                None => break,
            }
        }
        let expected: Vec<AggregateKey> = full.items.iter().map(|s| s.key.clone()).collect();
        assert_eq!(collected, expected, "sort {sort:?}");
    }
}

#[test]
fn default_order_is_aggregate_key_ascending() {
    let engine = populated_engine();
    let page = engine.summaries(&InstanceFlowFilter::all(), None, &PageRequest::first(50)).unwrap();
    let keys: Vec<&AggregateKey> = page.items.iter().map(|s| &s.key).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn total_count_equals_unbounded_row_count() {
    let engine = populated_engine();
    let filter = InstanceFlowFilter::builder().source_application_ids([2]).build().unwrap();
    let rows = engine.summaries(&filter, None, &PageRequest::first(50)).unwrap();
    assert_eq!(engine.total_count(&filter).unwrap(), rows.len());
    assert_eq!(rows.len(), 11);
}

#[test]
fn page_size_is_bounded() {
    let engine = populated_engine();
    let all = InstanceFlowFilter::all();
    assert_eq!(engine.summaries(&all, None, &PageRequest::first(0)).unwrap_err(), QueryError::EmptyPage);
    assert_eq!(engine.summaries(&all, None, &PageRequest::first(51)).unwrap_err(),
               QueryError::PageSizeExceeded { requested: 51, max: 50 });
}

#[test]
fn offset_past_the_end_is_an_empty_page() {
    let engine = populated_engine();
    let page = engine.summaries(&InstanceFlowFilter::all(), None, &PageRequest::offset(100, 10)).unwrap();
    assert!(page.is_empty());
    assert!(!page.has_more);
}

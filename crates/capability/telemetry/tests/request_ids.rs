use logbook_telemetry::{metrics, new_request_ids, record_optimistic_conflict};

#[test]
fn request_ids_non_empty_and_distinct() {
    let ids = new_request_ids();
    assert!(!ids.request_id.is_empty());
    assert!(!ids.trace_id.is_empty());
    assert_ne!(ids.request_id, new_request_ids().request_id);
}

#[test]
fn counters_only_increase() {
    let before = metrics().snapshot().optimistic_conflicts;
    record_optimistic_conflict();
    assert!(metrics().snapshot().optimistic_conflicts >= before + 1);
}

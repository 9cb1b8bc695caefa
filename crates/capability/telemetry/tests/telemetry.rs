use skc_telemetry::{metrics, new_request_ids, record_read, record_reconnect};

#[test]
fn request_ids_non_empty() {
    let ids = new_request_ids();
    assert!(!ids.request_id.is_empty());
    assert!(!ids.trace_id.is_empty());
    assert_ne!(ids.request_id, ids.trace_id);
}

#[test]
fn counters_only_grow() {
    let before = metrics().snapshot();
    record_read(true);
    record_read(false);
    record_reconnect(false);
    record_reconnect(true);
    let after = metrics().snapshot();

    assert!(after.reads_ok > before.reads_ok);
    assert!(after.reads_failed > before.reads_failed);
    assert!(after.reconnect_attempts >= before.reconnect_attempts + 2);
    assert!(after.reconnect_successes > before.reconnect_successes);
}

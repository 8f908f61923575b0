mod common;

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use latency_probe::transport::{
    ChainRequest, ChainResponse, EventObject, EventResponse, RequestInterceptor, SocketResponse,
};
use latency_probe::{FetchRequest, TransportError, Transports};
use parking_lot::Mutex;

use common::*;

fn fetch_only() -> Transports {
    Transports {
        fetch: true,
        ..Transports::none()
    }
}

// ─── Promise-call adapter ────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn fetch_slow_success_emits_one_record() {
    let registry = registry(Script::new().ok("/api/users", 50, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), fetch_only());

    let response = registry
        .fetch()
        .fetch(FetchRequest::get(url("/api/users")))
        .await
        .expect("call succeeds");
    assert_eq!(response.status, 200);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert!((record.latency - 50.0).abs() < 1.0, "latency {}", record.latency);
    assert_eq!(record.status_code, 200);
    assert_eq!(record.endpoint, "/api/users");
    assert_eq!(record.method, "GET");
    assert!(record.error_message.is_none());
}

#[tokio::test(start_paused = true)]
async fn fetch_outside_endpoint_filter_emits_nothing() {
    let registry = registry(Script::new().ok("/other/path", 100, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), fetch_only());

    let response = registry.fetch().fetch(FetchRequest::get("/other/path")).await;
    assert_eq!(response.map(|r| r.status), Ok(200));
    assert!(sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn fast_failure_is_below_threshold_and_discarded() {
    let registry = registry(Script::new().fail("/api/x", 5, "connection reset"));
    let (_probe, sink) = instrument(&registry, scenario_config(), fetch_only());

    let result = registry.fetch().fetch(FetchRequest::get("/api/x")).await;
    assert_eq!(result, Err(TransportError::Network("connection reset".into())));
    assert!(sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn sampled_in_fast_success_is_discarded_after_completion() {
    let registry = registry(Script::new().ok("/api/quick", 3, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), fetch_only());

    let result = registry.fetch().fetch(FetchRequest::get("/api/quick")).await;
    assert!(result.is_ok());
    assert!(sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_failure_records_zero_status_and_message() {
    let script = Script::new().fail("/api/x", 30, "connection refused");
    let uninstrumented = registry(script.clone());
    let expected = uninstrumented.fetch().fetch(FetchRequest::get("/api/x")).await;

    let registry = registry(script);
    let (_probe, sink) = instrument(&registry, scenario_config(), fetch_only());
    let observed = registry.fetch().fetch(FetchRequest::get("/api/x")).await;

    // The host sees exactly what it would have seen without the probe.
    assert_eq!(observed, expected);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code, 0);
    let message = records[0].error_message.as_deref().unwrap_or_default();
    assert!(message.contains("connection refused"), "{message}");
}

#[tokio::test(start_paused = true)]
async fn sampling_rate_zero_never_emits() {
    let registry = registry(Script::new().ok("/api/users", 50, 200));
    let mut config = config(&[], 0.0);
    config.filter.sampling_rate = 0.0;
    let (_probe, sink) = instrument(&registry, config, fetch_only());

    for _ in 0..20 {
        let _ = registry.fetch().fetch(FetchRequest::get("/api/users")).await;
    }
    assert!(sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn full_sampling_with_no_filters_records_every_slow_call() {
    let registry = registry(
        Script::new()
            .ok("/a", 15, 200)
            .ok("/b/c", 25, 500)
            .fail("/d", 40, "timeout"),
    );
    let (_probe, sink) = instrument(&registry, config(&[], 10.0), fetch_only());

    for path in ["/a", "/b/c", "/d", "/a"] {
        let _ = registry.fetch().fetch(FetchRequest::get(path)).await;
    }

    let endpoints: Vec<_> = sink.records().into_iter().map(|r| r.endpoint).collect();
    assert_eq!(endpoints, vec!["/a", "/b/c", "/d", "/a"]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_fetch_emits_nothing() {
    let registry = registry(Script::new().ok("/api/slow", 50, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), fetch_only());

    let call = registry.fetch().fetch(FetchRequest::get("/api/slow"));
    let outcome = tokio::time::timeout(Duration::from_millis(20), call).await;
    assert!(outcome.is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_are_measured_independently() {
    let registry = registry(Script::new().ok("/api/fast", 20, 200).ok("/api/slow", 60, 201));
    let (_probe, sink) = instrument(&registry, scenario_config(), fetch_only());

    let fetch = registry.fetch();
    let (slow, fast) = tokio::join!(
        fetch.fetch(FetchRequest::get("/api/slow")),
        fetch.fetch(FetchRequest::get("/api/fast")),
    );
    assert!(slow.is_ok() && fast.is_ok());

    let records = sink.records();
    assert_eq!(records.len(), 2);
    // Completion order, not start order.
    assert_eq!(records[0].endpoint, "/api/fast");
    assert!((records[0].latency - 20.0).abs() < 1.0);
    assert_eq!(records[1].endpoint, "/api/slow");
    assert!((records[1].latency - 60.0).abs() < 1.0);
    assert_ne!(records[0].id, records[1].id);
}

#[tokio::test(start_paused = true)]
async fn fetch_response_passes_through_untouched() {
    let registry = registry(Script::new().ok("/api/users", 50, 200));
    let expected = registry.fetch().fetch(FetchRequest::get("/api/users")).await;

    let (_probe, _sink) = instrument(&registry, scenario_config(), fetch_only());
    let observed = registry.fetch().fetch(FetchRequest::get("/api/users")).await;
    assert_eq!(observed, expected);
}

// ─── Callback-socket adapter ─────────────────────────────────────

fn sockets_only() -> Transports {
    Transports {
        socket_requests: true,
        ..Transports::none()
    }
}

#[tokio::test(start_paused = true)]
async fn socket_success_records_status() {
    let registry = registry(Script::new().ok("/api/users", 50, 201));
    let (_probe, sink) = instrument(&registry, scenario_config(), sockets_only());

    assert_eq!(socket_call(&registry, "/api/users").await, Ok(201));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code, 201);
    assert_eq!(records[0].url, url("/api/users"));
    assert!((records[0].latency - 50.0).abs() < 1.0);
}

#[tokio::test(start_paused = true)]
async fn socket_error_event_records_failure_and_reaches_host() {
    let registry = registry(Script::new().fail("/api/x", 30, "ECONNREFUSED"));
    let (_probe, sink) = instrument(&registry, scenario_config(), sockets_only());

    let result = socket_call(&registry, "/api/x").await;
    assert_eq!(result, Err(TransportError::Network("ECONNREFUSED".into())));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code, 0);
    assert!(records[0].error_message.is_some());
}

#[tokio::test(start_paused = true)]
async fn socket_response_then_error_still_yields_one_record() {
    let script = Script::new().ok("/api/users", 50, 200);
    let mut api = FakeSocketApi::new(script.clone());
    api.error_after_response = true;
    let registry = Arc::new(
        latency_probe::TransportRegistry::builder()
            .fetch(Arc::new(FakeFetch::new(script)))
            .socket_requests(Arc::new(api))
            .build(),
    );
    let (_probe, sink) = instrument(&registry, scenario_config(), sockets_only());

    assert_eq!(socket_call(&registry, "/api/users").await, Ok(200));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code, 200);
}

#[tokio::test(start_paused = true)]
async fn aborted_socket_request_emits_nothing() {
    let registry = registry(Script::new().ok("/api/users", 50, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), sockets_only());

    let mut request = registry.socket_requests().request(
        latency_probe::RequestOptions::new(Method::GET, HOST, "/api/users"),
        Box::new(|_: SocketResponse| panic!("aborted request must not complete")),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    request.abort();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn late_error_listener_still_hears_the_error() {
    let registry = registry(Script::new().fail("/api/x", 30, "reset"));
    let (_probe, sink) = instrument(&registry, scenario_config(), sockets_only());

    let mut request = registry.socket_requests().request(
        latency_probe::RequestOptions::new(Method::GET, HOST, "/api/x"),
        Box::new(|_: SocketResponse| {}),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sink.len(), 1);

    let heard = Arc::new(Mutex::new(None));
    let slot = heard.clone();
    request.on_error(Box::new(move |err: &TransportError| {
        *slot.lock() = Some(err.clone());
    }));
    assert_eq!(*heard.lock(), Some(TransportError::Network("reset".into())));
}

// ─── Event-based-object adapter ──────────────────────────────────

fn event_objects_only() -> Transports {
    Transports {
        event_objects: true,
        ..Transports::none()
    }
}

#[tokio::test(start_paused = true)]
async fn event_object_latency_starts_at_construction() {
    let registry = registry(Script::new().ok("/api/users", 30, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), event_objects_only());

    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    let mut object = registry.event_objects().create();

    // Time spent configuring the object counts toward the call.
    tokio::time::sleep(Duration::from_millis(20)).await;
    object.open(Method::GET, &url("/api/users"));
    object.set_onload(Some(Box::new(move |response: &EventResponse| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(response.status);
        }
    })));
    object.send(None).expect("send accepted");

    assert_eq!(rx.await, Ok(200));
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!((records[0].latency - 50.0).abs() < 1.0, "latency {}", records[0].latency);
}

#[tokio::test(start_paused = true)]
async fn event_object_error_slot_records_failure() {
    let registry = registry(Script::new().fail("/api/x", 30, "offline"));
    let (_probe, sink) = instrument(&registry, scenario_config(), event_objects_only());

    let result = event_call(&registry, "/api/x").await;
    assert_eq!(result, Err(TransportError::Network("offline".into())));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code, 0);
    assert_eq!(records[0].error_message.as_deref(), Some("network error: offline"));
}

#[tokio::test(start_paused = true)]
async fn event_object_handler_assigned_after_send_still_fires() {
    let registry = registry(Script::new().ok("/api/users", 40, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), event_objects_only());

    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    let mut object = registry.event_objects().create();
    object.open(Method::GET, &url("/api/users"));
    object.send(None).expect("send accepted");
    object.set_onload(Some(Box::new(move |response: &EventResponse| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(response.status);
        }
    })));

    assert_eq!(rx.await, Ok(200));
    assert_eq!(sink.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn event_object_send_before_open_is_rejected_without_record() {
    let registry = registry(Script::new());
    let (_probe, sink) = instrument(&registry, config(&[], 0.0), event_objects_only());

    let mut object = registry.event_objects().create();
    let result = object.send(None);
    assert!(matches!(result, Err(TransportError::InvalidState(_))));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn event_object_filtered_call_still_completes_for_host() {
    let registry = registry(Script::new().ok("/other/path", 100, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), event_objects_only());

    assert_eq!(event_call(&registry, "/other/path").await, Ok(200));
    assert!(sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn aborted_event_object_emits_nothing() {
    let registry = registry(Script::new().ok("/api/users", 50, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), event_objects_only());

    let mut object = registry.event_objects().create();
    object.open(Method::GET, &url("/api/users"));
    object.send(None).expect("send accepted");
    tokio::time::sleep(Duration::from_millis(10)).await;
    object.abort();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sink.is_empty());
}

/// Resolves with the status delivered to the host's load slot.
fn on_load(object: &mut dyn EventObject) -> tokio::sync::oneshot::Receiver<u16> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    object.set_onload(Some(Box::new(move |response: &EventResponse| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(response.status);
        }
    })));
    rx
}

#[tokio::test(start_paused = true)]
async fn event_object_second_send_keeps_the_first_calls_record() {
    let registry = registry(Script::new().ok("/api/users", 50, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), event_objects_only());

    let mut object = registry.event_objects().create();
    object.open(Method::GET, &url("/api/users"));
    let loaded = on_load(object.as_mut());
    object.send(None).expect("send accepted");

    tokio::time::sleep(Duration::from_millis(10)).await;
    let again = object.send(None);
    assert!(matches!(again, Err(TransportError::InvalidState(_))));

    assert_eq!(loaded.await, Ok(200));
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!((records[0].latency - 50.0).abs() < 1.0, "latency {}", records[0].latency);
}

#[tokio::test(start_paused = true)]
async fn event_object_resent_after_abort_records_only_the_resend() {
    let registry = registry(Script::new().ok("/api/users", 50, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), event_objects_only());

    let mut object = registry.event_objects().create();
    object.open(Method::GET, &url("/api/users"));
    let loaded = on_load(object.as_mut());
    object.send(None).expect("send accepted");
    tokio::time::sleep(Duration::from_millis(10)).await;
    object.abort();

    tokio::time::sleep(Duration::from_millis(5)).await;
    object.send(None).expect("send after abort accepted");
    assert_eq!(loaded.await, Ok(200));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!((records[0].latency - 50.0).abs() < 1.0, "latency {}", records[0].latency);
}

#[tokio::test(start_paused = true)]
async fn event_object_send_after_rejected_send_is_measured_from_construction() {
    let registry = registry(Script::new().ok("/api/users", 50, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), event_objects_only());

    let mut object = registry.event_objects().create();
    assert!(matches!(object.send(None), Err(TransportError::InvalidState(_))));

    tokio::time::sleep(Duration::from_millis(20)).await;
    object.open(Method::GET, &url("/api/users"));
    let loaded = on_load(object.as_mut());
    object.send(None).expect("send accepted");

    assert_eq!(loaded.await, Ok(200));
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!((records[0].latency - 70.0).abs() < 1.0, "latency {}", records[0].latency);
}

// ─── Interceptor-chain adapter ───────────────────────────────────

fn chain_only() -> Transports {
    Transports {
        interceptor_chain: true,
        ..Transports::none()
    }
}

struct TagRequest;

impl RequestInterceptor for TagRequest {
    fn on_request(&self, request: &mut ChainRequest) -> Result<(), TransportError> {
        request.headers.push(("x-tag".into(), "host".into()));
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn chain_success_records_and_passes_response_through() {
    let registry = registry(Script::new().ok("/api/users", 50, 200));
    let client = registry.interceptor_client();
    client.add_request_interceptor(Arc::new(TagRequest));

    let expected = client.execute(ChainRequest::get(url("/api/users"))).await;
    let (_probe, sink) = instrument(&registry, scenario_config(), chain_only());
    let observed = client.execute(ChainRequest::get(url("/api/users"))).await;

    assert_eq!(observed, expected);
    assert_eq!(observed.map(|r: ChainResponse| r.status), Ok(200));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].endpoint, "/api/users");
    assert!((records[0].latency - 50.0).abs() < 1.0);
}

#[tokio::test(start_paused = true)]
async fn chain_rejection_records_failure_and_rethrows() {
    let registry = registry(Script::new().fail("/api/x", 30, "ETIMEDOUT"));
    let (_probe, sink) = instrument(&registry, scenario_config(), chain_only());

    let result = registry
        .interceptor_client()
        .execute(ChainRequest::get(url("/api/x")))
        .await;
    assert_eq!(result, Err(TransportError::Network("ETIMEDOUT".into())));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code, 0);
}

#[tokio::test(start_paused = true)]
async fn chain_below_threshold_is_discarded() {
    let registry = registry(Script::new().ok("/api/quick", 4, 200));
    let (_probe, sink) = instrument(&registry, scenario_config(), chain_only());

    let result = registry
        .interceptor_client()
        .execute(ChainRequest::get(url("/api/quick")))
        .await;
    assert!(result.is_ok());
    assert!(sink.is_empty());
}

use http::Method;
use latency_probe::transport::{ChainRequest, EventResponse, SocketResponse};
use latency_probe::{FetchRequest, RequestOptions, TransportError, TransportRegistry};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use url::Url;

/// Totals reported once every worker has finished.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrafficSummary {
    pub calls: u64,
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    calls: AtomicU64,
    failures: AtomicU64,
}

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `concurrency` Tokio tasks that call `base_url` through randomly
/// chosen transports until the deadline.
pub async fn run(
    registry: Arc<TransportRegistry>,
    base_url: String,
    concurrency: u32,
    duration_secs: u64,
) -> TrafficSummary {
    let deadline = Instant::now() + Duration::from_secs(duration_secs);
    let counters = Arc::new(Counters::default());

    let mut handles = Vec::with_capacity(concurrency as usize);
    for worker_id in 0..concurrency {
        let registry = registry.clone();
        let base_url = base_url.clone();
        let counters = counters.clone();

        handles.push(tokio::spawn(async move {
            worker(worker_id, registry, base_url, counters, deadline).await;
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    TrafficSummary {
        calls: counters.calls.load(Ordering::Relaxed),
        failures: counters.failures.load(Ordering::Relaxed),
    }
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    id: u32,
    registry: Arc<TransportRegistry>,
    base_url: String,
    counters: Arc<Counters>,
    deadline: Instant,
) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);

    while Instant::now() < deadline {
        let url = pick_url(&mut rng, &base_url);
        let result = match rng.gen_range(0u8..4) {
            0 => via_fetch(&registry, &url).await,
            1 => via_socket(&registry, &url).await,
            2 => via_event_object(&registry, &url).await,
            _ => via_chain(&registry, &url).await,
        };

        counters.calls.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            counters.failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn pick_url(rng: &mut StdRng, base_url: &str) -> String {
    match rng.gen_range(0u8..10) {
        0..=2 => format!("{base_url}/api/users/{}", rng.gen_range(1..=1_200u32)),
        3..=4 => format!("{base_url}/api/products/{}", rng.gen_range(1..=500u32)),
        5 => format!("{base_url}/api/users"),
        6..=7 => format!("{base_url}/api/flaky"),
        8 => format!("{base_url}/other/path"),
        // Nothing listens on port 1: a transport-level failure.
        _ => "http://127.0.0.1:1/api/unreachable".to_string(),
    }
}

// ─── One call per transport shape ────────────────────────────────

async fn via_fetch(registry: &TransportRegistry, url: &str) -> Result<u16, TransportError> {
    let response = registry.fetch().fetch(FetchRequest::get(url)).await?;
    Ok(response.status)
}

async fn via_socket(registry: &TransportRegistry, url: &str) -> Result<u16, TransportError> {
    let parsed = Url::parse(url).map_err(|e| TransportError::Other(e.to_string()))?;
    let options = RequestOptions::from_url(Method::GET, &parsed);

    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let on_response = tx.clone();
    let mut request = registry.socket_requests().request(
        options,
        Box::new(move |response: SocketResponse| {
            if let Some(tx) = on_response.lock().take() {
                let _ = tx.send(Ok(response.status));
            }
        }),
    );
    request.on_error(Box::new(move |err: &TransportError| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(Err(err.clone()));
        }
    }));

    rx.await.unwrap_or(Err(TransportError::Aborted))
}

async fn via_event_object(registry: &TransportRegistry, url: &str) -> Result<u16, TransportError> {
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let mut object = registry.event_objects().create();
    object.open(Method::GET, url);

    let on_load = tx.clone();
    object.set_onload(Some(Box::new(move |response: &EventResponse| {
        if let Some(tx) = on_load.lock().take() {
            let _ = tx.send(Ok(response.status));
        }
    })));
    object.set_onerror(Some(Box::new(move |err: &TransportError| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(Err(err.clone()));
        }
    })));
    object.send(None)?;

    // Keep the object alive until it settles.
    let result = rx.await.unwrap_or(Err(TransportError::Aborted));
    drop(object);
    result
}

async fn via_chain(registry: &TransportRegistry, url: &str) -> Result<u16, TransportError> {
    let response = registry
        .interceptor_client()
        .execute(ChainRequest::get(url))
        .await?;
    Ok(response.status)
}

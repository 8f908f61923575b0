//! Scripted transports for adapter tests. Each fake looks up the request's
//! path in a [`Script`], sleeps for the scripted delay on tokio's clock and
//! then completes the way its real counterpart would.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use http::Method;
use latency_probe::transport::{
    ClientRequest, ErrorHandler, EventObject, EventObjectFactory, EventResponse, LoadHandler,
    RequestErrorListener, ResponseCallback, SocketRequestApi, SocketResponse,
};
use latency_probe::{
    extract_endpoint, FetchRequest, FetchResponse, FetchTransport, FilterConfig, Instrumentation,
    MemorySink, ProbeConfig, RequestOptions, TransportError, TransportRegistry, Transports,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const HOST: &str = "upstream.test";

// ─── Script ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Step {
    pub delay: Duration,
    pub result: Result<u16, TransportError>,
}

#[derive(Clone, Default)]
pub struct Script {
    routes: HashMap<String, Step>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(mut self, path: &str, delay_ms: u64, status: u16) -> Self {
        self.routes.insert(
            path.to_string(),
            Step {
                delay: Duration::from_millis(delay_ms),
                result: Ok(status),
            },
        );
        self
    }

    pub fn fail(mut self, path: &str, delay_ms: u64, message: &str) -> Self {
        self.routes.insert(
            path.to_string(),
            Step {
                delay: Duration::from_millis(delay_ms),
                result: Err(TransportError::Network(message.to_string())),
            },
        );
        self
    }

    pub fn step(&self, url: &str) -> Step {
        self.routes.get(&extract_endpoint(url)).cloned().unwrap_or(Step {
            delay: Duration::ZERO,
            result: Ok(404),
        })
    }
}

pub fn url(path: &str) -> String {
    format!("http://{HOST}{path}")
}

// ─── Promise-call fake ───────────────────────────────────────────

pub struct FakeFetch {
    script: Script,
    pub calls: AtomicUsize,
}

impl FakeFetch {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FetchTransport for FakeFetch {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<FetchResponse, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.step(&request.target.to_url_string());
        Box::pin(async move {
            tokio::time::sleep(step.delay).await;
            step.result.map(|status| FetchResponse {
                status,
                headers: vec![("x-fake".into(), "1".into())],
                body: b"payload".to_vec(),
            })
        })
    }
}

// ─── Callback-socket fake ────────────────────────────────────────

#[derive(Default)]
struct ErrorState {
    listeners: Vec<RequestErrorListener>,
    emitted: Option<TransportError>,
}

pub struct FakeSocketApi {
    script: Script,
    /// Misbehave: emit an error right after delivering the response.
    pub error_after_response: bool,
}

impl FakeSocketApi {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            error_after_response: false,
        }
    }
}

struct FakeClientRequest {
    errors: Arc<Mutex<ErrorState>>,
    task: Option<JoinHandle<()>>,
}

impl ClientRequest for FakeClientRequest {
    fn on_error(&mut self, mut listener: RequestErrorListener) {
        let mut errors = self.errors.lock();
        if let Some(err) = errors.emitted.clone() {
            listener(&err);
        }
        errors.listeners.push(listener);
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn emit(errors: &Mutex<ErrorState>, err: TransportError) {
    let mut state = errors.lock();
    for listener in state.listeners.iter_mut() {
        listener(&err);
    }
    state.emitted = Some(err);
}

impl SocketRequestApi for FakeSocketApi {
    fn request(&self, options: RequestOptions, callback: ResponseCallback) -> Box<dyn ClientRequest> {
        let step = self.script.step(&options.to_url_string());
        let errors = Arc::new(Mutex::new(ErrorState::default()));
        let task_errors = errors.clone();
        let error_after_response = self.error_after_response;

        let task = tokio::spawn(async move {
            tokio::time::sleep(step.delay).await;
            match step.result {
                Ok(status) => {
                    callback(SocketResponse {
                        status,
                        headers: Vec::new(),
                        body: Vec::new(),
                    });
                    if error_after_response {
                        emit(&task_errors, TransportError::Network("socket hang up".into()));
                    }
                }
                Err(err) => emit(&task_errors, err),
            }
        });

        Box::new(FakeClientRequest {
            errors,
            task: Some(task),
        })
    }
}

// ─── Event-object fake ───────────────────────────────────────────

pub struct FakeEventFactory {
    script: Script,
}

impl FakeEventFactory {
    pub fn new(script: Script) -> Self {
        Self { script }
    }
}

struct FakeEventObject {
    script: Script,
    request: Option<String>,
    onload: Arc<Mutex<Option<LoadHandler>>>,
    onerror: Arc<Mutex<Option<ErrorHandler>>>,
    task: Option<JoinHandle<()>>,
}

impl EventObjectFactory for FakeEventFactory {
    fn create(&self) -> Box<dyn EventObject> {
        Box::new(FakeEventObject {
            script: self.script.clone(),
            request: None,
            onload: Arc::new(Mutex::new(None)),
            onerror: Arc::new(Mutex::new(None)),
            task: None,
        })
    }
}

impl EventObject for FakeEventObject {
    fn open(&mut self, _method: Method, url: &str) {
        self.request = Some(url.to_string());
    }

    fn send(&mut self, _body: Option<Vec<u8>>) -> Result<(), TransportError> {
        if self.task.is_some() {
            return Err(TransportError::InvalidState("send() called twice".into()));
        }
        let Some(url) = &self.request else {
            return Err(TransportError::InvalidState("send() called before open()".into()));
        };
        let step = self.script.step(url);
        let (onload, onerror) = (self.onload.clone(), self.onerror.clone());

        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(step.delay).await;
            match step.result {
                Ok(status) => {
                    let response = EventResponse {
                        status,
                        headers: Vec::new(),
                        body: Vec::new(),
                    };
                    if let Some(handler) = onload.lock().as_mut() {
                        handler(&response);
                    }
                }
                Err(err) => {
                    if let Some(handler) = onerror.lock().as_mut() {
                        handler(&err);
                    }
                }
            }
        }));
        Ok(())
    }

    fn set_onload(&mut self, handler: Option<LoadHandler>) {
        *self.onload.lock() = handler;
    }

    fn set_onerror(&mut self, handler: Option<ErrorHandler>) {
        *self.onerror.lock() = handler;
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ─── Setup helpers ───────────────────────────────────────────────

pub fn config(filters: &[&str], min_latency_ms: f64) -> ProbeConfig {
    ProbeConfig {
        filter: FilterConfig {
            sampling_rate: 1.0,
            min_latency_threshold_ms: min_latency_ms,
            endpoint_filters: filters.iter().map(|s| s.to_string()).collect(),
        },
        ..ProbeConfig::default()
    }
}

/// Sample everything, 10 ms threshold, `/api/*`.
pub fn scenario_config() -> ProbeConfig {
    config(&["/api/*"], 10.0)
}

pub fn registry(script: Script) -> Arc<TransportRegistry> {
    Arc::new(
        TransportRegistry::builder()
            .fetch(Arc::new(FakeFetch::new(script.clone())))
            .socket_requests(Arc::new(FakeSocketApi::new(script.clone())))
            .event_objects(Arc::new(FakeEventFactory::new(script)))
            .build(),
    )
}

pub fn instrument(
    registry: &Arc<TransportRegistry>,
    config: ProbeConfig,
    which: Transports,
) -> (Instrumentation, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let mut probe =
        Instrumentation::with_sink(registry.clone(), config, sink.clone()).expect("valid config");
    probe.install(which).expect("install");
    (probe, sink)
}

/// Pointer identity for trait-object `Arc`s, ignoring vtables.
pub fn same_arc<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

// ─── Host-side calls that await callback transports ──────────────

pub async fn socket_call(registry: &TransportRegistry, path: &str) -> Result<u16, TransportError> {
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let on_response = tx.clone();
    let mut request = registry.socket_requests().request(
        RequestOptions::new(Method::GET, HOST, path),
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

    let result = rx.await.unwrap_or(Err(TransportError::Aborted));
    drop(request);
    result
}

pub async fn event_call(registry: &TransportRegistry, path: &str) -> Result<u16, TransportError> {
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let mut object = registry.event_objects().create();
    object.open(Method::GET, &url(path));

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

    let result = rx.await.unwrap_or(Err(TransportError::Aborted));
    drop(object);
    result
}

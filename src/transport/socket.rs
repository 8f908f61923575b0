use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::fetch::collect_headers;
use super::{Headers, RequestOptions, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub struct SocketResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

pub type ResponseCallback = Box<dyn FnOnce(SocketResponse) + Send>;
pub type RequestErrorListener = Box<dyn FnMut(&TransportError) + Send>;

/// Live handle returned by [`SocketRequestApi::request`].
pub trait ClientRequest: Send {
    /// Register an error listener. Listeners attached after the error was
    /// emitted still receive it.
    fn on_error(&mut self, listener: RequestErrorListener);
    /// Cancel the request; neither the callback nor error listeners fire.
    fn abort(&mut self);
}

/// Node-style request API: options bag in, completion callback for the
/// response, errors reported through the returned request object.
pub trait SocketRequestApi: Send + Sync {
    fn request(&self, options: RequestOptions, callback: ResponseCallback) -> Box<dyn ClientRequest>;
}

// ─── reqwest-backed implementation ───────────────────────────────

#[derive(Clone, Default)]
pub struct ReqwestSocketApi {
    client: reqwest::Client,
}

impl ReqwestSocketApi {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[derive(Default)]
struct ErrorChannel {
    listeners: Vec<RequestErrorListener>,
    emitted: Option<TransportError>,
}

impl ErrorChannel {
    fn emit(&mut self, err: TransportError) {
        for listener in self.listeners.iter_mut() {
            listener(&err);
        }
        self.emitted = Some(err);
    }
}

struct HttpClientRequest {
    errors: Arc<Mutex<ErrorChannel>>,
    task: Option<JoinHandle<()>>,
}

impl ClientRequest for HttpClientRequest {
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

impl SocketRequestApi for ReqwestSocketApi {
    fn request(&self, options: RequestOptions, callback: ResponseCallback) -> Box<dyn ClientRequest> {
        let errors = Arc::new(Mutex::new(ErrorChannel::default()));

        let Ok(handle) = Handle::try_current() else {
            errors
                .lock()
                .emit(TransportError::InvalidState("no async runtime available".into()));
            return Box::new(HttpClientRequest { errors, task: None });
        };

        let url = options.to_url_string();
        let mut builder = self.client.request(options.method, url);
        for (name, value) in options.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = options.body {
            builder = builder.body(body);
        }

        let task_errors = errors.clone();
        let task = handle.spawn(async move {
            let result = async {
                let response = builder.send().await?;
                let status = response.status().as_u16();
                let headers = collect_headers(response.headers());
                let body = response.bytes().await?.to_vec();
                Ok::<_, reqwest::Error>(SocketResponse {
                    status,
                    headers,
                    body,
                })
            }
            .await;

            match result {
                Ok(response) => callback(response),
                Err(err) => task_errors.lock().emit(err.into()),
            }
        });

        Box::new(HttpClientRequest {
            errors,
            task: Some(task),
        })
    }
}

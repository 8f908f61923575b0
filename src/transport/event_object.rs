use std::sync::Arc;

use http::Method;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::fetch::collect_headers;
use super::{Headers, TransportError};

/// Delivered to the load slot once a response has been read.
#[derive(Debug, Clone, PartialEq)]
pub struct EventResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

pub type LoadHandler = Box<dyn FnMut(&EventResponse) + Send>;
pub type ErrorHandler = Box<dyn FnMut(&TransportError) + Send>;

/// XHR-shaped request object: created empty, configured with `open`,
/// started with `send`, completed through whichever handler slot fires.
///
/// `onload` fires for any HTTP status, `onerror` for transport failures,
/// neither after `abort`.
pub trait EventObject: Send {
    fn open(&mut self, method: Method, url: &str);
    fn send(&mut self, body: Option<Vec<u8>>) -> Result<(), TransportError>;
    fn set_onload(&mut self, handler: Option<LoadHandler>);
    fn set_onerror(&mut self, handler: Option<ErrorHandler>);
    fn abort(&mut self);
}

/// Constructor for event objects; this is the entry point that gets swapped.
pub trait EventObjectFactory: Send + Sync {
    fn create(&self) -> Box<dyn EventObject>;
}

// ─── reqwest-backed implementation ───────────────────────────────

#[derive(Clone, Default)]
pub struct HttpEventObjectFactory {
    client: reqwest::Client,
}

impl HttpEventObjectFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl EventObjectFactory for HttpEventObjectFactory {
    fn create(&self) -> Box<dyn EventObject> {
        Box::new(HttpEventObject {
            client: self.client.clone(),
            request: None,
            onload: Arc::new(Mutex::new(None)),
            onerror: Arc::new(Mutex::new(None)),
            task: None,
        })
    }
}

struct HttpEventObject {
    client: reqwest::Client,
    request: Option<(Method, String)>,
    onload: Arc<Mutex<Option<LoadHandler>>>,
    onerror: Arc<Mutex<Option<ErrorHandler>>>,
    task: Option<JoinHandle<()>>,
}

impl EventObject for HttpEventObject {
    fn open(&mut self, method: Method, url: &str) {
        self.request = Some((method, url.to_string()));
    }

    fn send(&mut self, body: Option<Vec<u8>>) -> Result<(), TransportError> {
        if self.task.is_some() {
            return Err(TransportError::InvalidState("send() called twice".into()));
        }
        let Some((method, url)) = self.request.clone() else {
            return Err(TransportError::InvalidState("send() called before open()".into()));
        };
        let handle = Handle::try_current()
            .map_err(|_| TransportError::InvalidState("no async runtime available".into()))?;

        let mut builder = self.client.request(method, url);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let onload = self.onload.clone();
        let onerror = self.onerror.clone();

        self.task = Some(handle.spawn(async move {
            let result = async {
                let response = builder.send().await?;
                let status = response.status().as_u16();
                let headers = collect_headers(response.headers());
                let body = response.bytes().await?.to_vec();
                Ok::<_, reqwest::Error>(EventResponse {
                    status,
                    headers,
                    body,
                })
            }
            .await;

            match result {
                Ok(response) => {
                    if let Some(handler) = onload.lock().as_mut() {
                        handler(&response);
                    }
                }
                Err(err) => {
                    let err = TransportError::from(err);
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

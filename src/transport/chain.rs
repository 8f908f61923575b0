use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use http::{Extensions, Method};
use parking_lot::RwLock;

use super::fetch::{FetchRequest, FetchResponse, FetchTransport};
use super::{Headers, RequestTarget, TransportError};

/// A request travelling through the interceptor chain. `extensions` is the
/// per-call context: whatever a request interceptor stores there is visible
/// to the response interceptors for the same call.
#[derive(Debug)]
pub struct ChainRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub extensions: Extensions,
}

impl ChainRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            extensions: Extensions::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl From<FetchResponse> for ChainResponse {
    fn from(r: FetchResponse) -> Self {
        Self {
            status: r.status,
            headers: r.headers,
            body: r.body,
        }
    }
}

/// Runs before the request is sent. An `Err` skips the send and enters the
/// response chain's error path.
pub trait RequestInterceptor: Send + Sync {
    fn on_request(&self, request: &mut ChainRequest) -> Result<(), TransportError>;
}

/// Runs after the send. Either hook may turn success into failure or the
/// reverse; the defaults pass the value through.
pub trait ResponseInterceptor: Send + Sync {
    fn on_response(
        &self,
        _request: &mut ChainRequest,
        response: ChainResponse,
    ) -> Result<ChainResponse, TransportError> {
        Ok(response)
    }

    fn on_error(
        &self,
        _request: &mut ChainRequest,
        error: TransportError,
    ) -> Result<ChainResponse, TransportError> {
        Err(error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterceptorId(u64);

type Registered<T> = RwLock<Vec<(InterceptorId, Arc<T>)>>;

/// HTTP client with ordered interceptor registration. Both chains run in
/// registration order.
pub struct InterceptorClient {
    transport: Arc<dyn FetchTransport>,
    request_interceptors: Registered<dyn RequestInterceptor>,
    response_interceptors: Registered<dyn ResponseInterceptor>,
    next_id: AtomicU64,
}

impl InterceptorClient {
    /// The transport is fixed for the client's lifetime.
    pub fn new(transport: Arc<dyn FetchTransport>) -> Self {
        Self {
            transport,
            request_interceptors: RwLock::new(Vec::new()),
            response_interceptors: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> InterceptorId {
        InterceptorId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add_request_interceptor(&self, interceptor: Arc<dyn RequestInterceptor>) -> InterceptorId {
        let id = self.next_id();
        self.request_interceptors.write().push((id, interceptor));
        id
    }

    pub fn add_response_interceptor(&self, interceptor: Arc<dyn ResponseInterceptor>) -> InterceptorId {
        let id = self.next_id();
        self.response_interceptors.write().push((id, interceptor));
        id
    }

    /// Returns `false` if the id was not registered.
    pub fn eject_request_interceptor(&self, id: InterceptorId) -> bool {
        eject(&self.request_interceptors, id)
    }

    pub fn eject_response_interceptor(&self, id: InterceptorId) -> bool {
        eject(&self.response_interceptors, id)
    }

    pub fn request_interceptor_ids(&self) -> Vec<InterceptorId> {
        self.request_interceptors.read().iter().map(|(id, _)| *id).collect()
    }

    pub fn response_interceptor_ids(&self) -> Vec<InterceptorId> {
        self.response_interceptors.read().iter().map(|(id, _)| *id).collect()
    }

    /// Run the request chain, send, then run the response chain.
    ///
    /// The interceptor lists are snapshotted at the start of the call, so
    /// registrations made mid-flight apply to the next call only.
    pub async fn execute(&self, mut request: ChainRequest) -> Result<ChainResponse, TransportError> {
        let request_chain: Vec<_> = self
            .request_interceptors
            .read()
            .iter()
            .map(|(_, i)| i.clone())
            .collect();
        let response_chain: Vec<_> = self
            .response_interceptors
            .read()
            .iter()
            .map(|(_, i)| i.clone())
            .collect();

        let prepared = request_chain
            .iter()
            .try_for_each(|interceptor| interceptor.on_request(&mut request));

        let mut result = match prepared {
            Ok(()) => {
                let fetch = FetchRequest {
                    method: request.method.clone(),
                    target: RequestTarget::Raw(request.url.clone()),
                    headers: request.headers.clone(),
                    body: request.body.take(),
                };
                self.transport.fetch(fetch).await.map(ChainResponse::from)
            }
            Err(err) => Err(err),
        };

        for interceptor in &response_chain {
            result = match result {
                Ok(response) => interceptor.on_response(&mut request, response),
                Err(err) => interceptor.on_error(&mut request, err),
            };
        }
        result
    }
}

fn eject<T: ?Sized>(list: &Registered<T>, id: InterceptorId) -> bool {
    let mut list = list.write();
    let before = list.len();
    list.retain(|(existing, _)| *existing != id);
    list.len() != before
}

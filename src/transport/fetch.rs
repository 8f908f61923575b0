use futures::future::BoxFuture;
use http::Method;

use super::{Headers, RequestTarget, TransportError};

/// One-shot request for a promise-style transport.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub target: RequestTarget,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

impl FetchRequest {
    pub fn new(method: Method, target: impl Into<RequestTarget>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(target: impl Into<RequestTarget>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Promise-call transport: one call, one future. Any HTTP status resolves;
/// only transport-level failures reject.
pub trait FetchTransport: Send + Sync {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<FetchResponse, TransportError>>;
}

/// Default promise-call transport over a shared `reqwest::Client`.
#[derive(Clone, Default)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl FetchTransport for ReqwestFetch {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<FetchResponse, TransportError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let mut builder = client.request(request.method, request.target.to_url_string());
            for (name, value) in request.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = collect_headers(response.headers());
            let body = response.bytes().await?.to_vec();

            Ok::<_, TransportError>(FetchResponse {
                status,
                headers,
                body,
            })
        })
    }
}

pub(crate) fn collect_headers(map: &http::HeaderMap) -> Headers {
    map.iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
